//! Import configuration
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. Compiled default

use crate::model::WeightUnit;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const ENV_DATABASE: &str = "REPLOG_DB";
pub const ENV_MAX_UPLOAD_BYTES: &str = "REPLOG_MAX_UPLOAD_BYTES";
pub const ENV_WEIGHT_UNIT: &str = "REPLOG_WEIGHT_UNIT";
pub const ENV_LOG: &str = "REPLOG_LOG";

pub const DEFAULT_DATABASE: &str = "replog.db";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    pub database_path: PathBuf,
    /// Upload size ceiling; the pipeline itself does no chunking
    pub max_upload_bytes: usize,
    /// Unit for CSV sources that do not declare one
    pub default_weight_unit: WeightUnit,
    pub log_filter: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            default_weight_unit: WeightUnit::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database_path: Option<String>,
    pub max_upload_bytes: Option<String>,
    pub weight_unit: Option<String>,
    pub log_filter: Option<String>,
}

impl ImportConfig {
    /// Resolve against the process environment
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        Self::resolve_with(cli, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve_with<F>(cli: &CliOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |arg: &Option<String>, var: &str| -> Option<(String, String)> {
            match arg {
                Some(value) => Some((value.clone(), "command line".to_string())),
                None => env(var).map(|value| (value, var.to_string())),
            }
        };

        let mut config = ImportConfig::default();

        if let Some((path, _)) = pick(&cli.database_path, ENV_DATABASE) {
            config.database_path = PathBuf::from(path);
        }

        if let Some((value, source)) = pick(&cli.max_upload_bytes, ENV_MAX_UPLOAD_BYTES) {
            config.max_upload_bytes = value
                .trim()
                .parse()
                .with_context(|| format!("invalid upload limit '{}' from {}", value, source))?;
            if config.max_upload_bytes == 0 {
                bail!("upload limit from {} must be greater than zero", source);
            }
        }

        if let Some((value, source)) = pick(&cli.weight_unit, ENV_WEIGHT_UNIT) {
            config.default_weight_unit = match WeightUnit::parse(&value) {
                Some(unit) => unit,
                None => bail!("invalid weight unit '{}' from {} (expected lb or kg)", value, source),
            };
        }

        if let Some((filter, _)) = pick(&cli.log_filter, ENV_LOG) {
            config.log_filter = filter;
        }

        Ok(config)
    }
}
