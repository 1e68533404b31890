use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use replog::{
    detect, export_json, export_strong_csv, logging, CliOverrides, ImportConfig, ImportContext,
    ImportWorkflow, MappingState, MemorySessionStore, SessionStore, SqliteStore,
};

/// Command-line arguments for replog
#[derive(Parser, Debug)]
#[command(name = "replog")]
#[command(about = "Reconcile workout and program files against a coach catalog")]
#[command(version)]
struct Cli {
    /// SQLite database path (falls back to REPLOG_DB)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Unit for CSV sources that do not declare one: lb or kg
    #[arg(long, global = true)]
    unit: Option<String>,

    /// Upload size ceiling in bytes
    #[arg(long, global = true)]
    max_upload: Option<String>,

    /// Log filter, e.g. replog=debug
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the detected format of a file
    Detect {
        file: PathBuf,
    },
    /// Map, preview and import a file
    Import {
        file: PathBuf,
        /// Format to use when detection fails (strong, hevy, replog, catalog)
        #[arg(long)]
        format: Option<String>,
        /// Athlete that receives the workouts
        #[arg(long)]
        athlete: Option<i64>,
        /// Coach recorded on audit events
        #[arg(long)]
        coach: Option<i64>,
        /// Mapping edit, e.g. exercise_0=create or exercise_1=7 (repeatable)
        #[arg(long = "map", value_name = "KIND_INDEX=VALUE", value_parser = parse_edit)]
        edits: Vec<(String, String)>,
        /// Stop after the preview
        #[arg(long)]
        dry_run: bool,
    },
    /// Export the catalog (and an athlete's workouts)
    Export {
        #[arg(value_enum)]
        format: ExportFormat,
        #[arg(long)]
        athlete: Option<i64>,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Json,
    Csv,
}

fn parse_edit(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected kind_index=value, got '{}'", raw))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ImportConfig::resolve(&CliOverrides {
        database_path: cli.db,
        max_upload_bytes: cli.max_upload,
        weight_unit: cli.unit,
        log_filter: cli.log,
    })?;
    logging::init(&config.log_filter);

    match cli.command {
        Commands::Detect { file } => run_detect(&file),
        Commands::Import {
            file,
            format,
            athlete,
            coach,
            edits,
            dry_run,
        } => run_import(
            &file,
            format.as_deref(),
            ImportContext {
                athlete_id: athlete,
                coach_id: coach,
            },
            &edits,
            dry_run,
            &config,
        ),
        Commands::Export {
            format,
            athlete,
            out,
        } => run_export(format, athlete, out.as_deref(), &config),
    }
}

fn run_detect(path: &Path) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match detect(&data) {
        Some(format) => println!("{}\t{}", format.code(), format),
        None => {
            println!("unknown");
            eprintln!("Format not recognised; pass --format to import it anyway.");
        }
    }

    Ok(())
}

fn run_import(
    path: &Path,
    hint: Option<&str>,
    ctx: ImportContext,
    edits: &[(String, String)],
    dry_run: bool,
    config: &ImportConfig,
) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path.file_name().and_then(|n| n.to_str());

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let sessions = MemorySessionStore::new();
    let workflow = ImportWorkflow::new(&store, &sessions, config);

    let upload = workflow.upload(&data, filename, hint)?;
    println!("📂 {} detected as {}", path.display(), upload.state.format);

    let preview = workflow.preview(&upload.session_key, edits, ctx.athlete_id)?;
    if let Some(state) = sessions.get(&upload.session_key)? {
        print_mapping(&state);
    }

    println!("\n🔍 Preview");
    println!("   exercises: {} new, {} existing", preview.exercises.create, preview.exercises.existing);
    println!("   equipment: {} new, {} existing", preview.equipment.create, preview.equipment.existing);
    println!("   programs:  {} new, {} existing ({} prescribed sets)", preview.programs.create, preview.programs.existing, preview.prescribed_sets);
    println!("   workouts:  {} new, {} skipped ({} sets)", preview.workouts_new, preview.workouts_skipped, preview.workout_sets);
    for warning in &preview.warnings {
        println!("   ⚠️  {}", warning);
    }

    if dry_run {
        workflow.cancel(&upload.session_key)?;
        println!("\nDry run: nothing written.");
        return Ok(());
    }

    let result = workflow.execute(&upload.session_key, &ctx)?;

    println!("\n💾 Import");
    println!("   exercises:       {} created, {} skipped", result.exercises.created, result.exercises.skipped);
    println!("   equipment:       {} created, {} skipped", result.equipment.created, result.equipment.skipped);
    println!("   programs:        {} created, {} skipped", result.programs.created, result.programs.skipped);
    println!("   prescribed sets: {} created, {} skipped", result.prescribed_sets.created, result.prescribed_sets.skipped);
    println!("   workouts:        {} created, {} skipped", result.workouts.created, result.workouts.skipped);
    println!("   workout sets:    {} created, {} skipped", result.workout_sets.created, result.workout_sets.skipped);
    for (kind, error) in result.errors() {
        println!("   ❌ {} {}: {}", kind, error.row, error.message);
    }

    if result.is_success() {
        println!("\n✅ Import complete");
    } else {
        println!("\n❌ Nothing was imported");
    }

    Ok(())
}

fn print_mapping(state: &MappingState) {
    println!("\n🔗 Mapping");
    for (label, mappings) in [
        ("exercise", &state.exercises),
        ("equipment", &state.equipment),
        ("program", &state.programs),
    ] {
        for (index, mapping) in mappings.iter().enumerate() {
            if mapping.create {
                println!("   {}_{}  {}  → create", label, index, mapping.parsed_name);
            } else {
                println!(
                    "   {}_{}  {}  → #{} {}",
                    label, index, mapping.parsed_name, mapping.mapped_id, mapping.mapped_name
                );
            }
        }
    }
}

fn run_export(
    format: ExportFormat,
    athlete_id: Option<i64>,
    out_path: Option<&Path>,
    config: &ImportConfig,
) -> Result<()> {
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;

    let out: Box<dyn Write> = match out_path {
        Some(path) => Box::new(
            fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        ExportFormat::Json => {
            let counts = export_json(&store, athlete_id, config.default_weight_unit, out)?;
            eprintln!(
                "✓ Exported {} exercises, {} programs, {} workouts",
                counts.exercises, counts.programs, counts.workouts
            );
        }
        ExportFormat::Csv => {
            let athlete_id = athlete_id.context("CSV export needs --athlete")?;
            let rows = export_strong_csv(&store, athlete_id, out)?;
            eprintln!("✓ Exported {} sets", rows);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_import_flags() {
        let cli = Cli::try_parse_from([
            "replog", "--db", "coach.db", "import", "log.csv", "--athlete", "4", "--map",
            "exercise_0=create", "--map", "exercise_1=7", "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.db.as_deref(), Some("coach.db"));
        match cli.command {
            Commands::Import {
                athlete,
                coach,
                edits,
                dry_run,
                ..
            } => {
                assert_eq!(athlete, Some(4));
                assert_eq!(coach, None);
                assert!(dry_run);
                assert_eq!(
                    edits,
                    vec![
                        ("exercise_0".to_string(), "create".to_string()),
                        ("exercise_1".to_string(), "7".to_string()),
                    ]
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["replog", "export", "json", "--unit", "kg"]).unwrap();
        assert_eq!(cli.unit.as_deref(), Some("kg"));
        assert!(matches!(cli.command, Commands::Export { format: ExportFormat::Json, .. }));
    }

    #[test]
    fn test_malformed_map_rejected() {
        assert!(Cli::try_parse_from(["replog", "import", "log.csv", "--map", "exercise_0"]).is_err());
        assert!(Cli::try_parse_from(["replog", "export", "xml"]).is_err());
    }
}
