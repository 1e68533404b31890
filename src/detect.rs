// Format detection
// Classifies raw upload bytes into one of the closed set of supported formats.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Leading header columns of a Strong CSV export
pub const STRONG_FINGERPRINT: &[&str] = &[
    "Date",
    "Workout Name",
    "Duration",
    "Exercise Name",
    "Set Order",
    "Weight",
    "Reps",
];

/// Leading header columns of a Hevy CSV export (the weight column after these varies by unit)
pub const HEVY_FINGERPRINT: &[&str] = &[
    "title",
    "start_time",
    "end_time",
    "description",
    "exercise_title",
    "superset_id",
    "exercise_notes",
    "set_index",
    "set_type",
];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    StrongCsv,
    HevyCsv,
    RepLogJson,
    CatalogJson,
}

impl Format {
    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            Format::StrongCsv => "Strong CSV",
            Format::HevyCsv => "Hevy CSV",
            Format::RepLogJson => "RepLog JSON",
            Format::CatalogJson => "Catalog JSON",
        }
    }

    /// Short code, also accepted back by `from_hint`
    pub fn code(&self) -> &'static str {
        match self {
            Format::StrongCsv => "strong",
            Format::HevyCsv => "hevy",
            Format::RepLogJson => "replog",
            Format::CatalogJson => "catalog",
        }
    }

    /// Resolve an explicit, user-chosen format
    pub fn from_hint(hint: &str) -> Option<Format> {
        match hint.trim().to_lowercase().as_str() {
            "strong" | "strong_csv" | "strongcsv" => Some(Format::StrongCsv),
            "hevy" | "hevy_csv" | "hevycsv" => Some(Format::HevyCsv),
            "replog" | "json" | "replog_json" | "replogjson" => Some(Format::RepLogJson),
            "catalog" | "catalog_json" | "catalogjson" => Some(Format::CatalogJson),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the format of an upload.
///
/// JSON is tried first: an object with a `workouts` key is RepLogJSON, an object with
/// only catalog keys is CatalogJSON. Otherwise the first line is compared against the
/// CSV header fingerprints, Strong before Hevy. Returns None when nothing matches.
pub fn detect(data: &[u8]) -> Option<Format> {
    let data = strip_bom(data);

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        return detect_json(&value);
    }

    let header = first_line_columns(data)?;

    if matches_fingerprint(&header, STRONG_FINGERPRINT) {
        return Some(Format::StrongCsv);
    }

    if matches_fingerprint(&header, HEVY_FINGERPRINT) {
        return Some(Format::HevyCsv);
    }

    None
}

pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

fn detect_json(value: &serde_json::Value) -> Option<Format> {
    let object = value.as_object()?;

    if object.contains_key("workouts") {
        return Some(Format::RepLogJson);
    }

    let catalog_keys = ["exercises", "equipment", "programs"];
    if catalog_keys.iter().any(|k| object.contains_key(*k)) {
        return Some(Format::CatalogJson);
    }

    None
}

fn first_line_columns(data: &[u8]) -> Option<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let record = reader.records().next()?.ok()?;
    Some(record.iter().map(|c| c.trim().to_string()).collect())
}

fn matches_fingerprint(header: &[String], fingerprint: &[&str]) -> bool {
    header.len() >= fingerprint.len()
        && fingerprint
            .iter()
            .zip(header.iter())
            .all(|(expected, actual)| actual == expected)
}

// ============================================================================
// TESTS
// ============================================================================
