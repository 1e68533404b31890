// 📤 Export
// Writes catalog and athlete data back out, either as re-importable canonical JSON
// or as a Strong-compatible CSV.

use crate::detect::STRONG_FINGERPRINT;
use crate::error::{ExportError, StoreResult};
use crate::model::{
    CanonicalDocument, CanonicalProgram, ParsedCounts, ParsedFile, RepType, WeightUnit,
};
use crate::store::{CatalogStore, WorkoutStore};
use std::io::Write;
use tracing::info;

/// Columns Strong writes after its fingerprint columns
const STRONG_TRAILING_COLUMNS: &[&str] = &["Distance", "Seconds", "Notes", "Workout Notes", "RPE"];

const STRONG_WORKOUT_NAME: &str = "RepLog Workout";

/// Snapshot of the whole catalog, plus one athlete's workouts when `athlete_id` is given
pub fn collect_export<S>(store: &S, athlete_id: Option<i64>, unit: WeightUnit) -> StoreResult<ParsedFile>
where
    S: CatalogStore + WorkoutStore + ?Sized,
{
    Ok(ParsedFile {
        exercises: store.list_exercises()?,
        equipment: store.list_equipment()?,
        programs: store.list_programs()?,
        workouts: match athlete_id {
            Some(id) => store.list_workouts(id)?,
            None => Vec::new(),
        },
        weight_unit: unit,
    })
}

/// Canonical document for a collected export. Without an athlete the `workouts` key is
/// omitted, so the output is CatalogJSON rather than RepLogJSON.
pub fn to_document(file: &ParsedFile, include_workouts: bool) -> CanonicalDocument {
    CanonicalDocument {
        weight_unit: file.weight_unit,
        exercises: file.exercises.clone(),
        equipment: file.equipment.clone(),
        programs: file.programs.iter().map(CanonicalProgram::from).collect(),
        workouts: include_workouts.then(|| file.workouts.clone()),
    }
}

/// Write canonical JSON to `out`
pub fn export_json<S, W>(
    store: &S,
    athlete_id: Option<i64>,
    unit: WeightUnit,
    out: W,
) -> Result<ParsedCounts, ExportError>
where
    S: CatalogStore + WorkoutStore + ?Sized,
    W: Write,
{
    let file = collect_export(store, athlete_id, unit)?;
    let document = to_document(&file, athlete_id.is_some());

    serde_json::to_writer_pretty(out, &document)?;

    let counts = file.counts();
    info!(
        athlete_id = ?athlete_id,
        exercises = counts.exercises,
        equipment = counts.equipment,
        programs = counts.programs,
        workouts = counts.workouts,
        "exported JSON"
    );

    Ok(counts)
}

/// Write one athlete's workouts in Strong's CSV layout. Returns the number of set rows.
pub fn export_strong_csv<S, W>(store: &S, athlete_id: i64, out: W) -> Result<usize, ExportError>
where
    S: WorkoutStore + ?Sized,
    W: Write,
{
    let workouts = store.list_workouts(athlete_id)?;
    let mut writer = csv::Writer::from_writer(out);

    let header: Vec<&str> = STRONG_FINGERPRINT
        .iter()
        .chain(STRONG_TRAILING_COLUMNS.iter())
        .copied()
        .collect();
    writer.write_record(&header)?;

    let mut rows = 0;
    for workout in &workouts {
        let started_at = format!("{} 00:00:00", workout.date);
        let workout_notes = workout.notes.clone().unwrap_or_default();

        for set in &workout.sets {
            // Timed sets go in Seconds with zero reps
            let (reps, seconds) = match set.rep_type {
                RepType::Seconds => (0, set.reps),
                RepType::Reps | RepType::RepsPerSide => (set.reps, 0),
            };

            writer.write_record([
                started_at.clone(),
                STRONG_WORKOUT_NAME.to_string(),
                String::new(),
                set.exercise.clone(),
                set.set_number.to_string(),
                set.weight.map(|w| w.to_string()).unwrap_or_default(),
                reps.to_string(),
                "0".to_string(),
                seconds.to_string(),
                set.notes.clone().unwrap_or_default(),
                workout_notes.clone(),
                set.rpe.map(|r| r.to_string()).unwrap_or_default(),
            ])?;
            rows += 1;
        }
    }

    writer.flush()?;
    info!(athlete_id, workouts = workouts.len(), rows, "exported Strong CSV");

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================
