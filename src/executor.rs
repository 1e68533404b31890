// ⚙️ Import executor
// Commits a MappingState in dependency order inside one store transaction.
//
// Row problems (constraint violations, unresolved names, stale mappings) are collected in the
// result and never abort the import. Any other storage failure rolls everything back.
//
// The executor does not consume the state: running it twice on the same MappingState creates the
// "to-create" rows twice. Callers clear the session after a successful run.

use crate::error::{ImportError, StoreResult};
use crate::model::{name_key, ParsedEquipment, ParsedExercise, ParsedProgram, ParsedWorkout};
use crate::reconciliation::{EntityKind, EntityMapping, MappingState};
use crate::store::{CatalogStore, ImportEvent, Transactional, WorkoutStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Who the import is for and who is doing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportContext {
    pub athlete_id: Option<i64>,
    /// Acting coach; enables audit events for per-athlete imports
    pub coach_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Row identity, e.g. the entity name or "Block: Squat w1 d1 #2"
    pub row: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindResult {
    pub created: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

impl KindResult {
    fn error(&mut self, row: impl Into<String>, message: impl Into<String>) {
        let error = RowError {
            row: row.into(),
            message: message.into(),
        };
        warn!(row = error.row.as_str(), message = error.message.as_str(), "row error");
        self.errors.push(error);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub exercises: KindResult,
    pub equipment: KindResult,
    pub programs: KindResult,
    pub prescribed_sets: KindResult,
    pub workouts: KindResult,
    pub workout_sets: KindResult,
}

impl ImportResult {
    fn kinds(&self) -> [(&'static str, &KindResult); 6] {
        [
            ("exercises", &self.exercises),
            ("equipment", &self.equipment),
            ("programs", &self.programs),
            ("prescribed_sets", &self.prescribed_sets),
            ("workouts", &self.workouts),
            ("workout_sets", &self.workout_sets),
        ]
    }

    pub fn total_created(&self) -> usize {
        self.kinds().iter().map(|(_, k)| k.created).sum()
    }

    pub fn error_count(&self) -> usize {
        self.kinds().iter().map(|(_, k)| k.errors.len()).sum()
    }

    /// Every row error tagged with its kind
    pub fn errors(&self) -> Vec<(&'static str, &RowError)> {
        self.kinds()
            .into_iter()
            .flat_map(|(kind, k)| k.errors.iter().map(move |e| (kind, e)))
            .collect()
    }

    /// Reported as success when anything was committed
    pub fn is_success(&self) -> bool {
        self.total_created() > 0 || self.error_count() == 0
    }
}

/// Working name → id table for one kind; starts from the mapping and learns new ids as rows are created
struct Resolver {
    ids: HashMap<String, i64>,
}

impl Resolver {
    fn new() -> Self {
        Resolver { ids: HashMap::new() }
    }

    fn record(&mut self, name: &str, id: i64) {
        self.ids.insert(name_key(name), id);
    }

    fn resolve(&self, name: &str) -> Option<i64> {
        self.ids.get(&name_key(name)).copied()
    }
}

/// Commit `state` to `store`.
///
/// Order: exercises, equipment, program templates with their prescribed sets, then workouts.
/// Returns Err only for catastrophic storage failures, after rolling back.
pub fn execute_import<S>(
    state: &MappingState,
    store: &S,
    ctx: &ImportContext,
) -> Result<ImportResult, ImportError>
where
    S: CatalogStore + WorkoutStore + Transactional + ?Sized,
{
    info!(
        format = state.format.code(),
        source_hash = state.source_hash.as_str(),
        athlete_id = ?ctx.athlete_id,
        "executing import"
    );

    store.begin()?;

    match run_import(state, store, ctx) {
        Ok(result) => {
            // A failed COMMIT leaves the transaction open
            if let Err(err) = store.commit() {
                warn!(error = %err, "commit failed, rolling back");
                if let Err(rollback_err) = store.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(err.into());
            }
            info!(
                created = result.total_created(),
                errors = result.error_count(),
                "import committed"
            );
            Ok(result)
        }
        Err(err) => {
            warn!(error = %err, "import failed, rolling back");
            if let Err(rollback_err) = store.rollback() {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err.into())
        }
    }
}

fn run_import<S>(state: &MappingState, store: &S, ctx: &ImportContext) -> StoreResult<ImportResult>
where
    S: CatalogStore + WorkoutStore + ?Sized,
{
    let mut result = ImportResult::default();

    // 1. Exercises
    let mut exercises = Resolver::new();
    for mapping in &state.exercises {
        let attrs = state
            .parsed
            .find_exercise(&mapping.parsed_name)
            .cloned()
            .unwrap_or_else(|| ParsedExercise::named(&mapping.parsed_name));

        if let Some(id) = apply_mapping(
            mapping,
            EntityKind::Exercise,
            store,
            &mut result.exercises,
            |s| s.create_exercise(&attrs),
        )? {
            exercises.record(&mapping.parsed_name, id);
        }
    }
    info!(created = result.exercises.created, skipped = result.exercises.skipped, "exercises done");

    // 2. Equipment
    for mapping in &state.equipment {
        let attrs = state
            .parsed
            .find_equipment(&mapping.parsed_name)
            .cloned()
            .unwrap_or_else(|| ParsedEquipment {
                name: mapping.parsed_name.clone(),
                description: None,
            });

        apply_mapping(
            mapping,
            EntityKind::Equipment,
            store,
            &mut result.equipment,
            |s| s.create_equipment(&attrs),
        )?;
    }
    info!(created = result.equipment.created, skipped = result.equipment.skipped, "equipment done");

    // 3. Program templates, then their prescribed sets
    let mut created_programs = HashSet::new();
    for program in &state.parsed.programs {
        import_program(program, state, store, &exercises, &mut created_programs, &mut result)?;
    }
    info!(
        created = result.programs.created,
        sets = result.prescribed_sets.created,
        "programs done"
    );

    // 4. Athlete workouts
    import_workouts(state, store, ctx, &exercises, &mut result)?;

    if let (Some(athlete_id), Some(coach_id)) = (ctx.athlete_id, ctx.coach_id) {
        let event = ImportEvent::import_completed(
            coach_id,
            athlete_id,
            &state.source_hash,
            serde_json::json!({
                "format": state.format.code(),
                "filename": state.filename,
                "workouts_created": result.workouts.created,
                "workouts_skipped": result.workouts.skipped,
                "errors": result.error_count(),
            }),
        );
        store.record_event(&event)?;
    }

    Ok(result)
}

/// Create or verify one catalog mapping. Returns the id that names of this entry resolve to.
fn apply_mapping<S, F>(
    mapping: &EntityMapping,
    kind: EntityKind,
    store: &S,
    counts: &mut KindResult,
    create: F,
) -> StoreResult<Option<i64>>
where
    S: CatalogStore + ?Sized,
    F: FnOnce(&S) -> StoreResult<i64>,
{
    if mapping.create {
        return match create(store) {
            Ok(id) => {
                counts.created += 1;
                Ok(Some(id))
            }
            Err(err) if err.is_row_level() => {
                counts.error(&mapping.parsed_name, err.to_string());
                Ok(None)
            }
            Err(err) => Err(err),
        };
    }

    verify_existing(mapping, kind, store, counts)
}

/// An entry mapped to an existing row counts as skipped, provided the row is still there
fn verify_existing<S: CatalogStore + ?Sized>(
    mapping: &EntityMapping,
    kind: EntityKind,
    store: &S,
    counts: &mut KindResult,
) -> StoreResult<Option<i64>> {
    if mapping.is_mapped() && store.find(kind, mapping.mapped_id)?.is_some() {
        counts.skipped += 1;
        return Ok(Some(mapping.mapped_id));
    }

    counts.error(
        &mapping.parsed_name,
        format!("mapped {} id {} no longer exists", kind, mapping.mapped_id),
    );
    Ok(None)
}

fn import_program<S>(
    program: &ParsedProgram,
    state: &MappingState,
    store: &S,
    exercises: &Resolver,
    created_programs: &mut HashSet<String>,
    result: &mut ImportResult,
) -> StoreResult<()>
where
    S: CatalogStore + ?Sized,
{
    let template = &program.template;
    let Some(mapping) = state.mapping_for(EntityKind::Program, &template.name) else {
        result
            .programs
            .error(&template.name, "program has no mapping entry");
        return Ok(());
    };

    if !mapping.create {
        // Mapped to an existing template: its sets are not re-imported
        verify_existing(mapping, EntityKind::Program, store, &mut result.programs)?;
        result.prescribed_sets.skipped += program.prescribed_sets.len();
        return Ok(());
    }

    if !created_programs.insert(name_key(&template.name)) {
        result
            .programs
            .error(&template.name, "program appears more than once in the upload");
        return Ok(());
    }

    let template_id = match store.create_template(template) {
        Ok(id) => {
            result.programs.created += 1;
            id
        }
        Err(err) if err.is_row_level() => {
            result.programs.error(&template.name, err.to_string());
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    for set in &program.prescribed_sets {
        let row = format!(
            "{}: {} w{} d{} #{}",
            template.name, set.exercise, set.week, set.day, set.set_number
        );

        if set.week > template.num_weeks || set.day > template.num_days {
            result.prescribed_sets.error(
                row,
                format!(
                    "week {} day {} is outside the {}x{} template",
                    set.week, set.day, template.num_weeks, template.num_days
                ),
            );
            continue;
        }

        let Some(exercise_id) = exercises.resolve(&set.exercise) else {
            result
                .prescribed_sets
                .error(row, format!("exercise '{}' could not be resolved", set.exercise));
            continue;
        };

        match store.add_prescribed_set(template_id, exercise_id, set) {
            Ok(_) => result.prescribed_sets.created += 1,
            Err(err) if err.is_row_level() => result.prescribed_sets.error(row, err.to_string()),
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

fn import_workouts<S>(
    state: &MappingState,
    store: &S,
    ctx: &ImportContext,
    exercises: &Resolver,
    result: &mut ImportResult,
) -> StoreResult<()>
where
    S: WorkoutStore + ?Sized,
{
    let workouts = &state.parsed.workouts;
    if workouts.is_empty() {
        return Ok(());
    }

    let Some(athlete_id) = ctx.athlete_id else {
        warn!(workouts = workouts.len(), "no athlete selected, skipping workouts");
        result.workouts.skipped += workouts.len();
        result.workout_sets.skipped += workouts.iter().map(|w| w.sets.len()).sum::<usize>();
        return Ok(());
    };

    for workout in workouts {
        if store.workout_exists(athlete_id, workout.date)? {
            result.workouts.skipped += 1;
            result.workout_sets.skipped += workout.sets.len();
            continue;
        }

        let workout_id = match store.create_workout(athlete_id, workout) {
            Ok(id) => {
                result.workouts.created += 1;
                id
            }
            Err(err) if err.is_row_level() => {
                result.workouts.error(workout.date.to_string(), err.to_string());
                continue;
            }
            Err(err) => return Err(err),
        };

        let added = import_workout_sets(workout, workout_id, store, exercises, result)?;

        if let Some(coach_id) = ctx.coach_id {
            let event = ImportEvent::workout_imported(
                coach_id,
                athlete_id,
                workout_id,
                &state.source_hash,
                serde_json::json!({
                    "date": workout.date,
                    "sets": added,
                }),
            );
            store.record_event(&event)?;
        }
    }

    info!(
        created = result.workouts.created,
        skipped = result.workouts.skipped,
        sets = result.workout_sets.created,
        "workouts done"
    );

    Ok(())
}

fn import_workout_sets<S>(
    workout: &ParsedWorkout,
    workout_id: i64,
    store: &S,
    exercises: &Resolver,
    result: &mut ImportResult,
) -> StoreResult<usize>
where
    S: WorkoutStore + ?Sized,
{
    let mut added = 0;

    for set in &workout.sets {
        let row = format!("{}: {} #{}", workout.date, set.exercise, set.set_number);

        let Some(exercise_id) = exercises.resolve(&set.exercise) else {
            result
                .workout_sets
                .error(row, format!("exercise '{}' could not be resolved", set.exercise));
            continue;
        };

        match store.add_workout_set(workout_id, exercise_id, set) {
            Ok(_) => {
                result.workout_sets.created += 1;
                added += 1;
            }
            Err(err) if err.is_row_level() => result.workout_sets.error(row, err.to_string()),
            Err(err) => return Err(err),
        }
    }

    Ok(added)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::detect::Format;
    use crate::model::{ParsedFile, WeightUnit};
    use crate::parser::{CanonicalJsonParser, FormatParser, StrongCsvParser};
    use crate::reconciliation::CatalogSnapshot;
    use crate::store::AuditAction;

    const REPLOG: &[u8] = include_bytes!("../fixtures/replog_sample.json");
    const STRONG: &[u8] = include_bytes!("../fixtures/strong_sample.csv");

    fn build_state(store: &SqliteStore, format: Format, parsed: ParsedFile, data: &[u8]) -> MappingState {
        let snapshot = CatalogSnapshot::load(store).unwrap();
        MappingState::build(format, parsed, &snapshot, data)
    }

    /// Catalog with "Squat" at id 7
    fn store_with_squat_7() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for name in ["Deadlift", "Row", "Curl", "Lunge", "Dip", "Press"] {
            store.create_exercise(&ParsedExercise::named(name)).unwrap();
        }
        let squat = store.create_exercise(&ParsedExercise::named("Squat")).unwrap();
        assert_eq!(squat, 7);
        store
    }

    #[test]
    fn test_strong_import_resolves_squat_to_existing_id() {
        let store = store_with_squat_7();
        let athlete = store.create_athlete("Sam").unwrap();
        let csv = "Date,Workout Name,Duration,Exercise Name,Set Order,Weight,Reps,Distance,Seconds,Notes,Workout Notes,RPE\n\
            2024-03-04 07:30:00,Push,1h,Bench Press,1,135,10,0,0,,,\n\
            2024-03-04 07:30:00,Push,1h,Squat,1,225,5,0,0,,,\n\
            2024-03-04 07:30:00,Push,1h,Squat,2,225,5,0,0,,,\n";
        let parsed = StrongCsvParser::new(WeightUnit::Lb).parse(csv.as_bytes()).unwrap();
        let state = build_state(&store, Format::StrongCsv, parsed, csv.as_bytes());

        let result = execute_import(
            &state,
            &store,
            &ImportContext {
                athlete_id: Some(athlete),
                coach_id: None,
            },
        )
        .unwrap();

        assert_eq!(result.exercises.created, 1);
        assert_eq!(result.exercises.skipped, 1);
        assert_eq!(result.workouts.created, 1);
        assert_eq!(result.workout_sets.created, 3);
        assert_eq!(result.error_count(), 0);

        let squat_sets: i64 = store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM workout_sets WHERE exercise_id = 7",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(squat_sets, 2);

        let exercises = store.list(EntityKind::Exercise).unwrap();
        assert_eq!(exercises.len(), 8);
        assert_eq!(exercises[7].name, "Bench Press");

        println!("✅ Bench Press created, Squat sets → id 7");
    }

    #[test]
    fn test_unresolved_prescribed_set_is_isolated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let json = br#"{"exercises":[{"name":"Squat"},{"name":"Lunge"}],
            "programs":[{"template":{"name":"Block","num_weeks":2,"num_days":2,"prescribed_sets":[
                {"exercise":"Squat","week":1,"day":1,"set_number":1,"reps":5,"percentage":70},
                {"exercise":"Lunge","week":1,"day":1,"set_number":2,"reps":8},
                {"exercise":"Squat","week":1,"day":2,"set_number":1,"reps":5,"percentage":75}
            ]}}]}"#;
        let parsed = CanonicalJsonParser::catalog().parse(json).unwrap();
        let mut state = build_state(&store, Format::CatalogJson, parsed, json);
        state.exercises.retain(|m| m.parsed_name != "Lunge");

        let result = execute_import(&state, &store, &ImportContext::default()).unwrap();

        assert_eq!(result.programs.created, 1);
        assert_eq!(result.prescribed_sets.created, 2);
        assert_eq!(result.prescribed_sets.errors.len(), 1);
        assert!(result.prescribed_sets.errors[0].row.contains("Lunge"));
        assert_eq!(result.error_count(), 1);
        assert!(result.is_success());

        let counts = store.table_counts().unwrap();
        assert_eq!(counts.program_templates, 1);
        assert_eq!(counts.prescribed_sets, 2);
    }

    #[test]
    fn test_out_of_range_set_is_row_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let json = br#"{"programs":[{"template":{"name":"Short","num_weeks":1,"num_days":1,"prescribed_sets":[
            {"exercise":"Squat","week":1,"day":1,"set_number":1,"reps":5},
            {"exercise":"Squat","week":3,"day":1,"set_number":1,"reps":5}
        ]}}]}"#;
        let parsed = CanonicalJsonParser::catalog().parse(json).unwrap();
        let state = build_state(&store, Format::CatalogJson, parsed, json);

        let result = execute_import(&state, &store, &ImportContext::default()).unwrap();

        assert_eq!(result.prescribed_sets.created, 1);
        assert_eq!(result.prescribed_sets.errors.len(), 1);
        assert!(result.prescribed_sets.errors[0].message.contains("outside"));
    }

    #[test]
    fn test_duplicate_workout_date_is_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete("Sam").unwrap();
        let ctx = ImportContext {
            athlete_id: Some(athlete),
            coach_id: None,
        };

        let parsed = CanonicalJsonParser::replog().parse(REPLOG).unwrap();
        let state = build_state(&store, Format::RepLogJson, parsed.clone(), REPLOG);
        let first = execute_import(&state, &store, &ctx).unwrap();
        assert_eq!(first.workouts.created, 2);
        let sets_after_first = store.table_counts().unwrap().workout_sets;

        // Second upload of the same file, mapped against the now-populated catalog
        let state = build_state(&store, Format::RepLogJson, parsed, REPLOG);
        let second = execute_import(&state, &store, &ctx).unwrap();

        assert_eq!(second.workouts.created, 0);
        assert_eq!(second.workouts.skipped, 2);
        assert!(second.workouts.errors.is_empty());
        assert_eq!(second.exercises.skipped, 3);
        assert_eq!(second.programs.skipped, 1);
        assert_eq!(second.prescribed_sets.skipped, 5);
        assert_eq!(store.table_counts().unwrap().workout_sets, sets_after_first);
    }

    #[test]
    fn test_workouts_without_athlete_are_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let parsed = StrongCsvParser::new(WeightUnit::Lb).parse(STRONG).unwrap();
        let state = build_state(&store, Format::StrongCsv, parsed, STRONG);

        let result = execute_import(&state, &store, &ImportContext::default()).unwrap();

        assert_eq!(result.exercises.created, 3);
        assert_eq!(result.workouts.skipped, 2);
        assert_eq!(result.workout_sets.skipped, 6);
        assert_eq!(store.table_counts().unwrap().workouts, 0);
    }

    #[test]
    fn test_stale_mapping_is_row_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete("Sam").unwrap();
        let parsed = CanonicalJsonParser::replog().parse(REPLOG).unwrap();
        let mut state = build_state(&store, Format::RepLogJson, parsed, REPLOG);

        // Point "Squat" at a row that does not exist
        state.exercises[0].create = false;
        state.exercises[0].mapped_id = 500;

        let result = execute_import(
            &state,
            &store,
            &ImportContext {
                athlete_id: Some(athlete),
                coach_id: None,
            },
        )
        .unwrap();

        assert_eq!(result.exercises.created, 2);
        assert_eq!(result.exercises.errors.len(), 1);
        // Three Squat prescribed sets and three Squat workout sets cannot resolve
        assert_eq!(result.prescribed_sets.errors.len(), 3);
        assert_eq!(result.workout_sets.errors.len(), 3);
        assert_eq!(result.workout_sets.created, 2);
    }

    #[test]
    fn test_audit_events_recorded_for_coach() {
        let store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete("Sam").unwrap();
        let parsed = CanonicalJsonParser::replog().parse(REPLOG).unwrap();
        let state = build_state(&store, Format::RepLogJson, parsed, REPLOG);

        execute_import(
            &state,
            &store,
            &ImportContext {
                athlete_id: Some(athlete),
                coach_id: Some(3),
            },
        )
        .unwrap();

        let imported = store.events_of_type(AuditAction::WorkoutImported).unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].coach_id, 3);
        assert_eq!(imported[0].athlete_id, athlete);
        assert!(imported[0].workout_id.is_some());
        assert_eq!(imported[0].source_hash, state.source_hash);

        let completed = store.events_of_type(AuditAction::ImportCompleted).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].workout_id, None);
        assert_eq!(completed[0].details["workouts_created"], 2);
    }

    #[test]
    fn test_reexecution_recreates_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let json = br#"{"exercises":[{"name":"Squat"}]}"#;
        let parsed = CanonicalJsonParser::catalog().parse(json).unwrap();
        let state = build_state(&store, Format::CatalogJson, parsed, json);

        execute_import(&state, &store, &ImportContext::default()).unwrap();
        execute_import(&state, &store, &ImportContext::default()).unwrap();

        assert_eq!(store.list(EntityKind::Exercise).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_commit_is_rolled_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let json = br#"{"exercises":[{"name":"Squat"}]}"#;
        let parsed = CanonicalJsonParser::catalog().parse(json).unwrap();
        let state = build_state(&store, Format::CatalogJson, parsed, json);

        // Every exercise insert leaves a dangling deferred reference, so COMMIT fails
        store
            .connection()
            .execute_batch(
                "CREATE TABLE exercise_owners (
                     athlete_id INTEGER REFERENCES athletes(id) DEFERRABLE INITIALLY DEFERRED
                 );
                 CREATE TRIGGER exercise_owner AFTER INSERT ON exercises
                 BEGIN
                     INSERT INTO exercise_owners (athlete_id) VALUES (999);
                 END;",
            )
            .unwrap();

        let err = execute_import(&state, &store, &ImportContext::default()).unwrap_err();
        assert!(matches!(err, ImportError::Storage(_)));
        assert!(store.connection().is_autocommit());
        assert!(store.list(EntityKind::Exercise).unwrap().is_empty());

        store
            .connection()
            .execute_batch("DROP TRIGGER exercise_owner;")
            .unwrap();

        let result = execute_import(&state, &store, &ImportContext::default()).unwrap();
        assert_eq!(result.exercises.created, 1);

        println!("✅ Failed commit rolled back, next import succeeded");
    }

    #[test]
    fn test_catastrophic_failure_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete("Sam").unwrap();
        let parsed = CanonicalJsonParser::replog().parse(REPLOG).unwrap();
        let state = build_state(&store, Format::RepLogJson, parsed, REPLOG);

        // Workout phase hits a missing table after the catalog rows were written
        store
            .connection()
            .execute_batch("DROP TABLE workout_sets; DROP TABLE workouts;")
            .unwrap();

        let err = execute_import(
            &state,
            &store,
            &ImportContext {
                athlete_id: Some(athlete),
                coach_id: None,
            },
        )
        .unwrap_err();

        assert!(matches!(err, ImportError::Storage(_)));
        assert!(store.list(EntityKind::Exercise).unwrap().is_empty());
        assert!(store.list(EntityKind::Program).unwrap().is_empty());
    }
}
