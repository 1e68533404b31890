// 🗄️ Storage collaborators
// The pipeline talks to the catalog, athlete workouts and session storage only through these traits.

use crate::error::StoreResult;
use crate::model::{
    ParsedEquipment, ParsedExercise, ParsedProgram, ParsedWorkout, ParsedWorkoutSet,
    PrescribedSet, ProgramTemplate,
};
use crate::reconciliation::{EntityKind, ExistingEntity, MappingState};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

// ============================================================================
// CATALOG
// ============================================================================

/// Coach catalog: exercises, equipment and program templates
pub trait CatalogStore {
    /// `{id, name}` snapshot of one entity kind, ordered by id
    fn list(&self, kind: EntityKind) -> StoreResult<Vec<ExistingEntity>>;

    /// Fresh lookup of one catalog row
    fn find(&self, kind: EntityKind, id: i64) -> StoreResult<Option<ExistingEntity>>;

    fn create_exercise(&self, exercise: &ParsedExercise) -> StoreResult<i64>;

    fn create_equipment(&self, equipment: &ParsedEquipment) -> StoreResult<i64>;

    fn create_template(&self, template: &ProgramTemplate) -> StoreResult<i64>;

    fn add_prescribed_set(
        &self,
        template_id: i64,
        exercise_id: i64,
        set: &PrescribedSet,
    ) -> StoreResult<i64>;

    /// Full exercise rows, for export
    fn list_exercises(&self) -> StoreResult<Vec<ParsedExercise>>;

    /// Full equipment rows, for export
    fn list_equipment(&self) -> StoreResult<Vec<ParsedEquipment>>;

    /// Every template with its prescribed sets (exercise ids resolved back to names)
    fn list_programs(&self) -> StoreResult<Vec<ParsedProgram>>;
}

// ============================================================================
// ATHLETE WORKOUTS
// ============================================================================

pub trait WorkoutStore {
    fn workout_exists(&self, athlete_id: i64, date: NaiveDate) -> StoreResult<bool>;

    fn create_workout(&self, athlete_id: i64, workout: &ParsedWorkout) -> StoreResult<i64>;

    fn add_workout_set(
        &self,
        workout_id: i64,
        exercise_id: i64,
        set: &ParsedWorkoutSet,
    ) -> StoreResult<i64>;

    /// Workouts for one athlete, oldest first, sets in logged order
    fn list_workouts(&self, athlete_id: i64) -> StoreResult<Vec<ParsedWorkout>>;

    fn record_event(&self, event: &ImportEvent) -> StoreResult<()>;
}

/// Unit of work spanning one import
pub trait Transactional {
    fn begin(&self) -> StoreResult<()>;
    fn commit(&self) -> StoreResult<()>;
    fn rollback(&self) -> StoreResult<()>;
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// What an audit entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// One workout written to an athlete's log
    WorkoutImported,
    /// Summary written once per import
    ImportCompleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::WorkoutImported => "workout_imported",
            AuditAction::ImportCompleted => "import_completed",
        }
    }
}

/// Audit entry left when a coach imports into an athlete's log
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImportEvent {
    pub event_id: String,
    pub recorded_at: DateTime<Utc>,
    pub action: AuditAction,
    pub coach_id: i64,
    pub athlete_id: i64,
    /// None for the import summary
    pub workout_id: Option<i64>,
    /// Fingerprint of the upload the entry came from
    pub source_hash: String,
    pub details: serde_json::Value,
}

impl ImportEvent {
    fn new(
        action: AuditAction,
        coach_id: i64,
        athlete_id: i64,
        workout_id: Option<i64>,
        source_hash: &str,
        details: serde_json::Value,
    ) -> Self {
        ImportEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            action,
            coach_id,
            athlete_id,
            workout_id,
            source_hash: source_hash.to_string(),
            details,
        }
    }

    pub fn workout_imported(
        coach_id: i64,
        athlete_id: i64,
        workout_id: i64,
        source_hash: &str,
        details: serde_json::Value,
    ) -> Self {
        Self::new(
            AuditAction::WorkoutImported,
            coach_id,
            athlete_id,
            Some(workout_id),
            source_hash,
            details,
        )
    }

    pub fn import_completed(
        coach_id: i64,
        athlete_id: i64,
        source_hash: &str,
        details: serde_json::Value,
    ) -> Self {
        Self::new(
            AuditAction::ImportCompleted,
            coach_id,
            athlete_id,
            None,
            source_hash,
            details,
        )
    }
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Carries a MappingState across the upload → map → preview → execute steps.
/// Concurrent writers to one key race; the last put wins.
pub trait SessionStore {
    fn get(&self, key: &str) -> StoreResult<Option<MappingState>>;
    fn put(&self, key: &str, state: &MappingState) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Opaque key for a new import session
pub fn new_session_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// In-process session storage
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, MappingState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MappingState>> {
        // A panicked writer cannot leave a half-written MappingState behind, so keep going
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> StoreResult<Option<MappingState>> {
        Ok(self.lock().get(key).cloned())
    }

    fn put(&self, key: &str, state: &MappingState) -> StoreResult<()> {
        self.lock().insert(key.to_string(), state.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Format;
    use crate::reconciliation::CatalogSnapshot;
    use crate::model::ParsedFile;

    #[test]
    fn test_memory_session_store_put_get_remove() {
        let store = MemorySessionStore::new();
        let key = new_session_key();
        let state = MappingState::build(
            Format::CatalogJson,
            ParsedFile::default(),
            &CatalogSnapshot::default(),
            b"{}",
        );

        assert!(store.get(&key).unwrap().is_none());

        store.put(&key, &state).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).unwrap().unwrap().source_hash, state.source_hash);

        store.remove(&key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_session_keys_are_unique() {
        assert_ne!(new_session_key(), new_session_key());
    }

    #[test]
    fn test_import_event_constructors() {
        let event = ImportEvent::workout_imported(1, 2, 12, "abc", serde_json::json!({"sets": 3}));

        assert_eq!(event.action, AuditAction::WorkoutImported);
        assert_eq!(event.workout_id, Some(12));
        assert_eq!(event.event_id.len(), 36);

        let summary = ImportEvent::import_completed(1, 2, "abc", serde_json::json!({}));
        assert_eq!(summary.workout_id, None);
        assert_ne!(summary.event_id, event.event_id);
    }

    #[test]
    fn test_audit_action_names() {
        for action in [AuditAction::WorkoutImported, AuditAction::ImportCompleted] {
            assert_eq!(
                serde_json::to_value(action).unwrap(),
                serde_json::json!(action.as_str())
            );
        }
    }
}
