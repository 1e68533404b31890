// 💾 SQLite storage
// Catalog, athlete workouts, audit events and import sessions in one WAL-mode database.

use crate::error::{StoreError, StoreResult};
use crate::model::{
    Load, ParsedEquipment, ParsedExercise, ParsedProgram, ParsedWorkout, ParsedWorkoutSet,
    PrescribedSet, ProgramTemplate, RepType,
};
use crate::reconciliation::{EntityKind, ExistingEntity, MappingState};
use crate::store::{
    AuditAction, CatalogStore, ImportEvent, SessionStore, Transactional, WorkoutStore,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;

pub fn setup_database(conn: &Connection) -> StoreResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Catalog
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS exercises (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK (length(trim(name)) > 0),
            notes TEXT,
            rest_seconds INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS equipment (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK (length(trim(name)) > 0),
            description TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS program_templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK (length(trim(name)) > 0),
            num_weeks INTEGER NOT NULL CHECK (num_weeks > 0),
            num_days INTEGER NOT NULL CHECK (num_days > 0),
            is_loop INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // At most one load field; both NULL means bodyweight
    conn.execute(
        "CREATE TABLE IF NOT EXISTS prescribed_sets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            template_id INTEGER NOT NULL REFERENCES program_templates(id),
            exercise_id INTEGER NOT NULL REFERENCES exercises(id),
            week INTEGER NOT NULL CHECK (week >= 1),
            day INTEGER NOT NULL CHECK (day >= 1),
            set_number INTEGER NOT NULL CHECK (set_number >= 1),
            reps INTEGER,
            rep_type TEXT NOT NULL DEFAULT 'reps',
            percentage REAL,
            absolute_weight REAL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            CHECK (percentage IS NULL OR absolute_weight IS NULL)
        )",
        [],
    )?;

    // ==========================================================================
    // Athletes & workouts
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS athletes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workouts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            athlete_id INTEGER NOT NULL REFERENCES athletes(id),
            date TEXT NOT NULL,
            notes TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (athlete_id, date)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workout_sets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_id INTEGER NOT NULL REFERENCES workouts(id),
            exercise_id INTEGER NOT NULL REFERENCES exercises(id),
            set_number INTEGER NOT NULL CHECK (set_number >= 1),
            reps INTEGER NOT NULL,
            rep_type TEXT NOT NULL DEFAULT 'reps',
            weight REAL,
            rpe REAL,
            warmup INTEGER NOT NULL DEFAULT 0,
            notes TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            recorded_at TEXT NOT NULL,
            action TEXT NOT NULL,
            coach_id INTEGER NOT NULL,
            athlete_id INTEGER NOT NULL,
            workout_id INTEGER,
            source_hash TEXT NOT NULL,
            details TEXT NOT NULL
        )",
        [],
    )?;

    setup_sessions(conn)?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_prescribed_template ON prescribed_sets(template_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_workout_sets_workout ON workout_sets(workout_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_athlete ON events(athlete_id, action)",
        [],
    )?;

    Ok(())
}

fn setup_sessions(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_sessions (
            key TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn table_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Exercise => "exercises",
        EntityKind::Equipment => "equipment",
        EntityKind::Program => "program_templates",
    }
}

fn parse_date(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn rep_type_at(row: &Row, idx: usize) -> rusqlite::Result<RepType> {
    let value: String = row.get(idx)?;
    Ok(RepType::parse(&value).unwrap_or_default())
}

/// Row counts per table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableCounts {
    pub exercises: i64,
    pub equipment: i64,
    pub program_templates: i64,
    pub prescribed_sets: i64,
    pub athletes: i64,
    pub workouts: i64,
    pub workout_sets: i64,
    pub events: i64,
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Minimal athlete row so per-athlete imports have a foreign-key target
    pub fn create_athlete(&self, name: &str) -> StoreResult<i64> {
        self.conn
            .execute("INSERT INTO athletes (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn table_counts(&self) -> StoreResult<TableCounts> {
        let count = |table: &str| -> StoreResult<i64> {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
        };

        Ok(TableCounts {
            exercises: count("exercises")?,
            equipment: count("equipment")?,
            program_templates: count("program_templates")?,
            prescribed_sets: count("prescribed_sets")?,
            athletes: count("athletes")?,
            workouts: count("workouts")?,
            workout_sets: count("workout_sets")?,
            events: count("events")?,
        })
    }

    /// Audit events of one kind, oldest first
    pub fn events_of_type(&self, action: AuditAction) -> StoreResult<Vec<ImportEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, recorded_at, coach_id, athlete_id, workout_id, source_hash, details
             FROM events
             WHERE action = ?1
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![action.as_str()], |row| {
                let recorded_at: String = row.get(1)?;
                let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc);
                Ok((
                    row.get::<_, String>(0)?,
                    recorded_at,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(event_id, recorded_at, coach_id, athlete_id, workout_id, source_hash, details)|
                 -> StoreResult<ImportEvent> {
                    Ok(ImportEvent {
                        event_id,
                        recorded_at,
                        action,
                        coach_id,
                        athlete_id,
                        workout_id,
                        source_hash,
                        details: serde_json::from_str(&details)?,
                    })
                },
            )
            .collect()
    }

    fn prescribed_sets_for(&self, template_id: i64) -> StoreResult<Vec<PrescribedSet>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.name, ps.week, ps.day, ps.set_number, ps.reps, ps.rep_type,
                    ps.percentage, ps.absolute_weight, ps.sort_order, ps.notes
             FROM prescribed_sets ps
             JOIN exercises e ON e.id = ps.exercise_id
             WHERE ps.template_id = ?1
             ORDER BY ps.week, ps.day, ps.sort_order, ps.set_number, ps.id",
        )?;

        let sets = stmt
            .query_map(params![template_id], |row| {
                let percentage: Option<f64> = row.get(6)?;
                let absolute_weight: Option<f64> = row.get(7)?;
                Ok(PrescribedSet {
                    exercise: row.get(0)?,
                    week: row.get(1)?,
                    day: row.get(2)?,
                    set_number: row.get(3)?,
                    reps: row.get(4)?,
                    rep_type: rep_type_at(row, 5)?,
                    // The CHECK constraint rules out both being set
                    load: Load::from_fields(percentage, absolute_weight).unwrap_or(Load::Bodyweight),
                    sort_order: row.get(8)?,
                    notes: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sets)
    }

    fn sets_for_workout(&self, workout_id: i64) -> StoreResult<Vec<ParsedWorkoutSet>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.name, ws.set_number, ws.reps, ws.rep_type, ws.weight, ws.rpe, ws.warmup, ws.notes
             FROM workout_sets ws
             JOIN exercises e ON e.id = ws.exercise_id
             WHERE ws.workout_id = ?1
             ORDER BY ws.id",
        )?;

        let sets = stmt
            .query_map(params![workout_id], |row| {
                Ok(ParsedWorkoutSet {
                    exercise: row.get(0)?,
                    set_number: row.get(1)?,
                    reps: row.get(2)?,
                    rep_type: rep_type_at(row, 3)?,
                    weight: row.get(4)?,
                    rpe: row.get(5)?,
                    warmup: row.get(6)?,
                    notes: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sets)
    }
}

impl CatalogStore for SqliteStore {
    fn list(&self, kind: EntityKind) -> StoreResult<Vec<ExistingEntity>> {
        let sql = format!("SELECT id, name FROM {} ORDER BY id", table_for(kind));
        let mut stmt = self.conn.prepare(&sql)?;

        let entities = stmt
            .query_map([], |row| {
                Ok(ExistingEntity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entities)
    }

    fn find(&self, kind: EntityKind, id: i64) -> StoreResult<Option<ExistingEntity>> {
        let sql = format!("SELECT id, name FROM {} WHERE id = ?1", table_for(kind));

        let entity = self
            .conn
            .query_row(&sql, params![id], |row| {
                Ok(ExistingEntity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()?;

        Ok(entity)
    }

    fn create_exercise(&self, exercise: &ParsedExercise) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO exercises (name, notes, rest_seconds) VALUES (?1, ?2, ?3)",
            params![exercise.name, exercise.notes, exercise.rest_seconds],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_equipment(&self, equipment: &ParsedEquipment) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO equipment (name, description) VALUES (?1, ?2)",
            params![equipment.name, equipment.description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_template(&self, template: &ProgramTemplate) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO program_templates (name, num_weeks, num_days, is_loop, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                template.name,
                template.num_weeks,
                template.num_days,
                template.is_loop,
                template.description,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_prescribed_set(
        &self,
        template_id: i64,
        exercise_id: i64,
        set: &PrescribedSet,
    ) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO prescribed_sets (
                template_id, exercise_id, week, day, set_number, reps, rep_type,
                percentage, absolute_weight, sort_order, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                template_id,
                exercise_id,
                set.week,
                set.day,
                set.set_number,
                set.reps,
                set.rep_type.as_str(),
                set.load.percentage(),
                set.load.absolute_weight(),
                set.sort_order,
                set.notes,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_exercises(&self) -> StoreResult<Vec<ParsedExercise>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, notes, rest_seconds FROM exercises ORDER BY id")?;

        let exercises = stmt
            .query_map([], |row| {
                Ok(ParsedExercise {
                    name: row.get(0)?,
                    notes: row.get(1)?,
                    rest_seconds: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(exercises)
    }

    fn list_equipment(&self) -> StoreResult<Vec<ParsedEquipment>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, description FROM equipment ORDER BY id")?;

        let equipment = stmt
            .query_map([], |row| {
                Ok(ParsedEquipment {
                    name: row.get(0)?,
                    description: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(equipment)
    }

    fn list_programs(&self) -> StoreResult<Vec<ParsedProgram>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, num_weeks, num_days, is_loop, description
             FROM program_templates ORDER BY id",
        )?;

        let templates = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    ProgramTemplate {
                        name: row.get(1)?,
                        num_weeks: row.get(2)?,
                        num_days: row.get(3)?,
                        is_loop: row.get(4)?,
                        description: row.get(5)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        templates
            .into_iter()
            .map(|(id, template)| {
                Ok(ParsedProgram {
                    template,
                    prescribed_sets: self.prescribed_sets_for(id)?,
                })
            })
            .collect()
    }
}

impl WorkoutStore for SqliteStore {
    fn workout_exists(&self, athlete_id: i64, date: NaiveDate) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM workouts WHERE athlete_id = ?1 AND date = ?2",
                params![athlete_id, date.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn create_workout(&self, athlete_id: i64, workout: &ParsedWorkout) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO workouts (athlete_id, date, notes) VALUES (?1, ?2, ?3)",
            params![athlete_id, workout.date.to_string(), workout.notes],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_workout_set(
        &self,
        workout_id: i64,
        exercise_id: i64,
        set: &ParsedWorkoutSet,
    ) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO workout_sets (
                workout_id, exercise_id, set_number, reps, rep_type, weight, rpe, warmup, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                workout_id,
                exercise_id,
                set.set_number,
                set.reps,
                set.rep_type.as_str(),
                set.weight,
                set.rpe,
                set.warmup,
                set.notes,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_workouts(&self, athlete_id: i64) -> StoreResult<Vec<ParsedWorkout>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, notes FROM workouts WHERE athlete_id = ?1 ORDER BY date, id",
        )?;

        let rows = stmt
            .query_map(params![athlete_id], |row| {
                let date: String = row.get(1)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    parse_date(1, &date)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, date, notes)| {
                Ok(ParsedWorkout {
                    date,
                    notes,
                    sets: self.sets_for_workout(id)?,
                })
            })
            .collect()
    }

    fn record_event(&self, event: &ImportEvent) -> StoreResult<()> {
        let details = serde_json::to_string(&event.details)?;

        self.conn.execute(
            "INSERT INTO events (
                event_id, recorded_at, action, coach_id, athlete_id, workout_id, source_hash, details
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.event_id,
                event.recorded_at.to_rfc3339(),
                event.action.as_str(),
                event.coach_id,
                event.athlete_id,
                event.workout_id,
                event.source_hash,
                details,
            ],
        )?;

        Ok(())
    }
}

impl Transactional for SqliteStore {
    fn begin(&self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        debug!("transaction started");
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        debug!("transaction committed");
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        debug!("transaction rolled back");
        Ok(())
    }
}

// ============================================================================
// SESSION STORE
// ============================================================================

/// MappingState persisted as JSON, keyed by an opaque session key
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        setup_sessions(&conn)?;
        Ok(SqliteSessionStore { conn })
    }

    /// Drop sessions not touched since `cutoff`. Returns how many were removed.
    pub fn expire_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM import_sessions WHERE updated_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        if removed > 0 {
            debug!(removed, "expired import sessions");
        }
        Ok(removed)
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, key: &str) -> StoreResult<Option<MappingState>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM import_sessions WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    fn put(&self, key: &str, state: &MappingState) -> StoreResult<()> {
        let json = serde_json::to_string(state)?;
        self.conn.execute(
            "INSERT INTO import_sessions (key, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM import_sessions WHERE key = ?1", params![key])?;
        Ok(())
    }
}
