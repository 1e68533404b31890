// 🔍 Import preview (dry run)
// Counts what an import would create or map, plus advisory warnings. Never writes.

use crate::error::StoreResult;
use crate::model::name_key;
use crate::reconciliation::{EntityKind, EntityMapping, MappingState};
use crate::store::{CatalogStore, WorkoutStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindPreview {
    /// New catalog rows
    pub create: usize,
    /// Mapped to existing rows
    pub existing: usize,
}

/// Advisory, non-blocking findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewWarning {
    /// Mapping points at a catalog row that no longer exists
    StaleMapping {
        kind: EntityKind,
        name: String,
        mapped_id: i64,
    },
    /// A set names an exercise that has no mapping entry
    UnmappedExercise { name: String },
    /// Workout will be skipped, the athlete already has one that day
    DuplicateWorkoutDate { date: NaiveDate },
    /// A template to be created has the same name as an existing or sibling template
    DuplicateTemplateName { name: String },
    /// Prescribed set outside its template's weeks/days
    OutOfRange {
        program: String,
        exercise: String,
        week: u32,
        day: u32,
    },
    /// Workouts present but no athlete selected
    NoAthlete { workouts: usize },
}

impl fmt::Display for PreviewWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewWarning::StaleMapping { kind, name, mapped_id } => write!(
                f,
                "{} '{}' is mapped to id {} which no longer exists",
                kind, name, mapped_id
            ),
            PreviewWarning::UnmappedExercise { name } => {
                write!(f, "exercise '{}' has no mapping; its sets will be skipped", name)
            }
            PreviewWarning::DuplicateWorkoutDate { date } => {
                write!(f, "a workout on {} already exists and will be skipped", date)
            }
            PreviewWarning::DuplicateTemplateName { name } => {
                write!(f, "a program template named '{}' already exists", name)
            }
            PreviewWarning::OutOfRange {
                program,
                exercise,
                week,
                day,
            } => write!(
                f,
                "program '{}': {} at week {} day {} is outside the template",
                program, exercise, week, day
            ),
            PreviewWarning::NoAthlete { workouts } => write!(
                f,
                "{} workouts need an athlete and will be skipped",
                workouts
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Preview {
    pub exercises: KindPreview,
    pub equipment: KindPreview,
    pub programs: KindPreview,
    /// Prescribed sets of templates that will be created
    pub prescribed_sets: usize,
    pub workouts_new: usize,
    pub workouts_skipped: usize,
    /// Sets of the new workouts
    pub workout_sets: usize,
    pub warnings: Vec<PreviewWarning>,
}

impl Preview {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Build the dry-run preview for the current mapping state.
/// Reads the catalog and the athlete's workouts; performs no writes.
pub fn build_preview<S>(state: &MappingState, store: &S, athlete_id: Option<i64>) -> StoreResult<Preview>
where
    S: CatalogStore + WorkoutStore + ?Sized,
{
    let mut preview = Preview::default();

    for kind in EntityKind::ALL {
        let counts = count_kind(state.mappings(kind), kind, store, &mut preview.warnings)?;
        match kind {
            EntityKind::Exercise => preview.exercises = counts,
            EntityKind::Equipment => preview.equipment = counts,
            EntityKind::Program => preview.programs = counts,
        }
    }

    check_programs(state, store, &mut preview)?;
    check_unmapped_exercises(state, &mut preview.warnings);
    check_workouts(state, store, athlete_id, &mut preview)?;

    for warning in &preview.warnings {
        warn!(%warning, "preview warning");
    }
    info!(
        exercises_new = preview.exercises.create,
        equipment_new = preview.equipment.create,
        programs_new = preview.programs.create,
        workouts_new = preview.workouts_new,
        workouts_skipped = preview.workouts_skipped,
        warnings = preview.warnings.len(),
        "built preview"
    );

    Ok(preview)
}

fn count_kind<S: CatalogStore + ?Sized>(
    mappings: &[EntityMapping],
    kind: EntityKind,
    store: &S,
    warnings: &mut Vec<PreviewWarning>,
) -> StoreResult<KindPreview> {
    let mut counts = KindPreview::default();

    for mapping in mappings {
        if mapping.create {
            counts.create += 1;
            continue;
        }

        counts.existing += 1;
        if !mapping.is_mapped() || store.find(kind, mapping.mapped_id)?.is_none() {
            warnings.push(PreviewWarning::StaleMapping {
                kind,
                name: mapping.parsed_name.clone(),
                mapped_id: mapping.mapped_id,
            });
        }
    }

    Ok(counts)
}

fn check_programs<S: CatalogStore + ?Sized>(
    state: &MappingState,
    store: &S,
    preview: &mut Preview,
) -> StoreResult<()> {
    let existing: HashSet<String> = store
        .list(EntityKind::Program)?
        .iter()
        .map(|e| name_key(&e.name))
        .collect();
    let mut seen = HashSet::new();

    for program in &state.parsed.programs {
        let name = &program.template.name;
        let creating = state
            .mapping_for(EntityKind::Program, name)
            .map(|m| m.create)
            .unwrap_or(false);

        if !creating {
            continue;
        }

        let key = name_key(name);
        if existing.contains(&key) || !seen.insert(key) {
            preview
                .warnings
                .push(PreviewWarning::DuplicateTemplateName { name: name.clone() });
        }

        preview.prescribed_sets += program.prescribed_sets.len();

        for set in &program.prescribed_sets {
            if set.week > program.template.num_weeks || set.day > program.template.num_days {
                preview.warnings.push(PreviewWarning::OutOfRange {
                    program: name.clone(),
                    exercise: set.exercise.clone(),
                    week: set.week,
                    day: set.day,
                });
            }
        }
    }

    Ok(())
}

fn check_unmapped_exercises(state: &MappingState, warnings: &mut Vec<PreviewWarning>) {
    let prescribed = state
        .parsed
        .programs
        .iter()
        .flat_map(|p| p.prescribed_sets.iter().map(|s| s.exercise.as_str()));
    let performed = state
        .parsed
        .workouts
        .iter()
        .flat_map(|w| w.sets.iter().map(|s| s.exercise.as_str()));

    let mut reported = HashSet::new();
    for name in prescribed.chain(performed) {
        if state.mapping_for(EntityKind::Exercise, name).is_none() && reported.insert(name_key(name)) {
            warnings.push(PreviewWarning::UnmappedExercise {
                name: name.to_string(),
            });
        }
    }
}

fn check_workouts<S: WorkoutStore + ?Sized>(
    state: &MappingState,
    store: &S,
    athlete_id: Option<i64>,
    preview: &mut Preview,
) -> StoreResult<()> {
    let workouts = &state.parsed.workouts;
    if workouts.is_empty() {
        return Ok(());
    }

    let Some(athlete_id) = athlete_id else {
        preview.workouts_skipped = workouts.len();
        preview.warnings.push(PreviewWarning::NoAthlete {
            workouts: workouts.len(),
        });
        return Ok(());
    };

    for workout in workouts {
        if store.workout_exists(athlete_id, workout.date)? {
            preview.workouts_skipped += 1;
            preview
                .warnings
                .push(PreviewWarning::DuplicateWorkoutDate { date: workout.date });
        } else {
            preview.workouts_new += 1;
            preview.workout_sets += workout.sets.len();
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
