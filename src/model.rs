// Canonical import model
// Every parser normalizes its input into a ParsedFile; the exporter writes the same shape back out.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// UNITS & REP TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WeightUnit {
    #[default]
    #[serde(rename = "lb", alias = "lbs")]
    Lb,
    #[serde(rename = "kg", alias = "kgs")]
    Kg,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Lb => "lb",
            WeightUnit::Kg => "kg",
        }
    }

    /// Parse a user-supplied unit ("lb", "lbs", "kg", "kgs"), case-insensitive
    pub fn parse(value: &str) -> Option<WeightUnit> {
        match value.trim().to_lowercase().as_str() {
            "lb" | "lbs" => Some(WeightUnit::Lb),
            "kg" | "kgs" => Some(WeightUnit::Kg),
            _ => None,
        }
    }
}

/// How the `reps` value of a set is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepType {
    #[default]
    Reps,
    RepsPerSide,
    Seconds,
}

impl RepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepType::Reps => "reps",
            RepType::RepsPerSide => "reps_per_side",
            RepType::Seconds => "seconds",
        }
    }

    pub fn parse(value: &str) -> Option<RepType> {
        match value.trim().to_lowercase().as_str() {
            "reps" => Some(RepType::Reps),
            "reps_per_side" => Some(RepType::RepsPerSide),
            "seconds" => Some(RepType::Seconds),
            _ => None,
        }
    }
}

/// Load prescription for a single set. Exactly one variant is ever selected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Load {
    /// Percentage of the athlete's training max
    Percentage(f64),
    AbsoluteWeight(f64),
    Bodyweight,
}

impl Load {
    /// Build a load from the two nullable canonical fields.
    /// Returns None when both are present.
    pub fn from_fields(percentage: Option<f64>, absolute_weight: Option<f64>) -> Option<Load> {
        match (percentage, absolute_weight) {
            (Some(_), Some(_)) => None,
            (Some(p), None) => Some(Load::Percentage(p)),
            (None, Some(w)) => Some(Load::AbsoluteWeight(w)),
            (None, None) => Some(Load::Bodyweight),
        }
    }

    pub fn percentage(&self) -> Option<f64> {
        match self {
            Load::Percentage(p) => Some(*p),
            _ => None,
        }
    }

    pub fn absolute_weight(&self) -> Option<f64> {
        match self {
            Load::AbsoluteWeight(w) => Some(*w),
            _ => None,
        }
    }
}

// ============================================================================
// CATALOG ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedExercise {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
}

impl ParsedExercise {
    pub fn named(name: &str) -> Self {
        ParsedExercise {
            name: name.to_string(),
            notes: None,
            rest_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEquipment {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Program template header (without its prescribed sets)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramTemplate {
    pub name: String,
    pub num_weeks: u32,
    pub num_days: u32,
    #[serde(default)]
    pub is_loop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescribedSet {
    /// Exercise referenced by name; resolved through the exercise mapping at execute time
    pub exercise: String,
    pub week: u32,
    pub day: u32,
    pub set_number: u32,
    /// None means AMRAP
    pub reps: Option<u32>,
    pub rep_type: RepType,
    pub load: Load,
    pub sort_order: i64,
    pub notes: Option<String>,
}

impl PrescribedSet {
    pub fn is_amrap(&self) -> bool {
        self.reps.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedProgram {
    pub template: ProgramTemplate,
    pub prescribed_sets: Vec<PrescribedSet>,
}

// ============================================================================
// ATHLETE WORKOUTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedWorkout {
    pub date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default)]
    pub sets: Vec<ParsedWorkoutSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedWorkoutSet {
    pub exercise: String,
    pub set_number: u32,
    pub reps: u32,
    #[serde(default)]
    pub rep_type: RepType,
    /// None means bodyweight
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe: Option<f64>,
    #[serde(default)]
    pub warmup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ============================================================================
// PARSED FILE
// ============================================================================

/// Canonical output of every parser
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedFile {
    pub exercises: Vec<ParsedExercise>,
    pub equipment: Vec<ParsedEquipment>,
    pub programs: Vec<ParsedProgram>,
    pub workouts: Vec<ParsedWorkout>,
    pub weight_unit: WeightUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedCounts {
    pub exercises: usize,
    pub equipment: usize,
    pub programs: usize,
    pub prescribed_sets: usize,
    pub workouts: usize,
    pub workout_sets: usize,
}

impl ParsedFile {
    /// Every exercise name the file references, in first-seen order:
    /// declared exercises first, then names only used by prescribed or workout sets.
    /// Duplicates (case-insensitive) keep their first casing.
    pub fn exercise_names(&self) -> Vec<String> {
        let declared = self.exercises.iter().map(|e| e.name.as_str());
        let prescribed = self
            .programs
            .iter()
            .flat_map(|p| p.prescribed_sets.iter().map(|s| s.exercise.as_str()));
        let performed = self
            .workouts
            .iter()
            .flat_map(|w| w.sets.iter().map(|s| s.exercise.as_str()));

        distinct_names(declared.chain(prescribed).chain(performed))
    }

    pub fn equipment_names(&self) -> Vec<String> {
        distinct_names(self.equipment.iter().map(|e| e.name.as_str()))
    }

    pub fn program_names(&self) -> Vec<String> {
        distinct_names(self.programs.iter().map(|p| p.template.name.as_str()))
    }

    /// Look up the declared exercise attributes for a name (case-insensitive)
    pub fn find_exercise(&self, name: &str) -> Option<&ParsedExercise> {
        let key = name_key(name);
        self.exercises.iter().find(|e| name_key(&e.name) == key)
    }

    pub fn find_equipment(&self, name: &str) -> Option<&ParsedEquipment> {
        let key = name_key(name);
        self.equipment.iter().find(|e| name_key(&e.name) == key)
    }

    pub fn find_program(&self, name: &str) -> Option<&ParsedProgram> {
        let key = name_key(name);
        self.programs.iter().find(|p| name_key(&p.template.name) == key)
    }

    pub fn counts(&self) -> ParsedCounts {
        ParsedCounts {
            exercises: self.exercise_names().len(),
            equipment: self.equipment_names().len(),
            programs: self.programs.len(),
            prescribed_sets: self.programs.iter().map(|p| p.prescribed_sets.len()).sum(),
            workouts: self.workouts.len(),
            workout_sets: self.workouts.iter().map(|w| w.sets.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
            && self.equipment.is_empty()
            && self.programs.is_empty()
            && self.workouts.is_empty()
    }
}

// ============================================================================
// CANONICAL JSON (wire shape shared by RepLogJSON and CatalogJSON)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDocument {
    #[serde(default)]
    pub weight_unit: WeightUnit,
    #[serde(default)]
    pub exercises: Vec<ParsedExercise>,
    #[serde(default)]
    pub equipment: Vec<ParsedEquipment>,
    #[serde(default)]
    pub programs: Vec<CanonicalProgram>,
    /// Absent in CatalogJSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workouts: Option<Vec<ParsedWorkout>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProgram {
    pub template: CanonicalTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTemplate {
    pub name: String,
    pub num_weeks: u32,
    pub num_days: u32,
    #[serde(default)]
    pub is_loop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub prescribed_sets: Vec<CanonicalPrescribedSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPrescribedSet {
    pub exercise: String,
    pub week: u32,
    pub day: u32,
    pub set_number: u32,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub rep_type: RepType,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub absolute_weight: Option<f64>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<&ParsedProgram> for CanonicalProgram {
    fn from(program: &ParsedProgram) -> Self {
        CanonicalProgram {
            template: CanonicalTemplate {
                name: program.template.name.clone(),
                num_weeks: program.template.num_weeks,
                num_days: program.template.num_days,
                is_loop: program.template.is_loop,
                description: program.template.description.clone(),
                prescribed_sets: program
                    .prescribed_sets
                    .iter()
                    .map(|s| CanonicalPrescribedSet {
                        exercise: s.exercise.clone(),
                        week: s.week,
                        day: s.day,
                        set_number: s.set_number,
                        reps: s.reps,
                        rep_type: s.rep_type,
                        percentage: s.load.percentage(),
                        absolute_weight: s.load.absolute_weight(),
                        sort_order: s.sort_order,
                        notes: s.notes.clone(),
                    })
                    .collect(),
            },
        }
    }
}

/// Normalized comparison key for entity names
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn distinct_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(name_key(trimmed)) {
            out.push(trimmed.to_string());
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
