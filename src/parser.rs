// 🏗️ Parser Framework
// One parser per supported format, all producing the canonical ParsedFile

use crate::detect::{strip_bom, Format};
use crate::error::ParseError;
use crate::model::{
    name_key, CanonicalDocument, CanonicalProgram, Load, ParsedEquipment, ParsedExercise,
    ParsedFile, ParsedProgram, ParsedWorkout, ParsedWorkoutSet, PrescribedSet, ProgramTemplate,
    RepType, WeightUnit,
};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

// ============================================================================
// CORE TRAITS
// ============================================================================

/// FormatParser - the one required interface.
///
/// A parser never returns a partial ParsedFile: the first malformed row aborts the parse.
pub trait FormatParser: Send + Sync {
    /// Parse raw upload bytes into the canonical shape
    fn parse(&self, data: &[u8]) -> Result<ParsedFile, ParseError>;

    /// Format this parser handles
    fn format(&self) -> Format;

    /// Parser version (for audit records)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

/// SetGrouping - capability of CSV parsers: where source sessions and exercise blocks begin.
///
/// Sessions that fall on the same calendar day are merged into a single workout,
/// since an athlete has at most one workout per date.
pub trait SetGrouping {
    /// Identity of the source session a row belongs to
    fn session_key(&self, row: &SetRow) -> String;

    /// Whether `row` starts a new exercise block, given the previous row of its session
    fn opens_block(&self, previous: &SetRow, row: &SetRow) -> bool;
}

/// Options shared by every parser
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Unit assumed when the source does not declare one
    pub default_unit: WeightUnit,
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Get the parser for a format
pub fn get_parser(format: Format, options: &ParserOptions) -> Box<dyn FormatParser> {
    match format {
        Format::StrongCsv => Box::new(StrongCsvParser::new(options.default_unit)),
        Format::HevyCsv => Box::new(HevyCsvParser::new(options.default_unit)),
        Format::RepLogJson => Box::new(CanonicalJsonParser::replog()),
        Format::CatalogJson => Box::new(CanonicalJsonParser::catalog()),
    }
}

/// Parse `data` with the parser selected for `format`
pub fn parse(format: Format, data: &[u8], options: &ParserOptions) -> Result<ParsedFile, ParseError> {
    let parser = get_parser(format, options);
    let parsed = parser.parse(data)?;
    let counts = parsed.counts();

    info!(
        format = format.code(),
        parser_version = parser.version(),
        exercises = counts.exercises,
        equipment = counts.equipment,
        programs = counts.programs,
        prescribed_sets = counts.prescribed_sets,
        workouts = counts.workouts,
        workout_sets = counts.workout_sets,
        "parsed upload"
    );

    Ok(parsed)
}

// ============================================================================
// CSV SUPPORT
// ============================================================================

/// One performed set read from a flat CSV row, before grouping
#[derive(Debug, Clone)]
pub struct SetRow {
    pub line: usize,
    /// One-based set number as the source recorded it
    pub source_set: u32,
    pub started_at: NaiveDateTime,
    pub session_title: String,
    pub exercise: String,
    pub reps: u32,
    pub rep_type: RepType,
    pub weight: f64,
    pub rpe: Option<f64>,
    pub warmup: bool,
    pub notes: Option<String>,
    pub workout_notes: Option<String>,
}

/// Header name → column index
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, required: &[&str]) -> Result<Self, ParseError> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();

        for field in required {
            if !index.contains_key(*field) {
                return Err(ParseError::MissingField {
                    line: 1,
                    field: field.to_string(),
                });
            }
        }

        Ok(Columns { index })
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Trimmed non-empty value, None if the column is absent or blank
    fn optional<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        let i = *self.index.get(name)?;
        record.get(i).map(str::trim).filter(|v| !v.is_empty())
    }

    fn required<'r>(
        &self,
        record: &'r StringRecord,
        name: &str,
        line: usize,
    ) -> Result<&'r str, ParseError> {
        self.optional(record, name).ok_or_else(|| ParseError::MissingField {
            line,
            field: name.to_string(),
        })
    }
}

fn parse_decimal(value: &str, field: &str, line: usize) -> Result<f64, ParseError> {
    value
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| ParseError::InvalidNumber {
            line,
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Whole, non-negative count. Accepts "8" and "8.0" (some exports write counts as floats).
fn parse_count(value: &str, field: &str, line: usize) -> Result<u32, ParseError> {
    let number = parse_decimal(value, field, line)?;
    if number.fract() != 0.0 || number > u32::MAX as f64 {
        return Err(ParseError::InvalidNumber {
            line,
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(number as u32)
}

fn parse_timestamp(value: &str, formats: &[&str], line: usize) -> Result<NaiveDateTime, ParseError> {
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    // Date-only values start the session at midnight
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }

    Err(ParseError::InvalidDate {
        line,
        value: value.to_string(),
    })
}

fn csv_reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(strip_bom(data))
}

/// Read every record of a CSV upload, mapping each to a SetRow (or None to skip it)
fn read_rows<F>(data: &[u8], required: &[&str], mut map_row: F) -> Result<Vec<SetRow>, ParseError>
where
    F: FnMut(&Columns, &StringRecord, usize) -> Result<Option<SetRow>, ParseError>,
{
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::Empty);
    }

    let mut reader = csv_reader(data);
    let headers = reader
        .headers()
        .map_err(|source| ParseError::Csv { line: 1, source })?
        .clone();
    let columns = Columns::from_headers(&headers, required)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|source| ParseError::Csv {
            line: idx + 2,
            source,
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        if let Some(row) = map_row(&columns, &record, line)? {
            rows.push(row);
        }
    }

    Ok(rows)
}

fn append_note(target: &mut Option<String>, note: &str) {
    match target {
        Some(existing) if existing.split("; ").any(|n| n == note) => {}
        Some(existing) => {
            existing.push_str("; ");
            existing.push_str(note);
        }
        None => *target = Some(note.to_string()),
    }
}

/// Last row seen in a source session, plus the shift applied to its current block
struct SessionCursor {
    previous: SetRow,
    shift: u32,
}

/// Group flat rows into one workout per calendar day.
///
/// Sets keep their source number. When a number is already taken for that exercise on that
/// day (a second session merged into the day, or a repeated exercise block), the whole block
/// is shifted to continue after the highest number used so far.
fn group_into_workouts(rows: Vec<SetRow>, grouping: &dyn SetGrouping) -> Vec<ParsedWorkout> {
    let mut workouts: Vec<ParsedWorkout> = Vec::new();
    let mut by_date: HashMap<NaiveDate, usize> = HashMap::new();
    let mut cursors: HashMap<String, SessionCursor> = HashMap::new();
    let mut used: HashMap<(NaiveDate, String), BTreeSet<u32>> = HashMap::new();

    for row in rows {
        let date = row.started_at.date();
        let idx = *by_date.entry(date).or_insert_with(|| {
            workouts.push(ParsedWorkout {
                date,
                notes: None,
                sets: Vec::new(),
            });
            workouts.len() - 1
        });
        let workout = &mut workouts[idx];

        let session = grouping.session_key(&row);
        let mut shift = match cursors.get(&session) {
            Some(cursor) if !grouping.opens_block(&cursor.previous, &row) => cursor.shift,
            Some(_) => 0,
            None => {
                // Workout-level notes repeat on every row of a session; take them once
                if let Some(notes) = &row.workout_notes {
                    append_note(&mut workout.notes, notes);
                }
                0
            }
        };

        let taken = used.entry((date, name_key(&row.exercise))).or_default();
        let mut set_number = row.source_set.saturating_add(shift);
        if taken.contains(&set_number) {
            let next = taken.iter().next_back().copied().unwrap_or(0).saturating_add(1);
            debug!(
                line = row.line,
                exercise = row.exercise.as_str(),
                from = set_number,
                to = next,
                "set number already used on this day, renumbering block"
            );
            shift = next - row.source_set;
            set_number = next;
        }
        taken.insert(set_number);

        workout.sets.push(ParsedWorkoutSet {
            exercise: row.exercise.clone(),
            set_number,
            reps: row.reps,
            rep_type: row.rep_type,
            weight: Some(row.weight),
            rpe: row.rpe,
            warmup: row.warmup,
            notes: row.notes.clone(),
        });

        cursors.insert(session, SessionCursor { previous: row, shift });
    }

    debug!(
        sessions = cursors.len(),
        workouts = workouts.len(),
        "grouped CSV rows into workouts"
    );

    workouts
}

fn exercises_from_workouts(workouts: &[ParsedWorkout]) -> Vec<ParsedExercise> {
    let file = ParsedFile {
        workouts: workouts.to_vec(),
        ..ParsedFile::default()
    };
    file.exercise_names()
        .iter()
        .map(|name| ParsedExercise::named(name))
        .collect()
}

// ============================================================================
// STRONG CSV
// ============================================================================

const STRONG_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Strong parser
///
/// One row per set. The `Date` column is the session start time; rows sharing it (and the
/// workout name) form one session. Strong does not record the unit, so the configured
/// default applies.
pub struct StrongCsvParser {
    unit: WeightUnit,
}

impl StrongCsvParser {
    pub fn new(unit: WeightUnit) -> Self {
        StrongCsvParser { unit }
    }

    fn map_row(
        &self,
        columns: &Columns,
        record: &StringRecord,
        line: usize,
    ) -> Result<Option<SetRow>, ParseError> {
        let set_order = columns.required(record, "Set Order", line)?;

        // Strong writes rest timers and notes as pseudo-sets
        if set_order.eq_ignore_ascii_case("rest timer") || set_order.eq_ignore_ascii_case("note") {
            return Ok(None);
        }
        let source_set = parse_count(set_order, "Set Order", line)?;
        if source_set == 0 {
            return Err(ParseError::InvalidNumber {
                line,
                field: "Set Order".to_string(),
                value: set_order.to_string(),
            });
        }

        let started_at = parse_timestamp(
            columns.required(record, "Date", line)?,
            STRONG_TIMESTAMP_FORMATS,
            line,
        )?;
        let exercise = columns.required(record, "Exercise Name", line)?.to_string();

        let weight = match columns.optional(record, "Weight") {
            Some(w) => parse_decimal(w, "Weight", line)?,
            None => 0.0,
        };
        let mut reps = parse_count(columns.required(record, "Reps", line)?, "Reps", line)?;
        let mut rep_type = RepType::Reps;

        // Timed sets have zero reps and a duration
        if reps == 0 {
            if let Some(seconds) = columns.optional(record, "Seconds") {
                let seconds = parse_decimal(seconds, "Seconds", line)?;
                if seconds > 0.0 {
                    reps = seconds.round() as u32;
                    rep_type = RepType::Seconds;
                }
            }
        }

        let rpe = columns
            .optional(record, "RPE")
            .map(|v| parse_decimal(v, "RPE", line))
            .transpose()?;

        Ok(Some(SetRow {
            line,
            source_set,
            started_at,
            session_title: columns
                .optional(record, "Workout Name")
                .unwrap_or("Workout")
                .to_string(),
            exercise,
            reps,
            rep_type,
            weight,
            rpe,
            warmup: false,
            notes: columns.optional(record, "Notes").map(str::to_string),
            workout_notes: columns.optional(record, "Workout Notes").map(str::to_string),
        }))
    }
}

/// A Strong session is one `Date` timestamp plus `Workout Name`; `Set Order` restarts
/// for every exercise.
impl SetGrouping for StrongCsvParser {
    fn session_key(&self, row: &SetRow) -> String {
        format!("{}|{}", row.started_at.format("%Y-%m-%d %H:%M:%S"), row.session_title)
    }

    fn opens_block(&self, previous: &SetRow, row: &SetRow) -> bool {
        name_key(&previous.exercise) != name_key(&row.exercise)
            || row.source_set <= previous.source_set
    }
}

impl FormatParser for StrongCsvParser {
    fn parse(&self, data: &[u8]) -> Result<ParsedFile, ParseError> {
        let rows = read_rows(
            data,
            &["Date", "Exercise Name", "Set Order", "Weight", "Reps"],
            |columns, record, line| self.map_row(columns, record, line),
        )?;

        let workouts = group_into_workouts(rows, self);

        Ok(ParsedFile {
            exercises: exercises_from_workouts(&workouts),
            equipment: Vec::new(),
            programs: Vec::new(),
            workouts,
            weight_unit: self.unit,
        })
    }

    fn format(&self) -> Format {
        Format::StrongCsv
    }
}

// ============================================================================
// HEVY CSV
// ============================================================================

const HEVY_TIMESTAMP_FORMATS: &[&str] = &[
    "%d %b %Y, %H:%M",
    "%e %b %Y, %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Hevy parser
///
/// One row per set, sessions identified by title + start_time. The unit is declared by the
/// weight column name (`weight_kg` or `weight_lbs`). `set_index` is zero-based.
pub struct HevyCsvParser {
    default_unit: WeightUnit,
}

impl HevyCsvParser {
    pub fn new(default_unit: WeightUnit) -> Self {
        HevyCsvParser { default_unit }
    }

    fn weight_column(columns: &Columns) -> Option<(&'static str, WeightUnit)> {
        if columns.has("weight_kg") {
            Some(("weight_kg", WeightUnit::Kg))
        } else if columns.has("weight_lbs") {
            Some(("weight_lbs", WeightUnit::Lb))
        } else {
            None
        }
    }

    fn map_row(
        columns: &Columns,
        record: &StringRecord,
        line: usize,
    ) -> Result<Option<SetRow>, ParseError> {
        let set_index = parse_count(columns.required(record, "set_index", line)?, "set_index", line)?;

        let started_at = parse_timestamp(
            columns.required(record, "start_time", line)?,
            HEVY_TIMESTAMP_FORMATS,
            line,
        )?;
        let exercise = columns.required(record, "exercise_title", line)?.to_string();
        let set_type = columns.optional(record, "set_type").unwrap_or("normal");

        let weight = match Self::weight_column(columns).and_then(|(c, _)| columns.optional(record, c)) {
            Some(w) => parse_decimal(w, "weight", line)?,
            None => 0.0,
        };

        let (reps, rep_type) = match columns.optional(record, "reps") {
            Some(r) => (parse_count(r, "reps", line)?, RepType::Reps),
            None => match columns.optional(record, "duration_seconds") {
                Some(d) => (
                    parse_decimal(d, "duration_seconds", line)?.round() as u32,
                    RepType::Seconds,
                ),
                None => {
                    return Err(ParseError::MissingField {
                        line,
                        field: "reps".to_string(),
                    })
                }
            },
        };

        let rpe = columns
            .optional(record, "rpe")
            .map(|v| parse_decimal(v, "rpe", line))
            .transpose()?;

        Ok(Some(SetRow {
            line,
            source_set: set_index.saturating_add(1),
            started_at,
            session_title: columns.required(record, "title", line)?.to_string(),
            exercise,
            reps,
            rep_type,
            weight,
            rpe,
            warmup: set_type.eq_ignore_ascii_case("warmup"),
            notes: columns.optional(record, "exercise_notes").map(str::to_string),
            workout_notes: columns.optional(record, "description").map(str::to_string),
        }))
    }
}

/// A Hevy session is `title` plus `start_time`. `set_index` goes back to 0 whenever a new
/// exercise block starts, even for an exercise already done earlier in the workout.
impl SetGrouping for HevyCsvParser {
    fn session_key(&self, row: &SetRow) -> String {
        format!("{}@{}", row.session_title, row.started_at.format("%Y-%m-%dT%H:%M"))
    }

    fn opens_block(&self, previous: &SetRow, row: &SetRow) -> bool {
        row.source_set == 1 || name_key(&previous.exercise) != name_key(&row.exercise)
    }
}

impl FormatParser for HevyCsvParser {
    fn parse(&self, data: &[u8]) -> Result<ParsedFile, ParseError> {
        let mut unit = self.default_unit;
        let rows = read_rows(
            data,
            &["title", "start_time", "exercise_title", "set_index", "set_type"],
            |columns, record, line| {
                if let Some((_, declared)) = Self::weight_column(columns) {
                    unit = declared;
                }
                Self::map_row(columns, record, line)
            },
        )?;

        let workouts = group_into_workouts(rows, self);

        Ok(ParsedFile {
            exercises: exercises_from_workouts(&workouts),
            equipment: Vec::new(),
            programs: Vec::new(),
            workouts,
            weight_unit: unit,
        })
    }

    fn format(&self) -> Format {
        Format::HevyCsv
    }
}

// ============================================================================
// CANONICAL JSON (RepLogJSON / CatalogJSON)
// ============================================================================

/// Canonical JSON parser. CatalogJSON never carries workouts; any present are dropped.
pub struct CanonicalJsonParser {
    format: Format,
}

impl CanonicalJsonParser {
    pub fn replog() -> Self {
        CanonicalJsonParser {
            format: Format::RepLogJson,
        }
    }

    pub fn catalog() -> Self {
        CanonicalJsonParser {
            format: Format::CatalogJson,
        }
    }
}

fn clean_name(name: &str, section: &str, index: usize) -> Result<String, ParseError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ParseError::InvalidEntry {
            section: section.to_string(),
            index,
            reason: "name is empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn program_from_canonical(program: CanonicalProgram, index: usize) -> Result<ParsedProgram, ParseError> {
    let template = program.template;
    let name = clean_name(&template.name, "programs", index)?;

    if template.num_weeks == 0 || template.num_days == 0 {
        return Err(ParseError::InvalidProgram {
            program: name,
            reason: "num_weeks and num_days must be at least 1".to_string(),
        });
    }

    let mut prescribed_sets = Vec::with_capacity(template.prescribed_sets.len());
    for (i, set) in template.prescribed_sets.into_iter().enumerate() {
        let invalid = |reason: &str| ParseError::InvalidPrescribedSet {
            program: name.clone(),
            index: i,
            reason: reason.to_string(),
        };

        let exercise = set.exercise.trim().to_string();
        if exercise.is_empty() {
            return Err(invalid("exercise is empty"));
        }
        if set.week == 0 || set.day == 0 || set.set_number == 0 {
            return Err(invalid("week, day and set_number start at 1"));
        }

        let load = Load::from_fields(set.percentage, set.absolute_weight)
            .ok_or_else(|| invalid("percentage and absolute_weight are mutually exclusive"))?;
        match load {
            Load::Percentage(p) if p <= 0.0 => return Err(invalid("percentage must be positive")),
            Load::AbsoluteWeight(w) if w < 0.0 => {
                return Err(invalid("absolute_weight cannot be negative"))
            }
            _ => {}
        }

        prescribed_sets.push(PrescribedSet {
            exercise,
            week: set.week,
            day: set.day,
            set_number: set.set_number,
            reps: set.reps,
            rep_type: set.rep_type,
            load,
            sort_order: set.sort_order,
            notes: set.notes.filter(|n| !n.trim().is_empty()),
        });
    }

    Ok(ParsedProgram {
        template: ProgramTemplate {
            name,
            num_weeks: template.num_weeks,
            num_days: template.num_days,
            is_loop: template.is_loop,
            description: template.description,
        },
        prescribed_sets,
    })
}

fn workouts_from_canonical(workouts: Vec<ParsedWorkout>) -> Result<Vec<ParsedWorkout>, ParseError> {
    let mut merged: Vec<ParsedWorkout> = Vec::new();

    for (index, mut workout) in workouts.into_iter().enumerate() {
        for set in workout.sets.iter_mut() {
            set.exercise = clean_name(&set.exercise, "workouts", index)?;
            if set.set_number == 0 {
                return Err(ParseError::InvalidEntry {
                    section: "workouts".to_string(),
                    index,
                    reason: "set_number starts at 1".to_string(),
                });
            }
        }

        // Two entries for one date collapse into one workout
        match merged.iter_mut().find(|w| w.date == workout.date) {
            Some(existing) => {
                if let Some(notes) = &workout.notes {
                    append_note(&mut existing.notes, notes);
                }
                existing.sets.extend(workout.sets);
            }
            None => merged.push(workout),
        }
    }

    Ok(merged)
}

impl FormatParser for CanonicalJsonParser {
    fn parse(&self, data: &[u8]) -> Result<ParsedFile, ParseError> {
        let data = strip_bom(data);
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::Empty);
        }

        let document: CanonicalDocument = serde_json::from_slice(data)?;

        let exercises = document
            .exercises
            .into_iter()
            .enumerate()
            .map(|(i, mut e)| {
                e.name = clean_name(&e.name, "exercises", i)?;
                Ok(e)
            })
            .collect::<Result<Vec<ParsedExercise>, ParseError>>()?;

        let equipment = document
            .equipment
            .into_iter()
            .enumerate()
            .map(|(i, mut e)| {
                e.name = clean_name(&e.name, "equipment", i)?;
                Ok(e)
            })
            .collect::<Result<Vec<ParsedEquipment>, ParseError>>()?;

        let programs = document
            .programs
            .into_iter()
            .enumerate()
            .map(|(i, p)| program_from_canonical(p, i))
            .collect::<Result<Vec<ParsedProgram>, ParseError>>()?;

        let workouts = match (self.format, document.workouts) {
            (Format::RepLogJson, Some(workouts)) => workouts_from_canonical(workouts)?,
            (_, Some(workouts)) if !workouts.is_empty() => {
                warn!(
                    dropped = workouts.len(),
                    "catalog import ignores workouts present in the document"
                );
                Vec::new()
            }
            _ => Vec::new(),
        };

        Ok(ParsedFile {
            exercises,
            equipment,
            programs,
            workouts,
            weight_unit: document.weight_unit,
        })
    }

    fn format(&self) -> Format {
        self.format
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const STRONG: &[u8] = include_bytes!("../fixtures/strong_sample.csv");
    const HEVY: &[u8] = include_bytes!("../fixtures/hevy_sample.csv");
    const REPLOG: &[u8] = include_bytes!("../fixtures/replog_sample.json");
    const CATALOG: &[u8] = include_bytes!("../fixtures/catalog_sample.json");

    const STRONG_HEADER: &str =
        "Date,Workout Name,Duration,Exercise Name,Set Order,Weight,Reps,Distance,Seconds,Notes,Workout Notes,RPE\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_get_parser_formats() {
        let options = ParserOptions::default();
        for format in [Format::StrongCsv, Format::HevyCsv, Format::RepLogJson, Format::CatalogJson] {
            assert_eq!(get_parser(format, &options).format(), format);
        }
    }

    // ============================================================================
    // Strong
    // ============================================================================

    #[test]
    fn test_strong_parse_fixture() {
        let parsed = StrongCsvParser::new(WeightUnit::Lb).parse(STRONG).unwrap();

        assert_eq!(parsed.weight_unit, WeightUnit::Lb);
        assert_eq!(parsed.workouts.len(), 2);
        assert!(parsed.programs.is_empty());

        let names: Vec<&str> = parsed.exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bench Press", "Squat", "Plank"]);

        let first = &parsed.workouts[0];
        assert_eq!(first.date, date(2024, 3, 4));
        // Rest timer row is skipped
        assert_eq!(first.sets.len(), 4);
        assert_eq!(first.sets[1].set_number, 2);
        assert_eq!(first.sets[1].weight, Some(155.0));
        assert_eq!(first.sets[2].exercise, "Squat");
        assert_eq!(first.sets[2].set_number, 1);
        assert_eq!(first.sets[2].notes.as_deref(), Some("Felt strong"));
        assert_eq!(first.sets[3].rpe, Some(8.5));
        assert_eq!(first.notes, None);

        let second = &parsed.workouts[1];
        assert_eq!(second.notes.as_deref(), Some("Knees sore"));
        let plank = &second.sets[1];
        assert_eq!(plank.rep_type, RepType::Seconds);
        assert_eq!(plank.reps, 60);
        assert_eq!(plank.weight, Some(0.0));

        println!("✅ Strong fixture parsed: {} workouts", parsed.workouts.len());
    }

    #[test]
    fn test_strong_uses_configured_unit() {
        let parsed = StrongCsvParser::new(WeightUnit::Kg).parse(STRONG).unwrap();
        assert_eq!(parsed.weight_unit, WeightUnit::Kg);
    }

    #[test]
    fn test_strong_merges_sessions_on_same_day() {
        let csv = format!(
            "{}{}{}{}",
            STRONG_HEADER,
            "2024-05-01 06:00:00,AM,30m,Squat,1,200,5,0,0,,Early,\n",
            "2024-05-01 06:00:00,AM,30m,Squat,2,200,5,0,0,,Early,\n",
            "2024-05-01 18:00:00,PM,30m,Squat,1,150,10,0,0,,Late,\n",
        );

        let parsed = StrongCsvParser::new(WeightUnit::Lb).parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.workouts.len(), 1);
        let sets = &parsed.workouts[0].sets;
        let numbers: Vec<u32> = sets.iter().map(|s| s.set_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(parsed.workouts[0].notes.as_deref(), Some("Early; Late"));
    }

    #[test]
    fn test_strong_keeps_set_order() {
        let csv = format!(
            "{}{}{}",
            STRONG_HEADER,
            "2024-05-01 06:00:00,AM,30m,Squat,3,200,5,0,0,,,\n",
            "2024-05-01 06:00:00,AM,30m,Squat,4,200,5,0,0,,,\n",
        );

        let parsed = StrongCsvParser::new(WeightUnit::Lb).parse(csv.as_bytes()).unwrap();

        let numbers: Vec<u32> = parsed.workouts[0].sets.iter().map(|s| s.set_number).collect();
        assert_eq!(numbers, vec![3, 4]);
    }

    #[test]
    fn test_strong_repeated_exercise_block_continues_numbering() {
        let csv = format!(
            "{}{}{}{}{}",
            STRONG_HEADER,
            "2024-05-01 06:00:00,AM,30m,Squat,1,200,5,0,0,,,\n",
            "2024-05-01 06:00:00,AM,30m,Squat,2,200,5,0,0,,,\n",
            "2024-05-01 06:00:00,AM,30m,Lunge,1,50,10,0,0,,,\n",
            "2024-05-01 06:00:00,AM,30m,Squat,1,150,8,0,0,,,\n",
        );

        let parsed = StrongCsvParser::new(WeightUnit::Lb).parse(csv.as_bytes()).unwrap();

        let sets = &parsed.workouts[0].sets;
        let squats: Vec<u32> = sets
            .iter()
            .filter(|s| s.exercise == "Squat")
            .map(|s| s.set_number)
            .collect();
        assert_eq!(squats, vec![1, 2, 3]);
        assert_eq!(sets[2].set_number, 1);
    }

    #[test]
    fn test_strong_zero_set_order_rejected() {
        let csv = format!("{}{}", STRONG_HEADER, "2024-05-01 06:00:00,AM,30m,Squat,0,200,5,0,0,,,\n");

        let err = StrongCsvParser::new(WeightUnit::Lb)
            .parse(csv.as_bytes())
            .unwrap_err();

        assert!(matches!(err, ParseError::InvalidNumber { line: 2, ref field, .. } if field == "Set Order"));
    }

    #[test]
    fn test_strong_tolerates_extra_columns() {
        let csv = "Date,Workout Name,Duration,Exercise Name,Set Order,Weight,Reps,Distance,Seconds,Notes,Workout Notes,RPE,Tempo\n\
                   2024-05-01 06:00:00,AM,30m,Squat,1,200,5,0,0,,,,3-1-1\n";

        let parsed = StrongCsvParser::new(WeightUnit::Lb).parse(csv.as_bytes()).unwrap();
        assert_eq!(parsed.workouts[0].sets.len(), 1);
    }

    #[test]
    fn test_strong_invalid_weight_reports_line() {
        let csv = format!(
            "{}{}{}",
            STRONG_HEADER,
            "2024-05-01 06:00:00,AM,30m,Squat,1,200,5,0,0,,,\n",
            "2024-05-01 06:00:00,AM,30m,Squat,2,heavy,5,0,0,,,\n",
        );

        let err = StrongCsvParser::new(WeightUnit::Lb)
            .parse(csv.as_bytes())
            .unwrap_err();

        match err {
            ParseError::InvalidNumber { line, field, value } => {
                assert_eq!(line, 3);
                assert_eq!(field, "Weight");
                assert_eq!(value, "heavy");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_strong_invalid_date() {
        let csv = format!("{}{}", STRONG_HEADER, "05/01/2024,AM,30m,Squat,1,200,5,0,0,,,\n");

        let err = StrongCsvParser::new(WeightUnit::Lb)
            .parse(csv.as_bytes())
            .unwrap_err();

        assert!(matches!(err, ParseError::InvalidDate { line: 2, .. }));
    }

    #[test]
    fn test_strong_missing_exercise_name() {
        let csv = format!("{}{}", STRONG_HEADER, "2024-05-01 06:00:00,AM,30m,,1,200,5,0,0,,,\n");

        let err = StrongCsvParser::new(WeightUnit::Lb)
            .parse(csv.as_bytes())
            .unwrap_err();

        match err {
            ParseError::MissingField { line, field } => {
                assert_eq!(line, 2);
                assert_eq!(field, "Exercise Name");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_strong_missing_required_column() {
        let csv = "Date,Workout Name,Duration,Exercise Name,Set Order,Weight\n2024-05-01 06:00:00,AM,30m,Squat,1,200\n";

        let err = StrongCsvParser::new(WeightUnit::Lb)
            .parse(csv.as_bytes())
            .unwrap_err();

        assert!(matches!(err, ParseError::MissingField { line: 1, ref field } if field == "Reps"));
    }

    #[test]
    fn test_strong_fractional_reps_rejected() {
        let csv = format!("{}{}", STRONG_HEADER, "2024-05-01 06:00:00,AM,30m,Squat,1,200,5.5,0,0,,,\n");

        let err = StrongCsvParser::new(WeightUnit::Lb)
            .parse(csv.as_bytes())
            .unwrap_err();

        assert!(matches!(err, ParseError::InvalidNumber { line: 2, .. }));
    }

    #[test]
    fn test_empty_csv() {
        let err = StrongCsvParser::new(WeightUnit::Lb).parse(b"  \n").unwrap_err();
        assert!(matches!(err, ParseError::Empty));
    }

    // ============================================================================
    // Hevy
    // ============================================================================

    #[test]
    fn test_hevy_parse_fixture() {
        let parsed = HevyCsvParser::new(WeightUnit::Lb).parse(HEVY).unwrap();

        assert_eq!(parsed.weight_unit, WeightUnit::Kg);
        assert_eq!(parsed.workouts.len(), 2);

        let names: Vec<&str> = parsed.exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Bench Press (Barbell)", "Pull Up", "Squat (Barbell)", "Plank"]
        );

        let upper = &parsed.workouts[0];
        assert_eq!(upper.date, date(2024, 3, 4));
        assert!(upper.sets[0].warmup);
        assert!(!upper.sets[1].warmup);
        assert_eq!(upper.sets[1].set_number, 2);
        assert_eq!(upper.sets[1].rpe, Some(8.0));
        assert_eq!(upper.sets[2].weight, Some(0.0));
        assert_eq!(upper.notes, None);

        let lower = &parsed.workouts[1];
        assert_eq!(lower.notes.as_deref(), Some("Legs"));
        assert_eq!(lower.sets[0].notes.as_deref(), Some("Belt on"));
        let plank = &lower.sets[2];
        assert_eq!(plank.rep_type, RepType::Seconds);
        assert_eq!(plank.reps, 45);

        println!("✅ Hevy fixture parsed: {} workouts", parsed.workouts.len());
    }

    #[test]
    fn test_hevy_pounds_column() {
        let csv = "title,start_time,end_time,description,exercise_title,superset_id,exercise_notes,set_index,set_type,weight_lbs,reps\n\
                   Day,\"1 Apr 2024, 10:00\",\"1 Apr 2024, 11:00\",,Row,,,0,normal,135,8\n";

        let parsed = HevyCsvParser::new(WeightUnit::Kg).parse(csv.as_bytes()).unwrap();
        assert_eq!(parsed.weight_unit, WeightUnit::Lb);
        assert_eq!(parsed.workouts[0].sets[0].weight, Some(135.0));
    }

    const HEVY_HEADER: &str =
        "title,start_time,end_time,description,exercise_title,superset_id,exercise_notes,set_index,set_type,weight_kg,reps\n";

    #[test]
    fn test_hevy_set_index_becomes_set_number() {
        let csv = format!(
            "{}{}",
            HEVY_HEADER,
            "Day,\"1 Apr 2024, 10:00\",\"1 Apr 2024, 11:00\",,Row,,,3,normal,60,8\n",
        );

        let parsed = HevyCsvParser::new(WeightUnit::Kg).parse(csv.as_bytes()).unwrap();
        assert_eq!(parsed.workouts[0].sets[0].set_number, 4);
    }

    #[test]
    fn test_hevy_same_exercise_in_two_blocks() {
        let csv = format!(
            "{}{}{}{}{}{}",
            HEVY_HEADER,
            "Push,\"1 Apr 2024, 10:00\",\"1 Apr 2024, 11:00\",,Bench Press,,,0,warmup,40,10\n",
            "Push,\"1 Apr 2024, 10:00\",\"1 Apr 2024, 11:00\",,Bench Press,,,1,normal,80,5\n",
            "Push,\"1 Apr 2024, 10:00\",\"1 Apr 2024, 11:00\",,Dip,,,0,normal,0,12\n",
            "Push,\"1 Apr 2024, 10:00\",\"1 Apr 2024, 11:00\",,Bench Press,,,0,normal,60,12\n",
            "Push,\"1 Apr 2024, 10:00\",\"1 Apr 2024, 11:00\",,Bench Press,,,1,normal,60,12\n",
        );

        let parsed = HevyCsvParser::new(WeightUnit::Kg).parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.workouts.len(), 1);
        let sets = &parsed.workouts[0].sets;
        let bench: Vec<u32> = sets
            .iter()
            .filter(|s| s.exercise == "Bench Press")
            .map(|s| s.set_number)
            .collect();
        assert_eq!(bench, vec![1, 2, 3, 4]);
        assert_eq!(sets[2].exercise, "Dip");
        assert_eq!(sets[2].set_number, 1);
        assert_eq!(sets[3].weight, Some(60.0));

        println!("✅ Repeated Hevy block numbered 1..4");
    }

    #[test]
    fn test_hevy_two_sessions_same_day_merge() {
        let csv = format!(
            "{}{}{}",
            HEVY_HEADER,
            "Morning,\"1 Apr 2024, 07:00\",\"1 Apr 2024, 08:00\",,Row,,,0,normal,60,8\n",
            "Evening,\"1 Apr 2024, 18:00\",\"1 Apr 2024, 19:00\",,Row,,,0,normal,50,10\n",
        );

        let parsed = HevyCsvParser::new(WeightUnit::Kg).parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.workouts.len(), 1);
        let numbers: Vec<u32> = parsed.workouts[0].sets.iter().map(|s| s.set_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_hevy_missing_reps_and_duration() {
        let csv = "title,start_time,end_time,description,exercise_title,superset_id,exercise_notes,set_index,set_type,weight_kg,reps,duration_seconds\n\
                   Day,\"1 Apr 2024, 10:00\",\"1 Apr 2024, 11:00\",,Row,,,0,normal,60,,\n";

        let err = HevyCsvParser::new(WeightUnit::Kg)
            .parse(csv.as_bytes())
            .unwrap_err();

        assert!(matches!(err, ParseError::MissingField { line: 2, ref field } if field == "reps"));
    }

    // ============================================================================
    // Canonical JSON
    // ============================================================================

    #[test]
    fn test_replog_parse_fixture() {
        let parsed = CanonicalJsonParser::replog().parse(REPLOG).unwrap();

        assert_eq!(parsed.exercises.len(), 3);
        assert_eq!(parsed.exercises[0].rest_seconds, Some(180));
        assert_eq!(parsed.equipment.len(), 2);
        assert_eq!(parsed.programs.len(), 1);
        assert_eq!(parsed.workouts.len(), 2);

        let program = &parsed.programs[0];
        assert_eq!(program.template.name, "Starter 5/3/1");
        assert!(program.template.is_loop);
        assert_eq!(program.prescribed_sets.len(), 5);
        assert_eq!(program.prescribed_sets[0].load, Load::Percentage(65.0));
        assert!(program.prescribed_sets[2].is_amrap());
        assert_eq!(program.prescribed_sets[3].load, Load::AbsoluteWeight(95.0));
        assert_eq!(program.prescribed_sets[4].load, Load::Bodyweight);

        assert_eq!(parsed.workouts[1].sets[1].weight, None);
    }

    #[test]
    fn test_catalog_parse_fixture() {
        let parsed = CanonicalJsonParser::catalog().parse(CATALOG).unwrap();

        assert_eq!(parsed.exercises.len(), 3);
        assert_eq!(parsed.programs[0].prescribed_sets.len(), 4);
        assert!(parsed.workouts.is_empty());
    }

    #[test]
    fn test_catalog_parser_drops_workouts() {
        let parsed = CanonicalJsonParser::catalog().parse(REPLOG).unwrap();
        assert!(parsed.workouts.is_empty());
        assert_eq!(parsed.programs.len(), 1);
    }

    #[test]
    fn test_json_both_loads_rejected() {
        let json = br#"{"programs":[{"template":{"name":"P","num_weeks":1,"num_days":1,"prescribed_sets":[
            {"exercise":"Squat","week":1,"day":1,"set_number":1,"reps":5,"rep_type":"reps","percentage":70,"absolute_weight":100}
        ]}}]}"#;

        let err = CanonicalJsonParser::catalog().parse(json).unwrap_err();

        match err {
            ParseError::InvalidPrescribedSet { program, index, .. } => {
                assert_eq!(program, "P");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_json_zero_weeks_rejected() {
        let json = br#"{"programs":[{"template":{"name":"P","num_weeks":0,"num_days":1}}]}"#;
        let err = CanonicalJsonParser::catalog().parse(json).unwrap_err();
        assert!(matches!(err, ParseError::InvalidProgram { .. }));
    }

    #[test]
    fn test_json_syntax_error_has_position() {
        let json = b"{\n  \"exercises\": [\n    {\"name\": }\n  ]\n}";
        let err = CanonicalJsonParser::replog().parse(json).unwrap_err();
        assert!(matches!(err, ParseError::Json { line: 3, .. }));
    }

    #[test]
    fn test_json_empty_exercise_name_rejected() {
        let json = br#"{"exercises":[{"name":"Squat"},{"name":"  "}]}"#;
        let err = CanonicalJsonParser::catalog().parse(json).unwrap_err();
        assert!(matches!(err, ParseError::InvalidEntry { index: 1, .. }));
    }

    #[test]
    fn test_json_same_date_workouts_merge() {
        let json = br#"{"workouts":[
            {"date":"2024-01-01","sets":[{"exercise":"Squat","set_number":1,"reps":5,"weight":100}]},
            {"date":"2024-01-01","sets":[{"exercise":"Squat","set_number":2,"reps":5,"weight":100}]}
        ]}"#;

        let parsed = CanonicalJsonParser::replog().parse(json).unwrap();
        assert_eq!(parsed.workouts.len(), 1);
        assert_eq!(parsed.workouts[0].sets.len(), 2);
    }
}
