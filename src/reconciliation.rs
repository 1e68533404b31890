// 🔗 Catalog reconciliation
// Maps every parsed entity name onto the coach's catalog and keeps the user's overrides.
//
// Matching is deliberately plain: case-insensitive exact name, otherwise create.
// Anything smarter is left to the human in the mapping-edit step.

use crate::detect::Format;
use crate::error::StoreResult;
use crate::model::{name_key, ParsedFile, WeightUnit};
use crate::store::CatalogStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

// ============================================================================
// ENTITY KINDS & CATALOG SNAPSHOTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Exercise,
    Equipment,
    Program,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Exercise, EntityKind::Equipment, EntityKind::Program];

    /// Prefix used in mapping-edit keys (`exercise_0`, `program_2`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Exercise => "exercise",
            EntityKind::Equipment => "equipment",
            EntityKind::Program => "program",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<EntityKind> {
        match prefix {
            "exercise" | "exercises" => Some(EntityKind::Exercise),
            "equipment" => Some(EntityKind::Equipment),
            "program" | "programs" => Some(EntityKind::Program),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{id, name}` of a catalog row at the time it was read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingEntity {
    pub id: i64,
    pub name: String,
}

/// Catalog as seen when a mapping is built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    pub exercises: Vec<ExistingEntity>,
    pub equipment: Vec<ExistingEntity>,
    pub programs: Vec<ExistingEntity>,
}

impl CatalogSnapshot {
    pub fn load<C: CatalogStore + ?Sized>(catalog: &C) -> StoreResult<Self> {
        Ok(CatalogSnapshot {
            exercises: catalog.list(EntityKind::Exercise)?,
            equipment: catalog.list(EntityKind::Equipment)?,
            programs: catalog.list(EntityKind::Program)?,
        })
    }

    pub fn entities(&self, kind: EntityKind) -> &[ExistingEntity] {
        match kind {
            EntityKind::Exercise => &self.exercises,
            EntityKind::Equipment => &self.equipment,
            EntityKind::Program => &self.programs,
        }
    }
}

// ============================================================================
// ENTITY MAPPING
// ============================================================================

/// Reconciliation record for one distinct parsed name.
/// `mapped_id == 0` together with `create == true` means a new catalog row will be made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub parsed_name: String,
    pub mapped_id: i64,
    pub mapped_name: String,
    pub create: bool,
}

impl EntityMapping {
    fn to_create(parsed_name: &str) -> Self {
        EntityMapping {
            parsed_name: parsed_name.to_string(),
            mapped_id: 0,
            mapped_name: String::new(),
            create: true,
        }
    }

    fn to_existing(parsed_name: &str, existing: &ExistingEntity) -> Self {
        EntityMapping {
            parsed_name: parsed_name.to_string(),
            mapped_id: existing.id,
            mapped_name: existing.name.clone(),
            create: false,
        }
    }

    /// Points at an existing catalog row
    pub fn is_mapped(&self) -> bool {
        !self.create && self.mapped_id > 0
    }
}

/// Build one mapping per distinct name (case-insensitive, first casing kept).
///
/// Pure: the same names and snapshot always give the same result. When the catalog
/// itself holds duplicate names, the lowest id wins.
pub fn build_mappings(names: &[String], catalog: &[ExistingEntity]) -> Vec<EntityMapping> {
    let mut by_name: HashMap<String, &ExistingEntity> = HashMap::new();
    for entity in catalog {
        by_name
            .entry(name_key(&entity.name))
            .and_modify(|current| {
                if entity.id < current.id {
                    *current = entity;
                }
            })
            .or_insert(entity);
    }

    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && seen.insert(name_key(n)))
        .map(|name| match by_name.get(&name_key(name)) {
            Some(existing) => EntityMapping::to_existing(name, existing),
            None => EntityMapping::to_create(name),
        })
        .collect()
}

// ============================================================================
// MAPPING STATE
// ============================================================================

/// Editable, session-persisted reconciliation of one upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingState {
    pub format: Format,
    pub weight_unit: WeightUnit,
    pub parsed: ParsedFile,
    pub exercises: Vec<EntityMapping>,
    pub equipment: Vec<EntityMapping>,
    pub programs: Vec<EntityMapping>,

    /// SHA-256 of the uploaded bytes
    pub source_hash: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one mapping-edit submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditOutcome {
    pub applied: usize,
    pub ignored: usize,
}

impl MappingState {
    /// Build the initial mapping for a freshly parsed upload
    pub fn build(format: Format, parsed: ParsedFile, catalog: &CatalogSnapshot, source: &[u8]) -> Self {
        let exercises = build_mappings(&parsed.exercise_names(), &catalog.exercises);
        let equipment = build_mappings(&parsed.equipment_names(), &catalog.equipment);
        let programs = build_mappings(&parsed.program_names(), &catalog.programs);

        let state = MappingState {
            format,
            weight_unit: parsed.weight_unit,
            parsed,
            exercises,
            equipment,
            programs,
            source_hash: fingerprint(source),
            filename: None,
            created_at: Utc::now(),
        };

        for kind in EntityKind::ALL {
            let mappings = state.mappings(kind);
            info!(
                kind = kind.as_str(),
                total = mappings.len(),
                to_create = mappings.iter().filter(|m| m.create).count(),
                "built mapping"
            );
        }

        state
    }

    pub fn with_filename(mut self, filename: Option<&str>) -> Self {
        self.filename = filename.map(str::to_string);
        self
    }

    pub fn mappings(&self, kind: EntityKind) -> &[EntityMapping] {
        match kind {
            EntityKind::Exercise => &self.exercises,
            EntityKind::Equipment => &self.equipment,
            EntityKind::Program => &self.programs,
        }
    }

    fn mappings_mut(&mut self, kind: EntityKind) -> &mut Vec<EntityMapping> {
        match kind {
            EntityKind::Exercise => &mut self.exercises,
            EntityKind::Equipment => &mut self.equipment,
            EntityKind::Program => &mut self.programs,
        }
    }

    /// Mapping entry for a parsed name (case-insensitive)
    pub fn mapping_for(&self, kind: EntityKind, name: &str) -> Option<&EntityMapping> {
        let key = name_key(name);
        self.mappings(kind)
            .iter()
            .find(|m| name_key(&m.parsed_name) == key)
    }

    /// Apply a sparse `{kind}_{index} -> "create" | id` edit map.
    ///
    /// Lenient merge: unknown keys, out-of-range indexes and unparseable or zero values
    /// are ignored and leave the entry untouched. Numeric ids are re-resolved against the
    /// catalog; an id that no longer exists is kept with an empty `mapped_name` and
    /// surfaces later as a preview warning and an execute-time row error.
    pub fn apply_edits<C: CatalogStore + ?Sized>(
        &mut self,
        edits: &[(String, String)],
        catalog: &C,
    ) -> StoreResult<EditOutcome> {
        let mut outcome = EditOutcome::default();

        for (key, value) in edits {
            let target = parse_edit_key(key)
                .filter(|(kind, index)| *index < self.mappings(*kind).len());

            let Some((kind, index)) = target else {
                debug!(key = key.as_str(), "ignoring edit for unknown mapping entry");
                outcome.ignored += 1;
                continue;
            };

            match parse_edit_value(value) {
                Some(EditValue::Create) => {
                    let entry = &mut self.mappings_mut(kind)[index];
                    entry.mapped_id = 0;
                    entry.mapped_name.clear();
                    entry.create = true;
                    debug!(kind = kind.as_str(), name = entry.parsed_name.as_str(), "mapping set to create");
                }
                Some(EditValue::Existing(id)) => {
                    let mapped_name = catalog
                        .find(kind, id)?
                        .map(|e| e.name)
                        .unwrap_or_default();
                    let entry = &mut self.mappings_mut(kind)[index];
                    entry.mapped_id = id;
                    entry.mapped_name = mapped_name;
                    entry.create = false;
                    debug!(
                        kind = kind.as_str(),
                        name = entry.parsed_name.as_str(),
                        mapped_id = id,
                        stale = entry.mapped_name.is_empty(),
                        "mapping set to existing"
                    );
                }
                None => {
                    debug!(key = key.as_str(), value = value.as_str(), "ignoring unparseable edit value");
                    outcome.ignored += 1;
                    continue;
                }
            }

            outcome.applied += 1;
        }

        info!(applied = outcome.applied, ignored = outcome.ignored, "applied mapping edits");
        Ok(outcome)
    }
}

enum EditValue {
    Create,
    Existing(i64),
}

fn parse_edit_key(key: &str) -> Option<(EntityKind, usize)> {
    let (prefix, index) = key.trim().rsplit_once('_')?;
    Some((EntityKind::from_prefix(prefix)?, index.parse().ok()?))
}

fn parse_edit_value(value: &str) -> Option<EditValue> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("create") {
        return Some(EditValue::Create);
    }
    match value.parse::<i64>() {
        Ok(id) if id > 0 => Some(EditValue::Existing(id)),
        _ => None,
    }
}

/// Hex SHA-256 of the uploaded bytes
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================
