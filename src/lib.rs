// RepLog - catalog reconciliation and import/export pipeline
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod executor;
pub mod export;
pub mod logging;
pub mod model;
pub mod parser;
pub mod preview;
pub mod reconciliation;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use config::{CliOverrides, ImportConfig};
pub use db::{setup_database, SqliteSessionStore, SqliteStore, TableCounts};
pub use detect::{detect, Format};
pub use error::{ExportError, ImportError, ParseError, StoreError, StoreResult};
pub use executor::{execute_import, ImportContext, ImportResult, KindResult, RowError};
pub use export::{collect_export, export_json, export_strong_csv, to_document};
pub use model::{
    CanonicalDocument, Load, ParsedCounts, ParsedEquipment, ParsedExercise, ParsedFile,
    ParsedProgram, ParsedWorkout, ParsedWorkoutSet, PrescribedSet, ProgramTemplate, RepType,
    WeightUnit,
};
pub use parser::{
    get_parser, parse, CanonicalJsonParser, FormatParser, HevyCsvParser, ParserOptions,
    SetGrouping, StrongCsvParser,
};
pub use preview::{build_preview, KindPreview, Preview, PreviewWarning};
pub use reconciliation::{
    build_mappings, CatalogSnapshot, EditOutcome, EntityKind, EntityMapping, ExistingEntity,
    MappingState,
};
pub use store::{
    AuditAction, CatalogStore, ImportEvent, MemorySessionStore, SessionStore, Transactional,
    WorkoutStore,
};
pub use workflow::{ImportWorkflow, Upload};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
