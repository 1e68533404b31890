// Error types for the import pipeline
//
// ParseError  - malformed input, always aborts the whole parse
// StoreError  - storage collaborator failures (row-level or catastrophic)
// ImportError - what the workflow surfaces to its caller
// ExportError - export failures (storage or output sink)

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("input is empty")]
    Empty,

    #[error("failed to read CSV line {line}: {source}")]
    Csv {
        line: usize,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: missing required field '{field}'")]
    MissingField { line: usize, field: String },

    #[error("line {line}: invalid number '{value}' in field '{field}'")]
    InvalidNumber {
        line: usize,
        field: String,
        value: String,
    },

    #[error("line {line}: invalid date '{value}'")]
    InvalidDate { line: usize, value: String },

    #[error("invalid JSON at line {line}, column {column}: {message}")]
    Json {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("program '{program}', prescribed set {index}: {reason}")]
    InvalidPrescribedSet {
        program: String,
        index: usize,
        reason: String,
    },

    #[error("program '{program}': {reason}")]
    InvalidProgram { program: String, reason: String },

    #[error("{section}[{index}]: {reason}")]
    InvalidEntry {
        section: String,
        index: usize,
        reason: String,
    },
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Json {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Constraint violations are scoped to one row; the import keeps going.
    /// Anything else means the store itself is unusable.
    pub fn is_row_level(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("could not detect the file format; choose a format manually")]
    UnknownFormat,

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: usize, limit: usize },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("import session '{0}' not found or expired")]
    SessionNotFound(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
