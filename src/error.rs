//! Error types for the field serialization engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SerError>;

#[derive(Error, Debug)]
pub enum SerError {
    #[error("field '{0}' is not registered")]
    UnknownField(String),

    #[error("field '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("field '{name}' re-registered with a conflicting shape: {detail}")]
    SchemaConflict { name: String, detail: String },

    #[error("savepoint {0} is already present in the offset table")]
    DuplicateSavepoint(String),

    #[error("savepoint {0} is not known to the offset table")]
    UnknownSavepoint(String),

    #[error("requested savepoint id {requested} does not match assigned id {assigned}")]
    IdMismatch { requested: i64, assigned: usize },

    #[error("field '{field}' is already serialized at savepoint {savepoint}")]
    DuplicateFieldAtSavepoint { field: String, savepoint: String },

    #[error("field '{field}' was not serialized at savepoint {savepoint}")]
    FieldNotAtSavepoint { field: String, savepoint: String },

    #[error("field '{field}' was never serialized before savepoint {savepoint}")]
    NeverSerialized { field: String, savepoint: String },

    #[error("operation not permitted in the engine's current mode")]
    WrongMode,

    #[error("metainfo key '{0}' already exists")]
    DuplicateKey(String),

    #[error("metainfo key '{0}' is not present")]
    MissingKey(String),

    #[error("metainfo key '{key}' does not hold the requested type")]
    TypeMismatch { key: String },

    #[error("value for key '{0}' cannot be represented exactly as the requested type")]
    NotExact(String),

    #[error("could not parse value for key '{0}'")]
    ParseError(String),

    #[error("index file is malformed: {0}")]
    MalformedIndex(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SerError {
    /// Stable short code, useful for diagnostics and test assertions.
    pub fn code(&self) -> &'static str {
        match self {
            SerError::UnknownField(_) => "UNKNOWN_FIELD",
            SerError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            SerError::SchemaConflict { .. } => "SCHEMA_CONFLICT",
            SerError::DuplicateSavepoint(_) => "DUPLICATE_SAVEPOINT",
            SerError::UnknownSavepoint(_) => "UNKNOWN_SAVEPOINT",
            SerError::IdMismatch { .. } => "ID_MISMATCH",
            SerError::DuplicateFieldAtSavepoint { .. } => "DUPLICATE_FIELD_AT_SAVEPOINT",
            SerError::FieldNotAtSavepoint { .. } => "FIELD_NOT_AT_SAVEPOINT",
            SerError::NeverSerialized { .. } => "NEVER_SERIALIZED",
            SerError::WrongMode => "WRONG_MODE",
            SerError::DuplicateKey(_) => "DUPLICATE_KEY",
            SerError::MissingKey(_) => "MISSING_KEY",
            SerError::TypeMismatch { .. } => "TYPE_MISMATCH",
            SerError::NotExact(_) => "NOT_EXACT",
            SerError::ParseError(_) => "PARSE_ERROR",
            SerError::MalformedIndex(_) => "MALFORMED_INDEX",
            SerError::Io(_) => "IO",
            SerError::Json(_) => "JSON",
        }
    }

    /// True for the one class of error the distilled spec says is unrecoverable:
    /// a corrupted on-disk index. The engine's open path turns this into a hard exit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SerError::MalformedIndex(_))
    }
}
