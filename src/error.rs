/// Errors raised by the engine itself.
///
/// Row-level data problems never surface here; they are collected into a
/// [`crate::models::ValidationReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid scale: {0}")]
    InvalidScale(String),

    #[error("Invalid midpoint: {0}")]
    InvalidMidpoint(String),

    #[error("Required column '{0}' not found in the imported headers")]
    MissingColumn(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported date format '{0}'. Must be one of: DD/MM/YYYY, MM/DD/YYYY, YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("No record at position {0}")]
    RecordNotFound(usize),

    #[error("Identifier sequence '{0}' has no values left")]
    IdSequenceExhausted(String),

    #[error("Duplicate of record '{id}' (matched on {reason})")]
    Duplicate { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
