use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid schedule: start {start} is not before end {end}")]
    InvalidSchedule {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Short error code string returned to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::InvalidSchedule { .. } => "INVALID_SCHEDULE",
            CoreError::MissingField(_) => "MISSING_FIELD",
            CoreError::Serialization(_) => "SERIALIZATION_ERROR",
            CoreError::Io(_) => "IO_ERROR",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error is a caller-side precondition violation.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidSchedule { .. } | CoreError::MissingField(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
