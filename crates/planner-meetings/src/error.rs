use planner_conferencing::{ConferencingError, NotifyError};
use planner_core::{CoreError, MeetingId};
use thiserror::Error;

/// Errors that can occur during meeting operations.
#[derive(Debug, Error)]
pub enum MeetingError {
    /// The requested meeting does not exist in the store.
    #[error("meeting not found: {id}")]
    NotFound { id: MeetingId },

    /// The meeting violates a precondition (inverted times, missing title).
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The conferencing provider rejected or failed a call.
    #[error("conferencing error: {0}")]
    Conferencing(#[from] ConferencingError),

    /// A notification could not be delivered.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl MeetingError {
    /// Short error code string returned to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            MeetingError::NotFound { .. } => "MEETING_NOT_FOUND",
            MeetingError::Invalid(e) => e.code(),
            MeetingError::Database(_) => "DATABASE_ERROR",
            MeetingError::Conferencing(_) => "CONFERENCING_ERROR",
            MeetingError::Notify(_) => "NOTIFY_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, MeetingError>;
