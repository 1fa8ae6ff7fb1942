use thiserror::Error;

/// Errors a job action may report when it fires.
///
/// The registry logs these and drops them; they never reach the caller that
/// scheduled the job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The action ran but could not complete.
    #[error("Job action failed: {0}")]
    ActionFailed(String),

    /// The action panicked.
    #[error("Job action panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, JobError>;
