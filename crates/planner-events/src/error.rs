use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    /// The handler returned an unrecoverable failure.
    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    /// The handler panicked while processing the event.
    #[error("Handler panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, EventError>;
