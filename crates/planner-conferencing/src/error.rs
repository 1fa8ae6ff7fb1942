use thiserror::Error;

/// Errors reported by a conferencing provider.
#[derive(Debug, Error)]
pub enum ConferencingError {
    /// The remote service could not be reached.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider does not know the room.
    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: String },

    /// The provider refused the request (bad credentials, quota, state).
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },
}

/// Errors reported by a notifier.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}
