use async_trait::async_trait;
use planner_core::RoomId;

use crate::error::ConferencingError;

/// Remote conferencing service that hosts rooms ("bubbles") and calls.
///
/// Implementations must be `Send + Sync`: the dispatcher calls them from
/// several Tokio tasks at once. Call state changes driven by the remote side
/// do not come back through this trait; they arrive as `CallStarted` /
/// `CallStopped` signals on the event bus.
#[async_trait]
pub trait ConferencingProvider: Send + Sync {
    /// Stable lowercase identifier used in logs.
    fn name(&self) -> &str;

    /// Create a room and return the provider's id for it.
    async fn create_room(&self, name: &str) -> Result<RoomId, ConferencingError>;

    async fn start_call(&self, room: &RoomId) -> Result<(), ConferencingError>;

    async fn stop_call(&self, room: &RoomId) -> Result<(), ConferencingError>;

    async fn delete_room(&self, room: &RoomId) -> Result<(), ConferencingError>;
}
