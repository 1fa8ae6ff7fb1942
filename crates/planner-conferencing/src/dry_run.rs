//! Provider and notifier that only log. Used when no real account is configured.

use async_trait::async_trait;
use planner_core::RoomId;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ConferencingError, NotifyError},
    notifier::{Notification, Notifier},
    provider::ConferencingProvider,
};

/// Mints UUID room ids and logs every call.
pub struct LogProvider {
    host: String,
}

impl LogProvider {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait]
impl ConferencingProvider for LogProvider {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn create_room(&self, name: &str) -> Result<RoomId, ConferencingError> {
        let room = RoomId(Uuid::new_v4().to_string());
        info!(host = %self.host, %name, room_id = %room, "dry-run: room created");
        Ok(room)
    }

    async fn start_call(&self, room: &RoomId) -> Result<(), ConferencingError> {
        info!(host = %self.host, room_id = %room, "dry-run: call started");
        Ok(())
    }

    async fn stop_call(&self, room: &RoomId) -> Result<(), ConferencingError> {
        info!(host = %self.host, room_id = %room, "dry-run: call stopped");
        Ok(())
    }

    async fn delete_room(&self, room: &RoomId) -> Result<(), ConferencingError> {
        info!(host = %self.host, room_id = %room, "dry-run: room deleted");
        Ok(())
    }
}

/// Logs each notification instead of delivering it.
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            from = %self.from,
            kind = %notification.kind,
            meeting_id = %notification.meeting.id,
            recipients = notification.recipients().len(),
            "dry-run: notification sent"
        );
        Ok(())
    }
}
