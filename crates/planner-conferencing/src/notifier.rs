use async_trait::async_trait;
use planner_core::Meeting;
use serde::Serialize;
use std::fmt;

use crate::error::NotifyError;

/// Which message an attendee should receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Sent when a meeting is created.
    Invitation,
    /// Sent when a meeting's details change.
    Update,
    /// Sent when the room is ready, shortly before the start.
    Reminder,
    /// Sent when a meeting is deleted before it ends.
    Cancellation,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Invitation => "invitation",
            NotificationKind::Update => "update",
            NotificationKind::Reminder => "reminder",
            NotificationKind::Cancellation => "cancellation",
        };
        f.write_str(s)
    }
}

/// A message about one meeting, addressed to its attendees.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub meeting: Meeting,
}

impl Notification {
    pub fn new(kind: NotificationKind, meeting: Meeting) -> Self {
        Self { kind, meeting }
    }

    pub fn recipients(&self) -> &[String] {
        &self.meeting.attendees
    }
}

/// Outbound message channel (mail, chat, ...). Rendering is the implementor's job.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}
