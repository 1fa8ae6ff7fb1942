use planner_core::{Meeting, RoomId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Discriminant of [`LifecycleEvent`], used as the subscription filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTag {
    MeetingCreated,
    MeetingUpdated,
    MeetingDeleted,
    RoomShouldBeCreated,
    CallShouldStart,
    CallShouldEnd,
    CallStarted,
    CallStopped,
    CleanupDue,
}

impl EventTag {
    pub fn as_str(self) -> &'static str {
        match self {
            EventTag::MeetingCreated => "meeting.create",
            EventTag::MeetingUpdated => "meeting.update",
            EventTag::MeetingDeleted => "meeting.delete",
            EventTag::RoomShouldBeCreated => "meeting.before_start",
            EventTag::CallShouldStart => "meeting.start",
            EventTag::CallShouldEnd => "meeting.end",
            EventTag::CallStarted => "conference.started",
            EventTag::CallStopped => "conference.stopped",
            EventTag::CleanupDue => "meeting.cleaning",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable notification describing a meeting or call state change.
///
/// Meeting-scoped events carry the snapshot that was current when they were
/// produced; call-scoped events carry only the provider's room id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum LifecycleEvent {
    MeetingCreated(Meeting),
    MeetingUpdated(Meeting),
    MeetingDeleted(Meeting),
    /// The room-create job fired.
    RoomShouldBeCreated(Meeting),
    /// The call-start job fired.
    CallShouldStart(Meeting),
    /// The call-end job fired.
    CallShouldEnd(Meeting),
    /// Signal from the provider: a call is live in the room.
    CallStarted(RoomId),
    /// Signal from the provider: the call in the room ended.
    CallStopped(RoomId),
    /// The post-call cleanup job fired.
    CleanupDue(RoomId),
}

impl LifecycleEvent {
    pub fn tag(&self) -> EventTag {
        match self {
            LifecycleEvent::MeetingCreated(_) => EventTag::MeetingCreated,
            LifecycleEvent::MeetingUpdated(_) => EventTag::MeetingUpdated,
            LifecycleEvent::MeetingDeleted(_) => EventTag::MeetingDeleted,
            LifecycleEvent::RoomShouldBeCreated(_) => EventTag::RoomShouldBeCreated,
            LifecycleEvent::CallShouldStart(_) => EventTag::CallShouldStart,
            LifecycleEvent::CallShouldEnd(_) => EventTag::CallShouldEnd,
            LifecycleEvent::CallStarted(_) => EventTag::CallStarted,
            LifecycleEvent::CallStopped(_) => EventTag::CallStopped,
            LifecycleEvent::CleanupDue(_) => EventTag::CleanupDue,
        }
    }

    /// The meeting snapshot, for meeting-scoped events.
    pub fn meeting(&self) -> Option<&Meeting> {
        match self {
            LifecycleEvent::MeetingCreated(m)
            | LifecycleEvent::MeetingUpdated(m)
            | LifecycleEvent::MeetingDeleted(m)
            | LifecycleEvent::RoomShouldBeCreated(m)
            | LifecycleEvent::CallShouldStart(m)
            | LifecycleEvent::CallShouldEnd(m) => Some(m),
            _ => None,
        }
    }

    /// The room id, for call-scoped events.
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            LifecycleEvent::CallStarted(r)
            | LifecycleEvent::CallStopped(r)
            | LifecycleEvent::CleanupDue(r) => Some(r),
            _ => None,
        }
    }
}

/// Synchronous event handler.
///
/// Handlers run on the publisher's thread, so they must be cheap and
/// non-blocking. Anything that does I/O should hand off to a Tokio task.
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn handle(&self, event: &LifecycleEvent) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use planner_core::{MeetingId, MeetingStatus};

    #[test]
    fn serialises_with_tag_and_payload() {
        let event = LifecycleEvent::CallStopped(RoomId::from("room-7"));
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "call_stopped");
        assert_eq!(json["payload"], "room-7");
    }

    #[test]
    fn accessors_match_variant_scope() {
        let now = Utc::now();
        let meeting = Meeting {
            id: MeetingId(3),
            title: "Review".to_string(),
            description: None,
            start_time: now,
            end_time: now + Duration::hours(1),
            room_id: None,
            status: MeetingStatus::Scheduled,
            attendees: Vec::new(),
        };
        let created = LifecycleEvent::MeetingCreated(meeting);
        assert_eq!(created.tag(), EventTag::MeetingCreated);
        assert_eq!(created.meeting().map(|m| m.id), Some(MeetingId(3)));
        assert!(created.room().is_none());

        let cleanup = LifecycleEvent::CleanupDue(RoomId::from("r"));
        assert_eq!(cleanup.tag().as_str(), "meeting.cleaning");
        assert!(cleanup.meeting().is_none());
    }
}
