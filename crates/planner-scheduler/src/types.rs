use planner_core::{MeetingId, RoomId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a meeting-scoped job does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPurpose {
    RoomCreate,
    CallStart,
    CallEnd,
}

impl JobPurpose {
    /// Every meeting-scoped purpose, in firing order.
    pub const ALL: [JobPurpose; 3] = [JobPurpose::RoomCreate, JobPurpose::CallStart, JobPurpose::CallEnd];

    fn slug(self) -> &'static str {
        match self {
            JobPurpose::RoomCreate => "room-create",
            JobPurpose::CallStart => "call-start",
            JobPurpose::CallEnd => "call-end",
        }
    }
}

/// Stable identity of a scheduled job.
///
/// Meeting-scoped jobs are keyed by meeting id and purpose; the post-call
/// cleanup is keyed by room, since it must outlive the meeting record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKey {
    Meeting {
        meeting_id: MeetingId,
        purpose: JobPurpose,
    },
    RoomCleanup {
        room_id: RoomId,
    },
}

impl JobKey {
    pub fn meeting(meeting_id: MeetingId, purpose: JobPurpose) -> Self {
        JobKey::Meeting {
            meeting_id,
            purpose,
        }
    }

    pub fn room_cleanup(room_id: RoomId) -> Self {
        JobKey::RoomCleanup { room_id }
    }

    /// The three meeting-scoped keys of `meeting_id`.
    pub fn meeting_keys(meeting_id: MeetingId) -> [JobKey; 3] {
        JobPurpose::ALL.map(|purpose| JobKey::meeting(meeting_id, purpose))
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKey::Meeting {
                meeting_id,
                purpose,
            } => write!(f, "meeting-{}-{}", meeting_id, purpose.slug()),
            JobKey::RoomCleanup { room_id } => write!(f, "room-{}-cleanup", room_id),
        }
    }
}
