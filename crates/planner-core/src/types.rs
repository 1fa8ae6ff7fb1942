use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Store-assigned meeting identifier (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(pub i64);

impl MeetingId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MeetingId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Opaque identifier of a conferencing room ("bubble") issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Persisted lifecycle status of a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    /// Created, call not started yet.
    #[default]
    Scheduled,
    /// The provider reported the call as started.
    Started,
    /// The provider reported the call as stopped.
    Finished,
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Started => "started",
            MeetingStatus::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MeetingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MeetingStatus::Scheduled),
            "started" => Ok(MeetingStatus::Started),
            "finished" => Ok(MeetingStatus::Finished),
            other => Err(format!("unknown meeting status: {other}")),
        }
    }
}

/// Snapshot of a meeting record as owned by the store.
///
/// The orchestrator never keeps these around; it only reads the copy carried
/// by an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Unset until the room-create action has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub status: MeetingStatus,
    /// Attendee e-mail addresses.
    #[serde(default)]
    pub attendees: Vec<String>,
}

impl Meeting {
    /// Check the invariants a meeting must hold before any job is derived from it.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CoreError::MissingField("title"));
        }
        check_schedule(self.start_time, self.end_time)
    }
}

/// Reject inverted or empty time windows.
pub fn check_schedule(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start < end {
        Ok(())
    } else {
        Err(CoreError::InvalidSchedule { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn meeting(start: DateTime<Utc>, end: DateTime<Utc>) -> Meeting {
        Meeting {
            id: MeetingId(1),
            title: "Standup".to_string(),
            description: None,
            start_time: start,
            end_time: end,
            room_id: None,
            status: MeetingStatus::Scheduled,
            attendees: vec!["a@example.com".to_string()],
        }
    }

    #[test]
    fn validate_accepts_forward_window() {
        let now = Utc::now();
        assert!(meeting(now, now + Duration::minutes(30)).validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let now = Utc::now();
        let err = meeting(now, now - Duration::minutes(1)).validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_SCHEDULE");
    }

    #[test]
    fn validate_rejects_empty_window() {
        let now = Utc::now();
        assert!(meeting(now, now).validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_title() {
        let now = Utc::now();
        let mut m = meeting(now, now + Duration::hours(1));
        m.title = "  ".to_string();
        assert!(matches!(m.validate(), Err(CoreError::MissingField("title"))));
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [MeetingStatus::Scheduled, MeetingStatus::Started, MeetingStatus::Finished] {
            assert_eq!(status.to_string().parse::<MeetingStatus>(), Ok(status));
        }
        assert!("paused".parse::<MeetingStatus>().is_err());
    }
}
