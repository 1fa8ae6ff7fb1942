//! `planner-core`: types and configuration shared by every planner crate.

pub mod config;
pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::{check_schedule, Meeting, MeetingId, MeetingStatus, RoomId};
