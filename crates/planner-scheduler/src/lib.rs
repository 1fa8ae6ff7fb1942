//! `planner-scheduler`: in-memory keyed timer registry.
//!
//! # Overview
//!
//! A [`JobRegistry`] maps a structured [`JobKey`] to one pending Tokio timer.
//! Scheduling under an existing key replaces the previous timer atomically,
//! so at most one job per key is ever live. Nothing is persisted: after a
//! restart the owner re-derives every job from the meeting store.
//!
//! # Keys
//!
//! | Key                               | Fires at                  |
//! |-----------------------------------|---------------------------|
//! | `meeting-<id>-room-create`        | start time minus room lead |
//! | `meeting-<id>-call-start`         | start time                |
//! | `meeting-<id>-call-end`           | end time                  |
//! | `room-<room id>-cleanup`          | call stop plus cleanup delay |

pub mod error;
pub mod registry;
pub mod types;

pub use error::{JobError, Result};
pub use registry::{JobRegistry, Scheduled};
pub use types::{JobKey, JobPurpose};
