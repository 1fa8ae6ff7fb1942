//! `planner-meetings`: meeting lifecycle orchestration.
//!
//! # Flow
//!
//! 1. [`service::MeetingService`] persists a meeting mutation and publishes
//!    `MeetingCreated` / `MeetingUpdated` / `MeetingDeleted` on the bus.
//! 2. [`orchestrator::MeetingOrchestrator`] turns the snapshot into keyed
//!    timers (room create, call start, call end) and reacts to call signals
//!    (post-call cleanup).
//! 3. When a timer fires the orchestrator publishes a derived event, which
//!    [`dispatch::ActionDispatcher`] carries out against the conferencing
//!    provider, the notifier and the store.
//! 4. On boot, [`recovery::RecoveryBootstrapper`] replays step 2 for every
//!    meeting that has not ended yet.

pub mod db;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod service;
pub mod store;

pub use dispatch::ActionDispatcher;
pub use error::{MeetingError, Result};
pub use orchestrator::{MeetingOrchestrator, PlannedJob};
pub use recovery::{RecoveryBootstrapper, RecoveryReport};
pub use service::MeetingService;
pub use store::{MeetingPatch, MeetingStore, NewMeeting, SqliteMeetingStore};
