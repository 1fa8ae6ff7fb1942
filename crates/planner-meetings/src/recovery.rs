use std::sync::Arc;

use chrono::{DateTime, Utc};
use planner_scheduler::Scheduled;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::orchestrator::MeetingOrchestrator;
use crate::store::MeetingStore;

/// Summary of one boot-time recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Meetings that had not ended and were rescheduled.
    pub meetings: usize,
    /// Jobs registered or run across those meetings.
    pub jobs: usize,
    /// Jobs whose fire time had passed while the process was down.
    pub fired_immediately: usize,
    /// Meetings rejected by the orchestrator.
    pub skipped: usize,
}

/// Rebuilds the in-memory timers from the store after a restart.
///
/// Runs once, before the HTTP surface starts accepting requests. Room
/// cleanups are not recovered: a room whose call stopped before the restart
/// is left for the provider's own expiry.
pub struct RecoveryBootstrapper {
    store: Arc<dyn MeetingStore>,
    orchestrator: Arc<MeetingOrchestrator>,
}

impl RecoveryBootstrapper {
    pub fn new(store: Arc<dyn MeetingStore>, orchestrator: Arc<MeetingOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    pub fn run(&self, now: DateTime<Utc>) -> Result<RecoveryReport> {
        let meetings = self.store.find_active(now)?;
        let mut report = RecoveryReport::default();

        for meeting in &meetings {
            match self.orchestrator.schedule_meeting(meeting, now) {
                Ok(planned) => {
                    report.meetings += 1;
                    report.jobs += planned.len();
                    report.fired_immediately += planned
                        .iter()
                        .filter(|job| job.outcome == Scheduled::RanImmediately)
                        .count();
                }
                Err(e) => {
                    report.skipped += 1;
                    warn!(meeting_id = %meeting.id, error = %e, "meeting not recovered");
                }
            }
        }

        info!(
            meetings = report.meetings,
            jobs = report.jobs,
            fired_immediately = report.fired_immediately,
            skipped = report.skipped,
            "schedule recovered"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewMeeting, SqliteMeetingStore};
    use chrono::Duration;
    use planner_core::config::ScheduleConfig;
    use planner_core::RoomId;
    use planner_events::EventBus;
    use planner_scheduler::{JobKey, JobPurpose, JobRegistry};
    use rusqlite::Connection;

    fn new_meeting(start: DateTime<Utc>, minutes: i64) -> NewMeeting {
        NewMeeting {
            title: "Sync".to_string(),
            description: None,
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            attendees: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restores_jobs_for_meetings_not_yet_ended() {
        let now = Utc::now();
        let store = Arc::new(SqliteMeetingStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let upcoming = store.create(new_meeting(now + Duration::hours(1), 30)).unwrap();
        let running = store.create(new_meeting(now - Duration::minutes(10), 60)).unwrap();
        store.set_room(running.id, Some(&RoomId::from("live"))).unwrap();
        store.create(new_meeting(now - Duration::hours(3), 60)).unwrap();

        let registry = JobRegistry::new();
        let orchestrator = Arc::new(MeetingOrchestrator::new(
            registry.clone(),
            Arc::new(EventBus::new()),
            ScheduleConfig::default(),
        ));
        let report = RecoveryBootstrapper::new(store, orchestrator).run(now).unwrap();

        // upcoming: 3 pending. running: call-start fires now, call-end pending.
        assert_eq!(
            report,
            RecoveryReport {
                meetings: 2,
                jobs: 5,
                fired_immediately: 1,
                skipped: 0,
            }
        );
        assert!(registry.exists(&JobKey::meeting(upcoming.id, JobPurpose::RoomCreate)));
        assert!(registry.exists(&JobKey::meeting(running.id, JobPurpose::CallEnd)));
        assert!(!registry.exists(&JobKey::meeting(running.id, JobPurpose::RoomCreate)));
        assert_eq!(registry.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_store_yields_empty_report() {
        let store = Arc::new(SqliteMeetingStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let orchestrator = Arc::new(MeetingOrchestrator::new(
            JobRegistry::new(),
            Arc::new(EventBus::new()),
            ScheduleConfig::default(),
        ));
        let report = RecoveryBootstrapper::new(store, orchestrator).run(Utc::now()).unwrap();
        assert_eq!(report, RecoveryReport::default());
    }
}
