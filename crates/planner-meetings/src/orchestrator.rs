//! Meeting lifecycle state machine.
//!
//! The orchestrator keeps no per-meeting state of its own. A meeting's phase
//! is implied by which of its jobs are pending in the [`JobRegistry`]:
//!
//! | Phase        | Pending jobs                                  |
//! |--------------|-----------------------------------------------|
//! | RoomPending  | room-create (unless a room exists), call-start, call-end |
//! | Rescheduled  | room-create, call-start, call-end (call ran, start moved ahead) |
//! | InCall       | call-end                                      |
//! | Finished     | `room-<id>-cleanup`                           |
//!
//! Every create, update and recovery goes through
//! [`MeetingOrchestrator::schedule_meeting`], which always cancels the three
//! meeting-keyed jobs and derives them again from the snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use planner_core::{config::ScheduleConfig, CoreError, Meeting, MeetingId, MeetingStatus, RoomId};
use planner_events::{
    EventBus, EventError, EventHandler, EventTag, LifecycleEvent, SubscriptionId,
};
use planner_scheduler::{JobKey, JobPurpose, JobRegistry, Scheduled};
use tracing::{debug, info};

/// Events the orchestrator consumes.
const SUBSCRIBED: [EventTag; 5] = [
    EventTag::MeetingCreated,
    EventTag::MeetingUpdated,
    EventTag::MeetingDeleted,
    EventTag::CallStarted,
    EventTag::CallStopped,
];

/// One job derived from a meeting snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedJob {
    pub key: JobKey,
    pub fire_at: DateTime<Utc>,
    pub outcome: Scheduled,
}

pub struct MeetingOrchestrator {
    registry: JobRegistry,
    bus: Arc<EventBus>,
    policy: ScheduleConfig,
}

impl MeetingOrchestrator {
    pub fn new(registry: JobRegistry, bus: Arc<EventBus>, policy: ScheduleConfig) -> Self {
        Self {
            registry,
            bus,
            policy,
        }
    }

    /// Build an orchestrator and subscribe it to the meeting and call events.
    pub fn attach(
        registry: JobRegistry,
        bus: Arc<EventBus>,
        policy: ScheduleConfig,
    ) -> (Arc<Self>, Vec<SubscriptionId>) {
        let orchestrator = Arc::new(Self::new(registry, Arc::clone(&bus), policy));
        let ids = bus.subscribe_all(&SUBSCRIBED, orchestrator.clone());
        (orchestrator, ids)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Derive and register the meeting-keyed jobs for `meeting` as of `now`.
    ///
    /// Shared by create, update and boot-time recovery. Rejects the snapshot
    /// before touching the registry if its times are inverted. Otherwise the
    /// three meeting-keyed jobs are cancelled and re-created from scratch:
    ///
    /// - room-create at `start - room_lead`, skipped when the snapshot already
    ///   carries a room id or the call has already run;
    /// - call-start at `start`, skipped once the call has started or finished;
    /// - call-end at `end`.
    ///
    /// A meeting whose call already ran but whose start has been moved past
    /// `now` counts as rescheduled: it gets room-create and call-start again
    /// whatever its status and room. Fire times at or before `now` run
    /// immediately.
    pub fn schedule_meeting(
        &self,
        meeting: &Meeting,
        now: DateTime<Utc>,
    ) -> Result<Vec<PlannedJob>, CoreError> {
        meeting.validate()?;
        self.cancel_meeting(meeting.id);

        let mut planned = Vec::with_capacity(3);
        let not_yet_run = meeting.status == MeetingStatus::Scheduled;
        let rescheduled = !not_yet_run && meeting.start_time > now;

        if (meeting.room_id.is_none() && not_yet_run) || rescheduled {
            let fire_at = meeting
                .start_time
                .checked_sub_signed(self.policy.room_lead())
                .unwrap_or(meeting.start_time);
            planned.push(self.plan(
                JobKey::meeting(meeting.id, JobPurpose::RoomCreate),
                fire_at,
                now,
                LifecycleEvent::RoomShouldBeCreated(meeting.clone()),
            ));
        } else {
            debug!(meeting_id = %meeting.id, status = %meeting.status, "no room-create job");
        }

        if not_yet_run || rescheduled {
            planned.push(self.plan(
                JobKey::meeting(meeting.id, JobPurpose::CallStart),
                meeting.start_time,
                now,
                LifecycleEvent::CallShouldStart(meeting.clone()),
            ));
        }

        planned.push(self.plan(
            JobKey::meeting(meeting.id, JobPurpose::CallEnd),
            meeting.end_time,
            now,
            LifecycleEvent::CallShouldEnd(meeting.clone()),
        ));

        info!(
            meeting_id = %meeting.id,
            jobs = planned.len(),
            immediate = planned.iter().filter(|j| j.outcome == Scheduled::RanImmediately).count(),
            "meeting scheduled"
        );
        Ok(planned)
    }

    /// Cancel the three meeting-keyed jobs. Room cleanup is left alone.
    pub fn cancel_meeting(&self, meeting_id: MeetingId) -> usize {
        let cancelled = JobKey::meeting_keys(meeting_id)
            .iter()
            .filter(|key| self.registry.cancel(key))
            .count();
        if cancelled > 0 {
            debug!(meeting_id = %meeting_id, cancelled, "meeting jobs cancelled");
        }
        cancelled
    }

    /// A call went live: a pending cleanup for the room is now stale.
    pub fn on_call_started(&self, room: &RoomId) {
        if self.registry.cancel(&JobKey::room_cleanup(room.clone())) {
            info!(room_id = %room, "call restarted before cleanup, cleanup cancelled");
        } else {
            debug!(room_id = %room, "call started");
        }
    }

    /// A call ended: reap the room after the cleanup delay.
    pub fn on_call_stopped(&self, room: &RoomId, now: DateTime<Utc>) -> PlannedJob {
        let planned = self.plan(
            JobKey::room_cleanup(room.clone()),
            now + self.policy.cleanup_delay(),
            now,
            LifecycleEvent::CleanupDue(room.clone()),
        );
        info!(room_id = %room, fire_at = %planned.fire_at, "room cleanup scheduled");
        planned
    }

    fn plan(
        &self,
        key: JobKey,
        fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
        event: LifecycleEvent,
    ) -> PlannedJob {
        // Anything already due is clamped to `now`, which the registry treats
        // as "run immediately".
        let fire_at = fire_at.max(now);
        let bus = Arc::clone(&self.bus);
        let outcome = self.registry.schedule(key.clone(), fire_at, move || {
            let tag = event.tag();
            let delivered = bus.publish(event);
            debug!(%tag, delivered, "job published event");
            Ok(())
        });
        PlannedJob {
            key,
            fire_at,
            outcome,
        }
    }
}

impl EventHandler for MeetingOrchestrator {
    fn name(&self) -> &str {
        "meeting-orchestrator"
    }

    fn handle(&self, event: &LifecycleEvent) -> planner_events::Result<()> {
        let now = Utc::now();
        match event {
            LifecycleEvent::MeetingCreated(meeting) | LifecycleEvent::MeetingUpdated(meeting) => {
                self.schedule_meeting(meeting, now)
                    .map(|_| ())
                    .map_err(|e| EventError::HandlerFailed(e.to_string()))
            }
            LifecycleEvent::MeetingDeleted(meeting) => {
                self.cancel_meeting(meeting.id);
                Ok(())
            }
            LifecycleEvent::CallStarted(room) => {
                self.on_call_started(room);
                Ok(())
            }
            LifecycleEvent::CallStopped(room) => {
                self.on_call_stopped(room, now);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
