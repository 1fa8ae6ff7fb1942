use std::sync::Arc;

use chrono::{DateTime, Utc};
use planner_core::{Meeting, MeetingId};
use planner_events::{EventBus, LifecycleEvent};
use tracing::{info, instrument};

use crate::error::{MeetingError, Result};
use crate::store::{MeetingPatch, MeetingStore, NewMeeting};

/// CRUD entry point for meetings.
///
/// Every successful mutation is persisted first and then announced with
/// exactly one lifecycle event carrying the stored snapshot. Invalid input
/// is rejected before the store is touched, so nothing is published for it.
pub struct MeetingService {
    store: Arc<dyn MeetingStore>,
    bus: Arc<EventBus>,
}

impl MeetingService {
    pub fn new(store: Arc<dyn MeetingStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    #[instrument(skip(self, new), fields(title = %new.title))]
    pub fn create(&self, new: NewMeeting) -> Result<Meeting> {
        new.validate()?;
        let meeting = self.store.create(new)?;
        info!(meeting_id = %meeting.id, start = %meeting.start_time, "meeting created");
        self.bus.publish(LifecycleEvent::MeetingCreated(meeting.clone()));
        Ok(meeting)
    }

    #[instrument(skip(self, patch))]
    pub fn update(&self, id: MeetingId, patch: MeetingPatch) -> Result<Meeting> {
        let mut meeting = self.require(id)?;
        patch.apply(&mut meeting);
        meeting.validate()?;

        let meeting = self.store.update(&meeting)?;
        info!(meeting_id = %meeting.id, start = %meeting.start_time, "meeting updated");
        self.bus.publish(LifecycleEvent::MeetingUpdated(meeting.clone()));
        Ok(meeting)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: MeetingId) -> Result<Meeting> {
        let meeting = self.store.delete(id)?;
        info!(meeting_id = %meeting.id, "meeting deleted");
        self.bus.publish(LifecycleEvent::MeetingDeleted(meeting.clone()));
        Ok(meeting)
    }

    pub fn get(&self, id: MeetingId) -> Result<Meeting> {
        self.require(id)
    }

    /// Meetings that have not ended as of `now`.
    pub fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Meeting>> {
        self.store.find_active(now)
    }

    fn require(&self, id: MeetingId) -> Result<Meeting> {
        self.store.get(id)?.ok_or(MeetingError::NotFound { id })
    }
}
