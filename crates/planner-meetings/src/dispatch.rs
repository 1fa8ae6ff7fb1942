use std::sync::Arc;

use chrono::Utc;
use planner_conferencing::{ConferencingProvider, Notification, NotificationKind, Notifier};
use planner_core::{Meeting, MeetingStatus, RoomId};
use planner_events::{EventBus, EventHandler, EventTag, LifecycleEvent, SubscriptionId};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::store::MeetingStore;

const SUBSCRIBED: [EventTag; 9] = [
    EventTag::MeetingCreated,
    EventTag::MeetingUpdated,
    EventTag::MeetingDeleted,
    EventTag::RoomShouldBeCreated,
    EventTag::CallShouldStart,
    EventTag::CallShouldEnd,
    EventTag::CallStarted,
    EventTag::CallStopped,
    EventTag::CleanupDue,
];

/// Carries out lifecycle events against the external collaborators.
///
/// Each event is handled on its own Tokio task so the publisher never waits
/// on network I/O. Failures are logged and not retried; the next update or
/// restart recomputes everything from the store.
#[derive(Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn MeetingStore>,
    provider: Arc<dyn ConferencingProvider>,
    notifier: Arc<dyn Notifier>,
}

impl ActionDispatcher {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        provider: Arc<dyn ConferencingProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            provider,
            notifier,
        }
    }

    /// Subscribe a dispatcher to every lifecycle event.
    pub fn attach(self, bus: &EventBus) -> Vec<SubscriptionId> {
        bus.subscribe_all(&SUBSCRIBED, Arc::new(self))
    }

    /// Perform the collaborator calls for one event.
    pub async fn process(&self, event: &LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::MeetingCreated(meeting) => {
                self.notify(NotificationKind::Invitation, meeting.clone()).await
            }
            LifecycleEvent::MeetingUpdated(meeting) => {
                self.notify(NotificationKind::Update, meeting.clone()).await
            }
            LifecycleEvent::MeetingDeleted(meeting) => {
                if meeting.end_time < Utc::now() {
                    debug!(meeting_id = %meeting.id, "deleted meeting already ended, no cancellation sent");
                    Ok(())
                } else {
                    self.notify(NotificationKind::Cancellation, meeting.clone()).await
                }
            }
            LifecycleEvent::RoomShouldBeCreated(meeting) => self.ensure_room(meeting).await,
            LifecycleEvent::CallShouldStart(meeting) => {
                if let Some(room) = self.current_room(meeting)? {
                    self.provider.start_call(&room).await?;
                    info!(meeting_id = %meeting.id, room_id = %room, "call start requested");
                }
                Ok(())
            }
            LifecycleEvent::CallShouldEnd(meeting) => {
                if let Some(room) = self.current_room(meeting)? {
                    self.provider.stop_call(&room).await?;
                    info!(meeting_id = %meeting.id, room_id = %room, "call stop requested");
                }
                Ok(())
            }
            LifecycleEvent::CallStarted(room) => self.mark(room, MeetingStatus::Started),
            LifecycleEvent::CallStopped(room) => self.mark(room, MeetingStatus::Finished),
            LifecycleEvent::CleanupDue(room) => {
                let owner = self.store.find_by_room(room)?;
                if let Some(meeting) = owner.as_ref().filter(|m| m.start_time > Utc::now()) {
                    info!(meeting_id = %meeting.id, room_id = %room, "room kept for rescheduled meeting");
                    return Ok(());
                }
                self.provider.delete_room(room).await?;
                if let Some(meeting) = owner {
                    self.store.set_room(meeting.id, None)?;
                }
                info!(room_id = %room, "room deleted");
                Ok(())
            }
        }
    }

    /// Create the meeting's room unless the store already has one.
    async fn ensure_room(&self, snapshot: &Meeting) -> Result<()> {
        let Some(mut meeting) = self.store.get(snapshot.id)? else {
            warn!(meeting_id = %snapshot.id, "meeting gone before its room was created");
            return Ok(());
        };

        match &meeting.room_id {
            Some(room) => {
                info!(meeting_id = %meeting.id, room_id = %room, "reusing existing room");
            }
            None => {
                let room = self.provider.create_room(&meeting.title).await?;
                if self.store.claim_room(meeting.id, &room)? {
                    info!(meeting_id = %meeting.id, room_id = %room, "room created");
                    meeting.room_id = Some(room);
                } else {
                    // A concurrent task stored its room first, or the meeting
                    // was deleted while the provider call was in flight.
                    warn!(meeting_id = %meeting.id, room_id = %room, "room not stored, deleting it");
                    self.provider.delete_room(&room).await?;
                    match self.store.get(meeting.id)? {
                        Some(current) => meeting = current,
                        None => return Ok(()),
                    }
                }
            }
        }

        self.notify(NotificationKind::Reminder, meeting).await
    }

    /// Room id as currently stored, since the event snapshot may predate it.
    fn current_room(&self, snapshot: &Meeting) -> Result<Option<RoomId>> {
        let room = self
            .store
            .get(snapshot.id)?
            .and_then(|meeting| meeting.room_id);
        if room.is_none() {
            warn!(meeting_id = %snapshot.id, "no room for meeting, call action skipped");
        }
        Ok(room)
    }

    fn mark(&self, room: &RoomId, status: MeetingStatus) -> Result<()> {
        match self.store.find_by_room(room)? {
            Some(meeting) => {
                self.store.set_status(meeting.id, status)?;
                debug!(meeting_id = %meeting.id, room_id = %room, %status, "meeting status updated");
            }
            None => debug!(room_id = %room, "call signal for a room with no meeting"),
        }
        Ok(())
    }

    async fn notify(&self, kind: NotificationKind, meeting: Meeting) -> Result<()> {
        if meeting.attendees.is_empty() {
            debug!(meeting_id = %meeting.id, %kind, "no attendees, notification skipped");
            return Ok(());
        }
        let notification = Notification::new(kind, meeting);
        self.notifier.send(&notification).await?;
        Ok(())
    }
}

impl EventHandler for ActionDispatcher {
    fn name(&self) -> &str {
        "action-dispatcher"
    }

    fn handle(&self, event: &LifecycleEvent) -> planner_events::Result<()> {
        let this = self.clone();
        let event = event.clone();
        tokio::spawn(async move {
            if let Err(e) = this.process(&event).await {
                error!(event = %event.tag(), error = %e, "lifecycle action failed");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewMeeting, SqliteMeetingStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use planner_conferencing::{ConferencingError, NotifyError};
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProvider {
        calls: Mutex<Vec<String>>,
        down: AtomicBool,
    }

    impl FakeProvider {
        fn record(&self, call: String) -> std::result::Result<(), ConferencingError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(ConferencingError::Unavailable("offline".to_string()));
            }
            self.calls.lock().unwrap().push(call);
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConferencingProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }
        async fn create_room(&self, name: &str) -> std::result::Result<RoomId, ConferencingError> {
            self.record(format!("create:{name}"))?;
            Ok(RoomId::from("bubble-1"))
        }
        async fn start_call(&self, room: &RoomId) -> std::result::Result<(), ConferencingError> {
            self.record(format!("start:{room}"))
        }
        async fn stop_call(&self, room: &RoomId) -> std::result::Result<(), ConferencingError> {
            self.record(format!("stop:{room}"))
        }
        async fn delete_room(&self, room: &RoomId) -> std::result::Result<(), ConferencingError> {
            self.record(format!("delete:{room}"))
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        sent: Mutex<Vec<NotificationKind>>,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        fn name(&self) -> &str {
            "fake"
        }
        async fn send(&self, n: &Notification) -> std::result::Result<(), NotifyError> {
            self.sent.lock().unwrap().push(n.kind);
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<SqliteMeetingStore>,
        provider: Arc<FakeProvider>,
        notifier: Arc<FakeNotifier>,
        dispatcher: ActionDispatcher,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(
            SqliteMeetingStore::new(Connection::open_in_memory().expect("open")).expect("init"),
        );
        let provider = Arc::new(FakeProvider::default());
        let notifier = Arc::new(FakeNotifier::default());
        let dispatcher = ActionDispatcher::new(store.clone(), provider.clone(), notifier.clone());
        Fixture {
            store,
            provider,
            notifier,
            dispatcher,
        }
    }

    fn create(store: &SqliteMeetingStore, start_in_minutes: i64) -> Meeting {
        let start = Utc::now() + Duration::minutes(start_in_minutes);
        store
            .create(NewMeeting {
                title: "Retro".to_string(),
                description: None,
                start_time: start,
                end_time: start + Duration::minutes(45),
                attendees: vec!["a@example.com".to_string()],
            })
            .expect("create")
    }

    #[tokio::test]
    async fn room_is_created_once_and_reused() {
        let f = fixture();
        let meeting = create(&f.store, 10);

        f.dispatcher
            .process(&LifecycleEvent::RoomShouldBeCreated(meeting.clone()))
            .await
            .unwrap();
        f.dispatcher
            .process(&LifecycleEvent::RoomShouldBeCreated(meeting.clone()))
            .await
            .unwrap();

        assert_eq!(f.provider.calls(), vec!["create:Retro"]);
        let stored = f.store.get(meeting.id).unwrap().unwrap();
        assert_eq!(stored.room_id, Some(RoomId::from("bubble-1")));
        assert_eq!(
            *f.notifier.sent.lock().unwrap(),
            vec![NotificationKind::Reminder, NotificationKind::Reminder]
        );
    }

    #[tokio::test]
    async fn call_start_uses_stored_room() {
        let f = fixture();
        let meeting = create(&f.store, 0);

        // No room yet: skipped, not an error.
        f.dispatcher
            .process(&LifecycleEvent::CallShouldStart(meeting.clone()))
            .await
            .unwrap();
        assert!(f.provider.calls().is_empty());

        f.store.set_room(meeting.id, Some(&RoomId::from("r-5"))).unwrap();
        f.dispatcher
            .process(&LifecycleEvent::CallShouldStart(meeting.clone()))
            .await
            .unwrap();
        f.dispatcher
            .process(&LifecycleEvent::CallShouldEnd(meeting))
            .await
            .unwrap();
        assert_eq!(f.provider.calls(), vec!["start:r-5", "stop:r-5"]);
    }

    #[tokio::test]
    async fn call_signals_update_status_and_cleanup_clears_room() {
        let f = fixture();
        let meeting = create(&f.store, 0);
        let room = RoomId::from("r-9");
        f.store.set_room(meeting.id, Some(&room)).unwrap();

        f.dispatcher.process(&LifecycleEvent::CallStarted(room.clone())).await.unwrap();
        assert_eq!(f.store.get(meeting.id).unwrap().unwrap().status, MeetingStatus::Started);

        f.dispatcher.process(&LifecycleEvent::CallStopped(room.clone())).await.unwrap();
        assert_eq!(f.store.get(meeting.id).unwrap().unwrap().status, MeetingStatus::Finished);

        f.dispatcher.process(&LifecycleEvent::CleanupDue(room.clone())).await.unwrap();
        assert_eq!(f.provider.calls(), vec!["delete:r-9"]);
        assert_eq!(f.store.get(meeting.id).unwrap().unwrap().room_id, None);
    }

    #[tokio::test]
    async fn cancellation_only_for_meetings_not_yet_ended() {
        let f = fixture();
        let upcoming = create(&f.store, 60);
        let mut ended = upcoming.clone();
        ended.start_time = Utc::now() - Duration::hours(3);
        ended.end_time = Utc::now() - Duration::hours(2);

        f.dispatcher.process(&LifecycleEvent::MeetingDeleted(ended)).await.unwrap();
        f.dispatcher.process(&LifecycleEvent::MeetingDeleted(upcoming)).await.unwrap();

        assert_eq!(*f.notifier.sent.lock().unwrap(), vec![NotificationKind::Cancellation]);
    }

    #[tokio::test]
    async fn provider_failure_surfaces_from_process() {
        let f = fixture();
        let meeting = create(&f.store, 5);
        f.provider.down.store(true, Ordering::SeqCst);

        let err = f
            .dispatcher
            .process(&LifecycleEvent::RoomShouldBeCreated(meeting.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFERENCING_ERROR");
        assert_eq!(f.store.get(meeting.id).unwrap().unwrap().room_id, None);
    }

    #[tokio::test]
    async fn handler_never_reports_failure_to_bus() {
        let f = fixture();
        f.provider.down.store(true, Ordering::SeqCst);
        let bus = EventBus::new();
        f.dispatcher.clone().attach(&bus);

        let delivered = bus.publish(LifecycleEvent::CleanupDue(RoomId::from("r-1")));
        assert_eq!(delivered, 1);
        tokio::task::yield_now().await;
    }

    /// Provider whose `create_room` takes a while, minting a new id per call.
    #[derive(Default)]
    struct SlowProvider {
        created: Mutex<Vec<RoomId>>,
        deleted: Mutex<Vec<RoomId>>,
    }

    #[async_trait]
    impl ConferencingProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }
        async fn create_room(&self, _name: &str) -> std::result::Result<RoomId, ConferencingError> {
            let room = {
                let mut created = self.created.lock().unwrap();
                let room = RoomId(format!("bubble-{}", created.len()));
                created.push(room.clone());
                room
            };
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(room)
        }
        async fn start_call(&self, _room: &RoomId) -> std::result::Result<(), ConferencingError> {
            Ok(())
        }
        async fn stop_call(&self, _room: &RoomId) -> std::result::Result<(), ConferencingError> {
            Ok(())
        }
        async fn delete_room(&self, room: &RoomId) -> std::result::Result<(), ConferencingError> {
            self.deleted.lock().unwrap().push(room.clone());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_room_requests_leave_one_live_room() {
        let store = Arc::new(
            SqliteMeetingStore::new(Connection::open_in_memory().expect("open")).expect("init"),
        );
        let provider = Arc::new(SlowProvider::default());
        let dispatcher = ActionDispatcher::new(
            store.clone(),
            provider.clone(),
            Arc::new(FakeNotifier::default()),
        );
        let meeting = create(&store, 5);
        let event = LifecycleEvent::RoomShouldBeCreated(meeting.clone());

        let (a, b) = tokio::join!(dispatcher.process(&event), dispatcher.process(&event));
        a.unwrap();
        b.unwrap();

        let created = provider.created.lock().unwrap().clone();
        let deleted = provider.deleted.lock().unwrap().clone();
        let stored = store.get(meeting.id).unwrap().unwrap().room_id.expect("room stored");
        assert_eq!(created.len(), 2);
        assert_eq!(deleted.len(), 1);
        assert_ne!(deleted[0], stored);
        assert!(created.contains(&stored));
    }

    #[tokio::test]
    async fn cleanup_keeps_room_of_meeting_moved_ahead() {
        let f = fixture();
        let meeting = create(&f.store, 90);
        let room = RoomId::from("r-keep");
        f.store.set_room(meeting.id, Some(&room)).unwrap();
        f.store.set_status(meeting.id, MeetingStatus::Finished).unwrap();

        f.dispatcher.process(&LifecycleEvent::CleanupDue(room.clone())).await.unwrap();

        assert!(f.provider.calls().is_empty());
        assert_eq!(f.store.get(meeting.id).unwrap().unwrap().room_id, Some(room));
    }
}
