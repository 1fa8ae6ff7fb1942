use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use planner_core::{types::check_schedule, CoreError, Meeting, MeetingId, MeetingStatus, RoomId};
use rusqlite::{types::Type, Connection, OptionalExtension, Row};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::db::init_db;
use crate::error::{MeetingError, Result};

/// Fields supplied when a meeting is created.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMeeting {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

impl NewMeeting {
    pub fn validate(&self) -> std::result::Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::MissingField("title"));
        }
        check_schedule(self.start_time, self.end_time)
    }
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Replaces the attendee list when present.
    pub attendees: Option<Vec<String>>,
}

impl MeetingPatch {
    pub fn apply(&self, meeting: &mut Meeting) {
        if let Some(title) = &self.title {
            meeting.title = title.clone();
        }
        if let Some(description) = &self.description {
            meeting.description = Some(description.clone());
        }
        if let Some(start) = self.start_time {
            meeting.start_time = start;
        }
        if let Some(end) = self.end_time {
            meeting.end_time = end;
        }
        if let Some(attendees) = &self.attendees {
            meeting.attendees = attendees.clone();
        }
    }
}

/// Persistent meeting records.
///
/// The orchestrator never touches this; only the CRUD service, the dispatcher
/// and the recovery pass do.
pub trait MeetingStore: Send + Sync {
    fn create(&self, new: NewMeeting) -> Result<Meeting>;

    fn get(&self, id: MeetingId) -> Result<Option<Meeting>>;

    /// Overwrite title, description, times and attendees of an existing
    /// meeting. Room and status are left alone.
    fn update(&self, meeting: &Meeting) -> Result<Meeting>;

    /// Remove a meeting, returning its last snapshot.
    fn delete(&self, id: MeetingId) -> Result<Meeting>;

    /// All meetings whose end time is at or after `now`, earliest start first.
    fn find_active(&self, now: DateTime<Utc>) -> Result<Vec<Meeting>>;

    fn find_by_room(&self, room: &RoomId) -> Result<Option<Meeting>>;

    fn set_room(&self, id: MeetingId, room: Option<&RoomId>) -> Result<()>;

    /// Store `room` only if the meeting has none yet. Returns false when
    /// another room is already recorded or the meeting no longer exists.
    fn claim_room(&self, id: MeetingId, room: &RoomId) -> Result<bool>;

    fn set_status(&self, id: MeetingId, status: MeetingStatus) -> Result<()>;
}

const MEETING_COLUMNS: &str =
    "id, title, description, start_time, end_time, room_id, status";

/// SQLite-backed [`MeetingStore`].
///
/// Wraps a single connection in a `Mutex`, which is enough for the request
/// rates a meeting planner sees.
pub struct SqliteMeetingStore {
    db: Mutex<Connection>,
}

impl SqliteMeetingStore {
    /// Wrap `conn`, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MeetingStore for SqliteMeetingStore {
    fn create(&self, new: NewMeeting) -> Result<Meeting> {
        let now = timestamp(Utc::now());
        let mut db = self.lock();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO meetings
             (title, description, start_time, end_time, room_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, 'scheduled', ?5, ?5)",
            rusqlite::params![
                new.title,
                new.description,
                timestamp(new.start_time),
                timestamp(new.end_time),
                now
            ],
        )?;
        let id = MeetingId(tx.last_insert_rowid());
        write_attendees(&tx, id, &new.attendees)?;
        let meeting = load(&tx, id)?.ok_or(MeetingError::NotFound { id })?;
        tx.commit()?;
        debug!(meeting_id = %id, "meeting stored");
        Ok(meeting)
    }

    #[instrument(skip(self), fields(meeting_id = %id))]
    fn get(&self, id: MeetingId) -> Result<Option<Meeting>> {
        let db = self.lock();
        load(&db, id)
    }

    fn update(&self, meeting: &Meeting) -> Result<Meeting> {
        let id = meeting.id;
        let mut db = self.lock();
        let tx = db.transaction()?;
        let n = tx.execute(
            "UPDATE meetings
             SET title = ?1, description = ?2, start_time = ?3, end_time = ?4, updated_at = ?5
             WHERE id = ?6",
            rusqlite::params![
                meeting.title,
                meeting.description,
                timestamp(meeting.start_time),
                timestamp(meeting.end_time),
                timestamp(Utc::now()),
                id.get()
            ],
        )?;
        if n == 0 {
            return Err(MeetingError::NotFound { id });
        }
        tx.execute("DELETE FROM attendees WHERE meeting_id = ?1", [id.get()])?;
        write_attendees(&tx, id, &meeting.attendees)?;
        let updated = load(&tx, id)?.ok_or(MeetingError::NotFound { id })?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete(&self, id: MeetingId) -> Result<Meeting> {
        let mut db = self.lock();
        let tx = db.transaction()?;
        let meeting = load(&tx, id)?.ok_or(MeetingError::NotFound { id })?;
        tx.execute("DELETE FROM attendees WHERE meeting_id = ?1", [id.get()])?;
        tx.execute("DELETE FROM meetings WHERE id = ?1", [id.get()])?;
        tx.commit()?;
        debug!(meeting_id = %id, "meeting deleted");
        Ok(meeting)
    }

    fn find_active(&self, now: DateTime<Utc>) -> Result<Vec<Meeting>> {
        let db = self.lock();
        let mut stmt = db.prepare(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings
             WHERE end_time >= ?1 ORDER BY start_time, id"
        ))?;
        let rows = stmt
            .query_map([timestamp(now)], row_to_meeting)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        rows.into_iter()
            .map(|mut meeting| {
                meeting.attendees = load_attendees(&db, meeting.id)?;
                Ok(meeting)
            })
            .collect()
    }

    #[instrument(skip(self), fields(room_id = %room))]
    fn find_by_room(&self, room: &RoomId) -> Result<Option<Meeting>> {
        let db = self.lock();
        let meeting = db
            .query_row(
                &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE room_id = ?1 LIMIT 1"),
                [room.as_str()],
                row_to_meeting,
            )
            .optional()?;
        match meeting {
            Some(mut meeting) => {
                meeting.attendees = load_attendees(&db, meeting.id)?;
                Ok(Some(meeting))
            }
            None => Ok(None),
        }
    }

    fn set_room(&self, id: MeetingId, room: Option<&RoomId>) -> Result<()> {
        let n = self.lock().execute(
            "UPDATE meetings SET room_id = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![room.map(RoomId::as_str), timestamp(Utc::now()), id.get()],
        )?;
        if n == 0 {
            return Err(MeetingError::NotFound { id });
        }
        Ok(())
    }

    fn claim_room(&self, id: MeetingId, room: &RoomId) -> Result<bool> {
        let n = self.lock().execute(
            "UPDATE meetings SET room_id = ?1, updated_at = ?2 WHERE id = ?3 AND room_id IS NULL",
            rusqlite::params![room.as_str(), timestamp(Utc::now()), id.get()],
        )?;
        Ok(n > 0)
    }

    fn set_status(&self, id: MeetingId, status: MeetingStatus) -> Result<()> {
        let n = self.lock().execute(
            "UPDATE meetings SET status = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![status.to_string(), timestamp(Utc::now()), id.get()],
        )?;
        if n == 0 {
            return Err(MeetingError::NotFound { id });
        }
        Ok(())
    }
}

/// Fixed-width UTC form, so text comparison in SQL matches time order.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a row selected with [`MEETING_COLUMNS`]. Attendees are loaded separately.
fn row_to_meeting(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    let status: String = row.get(6)?;
    let status = status
        .parse::<MeetingStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))?;
    Ok(Meeting {
        id: MeetingId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        start_time: parse_timestamp(row, 3)?,
        end_time: parse_timestamp(row, 4)?,
        room_id: row.get::<_, Option<String>>(5)?.map(RoomId),
        status,
        attendees: Vec::new(),
    })
}

fn load(conn: &Connection, id: MeetingId) -> Result<Option<Meeting>> {
    let meeting = conn
        .query_row(
            &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?1"),
            [id.get()],
            row_to_meeting,
        )
        .optional()?;
    match meeting {
        Some(mut meeting) => {
            meeting.attendees = load_attendees(conn, id)?;
            Ok(Some(meeting))
        }
        None => Ok(None),
    }
}

fn load_attendees(conn: &Connection, id: MeetingId) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT email FROM attendees WHERE meeting_id = ?1 ORDER BY rowid")?;
    let emails = stmt
        .query_map([id.get()], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(emails)
}

fn write_attendees(conn: &Connection, id: MeetingId, attendees: &[String]) -> Result<()> {
    let mut stmt =
        conn.prepare_cached("INSERT OR IGNORE INTO attendees (meeting_id, email) VALUES (?1, ?2)")?;
    for email in attendees {
        stmt.execute(rusqlite::params![id.get(), email])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> SqliteMeetingStore {
        SqliteMeetingStore::new(Connection::open_in_memory().expect("open")).expect("init")
    }

    fn new_meeting(title: &str, start: DateTime<Utc>, minutes: i64) -> NewMeeting {
        NewMeeting {
            title: title.to_string(),
            description: Some("agenda".to_string()),
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            attendees: vec!["b@example.com".to_string(), "a@example.com".to_string()],
        }
    }

    #[test]
    fn create_then_get_returns_snapshot() {
        let store = store();
        let start = Utc::now() + Duration::hours(1);
        let created = store.create(new_meeting("Planning", start, 30)).unwrap();

        let fetched = store.get(created.id).unwrap().expect("meeting present");
        assert_eq!(fetched, created);
        assert_eq!(fetched.status, MeetingStatus::Scheduled);
        assert_eq!(fetched.room_id, None);
        assert_eq!(fetched.attendees, vec!["b@example.com", "a@example.com"]);
        assert_eq!(fetched.start_time.timestamp_micros(), start.timestamp_micros());
    }

    #[test]
    fn duplicate_attendees_are_collapsed() {
        let store = store();
        let mut new = new_meeting("Dupes", Utc::now(), 10);
        new.attendees = vec!["x@example.com".to_string(), "x@example.com".to_string()];
        let created = store.create(new).unwrap();
        assert_eq!(created.attendees, vec!["x@example.com"]);
    }

    #[test]
    fn update_replaces_fields_but_keeps_room_and_status() {
        let store = store();
        let created = store.create(new_meeting("Old", Utc::now(), 30)).unwrap();
        store.set_room(created.id, Some(&RoomId::from("room-1"))).unwrap();
        store.set_status(created.id, MeetingStatus::Started).unwrap();

        let mut edited = store.get(created.id).unwrap().unwrap();
        MeetingPatch {
            title: Some("New".to_string()),
            attendees: Some(vec!["c@example.com".to_string()]),
            ..Default::default()
        }
        .apply(&mut edited);
        let updated = store.update(&edited).unwrap();

        assert_eq!(updated.title, "New");
        assert_eq!(updated.attendees, vec!["c@example.com"]);
        assert_eq!(updated.room_id, Some(RoomId::from("room-1")));
        assert_eq!(updated.status, MeetingStatus::Started);
    }

    #[test]
    fn missing_meeting_reports_not_found() {
        let store = store();
        assert!(store.get(MeetingId(404)).unwrap().is_none());
        assert!(matches!(
            store.delete(MeetingId(404)),
            Err(MeetingError::NotFound { .. })
        ));
        assert!(matches!(
            store.set_status(MeetingId(404), MeetingStatus::Finished),
            Err(MeetingError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_returns_last_snapshot() {
        let store = store();
        let created = store.create(new_meeting("Gone", Utc::now(), 30)).unwrap();
        let deleted = store.delete(created.id).unwrap();
        assert_eq!(deleted, created);
        assert!(store.get(created.id).unwrap().is_none());
    }

    #[test]
    fn find_active_filters_on_end_time() {
        let store = store();
        let now = Utc::now();
        store.create(new_meeting("Past", now - Duration::hours(2), 30)).unwrap();
        let running = store.create(new_meeting("Running", now - Duration::minutes(10), 30)).unwrap();
        let later = store.create(new_meeting("Later", now + Duration::hours(3), 30)).unwrap();

        let active: Vec<MeetingId> = store.find_active(now).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(active, vec![running.id, later.id]);
    }

    #[test]
    fn find_by_room_follows_room_assignment() {
        let store = store();
        let created = store.create(new_meeting("Room", Utc::now(), 30)).unwrap();
        let room = RoomId::from("bubble-9");
        assert!(store.find_by_room(&room).unwrap().is_none());

        store.set_room(created.id, Some(&room)).unwrap();
        assert_eq!(store.find_by_room(&room).unwrap().map(|m| m.id), Some(created.id));

        store.set_room(created.id, None).unwrap();
        assert!(store.find_by_room(&room).unwrap().is_none());
    }

    #[test]
    fn claim_room_only_fills_an_empty_slot() {
        let store = store();
        let created = store.create(new_meeting("Claim", Utc::now(), 30)).unwrap();

        assert!(store.claim_room(created.id, &RoomId::from("first")).unwrap());
        assert!(!store.claim_room(created.id, &RoomId::from("second")).unwrap());
        assert_eq!(
            store.get(created.id).unwrap().unwrap().room_id,
            Some(RoomId::from("first"))
        );
        assert!(!store.claim_room(MeetingId(999), &RoomId::from("third")).unwrap());
    }

    #[test]
    fn new_meeting_validation() {
        let now = Utc::now();
        assert!(new_meeting("ok", now, 10).validate().is_ok());
        assert!(new_meeting("inverted", now, -10).validate().is_err());
        assert!(new_meeting("", now, 10).validate().is_err());
    }
}
