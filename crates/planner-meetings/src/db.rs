use rusqlite::Connection;

use crate::error::Result;

/// Initialise the meetings schema in `conn`.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout. The
/// `end_time` index serves the recovery query run at boot.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meetings (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT    NOT NULL,
            description TEXT,
            start_time  TEXT    NOT NULL,   -- RFC 3339, UTC, fixed width
            end_time    TEXT    NOT NULL,
            room_id     TEXT,               -- NULL until the room exists
            status      TEXT    NOT NULL DEFAULT 'scheduled',
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_meetings_end_time ON meetings (end_time);
        CREATE INDEX IF NOT EXISTS idx_meetings_room ON meetings (room_id);

        CREATE TABLE IF NOT EXISTS attendees (
            meeting_id  INTEGER NOT NULL REFERENCES meetings (id) ON DELETE CASCADE,
            email       TEXT    NOT NULL,
            PRIMARY KEY (meeting_id, email)
        ) STRICT;
        ",
    )?;
    Ok(())
}
