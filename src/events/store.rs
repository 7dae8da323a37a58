use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, Result as SqliteResult};
use thiserror::Error;

use crate::events::record::{Attendee, EventRecord, EventTime};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("Event {id} has an invalid {field}: {source}")]
    InvalidTime {
        id: i64,
        field: &'static str,
        source: crate::events::record::TimeParseError,
    },
    #[error("Event {0} has a negative RSVP limit")]
    InvalidRsvpLimit(i64),
}

/// Read side of the web application's event tables.
pub struct EventStore {
    conn: Connection,
}

/// Columns for a new `events` row.
pub struct NewEvent<'a> {
    pub name: &'a str,
    pub location: &'a str,
    pub event_type_id: i64,
    pub description: &'a str,
    pub start_time: &'a str,
    pub end_time: &'a str,
    pub rsvp_limit: Option<u32>,
}

struct EventRow {
    id: i64,
    name: String,
    location: String,
    event_type: String,
    description: String,
    start_time: String,
    end_time: String,
    rsvp_limit: Option<i64>,
}

impl EventStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self::new(conn))
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS event_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                event_type_id INTEGER NOT NULL REFERENCES event_types(id),
                description TEXT NOT NULL DEFAULT '',
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                rsvp_limit INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS rsvps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES events(id),
                user_id INTEGER NOT NULL REFERENCES users(id)
            )",
            [],
        )?;

        Ok(())
    }

    pub fn load_all(&self) -> Result<Vec<EventRecord>, StoreError> {
        let mut attendees = self.load_attendees()?;

        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.name, e.location, t.name, e.description,
                    e.start_time, e.end_time, e.rsvp_limit
             FROM events e
             JOIN event_types t ON t.id = e.event_type_id
             ORDER BY e.id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    location: row.get(2)?,
                    event_type: row.get(3)?,
                    description: row.get(4)?,
                    start_time: row.get(5)?,
                    end_time: row.get(6)?,
                    rsvp_limit: row.get(7)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let records = rows
            .into_iter()
            .map(|row| {
                let rsvps = attendees.remove(&row.id).unwrap_or_default();
                Self::into_record(row, rsvps)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!("Loaded {} event records", records.len());
        Ok(records)
    }

    pub fn load_event(&self, id: i64) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.load_all()?.into_iter().find(|record| record.id == id))
    }

    pub fn insert_event_type(&self, name: &str) -> Result<i64, StoreError> {
        self.conn
            .execute("INSERT INTO event_types (name) VALUES (?1)", [name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_user(&self, first_name: &str, last_name: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO users (first_name, last_name) VALUES (?1, ?2)",
            [first_name, last_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_event(&self, event: &NewEvent<'_>) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO events (name, location, event_type_id, description, start_time, end_time, rsvp_limit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                event.name,
                event.location,
                event.event_type_id,
                event.description,
                event.start_time,
                event.end_time,
                event.rsvp_limit,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_rsvp(&self, event_id: i64, user_id: i64) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO rsvps (event_id, user_id) VALUES (?1, ?2)",
            [event_id, user_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn event_count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        );
        result.unwrap_or(0) > 0
    }

    fn load_attendees(&self) -> Result<HashMap<i64, Vec<Attendee>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.event_id, u.first_name, u.last_name
             FROM rsvps r
             JOIN users u ON u.id = r.user_id
             ORDER BY r.id",
        )?;

        let mut attendees: HashMap<i64, Vec<Attendee>> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Attendee::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
            ))
        })?;

        for row in rows {
            let (event_id, attendee) = row?;
            attendees.entry(event_id).or_default().push(attendee);
        }

        Ok(attendees)
    }

    fn into_record(row: EventRow, rsvps: Vec<Attendee>) -> Result<EventRecord, StoreError> {
        let start_time = EventTime::parse(&row.start_time).map_err(|source| {
            StoreError::InvalidTime { id: row.id, field: "start_time", source }
        })?;
        let end_time = EventTime::parse(&row.end_time).map_err(|source| {
            StoreError::InvalidTime { id: row.id, field: "end_time", source }
        })?;
        let rsvp_limit = row
            .rsvp_limit
            .map(|limit| u32::try_from(limit).map_err(|_| StoreError::InvalidRsvpLimit(row.id)))
            .transpose()?;

        Ok(EventRecord {
            id: row.id,
            name: row.name,
            location: row.location,
            event_type: row.event_type,
            description: row.description,
            start_time,
            end_time,
            rsvp_limit,
            rsvps,
        })
    }
}
