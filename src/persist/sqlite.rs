//! SQLite-backed key-value gateway.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::{attendance::AttendanceRecord, student::Student, types::Collection};

use super::{Gateway, PersistResult, decode_collection};

/// Stores each collection as one JSON array under its key.
pub struct SqliteGateway {
    conn: Connection,
}

impl SqliteGateway {
    /// Opens or creates a SQLite-backed gateway at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite gateway.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Raw JSON stored under `collection`, if any.
    pub fn read_raw(&self, collection: Collection) -> PersistResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![collection.key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Last write time of `collection` in milliseconds, if ever written.
    pub fn updated_ms(&self, collection: Collection) -> PersistResult<Option<u64>> {
        let ts: Option<i64> = self
            .conn
            .query_row(
                "SELECT updated_ms FROM kv WHERE key = ?1",
                params![collection.key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts.map(|v| v as u64))
    }

    fn write_raw(&mut self, collection: Collection, json: &str) -> PersistResult<()> {
        self.conn.execute(
            "INSERT INTO kv(key, value, updated_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_ms = excluded.updated_ms",
            params![collection.key(), json, now_ms() as i64],
        )?;
        debug!(key = collection.key(), bytes = json.len(), "collection written");
        Ok(())
    }
}

impl Gateway for SqliteGateway {
    fn save_roster(&mut self, students: &[Student]) -> PersistResult<()> {
        let json = serde_json::to_string(students)?;
        self.write_raw(Collection::Roster, &json)
    }

    fn save_ledger(&mut self, records: &[AttendanceRecord]) -> PersistResult<()> {
        let json = serde_json::to_string(records)?;
        self.write_raw(Collection::Ledger, &json)
    }

    fn load_roster(&self) -> PersistResult<Vec<Student>> {
        decode_collection(self.read_raw(Collection::Roster)?.as_deref())
    }

    fn load_ledger(&self) -> PersistResult<Vec<AttendanceRecord>> {
        decode_collection(self.read_raw(Collection::Ledger)?.as_deref())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
