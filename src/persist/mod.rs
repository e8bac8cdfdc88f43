//! Local persistence gateway and best-effort remote mirror.

/// In-process key-value gateway.
pub mod memory;
/// Remote mirror trait and HTTP implementation.
pub mod remote;
/// SQLite key-value gateway.
pub mod sqlite;

use thiserror::Error;

use crate::{attendance::AttendanceRecord, core::registrar::CoreError, student::Student};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("persisted state is inconsistent: {0}")]
    Corrupt(#[from] CoreError),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable local tier for the roster and the ledger.
///
/// Calls are synchronous; a failure is fatal to the operation that triggered
/// the save.
pub trait Gateway: Send {
    fn save_roster(&mut self, students: &[Student]) -> PersistResult<()>;
    fn save_ledger(&mut self, records: &[AttendanceRecord]) -> PersistResult<()>;
    fn load_roster(&self) -> PersistResult<Vec<Student>>;
    fn load_ledger(&self) -> PersistResult<Vec<AttendanceRecord>>;
}

pub(crate) fn decode_collection<T>(payload: Option<&str>) -> PersistResult<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    match payload {
        Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(json)?),
        _ => Ok(Vec::new()),
    }
}
