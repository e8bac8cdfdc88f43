//! In-process key-value gateway holding JSON strings.

use std::sync::{Arc, Mutex};

use hashbrown::HashMap;

use crate::{attendance::AttendanceRecord, student::Student, types::Collection};

use super::{Gateway, PersistError, PersistResult, decode_collection};

/// Clones share the same storage, so a test can keep one to inspect writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON stored under `collection`.
    pub fn raw(&self, collection: Collection) -> PersistResult<Option<String>> {
        let entries = self.lock()?;
        Ok(entries.get(collection.key()).cloned())
    }

    /// Seeds raw JSON, e.g. a payload written by an older client.
    pub fn insert_raw(&self, collection: Collection, json: impl Into<String>) -> PersistResult<()> {
        self.lock()?.insert(collection.key().to_string(), json.into());
        Ok(())
    }

    fn lock(&self) -> PersistResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| PersistError::Message("memory gateway lock poisoned".to_string()))
    }
}

impl Gateway for MemoryGateway {
    fn save_roster(&mut self, students: &[Student]) -> PersistResult<()> {
        let json = serde_json::to_string(students)?;
        self.insert_raw(Collection::Roster, json)
    }

    fn save_ledger(&mut self, records: &[AttendanceRecord]) -> PersistResult<()> {
        let json = serde_json::to_string(records)?;
        self.insert_raw(Collection::Ledger, json)
    }

    fn load_roster(&self) -> PersistResult<Vec<Student>> {
        decode_collection(self.raw(Collection::Roster)?.as_deref())
    }

    fn load_ledger(&self) -> PersistResult<Vec<AttendanceRecord>> {
        decode_collection(self.raw(Collection::Ledger)?.as_deref())
    }
}
