//! Runtime event stream payloads.

use crate::types::{Collection, RecordId, StudentCode};

/// Events emitted from the single-writer runtime loop and its workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceEvent {
    /// A new attendance record was created.
    Registered {
        /// Record id.
        id: RecordId,
        /// Student code.
        code: StudentCode,
    },
    /// A check-in hit an existing record for the day.
    AlreadyRegistered {
        /// Existing record id.
        id: RecordId,
        /// Student code.
        code: StudentCode,
    },
    /// A record was removed by an administrator.
    RecordRemoved {
        /// Removed record id.
        id: RecordId,
    },
    /// A student joined the roster.
    StudentAdded {
        /// Issued code.
        code: StudentCode,
    },
    /// A student's details were replaced.
    StudentUpdated {
        /// Student code.
        code: StudentCode,
    },
    /// A student was deactivated or reactivated.
    StudentActiveChanged {
        /// Student code.
        code: StudentCode,
        /// New flag value.
        active: bool,
    },
    /// A collection reached the local store.
    Saved {
        /// Saved collection.
        collection: Collection,
    },
    /// A background local save failed.
    PersistFailed {
        /// Affected collection.
        collection: Collection,
        /// Failure description.
        message: String,
    },
    /// The remote mirror accepted a collection.
    Synced {
        /// Mirrored collection.
        collection: Collection,
    },
    /// The remote mirror failed; local state is unaffected.
    SyncWarning {
        /// Affected collection.
        collection: Collection,
        /// Failure description.
        message: String,
    },
}
