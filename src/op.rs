//! Mutation operation model.

use crate::{
    attendance::AttendanceRecord,
    student::{Student, StudentDetails},
    types::{Collection, StudentCode},
};

/// Mutation applied by the registrar, carrying what is needed to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A student was added to the roster.
    AddStudent {
        /// Inserted student.
        student: Student,
    },
    /// Detail fields of a student were replaced.
    UpdateStudent {
        /// Student code.
        code: StudentCode,
        /// Details before the edit.
        prev: StudentDetails,
    },
    /// The active flag of a student changed.
    SetActive {
        /// Student code.
        code: StudentCode,
        /// Previous flag value.
        prev: bool,
    },
    /// A record was appended to the ledger.
    AddRecord {
        /// Inserted record.
        record: AttendanceRecord,
    },
    /// A record was removed from the ledger.
    RemoveRecord {
        /// Removed record.
        record: AttendanceRecord,
        /// Index the record held in ledger order.
        position: usize,
    },
}

impl Op {
    /// Collection that must be saved after this op.
    pub fn collection(&self) -> Collection {
        match self {
            Op::AddStudent { .. } | Op::UpdateStudent { .. } | Op::SetActive { .. } => {
                Collection::Roster
            }
            Op::AddRecord { .. } | Op::RemoveRecord { .. } => Collection::Ledger,
        }
    }
}
