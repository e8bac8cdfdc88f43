//! Shared primitive IDs and attendance-related enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic attendance record identifier.
pub type RecordId = u64;

/// Short public student code used as the check-in key.
pub type StudentCode = String;

/// Student gender as captured at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male, stored as `"M"`.
    #[serde(rename = "M")]
    Male,
    /// Female, stored as `"F"`.
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    /// Human-readable label used by roster exports.
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Masculino",
            Gender::Female => "Femenino",
        }
    }
}

/// Attendance state of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttendanceStatus {
    /// Checked in on time.
    #[default]
    #[serde(rename = "presente")]
    Present,
    /// Marked absent by an administrator.
    #[serde(rename = "ausente")]
    Absent,
    /// Checked in late.
    #[serde(rename = "tardanza")]
    Late,
}

/// Which persisted collection a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// The student roster.
    Roster,
    /// The attendance ledger.
    Ledger,
}

impl Collection {
    /// Key under which the collection lives in the local key-value tier.
    pub fn key(self) -> &'static str {
        match self {
            Collection::Roster => "students",
            Collection::Ledger => "attendanceRecords",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
