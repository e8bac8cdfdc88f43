//! Attendance record, draft, and registration outcome types.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::{AttendanceStatus, RecordId, StudentCode};

/// One check-in for one student on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Stable record identifier.
    pub id: RecordId,
    /// Code of the student this record belongs to.
    #[serde(rename = "studentCode")]
    pub student_code: StudentCode,
    /// Student name at the time of check-in.
    #[serde(rename = "studentName", default)]
    pub student_name: String,
    /// Student grade at the time of check-in.
    #[serde(rename = "studentGrade", default)]
    pub student_grade: String,
    /// Day the record applies to; the de-duplication key.
    #[serde(rename = "fecha")]
    pub calendar_date: NaiveDate,
    /// Wall-clock time of the check-in.
    #[serde(rename = "hora")]
    pub time_of_day: NaiveTime,
    /// Attendance state.
    #[serde(rename = "estado", default)]
    pub status: AttendanceStatus,
    /// Optional free-text notes.
    #[serde(rename = "observaciones", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Insert payload used to create a new [`AttendanceRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceDraft {
    /// Code of the student checking in.
    pub student_code: StudentCode,
    /// Student name copied into the record.
    pub student_name: String,
    /// Student grade copied into the record.
    pub student_grade: String,
    /// Day the record applies to.
    pub calendar_date: NaiveDate,
    /// Wall-clock time of the check-in.
    pub time_of_day: NaiveTime,
    /// Attendance state.
    pub status: AttendanceStatus,
    /// Optional notes.
    pub notes: Option<String>,
}

impl AttendanceDraft {
    /// Materializes the draft under `id`.
    pub fn into_record(self, id: RecordId) -> AttendanceRecord {
        AttendanceRecord {
            id,
            student_code: self.student_code,
            student_name: self.student_name,
            student_grade: self.student_grade,
            calendar_date: self.calendar_date,
            time_of_day: self.time_of_day,
            status: self.status,
            notes: self.notes,
        }
    }
}

/// Result classification of a check-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new record was created.
    Registered(AttendanceRecord),
    /// The student already has a record for that day; carries it.
    AlreadyRegistered(AttendanceRecord),
    /// No student has that code.
    StudentNotFound,
    /// The student exists but is inactive.
    StudentInactive,
}

impl RegisterOutcome {
    /// Returns the newly created record, if any.
    pub fn registered(&self) -> Option<&AttendanceRecord> {
        match self {
            RegisterOutcome::Registered(rec) => Some(rec),
            _ => None,
        }
    }

    /// True when this attempt created a record.
    pub fn is_registered(&self) -> bool {
        matches!(self, RegisterOutcome::Registered(_))
    }
}
