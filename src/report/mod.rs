//! Read-only reporting over copies of the roster and ledger.

/// CSV and JSON exports.
pub mod export;
/// Counts, rates, and breakdowns.
pub mod summary;

use chrono::NaiveDate;

use crate::{attendance::AttendanceRecord, core::registrar::Registrar, student::Student};

use self::{
    export::ExportError,
    summary::{DailySummary, DayCount, GradeStat, ObservationWindow, StudentRate},
};

/// Owned copy of roster and ledger; reports never touch live core state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    /// Roster in insertion order.
    pub students: Vec<Student>,
    /// Ledger in insertion order.
    pub records: Vec<AttendanceRecord>,
}

impl Dataset {
    /// Copies the registrar's current roster and ledger.
    pub fn from_registrar(registrar: &Registrar) -> Self {
        Self {
            students: registrar.directory().export(),
            records: registrar.ledger().export(),
        }
    }

    pub fn summary(&self, date: NaiveDate) -> DailySummary {
        summary::daily_summary(&self.students, &self.records, date)
    }

    pub fn daily_counts(&self, end: NaiveDate, days: u32) -> Vec<DayCount> {
        summary::daily_counts(&self.records, end, days)
    }

    pub fn student_rates(&self, window: ObservationWindow) -> Vec<StudentRate> {
        summary::student_rates(&self.students, &self.records, window)
    }

    pub fn grade_breakdown(&self, window: ObservationWindow) -> Vec<GradeStat> {
        summary::grade_breakdown(&self.students, &self.records, window)
    }

    /// Attendance CSV for one day, ordered by check-in time.
    pub fn attendance_csv(&self, date: NaiveDate) -> Result<String, ExportError> {
        let mut day: Vec<AttendanceRecord> = self
            .records
            .iter()
            .filter(|r| r.calendar_date == date)
            .cloned()
            .collect();
        day.sort_by_key(|r| r.time_of_day);
        export::attendance_csv(&day)
    }

    pub fn roster_csv(&self) -> Result<String, ExportError> {
        export::roster_csv(&self.students)
    }

    pub fn report_json(&self, date: NaiveDate) -> Result<String, ExportError> {
        export::report_json(&self.students, &self.records, date)
    }
}
