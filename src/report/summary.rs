//! Counts and rates over a roster and ledger.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::{
    attendance::AttendanceRecord,
    student::Student,
    types::{AttendanceStatus, StudentCode},
};

/// Absent-marked records do not count as attendance.
pub(crate) fn counts_as_attended(rec: &AttendanceRecord) -> bool {
    rec.status != AttendanceStatus::Absent
}

fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

/// Headline numbers for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Active students on the roster.
    pub total_students: usize,
    pub present: usize,
    pub absent: usize,
    pub rate_percent: u32,
}

pub fn daily_summary(
    students: &[Student],
    records: &[AttendanceRecord],
    date: NaiveDate,
) -> DailySummary {
    let active: HashSet<&str> = students
        .iter()
        .filter(|s| s.active)
        .map(|s| s.code.as_str())
        .collect();
    let total_students = active.len();
    let present = records
        .iter()
        .filter(|r| r.calendar_date == date && counts_as_attended(r))
        .filter(|r| active.contains(r.student_code.as_str()))
        .count();
    DailySummary {
        date,
        total_students,
        present,
        absent: total_students.saturating_sub(present),
        rate_percent: percent(present as u64, total_students as u64),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Per-day record counts for the `days` days ending at `end`, oldest first.
pub fn daily_counts(records: &[AttendanceRecord], end: NaiveDate, days: u32) -> Vec<DayCount> {
    let mut by_date: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for rec in records.iter().filter(|r| counts_as_attended(r)) {
        *by_date.entry(rec.calendar_date).or_insert(0) += 1;
    }
    if days == 0 {
        return Vec::new();
    }
    ObservationWindow::new(end, days)
        .start()
        .iter_days()
        .take_while(|date| *date <= end)
        .map(|date| DayCount {
            date,
            count: by_date.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

/// Inclusive range of `days` calendar days ending at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWindow {
    pub end: NaiveDate,
    pub days: u32,
}

impl ObservationWindow {
    pub fn new(end: NaiveDate, days: u32) -> Self {
        Self { end, days }
    }

    /// First day of the window; equals `end` for empty windows and stops at
    /// the earliest representable date.
    pub fn start(&self) -> NaiveDate {
        self.end
            .checked_sub_days(Days::new(u64::from(self.days.saturating_sub(1))))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days > 0 && date >= self.start() && date <= self.end
    }

    /// Days in the window on which a student enrolled on `enrolled` could attend.
    pub fn observed_days(&self, enrolled: NaiveDate) -> u64 {
        if self.days == 0 || enrolled > self.end {
            return 0;
        }
        let from = enrolled.max(self.start());
        (self.end - from).num_days() as u64 + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRate {
    pub code: StudentCode,
    pub name: String,
    pub grade: String,
    pub attended: u64,
    pub observed_days: u64,
    pub rate_percent: u32,
}

pub fn student_rates(
    students: &[Student],
    records: &[AttendanceRecord],
    window: ObservationWindow,
) -> Vec<StudentRate> {
    let enrolled: HashMap<&str, NaiveDate> = students
        .iter()
        .map(|s| (s.code.as_str(), s.registered_at.date()))
        .collect();
    let mut attended: BTreeMap<&str, u64> = BTreeMap::new();
    for rec in records
        .iter()
        .filter(|r| window.contains(r.calendar_date) && counts_as_attended(r))
    {
        // Records dated before enrollment fall outside the observed days.
        let code = rec.student_code.as_str();
        if enrolled.get(code).is_some_and(|from| rec.calendar_date >= *from) {
            *attended.entry(code).or_insert(0) += 1;
        }
    }

    students
        .iter()
        .map(|s| {
            let observed = window.observed_days(s.registered_at.date());
            let count = attended.get(s.code.as_str()).copied().unwrap_or(0);
            StudentRate {
                code: s.code.clone(),
                name: s.full_name.clone(),
                grade: s.grade.clone(),
                attended: count,
                observed_days: observed,
                rate_percent: percent(count, observed),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeStat {
    pub grade: String,
    pub students: usize,
    pub attended: u64,
    pub observed_days: u64,
    pub rate_percent: u32,
}

/// Per-grade totals, sorted by grade label.
pub fn grade_breakdown(
    students: &[Student],
    records: &[AttendanceRecord],
    window: ObservationWindow,
) -> Vec<GradeStat> {
    let mut grades: BTreeMap<String, GradeStat> = BTreeMap::new();
    for rate in student_rates(students, records, window) {
        let stat = grades.entry(rate.grade.clone()).or_insert_with(|| GradeStat {
            grade: rate.grade.clone(),
            students: 0,
            attended: 0,
            observed_days: 0,
            rate_percent: 0,
        });
        stat.students += 1;
        stat.attended += rate.attended;
        stat.observed_days += rate.observed_days;
    }
    grades
        .into_values()
        .map(|mut stat| {
            stat.rate_percent = percent(stat.attended, stat.observed_days);
            stat
        })
        .collect()
}

pub fn top_students(mut rates: Vec<StudentRate>, n: usize) -> Vec<StudentRate> {
    rates.sort_by(|a, b| b.rate_percent.cmp(&a.rate_percent).then_with(|| a.code.cmp(&b.code)));
    rates.truncate(n);
    rates
}

pub fn top_grades(mut grades: Vec<GradeStat>, n: usize) -> Vec<GradeStat> {
    grades.sort_by(|a, b| b.rate_percent.cmp(&a.rate_percent).then_with(|| a.grade.cmp(&b.grade)));
    grades.truncate(n);
    grades
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn window_clamps_to_enrollment() {
        let window = ObservationWindow::new(day(30), 30);
        assert_eq!(window.start(), day(1));
        assert_eq!(window.observed_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), 30);
        assert_eq!(window.observed_days(day(21)), 10);
        assert_eq!(window.observed_days(day(31)), 0);
        assert!(!ObservationWindow::new(day(30), 0).contains(day(30)));
    }

    #[test]
    fn windows_reaching_past_the_calendar_stop_at_min_date() {
        let near_min = NaiveDate::MIN + Days::new(2);
        let window = ObservationWindow::new(near_min, u32::MAX);
        assert_eq!(window.start(), NaiveDate::MIN);
        assert!(window.contains(NaiveDate::MIN));
        assert_eq!(window.observed_days(NaiveDate::MIN), 3);

        let counts = daily_counts(&[], near_min, u32::MAX);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[0].date, NaiveDate::MIN);
        assert!(daily_counts(&[], near_min, 0).is_empty());
    }

    #[test]
    fn percent_rounds_half_up_and_handles_zero() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 0), 0);
    }
}
