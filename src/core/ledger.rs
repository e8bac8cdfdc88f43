use chrono::NaiveDate;
use hashbrown::{HashMap, HashSet};
use thiserror::Error;

use crate::{
    attendance::{AttendanceDraft, AttendanceRecord},
    types::{RecordId, StudentCode},
};

use super::indices::{VecIndex, remove_from_vec_index, reposition_in_vec_index};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("student {code} already has a record for {date}")]
    DuplicateForDay { code: StudentCode, date: NaiveDate },
    #[error("record id {0} is already in use")]
    IdInUse(RecordId),
    #[error("no attendance record with id {0}")]
    NotFound(RecordId),
}

/// All attendance records, at most one per student and day.
#[derive(Debug, Clone)]
pub struct AttendanceLedger {
    records: HashMap<RecordId, AttendanceRecord>,
    order: Vec<RecordId>,
    by_day: HashMap<(StudentCode, NaiveDate), RecordId>,
    by_date: VecIndex<NaiveDate>,
    by_student: VecIndex<StudentCode>,
    next_id: RecordId,
}

impl Default for AttendanceLedger {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            by_day: HashMap::new(),
            by_date: VecIndex::new(),
            by_student: VecIndex::new(),
            next_id: 1,
        }
    }
}

impl AttendanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from persisted records, enforcing one record per day.
    pub fn from_records(records: Vec<AttendanceRecord>) -> Result<Self, LedgerError> {
        let mut ledger = Self::new();
        for rec in records {
            ledger.insert(rec)?;
        }
        Ok(ledger)
    }

    pub fn has_record(&self, code: &str, date: NaiveDate) -> bool {
        self.find_for_day(code, date).is_some()
    }

    pub fn find_for_day(&self, code: &str, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.by_day
            .get(&(code.to_string(), date))
            .and_then(|id| self.records.get(id))
    }

    /// Assigns the next id and appends the record.
    ///
    /// This is the authoritative uniqueness check: callers that already
    /// looked at [`Self::has_record`] still get `DuplicateForDay` here if the
    /// day was taken in between.
    pub fn add(&mut self, draft: AttendanceDraft) -> Result<&AttendanceRecord, LedgerError> {
        if self.has_record(&draft.student_code, draft.calendar_date) {
            return Err(LedgerError::DuplicateForDay {
                code: draft.student_code,
                date: draft.calendar_date,
            });
        }
        let id = self.next_id;
        self.insert(draft.into_record(id))
    }

    /// Appends a record that already carries its id.
    pub fn insert(&mut self, rec: AttendanceRecord) -> Result<&AttendanceRecord, LedgerError> {
        if self.records.contains_key(&rec.id) {
            return Err(LedgerError::IdInUse(rec.id));
        }
        let day_key = (rec.student_code.clone(), rec.calendar_date);
        if self.by_day.contains_key(&day_key) {
            return Err(LedgerError::DuplicateForDay {
                code: rec.student_code,
                date: rec.calendar_date,
            });
        }

        let id = rec.id;
        self.next_id = self.next_id.max(id.saturating_add(1));
        self.by_day.insert(day_key, id);
        self.by_date.entry(rec.calendar_date).or_default().push(id);
        self.by_student
            .entry(rec.student_code.clone())
            .or_default()
            .push(id);
        self.order.push(id);
        Ok(self.records.entry(id).or_insert(rec))
    }

    pub fn remove(&mut self, id: RecordId) -> Result<AttendanceRecord, LedgerError> {
        let rec = self.records.remove(&id).ok_or(LedgerError::NotFound(id))?;
        self.by_day
            .remove(&(rec.student_code.clone(), rec.calendar_date));
        remove_from_vec_index(&mut self.by_date, &rec.calendar_date, id);
        remove_from_vec_index(&mut self.by_student, &rec.student_code, id);
        if let Some(pos) = self.order.iter().position(|x| *x == id) {
            self.order.remove(pos);
        }
        Ok(rec)
    }

    /// Puts a previously removed record back at `position` in insertion order.
    pub fn insert_at(
        &mut self,
        rec: AttendanceRecord,
        position: usize,
    ) -> Result<&AttendanceRecord, LedgerError> {
        let id = rec.id;
        let date = rec.calendar_date;
        let code = rec.student_code.clone();
        self.insert(rec)?;

        self.order.pop();
        let position = position.min(self.order.len());
        self.order.insert(position, id);
        let before: HashSet<RecordId> = self.order[..position].iter().copied().collect();
        reposition_in_vec_index(&mut self.by_date, &date, id, &before);
        reposition_in_vec_index(&mut self.by_student, &code, id, &before);
        self.records.get(&id).ok_or(LedgerError::NotFound(id))
    }

    /// Index of `id` in insertion order.
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.order.iter().position(|x| *x == id)
    }

    pub fn get(&self, id: RecordId) -> Option<&AttendanceRecord> {
        self.records.get(&id)
    }

    /// Records for `date` in insertion order. Calling again restarts the walk.
    pub fn for_date(&self, date: NaiveDate) -> impl Iterator<Item = &AttendanceRecord> + '_ {
        self.by_date
            .get(&date)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
    }

    /// Records for `date`, ordered by time of day; ties keep insertion order.
    pub fn list_for_date(&self, date: NaiveDate) -> Vec<&AttendanceRecord> {
        let mut out: Vec<_> = self.for_date(date).collect();
        out.sort_by_key(|r| r.time_of_day);
        out
    }

    pub fn list_for_date_cloned(&self, date: NaiveDate) -> Vec<AttendanceRecord> {
        self.list_for_date(date).into_iter().cloned().collect()
    }

    pub fn list_for_student<'a>(
        &'a self,
        code: &str,
    ) -> impl Iterator<Item = &'a AttendanceRecord> + 'a {
        self.by_student
            .get(code)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
    }

    pub fn list_for_student_cloned(&self, code: &str) -> Vec<AttendanceRecord> {
        self.list_for_student(code).cloned().collect()
    }

    pub fn count_for_date(&self, date: NaiveDate) -> usize {
        self.by_date.get(&date).map_or(0, Vec::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttendanceRecord> + '_ {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn ordered_ids(&self) -> &[RecordId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn next_id(&self) -> RecordId {
        self.next_id
    }

    pub fn export(&self) -> Vec<AttendanceRecord> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::types::AttendanceStatus;

    fn draft(code: &str, day: u32, hour: u32) -> AttendanceDraft {
        AttendanceDraft {
            student_code: code.to_string(),
            student_name: format!("Student {code}"),
            student_grade: "10-1".to_string(),
            calendar_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            time_of_day: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            status: AttendanceStatus::Present,
            notes: None,
        }
    }

    #[test]
    fn add_rejects_second_record_for_same_day() {
        let mut ledger = AttendanceLedger::new();
        ledger.add(draft("123", 1, 8)).unwrap();
        let err = ledger.add(draft("123", 1, 9)).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateForDay { .. }));
        assert_eq!(ledger.len(), 1);

        ledger.add(draft("123", 2, 8)).unwrap();
        ledger.add(draft("124", 1, 8)).unwrap();
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn list_for_date_sorts_by_time_keeping_ties_stable() {
        let mut ledger = AttendanceLedger::new();
        let late = ledger.add(draft("1", 1, 10)).unwrap().id;
        let tie_a = ledger.add(draft("2", 1, 8)).unwrap().id;
        let tie_b = ledger.add(draft("3", 1, 8)).unwrap().id;
        ledger.add(draft("4", 2, 7)).unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let ids: Vec<_> = ledger.list_for_date(day).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![tie_a, tie_b, late]);
        assert_eq!(ledger.count_for_date(day), 3);
    }

    #[test]
    fn remove_frees_the_day_and_keeps_ids_monotonic() {
        let mut ledger = AttendanceLedger::new();
        let id = ledger.add(draft("123", 1, 8)).unwrap().id;
        ledger.remove(id).unwrap();
        assert_eq!(ledger.remove(id), Err(LedgerError::NotFound(id)));
        assert!(ledger.list_for_student("123").next().is_none());

        let again = ledger.add(draft("123", 1, 9)).unwrap().id;
        assert!(again > id);
    }

    #[test]
    fn insert_at_restores_order_and_indices() {
        let mut ledger = AttendanceLedger::new();
        let a = ledger.add(draft("1", 1, 8)).unwrap().id;
        let b = ledger.add(draft("2", 1, 9)).unwrap().id;
        let c = ledger.add(draft("1", 2, 8)).unwrap().id;
        let d = ledger.add(draft("3", 1, 9)).unwrap().id;

        let pos = ledger.position(b).unwrap();
        let rec = ledger.remove(b).unwrap();
        ledger.insert_at(rec, pos).unwrap();
        assert_eq!(ledger.ordered_ids(), &[a, b, c, d]);

        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let ids: Vec<_> = ledger.for_date(day).map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b, d]);

        let rec = ledger.remove(a).unwrap();
        ledger.insert_at(rec, 0).unwrap();
        let ids: Vec<_> = ledger.list_for_student("1").map(|r| r.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(ledger.ordered_ids(), &[a, b, c, d]);
    }

    #[test]
    fn from_records_resumes_ids_after_max() {
        let rec = draft("9", 3, 8).into_record(41);
        let ledger = AttendanceLedger::from_records(vec![rec]).unwrap();
        assert_eq!(ledger.next_id(), 42);
    }
}
