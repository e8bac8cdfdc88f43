use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    attendance::{AttendanceDraft, AttendanceRecord, RegisterOutcome},
    op::Op,
    persist::{Gateway, PersistResult},
    student::{Student, StudentDetails, StudentDraft, StudentFilter},
    types::{AttendanceStatus, RecordId, StudentCode},
    validate::{ValidationError, validate_details, validate_draft},
};

use super::{
    directory::{DirectoryError, StudentDirectory},
    ledger::{AttendanceLedger, LedgerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("student code {0} already exists")]
    DuplicateCode(StudentCode),
    #[error("document {0} is already registered")]
    DuplicateDocument(String),
    #[error("student {code} already has a record for {date}")]
    DuplicateForDay { code: StudentCode, date: NaiveDate },
    #[error("no student with code {0}")]
    StudentNotFound(StudentCode),
    #[error("no attendance record with id {0}")]
    RecordNotFound(RecordId),
    #[error("record id {0} is already in use")]
    RecordIdInUse(RecordId),
    #[error("could not issue a free student code after {0} attempts")]
    CodeSpaceExhausted(usize),
}

impl From<DirectoryError> for CoreError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::DuplicateCode(code) => Self::DuplicateCode(code),
            DirectoryError::DuplicateDocument(doc) => Self::DuplicateDocument(doc),
            DirectoryError::NotFound(code) => Self::StudentNotFound(code),
            DirectoryError::CodeSpaceExhausted(n) => Self::CodeSpaceExhausted(n),
        }
    }
}

impl From<LedgerError> for CoreError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::DuplicateForDay { code, date } => Self::DuplicateForDay { code, date },
            LedgerError::IdInUse(id) => Self::RecordIdInUse(id),
            LedgerError::NotFound(id) => Self::RecordNotFound(id),
        }
    }
}

/// Owns the roster and ledger and runs every mutation against them.
///
/// Each successful mutation queues an [`Op`]; the runtime drains them to know
/// which collections to save and, when a local save fails, to revert them.
#[derive(Debug, Default, Clone)]
pub struct Registrar {
    directory: StudentDirectory,
    ledger: AttendanceLedger,
    pending_ops: Vec<Op>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(directory: StudentDirectory, ledger: AttendanceLedger) -> Self {
        Self {
            directory,
            ledger,
            pending_ops: Vec::new(),
        }
    }

    /// Builds a registrar from the gateway's persisted roster and ledger.
    pub fn load(gateway: &dyn Gateway) -> PersistResult<Self> {
        let students = gateway.load_roster()?;
        let records = gateway.load_ledger()?;
        let directory = StudentDirectory::from_students(students).map_err(CoreError::from)?;
        let ledger = AttendanceLedger::from_records(records).map_err(CoreError::from)?;
        info!(
            students = directory.len(),
            records = ledger.len(),
            "loaded roster and ledger"
        );
        Ok(Self::from_parts(directory, ledger))
    }

    /// Writes both collections through `gateway`.
    pub fn save_all(&self, gateway: &mut dyn Gateway) -> PersistResult<()> {
        gateway.save_roster(&self.directory.export())?;
        gateway.save_ledger(&self.ledger.export())
    }

    pub fn directory(&self) -> &StudentDirectory {
        &self.directory
    }

    pub fn ledger(&self) -> &AttendanceLedger {
        &self.ledger
    }

    pub fn register_attendance(
        &mut self,
        code: &str,
        now: NaiveDateTime,
    ) -> Result<RegisterOutcome, CoreError> {
        self.register_attendance_with(code, now, AttendanceStatus::Present, None)
    }

    /// Checks a student in for the calendar day of `now`.
    ///
    /// Every business outcome is a [`RegisterOutcome`]; `Err` only means the
    /// ledger could not take the record at all (record id space exhausted).
    pub fn register_attendance_with(
        &mut self,
        code: &str,
        now: NaiveDateTime,
        status: AttendanceStatus,
        notes: Option<String>,
    ) -> Result<RegisterOutcome, CoreError> {
        let code = code.trim();
        let Some(student) = self.directory.find_by_code(code) else {
            debug!(code, "check-in for unknown code");
            return Ok(RegisterOutcome::StudentNotFound);
        };
        if !student.active {
            debug!(code, "check-in for inactive student");
            return Ok(RegisterOutcome::StudentInactive);
        }

        let date = now.date();
        if let Some(existing) = self.ledger.find_for_day(code, date) {
            return Ok(RegisterOutcome::AlreadyRegistered(existing.clone()));
        }

        let draft = AttendanceDraft {
            student_code: student.code.clone(),
            student_name: student.full_name.clone(),
            student_grade: student.grade.clone(),
            calendar_date: date,
            time_of_day: now.time(),
            status,
            notes: notes.filter(|n| !n.trim().is_empty()),
        };

        match self.ledger.add(draft) {
            Ok(rec) => {
                let rec = rec.clone();
                info!(code, id = rec.id, %date, "attendance registered");
                self.pending_ops.push(Op::AddRecord {
                    record: rec.clone(),
                });
                Ok(RegisterOutcome::Registered(rec))
            }
            Err(err @ LedgerError::DuplicateForDay { .. }) => self
                .ledger
                .find_for_day(code, date)
                .map(|existing| RegisterOutcome::AlreadyRegistered(existing.clone()))
                .ok_or_else(|| CoreError::from(err)),
            Err(err) => {
                error!(code, %date, error = %err, "ledger rejected check-in");
                Err(err.into())
            }
        }
    }

    /// Administrative removal of one record; the day becomes registrable again.
    pub fn remove_record(&mut self, id: RecordId) -> Result<AttendanceRecord, CoreError> {
        let position = self.ledger.position(id).ok_or(CoreError::RecordNotFound(id))?;
        let rec = self.ledger.remove(id)?;
        info!(id, code = %rec.student_code, "attendance record removed");
        self.pending_ops.push(Op::RemoveRecord {
            record: rec.clone(),
            position,
        });
        Ok(rec)
    }

    /// Validates and inserts a student, issuing a code when the draft has none.
    ///
    /// Nothing is inserted unless every check passes.
    pub fn add_student(
        &mut self,
        draft: StudentDraft,
        now: NaiveDateTime,
    ) -> Result<Student, CoreError> {
        validate_draft(&draft, now.date())?;

        let code = match draft.code.as_deref().map(str::trim) {
            Some(code) => code.to_string(),
            None => self.directory.issue_code()?,
        };
        let student = Student::from_draft(code, draft, now);
        let stored = self.directory.add(student)?.clone();
        info!(code = %stored.code, grade = %stored.grade, "student added");
        self.pending_ops.push(Op::AddStudent {
            student: stored.clone(),
        });
        Ok(stored)
    }

    pub fn update_student(
        &mut self,
        code: &str,
        details: StudentDetails,
        today: NaiveDate,
    ) -> Result<Student, CoreError> {
        if !self.directory.contains_code(code) {
            return Err(CoreError::StudentNotFound(code.to_string()));
        }
        validate_details(&details, today)?;
        let prev = self.directory.update_details(code, details)?;
        self.pending_ops.push(Op::UpdateStudent {
            code: code.to_string(),
            prev,
        });
        info!(code, "student details updated");
        self.student_cloned(code)
    }

    /// Soft-deletes or reactivates a student.
    pub fn set_active(&mut self, code: &str, active: bool) -> Result<Student, CoreError> {
        let prev = self.directory.set_active(code, active)?;
        if prev != active {
            info!(code, active, "student active flag changed");
            self.pending_ops.push(Op::SetActive {
                code: code.to_string(),
                prev,
            });
        }
        self.student_cloned(code)
    }

    pub fn find_student(&self, code: &str) -> Option<&Student> {
        self.directory.find_by_code(code.trim())
    }

    pub fn list_students(&self, filter: &StudentFilter) -> Vec<Student> {
        self.directory.list_cloned(filter)
    }

    pub fn list_attendance(&self, date: NaiveDate) -> Vec<AttendanceRecord> {
        self.ledger.list_for_date_cloned(date)
    }

    pub fn list_for_student(&self, code: &str) -> Vec<AttendanceRecord> {
        self.ledger.list_for_student_cloned(code)
    }

    pub fn suggest(&self, query: &str, limit: usize) -> Vec<Student> {
        self.directory
            .suggest(query, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn drain_pending_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Undoes a previously applied op without queueing a new one.
    pub fn revert(&mut self, op: Op) -> Result<(), CoreError> {
        match op {
            Op::AddStudent { student } => {
                self.directory
                    .remove(&student.code)
                    .ok_or(CoreError::StudentNotFound(student.code))?;
            }
            Op::UpdateStudent { code, prev } => {
                self.directory.update_details(&code, prev)?;
            }
            Op::SetActive { code, prev } => {
                self.directory.set_active(&code, prev)?;
            }
            Op::AddRecord { record } => {
                self.ledger.remove(record.id)?;
            }
            Op::RemoveRecord { record, position } => {
                self.ledger.insert_at(record, position)?;
            }
        }
        Ok(())
    }

    fn student_cloned(&self, code: &str) -> Result<Student, CoreError> {
        self.directory
            .find_by_code(code)
            .cloned()
            .ok_or_else(|| CoreError::StudentNotFound(code.to_string()))
    }
}
