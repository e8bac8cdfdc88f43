use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use rand::Rng;
use thiserror::Error;

use crate::{
    student::{Student, StudentDetails, StudentFilter},
    types::StudentCode,
};

/// Attempts made before giving up on issuing a fresh code.
const CODE_ATTEMPTS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("student code {0} already exists")]
    DuplicateCode(StudentCode),
    #[error("document {0} is already registered")]
    DuplicateDocument(String),
    #[error("no student with code {0}")]
    NotFound(StudentCode),
    #[error("could not issue a free student code after {0} attempts")]
    CodeSpaceExhausted(usize),
}

/// Roster keyed by code, with a unique document index.
#[derive(Debug, Default, Clone)]
pub struct StudentDirectory {
    students: HashMap<StudentCode, Student>,
    order: Vec<StudentCode>,
    by_document: HashMap<String, StudentCode>,
}

impl StudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a directory, enforcing uniqueness on every student.
    pub fn from_students(students: Vec<Student>) -> Result<Self, DirectoryError> {
        let mut dir = Self::new();
        for student in students {
            dir.add(student)?;
        }
        Ok(dir)
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Student> {
        self.students.get(code)
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.students.contains_key(code)
    }

    pub fn contains_document(&self, document_id: &str) -> bool {
        self.by_document.contains_key(document_id)
    }

    pub fn add(&mut self, student: Student) -> Result<&Student, DirectoryError> {
        if self.students.contains_key(&student.code) {
            return Err(DirectoryError::DuplicateCode(student.code));
        }
        if self.by_document.contains_key(&student.document_id) {
            return Err(DirectoryError::DuplicateDocument(student.document_id));
        }

        let code = student.code.clone();
        self.by_document
            .insert(student.document_id.clone(), code.clone());
        self.order.push(code.clone());
        Ok(self.students.entry(code).or_insert(student))
    }

    /// Sets the active flag, returning the previous value.
    pub fn set_active(&mut self, code: &str, active: bool) -> Result<bool, DirectoryError> {
        let student = self
            .students
            .get_mut(code)
            .ok_or_else(|| DirectoryError::NotFound(code.to_string()))?;
        let prev = student.active;
        student.active = active;
        Ok(prev)
    }

    /// Replaces editable details, returning the previous ones.
    pub fn update_details(
        &mut self,
        code: &str,
        details: StudentDetails,
    ) -> Result<StudentDetails, DirectoryError> {
        let student = self
            .students
            .get_mut(code)
            .ok_or_else(|| DirectoryError::NotFound(code.to_string()))?;
        let prev = student.details();
        student.apply_details(details);
        Ok(prev)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> + '_ {
        self.order.iter().filter_map(|code| self.students.get(code))
    }

    pub fn list<'a>(&'a self, filter: &'a StudentFilter) -> impl Iterator<Item = &'a Student> + 'a {
        self.iter().filter(move |s| s.matches(filter))
    }

    pub fn list_cloned(&self, filter: &StudentFilter) -> Vec<Student> {
        self.list(filter).cloned().collect()
    }

    /// Live-search suggestions for a partially typed code or name.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<&Student> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Vec::new();
        }
        let lower = query.to_lowercase();
        self.iter()
            .filter(|s| s.code.contains(query) || s.full_name.to_lowercase().contains(&lower))
            .take(limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.students.values().filter(|s| s.active).count()
    }

    pub fn export(&self) -> Vec<Student> {
        self.iter().cloned().collect()
    }

    /// Issues an unused 5-digit code: three random digits plus the clock's last two.
    pub fn issue_code(&self) -> Result<StudentCode, DirectoryError> {
        let mut rng = rand::thread_rng();
        for _ in 0..CODE_ATTEMPTS {
            let random: u32 = rng.gen_range(100..=999);
            let code = format!("{random}{:02}", now_ms() % 100);
            if !self.students.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(DirectoryError::CodeSpaceExhausted(CODE_ATTEMPTS))
    }

    pub(crate) fn remove(&mut self, code: &str) -> Option<Student> {
        let student = self.students.remove(code)?;
        self.by_document.remove(&student.document_id);
        if let Some(pos) = self.order.iter().position(|c| c == code) {
            self.order.remove(pos);
        }
        Some(student)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
