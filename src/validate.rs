//! Field validation for student registration and edits.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::student::{StudentDetails, StudentDraft};

/// Youngest accepted age in years.
pub const MIN_AGE: i32 = 5;
/// Oldest accepted age in years.
pub const MAX_AGE: i32 = 25;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}\s]+$").expect("static regex"));
static DOCUMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8,12}$").expect("static regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{7,10}$").expect("static regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));
static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("static regex"));

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Field name.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "required"));
    }
    Ok(())
}

/// Validates a registration draft against `today`.
pub fn validate_draft(draft: &StudentDraft, today: NaiveDate) -> Result<(), ValidationError> {
    if let Some(code) = &draft.code {
        if !CODE_RE.is_match(code.trim()) {
            return Err(ValidationError::new("code", "must be digits only"));
        }
    }
    required("document_id", &draft.document_id)?;
    if !DOCUMENT_RE.is_match(draft.document_id.trim()) {
        return Err(ValidationError::new("document_id", "must have 8 to 12 digits"));
    }
    validate_details(&draft.details, today)
}

/// Validates editable fields against `today`.
pub fn validate_details(d: &StudentDetails, today: NaiveDate) -> Result<(), ValidationError> {
    required("full_name", &d.full_name)?;
    let name = d.full_name.trim();
    if name.chars().count() < 2 {
        return Err(ValidationError::new("full_name", "must have at least 2 characters"));
    }
    if !NAME_RE.is_match(name) {
        return Err(ValidationError::new("full_name", "only letters are allowed"));
    }

    required("grade", &d.grade)?;
    required("address", &d.address)?;

    required("phone", &d.phone)?;
    let digits: String = d
        .phone
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();
    if !PHONE_RE.is_match(&digits) {
        return Err(ValidationError::new("phone", "invalid phone format"));
    }

    if let Some(email) = d.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        if !EMAIL_RE.is_match(email) {
            return Err(ValidationError::new("email", "invalid email format"));
        }
    }

    let age = today.year() - d.birth_date.year();
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(ValidationError::new(
            "birth_date",
            format!("age must be between {MIN_AGE} and {MAX_AGE} years"),
        ));
    }
    Ok(())
}
