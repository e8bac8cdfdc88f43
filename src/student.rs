//! Student record, registration draft, detail edits, and roster filters.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{Gender, StudentCode};

fn default_active() -> bool {
    true
}

/// Fully materialized roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Unique check-in code, immutable once issued.
    #[serde(rename = "codigo")]
    pub code: StudentCode,
    /// Unique external identifier (national id), immutable.
    #[serde(rename = "documento")]
    pub document_id: String,
    /// Display name.
    #[serde(rename = "nombre")]
    pub full_name: String,
    /// Class/section label such as `10-1`.
    #[serde(rename = "grado")]
    pub grade: String,
    /// Gender.
    #[serde(rename = "genero")]
    pub gender: Gender,
    /// Home address.
    #[serde(rename = "direccion")]
    pub address: String,
    /// Contact phone.
    #[serde(rename = "telefono")]
    pub phone: String,
    /// Optional contact email.
    #[serde(rename = "email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Optional photo URL or blob handle.
    #[serde(rename = "foto", default, skip_serializing_if = "Option::is_none")]
    pub photo_reference: Option<String>,
    /// Birth date, only used for registration-time age checks.
    #[serde(rename = "fechaNacimiento")]
    pub birth_date: NaiveDate,
    /// Inactive students cannot check in.
    #[serde(rename = "activo", default = "default_active")]
    pub active: bool,
    /// Creation timestamp.
    #[serde(rename = "fechaRegistro", with = "timestamp")]
    pub registered_at: NaiveDateTime,
}

/// Registration timestamps: written as naive ISO-8601, read from either that
/// or an RFC 3339 string with offset (older clients stored `toISOString()`).
mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, FORMAT) {
            return Ok(naive);
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.naive_utc())
            .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}

/// Insert payload used to create a new [`Student`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentDraft {
    /// Explicit code; `None` lets the directory issue one.
    pub code: Option<StudentCode>,
    /// Unique external identifier.
    pub document_id: String,
    /// Editable detail fields.
    pub details: StudentDetails,
}

/// Editable fields; applied as a full replace on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDetails {
    /// Display name.
    pub full_name: String,
    /// Class/section label.
    pub grade: String,
    /// Gender.
    pub gender: Gender,
    /// Home address.
    pub address: String,
    /// Contact phone.
    pub phone: String,
    /// Optional contact email.
    pub email: Option<String>,
    /// Optional photo reference.
    pub photo_reference: Option<String>,
    /// Birth date.
    pub birth_date: NaiveDate,
}

impl Student {
    /// Builds a stored student from a validated draft and an issued code.
    pub fn from_draft(
        code: StudentCode,
        draft: StudentDraft,
        registered_at: NaiveDateTime,
    ) -> Self {
        let d = draft.details;
        Self {
            code,
            document_id: draft.document_id.trim().to_string(),
            full_name: d.full_name.trim().to_string(),
            grade: d.grade.trim().to_string(),
            gender: d.gender,
            address: d.address.trim().to_string(),
            phone: d.phone.trim().to_string(),
            email: d.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            photo_reference: d.photo_reference,
            birth_date: d.birth_date,
            active: true,
            registered_at,
        }
    }

    /// Current editable fields.
    pub fn details(&self) -> StudentDetails {
        StudentDetails {
            full_name: self.full_name.clone(),
            grade: self.grade.clone(),
            gender: self.gender,
            address: self.address.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            photo_reference: self.photo_reference.clone(),
            birth_date: self.birth_date,
        }
    }

    /// Replaces every editable field; code, document and timestamps stay.
    pub fn apply_details(&mut self, d: StudentDetails) {
        self.full_name = d.full_name.trim().to_string();
        self.grade = d.grade.trim().to_string();
        self.gender = d.gender;
        self.address = d.address.trim().to_string();
        self.phone = d.phone.trim().to_string();
        self.email = d.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        self.photo_reference = d.photo_reference;
        self.birth_date = d.birth_date;
    }

    /// Returns true when this student satisfies every set filter field.
    pub fn matches(&self, filter: &StudentFilter) -> bool {
        if let Some(grade) = &filter.grade {
            if &self.grade != grade {
                return false;
            }
        }
        if let Some(gender) = filter.gender {
            if self.gender != gender {
                return false;
            }
        }
        match filter.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q_lower = q.to_lowercase();
                self.full_name.to_lowercase().contains(&q_lower)
                    || self.code.contains(q)
                    || self.document_id.contains(q)
            }
            _ => true,
        }
    }
}

/// Roster filter; every set field must match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StudentFilter {
    /// Exact grade label.
    pub grade: Option<String>,
    /// Exact gender.
    pub gender: Option<Gender>,
    /// Case-insensitive name match, or substring of code/document.
    pub search: Option<String>,
}

impl StudentFilter {
    /// Filter matching every student.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to one grade.
    pub fn grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }

    /// Restricts to one gender.
    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    /// Adds a free-text search term.
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }
}
