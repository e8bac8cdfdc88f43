//! CSV and JSON exports of the roster, daily attendance, and the summary report.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::{attendance::AttendanceRecord, student::Student};

use super::summary::{counts_as_attended, daily_summary};

pub const ATTENDANCE_HEADER: [&str; 5] = ["Código", "Nombre", "Grado", "Fecha", "Hora"];
pub const ROSTER_HEADER: [&str; 8] = [
    "Código",
    "Nombre",
    "Grado",
    "Género",
    "Documento",
    "Teléfono",
    "Email",
    "Fecha Registro",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn attendance_csv(records: &[AttendanceRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(ATTENDANCE_HEADER)?;
    for rec in records {
        let date = rec.calendar_date.format("%Y-%m-%d").to_string();
        let time = rec.time_of_day.format("%H:%M:%S").to_string();
        wtr.write_record([
            rec.student_code.as_str(),
            rec.student_name.as_str(),
            rec.student_grade.as_str(),
            date.as_str(),
            time.as_str(),
        ])?;
    }
    wtr.flush()?;
    finish(wtr)
}

/// `d/m/yyyy`, unpadded.
fn short_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

pub fn roster_csv(students: &[Student]) -> Result<String, ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(ROSTER_HEADER)?;
    for s in students {
        let registered = short_date(s.registered_at.date());
        wtr.write_record([
            s.code.as_str(),
            s.full_name.as_str(),
            s.grade.as_str(),
            s.gender.label(),
            s.document_id.as_str(),
            s.phone.as_str(),
            s.email.as_deref().unwrap_or(""),
            registered.as_str(),
        ])?;
    }
    wtr.flush()?;
    finish(wtr)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentTotals {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "grado")]
    pub grade: String,
    #[serde(rename = "asistencias")]
    pub attendances: usize,
}

/// Report object exported as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportExport {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "totalEstudiantes")]
    pub total_students: usize,
    #[serde(rename = "asistenciaHoy")]
    pub present_today: usize,
    #[serde(rename = "tasaAsistencia")]
    pub rate_percent: u32,
    #[serde(rename = "estudiantes")]
    pub students: Vec<StudentTotals>,
}

pub fn build_report(
    students: &[Student],
    records: &[AttendanceRecord],
    date: NaiveDate,
) -> ReportExport {
    let summary = daily_summary(students, records, date);
    let totals = students
        .iter()
        .filter(|s| s.active)
        .map(|s| StudentTotals {
            code: s.code.clone(),
            name: s.full_name.clone(),
            grade: s.grade.clone(),
            attendances: records
                .iter()
                .filter(|r| r.student_code == s.code && counts_as_attended(r))
                .count(),
        })
        .collect();
    ReportExport {
        date,
        total_students: summary.total_students,
        present_today: summary.present,
        rate_percent: summary.rate_percent,
        students: totals,
    }
}

pub fn report_json(
    students: &[Student],
    records: &[AttendanceRecord],
    date: NaiveDate,
) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&build_report(students, records, date))?)
}
