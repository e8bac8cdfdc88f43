//! School attendance tracking: a student roster, a one-check-in-per-day
//! ledger, and local persistence with a best-effort remote mirror.
//!
//! # Examples
//!
//! In-memory usage with [`core::registrar::Registrar`]:
//! ```
//! use chrono::NaiveDate;
//! use rollcall::{
//!     attendance::RegisterOutcome,
//!     core::registrar::Registrar,
//!     student::{StudentDetails, StudentDraft},
//!     types::Gender,
//! };
//!
//! let now = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
//! let mut registrar = Registrar::new();
//! registrar.add_student(StudentDraft {
//!     code: Some("123".to_string()),
//!     document_id: "12345678".to_string(),
//!     details: StudentDetails {
//!         full_name: "Juan Pérez".to_string(),
//!         grade: "10-1".to_string(),
//!         gender: Gender::Male,
//!         address: "Calle 123 #45-67".to_string(),
//!         phone: "555-0123".to_string(),
//!         email: None,
//!         photo_reference: None,
//!         birth_date: NaiveDate::from_ymd_opt(2008, 3, 15).unwrap(),
//!     },
//! }, now).expect("add student");
//!
//! assert!(registrar.register_attendance("123", now).expect("register").is_registered());
//! assert!(matches!(
//!     registrar.register_attendance("123", now),
//!     Ok(RegisterOutcome::AlreadyRegistered(_))
//! ));
//! ```
//!
//! Runtime usage with a SQLite gateway:
//! ```no_run
//! use rollcall::{
//!     core::registrar::Registrar,
//!     persist::sqlite::SqliteGateway,
//!     runtime::handle::{spawn_registrar, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let gateway = SqliteGateway::open("attendance.db").expect("open sqlite");
//! let registrar = Registrar::load(&gateway).expect("load");
//! let handle = spawn_registrar(registrar, Some(Box::new(gateway)), None, RuntimeConfig::default());
//! let outcome = handle.register("123").await.expect("register");
//! println!("{outcome:?}");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Attendance records and registration outcomes.
pub mod attendance;
/// In-memory directory, ledger, and registration core.
pub mod core;
/// Mutation op model.
pub mod op;
/// Local gateway and remote mirror.
pub mod persist;
/// Read-only reports and exports.
pub mod report;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Student records, drafts, and filters.
pub mod student;
/// Shared primitive types and enums.
pub mod types;
/// Registration input validation.
pub mod validate;
