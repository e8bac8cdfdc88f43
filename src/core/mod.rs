//! In-memory roster, ledger, and the registration core that owns both.

/// Student directory keyed by code.
pub mod directory;
/// Helper index aliases.
pub mod indices;
/// Attendance ledger with the one-record-per-day rule.
pub mod ledger;
/// Registration core orchestrating directory and ledger.
pub mod registrar;
