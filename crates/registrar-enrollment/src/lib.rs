//! Registrar: Enrollment coordination context.
//!
//! Responsible for the enroll, withdraw, and grading workflows that keep
//! the enrollment store consistent with the catalog's seat counter, the
//! read-side grade and roster queries, and the reconciler that replays
//! failed counter adjustments.

pub mod application;
pub mod domain;
