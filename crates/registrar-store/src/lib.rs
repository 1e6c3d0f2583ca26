//! Registrar: PostgreSQL persistence.
//!
//! Implements the enrollment store and the compensation log on top of a
//! shared `PgPool`. The schema lives in the workspace `migrations/`
//! directory and is applied through [`schema::MIGRATOR`].

pub mod pg_compensation_log;
pub mod pg_enrollment_repository;
pub mod schema;

pub use pg_compensation_log::PgCompensationLog;
pub use pg_enrollment_repository::PgEnrollmentRepository;
