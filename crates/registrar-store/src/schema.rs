//! Enrollment store database schema.

use sqlx::migrate::Migrator;

/// Embedded migrations for every Registrar table.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Partial unique index enforcing one non-withdrawn record per
/// (course, student) pair.
pub const ACTIVE_PAIR_INDEX: &str = "enrollments_active_pair_idx";

/// Unique constraint on `enrollments.reservation_id`.
pub const RESERVATION_UNIQUE: &str = "enrollments_reservation_id_key";

/// Primary key of `enrollments`.
pub const ENROLLMENTS_PKEY: &str = "enrollments_pkey";
