//! Enrollment error types.

use thiserror::Error;
use uuid::Uuid;

use crate::ids::{CourseId, StudentId};
use crate::record::EnrollmentStatus;

/// Top-level error type for enrollment workflows and queries.
#[derive(Debug, Error)]
pub enum EnrollmentError {
    /// Malformed input (blank identifiers, unknown status, empty batches).
    #[error("validation error: {0}")]
    Validation(String),

    /// A grade outside `[0, 100]`.
    #[error("grade must be between 0 and 100, got {0}")]
    InvalidGrade(f64),

    /// The directory service does not know the student.
    #[error("student not found: {0}")]
    StudentNotFound(StudentId),

    /// The catalog service does not know the course.
    #[error("course not found: {0}")]
    CourseNotFound(CourseId),

    /// No enrollment exists with the given identifier.
    #[error("enrollment not found: {0}")]
    EnrollmentNotFound(Uuid),

    /// The course has no free seat.
    #[error("course {0} is at capacity")]
    CapacityExceeded(CourseId),

    /// The student already holds an active enrollment in the course.
    #[error("student {student_id} is already enrolled in course {course_id}")]
    DuplicateEnrollment {
        /// The course.
        course_id: CourseId,
        /// The student.
        student_id: StudentId,
    },

    /// Withdrawal is only allowed from `ENROLLED` before grading begins.
    #[error("enrollment {enrollment_id} cannot be withdrawn: status {status}, graded: {graded}")]
    IllegalWithdrawal {
        /// The enrollment.
        enrollment_id: Uuid,
        /// Its current status.
        status: EnrollmentStatus,
        /// Whether a grade has been assigned.
        graded: bool,
    },

    /// Grades may only be set on `ENROLLED` or `COMPLETED` records.
    #[error("enrollment {enrollment_id} cannot be graded in status {status}")]
    IllegalGradeTransition {
        /// The enrollment.
        enrollment_id: Uuid,
        /// Its current status.
        status: EnrollmentStatus,
    },

    /// A requested status change is not an edge of the state machine.
    #[error("enrollment {enrollment_id} cannot move from {from} to {to}")]
    IllegalStatusTransition {
        /// The enrollment.
        enrollment_id: Uuid,
        /// Current status.
        from: EnrollmentStatus,
        /// Requested status.
        to: EnrollmentStatus,
    },

    /// An idempotency key was replayed with a different course/student pair.
    #[error("idempotency key {0} was already used for a different enrollment request")]
    IdempotencyConflict(Uuid),

    /// Optimistic concurrency conflict on an enrollment record.
    #[error("concurrency conflict on enrollment {enrollment_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The enrollment that had the conflict.
        enrollment_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// The catalog service could not be reached or answered garbage.
    #[error("catalog service unavailable: {0}")]
    CatalogUnavailable(String),

    /// The directory service could not be reached.
    #[error("directory service unavailable: {0}")]
    DirectoryUnavailable(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

/// Coarse classification of an [`EnrollmentError`], used for propagation
/// policy and transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input shape or range.
    Validation,
    /// Student, course, or enrollment absent.
    NotFound,
    /// No seat left.
    CapacityExceeded,
    /// Active enrollment already exists.
    Duplicate,
    /// Bad withdraw, grade, or status transition.
    IllegalStateTransition,
    /// Concurrent modification or idempotency key misuse.
    Conflict,
    /// Network or timeout failure talking to the catalog or directory.
    UpstreamUnavailable,
    /// Storage or other internal failure.
    Internal,
}

impl EnrollmentError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::InvalidGrade(_) => ErrorCategory::Validation,
            Self::StudentNotFound(_) | Self::CourseNotFound(_) | Self::EnrollmentNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::CapacityExceeded(_) => ErrorCategory::CapacityExceeded,
            Self::DuplicateEnrollment { .. } => ErrorCategory::Duplicate,
            Self::IllegalWithdrawal { .. }
            | Self::IllegalGradeTransition { .. }
            | Self::IllegalStatusTransition { .. } => ErrorCategory::IllegalStateTransition,
            Self::IdempotencyConflict(_) | Self::ConcurrencyConflict { .. } => {
                ErrorCategory::Conflict
            }
            Self::CatalogUnavailable(_) | Self::DirectoryUnavailable(_) => {
                ErrorCategory::UpstreamUnavailable
            }
            Self::Infrastructure(_) => ErrorCategory::Internal,
        }
    }
}
