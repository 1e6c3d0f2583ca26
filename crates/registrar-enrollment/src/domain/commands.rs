//! Commands for the Enrollment context.

use std::collections::BTreeMap;

use registrar_core::ids::{CourseId, StudentId};
use registrar_core::record::EnrollmentStatus;
use uuid::Uuid;

/// Command to enroll a student in a course.
#[derive(Debug, Clone)]
pub struct EnrollStudent {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Client-supplied key; replaying it returns the original enrollment
    /// instead of taking a second seat.
    pub idempotency_key: Uuid,
    /// The course identifier.
    pub course_id: CourseId,
    /// The student identifier.
    pub student_id: StudentId,
}

/// Command to withdraw a student from a course.
#[derive(Debug, Clone)]
pub struct WithdrawStudent {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The course identifier.
    pub course_id: CourseId,
    /// The student identifier.
    pub student_id: StudentId,
}

/// Command to set the grade of one enrollment.
#[derive(Debug, Clone)]
pub struct UpdateGrade {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The enrollment identifier.
    pub enrollment_id: Uuid,
    /// The raw grade, validated by the handler.
    pub grade: f64,
}

/// Command to grade several students of a course at once.
#[derive(Debug, Clone)]
pub struct BatchUpdateGrades {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The course identifier.
    pub course_id: CourseId,
    /// Raw grades keyed by student, validated by the handler.
    pub grades: BTreeMap<StudentId, f64>,
}

/// Command to move an enrollment to another status.
#[derive(Debug, Clone)]
pub struct UpdateStatus {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The enrollment identifier.
    pub enrollment_id: Uuid,
    /// The requested status.
    pub status: EnrollmentStatus,
}

/// Administrative command to delete an enrollment record.
#[derive(Debug, Clone)]
pub struct DeleteEnrollment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The enrollment identifier.
    pub enrollment_id: Uuid,
}
