//! Stored representation of an enrollment.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EnrollmentError;
use crate::ids::{CourseId, StudentId};

/// Lifecycle status of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    /// The student holds a seat in the course.
    Enrolled,
    /// The course has been completed (a grade was assigned).
    Completed,
    /// The student withdrew and the seat was released. Terminal.
    Withdrawn,
}

impl EnrollmentStatus {
    /// Returns the canonical upper-case name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enrolled => "ENROLLED",
            Self::Completed => "COMPLETED",
            Self::Withdrawn => "WITHDRAWN",
        }
    }

    /// Whether a record in this status occupies a seat.
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Withdrawn)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = EnrollmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENROLLED" => Ok(Self::Enrolled),
            "COMPLETED" => Ok(Self::Completed),
            "WITHDRAWN" => Ok(Self::Withdrawn),
            "" => Err(EnrollmentError::Validation(
                "status must not be empty".to_owned(),
            )),
            _ => Err(EnrollmentError::Validation(format!(
                "invalid enrollment status: {s}"
            ))),
        }
    }
}

/// A numeric grade in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Grade(f64);

impl Grade {
    /// Lowest accepted grade.
    pub const MIN: f64 = 0.0;
    /// Highest accepted grade.
    pub const MAX: f64 = 100.0;

    /// Validates a raw grade value.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidGrade` if the value is not finite or
    /// lies outside `[0, 100]`.
    pub fn new(value: f64) -> Result<Self, EnrollmentError> {
        if !value.is_finite() || !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(EnrollmentError::InvalidGrade(value));
        }
        Ok(Self(value))
    }

    /// Returns the raw value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Grade {
    type Error = EnrollmentError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Grade> for f64 {
    fn from(grade: Grade) -> Self {
        grade.0
    }
}

/// Persisted enrollment record, exclusively owned by the enrollment store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    /// Unique, immutable enrollment identifier.
    pub id: Uuid,
    /// The course the student is enrolled in.
    pub course_id: CourseId,
    /// The enrolled student.
    pub student_id: StudentId,
    /// Current lifecycle status.
    pub status: EnrollmentStatus,
    /// Assigned grade, if any.
    pub grade: Option<Grade>,
    /// Seat reservation held in the catalog; doubles as the idempotency key
    /// of the enroll request that created this record.
    pub reservation_id: Uuid,
    /// Optimistic concurrency counter, incremented on every update.
    pub version: i64,
    /// When the enrollment was created.
    pub enrolled_at: DateTime<Utc>,
    /// When the enrollment was last modified.
    pub updated_at: DateTime<Utc>,
}
