//! Catalog service port.
//!
//! The catalog owns course capacity and the enrolled-seat counter. Registrar
//! never writes an absolute count: it reserves and releases seats through
//! keyed, idempotent calls so the catalog can enforce
//! `enrolled_count <= capacity` atomically on its side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::EnrollmentError;
use crate::ids::CourseId;

/// Capacity snapshot of a course as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseCapacity {
    /// The course.
    pub course_id: CourseId,
    /// Fixed upper bound on enrolled seats.
    pub capacity: u32,
    /// Seats currently taken.
    pub enrolled_count: u32,
}

impl CourseCapacity {
    /// Whether at least one seat is free.
    #[must_use]
    pub fn has_free_seat(&self) -> bool {
        self.enrolled_count < self.capacity
    }
}

/// Errors surfaced by a catalog client.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog does not know the course.
    #[error("course not found: {0}")]
    CourseNotFound(CourseId),

    /// An atomic reservation lost against a full course.
    #[error("no seats available in course {0}")]
    NoSeatsAvailable(CourseId),

    /// Network failure, timeout, or 5xx.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// The catalog answered with a payload that violates the schema.
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
}

impl CatalogError {
    /// Whether retrying the same (idempotent) call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<CatalogError> for EnrollmentError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::CourseNotFound(course_id) => Self::CourseNotFound(course_id),
            CatalogError::NoSeatsAvailable(course_id) => Self::CapacityExceeded(course_id),
            CatalogError::Unavailable(msg) => Self::CatalogUnavailable(msg),
            CatalogError::Decode(msg) => {
                Self::CatalogUnavailable(format!("invalid catalog response: {msg}"))
            }
        }
    }
}

/// Narrow capability interface onto the catalog's seat counter.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetches the capacity snapshot of a course.
    async fn get_course_capacity(&self, course_id: &CourseId)
    -> Result<CourseCapacity, CatalogError>;

    /// Atomically takes one seat if `enrolled_count < capacity`.
    ///
    /// Repeating a call with the same `reservation_id` does not take a
    /// second seat.
    async fn reserve_seat(
        &self,
        course_id: &CourseId,
        reservation_id: Uuid,
    ) -> Result<CourseCapacity, CatalogError>;

    /// Gives back the seat held by `reservation_id`. Unknown or already
    /// released reservations are a successful no-op.
    async fn release_seat(&self, course_id: &CourseId, reservation_id: Uuid)
    -> Result<(), CatalogError>;

    /// Applies a signed adjustment to the enrolled count. Repeating a call
    /// with the same `adjustment_id` applies it once.
    async fn apply_enrolled_delta(
        &self,
        course_id: &CourseId,
        delta: i32,
        adjustment_id: Uuid,
    ) -> Result<CourseCapacity, CatalogError>;
}
