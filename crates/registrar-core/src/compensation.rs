//! Compensation log port.
//!
//! When a catalog counter adjustment fails after the local store already
//! committed, the adjustment is recorded here instead of being dropped.
//! A reconciler replays pending entries through the idempotent catalog
//! calls until they succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EnrollmentError;
use crate::ids::CourseId;

/// The catalog call a pending adjustment will replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Release the seat held by a reservation.
    ReleaseSeat {
        /// The reservation to release.
        reservation_id: Uuid,
    },
    /// Apply a keyed delta to the enrolled count.
    ApplyDelta {
        /// Signed adjustment.
        delta: i32,
        /// Idempotency key of the adjustment.
        adjustment_id: Uuid,
    },
}

/// A counter adjustment that could not be applied to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAdjustment {
    /// Entry identifier.
    pub id: Uuid,
    /// The course whose counter drifted.
    pub course_id: CourseId,
    /// What to replay.
    pub kind: AdjustmentKind,
    /// Why the entry was recorded.
    pub reason: String,
    /// Failed replay attempts so far.
    pub attempts: u32,
    /// Error from the most recent failure.
    pub last_error: Option<String>,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl PendingAdjustment {
    /// Creates a fresh entry with no replay attempts.
    #[must_use]
    pub fn new(
        course_id: CourseId,
        kind: AdjustmentKind,
        reason: impl Into<String>,
        last_error: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_id,
            kind,
            reason: reason.into(),
            attempts: 0,
            last_error,
            recorded_at,
        }
    }
}

/// Durable list of pending catalog adjustments.
#[async_trait]
pub trait CompensationLog: Send + Sync {
    /// Appends an entry.
    async fn record(&self, adjustment: PendingAdjustment) -> Result<(), EnrollmentError>;

    /// Returns up to `limit` unresolved entries, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<PendingAdjustment>, EnrollmentError>;

    /// Marks an entry as applied. Unknown ids are ignored.
    async fn resolve(&self, id: Uuid) -> Result<(), EnrollmentError>;

    /// Bumps the attempt count of an entry and remembers the error.
    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), EnrollmentError>;
}
