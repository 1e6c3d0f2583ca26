//! `PostgreSQL` implementation of the `CompensationLog` trait.
//!
//! Resolved entries are kept with a `resolved_at` timestamp for audit;
//! only unresolved rows are returned by `pending`.

use std::fmt::Display;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use registrar_core::compensation::{AdjustmentKind, CompensationLog, PendingAdjustment};
use registrar_core::error::EnrollmentError;
use registrar_core::ids::CourseId;

/// PostgreSQL-backed compensation log.
#[derive(Debug, Clone)]
pub struct PgCompensationLog {
    pool: PgPool,
}

impl PgCompensationLog {
    /// Creates a new `PgCompensationLog`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn infrastructure(err: impl Display) -> EnrollmentError {
    EnrollmentError::Infrastructure(err.to_string())
}

fn adjustment_from_row(row: &PgRow) -> Result<PendingAdjustment, EnrollmentError> {
    let course_id: String = row.try_get("course_id").map_err(infrastructure)?;
    let kind: serde_json::Value = row.try_get("kind").map_err(infrastructure)?;
    let attempts: i32 = row.try_get("attempts").map_err(infrastructure)?;
    Ok(PendingAdjustment {
        id: row.try_get("id").map_err(infrastructure)?,
        course_id: CourseId::new(course_id).map_err(infrastructure)?,
        kind: serde_json::from_value::<AdjustmentKind>(kind).map_err(infrastructure)?,
        reason: row.try_get("reason").map_err(infrastructure)?,
        attempts: u32::try_from(attempts).map_err(infrastructure)?,
        last_error: row.try_get("last_error").map_err(infrastructure)?,
        recorded_at: row.try_get("recorded_at").map_err(infrastructure)?,
    })
}

#[async_trait]
impl CompensationLog for PgCompensationLog {
    async fn record(&self, adjustment: PendingAdjustment) -> Result<(), EnrollmentError> {
        let kind = serde_json::to_value(adjustment.kind).map_err(infrastructure)?;
        let attempts = i32::try_from(adjustment.attempts).map_err(infrastructure)?;
        sqlx::query(
            "INSERT INTO pending_adjustments \
             (id, course_id, kind, reason, attempts, last_error, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(adjustment.id)
        .bind(adjustment.course_id.as_str())
        .bind(kind)
        .bind(&adjustment.reason)
        .bind(attempts)
        .bind(adjustment.last_error.as_deref())
        .bind(adjustment.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        debug!(adjustment_id = %adjustment.id, "pending adjustment recorded");
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<PendingAdjustment>, EnrollmentError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sqlx::query(
            "SELECT id, course_id, kind, reason, attempts, last_error, recorded_at \
             FROM pending_adjustments \
             WHERE resolved_at IS NULL \
             ORDER BY recorded_at, id \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?
        .iter()
        .map(adjustment_from_row)
        .collect()
    }

    async fn resolve(&self, id: Uuid) -> Result<(), EnrollmentError> {
        sqlx::query(
            "UPDATE pending_adjustments SET resolved_at = NOW() \
             WHERE id = $1 AND resolved_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), EnrollmentError> {
        sqlx::query(
            "UPDATE pending_adjustments \
             SET attempts = attempts + 1, last_error = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }
}
