//! Integration tests for `PgCompensationLog`.

use chrono::{Duration, TimeZone, Utc};
use registrar_core::compensation::{AdjustmentKind, CompensationLog, PendingAdjustment};
use registrar_core::ids::CourseId;
use registrar_store::pg_compensation_log::PgCompensationLog;
use sqlx::PgPool;
use uuid::Uuid;

fn release(minutes: i64) -> PendingAdjustment {
    PendingAdjustment::new(
        CourseId::new("CS101").unwrap(),
        AdjustmentKind::ReleaseSeat {
            reservation_id: Uuid::new_v4(),
        },
        "seat release after withdrawal failed",
        Some("catalog unavailable: status 503".to_owned()),
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap() + Duration::minutes(minutes),
    )
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_record_and_read_back_pending(pool: PgPool) {
    let log = PgCompensationLog::new(pool);
    let entry = PendingAdjustment::new(
        CourseId::new("MA201").unwrap(),
        AdjustmentKind::ApplyDelta {
            delta: -2,
            adjustment_id: Uuid::new_v4(),
        },
        "occupancy drift",
        None,
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    );

    log.record(entry.clone()).await.unwrap();

    assert_eq!(log.pending(10).await.unwrap(), vec![entry]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_pending_is_oldest_first_and_limited(pool: PgPool) {
    let log = PgCompensationLog::new(pool);
    let newest = release(10);
    let oldest = release(0);
    let middle = release(5);
    for entry in [&newest, &oldest, &middle] {
        log.record(entry.clone()).await.unwrap();
    }

    let pending = log.pending(2).await.unwrap();

    assert_eq!(
        pending.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![oldest.id, middle.id]
    );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_resolved_entries_leave_pending(pool: PgPool) {
    let log = PgCompensationLog::new(pool);
    let entry = release(0);
    log.record(entry.clone()).await.unwrap();

    log.resolve(entry.id).await.unwrap();
    log.resolve(entry.id).await.unwrap();

    assert!(log.pending(10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_record_failure_bumps_attempts(pool: PgPool) {
    let log = PgCompensationLog::new(pool);
    let entry = release(0);
    log.record(entry.clone()).await.unwrap();

    log.record_failure(entry.id, "request timed out").await.unwrap();
    log.record_failure(entry.id, "status 502").await.unwrap();

    let pending = log.pending(10).await.unwrap();
    assert_eq!(pending[0].attempts, 2);
    assert_eq!(pending[0].last_error.as_deref(), Some("status 502"));
}
