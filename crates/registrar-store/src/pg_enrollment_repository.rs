//! `PostgreSQL` implementation of the `EnrollmentRepository` trait.

use std::fmt::Display;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use registrar_core::error::EnrollmentError;
use registrar_core::ids::{CourseId, StudentId};
use registrar_core::record::{EnrollmentRecord, EnrollmentStatus, Grade};
use registrar_core::repository::EnrollmentRepository;

use crate::schema::{ACTIVE_PAIR_INDEX, RESERVATION_UNIQUE};

const SELECT_COLUMNS: &str = "SELECT id, course_id, student_id, status, grade, reservation_id, \
     version, enrolled_at, updated_at FROM enrollments";

/// PostgreSQL-backed enrollment store.
#[derive(Debug, Clone)]
pub struct PgEnrollmentRepository {
    pool: PgPool,
}

impl PgEnrollmentRepository {
    /// Creates a new `PgEnrollmentRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        filter: &str,
        binds: &[&str],
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        let sql = format!("{SELECT_COLUMNS} WHERE {filter} ORDER BY enrolled_at, id");
        let mut query = sqlx::query::<Postgres>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        query
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?
            .iter()
            .map(record_from_row)
            .collect()
    }

    async fn count_where(&self, filter: &str, binds: &[&str]) -> Result<u64, EnrollmentError> {
        let sql = format!("SELECT COUNT(*) FROM enrollments WHERE {filter}");
        let mut query = sqlx::query_scalar::<Postgres, i64>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let count = query.fetch_one(&self.pool).await.map_err(infrastructure)?;
        u64::try_from(count).map_err(infrastructure)
    }
}

fn infrastructure(err: impl Display) -> EnrollmentError {
    EnrollmentError::Infrastructure(err.to_string())
}

fn record_from_row(row: &PgRow) -> Result<EnrollmentRecord, EnrollmentError> {
    let course_id: String = row.try_get("course_id").map_err(infrastructure)?;
    let student_id: String = row.try_get("student_id").map_err(infrastructure)?;
    let status: String = row.try_get("status").map_err(infrastructure)?;
    let grade: Option<f64> = row.try_get("grade").map_err(infrastructure)?;
    Ok(EnrollmentRecord {
        id: row.try_get("id").map_err(infrastructure)?,
        course_id: CourseId::new(course_id).map_err(infrastructure)?,
        student_id: StudentId::new(student_id).map_err(infrastructure)?,
        status: status.parse().map_err(infrastructure)?,
        grade: grade.map(Grade::new).transpose().map_err(infrastructure)?,
        reservation_id: row.try_get("reservation_id").map_err(infrastructure)?,
        version: row.try_get("version").map_err(infrastructure)?,
        enrolled_at: row.try_get::<DateTime<Utc>, _>("enrolled_at").map_err(infrastructure)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(infrastructure)?,
    })
}

fn map_insert_error(err: sqlx::Error, record: &EnrollmentRecord) -> EnrollmentError {
    let constraint = match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => db_err.constraint(),
        _ => None,
    };
    match constraint {
        Some(ACTIVE_PAIR_INDEX) => EnrollmentError::DuplicateEnrollment {
            course_id: record.course_id.clone(),
            student_id: record.student_id.clone(),
        },
        Some(RESERVATION_UNIQUE) => EnrollmentError::IdempotencyConflict(record.reservation_id),
        _ => infrastructure(&err),
    }
}

#[async_trait]
impl EnrollmentRepository for PgEnrollmentRepository {
    async fn create(&self, record: &EnrollmentRecord) -> Result<(), EnrollmentError> {
        sqlx::query(
            "INSERT INTO enrollments \
             (id, course_id, student_id, status, grade, reservation_id, version, enrolled_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(record.id)
        .bind(record.course_id.as_str())
        .bind(record.student_id.as_str())
        .bind(record.status.as_str())
        .bind(record.grade.map(Grade::value))
        .bind(record.reservation_id)
        .bind(record.version)
        .bind(record.enrolled_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error(err, record))?;
        debug!(enrollment_id = %record.id, "enrollment inserted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure)?
            .as_ref()
            .map(record_from_row)
            .transpose()
    }

    async fn find_by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        let sql = format!("{SELECT_COLUMNS} WHERE reservation_id = $1");
        sqlx::query(&sql)
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure)?
            .as_ref()
            .map(record_from_row)
            .transpose()
    }

    async fn find_active(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        Ok(self
            .fetch_many(
                "course_id = $1 AND student_id = $2 AND status <> 'WITHDRAWN'",
                &[course_id.as_str(), student_id.as_str()],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_course_and_student(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        self.fetch_many(
            "course_id = $1 AND student_id = $2",
            &[course_id.as_str(), student_id.as_str()],
        )
        .await
    }

    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        self.fetch_many("TRUE", &[]).await
    }

    async fn list_by_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        self.fetch_many("course_id = $1", &[course_id.as_str()]).await
    }

    async fn list_by_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        self.fetch_many("student_id = $1", &[student_id.as_str()])
            .await
    }

    async fn list_by_status(
        &self,
        status: EnrollmentStatus,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        self.fetch_many("status = $1", &[status.as_str()]).await
    }

    async fn count_by_course_excluding_status(
        &self,
        course_id: &CourseId,
        excluded: EnrollmentStatus,
    ) -> Result<u64, EnrollmentError> {
        self.count_where(
            "course_id = $1 AND status <> $2",
            &[course_id.as_str(), excluded.as_str()],
        )
        .await
    }

    async fn count_by_student_excluding_status(
        &self,
        student_id: &StudentId,
        excluded: EnrollmentStatus,
    ) -> Result<u64, EnrollmentError> {
        self.count_where(
            "student_id = $1 AND status <> $2",
            &[student_id.as_str(), excluded.as_str()],
        )
        .await
    }

    async fn exists_by_course_and_student_excluding_status(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
        excluded: EnrollmentStatus,
    ) -> Result<bool, EnrollmentError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM enrollments \
             WHERE course_id = $1 AND student_id = $2 AND status <> $3)",
        )
        .bind(course_id.as_str())
        .bind(student_id.as_str())
        .bind(excluded.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(infrastructure)
    }

    async fn count(&self) -> Result<u64, EnrollmentError> {
        self.count_where("TRUE", &[]).await
    }

    async fn update(
        &self,
        record: &EnrollmentRecord,
        expected_version: i64,
    ) -> Result<(), EnrollmentError> {
        let result = sqlx::query(
            "UPDATE enrollments \
             SET status = $3, grade = $4, version = $5, updated_at = $6 \
             WHERE id = $1 AND version = $2",
        )
        .bind(record.id)
        .bind(expected_version)
        .bind(record.status.as_str())
        .bind(record.grade.map(Grade::value))
        .bind(record.version)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error(err, record))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM enrollments WHERE id = $1")
            .bind(record.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure)?;
        match actual {
            None => Err(EnrollmentError::EnrollmentNotFound(record.id)),
            Some(actual) => Err(EnrollmentError::ConcurrencyConflict {
                enrollment_id: record.id,
                expected: expected_version,
                actual,
            }),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, EnrollmentError> {
        let result = sqlx::query("DELETE FROM enrollments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(result.rows_affected() > 0)
    }
}
