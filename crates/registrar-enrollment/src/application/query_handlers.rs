//! Query handlers for the Enrollment context.
//!
//! Grade and roster queries read only the enrollment store and return
//! read-only view DTOs. `course_occupancy` additionally asks the catalog
//! so drift between the two stores is visible.

use chrono::{DateTime, Utc};
use registrar_core::catalog::CatalogClient;
use registrar_core::error::EnrollmentError;
use registrar_core::ids::{CourseId, StudentId};
use registrar_core::record::{EnrollmentRecord, EnrollmentStatus};
use registrar_core::repository::EnrollmentRepository;
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of an enrollment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentView {
    /// The enrollment identifier.
    pub id: Uuid,
    /// The course identifier.
    pub course_id: String,
    /// The student identifier.
    pub student_id: String,
    /// Current status.
    pub status: EnrollmentStatus,
    /// Assigned grade, if any.
    pub grade: Option<f64>,
    /// When the enrollment was created.
    pub enrolled_at: DateTime<Utc>,
    /// When the enrollment last changed.
    pub updated_at: DateTime<Utc>,
}

impl From<EnrollmentRecord> for EnrollmentView {
    fn from(record: EnrollmentRecord) -> Self {
        Self {
            id: record.id,
            course_id: record.course_id.into(),
            student_id: record.student_id.into(),
            status: record.status,
            grade: record.grade.map(f64::from),
            enrolled_at: record.enrolled_at,
            updated_at: record.updated_at,
        }
    }
}

/// Active roster of a course with per-status counts over all its records.
#[derive(Debug, Serialize)]
pub struct CourseRosterView {
    /// The course identifier.
    pub course_id: String,
    /// Non-withdrawn enrollments, oldest first.
    pub active: Vec<EnrollmentView>,
    /// Records in `ENROLLED`.
    pub enrolled: u64,
    /// Records in `COMPLETED`.
    pub completed: u64,
    /// Records in `WITHDRAWN`.
    pub withdrawn: u64,
}

/// Catalog counter versus locally active records for one course.
#[derive(Debug, Serialize)]
pub struct CourseOccupancyView {
    /// The course identifier.
    pub course_id: String,
    /// Capacity reported by the catalog.
    pub capacity: u32,
    /// Enrolled count reported by the catalog.
    pub catalog_enrolled_count: u32,
    /// Non-withdrawn records in the store.
    pub active_enrollments: u64,
    /// `catalog_enrolled_count - active_enrollments`; zero when in sync.
    pub drift: i64,
}

impl CourseOccupancyView {
    /// Whether the catalog counter matches the store.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        self.drift == 0
    }
}

fn views(records: Vec<EnrollmentRecord>) -> Vec<EnrollmentView> {
    records.into_iter().map(EnrollmentView::from).collect()
}

/// Retrieves one enrollment.
///
/// # Errors
///
/// Returns `EnrollmentError::EnrollmentNotFound` if no record has the id.
pub async fn get_enrollment(
    enrollment_id: Uuid,
    repo: &dyn EnrollmentRepository,
) -> Result<EnrollmentView, EnrollmentError> {
    repo.get(enrollment_id)
        .await?
        .map(EnrollmentView::from)
        .ok_or(EnrollmentError::EnrollmentNotFound(enrollment_id))
}

/// Lists every enrollment.
///
/// # Errors
///
/// Returns store errors.
pub async fn list_enrollments(
    repo: &dyn EnrollmentRepository,
) -> Result<Vec<EnrollmentView>, EnrollmentError> {
    Ok(views(repo.list_all().await?))
}

/// Lists every enrollment of a course, in any status.
///
/// # Errors
///
/// Returns store errors.
pub async fn list_by_course(
    course_id: &CourseId,
    repo: &dyn EnrollmentRepository,
) -> Result<Vec<EnrollmentView>, EnrollmentError> {
    Ok(views(repo.list_by_course(course_id).await?))
}

/// Lists every enrollment of a student, in any status.
///
/// # Errors
///
/// Returns store errors.
pub async fn list_by_student(
    student_id: &StudentId,
    repo: &dyn EnrollmentRepository,
) -> Result<Vec<EnrollmentView>, EnrollmentError> {
    Ok(views(repo.list_by_student(student_id).await?))
}

/// Lists enrollments in the named status. The name is case-insensitive.
///
/// # Errors
///
/// Returns `EnrollmentError::Validation` for an unknown status name.
pub async fn list_by_status(
    status: &str,
    repo: &dyn EnrollmentRepository,
) -> Result<Vec<EnrollmentView>, EnrollmentError> {
    let status: EnrollmentStatus = status.parse()?;
    Ok(views(repo.list_by_status(status).await?))
}

/// Builds the roster of a course.
///
/// # Errors
///
/// Returns store errors.
pub async fn course_roster(
    course_id: &CourseId,
    repo: &dyn EnrollmentRepository,
) -> Result<CourseRosterView, EnrollmentError> {
    let records = repo.list_by_course(course_id).await?;
    let count = |status| records.iter().filter(|r| r.status == status).count() as u64;
    let (enrolled, completed, withdrawn) = (
        count(EnrollmentStatus::Enrolled),
        count(EnrollmentStatus::Completed),
        count(EnrollmentStatus::Withdrawn),
    );
    let active = records
        .into_iter()
        .filter(|r| r.status.is_active())
        .map(EnrollmentView::from)
        .collect();
    Ok(CourseRosterView {
        course_id: course_id.to_string(),
        active,
        enrolled,
        completed,
        withdrawn,
    })
}

/// Counts non-withdrawn enrollments of a course.
///
/// # Errors
///
/// Returns store errors.
pub async fn active_count_by_course(
    course_id: &CourseId,
    repo: &dyn EnrollmentRepository,
) -> Result<u64, EnrollmentError> {
    repo.count_by_course_excluding_status(course_id, EnrollmentStatus::Withdrawn)
        .await
}

/// Counts non-withdrawn enrollments of a student.
///
/// # Errors
///
/// Returns store errors.
pub async fn active_count_by_student(
    student_id: &StudentId,
    repo: &dyn EnrollmentRepository,
) -> Result<u64, EnrollmentError> {
    repo.count_by_student_excluding_status(student_id, EnrollmentStatus::Withdrawn)
        .await
}

/// Whether the student holds an active enrollment in the course. Blank
/// identifiers are never enrolled.
///
/// # Errors
///
/// Returns store errors.
pub async fn is_student_enrolled(
    student_id: &str,
    course_id: &str,
    repo: &dyn EnrollmentRepository,
) -> Result<bool, EnrollmentError> {
    let (Ok(student_id), Ok(course_id)) = (StudentId::new(student_id), CourseId::new(course_id))
    else {
        return Ok(false);
    };
    repo.exists_by_course_and_student_excluding_status(
        &course_id,
        &student_id,
        EnrollmentStatus::Withdrawn,
    )
    .await
}

/// Grade of the student's most recent enrollment in the course.
///
/// Records enrolled at the same instant are ordered by activity, then by
/// last update, version, and id, so the answer does not depend on the
/// order the store returns them in.
///
/// # Errors
///
/// Returns store errors.
pub async fn student_grade(
    student_id: &StudentId,
    course_id: &CourseId,
    repo: &dyn EnrollmentRepository,
) -> Result<Option<f64>, EnrollmentError> {
    let latest = repo
        .find_by_course_and_student(course_id, student_id)
        .await?
        .into_iter()
        .max_by_key(|r| {
            (
                r.enrolled_at,
                r.status.is_active(),
                r.updated_at,
                r.version,
                r.id,
            )
        });
    Ok(latest.and_then(|r| r.grade).map(f64::from))
}

/// Mean grade over the student's `COMPLETED` enrollments that carry a
/// grade. `None` when there are none.
///
/// # Errors
///
/// Returns store errors.
pub async fn average_grade(
    student_id: &StudentId,
    repo: &dyn EnrollmentRepository,
) -> Result<Option<f64>, EnrollmentError> {
    let grades: Vec<f64> = repo
        .list_by_student(student_id)
        .await?
        .into_iter()
        .filter(|r| r.status == EnrollmentStatus::Completed)
        .filter_map(|r| r.grade.map(f64::from))
        .collect();
    if grades.is_empty() {
        return Ok(None);
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = grades.iter().sum::<f64>() / grades.len() as f64;
    Ok(Some(mean))
}

/// Total number of enrollment records, in any status.
///
/// # Errors
///
/// Returns store errors.
pub async fn total_enrollments(repo: &dyn EnrollmentRepository) -> Result<u64, EnrollmentError> {
    repo.count().await
}

/// Compares the catalog's enrolled count with the store's active records.
///
/// # Errors
///
/// Returns `CourseNotFound` or `CatalogUnavailable` from the catalog, and
/// store errors.
pub async fn course_occupancy(
    course_id: &CourseId,
    repo: &dyn EnrollmentRepository,
    catalog: &dyn CatalogClient,
) -> Result<CourseOccupancyView, EnrollmentError> {
    let snapshot = catalog.get_course_capacity(course_id).await?;
    let active = active_count_by_course(course_id, repo).await?;
    let drift = i64::from(snapshot.enrolled_count) - i64::try_from(active).unwrap_or(i64::MAX);
    Ok(CourseOccupancyView {
        course_id: course_id.to_string(),
        capacity: snapshot.capacity,
        catalog_enrolled_count: snapshot.enrolled_count,
        active_enrollments: active,
        drift,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use registrar_core::error::EnrollmentError;
    use registrar_core::ids::{CourseId, StudentId};
    use registrar_core::record::{EnrollmentRecord, EnrollmentStatus, Grade};
    use registrar_test_support::{
        FailingEnrollmentRepository, InMemoryCatalog, InMemoryEnrollmentRepository, fixed_clock,
    };
    use uuid::Uuid;

    use super::*;

    fn record(course: &str, student: &str, status: EnrollmentStatus, grade: Option<f64>) -> EnrollmentRecord {
        let now = fixed_clock().0;
        EnrollmentRecord {
            id: Uuid::new_v4(),
            course_id: CourseId::new(course).unwrap(),
            student_id: StudentId::new(student).unwrap(),
            status,
            grade: grade.map(|g| Grade::new(g).unwrap()),
            reservation_id: Uuid::new_v4(),
            version: 1,
            enrolled_at: now,
            updated_at: now,
        }
    }

    fn seeded() -> InMemoryEnrollmentRepository {
        InMemoryEnrollmentRepository::with_records(vec![
            record("CS101", "alice", EnrollmentStatus::Completed, Some(90.0)),
            record("MA201", "alice", EnrollmentStatus::Completed, Some(70.0)),
            record("PH301", "alice", EnrollmentStatus::Enrolled, None),
            record("CS101", "bob", EnrollmentStatus::Enrolled, None),
            record("CS101", "carol", EnrollmentStatus::Withdrawn, None),
        ])
    }

    fn course(id: &str) -> CourseId {
        CourseId::new(id).unwrap()
    }

    fn student(id: &str) -> StudentId {
        StudentId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_get_enrollment_returns_view() {
        // Arrange
        let stored = record("CS101", "alice", EnrollmentStatus::Completed, Some(88.5));
        let repo = InMemoryEnrollmentRepository::with_records(vec![stored.clone()]);

        // Act
        let view = get_enrollment(stored.id, &repo).await.unwrap();

        // Assert
        assert_eq!(view.id, stored.id);
        assert_eq!(view.course_id, "CS101");
        assert_eq!(view.grade, Some(88.5));
        assert_eq!(view.status, EnrollmentStatus::Completed);
    }

    #[tokio::test]
    async fn test_get_enrollment_missing_is_not_found() {
        let repo = InMemoryEnrollmentRepository::new();
        let id = Uuid::new_v4();

        let result = get_enrollment(id, &repo).await;

        match result.unwrap_err() {
            EnrollmentError::EnrollmentNotFound(missing) => assert_eq!(missing, id),
            other => panic!("expected EnrollmentNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_by_status_is_case_insensitive() {
        let repo = seeded();

        let completed = list_by_status("completed", &repo).await.unwrap();

        assert_eq!(completed.len(), 2);
        assert!(completed.iter().all(|v| v.status == EnrollmentStatus::Completed));
    }

    #[tokio::test]
    async fn test_list_by_status_rejects_unknown_name() {
        let repo = seeded();

        let result = list_by_status("PAUSED", &repo).await;

        assert!(matches!(result, Err(EnrollmentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_course_roster_lists_active_and_counts_statuses() {
        // Arrange
        let repo = seeded();

        // Act
        let roster = course_roster(&course("CS101"), &repo).await.unwrap();

        // Assert
        assert_eq!(roster.active.len(), 2);
        assert!(roster.active.iter().all(|v| v.student_id != "carol"));
        assert_eq!((roster.enrolled, roster.completed, roster.withdrawn), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_active_counts_exclude_withdrawn() {
        let repo = seeded();

        assert_eq!(active_count_by_course(&course("CS101"), &repo).await.unwrap(), 2);
        assert_eq!(active_count_by_student(&student("alice"), &repo).await.unwrap(), 3);
        assert_eq!(active_count_by_student(&student("carol"), &repo).await.unwrap(), 0);
        assert_eq!(total_enrollments(&repo).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_is_student_enrolled() {
        let repo = seeded();

        assert!(is_student_enrolled("bob", "CS101", &repo).await.unwrap());
        assert!(!is_student_enrolled("carol", "CS101", &repo).await.unwrap());
        assert!(!is_student_enrolled("  ", "CS101", &repo).await.unwrap());
        assert!(!is_student_enrolled("bob", "", &repo).await.unwrap());
    }

    #[tokio::test]
    async fn test_average_grade_uses_completed_graded_records_only() {
        // Arrange
        let mut legacy = record("EN100", "alice", EnrollmentStatus::Enrolled, None);
        legacy.grade = Some(Grade::new(10.0).unwrap());
        let repo = seeded();
        repo.create(&legacy).await.unwrap();

        // Act
        let average = average_grade(&student("alice"), &repo).await.unwrap();

        // Assert
        assert_eq!(average, Some(80.0));
    }

    #[tokio::test]
    async fn test_average_grade_is_none_without_completed_records() {
        let repo = seeded();

        let average = average_grade(&student("bob"), &repo).await.unwrap();

        assert_eq!(average, None);
    }

    #[tokio::test]
    async fn test_student_grade_uses_most_recent_record() {
        // Arrange
        let mut old = record("CS101", "dave", EnrollmentStatus::Withdrawn, None);
        old.enrolled_at -= Duration::days(120);
        let mut new = record("CS101", "dave", EnrollmentStatus::Completed, Some(77.0));
        new.enrolled_at += Duration::days(1);
        let repo = InMemoryEnrollmentRepository::with_records(vec![new, old]);

        // Act
        let grade = student_grade(&student("dave"), &course("CS101"), &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(grade, Some(77.0));
    }

    #[tokio::test]
    async fn test_student_grade_breaks_enrollment_time_ties_deterministically() {
        // Arrange
        // Withdrawn and re-enrolled within the same instant.
        let mut withdrawn = record("CS101", "dave", EnrollmentStatus::Withdrawn, None);
        withdrawn.version = 2;
        let completed = record("CS101", "dave", EnrollmentStatus::Completed, Some(64.0));
        let forward = InMemoryEnrollmentRepository::with_records(vec![
            withdrawn.clone(),
            completed.clone(),
        ]);
        let backward = InMemoryEnrollmentRepository::with_records(vec![completed, withdrawn]);

        // Act
        let from_forward = student_grade(&student("dave"), &course("CS101"), &forward)
            .await
            .unwrap();
        let from_backward = student_grade(&student("dave"), &course("CS101"), &backward)
            .await
            .unwrap();

        // Assert
        assert_eq!(from_forward, Some(64.0));
        assert_eq!(from_backward, Some(64.0));
    }

    #[tokio::test]
    async fn test_student_grade_prefers_later_update_on_equal_enrollment_time() {
        // Arrange
        let stale = record("CS101", "erin", EnrollmentStatus::Completed, Some(50.0));
        let mut regraded = record("CS101", "erin", EnrollmentStatus::Completed, Some(85.0));
        regraded.updated_at += Duration::hours(2);
        let repo = InMemoryEnrollmentRepository::with_records(vec![regraded, stale]);

        // Act
        let grade = student_grade(&student("erin"), &course("CS101"), &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(grade, Some(85.0));
    }

    #[tokio::test]
    async fn test_course_occupancy_reports_drift() {
        // Arrange
        let repo = seeded();
        let catalog = InMemoryCatalog::new().with_course("CS101", 30, 3);

        // Act
        let view = course_occupancy(&course("CS101"), &repo, &catalog).await.unwrap();

        // Assert
        assert_eq!(view.capacity, 30);
        assert_eq!(view.catalog_enrolled_count, 3);
        assert_eq!(view.active_enrollments, 2);
        assert_eq!(view.drift, 1);
        assert!(!view.in_sync());
    }

    #[tokio::test]
    async fn test_course_occupancy_unknown_course() {
        let repo = seeded();
        let catalog = InMemoryCatalog::new();

        let result = course_occupancy(&course("CS101"), &repo, &catalog).await;

        assert!(matches!(result, Err(EnrollmentError::CourseNotFound(_))));
    }

    #[tokio::test]
    async fn test_queries_propagate_store_failures() {
        let repo = FailingEnrollmentRepository;

        let result = list_enrollments(&repo).await;

        match result.unwrap_err() {
            EnrollmentError::Infrastructure(msg) => assert_eq!(msg, "connection refused"),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }
}
