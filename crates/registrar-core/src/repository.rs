//! Enrollment store abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::EnrollmentError;
use crate::ids::{CourseId, StudentId};
use crate::record::{EnrollmentRecord, EnrollmentStatus};

/// Durable mapping from enrollment id to [`EnrollmentRecord`].
///
/// Every operation is atomic with respect to a single record. Listing
/// operations return records in creation order.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Inserts a new record.
    ///
    /// Implementations must reject the insert with
    /// `EnrollmentError::DuplicateEnrollment` when another non-withdrawn
    /// record exists for the same (course, student) pair, atomically with
    /// the insert itself.
    async fn create(&self, record: &EnrollmentRecord) -> Result<(), EnrollmentError>;

    /// Loads a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<EnrollmentRecord>, EnrollmentError>;

    /// Loads the record created by the enroll request with this reservation
    /// (idempotency) key.
    async fn find_by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError>;

    /// Loads the non-withdrawn record for a (course, student) pair.
    async fn find_active(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError>;

    /// Lists every record, withdrawn ones included, for a (course, student)
    /// pair.
    async fn find_by_course_and_student(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError>;

    /// Lists every record.
    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, EnrollmentError>;

    /// Lists the records of a course.
    async fn list_by_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError>;

    /// Lists the records of a student.
    async fn list_by_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError>;

    /// Lists the records in a status.
    async fn list_by_status(
        &self,
        status: EnrollmentStatus,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError>;

    /// Counts the records of a course whose status is not `excluded`.
    async fn count_by_course_excluding_status(
        &self,
        course_id: &CourseId,
        excluded: EnrollmentStatus,
    ) -> Result<u64, EnrollmentError>;

    /// Counts the records of a student whose status is not `excluded`.
    async fn count_by_student_excluding_status(
        &self,
        student_id: &StudentId,
        excluded: EnrollmentStatus,
    ) -> Result<u64, EnrollmentError>;

    /// Whether a record for the pair exists whose status is not `excluded`.
    async fn exists_by_course_and_student_excluding_status(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
        excluded: EnrollmentStatus,
    ) -> Result<bool, EnrollmentError>;

    /// Counts every record.
    async fn count(&self) -> Result<u64, EnrollmentError>;

    /// Replaces a record if its stored version still equals
    /// `expected_version`. The caller supplies the record with its version
    /// already bumped.
    ///
    /// Fails with `EnrollmentError::EnrollmentNotFound` when the record is
    /// gone and `EnrollmentError::ConcurrencyConflict` on a version mismatch.
    async fn update(
        &self,
        record: &EnrollmentRecord,
        expected_version: i64,
    ) -> Result<(), EnrollmentError>;

    /// Deletes a record. Returns whether a record existed.
    async fn delete(&self, id: Uuid) -> Result<bool, EnrollmentError>;
}
