//! Test repositories: `EnrollmentRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use registrar_core::error::EnrollmentError;
use registrar_core::ids::{CourseId, StudentId};
use registrar_core::record::{EnrollmentRecord, EnrollmentStatus};
use registrar_core::repository::EnrollmentRepository;
use uuid::Uuid;

/// An in-memory enrollment store. Records are kept in insertion order and
/// every operation runs under a single lock, so the active-pair uniqueness
/// check in `create` is atomic like the database's partial unique index.
#[derive(Debug, Default)]
pub struct InMemoryEnrollmentRepository {
    records: Mutex<Vec<EnrollmentRecord>>,
}

impl InMemoryEnrollmentRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: Vec<EnrollmentRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Returns a snapshot of every stored record.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn snapshot(&self) -> Vec<EnrollmentRecord> {
        self.records.lock().unwrap().clone()
    }

    fn filtered(&self, predicate: impl Fn(&EnrollmentRecord) -> bool) -> Vec<EnrollmentRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryEnrollmentRepository {
    async fn create(&self, record: &EnrollmentRecord) -> Result<(), EnrollmentError> {
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.id == record.id) {
            return Err(EnrollmentError::Infrastructure(format!(
                "duplicate enrollment id {}",
                record.id
            )));
        }
        if records.iter().any(|r| r.reservation_id == record.reservation_id) {
            return Err(EnrollmentError::IdempotencyConflict(record.reservation_id));
        }
        if record.status.is_active()
            && records.iter().any(|r| {
                r.status.is_active()
                    && r.course_id == record.course_id
                    && r.student_id == record.student_id
            })
        {
            return Err(EnrollmentError::DuplicateEnrollment {
                course_id: record.course_id.clone(),
                student_id: record.student_id.clone(),
            });
        }
        records.push(record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        Ok(self.filtered(|r| r.id == id).into_iter().next())
    }

    async fn find_by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        Ok(self
            .filtered(|r| r.reservation_id == reservation_id)
            .into_iter()
            .next())
    }

    async fn find_active(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        Ok(self
            .filtered(|r| {
                r.status.is_active() && &r.course_id == course_id && &r.student_id == student_id
            })
            .into_iter()
            .next())
    }

    async fn find_by_course_and_student(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        Ok(self.filtered(|r| &r.course_id == course_id && &r.student_id == student_id))
    }

    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        Ok(self.snapshot())
    }

    async fn list_by_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        Ok(self.filtered(|r| &r.course_id == course_id))
    }

    async fn list_by_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        Ok(self.filtered(|r| &r.student_id == student_id))
    }

    async fn list_by_status(
        &self,
        status: EnrollmentStatus,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        Ok(self.filtered(|r| r.status == status))
    }

    async fn count_by_course_excluding_status(
        &self,
        course_id: &CourseId,
        excluded: EnrollmentStatus,
    ) -> Result<u64, EnrollmentError> {
        Ok(self
            .filtered(|r| &r.course_id == course_id && r.status != excluded)
            .len() as u64)
    }

    async fn count_by_student_excluding_status(
        &self,
        student_id: &StudentId,
        excluded: EnrollmentStatus,
    ) -> Result<u64, EnrollmentError> {
        Ok(self
            .filtered(|r| &r.student_id == student_id && r.status != excluded)
            .len() as u64)
    }

    async fn exists_by_course_and_student_excluding_status(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
        excluded: EnrollmentStatus,
    ) -> Result<bool, EnrollmentError> {
        Ok(!self
            .filtered(|r| {
                &r.course_id == course_id && &r.student_id == student_id && r.status != excluded
            })
            .is_empty())
    }

    async fn count(&self) -> Result<u64, EnrollmentError> {
        Ok(self.records.lock().unwrap().len() as u64)
    }

    async fn update(
        &self,
        record: &EnrollmentRecord,
        expected_version: i64,
    ) -> Result<(), EnrollmentError> {
        let mut records = self.records.lock().unwrap();
        let Some(stored) = records.iter_mut().find(|r| r.id == record.id) else {
            return Err(EnrollmentError::EnrollmentNotFound(record.id));
        };
        if stored.version != expected_version {
            return Err(EnrollmentError::ConcurrencyConflict {
                enrollment_id: record.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = record.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, EnrollmentError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}

/// An enrollment store that fails every call with an infrastructure error.
/// Useful for testing error-handling paths.
#[derive(Debug)]
pub struct FailingEnrollmentRepository;

fn connection_refused<T>() -> Result<T, EnrollmentError> {
    Err(EnrollmentError::Infrastructure("connection refused".into()))
}

#[async_trait]
impl EnrollmentRepository for FailingEnrollmentRepository {
    async fn create(&self, _record: &EnrollmentRecord) -> Result<(), EnrollmentError> {
        connection_refused()
    }

    async fn get(&self, _id: Uuid) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        connection_refused()
    }

    async fn find_by_reservation(
        &self,
        _reservation_id: Uuid,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        connection_refused()
    }

    async fn find_active(
        &self,
        _course_id: &CourseId,
        _student_id: &StudentId,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        connection_refused()
    }

    async fn find_by_course_and_student(
        &self,
        _course_id: &CourseId,
        _student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        connection_refused()
    }

    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        connection_refused()
    }

    async fn list_by_course(
        &self,
        _course_id: &CourseId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        connection_refused()
    }

    async fn list_by_student(
        &self,
        _student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        connection_refused()
    }

    async fn list_by_status(
        &self,
        _status: EnrollmentStatus,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        connection_refused()
    }

    async fn count_by_course_excluding_status(
        &self,
        _course_id: &CourseId,
        _excluded: EnrollmentStatus,
    ) -> Result<u64, EnrollmentError> {
        connection_refused()
    }

    async fn count_by_student_excluding_status(
        &self,
        _student_id: &StudentId,
        _excluded: EnrollmentStatus,
    ) -> Result<u64, EnrollmentError> {
        connection_refused()
    }

    async fn exists_by_course_and_student_excluding_status(
        &self,
        _course_id: &CourseId,
        _student_id: &StudentId,
        _excluded: EnrollmentStatus,
    ) -> Result<bool, EnrollmentError> {
        connection_refused()
    }

    async fn count(&self) -> Result<u64, EnrollmentError> {
        connection_refused()
    }

    async fn update(
        &self,
        _record: &EnrollmentRecord,
        _expected_version: i64,
    ) -> Result<(), EnrollmentError> {
        connection_refused()
    }

    async fn delete(&self, _id: Uuid) -> Result<bool, EnrollmentError> {
        connection_refused()
    }
}
