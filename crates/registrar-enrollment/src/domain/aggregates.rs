//! Aggregate root for the Enrollment context.

use registrar_core::clock::Clock;
use registrar_core::error::EnrollmentError;
use registrar_core::ids::{CourseId, StudentId};
use registrar_core::record::{EnrollmentRecord, EnrollmentStatus, Grade};
use uuid::Uuid;

/// The aggregate root for a single enrollment.
///
/// Wraps the stored record and owns the status state machine:
///
/// ```text
/// (create)  -> ENROLLED
/// ENROLLED  -> COMPLETED   grade assignment or explicit transition
/// ENROLLED  -> WITHDRAWN   only while ungraded
/// WITHDRAWN    terminal
/// ```
#[derive(Debug, Clone)]
pub struct Enrollment {
    record: EnrollmentRecord,
    /// Version the record had when it was loaded.
    loaded_version: i64,
}

impl Enrollment {
    /// Starts a new enrollment in `ENROLLED`, holding `reservation_id`.
    #[must_use]
    pub fn enroll(
        course_id: CourseId,
        student_id: StudentId,
        reservation_id: Uuid,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now();
        Self {
            record: EnrollmentRecord {
                id: Uuid::new_v4(),
                course_id,
                student_id,
                status: EnrollmentStatus::Enrolled,
                grade: None,
                reservation_id,
                version: 1,
                enrolled_at: now,
                updated_at: now,
            },
            loaded_version: 0,
        }
    }

    /// Reconstitutes an enrollment from its stored record.
    #[must_use]
    pub fn from_record(record: EnrollmentRecord) -> Self {
        let loaded_version = record.version;
        Self {
            record,
            loaded_version,
        }
    }

    /// Returns the current state of the record.
    #[must_use]
    pub fn record(&self) -> &EnrollmentRecord {
        &self.record
    }

    /// Consumes the aggregate, returning its record.
    #[must_use]
    pub fn into_record(self) -> EnrollmentRecord {
        self.record
    }

    /// The version a conditional update must expect in the store.
    #[must_use]
    pub fn expected_version(&self) -> i64 {
        self.loaded_version
    }

    /// Whether the enrollment may be withdrawn: `ENROLLED` and ungraded.
    #[must_use]
    pub fn can_withdraw(&self) -> bool {
        self.record.status == EnrollmentStatus::Enrolled && self.record.grade.is_none()
    }

    /// Whether a grade may be assigned: `ENROLLED` or `COMPLETED`.
    #[must_use]
    pub fn can_grade(&self) -> bool {
        matches!(
            self.record.status,
            EnrollmentStatus::Enrolled | EnrollmentStatus::Completed
        )
    }

    /// Moves the enrollment to `WITHDRAWN`.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::IllegalWithdrawal` unless the enrollment is
    /// `ENROLLED` and ungraded.
    pub fn withdraw(&mut self, clock: &dyn Clock) -> Result<(), EnrollmentError> {
        if !self.can_withdraw() {
            return Err(EnrollmentError::IllegalWithdrawal {
                enrollment_id: self.record.id,
                status: self.record.status,
                graded: self.record.grade.is_some(),
            });
        }
        self.record.status = EnrollmentStatus::Withdrawn;
        self.touch(clock);
        Ok(())
    }

    /// Assigns a grade. Grading an `ENROLLED` enrollment completes it.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::IllegalGradeTransition` if the enrollment
    /// is `WITHDRAWN`.
    pub fn assign_grade(&mut self, grade: Grade, clock: &dyn Clock) -> Result<(), EnrollmentError> {
        if !self.can_grade() {
            return Err(EnrollmentError::IllegalGradeTransition {
                enrollment_id: self.record.id,
                status: self.record.status,
            });
        }
        self.record.grade = Some(grade);
        self.record.status = EnrollmentStatus::Completed;
        self.touch(clock);
        Ok(())
    }

    /// Applies an explicit status change. Returns whether anything changed;
    /// requesting the current status is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::IllegalWithdrawal` for a disallowed
    /// withdrawal and `EnrollmentError::IllegalStatusTransition` for any
    /// other edge the state machine does not have.
    pub fn transition_to(
        &mut self,
        target: EnrollmentStatus,
        clock: &dyn Clock,
    ) -> Result<bool, EnrollmentError> {
        let from = self.record.status;
        match (from, target) {
            (current, requested) if current == requested => Ok(false),
            (EnrollmentStatus::Enrolled, EnrollmentStatus::Completed) => {
                self.record.status = EnrollmentStatus::Completed;
                self.touch(clock);
                Ok(true)
            }
            (EnrollmentStatus::Enrolled | EnrollmentStatus::Completed, EnrollmentStatus::Withdrawn) => {
                self.withdraw(clock)?;
                Ok(true)
            }
            _ => Err(EnrollmentError::IllegalStatusTransition {
                enrollment_id: self.record.id,
                from,
                to: target,
            }),
        }
    }

    fn touch(&mut self, clock: &dyn Clock) {
        self.record.version += 1;
        self.record.updated_at = clock.now();
    }
}
