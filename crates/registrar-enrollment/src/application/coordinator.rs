//! Enrollment coordinator.
//!
//! Orchestrates the enroll, withdraw, and grading workflows across the
//! directory service, the catalog service, and the local enrollment store.
//! There is no shared transaction: capacity is protected by the catalog's
//! atomic seat reservation, active-pair uniqueness by the store, and every
//! counter adjustment that fails after a local commit is written to the
//! compensation log for the reconciler to replay.

use std::collections::BTreeMap;
use std::sync::Arc;

use registrar_core::catalog::{CatalogClient, CatalogError};
use registrar_core::clock::Clock;
use registrar_core::compensation::{AdjustmentKind, CompensationLog, PendingAdjustment};
use registrar_core::directory::DirectoryClient;
use registrar_core::error::EnrollmentError;
use registrar_core::ids::{CourseId, StudentId};
use registrar_core::record::{EnrollmentRecord, EnrollmentStatus, Grade};
use registrar_core::repository::EnrollmentRepository;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::Enrollment;
use crate::domain::commands::{
    BatchUpdateGrades, DeleteEnrollment, EnrollStudent, UpdateGrade, UpdateStatus,
    WithdrawStudent,
};

/// Coordinates enrollment workflows across the catalog, the directory, and
/// the enrollment store.
#[derive(Clone)]
pub struct EnrollmentCoordinator {
    directory: Arc<dyn DirectoryClient>,
    catalog: Arc<dyn CatalogClient>,
    repository: Arc<dyn EnrollmentRepository>,
    compensations: Arc<dyn CompensationLog>,
    clock: Arc<dyn Clock>,
}

impl EnrollmentCoordinator {
    /// Creates a coordinator over the given collaborators.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        catalog: Arc<dyn CatalogClient>,
        repository: Arc<dyn EnrollmentRepository>,
        compensations: Arc<dyn CompensationLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            catalog,
            repository,
            compensations,
            clock,
        }
    }

    /// Enrolls a student in a course.
    ///
    /// Checks run in order: idempotent replay, student existence, capacity
    /// snapshot, local duplicate, atomic seat reservation. Only then is the
    /// record committed. If the commit fails the seat is handed back, unless
    /// a concurrent call with the same key already committed against it.
    ///
    /// # Errors
    ///
    /// - `StudentNotFound`, `CourseNotFound` for unknown parties.
    /// - `CapacityExceeded` when the snapshot is full or the reservation loses.
    /// - `DuplicateEnrollment` when the student already holds an active record.
    /// - `IdempotencyConflict` when the key was used for another pair.
    /// - `DirectoryUnavailable` / `CatalogUnavailable` when a gating call fails.
    #[instrument(
        skip(self, command),
        fields(
            correlation_id = %command.correlation_id,
            course_id = %command.course_id,
            student_id = %command.student_id,
        )
    )]
    pub async fn enroll(&self, command: &EnrollStudent) -> Result<EnrollmentRecord, EnrollmentError> {
        let reservation_id = command.idempotency_key;

        if let Some(existing) = self.repository.find_by_reservation(reservation_id).await? {
            return Self::replay(existing, command);
        }

        if !self.directory.student_exists(&command.student_id).await? {
            return Err(EnrollmentError::StudentNotFound(command.student_id.clone()));
        }

        // A retry whose first attempt lost track of its reservation races the
        // reconciler's release of that reservation.
        let release_pending = self
            .release_pending(&command.course_id, reservation_id)
            .await;

        let snapshot = self.catalog.get_course_capacity(&command.course_id).await?;
        if !snapshot.has_free_seat() {
            return Err(EnrollmentError::CapacityExceeded(command.course_id.clone()));
        }

        if self
            .repository
            .exists_by_course_and_student_excluding_status(
                &command.course_id,
                &command.student_id,
                EnrollmentStatus::Withdrawn,
            )
            .await?
        {
            // A concurrent call with the same key may have committed meanwhile.
            if let Some(existing) = self.repository.find_by_reservation(reservation_id).await? {
                return Self::replay(existing, command);
            }
            return Err(EnrollmentError::DuplicateEnrollment {
                course_id: command.course_id.clone(),
                student_id: command.student_id.clone(),
            });
        }

        match self
            .catalog
            .reserve_seat(&command.course_id, reservation_id)
            .await
        {
            Ok(after) => debug!(
                %reservation_id,
                enrolled_count = after.enrolled_count,
                capacity = after.capacity,
                "seat reserved"
            ),
            Err(err @ (CatalogError::Unavailable(_) | CatalogError::Decode(_))) => {
                // The reservation may have landed before the failure.
                warn!(%reservation_id, error = %err, "seat reservation outcome unknown");
                self.record_compensation(
                    &command.course_id,
                    AdjustmentKind::ReleaseSeat { reservation_id },
                    "seat reservation outcome unknown",
                    &err.to_string(),
                )
                .await;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        }

        let enrollment = Enrollment::enroll(
            command.course_id.clone(),
            command.student_id.clone(),
            reservation_id,
            self.clock.as_ref(),
        );
        if let Err(err) = self.repository.create(enrollment.record()).await {
            return self.resolve_failed_commit(command, err).await;
        }

        if release_pending {
            self.confirm_seat(&command.course_id, reservation_id).await;
        }

        info!(enrollment_id = %enrollment.record().id, "student enrolled");
        Ok(enrollment.into_record())
    }

    /// Withdraws a student from a course and releases the seat.
    ///
    /// Returns `false` when the student holds no active enrollment in the
    /// course. A failed seat release does not fail the withdrawal; it is
    /// recorded for reconciliation.
    ///
    /// # Errors
    ///
    /// Returns `IllegalWithdrawal` once grading has begun, and store errors.
    #[instrument(
        skip(self, command),
        fields(
            correlation_id = %command.correlation_id,
            course_id = %command.course_id,
            student_id = %command.student_id,
        )
    )]
    pub async fn withdraw(&self, command: &WithdrawStudent) -> Result<bool, EnrollmentError> {
        let Some(record) = self
            .repository
            .find_active(&command.course_id, &command.student_id)
            .await?
        else {
            debug!("no active enrollment to withdraw");
            return Ok(false);
        };

        let mut enrollment = Enrollment::from_record(record);
        enrollment.withdraw(self.clock.as_ref())?;
        if !self
            .commit_withdrawal(&enrollment, &command.course_id, &command.student_id)
            .await?
        {
            return Ok(false);
        }

        let record = enrollment.record();
        self.release_seat_best_effort(
            &record.course_id,
            record.reservation_id,
            "seat release after withdrawal failed",
        )
        .await;

        info!(enrollment_id = %record.id, "student withdrawn");
        Ok(true)
    }

    /// Sets the grade of one enrollment, completing it if it was `ENROLLED`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrade` outside `[0, 100]`, `EnrollmentNotFound`,
    /// `IllegalGradeTransition` for withdrawn enrollments, and store errors.
    #[instrument(
        skip(self, command),
        fields(correlation_id = %command.correlation_id, enrollment_id = %command.enrollment_id)
    )]
    pub async fn update_grade(
        &self,
        command: &UpdateGrade,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        let grade = Grade::new(command.grade)?;
        let mut enrollment = self.load(command.enrollment_id).await?;

        enrollment.assign_grade(grade, self.clock.as_ref())?;
        self.repository
            .update(enrollment.record(), enrollment.expected_version())
            .await?;

        info!(grade = grade.value(), "grade updated");
        Ok(enrollment.into_record())
    }

    /// Grades several students of a course. Every value is validated before
    /// any is applied; students without a gradeable enrollment in the course
    /// are skipped. Returns how many enrollments were updated.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty batch, `InvalidGrade` if any value
    /// is out of range, and store errors.
    #[instrument(
        skip(self, command),
        fields(correlation_id = %command.correlation_id, course_id = %command.course_id)
    )]
    pub async fn batch_update_grades(
        &self,
        command: &BatchUpdateGrades,
    ) -> Result<usize, EnrollmentError> {
        if command.grades.is_empty() {
            return Err(EnrollmentError::Validation(
                "grades must not be empty".to_owned(),
            ));
        }
        let grades = command
            .grades
            .iter()
            .map(|(student_id, raw)| Grade::new(*raw).map(|grade| (student_id, grade)))
            .collect::<Result<BTreeMap<&StudentId, Grade>, _>>()?;

        let mut updated = 0;
        for record in self.repository.list_by_course(&command.course_id).await? {
            let Some(grade) = grades.get(&record.student_id).copied() else {
                continue;
            };
            let mut enrollment = Enrollment::from_record(record);
            if !enrollment.can_grade() {
                continue;
            }
            enrollment.assign_grade(grade, self.clock.as_ref())?;
            self.repository
                .update(enrollment.record(), enrollment.expected_version())
                .await?;
            updated += 1;
        }

        info!(requested = grades.len(), updated, "batch grades applied");
        Ok(updated)
    }

    /// Moves an enrollment to another status along a legal edge. Moving to
    /// `WITHDRAWN` releases the seat like a withdrawal.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentNotFound`, `IllegalWithdrawal`,
    /// `IllegalStatusTransition`, and store errors.
    #[instrument(
        skip(self, command),
        fields(
            correlation_id = %command.correlation_id,
            enrollment_id = %command.enrollment_id,
            status = %command.status,
        )
    )]
    pub async fn update_status(
        &self,
        command: &UpdateStatus,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        let mut enrollment = self.load(command.enrollment_id).await?;

        if !enrollment.transition_to(command.status, self.clock.as_ref())? {
            return Ok(enrollment.into_record());
        }
        self.repository
            .update(enrollment.record(), enrollment.expected_version())
            .await?;

        if command.status == EnrollmentStatus::Withdrawn {
            let record = enrollment.record();
            self.release_seat_best_effort(
                &record.course_id,
                record.reservation_id,
                "seat release after status change to WITHDRAWN failed",
            )
            .await;
        }

        info!("enrollment status updated");
        Ok(enrollment.into_record())
    }

    /// Administratively deletes an enrollment record. Deleting an active
    /// record gives its seat back. Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    #[instrument(
        skip(self, command),
        fields(correlation_id = %command.correlation_id, enrollment_id = %command.enrollment_id)
    )]
    pub async fn delete_enrollment(
        &self,
        command: &DeleteEnrollment,
    ) -> Result<bool, EnrollmentError> {
        let existing = self.repository.get(command.enrollment_id).await?;
        if !self.repository.delete(command.enrollment_id).await? {
            return Ok(false);
        }

        if let Some(record) = existing.filter(|r| r.status.is_active()) {
            self.release_seat_best_effort(
                &record.course_id,
                record.reservation_id,
                "seat release after enrollment deletion failed",
            )
            .await;
        }

        info!("enrollment deleted");
        Ok(true)
    }

    async fn load(&self, enrollment_id: Uuid) -> Result<Enrollment, EnrollmentError> {
        self.repository
            .get(enrollment_id)
            .await?
            .map(Enrollment::from_record)
            .ok_or(EnrollmentError::EnrollmentNotFound(enrollment_id))
    }

    /// Persists a withdrawal. Returns `false` if a concurrent request
    /// already withdrew the enrollment.
    async fn commit_withdrawal(
        &self,
        enrollment: &Enrollment,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<bool, EnrollmentError> {
        match self
            .repository
            .update(enrollment.record(), enrollment.expected_version())
            .await
        {
            Ok(()) => Ok(true),
            Err(
                err @ (EnrollmentError::ConcurrencyConflict { .. }
                | EnrollmentError::EnrollmentNotFound(_)),
            ) => {
                if self
                    .repository
                    .find_active(course_id, student_id)
                    .await?
                    .is_none()
                {
                    info!("enrollment withdrawn by a concurrent request");
                    return Ok(false);
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn replay(
        existing: EnrollmentRecord,
        command: &EnrollStudent,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        if existing.course_id == command.course_id && existing.student_id == command.student_id {
            info!(enrollment_id = %existing.id, "replaying idempotent enroll request");
            return Ok(existing);
        }
        Err(EnrollmentError::IdempotencyConflict(command.idempotency_key))
    }

    /// Decides what happens to the reserved seat after `create` failed.
    ///
    /// A concurrent call with the same key shares the reservation, so the
    /// seat is only handed back when no stored record holds it.
    async fn resolve_failed_commit(
        &self,
        command: &EnrollStudent,
        err: EnrollmentError,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        let reservation_id = command.idempotency_key;
        match self.repository.find_by_reservation(reservation_id).await {
            Ok(Some(existing)) => {
                debug!(%reservation_id, error = %err, "reservation already committed by a concurrent call");
                Self::replay(existing, command)
            }
            Ok(None) => {
                warn!(%reservation_id, error = %err, "enrollment commit failed; releasing seat");
                self.release_seat_best_effort(
                    &command.course_id,
                    reservation_id,
                    "enrollment commit failed after seat reservation",
                )
                .await;
                Err(err)
            }
            Err(lookup) => {
                // Unknown whether a record holds the seat; the reconciler
                // checks again before releasing.
                warn!(%reservation_id, error = %lookup, "enrollment commit failed; seat owner unknown");
                self.record_compensation(
                    &command.course_id,
                    AdjustmentKind::ReleaseSeat { reservation_id },
                    "enrollment commit failed after seat reservation",
                    &err.to_string(),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn release_pending(&self, course_id: &CourseId, reservation_id: Uuid) -> bool {
        match self.compensations.pending(usize::MAX).await {
            Ok(entries) => entries.iter().any(|entry| {
                &entry.course_id == course_id
                    && entry.kind == AdjustmentKind::ReleaseSeat { reservation_id }
            }),
            Err(err) => {
                warn!(%reservation_id, error = %err, "cannot read pending adjustments; seat will be confirmed");
                true
            }
        }
    }

    /// Takes the seat again after commit in case the reconciler released
    /// it between our reservation and the commit.
    async fn confirm_seat(&self, course_id: &CourseId, reservation_id: Uuid) {
        match self.catalog.reserve_seat(course_id, reservation_id).await {
            Ok(after) => debug!(
                %reservation_id,
                enrolled_count = after.enrolled_count,
                "seat confirmed after pending release"
            ),
            Err(err) => {
                warn!(%reservation_id, error = %err, "seat confirmation failed");
                // Replaying a release for a reservation in use re-takes the seat.
                self.record_compensation(
                    course_id,
                    AdjustmentKind::ReleaseSeat { reservation_id },
                    "seat confirmation failed after a pending release",
                    &err.to_string(),
                )
                .await;
            }
        }
    }

    async fn release_seat_best_effort(
        &self,
        course_id: &CourseId,
        reservation_id: Uuid,
        reason: &str,
    ) {
        match self.catalog.release_seat(course_id, reservation_id).await {
            Ok(()) => debug!(%course_id, %reservation_id, "seat released"),
            Err(err) => {
                warn!(
                    %course_id,
                    %reservation_id,
                    error = %err,
                    "seat release failed; enrolled count is now ahead of the store"
                );
                self.record_compensation(
                    course_id,
                    AdjustmentKind::ReleaseSeat { reservation_id },
                    reason,
                    &err.to_string(),
                )
                .await;
            }
        }
    }

    async fn record_compensation(
        &self,
        course_id: &CourseId,
        kind: AdjustmentKind,
        reason: &str,
        cause: &str,
    ) {
        let adjustment = PendingAdjustment::new(
            course_id.clone(),
            kind,
            reason,
            Some(cause.to_owned()),
            self.clock.now(),
        );
        let adjustment_id = adjustment.id;
        match self.compensations.record(adjustment).await {
            Ok(()) => warn!(%course_id, %adjustment_id, reason, "catalog adjustment queued for reconciliation"),
            Err(err) => error!(
                %course_id,
                ?kind,
                reason,
                error = %err,
                "failed to record catalog adjustment; manual reconciliation required"
            ),
        }
    }
}
