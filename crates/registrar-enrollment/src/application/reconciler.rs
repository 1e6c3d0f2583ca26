//! Background reconciliation of the catalog's enrolled counters.
//!
//! Replays pending adjustments from the compensation log through the
//! idempotent catalog calls, and repairs a course's counter on demand by
//! comparing it with the store's active records.

use std::sync::Arc;
use std::time::Duration;

use registrar_core::catalog::{CatalogClient, CatalogError};
use registrar_core::compensation::{AdjustmentKind, CompensationLog, PendingAdjustment};
use registrar_core::error::EnrollmentError;
use registrar_core::ids::CourseId;
use registrar_core::record::EnrollmentStatus;
use registrar_core::repository::EnrollmentRepository;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Default poll interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of entries replayed per cycle.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome of one reconciliation cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Entries looked at.
    pub attempted: usize,
    /// Entries whose adjustment was applied.
    pub resolved: usize,
    /// Entries dropped because the store shows the seat is legitimately
    /// held, or the course no longer exists.
    pub obsolete: usize,
    /// Entries that failed again and stay pending.
    pub failed: usize,
}

/// Outcome of repairing one course's enrolled counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OccupancyRepair {
    /// Counter already matched the store.
    InSync {
        /// The agreed count.
        enrolled_count: u32,
    },
    /// A delta was applied.
    Repaired {
        /// Catalog count before the repair.
        before: u32,
        /// Catalog count after the repair.
        after: u32,
        /// Applied delta.
        delta: i32,
    },
    /// Pending adjustments for the course must drain first.
    Deferred {
        /// How many adjustments are still pending for the course.
        pending_adjustments: usize,
    },
}

enum Replay {
    Applied,
    Obsolete,
}

/// Drives pending catalog adjustments to completion.
#[derive(Clone)]
pub struct Reconciler {
    catalog: Arc<dyn CatalogClient>,
    repository: Arc<dyn EnrollmentRepository>,
    compensations: Arc<dyn CompensationLog>,
    interval: Duration,
    batch_size: usize,
}

impl Reconciler {
    /// Creates a reconciler with the default interval and batch size.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        repository: Arc<dyn EnrollmentRepository>,
        compensations: Arc<dyn CompensationLog>,
    ) -> Self {
        Self {
            catalog,
            repository,
            compensations,
            interval: DEFAULT_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Overrides the poll interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides how many entries one cycle replays.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Replays up to one batch of pending adjustments.
    ///
    /// # Errors
    ///
    /// Returns an error only if the compensation log itself fails. Catalog
    /// failures are recorded on the entry and counted in the report.
    #[instrument(skip(self))]
    pub async fn reconcile_pending(&self) -> Result<ReconcileReport, EnrollmentError> {
        let entries = self.compensations.pending(self.batch_size).await?;
        let mut report = ReconcileReport {
            attempted: entries.len(),
            ..ReconcileReport::default()
        };

        for entry in entries {
            match self.replay(&entry).await {
                Ok(Replay::Applied) => {
                    self.compensations.resolve(entry.id).await?;
                    info!(adjustment_id = %entry.id, course_id = %entry.course_id, "catalog adjustment applied");
                    report.resolved += 1;
                }
                Ok(Replay::Obsolete) => {
                    self.compensations.resolve(entry.id).await?;
                    report.obsolete += 1;
                }
                Err(err) => {
                    warn!(
                        adjustment_id = %entry.id,
                        course_id = %entry.course_id,
                        attempts = entry.attempts + 1,
                        error = %err,
                        "catalog adjustment still failing"
                    );
                    self.compensations
                        .record_failure(entry.id, &err.to_string())
                        .await?;
                    report.failed += 1;
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                resolved = report.resolved,
                obsolete = report.obsolete,
                failed = report.failed,
                "reconciliation cycle finished"
            );
        }
        Ok(report)
    }

    /// Settles one pending adjustment against the catalog.
    ///
    /// A `ReleaseSeat` only frees a reservation no active record holds.
    /// Since the check and the release are separate calls, the store is read
    /// again after releasing, and a seat taken back from a record that
    /// committed in between is re-reserved.
    async fn replay(&self, entry: &PendingAdjustment) -> Result<Replay, EnrollmentError> {
        let outcome = match entry.kind {
            AdjustmentKind::ReleaseSeat { reservation_id } => {
                if self.reservation_in_use(reservation_id).await? {
                    debug!(%reservation_id, "reservation backs an active enrollment; dropping release");
                    self.hold_seat(entry, reservation_id)
                        .await
                        .map(|()| Replay::Obsolete)
                } else {
                    let released = self
                        .catalog
                        .release_seat(&entry.course_id, reservation_id)
                        .await;
                    if released.is_ok() && self.reservation_in_use(reservation_id).await? {
                        warn!(%reservation_id, "enrollment committed while its seat was released; re-reserving");
                        self.hold_seat(entry, reservation_id)
                            .await
                            .map(|()| Replay::Applied)
                    } else {
                        released.map(|()| Replay::Applied)
                    }
                }
            }
            AdjustmentKind::ApplyDelta {
                delta,
                adjustment_id,
            } => self
                .catalog
                .apply_enrolled_delta(&entry.course_id, delta, adjustment_id)
                .await
                .map(|_| Replay::Applied),
        };

        match outcome {
            Ok(replay) => Ok(replay),
            Err(CatalogError::CourseNotFound(course_id)) => {
                warn!(%course_id, adjustment_id = %entry.id, "course no longer exists; dropping adjustment");
                Ok(Replay::Obsolete)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Makes sure the catalog counts the seat of a reservation an active
    /// record holds. `reserve_seat` is a no-op while the reservation stands.
    async fn hold_seat(
        &self,
        entry: &PendingAdjustment,
        reservation_id: Uuid,
    ) -> Result<(), CatalogError> {
        match self.catalog.reserve_seat(&entry.course_id, reservation_id).await {
            Ok(_) => Ok(()),
            Err(CatalogError::NoSeatsAvailable(course_id)) => {
                // The freed seat went to someone else; count the record anyway.
                warn!(%course_id, %reservation_id, "course over capacity after release race; adjusting count");
                self.catalog
                    .apply_enrolled_delta(&course_id, 1, entry.id)
                    .await
                    .map(|_| ())
            }
            Err(err) => Err(err),
        }
    }

    async fn reservation_in_use(&self, reservation_id: Uuid) -> Result<bool, EnrollmentError> {
        Ok(self
            .repository
            .find_by_reservation(reservation_id)
            .await?
            .is_some_and(|record| record.status.is_active()))
    }

    /// Brings the catalog's enrolled count of a course in line with the
    /// number of active records in the store.
    ///
    /// Meant for operators: seats reserved by enrollments still in flight
    /// are counted by the catalog but not yet by the store.
    ///
    /// # Errors
    ///
    /// Returns catalog, store, and compensation log errors.
    #[instrument(skip(self), fields(course_id = %course_id))]
    pub async fn repair_course_occupancy(
        &self,
        course_id: &CourseId,
    ) -> Result<OccupancyRepair, EnrollmentError> {
        let pending_adjustments = self
            .compensations
            .pending(usize::MAX)
            .await?
            .iter()
            .filter(|entry| &entry.course_id == course_id)
            .count();
        if pending_adjustments > 0 {
            info!(pending_adjustments, "occupancy repair deferred");
            return Ok(OccupancyRepair::Deferred {
                pending_adjustments,
            });
        }

        let snapshot = self.catalog.get_course_capacity(course_id).await?;
        let active = self
            .repository
            .count_by_course_excluding_status(course_id, EnrollmentStatus::Withdrawn)
            .await?;
        let active = i64::try_from(active).unwrap_or(i64::MAX);
        let delta = i32::try_from(active - i64::from(snapshot.enrolled_count)).map_err(|_| {
            EnrollmentError::Infrastructure(format!(
                "enrolled count drift for course {course_id} does not fit a single adjustment"
            ))
        })?;
        if delta == 0 {
            return Ok(OccupancyRepair::InSync {
                enrolled_count: snapshot.enrolled_count,
            });
        }

        let after = self
            .catalog
            .apply_enrolled_delta(course_id, delta, Uuid::new_v4())
            .await?;
        warn!(
            before = snapshot.enrolled_count,
            after = after.enrolled_count,
            delta,
            "enrolled count repaired"
        );
        Ok(OccupancyRepair::Repaired {
            before: snapshot.enrolled_count,
            after: after.enrolled_count,
            delta,
        })
    }

    /// Runs reconciliation cycles until `shutdown` turns `true` or its
    /// sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis(), batch_size = self.batch_size, "reconciler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.reconcile_pending().await {
                        warn!(error = %err, "reconciliation cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("reconciler stopped");
    }
}
