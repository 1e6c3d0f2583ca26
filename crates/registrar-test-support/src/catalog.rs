//! Test catalog: an in-memory seat counter with failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use registrar_core::catalog::{CatalogClient, CatalogError, CourseCapacity};
use registrar_core::ids::CourseId;
use uuid::Uuid;

#[derive(Debug, Default)]
struct CourseSeats {
    capacity: u32,
    enrolled_count: u32,
    reservations: HashSet<Uuid>,
    adjustments: HashSet<Uuid>,
}

/// An in-memory catalog whose `reserve_seat` is an atomic
/// compare-and-increment, mirroring what the real catalog service exposes.
///
/// `get_course_capacity` yields to the scheduler after taking its snapshot,
/// so concurrent enroll calls can all observe the same free seat and only
/// `reserve_seat` decides who gets it.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    courses: Mutex<HashMap<CourseId, CourseSeats>>,
    reads_unavailable: AtomicBool,
    reserve_unavailable: AtomicBool,
    release_unavailable: AtomicBool,
    delta_unavailable: AtomicBool,
    reserve_calls: AtomicUsize,
    release_calls: AtomicUsize,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a course with the given capacity and enrolled count.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_course(self, course_id: &str, capacity: u32, enrolled_count: u32) -> Self {
        self.courses.lock().unwrap().insert(
            CourseId::new(course_id).unwrap(),
            CourseSeats {
                capacity,
                enrolled_count,
                ..CourseSeats::default()
            },
        );
        self
    }

    /// Returns the current enrolled count of a course.
    ///
    /// # Panics
    ///
    /// Panics if the course is unknown.
    pub fn enrolled_count(&self, course_id: &str) -> u32 {
        let id = CourseId::new(course_id).unwrap();
        self.courses.lock().unwrap()[&id].enrolled_count
    }

    /// Number of `reserve_seat` calls received, successful or not.
    pub fn reserve_calls(&self) -> usize {
        self.reserve_calls.load(Ordering::SeqCst)
    }

    /// Number of `release_seat` calls received, successful or not.
    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    /// Makes `get_course_capacity` fail with `Unavailable`.
    pub fn set_reads_unavailable(&self, unavailable: bool) {
        self.reads_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes `reserve_seat` fail with `Unavailable`.
    pub fn set_reserve_unavailable(&self, unavailable: bool) {
        self.reserve_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes `release_seat` fail with `Unavailable`.
    pub fn set_release_unavailable(&self, unavailable: bool) {
        self.release_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes `apply_enrolled_delta` fail with `Unavailable`.
    pub fn set_delta_unavailable(&self, unavailable: bool) {
        self.delta_unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn snapshot(course_id: &CourseId, seats: &CourseSeats) -> CourseCapacity {
        CourseCapacity {
            course_id: course_id.clone(),
            capacity: seats.capacity,
            enrolled_count: seats.enrolled_count,
        }
    }
}

fn unavailable<T>() -> Result<T, CatalogError> {
    Err(CatalogError::Unavailable("connection timed out".into()))
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn get_course_capacity(
        &self,
        course_id: &CourseId,
    ) -> Result<CourseCapacity, CatalogError> {
        if self.reads_unavailable.load(Ordering::SeqCst) {
            return unavailable();
        }
        let snapshot = self
            .courses
            .lock()
            .unwrap()
            .get(course_id)
            .map(|seats| Self::snapshot(course_id, seats));
        tokio::task::yield_now().await;
        snapshot.ok_or_else(|| CatalogError::CourseNotFound(course_id.clone()))
    }

    async fn reserve_seat(
        &self,
        course_id: &CourseId,
        reservation_id: Uuid,
    ) -> Result<CourseCapacity, CatalogError> {
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);
        if self.reserve_unavailable.load(Ordering::SeqCst) {
            return unavailable();
        }
        let mut courses = self.courses.lock().unwrap();
        let seats = courses
            .get_mut(course_id)
            .ok_or_else(|| CatalogError::CourseNotFound(course_id.clone()))?;
        if seats.reservations.contains(&reservation_id) {
            return Ok(Self::snapshot(course_id, seats));
        }
        if seats.enrolled_count >= seats.capacity {
            return Err(CatalogError::NoSeatsAvailable(course_id.clone()));
        }
        seats.enrolled_count += 1;
        seats.reservations.insert(reservation_id);
        Ok(Self::snapshot(course_id, seats))
    }

    async fn release_seat(
        &self,
        course_id: &CourseId,
        reservation_id: Uuid,
    ) -> Result<(), CatalogError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.release_unavailable.load(Ordering::SeqCst) {
            return unavailable();
        }
        let mut courses = self.courses.lock().unwrap();
        let seats = courses
            .get_mut(course_id)
            .ok_or_else(|| CatalogError::CourseNotFound(course_id.clone()))?;
        if seats.reservations.remove(&reservation_id) {
            seats.enrolled_count = seats.enrolled_count.saturating_sub(1);
        }
        Ok(())
    }

    async fn apply_enrolled_delta(
        &self,
        course_id: &CourseId,
        delta: i32,
        adjustment_id: Uuid,
    ) -> Result<CourseCapacity, CatalogError> {
        if self.delta_unavailable.load(Ordering::SeqCst) {
            return unavailable();
        }
        let mut courses = self.courses.lock().unwrap();
        let seats = courses
            .get_mut(course_id)
            .ok_or_else(|| CatalogError::CourseNotFound(course_id.clone()))?;
        if seats.adjustments.insert(adjustment_id) {
            seats.enrolled_count = seats.enrolled_count.saturating_add_signed(delta);
        }
        Ok(Self::snapshot(course_id, seats))
    }
}
