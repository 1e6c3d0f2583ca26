//! Test compensation log: keeps pending adjustments in memory.

use std::sync::Mutex;

use async_trait::async_trait;
use registrar_core::compensation::{CompensationLog, PendingAdjustment};
use registrar_core::error::EnrollmentError;
use uuid::Uuid;

/// An in-memory compensation log. Resolved entries are removed.
#[derive(Debug, Default)]
pub struct InMemoryCompensationLog {
    entries: Mutex<Vec<PendingAdjustment>>,
}

impl InMemoryCompensationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every unresolved entry.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn entries(&self) -> Vec<PendingAdjustment> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompensationLog for InMemoryCompensationLog {
    async fn record(&self, adjustment: PendingAdjustment) -> Result<(), EnrollmentError> {
        self.entries.lock().unwrap().push(adjustment);
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<PendingAdjustment>, EnrollmentError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn resolve(&self, id: Uuid) -> Result<(), EnrollmentError> {
        self.entries.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), EnrollmentError> {
        if let Some(entry) = self.entries.lock().unwrap().iter_mut().find(|e| e.id == id) {
            entry.attempts += 1;
            entry.last_error = Some(error.to_owned());
        }
        Ok(())
    }
}
