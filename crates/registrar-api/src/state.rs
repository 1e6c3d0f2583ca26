//! Shared application state.

use std::sync::Arc;

use registrar_core::catalog::CatalogClient;
use registrar_core::repository::EnrollmentRepository;
use registrar_enrollment::application::coordinator::EnrollmentCoordinator;
use registrar_enrollment::application::reconciler::Reconciler;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Write-side workflows.
    pub coordinator: EnrollmentCoordinator,
    /// Read side for roster and grade queries.
    pub repository: Arc<dyn EnrollmentRepository>,
    /// Catalog, for occupancy reports.
    pub catalog: Arc<dyn CatalogClient>,
    /// Counter repair, also run in the background by `main`.
    pub reconciler: Reconciler,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        coordinator: EnrollmentCoordinator,
        repository: Arc<dyn EnrollmentRepository>,
        catalog: Arc<dyn CatalogClient>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            coordinator,
            repository,
            catalog,
            reconciler,
        }
    }
}
