//! Shared test fakes and utilities for Registrar.

mod catalog;
mod clock;
mod compensation;
mod directory;
mod repository;

pub use catalog::InMemoryCatalog;
pub use clock::{FixedClock, fixed_clock};
pub use compensation::InMemoryCompensationLog;
pub use directory::StaticDirectory;
pub use repository::{FailingEnrollmentRepository, InMemoryEnrollmentRepository};
