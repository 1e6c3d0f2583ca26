//! Registrar Core: shared enrollment abstractions.
//!
//! This crate defines the identifiers, the stored enrollment record, the
//! error taxonomy, and the ports through which the coordinator reaches its
//! collaborators (the enrollment store, the compensation log, the catalog
//! service, and the directory service). It contains no infrastructure code.

pub mod catalog;
pub mod clock;
pub mod compensation;
pub mod directory;
pub mod error;
pub mod ids;
pub mod record;
pub mod repository;
