//! Registrar API: HTTP surface, configuration, and telemetry for the
//! enrollment coordinator.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
