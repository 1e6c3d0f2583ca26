//! Application layer: workflows, queries, and reconciliation.

pub mod coordinator;
pub mod query_handlers;
pub mod reconciler;
