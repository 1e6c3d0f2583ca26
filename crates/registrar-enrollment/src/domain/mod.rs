//! Domain layer: the enrollment aggregate and the commands it handles.

pub mod aggregates;
pub mod commands;
