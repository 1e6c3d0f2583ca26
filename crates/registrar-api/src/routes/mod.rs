//! HTTP routes.

pub mod enrollments;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Builds the application router. Layers are added by the caller.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/enrollments", enrollments::router())
        .with_state(state)
}
