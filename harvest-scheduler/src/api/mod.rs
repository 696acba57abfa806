//! Status API
//!
//! Read-only observability surface of the scheduler, plus a manual trigger.
//! Served only when a status address is configured.

pub mod error;
pub mod health;
pub mod runs;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::Dispatcher;

/// Create the status router
pub fn create_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Run state
        .route("/runs", get(runs::list_runs))
        .route("/runs/{id}", get(runs::get_run).post(runs::trigger_run))
        .with_state(dispatcher)
        .layer(TraceLayer::new_for_http())
}
