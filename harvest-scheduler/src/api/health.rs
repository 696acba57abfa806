//! Health Check API Handler

use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::service::Dispatcher;

/// GET /health
/// Liveness plus the number of configured sites and runs in progress
pub async fn health_check(State(dispatcher): State<Arc<Dispatcher>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sites": dispatcher.sites().len(),
        "active_runs": dispatcher.runs().active_count(),
    }))
}
