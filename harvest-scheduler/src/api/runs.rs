//! Run API Handlers
//!
//! HTTP endpoints exposing run records and manual triggers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use harvest_core::domain::run::RunRecord;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::service::Dispatcher;

/// GET /runs
/// Run record of every configured site, in load order
pub async fn list_runs(State(dispatcher): State<Arc<Dispatcher>>) -> Json<Vec<RunRecord>> {
    Json(dispatcher.status())
}

/// GET /runs/{id}
pub async fn get_run(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RunRecord>> {
    if dispatcher.sites().get(&id).is_none() {
        return Err(ApiError::NotFound(format!("Site {} not found", id)));
    }

    Ok(Json(dispatcher.runs().snapshot(&id)))
}

/// POST /runs/{id}
/// Starts a run of one site in the background
pub async fn trigger_run(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    if dispatcher.sites().get(&id).is_none() {
        return Err(ApiError::NotFound(format!("Site {} not found", id)));
    }

    // Best-effort early answer; the dispatcher still enforces exclusivity.
    if dispatcher.runs().snapshot(&id).active {
        return Err(ApiError::Conflict(format!("Site {} is already running", id)));
    }

    tracing::info!("Manual run requested for site {}", id);

    let site_id = id.clone();
    tokio::spawn(async move {
        let outcome = dispatcher.run_one(&site_id).await;
        if outcome.is_already_running() {
            tracing::warn!("Manual run of site {} lost the race to another run", site_id);
        } else {
            tracing::info!("Manual run of site {}: {}", site_id, outcome);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "site_id": id, "accepted": true })),
    ))
}
