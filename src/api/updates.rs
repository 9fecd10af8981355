//! Self-update endpoints

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{api_error, auth::require_operator, ApiError, ApiState};
use crate::security::Operator;
use crate::updates::UpdateOutcome;
use crate::Error;

/// Audit target for manager-wide actions
const MANAGER_TARGET: &str = "manager";

#[derive(Serialize)]
pub struct BranchesResponse {
    /// Release branches, oldest first
    pub branches: Vec<String>,
    pub latest: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// Release branch to install; the newest one when absent
    pub branch: Option<String>,
}

async fn list_branches(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<BranchesResponse>, ApiError> {
    let branches = state.updates.version_branches().await.map_err(api_error)?;
    Ok(Json(BranchesResponse {
        latest: branches.last().cloned(),
        branches,
    }))
}

/// Body is optional JSON; an empty body means "newest release"
fn parse_run_request(body: &[u8]) -> Result<RunRequest, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| Error::Validation(format!("invalid request body: {e}")))
}

async fn run_update(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    body: Bytes,
) -> Result<(StatusCode, Json<UpdateOutcome>), ApiError> {
    let request = parse_run_request(&body).map_err(api_error)?;
    let branch = request
        .branch
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());

    let outcome = state.updates.run(branch).await.map_err(api_error)?;

    let action = if outcome.success { "update.run" } else { "update.failed" };
    state.service.audit().record(
        &operator,
        MANAGER_TARGET,
        action,
        Some(&json!({ "branch": outcome.branch })),
    );

    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(outcome)))
}

/// Build updates router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/updates/branches", get(list_branches))
        .route("/updates/run", post(run_update))
        .layer(middleware::from_fn_with_state(state.clone(), require_operator))
        .with_state(state)
}
