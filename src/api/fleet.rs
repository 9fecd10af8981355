//! Fleet-wide views: overview of all devices and the audit trail

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{api_error, auth::require_operator, devices::DeviceResponse, ApiError, ApiState};
use crate::audit::AuditEntry;
use crate::security::Operator;

const DEFAULT_AUDIT_LIMIT: usize = 100;

#[derive(Serialize)]
pub struct OverviewEntry {
    pub device: DeviceResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

/// Every device with its current player state
async fn overview(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
) -> Result<Json<Vec<OverviewEntry>>, ApiError> {
    let summaries = state.service.overview(&operator).await.map_err(api_error)?;
    Ok(Json(
        summaries
            .into_iter()
            .map(|s| OverviewEntry {
                device: DeviceResponse::from(&s.device),
                state: s.state,
                error: s.error,
            })
            .collect(),
    ))
}

/// Most recent operator actions, newest first
async fn audit(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<AuditEntry>> {
    Json(
        state
            .service
            .audit()
            .recent(query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT)),
    )
}

/// Build fleet router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/overview", get(overview))
        .route("/audit", get(audit))
        .layer(middleware::from_fn_with_state(state.clone(), require_operator))
        .with_state(state)
}
