//! HTTP API server for the slideshow manager

mod auth;
pub mod devices;
pub mod fleet;
pub mod health;
pub mod remote;
pub mod updates;

use std::sync::Arc;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiServerConfig;
use crate::error::status_hint;
use crate::security::OperatorAuth;
use crate::service::DeviceService;
use crate::updates::Updater;
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub service: DeviceService,
    pub auth: OperatorAuth,
    pub updates: Updater,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    /// HTTP status the device answered with, for remote failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_status: Option<u16>,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(code: &str, message: &str, device_status: Option<u16>) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
            device_status,
        },
    })
}

/// 404 for a device id that is not registered
pub(crate) fn device_not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        error_response("not_found", &format!("device '{id}' not found"), None),
    )
}

/// Map a crate error onto an HTTP status and body
pub(crate) fn api_error(err: Error) -> ApiError {
    match err {
        Error::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            error_response("validation_error", &msg, None),
        ),
        Error::RemoteAuth { status, message } => (
            StatusCode::BAD_GATEWAY,
            error_response("device_auth_error", &with_hint(message, status), status),
        ),
        Error::RemoteApi { status, message } => (
            StatusCode::BAD_GATEWAY,
            error_response("device_api_error", &with_hint(message, status), status),
        ),
        Error::Conflict(msg) => (StatusCode::CONFLICT, error_response("conflict", &msg, None)),
        Error::Update(msg) => {
            tracing::error!(error = %msg, "update failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_response("update_error", &msg, None),
            )
        }
        Error::Storage(msg) => {
            tracing::error!(error = %msg, "device registry failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_response("storage_error", &msg, None),
            )
        }
        other => {
            tracing::error!(error = %other, "internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_response("internal_error", &other.to_string(), None),
            )
        }
    }
}

fn with_hint(message: String, status: Option<u16>) -> String {
    match status.and_then(status_hint) {
        Some(hint) => format!("{message} ({hint})"),
        None => message,
    }
}

/// Unwrap a service result that is `None` for an unknown device
pub(crate) fn found<T>(id: &str, result: Result<Option<T>>) -> std::result::Result<T, ApiError> {
    result.map_err(api_error)?.ok_or_else(|| device_not_found(id))
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    config: ApiServerConfig,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: ApiState, config: ApiServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            config,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let api = Router::new()
            .merge(devices::router(self.state.clone()))
            .merge(remote::router(self.state.clone()))
            .merge(fleet::router(self.state.clone()))
            .merge(updates::router(self.state.clone()));

        let router = Router::new().nest("/api", api).merge(health::router());

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.bind, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server on {addr}: {e}")))?;

        tracing::info!(
            %addr,
            auth_mode = %self.state.auth.mode(),
            registry = %self.state.service.registry().path().display(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
