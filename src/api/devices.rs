//! Device registry endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;

use super::{api_error, auth::require_operator, device_not_found, ApiError, ApiState};
use crate::registry::{Device, DeviceUpdate, NewDevice};
use crate::security::Operator;

/// Device record as exposed over HTTP; the password never leaves the server
#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub username: String,
    pub has_password: bool,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

impl From<&Device> for DeviceResponse {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            base_url: device.base_url.clone(),
            username: device.username.clone(),
            has_password: !device.password.is_empty(),
            notes: device.notes.clone(),
            tags: device.tags.clone(),
        }
    }
}

/// List registered devices
async fn list_devices(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
) -> Result<Json<Vec<DeviceResponse>>, ApiError> {
    let devices = state.service.list_devices(&operator).map_err(api_error)?;
    Ok(Json(devices.iter().map(DeviceResponse::from).collect()))
}

/// Register a device
async fn create_device(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Json(fields): Json<NewDevice>,
) -> Result<(StatusCode, Json<DeviceResponse>), ApiError> {
    let device = state.service.add_device(&operator, fields).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(DeviceResponse::from(&device))))
}

/// Fetch one device record
async fn get_device(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device = state
        .service
        .get_device(&operator, &id)
        .map_err(api_error)?
        .ok_or_else(|| device_not_found(&id))?;
    Ok(Json(DeviceResponse::from(&device)))
}

/// Partially update a device
///
/// A blank password keeps the stored one, so edit forms can leave it empty.
async fn update_device(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
    Json(mut update): Json<DeviceUpdate>,
) -> Result<Json<DeviceResponse>, ApiError> {
    update.password = update.password.filter(|p| !p.is_empty());

    let device = state
        .service
        .update_device(&operator, &id, update)
        .map_err(api_error)?
        .ok_or_else(|| device_not_found(&id))?;
    Ok(Json(DeviceResponse::from(&device)))
}

/// Remove a device
async fn delete_device(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.service.delete_device(&operator, &id).map_err(api_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(device_not_found(&id))
    }
}

/// Build devices router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/devices", get(list_devices).post(create_device))
        .route(
            "/devices/{id}",
            get(get_device).patch(update_device).delete(delete_device),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_operator))
        .with_state(state)
}
