//! Endpoints that proxy one operation to a device's REST API

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::{api_error, auth::require_operator, found, ApiError, ApiState};
use crate::coerce::PlaybackForm;
use crate::gateway::{MediaPayload, SourceSpec};
use crate::security::Operator;
use crate::Error;

#[derive(Deserialize)]
pub struct PreviewQuery {
    pub source: String,
    pub path: String,
}

#[derive(Deserialize)]
pub struct InfoScreenRequest {
    pub enabled: bool,
}

/// Serve a device's binary payload, optionally as a download
fn media_response(payload: MediaPayload, download_name: Option<&str>) -> Response {
    let mut headers = HeaderMap::new();
    let content_type = payload
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    if let Some(name) = download_name {
        let name: String = name.chars().filter(|c| *c != '"' && !c.is_control()).collect();
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    (headers, payload.bytes).into_response()
}

async fn get_state(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    found(&id, state.service.get_state(&operator, &id).await).map(Json)
}

async fn get_config(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    found(&id, state.service.get_config(&operator, &id).await).map(Json)
}

async fn list_sources(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    found(&id, state.service.list_sources(&operator, &id).await).map(Json)
}

async fn create_source(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
    Json(spec): Json<SourceSpec>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let spec = spec.cleaned();
    let created = found(&id, state.service.create_source(&operator, &id, &spec).await)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_source(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path((id, name)): Path<(String, String)>,
    Json(spec): Json<SourceSpec>,
) -> Result<Json<Value>, ApiError> {
    let spec = spec.cleaned();
    found(&id, state.service.update_source(&operator, &id, &name, &spec).await).map(Json)
}

async fn delete_source(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    found(&id, state.service.delete_source(&operator, &id, &name).await).map(Json)
}

/// Update playback settings from free-text form values
async fn set_playback(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
    Json(form): Json<PlaybackForm>,
) -> Result<Json<Value>, ApiError> {
    let settings = form.into_settings().map_err(api_error)?;
    found(&id, state.service.set_playback(&operator, &id, &settings).await).map(Json)
}

async fn player_action(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    found(&id, state.service.player_action(&operator, &id, &action).await).map(Json)
}

async fn toggle_info_screen(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
    Json(req): Json<InfoScreenRequest>,
) -> Result<Json<Value>, ApiError> {
    found(&id, state.service.toggle_info_screen(&operator, &id, req.enabled).await).map(Json)
}

async fn preview(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, ApiError> {
    let payload = found(
        &id,
        state
            .service
            .fetch_preview(&operator, &id, &query.source, &query.path)
            .await,
    )?;
    Ok(media_response(payload, None))
}

async fn export_config(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let payload = found(&id, state.service.export_config(&operator, &id).await)?;
    Ok(media_response(payload, Some(&format!("slideshow-config-{id}.json"))))
}

/// Forward the multipart `file` field to the device's config import
async fn import_config(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(Error::Validation(format!("invalid upload: {e}"))))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("config.json").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| api_error(Error::Validation(format!("invalid upload: {e}"))))?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Err(api_error(Error::Validation(
            "missing 'file' field in upload".to_string(),
        )));
    };

    found(
        &id,
        state
            .service
            .import_config(&operator, &id, &file_name, bytes)
            .await,
    )
    .map(Json)
}

async fn download_log(
    State(state): State<Arc<ApiState>>,
    Extension(operator): Extension<Operator>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let payload = found(&id, state.service.download_log(&operator, &id, &name).await)?;
    Ok(media_response(payload, Some(&name)))
}

/// Build device remote-operation router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/devices/{id}/state", get(get_state))
        .route("/devices/{id}/config", get(get_config))
        .route("/devices/{id}/config/export", get(export_config))
        .route("/devices/{id}/config/import", post(import_config))
        .route("/devices/{id}/sources", get(list_sources).post(create_source))
        .route(
            "/devices/{id}/sources/{name}",
            put(update_source).delete(delete_source),
        )
        .route("/devices/{id}/playback", put(set_playback))
        .route("/devices/{id}/player/{action}", post(player_action))
        .route("/devices/{id}/info-screen", post(toggle_info_screen))
        .route("/devices/{id}/preview", get(preview))
        .route("/devices/{id}/logs/{name}", get(download_log))
        .layer(middleware::from_fn_with_state(state.clone(), require_operator))
        .with_state(state)
}
