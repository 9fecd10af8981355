//! Device gateway: one authenticated call against one slideshow device
//!
//! Every operation logs in afresh, issues exactly one request with that
//! session, and maps the outcome into the crate error taxonomy. Nothing is
//! cached between calls, so gateways for the same or different devices can
//! run concurrently without coordination.

pub mod endpoint;
pub mod session;
pub mod types;

use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde_json::Value;

pub use endpoint::Endpoint;
pub use types::{ImageFit, MediaPayload, PlaybackSettings, PlayerAction, SourceSpec, TransitionType};

use self::endpoint::{segment, segments};
use self::session::{RemoteSession, RequestBody};
use crate::registry::Device;
use crate::{Error, Result};

/// Timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Client scoped to one device record
#[derive(Clone)]
pub struct DeviceGateway {
    device_id: String,
    endpoint: Endpoint,
    username: String,
    password: String,
    timeout: Duration,
}

impl std::fmt::Debug for DeviceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGateway")
            .field("device_id", &self.device_id)
            .field("endpoint", &self.endpoint.root().as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DeviceGateway {
    /// Build a gateway for `device`, using [`DEFAULT_TIMEOUT`] when `timeout` is `None`
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the device's base URL is unusable
    pub fn new(device: &Device, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            device_id: device.id.clone(),
            endpoint: Endpoint::parse(&device.base_url)?,
            username: device.username.clone(),
            password: device.password.clone(),
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// Registry id of the device this gateway talks to
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Resolved API root of the device
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current player state (`GET /api/state`)
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn get_state(&self) -> Result<Value> {
        let response = self.call(Method::GET, "/api/state", RequestBody::Empty).await?;
        read_json(response).await
    }

    /// Device configuration (`GET /api/config`)
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn get_config(&self) -> Result<Value> {
        let response = self.call(Method::GET, "/api/config", RequestBody::Empty).await?;
        read_json(response).await
    }

    /// Configured media sources (`GET /api/sources`)
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn list_sources(&self) -> Result<Value> {
        let response = self.call(Method::GET, "/api/sources", RequestBody::Empty).await?;
        read_json(response).await
    }

    /// Create a media source
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the source has no name, otherwise
    /// `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn create_source(&self, spec: &SourceSpec) -> Result<Value> {
        if spec.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            return Err(Error::Validation("source name must not be empty".to_string()));
        }

        let body = RequestBody::Json(to_json(spec)?);
        let response = self.call(Method::POST, "/api/sources", body).await?;
        read_json(response).await
    }

    /// Update the source currently called `name`
    ///
    /// When `spec` carries no name the existing one is sent, so the device
    /// never sees a rename it was not asked for.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty name, otherwise
    /// `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn update_source(&self, name: &str, spec: &SourceSpec) -> Result<Value> {
        let path = format!("/api/sources/{}", segment("source name", name)?);

        let mut spec = spec.clone();
        if spec.name.is_none() {
            spec.name = Some(name.to_string());
        }

        let response = self
            .call(Method::PUT, &path, RequestBody::Json(to_json(&spec)?))
            .await?;
        read_json(response).await
    }

    /// Delete the source called `name`
    ///
    /// An empty success body is reported as `{"status":"ok"}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty name, otherwise
    /// `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn delete_source(&self, name: &str) -> Result<Value> {
        let path = format!("/api/sources/{}", segment("source name", name)?);
        let response = self.call(Method::DELETE, &path, RequestBody::Empty).await?;

        let status = response.status();
        let bytes = read_bytes(response).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::json!({ "status": "ok" }));
        }
        decode_json(status, &bytes)
    }

    /// Apply a partial playback update; omitted fields are not sent
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for out-of-range values, otherwise
    /// `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn set_playback(&self, settings: &PlaybackSettings) -> Result<Value> {
        settings.validate()?;

        let body = RequestBody::Json(to_json(settings)?);
        let response = self.call(Method::PUT, "/api/playback", body).await?;
        read_json(response).await
    }

    /// Trigger a player action by name (`start`, `stop` or `reload`)
    ///
    /// The name is checked before anything is sent to the device.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for any other action name, otherwise
    /// `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn trigger_player_action(&self, action: &str) -> Result<Value> {
        let action: PlayerAction = action.parse()?;
        self.player_action(action).await
    }

    /// Trigger a player action
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn player_action(&self, action: PlayerAction) -> Result<Value> {
        let path = format!("/api/player/{}", action.as_str());
        let response = self.call(Method::POST, &path, RequestBody::Empty).await?;
        read_json(response).await
    }

    /// Show or hide the informational overlay
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn toggle_info_screen(&self, enabled: bool) -> Result<Value> {
        let body = RequestBody::Json(serde_json::json!({ "enabled": enabled }));
        let response = self
            .call(Method::POST, "/api/player/info-screen", body)
            .await?;
        read_json(response).await
    }

    /// Fetch a preview image for a file inside a media source
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for empty or dot-segment names, otherwise
    /// `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn fetch_preview(&self, source: &str, media_path: &str) -> Result<MediaPayload> {
        let path = format!(
            "/media/preview/{}/{}",
            segment("source name", source)?,
            segments("media path", media_path)?
        );
        let response = self.call(Method::GET, &path, RequestBody::Empty).await?;
        read_media(response).await
    }

    /// Download the device's configuration bundle (`GET /config/export`)
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn export_config(&self) -> Result<MediaPayload> {
        let response = self
            .call(Method::GET, "/config/export", RequestBody::Empty)
            .await?;
        read_media(response).await
    }

    /// Upload a configuration bundle as multipart form field `file`
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty upload, otherwise
    /// `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn import_config(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value> {
        if bytes.is_empty() {
            return Err(Error::Validation("configuration upload is empty".to_string()));
        }

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .call(Method::POST, "/config/import", RequestBody::Multipart(form))
            .await?;

        let status = response.status();
        let bytes = read_bytes(response).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::json!({}));
        }
        decode_json(status, &bytes)
    }

    /// Download a named log file (`GET /logs/<name>/download`)
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty name, otherwise
    /// `Error::RemoteAuth` or `Error::RemoteApi` if the device call fails
    pub async fn download_log(&self, name: &str) -> Result<MediaPayload> {
        let path = format!("/logs/{}/download", segment("log name", name)?);
        let response = self.call(Method::GET, &path, RequestBody::Empty).await?;
        read_media(response).await
    }

    /// Log in, then issue one request with the fresh session
    async fn call(&self, method: Method, path: &str, body: RequestBody) -> Result<Response> {
        // Resolve first so a bad path never costs a login
        let url = self.endpoint.resolve(path)?;

        let session =
            RemoteSession::establish(&self.endpoint, &self.username, &self.password, self.timeout)
                .await?;

        let started = std::time::Instant::now();
        let result = session.send(method, url, body).await;
        tracing::debug!(
            device_id = %self.device_id,
            path,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            ok = result.is_ok(),
            "device call finished"
        );
        result
    }
}

fn to_json<T: serde::Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload).map_err(|e| Error::Validation(format!("invalid payload: {e}")))
}

async fn read_bytes(response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| {
            Error::remote_api(
                Some(status.as_u16()),
                format!("failed to read device response: {e}"),
            )
        })
}

async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let bytes = read_bytes(response).await?;
    decode_json(status, &bytes)
}

fn decode_json(status: StatusCode, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| {
        Error::remote_api(
            Some(status.as_u16()),
            format!("device returned invalid JSON: {e}"),
        )
    })
}

async fn read_media(response: Response) -> Result<MediaPayload> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let bytes = read_bytes(response).await?;
    Ok(MediaPayload {
        content_type,
        bytes,
    })
}
