//! Per-operation remote session
//!
//! A session is a fresh HTTP client with its own cookie jar, logged in via
//! the device's `/login` form. `send` consumes it, so it serves exactly one
//! request and is dropped afterwards.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Method, Response, Url};

use super::endpoint::Endpoint;
use crate::{Error, Result};

/// Cookie the device sets on a successful login
pub const SESSION_COOKIE: &str = "session";

/// Body of the single request made with a session
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(reqwest::multipart::Form),
}

/// An authenticated context for one device request
pub struct RemoteSession {
    client: Client,
    timeout: Duration,
}

impl RemoteSession {
    /// Log in to the device and capture its session cookie
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteAuth` on transport failure, a non-success
    /// status, or a response without a session cookie
    pub async fn establish(
        endpoint: &Endpoint,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let login_url = endpoint.resolve("/login")?;

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .user_agent(concat!("slideshow-manager/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::remote_auth(None, format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(url = %login_url, "logging in to device");

        let response = client
            .post(login_url.clone())
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| Error::remote_auth(None, transport_message("login", &e, timeout)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %login_url, status = status.as_u16(), "device login rejected");
            return Err(Error::remote_auth(
                Some(status.as_u16()),
                format!("login failed (HTTP {})", status.as_u16()),
            ));
        }

        let issued = response
            .cookies()
            .any(|c| c.name() == SESSION_COOKIE && !c.value().is_empty());

        // Cookies set on a redirect hop only show up in the jar
        if !issued && !jar_has_session_cookie(jar.as_ref(), &login_url) {
            tracing::warn!(url = %login_url, "device login returned no session cookie");
            return Err(Error::remote_auth(
                Some(status.as_u16()),
                "login failed: no session token received",
            ));
        }

        Ok(Self { client, timeout })
    }

    /// Issue the one request this session exists for
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteApi` on transport failure or a status >= 400,
    /// carrying the device's `message` field or raw body text
    pub async fn send(self, method: Method, url: Url, body: RequestBody) -> Result<Response> {
        tracing::debug!(%method, %url, "device request");

        let request = self.client.request(method, url.clone());
        let request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::remote_api(None, transport_message("request", &e, self.timeout)))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(%url, error = %e, "failed to read device error body");
                    String::new()
                }
            };
            let message = error_message(&text)
                .or_else(|| status.canonical_reason().map(ToString::to_string))
                .unwrap_or_default();

            tracing::warn!(%url, status = status.as_u16(), %message, "device API error");
            return Err(Error::remote_api(
                Some(status.as_u16()),
                format!("device API error ({}): {message}", status.as_u16()),
            ));
        }

        Ok(response)
    }
}

fn jar_has_session_cookie(jar: &Jar, url: &Url) -> bool {
    let Some(header) = jar.cookies(url) else {
        return false;
    };
    let Ok(cookies) = header.to_str() else {
        return false;
    };

    cookies.split(';').any(|pair| {
        pair.split_once('=').is_some_and(|(name, value)| {
            name.trim() == SESSION_COOKIE && !value.trim().is_empty()
        })
    })
}

/// Best-effort message from an error body: JSON `message`, else the raw text
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("message") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        _ => Some(trimmed.to_string()),
    }
}

fn transport_message(stage: &str, err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("{stage} timed out after {}s", timeout.as_secs_f32())
    } else if err.is_connect() {
        format!("{stage} failed: could not connect to device ({err})")
    } else {
        format!("{stage} failed: {err}")
    }
}
