//! Operator authentication middleware (HTTP Basic)

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::ApiState;
use crate::security::{Authenticator, Operator};

/// Extract `(username, password)` from a Basic `Authorization` header
fn extract_basic_credentials(req: &Request) -> Option<(String, String)> {
    let encoded = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))?;

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn unauthorized() -> Response {
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"slideshow-manager\""),
    );
    response
}

/// Middleware to authenticate the operator and attach an [`Operator`]
pub async fn require_operator(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some((username, password)) = extract_basic_credentials(&req) else {
        tracing::debug!("no operator credentials provided");
        return unauthorized();
    };

    if !state.auth.authenticate(&username, &password).await {
        return unauthorized();
    }

    req.extensions_mut().insert(Operator::new(username));
    next.run(req).await
}
