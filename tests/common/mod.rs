//! Shared test utilities: an in-process mock slideshow device

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::{json, Value};
use slideshow_manager::Device;
use tokio::net::TcpListener;

/// Session token the mock hands out on a successful login
pub const SESSION_TOKEN: &str = "tok-123";

/// Device login credentials accepted by the mock
pub const DEVICE_USER: &str = "admin";
pub const DEVICE_PASSWORD: &str = "secret";

/// How the mock answers `POST /login`
#[derive(Clone, Copy, Debug)]
pub enum Login {
    /// Accept the right credentials and set the session cookie
    Accept,
    /// Always answer with this status
    Reject(u16),
    /// Answer 200 without setting a cookie
    NoCookie,
    /// Accept any credentials and scope the session cookie to this path
    ScopedCookie(&'static str),
}

/// One request the mock received
#[derive(Clone, Debug)]
pub struct Hit {
    pub method: String,
    /// Raw, still percent-encoded path
    pub path: String,
    pub content_type: Option<String>,
    pub cookie: Option<String>,
    pub body: Vec<u8>,
}

impl Hit {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }
}

#[derive(Clone)]
struct Canned {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    delay: Option<Duration>,
}

#[derive(Clone)]
struct MockState {
    login: Login,
    hits: Arc<Mutex<Vec<Hit>>>,
    routes: Arc<Mutex<HashMap<(String, String), Canned>>>,
}

/// A mock slideshow device listening on `127.0.0.1`
pub struct MockDevice {
    pub base_url: String,
    state: MockState,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockDevice {
    /// Start a mock device with the given login behaviour
    pub async fn start(login: Login) -> Self {
        let state = MockState {
            login,
            hits: Arc::new(Mutex::new(Vec::new())),
            routes: Arc::new(Mutex::new(HashMap::new())),
        };

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock device");
        let addr = listener.local_addr().expect("mock device address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock device server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Canned JSON answer for `method path`
    pub fn respond_json(&self, method: &str, path: &str, status: u16, body: Value) {
        self.respond(method, path, status, "application/json", body.to_string().into_bytes());
    }

    /// Canned answer with an arbitrary content type
    pub fn respond(
        &self,
        method: &str,
        path: &str,
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
    ) {
        self.insert(
            method,
            path,
            Canned {
                status,
                content_type,
                body,
                delay: None,
            },
        );
    }

    /// Canned JSON answer that is only sent after `delay`
    pub fn respond_slowly(&self, method: &str, path: &str, delay: Duration) {
        self.insert(
            method,
            path,
            Canned {
                status: 200,
                content_type: "application/json",
                body: b"{}".to_vec(),
                delay: Some(delay),
            },
        );
    }

    fn insert(&self, method: &str, path: &str, canned: Canned) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), canned);
    }

    /// Every request received so far
    pub fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self) -> usize {
        self.state.hits.lock().unwrap().len()
    }

    /// Requests other than the login handshake
    pub fn api_hits(&self) -> Vec<Hit> {
        self.hits().into_iter().filter(|h| h.path != "/login").collect()
    }

    pub fn login_count(&self) -> usize {
        self.hits().iter().filter(|h| h.path == "/login").count()
    }

    /// A registry record pointing at this mock
    pub fn device(&self) -> Device {
        Device {
            id: "dev-1".to_string(),
            name: "Pi1".to_string(),
            base_url: self.base_url.clone(),
            username: DEVICE_USER.to_string(),
            password: DEVICE_PASSWORD.to_string(),
            notes: None,
            tags: Vec::new(),
        }
    }
}

async fn handle(State(state): State<MockState>, req: Request) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let (content_type, cookie) = {
        let header_str = |name: header::HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        (header_str(header::CONTENT_TYPE), header_str(header::COOKIE))
    };
    let body = to_bytes(req.into_body(), usize::MAX)
        .await
        .map(|b| b.to_vec())
        .unwrap_or_default();

    let hit = Hit {
        method: method.clone(),
        path: path.clone(),
        content_type,
        cookie: cookie.clone(),
        body,
    };
    state.hits.lock().unwrap().push(hit.clone());

    if method == "POST" && path == "/login" {
        return login(state.login, &hit);
    }

    let authorised = cookie
        .as_deref()
        .is_some_and(|c| c.contains(&format!("session={SESSION_TOKEN}")));
    if !authorised {
        return json_response(401, &json!({ "message": "authentication required" }));
    }

    let canned = state.routes.lock().unwrap().get(&(method, path)).cloned();
    let Some(canned) = canned else {
        return json_response(404, &json!({ "message": "no such endpoint" }));
    };

    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }

    Response::builder()
        .status(canned.status)
        .header(header::CONTENT_TYPE, canned.content_type)
        .body(Body::from(canned.body))
        .unwrap()
}

fn login(behaviour: Login, hit: &Hit) -> Response {
    match behaviour {
        Login::Reject(status) => {
            json_response(status, &json!({ "message": "invalid credentials" }))
        }
        Login::NoCookie => json_response(200, &json!({ "status": "ok" })),
        Login::ScopedCookie(path) => session_response(&format!("Path={path}")),
        Login::Accept => {
            let form = hit.body_text();
            let expected_user = format!("username={DEVICE_USER}");
            let expected_pass = format!("password={DEVICE_PASSWORD}");
            if !(form.contains(&expected_user) && form.contains(&expected_pass)) {
                return json_response(401, &json!({ "message": "invalid credentials" }));
            }
            session_response("Path=/; HttpOnly")
        }
    }
}

fn session_response(attributes: &str) -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, format!("session={SESSION_TOKEN}; {attributes}"))],
        axum::Json(json!({ "status": "ok" })),
    )
        .into_response()
}

fn json_response(status: u16, body: &Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(body.clone())).into_response()
}

/// One branch-listing request the GitHub mock received
#[derive(Clone, Debug)]
pub struct GithubHit {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
struct GithubState {
    status: u16,
    branches: Vec<String>,
    hits: Arc<Mutex<Vec<GithubHit>>>,
}

/// A mock GitHub REST API serving one repository's branch list
pub struct MockGithub {
    pub api_url: String,
    state: GithubState,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for MockGithub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockGithub {
    /// Serve `branches` with a 200
    pub async fn start(branches: &[&str]) -> Self {
        Self::start_with_status(200, branches).await
    }

    /// Serve `branches` with the given status
    pub async fn start_with_status(status: u16, branches: &[&str]) -> Self {
        let state = GithubState {
            status,
            branches: branches.iter().map(ToString::to_string).collect(),
            hits: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new().fallback(github).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock github");
        let addr = listener.local_addr().expect("mock github address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock github server");
        });

        Self {
            api_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub fn hits(&self) -> Vec<GithubHit> {
        self.state.hits.lock().unwrap().clone()
    }
}

async fn github(State(state): State<GithubState>, req: Request) -> Response {
    let header_str = |name: header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    let hit = GithubHit {
        path: req.uri().path().to_string(),
        query: req.uri().query().map(ToString::to_string),
        authorization: header_str(header::AUTHORIZATION),
        accept: header_str(header::ACCEPT),
        user_agent: header_str(header::USER_AGENT),
    };
    state.hits.lock().unwrap().push(hit);

    if state.status != 200 {
        return json_response(state.status, &json!({ "message": "Not Found" }));
    }

    let body: Vec<Value> = state
        .branches
        .iter()
        .map(|name| json!({ "name": name, "protected": false }))
        .collect();
    json_response(200, &Value::Array(body))
}

/// Executable shell script in `dir` that runs `body`
#[cfg(unix)]
pub fn write_script(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("update.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
