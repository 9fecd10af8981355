//! API endpoint integration tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{json, Value};
use slideshow_manager::api::{ApiServer, ApiState};
use slideshow_manager::config::ApiServerConfig;
use slideshow_manager::security::StaticAuthenticator;
use slideshow_manager::updates::{UpdateConfig, Updater};
use slideshow_manager::{
    DeviceRegistry, DeviceService, HostPolicy, NewDevice, Operator, OperatorAuth,
};
use tempfile::TempDir;
use tower::ServiceExt;

mod common;
use common::{Login, MockDevice, MockGithub, DEVICE_PASSWORD, DEVICE_USER};

const OPERATOR: &str = "admin";
const OPERATOR_PASSWORD: &str = "correct horse";

struct TestApp {
    router: Router,
    service: DeviceService,
    _dir: TempDir,
}

/// Build a test API router over a fresh registry
fn build_test_app() -> TestApp {
    build_test_app_with_updates(UpdateConfig::default())
}

fn build_test_app_with_updates(updates: UpdateConfig) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let registry = DeviceRegistry::open(dir.path().join("devices.json")).unwrap();
    let service = DeviceService::new(
        Arc::new(registry),
        HostPolicy::allow_all(),
        Duration::from_secs(2),
    );

    let users = HashMap::from([(OPERATOR.to_string(), OPERATOR_PASSWORD.to_string())]);
    let state = ApiState {
        service: service.clone(),
        auth: OperatorAuth::Static(StaticAuthenticator::new(users)),
        updates: Updater::new(updates).unwrap(),
    };

    TestApp {
        router: ApiServer::new(state, ApiServerConfig::default()).router(),
        service,
        _dir: dir,
    }
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic(OPERATOR, OPERATOR_PASSWORD));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn register_mock(app: &TestApp, mock: &MockDevice) -> String {
    app.service
        .add_device(
            &Operator::new("setup"),
            NewDevice {
                name: "Pi1".to_string(),
                base_url: mock.base_url.clone(),
                username: DEVICE_USER.to_string(),
                password: DEVICE_PASSWORD.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
}

#[tokio::test]
async fn test_health_endpoint_needs_no_auth() {
    let app = build_test_app();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_api_requires_operator_credentials() {
    let app = build_test_app();

    let req = Request::builder().uri("/api/devices").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let req = Request::builder()
        .uri("/api/devices")
        .header(header::AUTHORIZATION, basic(OPERATOR, "wrong"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_device_crud() {
    let app = build_test_app();

    let (status, created) = send(
        &app,
        request(
            "POST",
            "/api/devices",
            Some(json!({
                "name": " Lobby ",
                "base_url": "http://pi1.local",
                "username": "admin",
                "password": "pw",
                "tags": ["lobby", " ", "floor-1"]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Lobby");
    assert_eq!(created["has_password"], true);
    assert_eq!(created["tags"], json!(["lobby", "floor-1"]));
    assert!(created.get("password").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    let (status, list) = send(&app, request("GET", "/api/devices", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, updated) = send(
        &app,
        request(
            "PATCH",
            &format!("/api/devices/{id}"),
            Some(json!({ "id": "hijack", "name": "Foyer", "password": "" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["name"], "Foyer");

    let stored = app.service.registry().get(&id).unwrap().unwrap();
    assert_eq!(stored.password, "pw");

    let (status, fetched) = send(&app, request("GET", &format!("/api/devices/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["base_url"], "http://pi1.local");

    let (status, _) = send(&app, request("DELETE", &format!("/api/devices/{id}"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, request("GET", &format!("/api/devices/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = send(&app, request("DELETE", &format!("/api/devices/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_device_fields_are_bad_request() {
    let app = build_test_app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/devices",
            Some(json!({ "name": "  ", "base_url": "http://pi1.local", "username": "admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/devices",
            Some(json!({ "name": "Pi", "base_url": "pi1.local", "username": "admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request("PATCH", "/api/devices/missing", Some(json!({ "name": "x" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_device_state_through_api() {
    let app = build_test_app();
    let mock = MockDevice::start(Login::Accept).await;
    mock.respond_json("GET", "/api/state", 200, json!({ "status": "playing" }));
    let id = register_mock(&app, &mock);

    let (status, body) =
        send(&app, request("GET", &format!("/api/devices/{id}/state"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "playing" }));
    assert_eq!(mock.hit_count(), 2);

    let (status, _) = send(&app, request("GET", "/api/devices/missing/state", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_device_login_failure_is_bad_gateway() {
    let app = build_test_app();
    let mock = MockDevice::start(Login::Reject(401)).await;
    let id = register_mock(&app, &mock);

    let (status, body) =
        send(&app, request("GET", &format!("/api/devices/{id}/state"), None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "device_auth_error");
    assert_eq!(body["error"]["device_status"], 401);
}

#[tokio::test]
async fn test_unknown_player_action_is_bad_request() {
    let app = build_test_app();
    let mock = MockDevice::start(Login::Accept).await;
    let id = register_mock(&app, &mock);

    let (status, _) = send(
        &app,
        request("POST", &format!("/api/devices/{id}/player/reboot"), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(mock.hit_count(), 0);
    assert!(
        app.service
            .audit()
            .recent(10)
            .iter()
            .all(|e| !e.action.starts_with("player."))
    );
}

#[tokio::test]
async fn test_playback_free_text_is_coerced() {
    let app = build_test_app();
    let mock = MockDevice::start(Login::Accept).await;
    mock.respond_json("PUT", "/api/playback", 200, json!({ "status": "ok" }));
    let id = register_mock(&app, &mock);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/api/devices/{id}/playback"),
            Some(json!({
                "image_duration": "ten",
                "image_rotation": "90",
                "transition_duration": ""
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mock.api_hits()[0].body_json(), json!({ "image_rotation": 90 }));

    let audit = app.service.audit().recent(1);
    assert_eq!(audit[0].action, "playback.update");
    assert_eq!(audit[0].operator, OPERATOR);
    assert!(audit[0].payload_hash.is_some());
}

#[tokio::test]
async fn test_overview_reports_per_device_errors() {
    let app = build_test_app();
    let healthy = MockDevice::start(Login::Accept).await;
    healthy.respond_json("GET", "/api/state", 200, json!({ "status": "playing" }));
    let broken = MockDevice::start(Login::Reject(500)).await;
    register_mock(&app, &healthy);
    register_mock(&app, &broken);

    let (status, body) = send(&app, request("GET", "/api/overview", None)).await;
    assert_eq!(status, StatusCode::OK);

    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["state"], json!({ "status": "playing" }));
    assert!(entries[0].get("error").is_none());
    assert!(entries[1].get("state").is_none());
    assert!(entries[1]["error"].is_string());
}

#[tokio::test]
async fn test_audit_lists_recent_actions() {
    let app = build_test_app();
    let mock = MockDevice::start(Login::Accept).await;
    mock.respond_json("POST", "/api/player/stop", 200, json!({ "status": "stopped" }));
    let id = register_mock(&app, &mock);

    let (status, _) =
        send(&app, request("POST", &format!("/api/devices/{id}/player/stop"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request("GET", "/api/audit?limit=1", None)).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "player.stop");
    assert_eq!(entries[0]["device_id"], id.as_str());
    assert_eq!(entries[0]["operator"], OPERATOR);
}

#[tokio::test]
async fn test_preview_streams_device_bytes() {
    let app = build_test_app();
    let mock = MockDevice::start(Login::Accept).await;
    mock.respond("GET", "/media/preview/nas/a.png", 200, "image/png", vec![0x89, b'P', b'N', b'G']);
    let id = register_mock(&app, &mock);

    let response = app
        .router
        .clone()
        .oneshot(request("GET", &format!("/api/devices/{id}/preview?source=nas&path=a.png"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_update_branches_listed_newest_last() {
    let github = MockGithub::start(&["main", "version-1.10.0", "version-1.2.0"]).await;
    let app = build_test_app_with_updates(UpdateConfig {
        repo: Some("acme/slides".to_string()),
        api_url: github.api_url.clone(),
        ..UpdateConfig::default()
    });

    let (status, body) = send(&app, request("GET", "/api/updates/branches", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["branches"], json!(["version-1.2.0", "version-1.10.0"]));
    assert_eq!(body["latest"], "version-1.10.0");
}

#[tokio::test]
async fn test_update_branches_without_repo_is_server_error() {
    let app = build_test_app();

    let (status, body) = send(&app, request("GET", "/api/updates/branches", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]["message"].as_str().unwrap().contains("SLIDESHOW_MANAGER_REPO"));
}

#[tokio::test]
async fn test_update_run_rejects_malformed_branch() {
    let app = build_test_app();

    let (status, body) = send(
        &app,
        request("POST", "/api/updates/run", Some(json!({ "branch": "main && reboot" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    assert!(app.service.audit().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_update_run_reports_script_result_and_audits() {
    let dir = tempfile::tempdir().unwrap();
    let ok_app = build_test_app_with_updates(UpdateConfig {
        script: common::write_script(dir.path(), "echo \"updating to $2\""),
        ..UpdateConfig::default()
    });

    let (status, body) = send(
        &ok_app,
        request("POST", "/api/updates/run", Some(json!({ "branch": "version-1.4.0" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["output"], "updating to version-1.4.0");
    let audit = ok_app.service.audit().recent(1);
    assert_eq!(audit[0].action, "update.run");
    assert_eq!(audit[0].operator, OPERATOR);

    let failing_dir = tempfile::tempdir().unwrap();
    let failing_app = build_test_app_with_updates(UpdateConfig {
        script: common::write_script(failing_dir.path(), "echo 'disk full' >&2\nexit 1"),
        ..UpdateConfig::default()
    });

    let (status, body) = send(
        &failing_app,
        request("POST", "/api/updates/run", Some(json!({ "branch": "version-1.4.0" }))),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["exit_code"], 1);
    assert_eq!(body["output"], "disk full");
    assert_eq!(failing_app.service.audit().recent(1)[0].action, "update.failed");
}
