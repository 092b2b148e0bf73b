//! Shared helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use app::config::DeploymentConfig;
use app::state::AppState;
use bridge_core::time::fixed_clock;
use services::{BridgeServices, TracingGradeSink};

pub const CONTENT: &str = "https://content.example.org";

const DEPLOYMENT: &str = r#"
    [origins]
    "https://content.example.org" = true
    "https://retired.example.org" = false

    [[courses]]
    id = 1

    [[courses.modules]]
    id = 10

    [[courses.modules.activities]]
    id = 100

    [[courses.modules.activities]]
    id = 101
    success_threshold = 0.9

    [[courses.modules]]
    id = 20

    [[courses.modules.activities]]
    id = 200
    allowed_origins = ["https://retired.example.org"]
"#;

/// Build the full router over in-memory storage seeded from a sample
/// deployment file.
pub async fn build_test_app() -> Router {
    let deployment = DeploymentConfig::from_toml_str(DEPLOYMENT).unwrap();
    let services = BridgeServices::in_memory(
        fixed_clock(),
        deployment.origin_policy().unwrap(),
        Arc::new(TracingGradeSink),
    );
    services
        .install_courses(&deployment.course_outlines().unwrap())
        .await
        .unwrap();
    app::build_router(AppState::new(services))
}

/// Send a request and return the status plus the raw body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

/// Send a POST request with a JSON body.
pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, Option<serde_json::Value>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, parse(&bytes))
}

/// Send a POST request whose JSON body is given verbatim.
pub async fn post_text(app: &Router, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap();
    send(app, request).await
}

/// Send a GET request.
pub async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Option<serde_json::Value>) {
    let (status, bytes) = get(app, uri).await;
    (status, parse(&bytes))
}

fn parse(bytes: &[u8]) -> Option<serde_json::Value> {
    if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(bytes).unwrap())
    }
}
