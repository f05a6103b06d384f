//! Liveness endpoint tests.

mod common;

use axum::http::StatusCode;

use common::{build_test_app, get_unauthed, send, StubClient};

#[tokio::test]
async fn healthz_responds_without_credentials() {
    let app = build_test_app(vec![], StubClient::ok()).await;

    let (status, body) = send(&app, get_unauthed("/healthz")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "aiq-api");
    assert!(body["version"].as_str().is_some_and(|v| !v.is_empty()));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = build_test_app(vec![], StubClient::ok()).await;

    let (status, _) = send(&app, get_unauthed("/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
