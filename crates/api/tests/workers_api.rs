//! Worker stats and drain endpoint tests.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use serde_json::{json, Value};

use common::{
    build_test_app, chat_provider, get, get_unauthed, issue_key, post, post_with_secret, send,
    submit_job, StubClient, TEST_SECRET,
};

/// Poll the stats endpoint until `done` accepts the body or two seconds pass.
async fn poll_stats(app: &Router, done: impl Fn(&Value) -> bool) -> Value {
    let mut body = Value::Null;
    for _ in 0..80 {
        let (status, current) = send(app, get("/workers/stats", TEST_SECRET)).await;
        assert_eq!(status, StatusCode::OK);
        body = current;
        if done(&body) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("stats never reached the expected shape: {body}");
}

#[tokio::test]
async fn stats_require_admin() {
    let app = build_test_app(vec![chat_provider("p1", 0)], StubClient::ok()).await;
    let key = issue_key(&app, &["jobs:submit", "jobs:read"]).await;

    let (status, body) = send(&app, get("/workers/stats", &key)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin scope required");

    let (status, _) = send(&app, get_unauthed("/workers/stats")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stats_report_workers_and_queue_counts() {
    let app = build_test_app(vec![chat_provider("p1", 0)], StubClient::ok()).await;
    let id = submit_job(&app, "gpt-x").await;
    send(&app, get(&format!("/wait?jobId={id}&timeout=5"), TEST_SECRET)).await;

    // The resolution counters land just after the terminal transition that
    // wakes the wait, so poll instead of asserting the first read.
    let body = poll_stats(&app, |body| {
        body["data"]["workers"]
            .as_array()
            .is_some_and(|workers| workers.iter().map(|w| w["completed"].as_u64().unwrap_or(0)).sum::<u64>() == 1)
    })
    .await;

    let workers = body["data"]["workers"].as_array().unwrap();
    assert_eq!(workers.len(), 2);
    assert_eq!(workers[0]["name"], "worker-1");
    assert_eq!(workers[1]["name"], "worker-2");
    for worker in workers {
        assert!(worker["kinds"].as_array().unwrap().contains(&json!("chat")));
        assert!(worker["lastHeartbeat"].as_str().is_some());
    }

    let counts = &body["data"]["queueCounts"];
    assert_eq!(counts["total"], 1);
    assert_eq!(counts["states"]["Completed"], 1);
}

#[tokio::test]
async fn cancel_unknown_worker_is_not_found() {
    let app = build_test_app(vec![chat_provider("p1", 0)], StubClient::ok()).await;

    let (status, body) = send(
        &app,
        post_with_secret("/workers/cancel", &json!({ "worker": "ghost" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "WORKER_NOT_FOUND");
}

#[tokio::test]
async fn cancelled_worker_drains_and_deregisters() {
    let app = build_test_app(vec![chat_provider("p1", 0)], StubClient::ok()).await;

    let (status, body) = send(
        &app,
        post_with_secret("/workers/cancel", &json!({ "worker": "worker-1" })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["name"], "worker-1");
    assert_eq!(body["data"]["status"], "Draining");

    let body = poll_stats(&app, |body| {
        body["data"]["workers"]
            .as_array()
            .is_some_and(|workers| workers.len() == 1)
    })
    .await;
    assert_eq!(body["data"]["workers"][0]["name"], "worker-2");
}

#[tokio::test]
async fn cancel_requires_admin_credentials() {
    let app = build_test_app(vec![chat_provider("p1", 0)], StubClient::ok()).await;
    let key = issue_key(&app, &["jobs:submit", "jobs:read"]).await;

    let (status, _) = send(
        &app,
        post("/workers/cancel", &key, &json!({ "worker": "worker-1" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
