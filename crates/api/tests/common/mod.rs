//! Shared helpers for API integration tests.
//!
//! [`build_test_app`] assembles the production router (real engine, real
//! middleware stack) over a stubbed provider client, so tests drive the
//! whole service through `tower::ServiceExt::oneshot`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tower::ServiceExt;

use aiq_api::config::ServerConfig;
use aiq_api::keys::ApiKeyStore;
use aiq_api::router::build_app_router;
use aiq_api::state::AppState;
use aiq_core::{GenerationKind, GenerationRequest, ProviderDescriptor};
use aiq_engine::{
    DispatchConfig, JobQueue, JobStore, ProviderRegistry, ProviderRouter, WorkerPool,
};
use aiq_events::EventBus;
use aiq_providers::{ProviderClient, ProviderError};

/// Auth secret used by every test configuration.
pub const TEST_SECRET: &str = "test-secret";

// ---------------------------------------------------------------------------
// Stub provider client
// ---------------------------------------------------------------------------

/// Provider client with scripted outcomes: named providers always fail, and
/// an optional gate blocks calls until the test releases a permit.
pub struct StubClient {
    failing: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
}

impl StubClient {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            failing: HashSet::new(),
            gate: None,
        })
    }

    pub fn failing(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            gate: None,
        })
    }

    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            failing: HashSet::new(),
            gate: Some(gate),
        })
    }
}

#[async_trait]
impl ProviderClient for StubClient {
    async fn execute(
        &self,
        provider: &ProviderDescriptor,
        request: &GenerationRequest,
    ) -> Result<Value, ProviderError> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| ProviderError::NotConfigured)?;
            permit.forget();
        }
        if self.failing.contains(&provider.name) {
            return Err(ProviderError::HttpStatus {
                status: 500,
                detail: "stub failure".into(),
            });
        }
        Ok(json!({ "text": "ok", "servedBy": provider.name, "model": request.model }))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with fast dispatch timings.
///
/// `sync_timeout` and `wait_default` are short so tests that run into them
/// finish quickly; the reclaim machinery is slowed down so it never fires
/// during a test.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        auth_secret: TEST_SECRET.to_string(),
        providers_path: None,
        webhook_signing_secret: None,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        provider_timeout_secs: 5,
        dispatch: DispatchConfig {
            worker_count: 2,
            heartbeat_interval: Duration::from_millis(200),
            heartbeat_timeout: Duration::from_secs(30),
            reclaim_check_interval: Duration::from_secs(30),
            wait_default: Duration::from_secs(5),
            wait_max: Duration::from_secs(10),
            sync_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(2),
            ..DispatchConfig::default()
        },
    }
}

/// One chat provider serving `gpt-x` and `model-a`.
pub fn chat_provider(name: &str, priority: i32) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.to_string(),
        api_base: None,
        api_key: None,
        models: vec!["gpt-x".to_string(), "model-a".to_string()],
        kinds: vec![GenerationKind::Chat],
        priority,
        concurrency_limit: 4,
        active: true,
    }
}

/// Assemble the full application: real engine and worker pool, stubbed
/// provider client, the production router and middleware stack.
pub async fn build_test_app(
    providers: Vec<ProviderDescriptor>,
    client: Arc<dyn ProviderClient>,
) -> Router {
    let config = test_config();

    let store = Arc::new(JobStore::new(EventBus::default()));
    let queue = Arc::new(JobQueue::new(Arc::clone(&store)));
    let registry = Arc::new(ProviderRegistry::new(providers).unwrap());
    let router = Arc::new(ProviderRouter::new(Arc::clone(&registry)));
    let workers = WorkerPool::start(
        Arc::clone(&store),
        Arc::clone(&queue),
        router,
        client,
        config.dispatch.clone(),
    )
    .await
    .unwrap();

    let state = AppState {
        store,
        queue,
        registry,
        workers,
        api_keys: Arc::new(ApiKeyStore::new()),
        config: Arc::new(config.clone()),
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a request through the router; return the status and decoded body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// GET with a bearer token.
pub fn get(path: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::empty())
        .unwrap()
}

/// GET without any credential.
pub fn get_unauthed(path: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

/// POST a JSON body without any credential.
pub fn post_unauthed(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// POST a JSON body with a bearer token.
pub fn post(path: &str, bearer: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(AUTHORIZATION, format!("Bearer {bearer}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// POST a JSON body carrying the admin secret in `X-Auth-Secret`.
pub fn post_with_secret(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("x-auth-secret", TEST_SECRET)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Create an API key through the real endpoint, returning its plaintext.
pub async fn issue_key(app: &Router, scopes: &[&str]) -> String {
    let (status, body) = send(
        app,
        post_with_secret("/apikeys", &json!({ "name": "test", "scopes": scopes })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "key creation failed: {body}");
    body["data"]["key"].as_str().unwrap().to_string()
}

/// Submit a chat job for `model` and return its id.
pub async fn submit_job(app: &Router, model: &str) -> i64 {
    let (status, body) = send(
        app,
        post(
            "/queue",
            TEST_SECRET,
            &json!({ "request": { "model": model } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "submission failed: {body}");
    body["id"].as_i64().unwrap()
}
