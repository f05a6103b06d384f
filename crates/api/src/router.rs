//! Shared application router builder.
//!
//! [`build_app_router`] is used by both the production binary and the
//! integration tests, so every test runs against the real middleware stack.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

/// Header carrying the per-request correlation id.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application [`Router`]: the health probe, the API surface, and
/// the middleware stack.
///
/// Layers apply bottom-up. Requests get an id first, the trace span picks it
/// up, and the timeout and panic recovery wrap everything above them.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Unauthenticated liveness probe.
        .merge(routes::health::router())
        // Everything else authenticates per handler.
        .merge(routes::api_routes())
        // Catch handler panics and answer 500 instead of dropping the
        // connection.
        .layer(CatchPanicLayer::new())
        // The timeout exceeds wait_max, so blocking waits finish on their
        // own deadlines.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS layer from configuration. Panics when an origin does not parse;
/// a misconfigured deployment should stop at startup.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect();

    // The surface is GET and POST only. The admin secret travels in its own
    // header, which has to clear preflight.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-auth-secret"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
