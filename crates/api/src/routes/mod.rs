//! Route definitions for the dispatch API.
//!
//! Each submodule mounts the routes for one slice of the surface; the
//! handlers live in [`crate::handlers`].

use axum::Router;

use crate::state::AppState;

pub mod apikeys;
pub mod health;
pub mod jobs;
pub mod providers;
pub mod queue;
pub mod workers;

/// Assemble the authenticated API surface. Mounted at the root; the
/// unauthenticated health check is merged separately.
///
/// ```text
/// /queue             submit job (POST, key)
/// /generate          synchronous generation (POST, key)
///
/// /status            job snapshot (GET ?jobId|refId, key)
/// /wait              blocking snapshot (GET ?jobId|refId&timeout, key)
/// /jobs              full job record (GET ?jobId|refId, key)
/// /jobs/cancel       cancel queued job (POST, admin)
///
/// /providers         active providers (GET, key)
/// /providers/toggle  activate/deactivate (POST, admin)
///
/// /workers/stats     worker + queue stats (GET, admin)
/// /workers/cancel    drain a worker (POST, admin)
///
/// /apikeys           create API key (POST, auth secret only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(queue::router())
        .merge(jobs::router())
        .merge(providers::router())
        .merge(workers::router())
        .merge(apikeys::router())
}
