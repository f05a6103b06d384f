//! Route definitions for job inspection and cancellation.
//!
//! Reads require the `jobs:read` scope; cancellation is admin-only.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Job inspection routes.
///
/// ```text
/// GET  /status       -> status     (?jobId= | ?refId=)
/// GET  /wait         -> wait       (?jobId= | ?refId=, &timeout=)
/// GET  /jobs         -> get_job    (full record)
/// POST /jobs/cancel  -> cancel_job (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(jobs::status))
        .route("/wait", get(jobs::wait))
        .route("/jobs", get(jobs::get_job))
        .route("/jobs/cancel", post(jobs::cancel_job))
}
