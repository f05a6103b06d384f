//! Route definitions for worker pool control.
//!
//! All endpoints are admin-only.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workers;
use crate::state::AppState;

/// Worker routes.
///
/// ```text
/// GET  /workers/stats   -> worker_stats
/// POST /workers/cancel  -> cancel_worker (drain)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workers/stats", get(workers::worker_stats))
        .route("/workers/cancel", post(workers::cancel_worker))
}
