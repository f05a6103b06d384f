//! Route definitions for job submission.
//!
//! Both endpoints require the `jobs:submit` scope.

use axum::routing::post;
use axum::Router;

use crate::handlers::queue;
use crate::state::AppState;

/// Submission routes.
///
/// ```text
/// POST /queue     -> submit    (async, acknowledges with the job id)
/// POST /generate  -> generate  (sync, blocks for the result)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/queue", post(queue::submit))
        .route("/generate", post(queue::generate))
}
