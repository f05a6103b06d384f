//! Route definitions for the provider registry.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::providers;
use crate::state::AppState;

/// Provider routes.
///
/// ```text
/// GET  /providers         -> list_providers  (active only)
/// POST /providers/toggle  -> toggle_provider (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/providers", get(providers::list_providers))
        .route("/providers/toggle", post(providers::toggle_provider))
}
