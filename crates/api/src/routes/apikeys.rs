//! Route definition for API key management.
//!
//! Gated on the auth secret itself, not on any key scope.

use axum::routing::post;
use axum::Router;

use crate::handlers::apikeys;
use crate::state::AppState;

/// API key routes.
///
/// ```text
/// POST /apikeys -> create_api_key
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/apikeys", post(apikeys::create_api_key))
}
