//! Handlers for the provider registry.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use aiq_core::api_keys::scopes;

use crate::error::AppResult;
use crate::middleware::auth::{AdminAuth, ApiKeyAuth};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /providers
///
/// Active providers with their runtime health and in-flight counts.
/// Credentials and endpoints never appear here.
pub async fn list_providers(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    auth.require(scopes::JOBS_READ)?;

    let providers = state.registry.active_snapshots().await;
    Ok(Json(DataResponse { data: providers }))
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ToggleProvider {
    pub provider: String,
    pub active: bool,
}

/// POST /providers/toggle
///
/// Activate or deactivate a provider. Deactivation stops new selections
/// immediately; attempts already in flight on the provider finish normally.
pub async fn toggle_provider(
    AdminAuth(_auth): AdminAuth,
    State(state): State<AppState>,
    Json(body): Json<ToggleProvider>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.registry.set_active(&body.provider, body.active).await?;

    tracing::info!(provider = %body.provider, active = body.active, "Provider toggled");

    Ok(Json(DataResponse { data: snapshot }))
}
