//! Handler for API key creation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::keys::CreateApiKey;
use crate::middleware::auth::SecretAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /apikeys
///
/// Mint a new API key. Gated on the auth secret itself; the response is the
/// only place the plaintext key ever appears.
pub async fn create_api_key(
    _auth: SecretAuth,
    State(state): State<AppState>,
    Json(input): Json<CreateApiKey>,
) -> AppResult<impl IntoResponse> {
    let issued = state.api_keys.create(input).await?;

    tracing::info!(
        key_id = %issued.id,
        name = %issued.name,
        scopes = ?issued.scopes,
        "API key created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: issued })))
}
