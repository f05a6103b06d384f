//! Credential extractors for Axum handlers.
//!
//! Two credentials exist: API keys (issued at runtime, scoped) and the
//! deployment auth secret (configuration, satisfies every scope). The secret
//! is accepted either in the `X-Auth-Secret` header or as a bearer token.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use aiq_core::api_keys::scopes;
use aiq_core::DispatchError;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the deployment auth secret.
const AUTH_SECRET_HEADER: &str = "x-auth-secret";

// ---------------------------------------------------------------------------
// ApiKeyAuth
// ---------------------------------------------------------------------------

/// Authenticated caller: a valid API key or the auth secret.
///
/// Use this as an extractor parameter in any handler that requires
/// authentication, then gate individual operations with [`Self::require`]:
///
/// ```ignore
/// async fn my_handler(auth: ApiKeyAuth) -> AppResult<Json<()>> {
///     auth.require(scopes::JOBS_READ)?;
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    /// Scopes granted to the key; empty when the auth secret was used.
    pub scopes: Vec<String>,
    /// Whether the caller presented the auth secret rather than a key.
    pub via_secret: bool,
}

impl ApiKeyAuth {
    /// Reject callers whose credential lacks `scope`. The auth secret and
    /// the `admin` scope satisfy every check.
    pub fn require(&self, scope: &str) -> Result<(), AppError> {
        if self.via_secret || self.scopes.iter().any(|s| s == scopes::ADMIN || s == scope) {
            Ok(())
        } else {
            Err(DispatchError::Forbidden(format!("Missing required scope: {scope}")).into())
        }
    }

    fn is_admin(&self) -> bool {
        self.via_secret || self.scopes.iter().any(|s| s == scopes::ADMIN)
    }
}

impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(secret) = parts
            .headers
            .get(AUTH_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if secret == state.config.auth_secret {
                return Ok(ApiKeyAuth {
                    scopes: Vec::new(),
                    via_secret: true,
                });
            }
            return Err(DispatchError::Unauthorized("Invalid auth secret".into()).into());
        }

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::from(DispatchError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::from(DispatchError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <key>".into(),
            ))
        })?;

        if token == state.config.auth_secret {
            return Ok(ApiKeyAuth {
                scopes: Vec::new(),
                via_secret: true,
            });
        }

        let record = state.api_keys.authenticate(token).await.ok_or_else(|| {
            AppError::from(DispatchError::Unauthorized(
                "Invalid or expired API key".into(),
            ))
        })?;

        Ok(ApiKeyAuth {
            scopes: record.scopes,
            via_secret: false,
        })
    }
}

// ---------------------------------------------------------------------------
// AdminAuth
// ---------------------------------------------------------------------------

/// Requires the auth secret or a key carrying the `admin` scope. Rejects
/// with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(AdminAuth(auth): AdminAuth) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct AdminAuth(pub ApiKeyAuth);

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = ApiKeyAuth::from_request_parts(parts, state).await?;
        if !auth.is_admin() {
            return Err(DispatchError::Forbidden("Admin scope required".into()).into());
        }
        Ok(AdminAuth(auth))
    }
}

// ---------------------------------------------------------------------------
// SecretAuth
// ---------------------------------------------------------------------------

/// Requires the deployment auth secret itself; API keys are rejected even
/// with the `admin` scope. Key creation is the one operation keys cannot
/// perform.
pub struct SecretAuth;

impl FromRequestParts<AppState> for SecretAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = ApiKeyAuth::from_request_parts(parts, state).await?;
        if !auth.via_secret {
            return Err(DispatchError::Forbidden(
                "The auth secret is required to manage API keys".into(),
            )
            .into());
        }
        Ok(SecretAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_auth(granted: &[&str]) -> ApiKeyAuth {
        ApiKeyAuth {
            scopes: granted.iter().map(|s| s.to_string()).collect(),
            via_secret: false,
        }
    }

    #[test]
    fn secret_satisfies_any_scope() {
        let auth = ApiKeyAuth {
            scopes: Vec::new(),
            via_secret: true,
        };
        assert!(auth.require(scopes::JOBS_SUBMIT).is_ok());
        assert!(auth.require(scopes::ADMIN).is_ok());
        assert!(auth.is_admin());
    }

    #[test]
    fn admin_scope_satisfies_any_scope() {
        let auth = key_auth(&[scopes::ADMIN]);
        assert!(auth.require(scopes::JOBS_READ).is_ok());
        assert!(auth.is_admin());
    }

    #[test]
    fn missing_scope_is_forbidden() {
        let auth = key_auth(&[scopes::JOBS_READ]);
        assert!(auth.require(scopes::JOBS_READ).is_ok());
        assert!(auth.require(scopes::JOBS_SUBMIT).is_err());
        assert!(!auth.is_admin());
    }
}
