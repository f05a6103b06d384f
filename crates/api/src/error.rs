use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use aiq_core::DispatchError;

/// Error type returned by HTTP handlers.
///
/// Most handler failures are [`DispatchError`]s bubbling up from the engine;
/// the extra variants cover request problems the engine never sees. The
/// [`IntoResponse`] impl turns every variant into the `{error, code}` JSON
/// envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from the dispatch engine.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A malformed request, reported before it reaches the engine.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- DispatchError variants ---
            AppError::Dispatch(err) => match err {
                DispatchError::JobNotFound(_)
                | DispatchError::WorkerNotFound(_)
                | DispatchError::ProviderNotFound(_) => {
                    (StatusCode::NOT_FOUND, err.code(), err.to_string())
                }
                DispatchError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, err.code(), msg.clone())
                }
                DispatchError::Conflict(msg) => (StatusCode::CONFLICT, err.code(), msg.clone()),
                DispatchError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, err.code(), msg.clone())
                }
                DispatchError::Forbidden(msg) => (StatusCode::FORBIDDEN, err.code(), msg.clone()),
                DispatchError::NoProviderAvailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, err.code(), err.to_string())
                }
                // Surfaces directly only from synchronous generation.
                DispatchError::ProviderRequestFailed { .. } => {
                    (StatusCode::BAD_GATEWAY, err.code(), err.to_string())
                }
                DispatchError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal dispatch error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn dispatch_errors_map_to_expected_status() {
        let cases = [
            (
                DispatchError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                DispatchError::Unauthorized("no".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (DispatchError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (DispatchError::JobNotFound("7".into()), StatusCode::NOT_FOUND),
            (
                DispatchError::WorkerNotFound("w".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                DispatchError::ProviderNotFound("p".into()),
                StatusCode::NOT_FOUND,
            ),
            (DispatchError::Conflict("busy".into()), StatusCode::CONFLICT),
            (
                DispatchError::NoProviderAvailable("none".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                DispatchError::ProviderRequestFailed {
                    provider: "p1".into(),
                    detail: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                DispatchError::Internal("oops".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn error_body_carries_message_and_code() {
        let response = AppError::from(DispatchError::JobNotFound("42".into())).into_response();
        let body = body_json(response).await;
        assert_eq!(body["code"], "JOB_NOT_FOUND");
        assert_eq!(body["error"], "Job not found: 42");
    }

    #[tokio::test]
    async fn auth_errors_carry_the_plain_message() {
        let response =
            AppError::from(DispatchError::Forbidden("Admin scope required".into()))
                .into_response();
        let body = body_json(response).await;
        assert_eq!(body["code"], "FORBIDDEN");
        assert_eq!(body["error"], "Admin scope required");
    }

    #[tokio::test]
    async fn internal_errors_are_sanitized() {
        let response =
            AppError::from(DispatchError::Internal("secret detail".into())).into_response();
        let body = body_json(response).await;
        assert_eq!(body["code"], "INTERNAL");
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn bad_request_uses_validation_code() {
        let response = AppError::BadRequest("missing selector".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION");
        assert_eq!(body["error"], "missing selector");
    }
}
