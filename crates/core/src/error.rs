use crate::job::JobId;

/// Convenience alias used across the engine crates.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("No provider available: {0}")]
    NoProviderAvailable(String),

    #[error("Provider request failed: {provider}: {detail}")]
    ProviderRequestFailed { provider: String, detail: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Construct a `JobNotFound` from a numeric job id.
    pub fn job_not_found(id: JobId) -> Self {
        DispatchError::JobNotFound(id.to_string())
    }

    /// Stable machine-readable code for the wire error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::JobNotFound(_) => "JOB_NOT_FOUND",
            DispatchError::WorkerNotFound(_) => "WORKER_NOT_FOUND",
            DispatchError::ProviderNotFound(_) => "PROVIDER_NOT_FOUND",
            DispatchError::NoProviderAvailable(_) => "NO_PROVIDER_AVAILABLE",
            DispatchError::ProviderRequestFailed { .. } => "PROVIDER_REQUEST_FAILED",
            DispatchError::Validation(_) => "VALIDATION",
            DispatchError::Conflict(_) => "CONFLICT",
            DispatchError::Unauthorized(_) => "UNAUTHORIZED",
            DispatchError::Forbidden(_) => "FORBIDDEN",
            DispatchError::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_not_found_formats_id() {
        let err = DispatchError::job_not_found(42);
        assert_eq!(err.to_string(), "Job not found: 42");
        assert_eq!(err.code(), "JOB_NOT_FOUND");
    }

    #[test]
    fn provider_request_failed_carries_provider_and_detail() {
        let err = DispatchError::ProviderRequestFailed {
            provider: "p1".into(),
            detail: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "Provider request failed: p1: connection refused"
        );
        assert_eq!(err.code(), "PROVIDER_REQUEST_FAILED");
    }
}
