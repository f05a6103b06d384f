//! Provider client seam.
//!
//! The engine executes jobs through this trait and never sees HTTP details;
//! tests substitute scripted implementations.

use async_trait::async_trait;

use aiq_core::{GenerationRequest, ProviderDescriptor};

/// Error type for a single provider execution attempt.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("provider returned HTTP {status}: {detail}")]
    HttpStatus { status: u16, detail: String },

    /// The provider answered but the body was not usable JSON.
    #[error("unusable provider response: {0}")]
    InvalidResponse(String),

    /// The descriptor has no API endpoint this client can reach.
    #[error("provider has no API endpoint configured")]
    NotConfigured,
}

/// Executes one generation attempt against one provider.
///
/// Implementations must be safe to share across workers; the engine holds a
/// single client behind an `Arc` for the whole pool.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Perform the provider call and return the raw result payload.
    async fn execute(
        &self,
        provider: &ProviderDescriptor,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, ProviderError>;
}
