//! HTTP client for OpenAI-style provider APIs.
//!
//! Providers expose the usual path per generation kind under their
//! `api_base`; the request body is the job's model plus its opaque
//! parameters, forwarded untouched.

use std::time::Duration;

use async_trait::async_trait;

use aiq_core::{GenerationKind, GenerationRequest, ProviderDescriptor};

use crate::client::{ProviderClient, ProviderError};

/// Truncation length for error bodies copied into attempt errors.
const ERROR_DETAIL_MAX_LEN: usize = 512;

/// API path for each generation kind, relative to the provider's `api_base`.
fn endpoint_path(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::Chat => "/v1/chat/completions",
        GenerationKind::Image => "/v1/images/generations",
        GenerationKind::Speech => "/v1/audio/speech",
    }
}

/// Build the JSON body sent to the provider: `model` plus the flattened
/// request parameters.
fn build_body(request: &GenerationRequest) -> serde_json::Value {
    let mut body = request.params.clone();
    body.insert(
        "model".into(),
        serde_json::Value::String(request.model.clone()),
    );
    serde_json::Value::Object(body)
}

/// Reqwest-backed [`ProviderClient`].
pub struct HttpProviderClient {
    client: reqwest::Client,
}

impl HttpProviderClient {
    /// Create a client with the given per-attempt timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn execute(
        &self,
        provider: &ProviderDescriptor,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let base = provider
            .api_base
            .as_deref()
            .ok_or(ProviderError::NotConfigured)?;
        let url = format!(
            "{}{}",
            base.trim_end_matches('/'),
            endpoint_path(request.kind)
        );

        let mut req = self.client.post(&url).json(&build_body(request));
        if let Some(key) = &provider.api_key {
            req = req.bearer_auth(key);
        }

        tracing::debug!(provider = %provider.name, %url, model = %request.model, "Provider request");
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut detail = response.text().await.unwrap_or_default();
            // Truncate on a char boundary; error bodies are not always ASCII.
            let mut cut = ERROR_DETAIL_MAX_LEN.min(detail.len());
            while !detail.is_char_boundary(cut) {
                cut -= 1;
            }
            detail.truncate(cut);
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
