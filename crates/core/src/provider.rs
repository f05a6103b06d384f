//! Provider descriptors and health classification.
//!
//! A provider is an interchangeable backend able to execute requests for a
//! set of models. The static descriptor is loaded from configuration at
//! startup; the runtime registry layers health and in-flight tracking on top.

use serde::{Deserialize, Serialize};

use crate::request::GenerationKind;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Minimum number of recorded outcomes before health is derived from the
/// failure rate. Providers with fewer observations are `Healthy` by default.
pub const MIN_SAMPLE_COUNT: usize = 5;

/// Failure rate threshold for `Unavailable` (>= 90% of recent attempts fail).
pub const UNAVAILABLE_THRESHOLD: f64 = 0.9;

/// Failure rate threshold for `Degraded` (>= 50% of recent attempts fail).
pub const DEGRADED_THRESHOLD: f64 = 0.5;

/// Number of recent attempt outcomes kept per provider for health derivation.
pub const OUTCOME_WINDOW: usize = 20;

/// Concurrency limit applied when a descriptor does not specify one.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 1;

// ---------------------------------------------------------------------------
// HealthState
// ---------------------------------------------------------------------------

/// Health classification derived from a provider's recent failure rate.
///
/// `Degraded` providers remain selectable (deprioritized only by their own
/// failures shrinking throughput); `Unavailable` providers are skipped by
/// routed selection but still honored by an explicit pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unavailable,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Healthy => "Healthy",
            HealthState::Degraded => "Degraded",
            HealthState::Unavailable => "Unavailable",
        }
    }

    /// Classify health from a failure rate over `samples` recent outcomes.
    ///
    /// Below [`MIN_SAMPLE_COUNT`] samples the rate is not significant and the
    /// provider is `Healthy` regardless of it.
    pub fn from_failure_rate(rate: f64, samples: usize) -> Self {
        if samples < MIN_SAMPLE_COUNT {
            HealthState::Healthy
        } else if rate >= UNAVAILABLE_THRESHOLD {
            HealthState::Unavailable
        } else if rate >= DEGRADED_THRESHOLD {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProviderDescriptor
// ---------------------------------------------------------------------------

/// Static description of a provider, as loaded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    /// Base URL of the provider's OpenAI-style API. Absent for providers
    /// reached through a non-HTTP client (tests use this).
    #[serde(default)]
    pub api_base: Option<String>,
    /// Bearer credential for the provider API. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Model identifiers this provider can execute.
    pub models: Vec<String>,
    /// Generation kinds this provider accepts.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<GenerationKind>,
    /// Ordering weight. Higher priority providers are selected more often.
    #[serde(default)]
    pub priority: i32,
    /// Maximum simultaneous in-flight attempts.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Admin-toggleable activity flag. Inactive providers are never selected.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_kinds() -> Vec<GenerationKind> {
    vec![GenerationKind::Chat]
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_active() -> bool {
    true
}

impl ProviderDescriptor {
    /// Whether this provider can execute a request of `kind` for `model`.
    pub fn supports(&self, kind: GenerationKind, model: &str) -> bool {
        self.kinds.contains(&kind) && self.models.iter().any(|m| m == model)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(models: &[&str]) -> ProviderDescriptor {
        ProviderDescriptor {
            name: "p1".into(),
            api_base: None,
            api_key: None,
            models: models.iter().map(|m| m.to_string()).collect(),
            kinds: vec![GenerationKind::Chat],
            priority: 0,
            concurrency_limit: 1,
            active: true,
        }
    }

    // -- Health classification ----------------------------------------------

    #[test]
    fn few_samples_default_to_healthy() {
        assert_eq!(
            HealthState::from_failure_rate(1.0, MIN_SAMPLE_COUNT - 1),
            HealthState::Healthy
        );
    }

    #[test]
    fn high_failure_rate_is_unavailable() {
        assert_eq!(
            HealthState::from_failure_rate(0.95, 20),
            HealthState::Unavailable
        );
    }

    #[test]
    fn moderate_failure_rate_is_degraded() {
        assert_eq!(
            HealthState::from_failure_rate(0.5, 10),
            HealthState::Degraded
        );
    }

    #[test]
    fn low_failure_rate_is_healthy() {
        assert_eq!(
            HealthState::from_failure_rate(0.1, 20),
            HealthState::Healthy
        );
    }

    // -- Capability matching -------------------------------------------------

    #[test]
    fn supports_requires_kind_and_model() {
        let p = descriptor(&["gpt-x", "gpt-y"]);
        assert!(p.supports(GenerationKind::Chat, "gpt-x"));
        assert!(!p.supports(GenerationKind::Chat, "gpt-z"));
        assert!(!p.supports(GenerationKind::Image, "gpt-x"));
    }

    // -- Descriptor deserialization -------------------------------------------

    #[test]
    fn descriptor_defaults_apply() {
        let p: ProviderDescriptor =
            serde_json::from_str(r#"{"name":"p1","models":["gpt-x"]}"#).unwrap();
        assert!(p.active);
        assert_eq!(p.concurrency_limit, DEFAULT_CONCURRENCY_LIMIT);
        assert_eq!(p.kinds, vec![GenerationKind::Chat]);
        assert_eq!(p.priority, 0);
    }

    #[test]
    fn api_key_is_never_serialized() {
        let mut p = descriptor(&["gpt-x"]);
        p.api_key = Some("secret".into());
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("secret"));
    }
}
