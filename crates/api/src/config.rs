use std::time::Duration;

use aiq_core::ProviderDescriptor;
use aiq_engine::config::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_WORKER_COUNT, HEARTBEAT_INTERVAL_SECS, HEARTBEAT_TIMEOUT_SECS,
    RECLAIM_CHECK_INTERVAL_SECS, SHUTDOWN_TIMEOUT_SECS, SYNC_TIMEOUT_SECS, WAIT_DEFAULT_SECS,
    WAIT_MAX_SECS,
};
use aiq_engine::DispatchConfig;

/// Default HTTP middleware timeout in seconds. Sits above `WAIT_MAX_SECS` so
/// the timeout layer never cuts off a legitimate blocking wait.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 330;

/// Default per-attempt timeout for provider HTTP calls, in seconds.
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

/// Server configuration loaded from environment variables.
///
/// Every field except `AUTH_SECRET` has a default suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Admin credential, accepted via `X-Auth-Secret` or as a bearer token.
    pub auth_secret: String,
    /// Path to a JSON file of provider descriptors. Absent means an empty
    /// registry; every submission then fails at provider selection.
    pub providers_path: Option<String>,
    /// Secret for signing `replyTo` webhook payloads, when set.
    pub webhook_signing_secret: Option<String>,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `330`).
    pub request_timeout_secs: u64,
    /// Provider HTTP client timeout in seconds (default: `120`).
    pub provider_timeout_secs: u64,
    /// Dispatch policy: worker count, retries, reclaim timing, wait bounds.
    pub dispatch: DispatchConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `HOST`                        | `0.0.0.0`               |
    /// | `PORT`                        | `8080`                  |
    /// | `AUTH_SECRET`                 | (required)              |
    /// | `PROVIDERS_PATH`              | (optional)              |
    /// | `WEBHOOK_SIGNING_SECRET`      | (optional)              |
    /// | `CORS_ORIGINS`                | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`        | `330`                   |
    /// | `PROVIDER_TIMEOUT_SECS`       | `120`                   |
    /// | `WORKER_COUNT`                | `4`                     |
    /// | `MAX_ATTEMPTS`                | `3`                     |
    /// | `HEARTBEAT_INTERVAL_SECS`     | `15`                    |
    /// | `HEARTBEAT_TIMEOUT_SECS`      | `120`                   |
    /// | `RECLAIM_CHECK_INTERVAL_SECS` | `30`                    |
    /// | `WAIT_DEFAULT_SECS`           | `30`                    |
    /// | `WAIT_MAX_SECS`               | `300`                   |
    /// | `SYNC_TIMEOUT_SECS`           | `120`                   |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let auth_secret = std::env::var("AUTH_SECRET").expect("AUTH_SECRET must be set");

        let providers_path = std::env::var("PROVIDERS_PATH").ok();
        let webhook_signing_secret = std::env::var("WEBHOOK_SIGNING_SECRET").ok();

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let dispatch = DispatchConfig {
            worker_count: env_u64("WORKER_COUNT", DEFAULT_WORKER_COUNT as u64) as usize,
            max_attempts: env_u64("MAX_ATTEMPTS", u64::from(DEFAULT_MAX_ATTEMPTS)) as u32,
            heartbeat_interval: env_secs("HEARTBEAT_INTERVAL_SECS", HEARTBEAT_INTERVAL_SECS),
            heartbeat_timeout: env_secs("HEARTBEAT_TIMEOUT_SECS", HEARTBEAT_TIMEOUT_SECS),
            reclaim_check_interval: env_secs(
                "RECLAIM_CHECK_INTERVAL_SECS",
                RECLAIM_CHECK_INTERVAL_SECS,
            ),
            wait_default: env_secs("WAIT_DEFAULT_SECS", WAIT_DEFAULT_SECS),
            wait_max: env_secs("WAIT_MAX_SECS", WAIT_MAX_SECS),
            sync_timeout: env_secs("SYNC_TIMEOUT_SECS", SYNC_TIMEOUT_SECS),
            shutdown_timeout: env_secs("SHUTDOWN_TIMEOUT_SECS", SHUTDOWN_TIMEOUT_SECS),
        };
        dispatch
            .validate()
            .unwrap_or_else(|e| panic!("Invalid dispatch configuration: {e}"));

        Self {
            host,
            port,
            auth_secret,
            providers_path,
            webhook_signing_secret,
            cors_origins,
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            provider_timeout_secs: env_u64("PROVIDER_TIMEOUT_SECS", DEFAULT_PROVIDER_TIMEOUT_SECS),
            dispatch,
        }
    }
}

/// Read an integer environment variable, falling back to `default`.
fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Err(_) => default,
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid integer, got '{raw}'")),
    }
}

/// Read a seconds-valued environment variable as a [`Duration`].
fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(env_u64(name, default))
}

/// Load provider descriptors from a JSON file.
///
/// Panics on a missing or malformed file; provider misconfiguration should
/// fail startup rather than surface as an empty registry at runtime.
pub fn load_providers(path: &str) -> Vec<ProviderDescriptor> {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read providers file '{path}': {e}"));
    serde_json::from_str(&raw).unwrap_or_else(|e| panic!("Invalid providers file '{path}': {e}"))
}
