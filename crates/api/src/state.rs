//! Shared application state for Axum handlers.

use std::sync::Arc;

use aiq_engine::{JobQueue, JobStore, ProviderRegistry, WorkerPool};

use crate::config::ServerConfig;
use crate::keys::ApiKeyStore;

/// Shared application state, cloned into every handler.
///
/// All fields are `Arc`s, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Job table and lifecycle transitions.
    pub store: Arc<JobStore>,
    /// Per-kind claim queues feeding the worker pool.
    pub queue: Arc<JobQueue>,
    /// Provider descriptors plus runtime health and in-flight counts.
    pub registry: Arc<ProviderRegistry>,
    /// The worker pool (stats and drain control).
    pub workers: Arc<WorkerPool>,
    /// In-process API key store.
    pub api_keys: Arc<ApiKeyStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
