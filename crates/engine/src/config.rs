//! Dispatch policy configuration.
//!
//! Retry counts and reclaim timing are deployment policy, not engine
//! behavior, so they are explicit configuration with documented defaults
//! instead of constants buried next to the code that uses them.

use std::time::Duration;

use aiq_core::{DispatchError, DispatchResult};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Workers spawned by the pool when not configured otherwise.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Provider attempts per job (including the successful one).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How often each worker refreshes its heartbeat.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;

/// Heartbeat staleness after which a worker's bound jobs are reclaimed.
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 120;

/// How often the reclaim monitor scans for stuck jobs.
pub const RECLAIM_CHECK_INTERVAL_SECS: u64 = 30;

/// Blocking-wait duration applied when a caller does not pass one.
pub const WAIT_DEFAULT_SECS: u64 = 30;

/// Upper bound on caller-supplied blocking-wait durations.
pub const WAIT_MAX_SECS: u64 = 300;

/// Deadline for the synchronous generate operation.
pub const SYNC_TIMEOUT_SECS: u64 = 120;

/// Deadline for draining workers on shutdown.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

/// Tunable dispatch policy shared by the queue, pool, and waiters.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of workers in the pool.
    pub worker_count: usize,
    /// Provider attempts per job before it is failed.
    pub max_attempts: u32,
    /// Worker heartbeat period.
    pub heartbeat_interval: Duration,
    /// Heartbeat staleness threshold for reclaiming bound jobs.
    pub heartbeat_timeout: Duration,
    /// Reclaim monitor scan period.
    pub reclaim_check_interval: Duration,
    /// Wait duration used when the caller passes none.
    pub wait_default: Duration,
    /// Cap on caller-supplied wait durations.
    pub wait_max: Duration,
    /// Deadline for synchronous generation.
    pub sync_timeout: Duration,
    /// Deadline for draining workers on shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            heartbeat_timeout: Duration::from_secs(HEARTBEAT_TIMEOUT_SECS),
            reclaim_check_interval: Duration::from_secs(RECLAIM_CHECK_INTERVAL_SECS),
            wait_default: Duration::from_secs(WAIT_DEFAULT_SECS),
            wait_max: Duration::from_secs(WAIT_MAX_SECS),
            sync_timeout: Duration::from_secs(SYNC_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        }
    }
}

impl DispatchConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> DispatchResult<()> {
        if self.worker_count == 0 {
            return Err(DispatchError::Validation(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(DispatchError::Validation(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.wait_max < self.wait_default {
            return Err(DispatchError::Validation(
                "wait_max must not be below wait_default".into(),
            ));
        }
        if self.heartbeat_timeout <= self.heartbeat_interval {
            return Err(DispatchError::Validation(
                "heartbeat_timeout must exceed heartbeat_interval".into(),
            ));
        }
        Ok(())
    }
}
