//! Runtime provider registry.
//!
//! Wraps the static [`ProviderDescriptor`]s loaded at startup with the
//! mutable state selection needs: in-flight slot counts, smooth round-robin
//! weights, and a sliding window of recent attempt outcomes that health is
//! derived from. The selection policy itself lives in [`crate::router`].

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tokio::sync::{RwLock, RwLockWriteGuard};

use aiq_core::provider::OUTCOME_WINDOW;
use aiq_core::{
    DispatchError, DispatchResult, GenerationKind, HealthState, ProviderDescriptor,
};

// ---------------------------------------------------------------------------
// ProviderEntry
// ---------------------------------------------------------------------------

/// A registered provider plus its runtime selection state.
#[derive(Debug)]
pub(crate) struct ProviderEntry {
    pub(crate) descriptor: ProviderDescriptor,
    /// Attempts currently running against this provider.
    pub(crate) in_flight: usize,
    /// Smooth weighted round-robin accumulator.
    pub(crate) current_weight: i64,
    /// Sequence number of the most recent selection, for LRU tie-breaks.
    pub(crate) last_selected: Option<u64>,
    /// Recent attempt outcomes, oldest first; `true` is a success.
    outcomes: VecDeque<bool>,
}

impl ProviderEntry {
    fn new(descriptor: ProviderDescriptor) -> Self {
        Self {
            descriptor,
            in_flight: 0,
            current_weight: 0,
            last_selected: None,
            outcomes: VecDeque::new(),
        }
    }

    pub(crate) fn record_outcome(&mut self, success: bool) {
        self.outcomes.push_back(success);
        while self.outcomes.len() > OUTCOME_WINDOW {
            self.outcomes.pop_front();
        }
    }

    pub(crate) fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / self.outcomes.len() as f64
    }

    pub(crate) fn health(&self) -> HealthState {
        HealthState::from_failure_rate(self.failure_rate(), self.outcomes.len())
    }
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct RegistryInner {
    pub(crate) entries: HashMap<String, ProviderEntry>,
    /// Monotonic selection counter driving the LRU tie-break.
    pub(crate) selection_seq: u64,
}

/// Point-in-time view of a provider for listings and stats. Credentials and
/// endpoint details are deliberately absent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSnapshot {
    pub name: String,
    pub models: Vec<String>,
    pub kinds: Vec<GenerationKind>,
    pub priority: i32,
    pub concurrency_limit: usize,
    pub active: bool,
    pub health: HealthState,
    pub in_flight: usize,
}

impl ProviderSnapshot {
    fn of(entry: &ProviderEntry) -> Self {
        Self {
            name: entry.descriptor.name.clone(),
            models: entry.descriptor.models.clone(),
            kinds: entry.descriptor.kinds.clone(),
            priority: entry.descriptor.priority,
            concurrency_limit: entry.descriptor.concurrency_limit,
            active: entry.descriptor.active,
            health: entry.health(),
            in_flight: entry.in_flight,
        }
    }
}

/// The set of providers this process can dispatch to.
///
/// Membership is fixed at startup; only the `active` flag and runtime state
/// change afterwards.
#[derive(Debug)]
pub struct ProviderRegistry {
    inner: RwLock<RegistryInner>,
}

impl ProviderRegistry {
    pub fn new(descriptors: Vec<ProviderDescriptor>) -> DispatchResult<Self> {
        let mut entries = HashMap::new();
        for descriptor in descriptors {
            if descriptor.name.trim().is_empty() {
                return Err(DispatchError::Validation(
                    "provider name must not be empty".into(),
                ));
            }
            if descriptor.models.is_empty() {
                return Err(DispatchError::Validation(format!(
                    "provider {} lists no models",
                    descriptor.name
                )));
            }
            let name = descriptor.name.clone();
            if entries
                .insert(name.clone(), ProviderEntry::new(descriptor))
                .is_some()
            {
                return Err(DispatchError::Validation(format!(
                    "duplicate provider name: {name}"
                )));
            }
        }
        Ok(Self {
            inner: RwLock::new(RegistryInner {
                entries,
                selection_seq: 0,
            }),
        })
    }

    /// Exclusive access for the router's select/release path.
    pub(crate) async fn lock(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().await
    }

    /// Snapshots of every registered provider, sorted by name.
    pub async fn snapshots(&self) -> Vec<ProviderSnapshot> {
        let inner = self.inner.read().await;
        let mut all: Vec<ProviderSnapshot> =
            inner.entries.values().map(ProviderSnapshot::of).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Snapshots of active providers only, sorted by name.
    pub async fn active_snapshots(&self) -> Vec<ProviderSnapshot> {
        let mut all = self.snapshots().await;
        all.retain(|p| p.active);
        all
    }

    /// Toggle a provider's activity flag. Inactive providers keep their
    /// runtime state but are never selected.
    pub async fn set_active(&self, name: &str, active: bool) -> DispatchResult<ProviderSnapshot> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .entries
            .get_mut(name)
            .ok_or_else(|| DispatchError::ProviderNotFound(name.to_string()))?;
        entry.descriptor.active = active;
        Ok(ProviderSnapshot::of(entry))
    }

    /// Record an attempt outcome into the provider's health window. Unknown
    /// names are ignored; the attempt already happened either way.
    pub async fn record_outcome(&self, name: &str, success: bool) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.get_mut(name) {
            entry.record_outcome(success);
        }
    }

    /// Release the concurrency slot reserved by a selection.
    pub async fn release_slot(&self, name: &str) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.get_mut(name) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
