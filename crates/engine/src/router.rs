//! Provider selection policy.
//!
//! Routed selection runs smooth weighted round-robin over the eligible
//! providers: every candidate's accumulator advances by its weight, the
//! largest accumulator wins and is debited by the total. That interleaves
//! selections proportionally to priority instead of draining the highest
//! priority first. Ties go to the provider selected least recently, then to
//! name order, so results are deterministic.
//!
//! An explicit pin skips the policy entirely: it checks only that the named
//! provider is active and supports the request, bypassing health and
//! concurrency gating.

use std::sync::Arc;

use aiq_core::{
    DispatchError, DispatchResult, GenerationRequest, HealthState, ProviderDescriptor,
};

use crate::registry::{ProviderRegistry, RegistryInner};

/// Effective selection weight for a priority. Zero and negative priorities
/// still carry weight 1 so such providers remain selectable when nothing
/// outranks them.
fn selection_weight(priority: i32) -> i64 {
    i64::from(priority.max(0)) + 1
}

/// Chooses a provider for each attempt and reserves its concurrency slot.
pub struct ProviderRouter {
    registry: Arc<ProviderRegistry>,
}

impl ProviderRouter {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Select a provider able to execute `request` and reserve one of its
    /// concurrency slots. `exclude` lists providers that already failed this
    /// job; they are never re-selected for it, pinned or not.
    ///
    /// The caller must [`release`](ProviderRouter::release) the slot when the
    /// attempt finishes, success or not.
    pub async fn select(
        &self,
        request: &GenerationRequest,
        pinned: Option<&str>,
        exclude: &[String],
    ) -> DispatchResult<ProviderDescriptor> {
        let mut guard = self.registry.lock().await;
        let inner = &mut *guard;
        match pinned {
            Some(name) => select_pinned(inner, name, request, exclude),
            None => select_routed(inner, request, exclude),
        }
    }

    /// Release the slot reserved by [`select`](ProviderRouter::select).
    pub async fn release(&self, name: &str) {
        self.registry.release_slot(name).await;
    }

    /// Feed an attempt outcome into the provider's health window.
    pub async fn record_outcome(&self, name: &str, success: bool) {
        self.registry.record_outcome(name, success).await;
    }
}

fn select_pinned(
    inner: &mut RegistryInner,
    name: &str,
    request: &GenerationRequest,
    exclude: &[String],
) -> DispatchResult<ProviderDescriptor> {
    if exclude.iter().any(|failed| failed == name) {
        return Err(DispatchError::NoProviderAvailable(format!(
            "pinned provider {name} already failed this job"
        )));
    }
    inner.selection_seq += 1;
    let seq = inner.selection_seq;
    let entry = inner.entries.get_mut(name).ok_or_else(|| {
        DispatchError::NoProviderAvailable(format!("pinned provider {name} is not registered"))
    })?;
    if !entry.descriptor.active {
        return Err(DispatchError::NoProviderAvailable(format!(
            "pinned provider {name} is inactive"
        )));
    }
    if !entry.descriptor.supports(request.kind, &request.model) {
        return Err(DispatchError::NoProviderAvailable(format!(
            "pinned provider {name} does not serve {} model {}",
            request.kind, request.model
        )));
    }
    entry.in_flight += 1;
    entry.last_selected = Some(seq);
    Ok(entry.descriptor.clone())
}

fn select_routed(
    inner: &mut RegistryInner,
    request: &GenerationRequest,
    exclude: &[String],
) -> DispatchResult<ProviderDescriptor> {
    // One pass: advance each candidate's accumulator, tracking the winner on
    // post-advance weights as we go.
    let mut total_weight = 0i64;
    let mut best: Option<(String, i64, Option<u64>)> = None;
    for entry in inner.entries.values_mut() {
        let eligible = entry.descriptor.active
            && entry.health() != HealthState::Unavailable
            && entry.descriptor.supports(request.kind, &request.model)
            && entry.in_flight < entry.descriptor.concurrency_limit
            && !exclude.contains(&entry.descriptor.name);
        if !eligible {
            continue;
        }
        let weight = selection_weight(entry.descriptor.priority);
        entry.current_weight += weight;
        total_weight += weight;

        let replace = match &best {
            None => true,
            Some((best_name, best_weight, best_last)) => {
                entry.current_weight > *best_weight
                    || (entry.current_weight == *best_weight
                        && (entry.last_selected < *best_last
                            || (entry.last_selected == *best_last
                                && entry.descriptor.name.as_str() < best_name.as_str())))
            }
        };
        if replace {
            best = Some((
                entry.descriptor.name.clone(),
                entry.current_weight,
                entry.last_selected,
            ));
        }
    }

    let Some((name, _, _)) = best else {
        return Err(DispatchError::NoProviderAvailable(format!(
            "no active provider serves {} model {}",
            request.kind, request.model
        )));
    };

    inner.selection_seq += 1;
    let seq = inner.selection_seq;
    let entry = inner
        .entries
        .get_mut(&name)
        .ok_or_else(|| DispatchError::Internal(format!("provider {name} vanished mid-selection")))?;
    entry.current_weight -= total_weight;
    entry.in_flight += 1;
    entry.last_selected = Some(seq);
    Ok(entry.descriptor.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use aiq_core::GenerationKind;
    use assert_matches::assert_matches;

    fn provider(name: &str, priority: i32, limit: usize) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.into(),
            api_base: None,
            api_key: None,
            models: vec!["gpt-x".into()],
            kinds: vec![GenerationKind::Chat],
            priority,
            concurrency_limit: limit,
            active: true,
        }
    }

    fn chat(model: &str) -> GenerationRequest {
        GenerationRequest {
            kind: GenerationKind::Chat,
            model: model.into(),
            params: Default::default(),
        }
    }

    fn router(descriptors: Vec<ProviderDescriptor>) -> ProviderRouter {
        ProviderRouter::new(Arc::new(ProviderRegistry::new(descriptors).unwrap()))
    }

    #[tokio::test]
    async fn selects_only_supporting_provider() {
        let mut p2 = provider("p2", 0, 1);
        p2.models = vec!["gpt-y".into()];
        let router = router(vec![provider("p1", 0, 1), p2]);

        let selected = router.select(&chat("gpt-y"), None, &[]).await.unwrap();
        assert_eq!(selected.name, "p2");
    }

    #[tokio::test]
    async fn priority_weighting_is_proportional() {
        // Weights 11 and 6: over one full cycle of 17 selections the split
        // must be exactly 11/6.
        let router = router(vec![provider("p1", 10, 100), provider("p2", 5, 100)]);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..17 {
            let selected = router.select(&chat("gpt-x"), None, &[]).await.unwrap();
            *counts.entry(selected.name.clone()).or_insert(0) += 1;
            router.release(&selected.name).await;
        }
        assert_eq!(counts.get("p1"), Some(&11));
        assert_eq!(counts.get("p2"), Some(&6));
    }

    #[tokio::test]
    async fn equal_priorities_alternate() {
        let router = router(vec![provider("pa", 1, 100), provider("pb", 1, 100)]);
        let mut order = vec![];
        for _ in 0..4 {
            let selected = router.select(&chat("gpt-x"), None, &[]).await.unwrap();
            order.push(selected.name.clone());
            router.release(&selected.name).await;
        }
        assert_eq!(order, vec!["pa", "pb", "pa", "pb"]);
    }

    #[tokio::test]
    async fn inactive_providers_skipped() {
        let mut p1 = provider("p1", 10, 1);
        p1.active = false;
        let router = router(vec![p1, provider("p2", 0, 1)]);

        let selected = router.select(&chat("gpt-x"), None, &[]).await.unwrap();
        assert_eq!(selected.name, "p2");
    }

    #[tokio::test]
    async fn excluded_providers_never_reselected() {
        let router = router(vec![provider("p1", 10, 1), provider("p2", 0, 1)]);

        let selected = router
            .select(&chat("gpt-x"), None, &["p1".to_string()])
            .await
            .unwrap();
        assert_eq!(selected.name, "p2");

        let err = router
            .select(&chat("gpt-x"), None, &["p1".to_string(), "p2".to_string()])
            .await
            .unwrap_err();
        assert_matches!(err, DispatchError::NoProviderAvailable(_));
    }

    #[tokio::test]
    async fn concurrency_limit_blocks_until_release() {
        let router = router(vec![provider("p1", 0, 1)]);

        let selected = router.select(&chat("gpt-x"), None, &[]).await.unwrap();
        assert_eq!(selected.name, "p1");
        assert_matches!(
            router.select(&chat("gpt-x"), None, &[]).await,
            Err(DispatchError::NoProviderAvailable(_))
        );

        router.release("p1").await;
        assert!(router.select(&chat("gpt-x"), None, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn unavailable_health_excluded_from_routing() {
        let router = router(vec![provider("p1", 10, 1), provider("p2", 0, 1)]);
        for _ in 0..20 {
            router.record_outcome("p1", false).await;
        }

        for _ in 0..3 {
            let selected = router.select(&chat("gpt-x"), None, &[]).await.unwrap();
            assert_eq!(selected.name, "p2");
            router.release("p2").await;
        }
    }

    #[tokio::test]
    async fn pin_overrides_routing_order() {
        let router = router(vec![provider("p1", 100, 1), provider("p2", 0, 1)]);
        let selected = router
            .select(&chat("gpt-x"), Some("p2"), &[])
            .await
            .unwrap();
        assert_eq!(selected.name, "p2");
    }

    #[tokio::test]
    async fn pin_requires_active_and_support() {
        let mut inactive = provider("off", 0, 1);
        inactive.active = false;
        let router = router(vec![inactive, provider("p1", 0, 1)]);

        assert_matches!(
            router.select(&chat("gpt-x"), Some("off"), &[]).await,
            Err(DispatchError::NoProviderAvailable(_))
        );
        assert_matches!(
            router.select(&chat("gpt-z"), Some("p1"), &[]).await,
            Err(DispatchError::NoProviderAvailable(_))
        );
        assert_matches!(
            router.select(&chat("gpt-x"), Some("ghost"), &[]).await,
            Err(DispatchError::NoProviderAvailable(_))
        );
    }

    #[tokio::test]
    async fn pin_bypasses_health_gating() {
        let router = router(vec![provider("p1", 0, 1)]);
        for _ in 0..20 {
            router.record_outcome("p1", false).await;
        }

        assert_matches!(
            router.select(&chat("gpt-x"), None, &[]).await,
            Err(DispatchError::NoProviderAvailable(_))
        );
        let selected = router
            .select(&chat("gpt-x"), Some("p1"), &[])
            .await
            .unwrap();
        assert_eq!(selected.name, "p1");
    }

    #[tokio::test]
    async fn pin_rejected_after_its_own_failure() {
        let router = router(vec![provider("p1", 0, 1)]);
        let err = router
            .select(&chat("gpt-x"), Some("p1"), &["p1".to_string()])
            .await
            .unwrap_err();
        assert_matches!(err, DispatchError::NoProviderAvailable(_));
    }

    #[tokio::test]
    async fn empty_registry_has_no_providers() {
        let router = router(vec![]);
        assert_matches!(
            router.select(&chat("gpt-x"), None, &[]).await,
            Err(DispatchError::NoProviderAvailable(_))
        );
    }
}
