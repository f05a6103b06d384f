//! FIFO claim queues, one per generation kind.
//!
//! The queue holds job ids only; the store owns the records. Claiming pops an
//! id and then runs the store's `Queued -> Assigned` compare-and-swap, so a
//! stale entry (cancelled, or already won by another worker) is simply
//! discarded. The claim path is the engine's single hard exclusivity point:
//! two workers can never leave it holding the same job.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use aiq_core::request::ALL_KINDS;
use aiq_core::{DispatchResult, GenerationKind, Job, JobId, SubmitJob};

use crate::store::JobStore;

/// Per-kind FIFO indexes over claimable jobs.
pub struct JobQueue {
    store: Arc<JobStore>,
    queues: Mutex<HashMap<GenerationKind, VecDeque<JobId>>>,
    /// Signalled on every push. `Notify` stores a permit when nobody is
    /// waiting, so a worker that goes idle right before a push still wakes.
    work: Notify,
    /// Rotates the kind a claim scans first so a deep backlog in one kind
    /// cannot starve the others indefinitely.
    scan_offset: AtomicUsize,
}

impl JobQueue {
    pub fn new(store: Arc<JobStore>) -> Self {
        let mut queues = HashMap::new();
        for kind in ALL_KINDS {
            queues.insert(kind, VecDeque::new());
        }
        Self {
            store,
            queues: Mutex::new(queues),
            work: Notify::new(),
            scan_offset: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Submit through the store and, when a new job was created, index it for
    /// claiming. A `refId` dedup hit is returned as-is without re-indexing.
    pub async fn submit(&self, input: SubmitJob) -> DispatchResult<(Job, bool)> {
        let (job, created) = self.store.submit(input).await?;
        if created {
            self.push(job.request.kind, job.id).await;
        }
        Ok((job, created))
    }

    /// Index a job id for claiming. Also used by the reclaim monitor after it
    /// requeues a job whose worker went missing.
    pub async fn push(&self, kind: GenerationKind, id: JobId) {
        {
            let mut queues = self.queues.lock().await;
            queues.entry(kind).or_default().push_back(id);
        }
        self.work.notify_one();
    }

    /// Claim the oldest eligible job among `kinds` for `worker`.
    ///
    /// Returns `None` when nothing is claimable. The scan starts at a
    /// rotating offset into `kinds`; within a kind, order is strictly FIFO.
    pub async fn claim(&self, worker: &str, kinds: &[GenerationKind]) -> Option<Job> {
        if kinds.is_empty() {
            return None;
        }
        let offset = self.scan_offset.fetch_add(1, Ordering::Relaxed);
        let mut queues = self.queues.lock().await;
        for step in 0..kinds.len() {
            let kind = kinds[(offset + step) % kinds.len()];
            let Some(queue) = queues.get_mut(&kind) else {
                continue;
            };
            while let Some(id) = queue.pop_front() {
                if let Some(job) = self.store.claim(id, worker).await {
                    return Some(job);
                }
            }
        }
        None
    }

    /// Resolves when new work may be available.
    pub async fn work_available(&self) {
        self.work.notified().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use aiq_core::{GenerationRequest, JobState};
    use aiq_events::EventBus;

    fn queue() -> JobQueue {
        JobQueue::new(Arc::new(JobStore::new(EventBus::default())))
    }

    fn submission(kind: GenerationKind, ref_id: Option<&str>) -> SubmitJob {
        SubmitJob {
            request: GenerationRequest {
                kind,
                model: "gpt-x".to_string(),
                params: Default::default(),
            },
            ref_id: ref_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn submit_makes_job_claimable() {
        let queue = queue();
        let (job, created) = queue
            .submit(submission(GenerationKind::Chat, None))
            .await
            .unwrap();
        assert!(created);

        let claimed = queue.claim("w1", &[GenerationKind::Chat]).await.unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.state, JobState::Assigned);
    }

    #[tokio::test]
    async fn claim_is_fifo_within_kind() {
        let queue = queue();
        let mut ids = vec![];
        for _ in 0..3 {
            let (job, _) = queue
                .submit(submission(GenerationKind::Chat, None))
                .await
                .unwrap();
            ids.push(job.id);
        }

        for expected in ids {
            let claimed = queue.claim("w1", &[GenerationKind::Chat]).await.unwrap();
            assert_eq!(claimed.id, expected);
        }
        assert!(queue.claim("w1", &[GenerationKind::Chat]).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_ref_id_is_indexed_once() {
        let queue = queue();
        queue
            .submit(submission(GenerationKind::Chat, Some("ref-1")))
            .await
            .unwrap();
        queue
            .submit(submission(GenerationKind::Chat, Some("ref-1")))
            .await
            .unwrap();

        assert!(queue.claim("w1", &[GenerationKind::Chat]).await.is_some());
        assert!(queue.claim("w2", &[GenerationKind::Chat]).await.is_none());
    }

    #[tokio::test]
    async fn cancelled_entries_are_skipped() {
        let queue = queue();
        let (first, _) = queue
            .submit(submission(GenerationKind::Chat, None))
            .await
            .unwrap();
        let (second, _) = queue
            .submit(submission(GenerationKind::Chat, None))
            .await
            .unwrap();
        queue
            .store()
            .cancel(&crate::store::JobSelector::Id(first.id))
            .await
            .unwrap();

        let claimed = queue.claim("w1", &[GenerationKind::Chat]).await.unwrap();
        assert_eq!(claimed.id, second.id);
    }

    #[tokio::test]
    async fn claim_filters_by_kind() {
        let queue = queue();
        queue
            .submit(submission(GenerationKind::Image, None))
            .await
            .unwrap();

        assert!(queue.claim("w1", &[GenerationKind::Chat]).await.is_none());
        assert!(queue.claim("w1", &[GenerationKind::Image]).await.is_some());
    }

    #[tokio::test]
    async fn push_stores_permit_for_idle_worker() {
        let queue = queue();
        queue.push(GenerationKind::Chat, 1).await;

        // The permit from the push must complete the next wait immediately.
        tokio::time::timeout(Duration::from_millis(100), queue.work_available())
            .await
            .unwrap();
    }
}
