//! In-memory job store, the single source of truth for job records.
//!
//! Every mutation takes the one write lock, validates the state transition
//! against [`aiq_core::job::state_machine`], and applies the whole change
//! before releasing. Readers get clones; nothing outside this module ever
//! holds a reference into the table.
//!
//! Terminal transitions signal a per-job [`Notify`] so blocking waiters wake
//! without polling, and every transition publishes a [`JobEvent`] on the bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, RwLock};

use aiq_core::job::state_machine;
use aiq_core::{
    AttemptError, DispatchError, DispatchResult, Job, JobError, JobId, JobState, SubmitJob,
};
use aiq_events::{EventBus, JobEvent};

// ---------------------------------------------------------------------------
// JobSelector
// ---------------------------------------------------------------------------

/// How a caller addresses a job: by server id or by its client `refId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSelector {
    Id(JobId),
    RefId(String),
}

impl std::fmt::Display for JobSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobSelector::Id(id) => write!(f, "{id}"),
            JobSelector::RefId(ref_id) => write!(f, "refId {ref_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Store internals
// ---------------------------------------------------------------------------

/// Aggregate queue/state counters for the stats endpoint.
#[derive(Debug, Clone, Default)]
pub struct StoreCounts {
    /// Queued jobs per generation kind (`"chat"`, `"image"`, `"speech"`).
    pub queued: HashMap<String, usize>,
    /// All jobs per lifecycle state.
    pub states: HashMap<String, usize>,
    /// Total jobs held by the store.
    pub total: usize,
}

struct StoreInner {
    jobs: HashMap<JobId, Job>,
    /// `refId` index. Entries are kept after the job resolves so a resubmit
    /// of the same `refId` returns the resolved job instead of a duplicate.
    by_ref: HashMap<String, JobId>,
    /// Per-job wakeup for blocking waiters, signalled at terminal transitions.
    notifiers: HashMap<JobId, Arc<Notify>>,
    next_id: JobId,
}

impl StoreInner {
    fn resolve_id(&self, selector: &JobSelector) -> DispatchResult<JobId> {
        let id = match selector {
            JobSelector::Id(id) => Some(*id).filter(|id| self.jobs.contains_key(id)),
            JobSelector::RefId(ref_id) => self.by_ref.get(ref_id).copied(),
        };
        id.ok_or_else(|| DispatchError::JobNotFound(selector.to_string()))
    }

    fn find(&self, selector: &JobSelector) -> DispatchResult<&Job> {
        let id = self.resolve_id(selector)?;
        self.jobs.get(&id).ok_or_else(|| DispatchError::job_not_found(id))
    }
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

/// The job table plus its `refId` index and waiter registry, all behind one
/// lock so every transition is atomic.
pub struct JobStore {
    inner: RwLock<StoreInner>,
    events: EventBus,
}

impl JobStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                jobs: HashMap::new(),
                by_ref: HashMap::new(),
                notifiers: HashMap::new(),
                next_id: 1,
            }),
            events,
        }
    }

    /// The bus this store publishes lifecycle events on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn emit(&self, job: &Job) {
        self.events.publish(JobEvent::state_change(job.clone()));
    }

    /// Create a queued job, or return the existing one when the `refId` is
    /// already known. The boolean is `true` only when a new job was created;
    /// callers use it to decide whether to index the job for claiming.
    pub async fn submit(&self, input: SubmitJob) -> DispatchResult<(Job, bool)> {
        input.request.validate()?;
        if let Some(ref_id) = input.ref_id.as_deref() {
            if ref_id.is_empty() {
                return Err(DispatchError::Validation("refId must not be empty".into()));
            }
        }
        if let Some(url) = input.reply_to.as_deref() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DispatchError::Validation(
                    "replyTo must be an http(s) URL".into(),
                ));
            }
        }

        let job = {
            let mut inner = self.inner.write().await;

            if let Some(ref_id) = input.ref_id.as_deref() {
                if let Some(existing) = inner.by_ref.get(ref_id).copied() {
                    let job = inner
                        .jobs
                        .get(&existing)
                        .ok_or_else(|| DispatchError::job_not_found(existing))?;
                    return Ok((job.clone(), false));
                }
            }

            let id = inner.next_id;
            inner.next_id += 1;

            let job = Job {
                id,
                ref_id: input.ref_id.clone(),
                tag: input.tag,
                requested_provider: input.provider,
                reply_to: input.reply_to,
                request: input.request,
                state: JobState::Queued,
                provider: None,
                worker: None,
                attempt_count: 0,
                attempts: vec![],
                result: None,
                error: None,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
            };

            inner.jobs.insert(id, job.clone());
            if let Some(ref_id) = input.ref_id {
                inner.by_ref.insert(ref_id, id);
            }
            inner.notifiers.insert(id, Arc::new(Notify::new()));
            job
        };

        self.emit(&job);
        Ok((job, true))
    }

    pub async fn get(&self, id: JobId) -> DispatchResult<Job> {
        self.lookup(&JobSelector::Id(id)).await
    }

    pub async fn lookup(&self, selector: &JobSelector) -> DispatchResult<Job> {
        let inner = self.inner.read().await;
        inner.find(selector).cloned()
    }

    /// Compare-and-swap a job from `Queued` to `Assigned` for `worker`.
    ///
    /// Returns `None` when the job is gone or no longer queued (cancelled, or
    /// won by another worker); the queue drops such entries and moves on.
    pub async fn claim(&self, id: JobId, worker: &str) -> Option<Job> {
        let job = {
            let mut inner = self.inner.write().await;
            let job = inner.jobs.get_mut(&id)?;
            if job.state != JobState::Queued {
                return None;
            }
            job.state = JobState::Assigned;
            job.worker = Some(worker.to_string());
            job.clone()
        };
        self.emit(&job);
        Some(job)
    }

    /// Move a claimed job into `Executing`. `started_at` is set on the first
    /// execution only and survives reclaims.
    pub async fn start(&self, id: JobId) -> DispatchResult<Job> {
        let job = {
            let mut inner = self.inner.write().await;
            let job = inner.jobs.get_mut(&id).ok_or_else(|| DispatchError::job_not_found(id))?;
            state_machine::validate_transition(job.state, JobState::Executing)?;
            job.state = JobState::Executing;
            job.started_at.get_or_insert_with(Utc::now);
            job.clone()
        };
        self.emit(&job);
        Ok(job)
    }

    /// Record that a provider attempt is starting and return the new attempt
    /// count. Conflicts when the job is not `Executing`, which tells a worker
    /// it has lost ownership (the job was reclaimed out from under it).
    pub async fn begin_attempt(&self, id: JobId, provider: &str) -> DispatchResult<u32> {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(&id).ok_or_else(|| DispatchError::job_not_found(id))?;
        if job.state != JobState::Executing {
            return Err(DispatchError::Conflict(format!(
                "job {id} is {}, not Executing",
                job.state
            )));
        }
        job.attempt_count += 1;
        job.provider = Some(provider.to_string());
        Ok(job.attempt_count)
    }

    /// Append a failed attempt to the job's history. Same ownership guard as
    /// [`JobStore::begin_attempt`].
    pub async fn record_attempt_error(
        &self,
        id: JobId,
        provider: &str,
        detail: &str,
    ) -> DispatchResult<()> {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(&id).ok_or_else(|| DispatchError::job_not_found(id))?;
        if job.state != JobState::Executing {
            return Err(DispatchError::Conflict(format!(
                "job {id} is {}, not Executing",
                job.state
            )));
        }
        job.attempts.push(AttemptError {
            provider: provider.to_string(),
            error: detail.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Terminal success: record the provider response and wake waiters.
    pub async fn complete(&self, id: JobId, result: serde_json::Value) -> DispatchResult<Job> {
        let (job, notify) = {
            let mut inner = self.inner.write().await;
            let job = inner.jobs.get_mut(&id).ok_or_else(|| DispatchError::job_not_found(id))?;
            state_machine::validate_transition(job.state, JobState::Completed)?;
            job.state = JobState::Completed;
            job.result = Some(result);
            job.completed_at = Some(Utc::now());
            let job = job.clone();
            let notify = inner.notifiers.get(&id).cloned();
            (job, notify)
        };
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
        self.emit(&job);
        Ok(job)
    }

    /// Terminal failure: record the final error and wake waiters. Valid from
    /// `Executing` and also from `Assigned` (a reclaim that has already
    /// exhausted its attempts).
    pub async fn fail(&self, id: JobId, error: JobError) -> DispatchResult<Job> {
        let (job, notify) = {
            let mut inner = self.inner.write().await;
            let job = inner.jobs.get_mut(&id).ok_or_else(|| DispatchError::job_not_found(id))?;
            state_machine::validate_transition(job.state, JobState::Failed)?;
            job.state = JobState::Failed;
            job.error = Some(error);
            job.completed_at = Some(Utc::now());
            let job = job.clone();
            let notify = inner.notifiers.get(&id).cloned();
            (job, notify)
        };
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
        self.emit(&job);
        Ok(job)
    }

    /// Cancel a job that is still waiting in the queue. Conflicts once a
    /// worker has claimed it or it has already resolved.
    pub async fn cancel(&self, selector: &JobSelector) -> DispatchResult<Job> {
        let (job, notify) = {
            let mut inner = self.inner.write().await;
            let id = inner.resolve_id(selector)?;
            let job = inner.jobs.get_mut(&id).ok_or_else(|| DispatchError::job_not_found(id))?;
            state_machine::validate_transition(job.state, JobState::Cancelled)?;
            job.state = JobState::Cancelled;
            job.completed_at = Some(Utc::now());
            let job = job.clone();
            let notify = inner.notifiers.get(&id).cloned();
            (job, notify)
        };
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
        self.emit(&job);
        Ok(job)
    }

    /// Return a bound job to `Queued`, clearing its worker and provider while
    /// keeping the attempt history. Published as `"job.reclaimed"` so bus
    /// subscribers can tell a reclaim apart from a fresh submission.
    pub async fn requeue(&self, id: JobId) -> DispatchResult<Job> {
        let job = {
            let mut inner = self.inner.write().await;
            let job = inner.jobs.get_mut(&id).ok_or_else(|| DispatchError::job_not_found(id))?;
            state_machine::validate_transition(job.state, JobState::Queued)?;
            job.state = JobState::Queued;
            job.worker = None;
            job.provider = None;
            job.clone()
        };
        self.events.publish(JobEvent::new("job.reclaimed", job.clone()));
        Ok(job)
    }

    /// Block until the job reaches a terminal state or `timeout` elapses,
    /// returning the latest snapshot either way. Waiters never poll: they
    /// park on the job's notifier and re-check on wakeup.
    pub async fn wait(&self, selector: &JobSelector, timeout: Duration) -> DispatchResult<Job> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let (job, notify) = {
                let inner = self.inner.read().await;
                let job = inner.find(selector)?.clone();
                let notify = inner.notifiers.get(&job.id).cloned();
                (job, notify)
            };
            if job.is_terminal() {
                return Ok(job);
            }
            let Some(notify) = notify else {
                return Ok(job);
            };

            let notified = notify.notified();
            tokio::pin!(notified);
            // Register interest before re-checking so a terminal transition
            // landing between the check and the await is never lost.
            notified.as_mut().enable();
            {
                let inner = self.inner.read().await;
                if inner.find(selector)?.is_terminal() {
                    continue;
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => {
                    return self.lookup(selector).await;
                }
            }
        }
    }

    /// Snapshot of every job currently bound to a worker. The reclaim monitor
    /// scans these against worker heartbeats.
    pub async fn bound_jobs(&self) -> Vec<Job> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .values()
            .filter(|job| matches!(job.state, JobState::Assigned | JobState::Executing))
            .cloned()
            .collect()
    }

    pub async fn counts(&self) -> StoreCounts {
        let inner = self.inner.read().await;
        let mut counts = StoreCounts {
            total: inner.jobs.len(),
            ..Default::default()
        };
        for job in inner.jobs.values() {
            *counts.states.entry(job.state.as_str().to_string()).or_insert(0) += 1;
            if job.state == JobState::Queued {
                *counts
                    .queued
                    .entry(job.request.kind.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
