//! Worker pool: claims jobs, drives provider attempts, reclaims lost jobs.
//!
//! Each worker is an owned task on a child cancellation token. While idle it
//! parks on the queue's work signal; while executing it keeps its heartbeat
//! fresh so the reclaim monitor leaves its job alone. Failover happens inside
//! the worker: a failed attempt re-enters provider selection on the same job,
//! excluding providers that already failed it, without a round-trip through
//! the queue.
//!
//! Cancelling a worker drains it: it finishes the job in hand, then exits and
//! deregisters. The reclaim monitor covers the other path, where a worker
//! dies without draining and its bound jobs must be requeued or failed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aiq_core::request::ALL_KINDS;
use aiq_core::{DispatchError, DispatchResult, GenerationKind, Job, JobError, JobId};
use aiq_providers::ProviderClient;

use crate::config::DispatchConfig;
use crate::queue::JobQueue;
use crate::router::ProviderRouter;
use crate::store::JobStore;

// ---------------------------------------------------------------------------
// Worker state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerStatus {
    Idle,
    Busy,
    /// Finishing its current job, then exiting.
    Draining,
}

impl WorkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Idle => "Idle",
            WorkerStatus::Busy => "Busy",
            WorkerStatus::Draining => "Draining",
        }
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one worker for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSnapshot {
    pub name: String,
    pub status: WorkerStatus,
    pub kinds: Vec<GenerationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_job: Option<JobId>,
    pub last_heartbeat: DateTime<Utc>,
    /// Provider attempts finished by this worker, success or failure.
    pub processed: u64,
    /// Jobs this worker resolved as `Completed`.
    pub completed: u64,
    /// Jobs this worker resolved as `Failed`.
    pub failed: u64,
    pub started_at: DateTime<Utc>,
}

struct WorkerState {
    name: String,
    kinds: Vec<GenerationKind>,
    status: WorkerStatus,
    current_job: Option<JobId>,
    last_heartbeat: DateTime<Utc>,
    processed: u64,
    completed: u64,
    failed: u64,
    started_at: DateTime<Utc>,
    token: CancellationToken,
}

impl WorkerState {
    fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            name: self.name.clone(),
            status: self.status,
            kinds: self.kinds.clone(),
            current_job: self.current_job,
            last_heartbeat: self.last_heartbeat,
            processed: self.processed,
            completed: self.completed,
            failed: self.failed,
            started_at: self.started_at,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

pub struct WorkerPool {
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    router: Arc<ProviderRouter>,
    client: Arc<dyn ProviderClient>,
    config: DispatchConfig,
    workers: RwLock<HashMap<String, WorkerState>>,
    shutdown_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn the configured workers and the reclaim monitor.
    pub async fn start(
        store: Arc<JobStore>,
        queue: Arc<JobQueue>,
        router: Arc<ProviderRouter>,
        client: Arc<dyn ProviderClient>,
        config: DispatchConfig,
    ) -> DispatchResult<Arc<Self>> {
        config.validate()?;
        let pool = Arc::new(Self {
            store,
            queue,
            router,
            client,
            config: config.clone(),
            workers: RwLock::new(HashMap::new()),
            shutdown_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });

        for index in 1..=config.worker_count {
            pool.spawn_worker(format!("worker-{index}"), ALL_KINDS.to_vec())
                .await;
        }

        let monitor = tokio::spawn(run_reclaim_monitor(
            pool.clone(),
            pool.shutdown_token.child_token(),
        ));
        pool.tasks.lock().await.push(monitor);

        info!(workers = config.worker_count, "Worker pool started");
        Ok(pool)
    }

    async fn spawn_worker(self: &Arc<Self>, name: String, kinds: Vec<GenerationKind>) {
        let token = self.shutdown_token.child_token();
        let state = WorkerState {
            name: name.clone(),
            kinds: kinds.clone(),
            status: WorkerStatus::Idle,
            current_job: None,
            last_heartbeat: Utc::now(),
            processed: 0,
            completed: 0,
            failed: 0,
            started_at: Utc::now(),
            token: token.clone(),
        };
        self.workers.write().await.insert(name.clone(), state);

        let handle = tokio::spawn(run_worker(self.clone(), name, kinds, token));
        self.tasks.lock().await.push(handle);
    }

    /// Ask a worker to drain. It finishes the job in hand (a failover retry
    /// still belongs to the job in hand), then exits and deregisters.
    pub async fn cancel_worker(&self, name: &str) -> DispatchResult<WorkerSnapshot> {
        let mut workers = self.workers.write().await;
        let worker = workers
            .get_mut(name)
            .ok_or_else(|| DispatchError::WorkerNotFound(name.to_string()))?;
        worker.status = WorkerStatus::Draining;
        worker.token.cancel();
        info!(worker = %name, "Worker drain requested");
        Ok(worker.snapshot())
    }

    /// Snapshots of all registered workers, sorted by name.
    pub async fn stats(&self) -> Vec<WorkerSnapshot> {
        let workers = self.workers.read().await;
        let mut all: Vec<WorkerSnapshot> = workers.values().map(WorkerState::snapshot).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Drain everything and wait for the tasks to finish, bounded per task by
    /// the configured shutdown deadline.
    pub async fn shutdown(&self) {
        info!("Worker pool shutting down");
        self.shutdown_token.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if timeout(self.config.shutdown_timeout, task).await.is_err() {
                warn!("Worker task did not stop within the shutdown deadline");
            }
        }
        info!("Worker pool stopped");
    }

    // -- Worker bookkeeping ---------------------------------------------------

    async fn touch_heartbeat(&self, name: &str) {
        if let Some(worker) = self.workers.write().await.get_mut(name) {
            worker.last_heartbeat = Utc::now();
        }
    }

    async fn set_busy(&self, name: &str, job: JobId) {
        if let Some(worker) = self.workers.write().await.get_mut(name) {
            if worker.status != WorkerStatus::Draining {
                worker.status = WorkerStatus::Busy;
            }
            worker.current_job = Some(job);
            worker.last_heartbeat = Utc::now();
        }
    }

    async fn set_idle(&self, name: &str) {
        if let Some(worker) = self.workers.write().await.get_mut(name) {
            if worker.status != WorkerStatus::Draining {
                worker.status = WorkerStatus::Idle;
            }
            worker.current_job = None;
            worker.last_heartbeat = Utc::now();
        }
    }

    async fn note_attempt(&self, name: &str) {
        if let Some(worker) = self.workers.write().await.get_mut(name) {
            worker.processed += 1;
        }
    }

    async fn note_resolution(&self, name: &str, completed: bool) {
        if let Some(worker) = self.workers.write().await.get_mut(name) {
            if completed {
                worker.completed += 1;
            } else {
                worker.failed += 1;
            }
        }
    }

    async fn deregister(&self, name: &str) {
        self.workers.write().await.remove(name);
        info!(worker = %name, "Worker stopped");
    }

    // -- Job execution ----------------------------------------------------------

    /// Keep the worker's heartbeat fresh while the job runs, so a slow
    /// provider call never looks like a dead worker.
    async fn run_job(
        &self,
        worker: &str,
        job: Job,
        heartbeat: &mut tokio::time::Interval,
    ) {
        let execute = self.execute_job(worker, job);
        tokio::pin!(execute);
        loop {
            tokio::select! {
                _ = &mut execute => break,
                _ = heartbeat.tick() => self.touch_heartbeat(worker).await,
            }
        }
    }

    /// Run provider attempts for one claimed job until it resolves.
    ///
    /// Every store mutation here can conflict if the reclaim monitor took the
    /// job away; the worker then stops reporting and moves on, and the new
    /// owner rebuilds the attempt picture from the store.
    async fn execute_job(&self, worker: &str, job: Job) {
        let id = job.id;
        let job = match self.store.start(id).await {
            Ok(job) => job,
            Err(err) => {
                warn!(job_id = id, error = %err, "Could not start claimed job");
                return;
            }
        };

        let pinned = job.requested_provider.clone();
        let mut failed_providers: Vec<String> =
            job.attempts.iter().map(|a| a.provider.clone()).collect();

        loop {
            let provider = match self
                .router
                .select(&job.request, pinned.as_deref(), &failed_providers)
                .await
            {
                Ok(provider) => provider,
                Err(cause) => {
                    self.resolve_failed(worker, id, cause).await;
                    return;
                }
            };

            let attempt = match self.store.begin_attempt(id, &provider.name).await {
                Ok(count) => count,
                Err(err) => {
                    self.router.release(&provider.name).await;
                    debug!(job_id = id, error = %err, "Job ownership lost before dispatch");
                    return;
                }
            };
            info!(
                job_id = id,
                provider = %provider.name,
                attempt,
                "Dispatching job to provider"
            );

            let outcome = self.client.execute(&provider, &job.request).await;
            self.router.release(&provider.name).await;
            self.note_attempt(worker).await;

            match outcome {
                Ok(result) => {
                    self.router.record_outcome(&provider.name, true).await;
                    match self.store.complete(id, result).await {
                        Ok(_) => {
                            info!(job_id = id, provider = %provider.name, "Job completed");
                            self.note_resolution(worker, true).await;
                        }
                        Err(err) => {
                            warn!(job_id = id, error = %err, "Completion discarded, job was reclaimed");
                        }
                    }
                    return;
                }
                Err(err) => {
                    let detail = err.to_string();
                    self.router.record_outcome(&provider.name, false).await;
                    warn!(
                        job_id = id,
                        provider = %provider.name,
                        attempt,
                        error = %detail,
                        "Provider attempt failed"
                    );
                    if self
                        .store
                        .record_attempt_error(id, &provider.name, &detail)
                        .await
                        .is_err()
                    {
                        return;
                    }
                    failed_providers.push(provider.name.clone());
                    if attempt >= self.config.max_attempts {
                        let cause = DispatchError::ProviderRequestFailed {
                            provider: provider.name.clone(),
                            detail,
                        };
                        self.resolve_failed(worker, id, cause).await;
                        return;
                    }
                }
            }
        }
    }

    /// Resolve a job as failed, folding the attempt history into the final
    /// error so callers see every provider that was tried.
    async fn resolve_failed(&self, worker: &str, id: JobId, cause: DispatchError) {
        let attempts = match self.store.get(id).await {
            Ok(job) => job.attempts,
            Err(_) => Vec::new(),
        };
        let error = match attempts.last() {
            None => JobError::from_dispatch(&cause),
            Some(last) => {
                let history = attempts
                    .iter()
                    .map(|a| format!("{}: {}", a.provider, a.error))
                    .collect::<Vec<_>>()
                    .join("; ");
                JobError::from_dispatch(&DispatchError::ProviderRequestFailed {
                    provider: last.provider.clone(),
                    detail: format!("{} attempts failed: {history}", attempts.len()),
                })
            }
        };

        match self.store.fail(id, error).await {
            Ok(_) => {
                warn!(job_id = id, cause = %cause, "Job failed");
                self.note_resolution(worker, false).await;
            }
            Err(err) => {
                warn!(job_id = id, error = %err, "Failure discarded, job was reclaimed");
            }
        }
    }

    // -- Reclaim ---------------------------------------------------------------

    /// Requeue or fail jobs bound to workers that are gone or have stopped
    /// heartbeating.
    async fn reclaim_lost_jobs(&self) {
        let bound = self.store.bound_jobs().await;
        if bound.is_empty() {
            return;
        }
        let Ok(staleness) = chrono::Duration::from_std(self.config.heartbeat_timeout) else {
            return;
        };
        let cutoff = Utc::now() - staleness;

        let mut lost: Vec<Job> = Vec::new();
        {
            let workers = self.workers.read().await;
            for job in bound {
                let alive = job
                    .worker
                    .as_deref()
                    .and_then(|name| workers.get(name))
                    .map(|worker| worker.last_heartbeat >= cutoff)
                    .unwrap_or(false);
                if !alive {
                    lost.push(job);
                }
            }
        }

        for job in lost {
            self.reclaim(job).await;
        }
    }

    async fn reclaim(&self, job: Job) {
        let worker = job.worker.as_deref().unwrap_or("unknown").to_string();
        if job.attempt_count >= self.config.max_attempts {
            let cause = DispatchError::Internal(format!(
                "worker {worker} was lost with no attempts left"
            ));
            match self.store.fail(job.id, JobError::from_dispatch(&cause)).await {
                Ok(_) => warn!(job_id = job.id, worker = %worker, "Job failed after losing its worker"),
                Err(err) => debug!(job_id = job.id, error = %err, "Reclaim raced a resolution"),
            }
            return;
        }
        match self.store.requeue(job.id).await {
            Ok(requeued) => {
                self.queue.push(requeued.request.kind, requeued.id).await;
                warn!(job_id = job.id, worker = %worker, "Reclaimed job from lost worker");
            }
            Err(err) => {
                debug!(job_id = job.id, error = %err, "Reclaim raced a resolution");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker and monitor tasks
// ---------------------------------------------------------------------------

async fn run_worker(
    pool: Arc<WorkerPool>,
    name: String,
    kinds: Vec<GenerationKind>,
    token: CancellationToken,
) {
    info!(worker = %name, "Worker started");
    let mut heartbeat = tokio::time::interval(pool.config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        if token.is_cancelled() {
            break;
        }
        pool.touch_heartbeat(&name).await;

        match pool.queue.claim(&name, &kinds).await {
            Some(job) => {
                pool.set_busy(&name, job.id).await;
                pool.run_job(&name, job, &mut heartbeat).await;
                pool.set_idle(&name).await;
            }
            None => {
                tokio::select! {
                    _ = pool.queue.work_available() => {}
                    _ = token.cancelled() => break,
                    _ = heartbeat.tick() => {}
                }
            }
        }
    }

    pool.deregister(&name).await;
}

async fn run_reclaim_monitor(pool: Arc<WorkerPool>, token: CancellationToken) {
    info!("Reclaim monitor started");
    let mut ticker = tokio::time::interval(pool.config.reclaim_check_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => pool.reclaim_lost_jobs().await,
        }
    }
    info!("Reclaim monitor stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
