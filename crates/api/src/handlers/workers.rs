//! Handlers for worker pool observation and drain control.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use aiq_engine::{StoreCounts, WorkerSnapshot};

use crate::error::AppResult;
use crate::middleware::auth::AdminAuth;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Queue and job-table counters, as exposed on the wire.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCounts {
    /// Queued jobs per generation kind.
    pub queued: HashMap<String, usize>,
    /// All jobs per lifecycle state.
    pub states: HashMap<String, usize>,
    pub total: usize,
}

impl From<StoreCounts> for QueueCounts {
    fn from(counts: StoreCounts) -> Self {
        QueueCounts {
            queued: counts.queued,
            states: counts.states,
            total: counts.total,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    pub workers: Vec<WorkerSnapshot>,
    pub queue_counts: QueueCounts,
}

/// GET /workers/stats
///
/// Per-worker snapshots (status, current job, counters) plus aggregate
/// queue and job-state counts.
pub async fn worker_stats(
    AdminAuth(_auth): AdminAuth,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let workers = state.workers.stats().await;
    let counts = state.store.counts().await;

    Ok(Json(DataResponse {
        data: WorkerStats {
            workers,
            queue_counts: counts.into(),
        },
    }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CancelWorker {
    pub worker: String,
}

/// POST /workers/cancel
///
/// Ask a worker to drain: it finishes its current job, stops claiming new
/// ones, and deregisters. Responds 202 with the worker already marked
/// `Draining`; the drain itself completes asynchronously.
pub async fn cancel_worker(
    AdminAuth(_auth): AdminAuth,
    State(state): State<AppState>,
    Json(body): Json<CancelWorker>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.workers.cancel_worker(&body.worker).await?;

    tracing::info!(worker = %body.worker, "Worker drain accepted");

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: snapshot })))
}
