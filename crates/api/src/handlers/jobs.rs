//! Handlers for job inspection and cancellation.
//!
//! Jobs are addressed by server id (`jobId`) or caller reference (`refId`);
//! `jobId` wins when both are present. `/status` and `/wait` return the
//! compact snapshot; `/jobs` returns the full record including the attempt
//! history.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use aiq_core::api_keys::scopes;
use aiq_core::{JobId, StatusSnapshot};
use aiq_engine::JobSelector;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AdminAuth, ApiKeyAuth};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a job selector from the optional id pair shared by the query
/// endpoints and the cancel body.
fn selector(job_id: Option<JobId>, ref_id: Option<&str>) -> AppResult<JobSelector> {
    match (job_id, ref_id) {
        (Some(id), _) => Ok(JobSelector::Id(id)),
        (None, Some(ref_id)) => Ok(JobSelector::RefId(ref_id.to_string())),
        (None, None) => Err(AppError::BadRequest(
            "Provide a jobId or refId parameter".into(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Query selecting one job by `jobId` or `refId`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub job_id: Option<JobId>,
    pub ref_id: Option<String>,
}

impl JobQuery {
    fn selector(&self) -> AppResult<JobSelector> {
        selector(self.job_id, self.ref_id.as_deref())
    }
}

/// GET /status?jobId=|refId=
///
/// Current snapshot of one job. Never blocks.
pub async fn status(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> AppResult<impl IntoResponse> {
    auth.require(scopes::JOBS_READ)?;

    let job = state.store.lookup(&query.selector()?).await?;
    Ok(Json(StatusSnapshot::from(&job)))
}

// ---------------------------------------------------------------------------
// Wait
// ---------------------------------------------------------------------------

/// Query for the blocking wait: the job selector plus an optional timeout
/// in seconds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitQuery {
    pub job_id: Option<JobId>,
    pub ref_id: Option<String>,
    /// Seconds to block; defaults to `wait_default`, capped at `wait_max`.
    pub timeout: Option<u64>,
}

/// GET /wait?jobId=|refId=&timeout=
///
/// Block until the job reaches a terminal state or the timeout passes, then
/// return its snapshot. A timeout is not an error: the response simply
/// carries the job's current (non-terminal) state.
pub async fn wait(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Query(query): Query<WaitQuery>,
) -> AppResult<impl IntoResponse> {
    auth.require(scopes::JOBS_READ)?;

    let dispatch = &state.config.dispatch;
    let timeout = match query.timeout {
        None => dispatch.wait_default,
        Some(secs) => Duration::from_secs(secs).min(dispatch.wait_max),
    };

    let job = state
        .store
        .wait(&selector(query.job_id, query.ref_id.as_deref())?, timeout)
        .await?;
    Ok(Json(StatusSnapshot::from(&job)))
}

// ---------------------------------------------------------------------------
// Full record
// ---------------------------------------------------------------------------

/// GET /jobs?jobId=|refId=
///
/// The full job record: request, assigned worker and provider, attempt
/// history, result or final error, and timestamps.
pub async fn get_job(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> AppResult<impl IntoResponse> {
    auth.require(scopes::JOBS_READ)?;

    let job = state.store.lookup(&query.selector()?).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelJob {
    pub job_id: Option<JobId>,
    pub ref_id: Option<String>,
}

/// POST /jobs/cancel
///
/// Cancel a job that is still queued. Jobs already claimed by a worker (or
/// already resolved) respond 409 and are left untouched.
pub async fn cancel_job(
    AdminAuth(_auth): AdminAuth,
    State(state): State<AppState>,
    Json(body): Json<CancelJob>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .store
        .cancel(&selector(body.job_id, body.ref_id.as_deref())?)
        .await?;

    tracing::info!(job_id = job.id, "Job cancelled");

    Ok(Json(DataResponse {
        data: StatusSnapshot::from(&job),
    }))
}
