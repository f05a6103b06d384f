//! Handlers for job submission: asynchronous (`/queue`) and synchronous
//! (`/generate`).
//!
//! Both require the `jobs:submit` scope. Submission is idempotent on
//! `refId`: a duplicate returns the existing job instead of creating one.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use aiq_core::api_keys::scopes;
use aiq_core::{JobError, JobId, JobState, StatusSnapshot, SubmitJob};
use aiq_engine::JobSelector;

use crate::error::AppResult;
use crate::middleware::auth::ApiKeyAuth;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Submission acknowledgement: the server-assigned id plus the caller's
/// `refId`, when one was supplied.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueuedJob {
    id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_id: Option<String>,
}

/// POST /queue
///
/// Enqueue a generation job and return immediately. Responds 201 with the
/// job id; resubmitting a known `refId` returns the existing job's id.
pub async fn submit(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    auth.require(scopes::JOBS_SUBMIT)?;

    let (job, created) = state.queue.submit(input).await?;

    if created {
        tracing::info!(
            job_id = job.id,
            kind = %job.request.kind,
            model = %job.request.model,
            "Job queued",
        );
    } else {
        tracing::debug!(job_id = job.id, "Duplicate refId, returning existing job");
    }

    let body = QueuedJob {
        id: job.id,
        ref_id: job.ref_id,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

// ---------------------------------------------------------------------------
// Generate (synchronous)
// ---------------------------------------------------------------------------

/// POST /generate
///
/// Enqueue a job and block until it resolves or the synchronous deadline
/// passes. Completed jobs return 200 with the result snapshot; failed jobs
/// surface their recorded error; a job still running at the deadline
/// returns 202 with the current snapshot so the caller can poll `/status`.
pub async fn generate(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<Response> {
    auth.require(scopes::JOBS_SUBMIT)?;

    let (job, created) = state.queue.submit(input).await?;
    if created {
        tracing::info!(
            job_id = job.id,
            model = %job.request.model,
            "Synchronous generation started",
        );
    }

    let selector = JobSelector::Id(job.id);
    let job = state
        .store
        .wait(&selector, state.config.dispatch.sync_timeout)
        .await?;

    let snapshot = StatusSnapshot::from(&job);
    let response = match job.state {
        JobState::Completed => {
            (StatusCode::OK, Json(DataResponse { data: snapshot })).into_response()
        }
        JobState::Failed => {
            let error = job.error.clone().unwrap_or_else(|| JobError {
                code: "INTERNAL".into(),
                message: "Job failed without a recorded error".into(),
            });
            let status = if error.code == "NO_PROVIDER_AVAILABLE" {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_GATEWAY
            };
            let body = json!({ "error": error.message, "code": error.code });
            (status, Json(body)).into_response()
        }
        JobState::Cancelled => {
            let body = json!({
                "error": "Job was cancelled before execution",
                "code": "CONFLICT",
            });
            (StatusCode::CONFLICT, Json(body)).into_response()
        }
        // Still pending at the deadline.
        _ => (StatusCode::ACCEPTED, Json(DataResponse { data: snapshot })).into_response(),
    };

    Ok(response)
}
