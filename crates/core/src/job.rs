//! Job record and lifecycle state machine.
//!
//! The state machine is the contract every mutation of a job must satisfy;
//! the store validates each transition against it before applying anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::request::GenerationRequest;

/// Server-assigned job identifier. Monotonically increasing within a process.
pub type JobId = i64;

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
///
/// Serialized with the literal variant names (`"Queued"`, `"Executing"`, ...)
/// which are also the values returned by the status endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Submitted and eligible for claim.
    Queued,
    /// Claimed by exactly one worker, not yet dispatched to a provider.
    Assigned,
    /// Provider selection or provider call in flight.
    Executing,
    /// Terminal: result recorded.
    Completed,
    /// Terminal: all attempts exhausted or an immediate failure.
    Failed,
    /// Terminal: administratively cancelled while still queued.
    Cancelled,
}

/// Terminal states. A job in one of these never changes again.
pub const TERMINAL_STATES: [JobState; 3] =
    [JobState::Completed, JobState::Failed, JobState::Cancelled];

impl JobState {
    pub fn is_terminal(self) -> bool {
        TERMINAL_STATES.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "Queued",
            JobState::Assigned => "Assigned",
            JobState::Executing => "Executing",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
            JobState::Cancelled => "Cancelled",
        }
    }

    /// Short human-readable phrase for status responses.
    pub fn description(self) -> &'static str {
        match self {
            JobState::Queued => "Waiting in queue",
            JobState::Assigned => "Claimed by a worker",
            JobState::Executing => "Generation in progress",
            JobState::Completed => "Generation completed",
            JobState::Failed => "Generation failed",
            JobState::Cancelled => "Cancelled before execution",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::JobState::{self, *};
    use crate::error::DispatchError;

    /// Returns the set of valid target states reachable from `from`.
    ///
    /// Terminal states return an empty slice because no further transitions
    /// are allowed. `Assigned -> Queued` and `Executing -> Queued` are the
    /// reclaim edges taken when a worker dies mid-job; `Assigned -> Failed`
    /// covers a reclaim that has already exhausted its attempts.
    pub fn valid_transitions(from: JobState) -> &'static [JobState] {
        match from {
            Queued => &[Assigned, Cancelled],
            Assigned => &[Executing, Queued, Failed],
            Executing => &[Completed, Failed, Queued],
            Completed | Failed | Cancelled => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: JobState, to: JobState) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, producing a conflict error for invalid
    /// ones (including any transition out of a terminal state).
    pub fn validate_transition(from: JobState, to: JobState) -> Result<(), DispatchError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(DispatchError::Conflict(format!(
                "invalid transition: {from} -> {to}"
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// One failed provider attempt, retained on the job even if a later attempt
/// succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptError {
    pub provider: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Final error recorded on a `Failed` job.
///
/// Serializes as `{errorCode, message}`, the shape carried in the
/// `responseStatus` field of status responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    #[serde(rename = "errorCode")]
    pub code: String,
    pub message: String,
}

impl JobError {
    pub fn from_dispatch(err: &DispatchError) -> Self {
        JobError {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// The full job record owned by the store. Snapshots handed out are clones;
/// only the store mutates the live record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub ref_id: Option<String>,
    pub tag: Option<String>,
    /// Explicit provider pin supplied at submission.
    pub requested_provider: Option<String>,
    pub reply_to: Option<String>,
    pub request: GenerationRequest,
    pub state: JobState,
    /// Provider chosen for the current (or final) attempt.
    pub provider: Option<String>,
    /// Worker currently bound to the job, cleared on requeue.
    pub worker: Option<String>,
    /// Provider attempts started, including a successful one.
    pub attempt_count: u32,
    /// Failed attempts, oldest first.
    pub attempts: Vec<AttemptError>,
    pub result: Option<serde_json::Value>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Projection of a job onto the wire shape shared by the status endpoint,
/// the blocking wait, and webhook deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub job_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    pub state: JobState,
    /// Short human-readable phrase matching the state.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl From<&Job> for StatusSnapshot {
    fn from(job: &Job) -> Self {
        StatusSnapshot {
            job_id: job.id,
            ref_id: job.ref_id.clone(),
            state: job.state,
            status: job.state.description().to_string(),
            response_status: job.error.clone(),
            result: job.result.clone(),
        }
    }
}

/// Submission input. Everything except the request itself is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJob {
    pub request: GenerationRequest,
    pub ref_id: Option<String>,
    /// Pin to a named provider instead of routed selection.
    pub provider: Option<String>,
    pub tag: Option<String>,
    pub reply_to: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
