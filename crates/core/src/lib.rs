//! Shared types for the aiq dispatch engine.
//!
//! This crate has zero internal dependencies so every other crate (engine,
//! providers, events, api) can use it without cycles.

pub mod api_keys;
pub mod error;
pub mod job;
pub mod provider;
pub mod request;

pub use error::{DispatchError, DispatchResult};
pub use job::{AttemptError, Job, JobError, JobId, JobState, StatusSnapshot, SubmitJob};
pub use provider::{HealthState, ProviderDescriptor};
pub use request::{GenerationKind, GenerationRequest};
