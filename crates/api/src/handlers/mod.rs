//! Request handlers for the dispatch API.
//!
//! Each submodule provides the async handler functions for one slice of the
//! surface. Handlers delegate to the engine crates and map errors via
//! [`crate::error::AppError`].

pub mod apikeys;
pub mod jobs;
pub mod providers;
pub mod queue;
pub mod workers;
