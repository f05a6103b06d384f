//! Provider clients: the trait the engine executes through, plus the
//! OpenAI-style HTTP implementation used in production.

pub mod client;
pub mod http;

pub use client::{ProviderClient, ProviderError};
pub use http::HttpProviderClient;
