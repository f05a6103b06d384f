//! Authentication and authorization middleware extractors.
//!
//! - [`auth::ApiKeyAuth`] -- Extracts the calling credential (API key or
//!   auth secret) and its granted scopes.
//! - [`auth::AdminAuth`] -- Requires the auth secret or the `admin` scope.
//! - [`auth::SecretAuth`] -- Requires the auth secret itself.

pub mod auth;
