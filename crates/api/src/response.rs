//! Response envelope for API handlers.
//!
//! Endpoints beyond the bare submission/status surface wrap their payloads
//! in a `{ "data": ... }` envelope. Using [`DataResponse`] rather than an
//! ad-hoc `json!` keeps the payload type visible in handler signatures.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
