//! aiq event bus and notification infrastructure.
//!
//! Building blocks for the engine's event flow:
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: the canonical job lifecycle event.
//! - [`delivery`]: external delivery channels (webhook).
//! - [`ReplyToNotifier`]: background subscriber that delivers terminal job
//!   snapshots to `replyTo` URLs.

pub mod bus;
pub mod delivery;
pub mod notifier;

pub use bus::{EventBus, JobEvent};
pub use delivery::webhook::{WebhookDelivery, WebhookError};
pub use notifier::ReplyToNotifier;
