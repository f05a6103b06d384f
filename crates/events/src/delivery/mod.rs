//! External delivery channels for job notifications.
//!
//! Currently webhook-only: the reply-to notifier pushes terminal job
//! snapshots to caller-supplied URLs through [`webhook::WebhookDelivery`].

pub mod webhook;
