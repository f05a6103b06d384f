//! `ReplyTo` webhook notifier.
//!
//! A bus subscriber that watches for terminal job events and delivers the
//! final status snapshot to the job's `replyTo` URL. Delivery is best-effort:
//! failures are retried on the delivery's bounded schedule, then logged and
//! dropped without ever touching job state.

use tokio::sync::broadcast;

use aiq_core::StatusSnapshot;

use crate::bus::JobEvent;
use crate::delivery::webhook::WebhookDelivery;

pub struct ReplyToNotifier {
    delivery: WebhookDelivery,
}

impl ReplyToNotifier {
    pub fn new(delivery: WebhookDelivery) -> Self {
        Self { delivery }
    }

    /// Consume events until the bus closes.
    ///
    /// Intended to be spawned once at startup with a fresh subscription.
    pub async fn run(self, mut rx: broadcast::Receiver<JobEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Reply-to notifier lagged, notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::info!("Reply-to notifier stopped");
    }

    async fn handle(&self, event: JobEvent) {
        if !event.is_terminal() {
            return;
        }
        let Some(url) = event.job.reply_to.clone() else {
            return;
        };

        let snapshot = StatusSnapshot::from(&event.job);
        let payload = match serde_json::to_value(&snapshot) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(job_id = event.job.id, error = %e, "Failed to encode reply-to payload");
                return;
            }
        };

        match self.delivery.deliver(&url, &payload).await {
            Ok(()) => {
                tracing::debug!(job_id = event.job.id, url = %url, "Delivered reply-to notification");
            }
            Err(e) => {
                tracing::warn!(
                    job_id = event.job.id,
                    url = %url,
                    error = %e,
                    "Dropping reply-to notification after retries"
                );
            }
        }
    }
}
