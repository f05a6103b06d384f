//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. The store
//! publishes one event per state transition; subscribers (the `ReplyTo`
//! notifier, log taps, future metrics) each receive every event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use aiq_core::Job;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A job lifecycle event with the job snapshot taken at transition time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"job.completed"`.
    pub event_type: String,

    /// Snapshot of the job immediately after the transition.
    pub job: Job,

    /// When the event was published (UTC).
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(event_type: impl Into<String>, job: Job) -> Self {
        Self {
            event_type: event_type.into(),
            job,
            timestamp: Utc::now(),
        }
    }

    /// Event named after the job's current state (`"job.queued"`,
    /// `"job.completed"`, ...). Used for ordinary transitions; reclaims
    /// publish the distinct `"job.reclaimed"` name instead.
    pub fn state_change(job: Job) -> Self {
        let event_type = format!("job.{}", job.state.as_str().to_lowercase());
        Self::new(event_type, job)
    }

    /// Whether this event marks a terminal transition.
    pub fn is_terminal(&self) -> bool {
        self.job.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`JobEvent`].
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// nothing in the engine depends on delivery.
    pub fn publish(&self, event: JobEvent) {
        // A SendError only means there are zero receivers right now.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use aiq_core::{GenerationRequest, JobState};

    fn job(state: JobState) -> Job {
        Job {
            id: 1,
            ref_id: None,
            tag: None,
            requested_provider: None,
            reply_to: None,
            request: GenerationRequest::default(),
            state,
            provider: None,
            worker: None,
            attempt_count: 0,
            attempts: vec![],
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(JobEvent::state_change(job(JobState::Completed)));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "job.completed");
        assert!(received.is_terminal());
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(JobEvent::state_change(job(JobState::Queued)));

        assert_eq!(rx1.recv().await.unwrap().event_type, "job.queued");
        assert_eq!(rx2.recv().await.unwrap().event_type, "job.queued");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(JobEvent::new("job.reclaimed", job(JobState::Queued)));
    }
}
