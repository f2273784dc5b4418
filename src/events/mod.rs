//! # Lifecycle Event Publishing
//!
//! Broadcast channel for orchestration lifecycle events. Publishing with no
//! subscribers is fine; observers (UI, audit log) attach when they care.

use serde_json::Value;
use tokio::sync::broadcast;

/// Event names published by the orchestration core
pub mod names {
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_TRANSITIONED: &str = "job.transitioned";
    pub const JOB_REOPENED: &str = "job.reopened";
    pub const JOB_CANCELLED: &str = "job.cancelled";
    pub const STEP_TRANSITIONED: &str = "step.transitioned";
    pub const SUB_STEP_TRANSITIONED: &str = "sub_step.transitioned";
    pub const MANUAL_TRANSITION: &str = "sub_step.manual_transition";
    pub const RESET_CASCADE_APPLIED: &str = "reset.cascade_applied";
    pub const VIABLE_SUB_STEPS_DISCOVERED: &str = "viable_sub_steps.discovered";
    pub const ROUND_COMPLETED: &str = "round.completed";
}

/// High-throughput publisher for lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context
    pub async fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // send() errors only when there are no subscribers, which is an
        // acceptable state for lifecycle publishing.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let publisher = EventPublisher::new(16);
        publisher
            .publish(names::JOB_STARTED, serde_json::json!({"job_id": "x"}))
            .await;
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let publisher = EventPublisher::new(16);
        let mut receiver = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher
            .publish(
                names::SUB_STEP_TRANSITIONED,
                serde_json::json!({"sub_step": "create_account", "to": "completed"}),
            )
            .await;

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, names::SUB_STEP_TRANSITIONED);
        assert_eq!(event.context["sub_step"], "create_account");
    }
}
