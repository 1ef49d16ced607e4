use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::SiteEvent;

/// In-process event bus backed by `tokio::broadcast`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<SiteEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish an event to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: SiteEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SiteEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(SiteEvent::Welcome), 1);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SiteEvent::Welcome));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(SiteEvent::RestoreStarted {
            backup: "b.json".into(),
        });

        assert!(matches!(rx1.recv().await.unwrap(), SiteEvent::RestoreStarted { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), SiteEvent::RestoreStarted { .. }));
    }

    #[test]
    fn publishing_without_listeners_is_harmless() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(SiteEvent::Welcome), 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(SiteEvent::PartitionRestored {
            backup: "b.json".into(),
            partition: "pages".into(),
            records: 3,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "partitionRestored", "backup": "b.json", "partition": "pages", "records": 3})
        );
    }
}
