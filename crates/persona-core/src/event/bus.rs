//! Broadcast bus for distributing `TranscriptEvent` to UI subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `TranscriptBus` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.

use persona_types::chat::TranscriptEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus for "transcript changed for key K" notifications.
///
/// Cloning the bus clones the sender, allowing multiple producers and consumers.
pub struct TranscriptBus {
    sender: broadcast::Sender<TranscriptEvent>,
}

impl TranscriptBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// Slow subscribers that fall more than `capacity` events behind observe
    /// `RecvError::Lagged` and should re-read the transcript.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: TranscriptEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for TranscriptBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for TranscriptBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_types::chat::Message;
    use persona_types::persona::{PersonaKey, PersonaScope};

    fn sample_event(text: &str) -> TranscriptEvent {
        TranscriptEvent {
            key: PersonaKey::new(PersonaScope::Other, "K"),
            messages: vec![Message::user(text)],
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = TranscriptBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(sample_event("hi"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.messages, vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = TranscriptBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(sample_event("hi"));

        assert_eq!(rx1.recv().await.unwrap().key.name, "K");
        assert_eq!(rx2.recv().await.unwrap().key.name, "K");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = TranscriptBus::new(16);
        bus.publish(sample_event("dropped"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn clone_shares_channel() {
        let bus = TranscriptBus::new(16);
        let mut rx = bus.subscribe();
        let clone = bus.clone();

        clone.publish(sample_event("from clone"));

        assert_eq!(rx.recv().await.unwrap().messages[0].text, "from clone");
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = TranscriptBus::new(16);
        let mut rx = bus.subscribe();

        for text in ["a", "b", "c"] {
            bus.publish(sample_event(text));
        }

        for expected in ["a", "b", "c"] {
            assert_eq!(rx.recv().await.unwrap().messages[0].text, expected);
        }
    }
}
