//! Publish/subscribe surface for normalized events.
//!
//! Subscribers register by normalized event name or for every event. Each
//! subscription is a `tokio::sync::broadcast` receiver; a subscriber that
//! falls more than the channel capacity behind sees `RecvError::Lagged`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::events::NormalizedEvent;

/// Default per-channel buffer size.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Receiver handed to subscribers.
pub type EventReceiver = broadcast::Receiver<Arc<NormalizedEvent>>;

/// Event fan-out by name.
pub struct EventBus {
    capacity: usize,
    all: broadcast::Sender<Arc<NormalizedEvent>>,
    named: RwLock<HashMap<String, broadcast::Sender<Arc<NormalizedEvent>>>>,
}

impl EventBus {
    /// Create a bus whose channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        Self {
            capacity,
            all,
            named: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to one normalized event name (e.g. `messageCreate`).
    pub fn subscribe(&self, name: &str) -> EventReceiver {
        if let Some(sender) = self.named.read().get(name) {
            return sender.subscribe();
        }
        self.named
            .write()
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to every event.
    pub fn subscribe_all(&self) -> EventReceiver {
        self.all.subscribe()
    }

    /// Publish an event. Returns how many receivers it reached.
    pub fn publish(&self, event: &Arc<NormalizedEvent>) -> usize {
        let mut delivered = self.all.send(Arc::clone(event)).unwrap_or(0);
        if let Some(sender) = self.named.read().get(&event.name) {
            delivered += sender.send(Arc::clone(event)).unwrap_or(0);
        }
        delivered
    }

    /// Number of live receivers for `name`, not counting all-event subscribers.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.named
            .read()
            .get(name)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ClientEvent;
    use serde_json::json;

    fn event(name: &str, seq: u64) -> Arc<NormalizedEvent> {
        Arc::new(NormalizedEvent {
            name: name.into(),
            sequence: Some(seq),
            event: ClientEvent::Raw(json!({})),
        })
    }

    #[tokio::test]
    async fn named_subscriber_only_sees_its_name() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe("messageCreate");

        assert_eq!(bus.publish(&event("typingStart", 1)), 0);
        assert_eq!(bus.publish(&event("messageCreate", 2)), 1);

        let got = rx.recv().await.unwrap();
        assert_eq!(got.sequence, Some(2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn all_subscriber_sees_everything_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_all();
        for seq in 1..=3 {
            let _ = bus.publish(&event("a", seq));
        }
        for seq in 1..=3 {
            assert_eq!(rx.recv().await.unwrap().sequence, Some(seq));
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(&event("ready", 1)), 0);
        assert_eq!(bus.subscriber_count("ready"), 0);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::new(4);
        let first = bus.subscribe("ready");
        let _second = bus.subscribe("ready");
        assert_eq!(bus.subscriber_count("ready"), 2);
        drop(first);
        assert_eq!(bus.subscriber_count("ready"), 1);
    }

    #[tokio::test]
    async fn lagging_subscriber_is_told() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe_all();
        for seq in 1..=4 {
            let _ = bus.publish(&event("a", seq));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
    }
}
