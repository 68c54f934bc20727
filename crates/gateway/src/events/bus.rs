//! Event Bus: a single broadcast channel fanning out Session events to
//! every connected WebSocket subscriber. Broadcast is many-to-many — every
//! live subscriber receives every event in the order it was published,
//! clients filter by `search_id` themselves.

use tokio::sync::broadcast;

use dp_domain::event::Event;

pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event. If there are currently no subscribers this is a
    /// no-op — event loss with no live listener is accepted, matching the
    /// `subscriber_send` error kind's "event loss is accepted" effect.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
