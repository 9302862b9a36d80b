//! In-process event bus over `tokio::sync::broadcast`.

use tokio::sync::broadcast;
use tracing::debug;

use crate::traits::events::EventPublisher;

use super::DomainEvent;

/// Default capacity of the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fire-and-forget event bus.
///
/// Publishing never blocks and never fails: with no subscribers the
/// event is dropped, and a lagging subscriber loses the oldest events
/// rather than backpressuring publishers.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for BroadcastEventBus {
    fn publish(&self, event: DomainEvent) {
        // send only errors when there are no receivers; fire-and-forget.
        if self.sender.send(event).is_err() {
            debug!("Event published with no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventPayload, RoleEvent};
    use uuid::Uuid;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = BroadcastEventBus::new();
        let mut rx = bus.subscribe();

        let role_id = Uuid::new_v4();
        bus.publish(DomainEvent::new(EventPayload::Role(
            RoleEvent::PermissionsChanged { role_id },
        )));

        let event = rx.recv().await.expect("event delivered");
        match event.payload {
            EventPayload::Role(RoleEvent::PermissionsChanged { role_id: got }) => {
                assert_eq!(got, role_id);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = BroadcastEventBus::new();
        bus.publish(DomainEvent::new(EventPayload::Role(
            RoleEvent::PermissionsChanged {
                role_id: Uuid::new_v4(),
            },
        )));
    }
}
