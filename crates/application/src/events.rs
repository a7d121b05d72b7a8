//! Publishing order events.

use std::sync::{Arc, Mutex, PoisonError};

use domain::{DomainEvent, OrderEvent};
use tokio::sync::broadcast;

/// Publishes events after the transaction that produced them committed.
///
/// Publishing never fails the operation: events without subscribers are dropped.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: OrderEvent);
}

/// [`EventBus`] over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<OrderEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: OrderEvent) {
        let event_type = event.event_type();
        tracing::debug!(event_type, order_id = ?event.order_id(), "publishing event");
        metrics::counter!("domain_events_published_total", "event_type" => event_type)
            .increment(1);
        if self.sender.send(event).is_err() {
            tracing::debug!(event_type, "no subscribers for event");
        }
    }
}

/// In-memory event bus for testing. Records every published event.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    events: Arc<Mutex<Vec<OrderEvent>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OrderEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Published event names, in order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.event_type()).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: OrderEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use common::EntityId;
    use domain::Country;

    use super::*;

    fn rejection() -> OrderEvent {
        OrderEvent::rejected_service_availability(
            EntityId::new(),
            Country::new("US").unwrap(),
            Country::new("ZZ").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let bus = BroadcastEventBus::new(8);
        let mut receiver = bus.subscribe();
        let event = rejection();

        bus.publish(event.clone());
        assert_eq!(receiver.recv().await.unwrap(), event);
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = BroadcastEventBus::new(8);
        bus.publish(rejection());
    }

    #[test]
    fn test_in_memory_records_events() {
        let bus = InMemoryEventBus::new();
        bus.publish(rejection());
        assert_eq!(bus.event_types(), vec!["order.rejected.service_availability"]);
        bus.clear();
        assert!(bus.events().is_empty());
    }
}
