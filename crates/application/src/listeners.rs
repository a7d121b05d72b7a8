//! Event listeners and the dispatcher feeding them.

use std::sync::Arc;

use async_trait::async_trait;
use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, DomainEvent, OrderEvent, RejectionReason};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::repositories::{CustomerRepository, HostRepository};
use crate::services::{EmailData, EmailService, send_email_logged};

/// Reacts to published order events.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Returns the listener name, used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &OrderEvent) -> Result<(), DomainError>;
}

/// Delivers events to every registered listener.
///
/// A failing listener is logged and does not stop delivery to the others.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers a single event to all registered listeners.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type()))]
    pub async fn dispatch(&self, event: &OrderEvent) {
        for listener in &self.listeners {
            if let Err(e) = listener.handle(event).await {
                metrics::counter!("event_listener_failures_total", "listener" => listener.name())
                    .increment(1);
                tracing::warn!(listener = listener.name(), error = %e, "listener failed");
            }
        }
    }

    /// Dispatches events from `receiver` until every sender is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<OrderEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.dispatch(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event dispatcher lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::info!("event dispatcher stopped");
    }

    pub fn spawn(self, receiver: broadcast::Receiver<OrderEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }
}

enum Recipient {
    Customer(EntityId),
    Host(EntityId),
}

/// Emails customers and hosts about the progress of their orders.
pub struct NotificationListener {
    store: Arc<dyn DocumentStore>,
    customers: Arc<dyn CustomerRepository>,
    hosts: Arc<dyn HostRepository>,
    email: Arc<dyn EmailService>,
}

impl NotificationListener {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        customers: Arc<dyn CustomerRepository>,
        hosts: Arc<dyn HostRepository>,
        email: Arc<dyn EmailService>,
    ) -> Self {
        Self {
            store,
            customers,
            hosts,
            email,
        }
    }

    async fn email_address(&self, recipient: &Recipient) -> Result<String, DomainError> {
        with_transaction(self.store.as_ref(), |session| async move {
            match recipient {
                Recipient::Customer(id) => self
                    .customers
                    .find_customer(session.as_ref(), *id)
                    .await
                    .map(|customer| customer.email),
                Recipient::Host(id) => self
                    .hosts
                    .find_host(session.as_ref(), *id)
                    .await
                    .map(|host| host.email),
            }
        })
        .await
    }
}

fn notifications(event: &OrderEvent) -> Vec<(Recipient, String, String)> {
    match event {
        OrderEvent::OrderDrafted(data) => vec![(
            Recipient::Customer(data.customer_id),
            "Your order draft".to_string(),
            format!(
                "Order {} from {} to {} is drafted with {} item(s). The estimated shipment \
                 rate is {}. Confirm it to get a host.",
                data.order_id,
                data.origin_country,
                data.destination_country,
                data.item_count,
                data.shipment_rate
            ),
        )],
        OrderEvent::OrderFinalized(data) => vec![
            (
                Recipient::Customer(data.customer_id),
                "Your order is confirmed".to_string(),
                format!(
                    "Order {} has a host. Ship your items to them and we will let you know \
                     when they arrive.",
                    data.order_id
                ),
            ),
            (
                Recipient::Host(data.host_id),
                "New order assigned".to_string(),
                format!("Order {} was assigned to you.", data.order_id),
            ),
        ],
        OrderEvent::OrderRejected(data) if data.reason == RejectionReason::NoHostAvailable => {
            vec![(
                Recipient::Customer(data.customer_id),
                "We could not find a host".to_string(),
                format!(
                    "No host is available in {} right now, so your order could not be placed.",
                    data.origin_country
                ),
            )]
        }
        OrderEvent::ShipmentInfoSubmitted(data) => vec![(
            Recipient::Customer(data.customer_id),
            "Your shipment is ready".to_string(),
            format!(
                "All items of order {} arrived. The shipment costs {}; pay it to have the \
                 order shipped.",
                data.order_id, data.cost
            ),
        )],
        OrderEvent::OrderPaid(data) => vec![(
            Recipient::Host(data.host_id),
            "Shipment paid".to_string(),
            format!("The customer paid the shipment of order {}. Ship it!", data.order_id),
        )],
        _ => Vec::new(),
    }
}

#[async_trait]
impl EventListener for NotificationListener {
    fn name(&self) -> &'static str {
        "NotificationListener"
    }

    async fn handle(&self, event: &OrderEvent) -> Result<(), DomainError> {
        for (recipient, subject, text) in notifications(event) {
            let to = self.email_address(&recipient).await?;
            let email = EmailData {
                from: None,
                to,
                subject,
                text,
            };
            send_email_logged(self.email.as_ref(), email).await;
        }
        Ok(())
    }
}
