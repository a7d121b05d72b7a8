use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, Money, OrderEvent, OrderStatus};
use serde_json::json;

use super::record_duration;
use crate::events::EventBus;
use crate::repositories::{OrderField, OrderFilter, OrderProperties, OrderRepository};
use crate::services::{
    CheckoutRequest, CheckoutSession, HostMatcher, PaymentGateway, PaymentPurpose,
};

#[derive(Debug, Clone, Copy)]
pub struct ConfirmOrderRequest {
    pub customer_id: EntityId,
    pub order_id: EntityId,
}

enum Confirmation {
    Checkout(CheckoutSession),
    Rejected(OrderEvent),
}

/// Matches a host and opens the service-fee checkout.
///
/// The order stays `Drafted` until the payment webhook finalizes it. When no
/// host is available the order is rejected for good.
pub struct ConfirmOrder {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    host_matcher: Arc<dyn HostMatcher>,
    payments: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventBus>,
    service_fee: Money,
}

impl ConfirmOrder {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orders: Arc<dyn OrderRepository>,
        host_matcher: Arc<dyn HostMatcher>,
        payments: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventBus>,
        service_fee: Money,
    ) -> Self {
        Self {
            store,
            orders,
            host_matcher,
            payments,
            events,
            service_fee,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        request: ConfirmOrderRequest,
    ) -> Result<CheckoutSession, DomainError> {
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id).owned_by(request.customer_id);

        let confirmation = with_transaction(self.store.as_ref(), |session| async move {
            let mut order = self.orders.find_order(session.as_ref(), filter).await?;
            if !order.status().can_transition_to(OrderStatus::Finalized) {
                return Err(DomainError::conflict(format!(
                    "Order (id: {}) cannot be confirmed in {} status",
                    order.id(),
                    order.status()
                ))
                .with_context(json!({ "order_id": order.id(), "status": order.status() })));
            }

            let host = self
                .host_matcher
                .match_host(session.as_ref(), order.origin_country())
                .await?;
            let Some(host) = host else {
                let event = order.reject(Utc::now())?;
                let properties = OrderProperties::from_order(
                    &order,
                    &[OrderField::Status, OrderField::RejectedAt],
                )?;
                self.orders
                    .set_properties(
                        session.as_ref(),
                        filter.with_status(OrderStatus::Drafted),
                        &properties,
                    )
                    .await?;
                return Ok(Confirmation::Rejected(event));
            };

            let checkout = self
                .payments
                .create_checkout_session(CheckoutRequest {
                    order_id: order.id(),
                    customer_id: order.customer_id(),
                    host_id: Some(host.id),
                    purpose: PaymentPurpose::ServiceFee,
                    amount: self.service_fee,
                    description: format!("Service fee for order {}", order.id()),
                })
                .await?;
            tracing::info!(host_id = %host.id, session_id = %checkout.id, "host matched");
            Ok(Confirmation::Checkout(checkout))
        })
        .await?;

        record_duration("confirm_order", started);
        match confirmation {
            Confirmation::Checkout(checkout) => Ok(checkout),
            Confirmation::Rejected(event) => {
                let origin = match &event {
                    OrderEvent::OrderRejected(data) => data.origin_country.to_string(),
                    _ => String::new(),
                };
                self.events.publish(event);
                metrics::counter!("orders_rejected_total", "reason" => "no_host").increment(1);
                tracing::info!(%origin, "no host available, order rejected");
                Err(DomainError::internal(format!(
                    "No available host in origin {origin} for order {}",
                    request.order_id
                ))
                .with_context(json!({ "order_id": request.order_id, "origin_country": origin })))
            }
        }
    }
}
