use std::sync::Arc;
use std::time::Instant;

use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{Country, DomainError, NewItem, Order, OrderDraft, OrderEvent};
use serde_json::json;

use super::{price_or_reject, record_duration};
use crate::events::EventBus;
use crate::repositories::{CustomerRepository, OrderRepository};
use crate::services::{HostMatcher, ShipmentCostCalculator};

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub customer_id: EntityId,
    pub origin_country: Country,
    pub items: Vec<NewItem>,
}

/// Drafts a priced order to the customer's selected address.
pub struct CreateOrder {
    store: Arc<dyn DocumentStore>,
    customers: Arc<dyn CustomerRepository>,
    orders: Arc<dyn OrderRepository>,
    host_matcher: Arc<dyn HostMatcher>,
    cost_calculator: Arc<dyn ShipmentCostCalculator>,
    events: Arc<dyn EventBus>,
}

impl CreateOrder {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        customers: Arc<dyn CustomerRepository>,
        orders: Arc<dyn OrderRepository>,
        host_matcher: Arc<dyn HostMatcher>,
        cost_calculator: Arc<dyn ShipmentCostCalculator>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            customers,
            orders,
            host_matcher,
            cost_calculator,
            events,
        }
    }

    /// Drafts the order.
    ///
    /// Fails with `INTERNAL_ERROR` when the route is not served; an
    /// `order.rejected.service_availability` event is published and nothing
    /// is stored. A pricing failure is rejected the same way with
    /// `order.rejected.shipment_rate` and the calculator's error.
    #[tracing::instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, origin = %request.origin_country)
    )]
    pub async fn execute(&self, request: CreateOrderRequest) -> Result<Order, DomainError> {
        let started = Instant::now();

        let order = with_transaction(self.store.as_ref(), |session| async move {
            let customer = self
                .customers
                .find_customer(session.as_ref(), request.customer_id)
                .await?;
            let draft = OrderDraft::new(
                customer.id,
                request.origin_country,
                customer.selected_address.clone(),
                request.items,
            );

            let origin = draft.origin_country().clone();
            let destination = draft.destination_country().clone();
            let served = self
                .host_matcher
                .check_service_availability(session.as_ref(), &origin, &destination)
                .await?;
            if !served {
                metrics::counter!("orders_rejected_total", "reason" => "service_availability")
                    .increment(1);
                tracing::info!(%destination, "route not served, draft rejected");
                self.events.publish(OrderEvent::rejected_service_availability(
                    customer.id,
                    origin.clone(),
                    destination.clone(),
                ));
                return Err(DomainError::internal(format!(
                    "Service not available in origin {origin} or destination {destination}"
                ))
                .with_context(json!({
                    "customer_id": customer.id,
                    "origin_country": origin,
                    "destination_country": destination,
                })));
            }

            let order = draft
                .draft(|cost_request| {
                    price_or_reject(
                        self.cost_calculator.as_ref(),
                        self.events.as_ref(),
                        customer.id,
                        None,
                        cost_request,
                    )
                })
                .await?;

            tokio::try_join!(
                self.orders.add_order(session.as_ref(), &order),
                self.customers
                    .add_order_to_customer(session.as_ref(), customer.id, order.id()),
            )?;
            Ok(order)
        })
        .await?;

        self.events.publish(order.drafted_event());
        metrics::counter!("orders_drafted_total").increment(1);
        record_duration("create_order", started);
        tracing::info!(order_id = %order.id(), rate = %order.shipment_rate(), "order drafted");

        Ok(order)
    }
}
