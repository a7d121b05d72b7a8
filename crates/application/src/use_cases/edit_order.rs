use std::sync::Arc;
use std::time::Instant;

use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, Order, OrderEdit, OrderEvent, OrderStatus};
use serde_json::json;

use super::{price_or_reject, record_duration};
use crate::events::EventBus;
use crate::repositories::{OrderField, OrderFilter, OrderProperties, OrderRepository};
use crate::services::{HostMatcher, ShipmentCostCalculator};

#[derive(Debug, Clone)]
pub struct EditOrderRequest {
    pub customer_id: EntityId,
    pub order_id: EntityId,
    pub edit: OrderEdit,
}

/// Changes a drafted order and prices it again.
pub struct EditOrder {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    host_matcher: Arc<dyn HostMatcher>,
    cost_calculator: Arc<dyn ShipmentCostCalculator>,
    events: Arc<dyn EventBus>,
}

const EDITABLE: [OrderField; 4] = [
    OrderField::OriginCountry,
    OrderField::Destination,
    OrderField::Items,
    OrderField::ShipmentRate,
];

impl EditOrder {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orders: Arc<dyn OrderRepository>,
        host_matcher: Arc<dyn HostMatcher>,
        cost_calculator: Arc<dyn ShipmentCostCalculator>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            orders,
            host_matcher,
            cost_calculator,
            events,
        }
    }

    #[tracing::instrument(
        skip(self, request),
        fields(order_id = %request.order_id, customer_id = %request.customer_id)
    )]
    pub async fn execute(&self, request: EditOrderRequest) -> Result<Order, DomainError> {
        if request.edit.is_empty() {
            return Err(DomainError::validation("Nothing to edit")
                .with_context(json!({ "order_id": request.order_id })));
        }
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id).owned_by(request.customer_id);

        let (order, event) = with_transaction(self.store.as_ref(), |session| async move {
            let mut order = self.orders.find_order(session.as_ref(), filter).await?;
            if !order.status().can_edit() {
                return Err(DomainError::conflict(format!(
                    "Order (id: {}) cannot be edited in {} status",
                    order.id(),
                    order.status()
                ))
                .with_context(json!({ "order_id": order.id(), "status": order.status() })));
            }

            let edit = request.edit;
            let origin = edit
                .origin_country
                .clone()
                .unwrap_or_else(|| order.origin_country().clone());
            let destination = edit
                .destination
                .as_ref()
                .map_or_else(|| order.destination().country.clone(), |d| d.country.clone());
            if edit.origin_country.is_some() || edit.destination.is_some() {
                let served = self
                    .host_matcher
                    .check_service_availability(session.as_ref(), &origin, &destination)
                    .await?;
                if !served {
                    metrics::counter!("orders_rejected_total", "reason" => "service_availability")
                        .increment(1);
                    self.events.publish(OrderEvent::rejected_service_availability(
                        order.customer_id(),
                        origin.clone(),
                        destination.clone(),
                    ));
                    return Err(DomainError::internal(format!(
                        "Service not available in origin {origin} or destination {destination}"
                    ))
                    .with_context(json!({
                        "order_id": order.id(),
                        "origin_country": origin,
                        "destination_country": destination,
                    })));
                }
            }

            let (order_id, customer_id) = (order.id(), order.customer_id());
            let event = order
                .edit(edit, |cost_request| {
                    price_or_reject(
                        self.cost_calculator.as_ref(),
                        self.events.as_ref(),
                        customer_id,
                        Some(order_id),
                        cost_request,
                    )
                })
                .await?;

            let properties = OrderProperties::from_order(&order, &EDITABLE)?;
            self.orders
                .set_properties(
                    session.as_ref(),
                    filter.with_status(OrderStatus::Drafted),
                    &properties,
                )
                .await?;
            Ok((order, event))
        })
        .await?;

        self.events.publish(event);
        record_duration("edit_order", started);
        tracing::info!(rate = %order.shipment_rate(), "order edited");

        Ok(order)
    }
}
