use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, Money, OrderStatus, ShipmentInfo};
use serde_json::json;

use super::record_duration;
use crate::events::EventBus;
use crate::repositories::{OrderField, OrderFilter, OrderProperties, OrderRepository};

#[derive(Debug, Clone)]
pub struct SubmitShipmentInfoRequest {
    pub host_id: EntityId,
    pub order_id: EntityId,
    pub cost: Money,
    pub tracking_number: Option<String>,
}

/// Host submits the final shipment cost once every item arrived.
pub struct SubmitShipmentInfo {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn EventBus>,
}

impl SubmitShipmentInfo {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orders: Arc<dyn OrderRepository>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            orders,
            events,
        }
    }

    #[tracing::instrument(
        skip(self, request),
        fields(order_id = %request.order_id, cost = %request.cost)
    )]
    pub async fn execute(
        &self,
        request: SubmitShipmentInfoRequest,
    ) -> Result<ShipmentInfo, DomainError> {
        if !request.cost.is_positive() {
            return Err(DomainError::validation("Shipment cost must be positive")
                .with_context(json!({ "order_id": request.order_id, "cost": request.cost })));
        }
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id).hosted_by(request.host_id);

        let (info, event) = with_transaction(self.store.as_ref(), |session| async move {
            let mut order = self.orders.find_order(session.as_ref(), filter).await?;
            let event =
                order.submit_shipment_info(request.cost, request.tracking_number, Utc::now())?;
            let properties = OrderProperties::from_order(&order, &[OrderField::ShipmentInfo])?;
            self.orders
                .set_properties(
                    session.as_ref(),
                    filter.with_status(OrderStatus::Finalized),
                    &properties,
                )
                .await?;
            let info = order
                .shipment_info()
                .cloned()
                .ok_or_else(|| DomainError::internal("Shipment info was not recorded"))?;
            Ok::<_, DomainError>((info, event))
        })
        .await?;

        self.events.publish(event);
        record_duration("submit_shipment_info", started);
        tracing::info!("shipment info submitted");

        Ok(info)
    }
}
