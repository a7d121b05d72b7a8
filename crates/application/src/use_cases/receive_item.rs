use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, OrderStatus};

use super::record_duration;
use crate::events::EventBus;
use crate::repositories::{OrderField, OrderFilter, OrderProperties, OrderRepository};

#[derive(Debug, Clone, Copy)]
pub struct ReceiveItemRequest {
    pub host_id: EntityId,
    pub order_id: EntityId,
    pub item_id: EntityId,
}

/// Host marks an item of a finalized order as received.
pub struct ReceiveItem {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn EventBus>,
}

impl ReceiveItem {
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

    /// Returns the time the item was recorded as received.
    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        request: ReceiveItemRequest,
    ) -> Result<DateTime<Utc>, DomainError> {
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id).hosted_by(request.host_id);
        let received_at = Utc::now();

        let event = with_transaction(self.store.as_ref(), |session| async move {
            let mut order = self.orders.find_order(session.as_ref(), filter).await?;
            let event = order.receive_item(request.item_id, received_at)?;
            let properties = OrderProperties::from_order(&order, &[OrderField::Items])?;
            self.orders
                .set_properties(
                    session.as_ref(),
                    filter.with_status(OrderStatus::Finalized),
                    &properties,
                )
                .await?;
            Ok::<_, DomainError>(event)
        })
        .await?;

        self.events.publish(event);
        record_duration("receive_item", started);
        tracing::info!("item received");

        Ok(received_at)
    }
}
