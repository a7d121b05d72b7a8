use std::sync::Arc;
use std::time::Instant;

use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, OrderStatus};

use super::record_duration;
use crate::events::EventBus;
use crate::repositories::{CustomerRepository, OrderFilter, OrderRepository};

#[derive(Debug, Clone, Copy)]
pub struct DeleteOrderRequest {
    pub customer_id: EntityId,
    pub order_id: EntityId,
}

/// Deletes a drafted order and unlinks it from its customer.
pub struct DeleteOrder {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    customers: Arc<dyn CustomerRepository>,
    events: Arc<dyn EventBus>,
}

impl DeleteOrder {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orders: Arc<dyn OrderRepository>,
        customers: Arc<dyn CustomerRepository>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            orders,
            customers,
            events,
        }
    }

    /// Only drafted orders can be deleted; other statuses fail with `CONFLICT`.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, request: DeleteOrderRequest) -> Result<(), DomainError> {
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id).owned_by(request.customer_id);

        let event = with_transaction(self.store.as_ref(), |session| async move {
            let order = self.orders.find_order(session.as_ref(), filter).await?;
            let event = order.delete()?;

            tokio::try_join!(
                self.orders
                    .delete_order(session.as_ref(), filter.with_status(OrderStatus::Drafted)),
                self.customers.remove_order_from_customer(
                    session.as_ref(),
                    request.customer_id,
                    request.order_id,
                ),
            )?;
            Ok::<_, DomainError>(event)
        })
        .await?;

        self.events.publish(event);
        record_duration("delete_order", started);
        tracing::info!("order deleted");

        Ok(())
    }
}
