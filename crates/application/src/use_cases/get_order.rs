use std::sync::Arc;

use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, Order};

use crate::repositories::{OrderFilter, OrderRepository};

#[derive(Debug, Clone, Copy)]
pub struct GetOrderRequest {
    pub customer_id: EntityId,
    pub order_id: EntityId,
}

/// Reads an order owned by the customer.
pub struct GetOrder {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
}

impl GetOrder {
    pub fn new(store: Arc<dyn DocumentStore>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { store, orders }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, request: GetOrderRequest) -> Result<Order, DomainError> {
        let filter = OrderFilter::by_id(request.order_id).owned_by(request.customer_id);
        with_transaction(self.store.as_ref(), |session| async move {
            self.orders.find_order(session.as_ref(), filter).await
        })
        .await
    }
}
