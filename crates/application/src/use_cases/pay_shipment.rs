use std::sync::Arc;
use std::time::Instant;

use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, OrderStatus};
use serde_json::json;

use super::record_duration;
use crate::repositories::{OrderFilter, OrderRepository};
use crate::services::{CheckoutRequest, CheckoutSession, PaymentGateway, PaymentPurpose};

#[derive(Debug, Clone, Copy)]
pub struct PayShipmentRequest {
    pub customer_id: EntityId,
    pub order_id: EntityId,
}

/// Opens the shipment-fee checkout for a finalized order with shipment info.
pub struct PayShipment {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentGateway>,
}

impl PayShipment {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store,
            orders,
            payments,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        request: PayShipmentRequest,
    ) -> Result<CheckoutSession, DomainError> {
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id).owned_by(request.customer_id);

        let checkout = with_transaction(self.store.as_ref(), |session| async move {
            let order = self.orders.find_order(session.as_ref(), filter).await?;
            let info = match (order.status(), order.shipment_info()) {
                (OrderStatus::Finalized, Some(info)) => info,
                (status, _) => {
                    return Err(DomainError::conflict(format!(
                        "Order (id: {}) has no shipment fee to pay",
                        order.id()
                    ))
                    .with_context(json!({
                        "order_id": order.id(),
                        "status": status,
                        "shipment_info_submitted": order.shipment_info().is_some(),
                    })));
                }
            };

            self.payments
                .create_checkout_session(CheckoutRequest {
                    order_id: order.id(),
                    customer_id: order.customer_id(),
                    host_id: order.host_id(),
                    purpose: PaymentPurpose::ShipmentFee,
                    amount: info.cost,
                    description: format!("Shipment of order {}", order.id()),
                })
                .await
        })
        .await?;

        record_duration("pay_shipment", started);
        tracing::info!(session_id = %checkout.id, "shipment checkout opened");
        Ok(checkout)
    }
}
