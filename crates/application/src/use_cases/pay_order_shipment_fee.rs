use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::EntityId;
use document_store::{DocumentStore, Session, with_transaction_in};
use domain::{DomainError, OrderStatus};

use super::{WebhookOutcome, record_duration};
use crate::events::EventBus;
use crate::repositories::{OrderField, OrderFilter, OrderProperties, OrderRepository};

#[derive(Debug, Clone, Copy)]
pub struct PayOrderShipmentFeeRequest {
    pub order_id: EntityId,
}

/// Applies a paid shipment fee: the order becomes `Paid`.
pub struct PayOrderShipmentFee {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn EventBus>,
}

impl PayOrderShipmentFee {
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

    pub async fn execute(
        &self,
        request: PayOrderShipmentFeeRequest,
    ) -> Result<WebhookOutcome, DomainError> {
        self.execute_in(request, None).await
    }

    /// Like [`execute`](Self::execute), joining `session` when one is given.
    ///
    /// Applying the same payment twice leaves the order `Paid` and publishes
    /// nothing the second time.
    #[tracing::instrument(skip(self, session))]
    pub async fn execute_in(
        &self,
        request: PayOrderShipmentFeeRequest,
        session: Option<Arc<dyn Session>>,
    ) -> Result<WebhookOutcome, DomainError> {
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id);

        let event = with_transaction_in(self.store.as_ref(), session, |session| async move {
            let mut order = self.orders.find_order(session.as_ref(), filter).await?;
            if order.status() == OrderStatus::Paid {
                return Ok(None);
            }

            let event = order.mark_paid(Utc::now())?;
            let properties =
                OrderProperties::from_order(&order, &[OrderField::Status, OrderField::PaidAt])?;
            self.orders
                .set_properties(
                    session.as_ref(),
                    filter.with_status(OrderStatus::Finalized),
                    &properties,
                )
                .await?;
            Ok::<_, DomainError>(Some(event))
        })
        .await?;

        record_duration("pay_order_shipment_fee", started);
        let Some(event) = event else {
            tracing::info!("shipment fee already applied");
            return Ok(WebhookOutcome::AlreadyApplied);
        };
        self.events.publish(event);
        metrics::counter!("orders_paid_total").increment(1);
        tracing::info!("order paid");
        Ok(WebhookOutcome::Applied)
    }
}
