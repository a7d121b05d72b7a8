use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::EntityId;
use document_store::{DocumentStore, Session, with_transaction_in};
use domain::{DomainError, OrderStatus};

use super::{WebhookOutcome, record_duration};
use crate::events::EventBus;
use crate::repositories::{
    HostRepository, OrderField, OrderFilter, OrderProperties, OrderRepository,
};

#[derive(Debug, Clone, Copy)]
pub struct FinalizeOrderRequest {
    pub order_id: EntityId,
    pub host_id: EntityId,
}

/// Applies a paid service fee: assigns the host and finalizes the order.
pub struct FinalizeOrder {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    hosts: Arc<dyn HostRepository>,
    events: Arc<dyn EventBus>,
}

impl FinalizeOrder {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orders: Arc<dyn OrderRepository>,
        hosts: Arc<dyn HostRepository>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            orders,
            hosts,
            events,
        }
    }

    pub async fn execute(
        &self,
        request: FinalizeOrderRequest,
    ) -> Result<WebhookOutcome, DomainError> {
        self.execute_in(request, None).await
    }

    /// Like [`execute`](Self::execute), joining `session` when one is given.
    ///
    /// A repeated delivery for the same host is a no-op.
    #[tracing::instrument(skip(self, session))]
    pub async fn execute_in(
        &self,
        request: FinalizeOrderRequest,
        session: Option<Arc<dyn Session>>,
    ) -> Result<WebhookOutcome, DomainError> {
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id);

        let event = with_transaction_in(self.store.as_ref(), session, |session| async move {
            let mut order = self.orders.find_order(session.as_ref(), filter).await?;
            if order.status() == OrderStatus::Finalized
                && order.host_id() == Some(request.host_id)
            {
                return Ok(None);
            }

            let host = self.hosts.find_host(session.as_ref(), request.host_id).await?;
            let event = order.confirm(host.id, Utc::now())?;
            let properties = OrderProperties::from_order(
                &order,
                &[OrderField::Status, OrderField::HostId, OrderField::FinalizedAt],
            )?;

            tokio::try_join!(
                self.orders.set_properties(
                    session.as_ref(),
                    filter.with_status(OrderStatus::Drafted),
                    &properties,
                ),
                self.hosts
                    .add_order_to_host(session.as_ref(), host.id, order.id()),
            )?;
            Ok::<_, DomainError>(Some(event))
        })
        .await?;

        record_duration("finalize_order", started);
        let Some(event) = event else {
            tracing::info!("order already finalized");
            return Ok(WebhookOutcome::AlreadyApplied);
        };
        self.events.publish(event);
        metrics::counter!("orders_finalized_total").increment(1);
        tracing::info!("order finalized");
        Ok(WebhookOutcome::Applied)
    }
}
