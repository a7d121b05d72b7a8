//! Order use cases.
//!
//! Each use case runs in one document-store transaction and publishes its
//! event only after the commit. Rejections are published before the error
//! is returned, since they describe an attempt rather than a stored change.

mod add_item_photos;
mod confirm_order;
mod create_order;
mod delete_order;
mod edit_order;
mod finalize_order;
mod get_order;
mod handle_payment_webhook;
mod pay_order_shipment_fee;
mod pay_shipment;
mod receive_item;
mod submit_shipment_info;

pub use add_item_photos::{AddItemPhotos, AddItemPhotosRequest, PhotoUpload};
pub use confirm_order::{ConfirmOrder, ConfirmOrderRequest};
pub use create_order::{CreateOrder, CreateOrderRequest};
pub use delete_order::{DeleteOrder, DeleteOrderRequest};
pub use edit_order::{EditOrder, EditOrderRequest};
pub use finalize_order::{FinalizeOrder, FinalizeOrderRequest};
pub use get_order::{GetOrder, GetOrderRequest};
pub use handle_payment_webhook::HandlePaymentWebhook;
pub use pay_order_shipment_fee::{PayOrderShipmentFee, PayOrderShipmentFeeRequest};
pub use pay_shipment::{PayShipment, PayShipmentRequest};
pub use receive_item::{ReceiveItem, ReceiveItemRequest};
pub use submit_shipment_info::{SubmitShipmentInfo, SubmitShipmentInfoRequest};

use std::time::Instant;

use common::EntityId;
use domain::{DomainError, Money, OrderEvent, ShipmentCostRequest};

use crate::events::EventBus;
use crate::services::ShipmentCostCalculator;

/// Result of applying a payment webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order changed.
    Applied,
    /// The order already reflected this payment; nothing changed.
    AlreadyApplied,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::AlreadyApplied => "already_applied",
        }
    }
}

fn record_duration(use_case: &'static str, started: Instant) {
    metrics::histogram!("use_case_duration_seconds", "use_case" => use_case)
        .record(started.elapsed().as_secs_f64());
}

/// Prices a route for a draft or an edit.
///
/// A calculator failure is a rejection of the attempt: it is counted and
/// published as `order.rejected.shipment_rate`, then returned unchanged.
async fn price_or_reject(
    calculator: &dyn ShipmentCostCalculator,
    events: &dyn EventBus,
    customer_id: EntityId,
    order_id: Option<EntityId>,
    request: ShipmentCostRequest,
) -> Result<Money, DomainError> {
    match calculator.get_rate(&request).await {
        Ok(rate) => Ok(rate),
        Err(err) => {
            metrics::counter!("orders_rejected_total", "reason" => "shipment_rate").increment(1);
            tracing::info!(error = %err, "shipment rate unavailable, order rejected");
            events.publish(OrderEvent::rejected_shipment_rate(
                order_id,
                customer_id,
                request.origin_country,
                request.destination_country,
            ));
            Err(err)
        }
    }
}
