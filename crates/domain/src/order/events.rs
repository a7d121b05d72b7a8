//! Order domain events.

use chrono::{DateTime, Utc};
use common::EntityId;
use serde::{Deserialize, Serialize};

use crate::{Country, DomainEvent, Money};

/// Events that can occur during an order's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was drafted with a shipment rate.
    OrderDrafted(OrderDraftedData),

    /// Order could not be placed or could not find a host.
    OrderRejected(OrderRejectedData),

    /// Drafted order was edited and re-priced.
    OrderEdited(OrderEditedData),

    /// Drafted order was deleted by its customer.
    OrderDeleted(OrderDeletedData),

    /// Service fee paid, host assigned.
    OrderFinalized(OrderFinalizedData),

    /// Host received an item.
    ItemReceived(ItemReceivedData),

    /// Host attached photos to an item.
    ItemPhotosAdded(ItemPhotosAddedData),

    /// Host submitted the final shipment cost.
    ShipmentInfoSubmitted(ShipmentInfoSubmittedData),

    /// Shipment fee paid.
    OrderPaid(OrderPaidData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderDrafted(_) => "order.drafted",
            OrderEvent::OrderRejected(data) => match data.reason {
                RejectionReason::ServiceAvailability => "order.rejected.service_availability",
                RejectionReason::NoHostAvailable => "order.rejected.no_host",
                RejectionReason::ShipmentRate => "order.rejected.shipment_rate",
            },
            OrderEvent::OrderEdited(_) => "order.edited",
            OrderEvent::OrderDeleted(_) => "order.deleted",
            OrderEvent::OrderFinalized(_) => "order.finalized",
            OrderEvent::ItemReceived(_) => "order.item_received",
            OrderEvent::ItemPhotosAdded(_) => "order.item_photos_added",
            OrderEvent::ShipmentInfoSubmitted(_) => "order.shipment_info_submitted",
            OrderEvent::OrderPaid(_) => "order.paid",
        }
    }
}

impl OrderEvent {
    /// The order the event is about. Rejections at draft time have none.
    pub fn order_id(&self) -> Option<EntityId> {
        match self {
            OrderEvent::OrderDrafted(data) => Some(data.order_id),
            OrderEvent::OrderRejected(data) => data.order_id,
            OrderEvent::OrderEdited(data) => Some(data.order_id),
            OrderEvent::OrderDeleted(data) => Some(data.order_id),
            OrderEvent::OrderFinalized(data) => Some(data.order_id),
            OrderEvent::ItemReceived(data) => Some(data.order_id),
            OrderEvent::ItemPhotosAdded(data) => Some(data.order_id),
            OrderEvent::ShipmentInfoSubmitted(data) => Some(data.order_id),
            OrderEvent::OrderPaid(data) => Some(data.order_id),
        }
    }

    /// A draft that failed the service availability check. Nothing was persisted.
    pub fn rejected_service_availability(
        customer_id: EntityId,
        origin_country: Country,
        destination_country: Country,
    ) -> Self {
        OrderEvent::OrderRejected(OrderRejectedData {
            order_id: None,
            customer_id,
            origin_country,
            destination_country,
            reason: RejectionReason::ServiceAvailability,
            rejected_at: Utc::now(),
        })
    }

    /// The route could not be priced. `order_id` is set when an existing
    /// draft was being edited; the stored order is unchanged.
    pub fn rejected_shipment_rate(
        order_id: Option<EntityId>,
        customer_id: EntityId,
        origin_country: Country,
        destination_country: Country,
    ) -> Self {
        OrderEvent::OrderRejected(OrderRejectedData {
            order_id,
            customer_id,
            origin_country,
            destination_country,
            reason: RejectionReason::ShipmentRate,
            rejected_at: Utc::now(),
        })
    }
}

/// Why an order was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Origin or destination is not served.
    ServiceAvailability,
    /// No available host in the origin country at confirmation time.
    NoHostAvailable,
    /// The shipment cost calculator could not price the route.
    ShipmentRate,
}

/// Data for OrderDrafted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraftedData {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub origin_country: Country,
    pub destination_country: Country,
    pub shipment_rate: Money,
    pub item_count: usize,
    pub drafted_at: DateTime<Utc>,
}

/// Data for OrderRejected event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejectedData {
    pub order_id: Option<EntityId>,
    pub customer_id: EntityId,
    pub origin_country: Country,
    pub destination_country: Country,
    pub reason: RejectionReason,
    pub rejected_at: DateTime<Utc>,
}

/// Data for OrderEdited event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEditedData {
    pub order_id: EntityId,
    pub shipment_rate: Money,
    pub edited_at: DateTime<Utc>,
}

/// Data for OrderDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDeletedData {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub deleted_at: DateTime<Utc>,
}

/// Data for OrderFinalized event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFinalizedData {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub host_id: EntityId,
    pub finalized_at: DateTime<Utc>,
}

/// Data for ItemReceived event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReceivedData {
    pub order_id: EntityId,
    pub item_id: EntityId,
    pub received_at: DateTime<Utc>,
}

/// Data for ItemPhotosAdded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPhotosAddedData {
    pub order_id: EntityId,
    pub item_id: EntityId,
    pub photo_ids: Vec<EntityId>,
}

/// Data for ShipmentInfoSubmitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentInfoSubmittedData {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub host_id: EntityId,
    pub cost: Money,
    pub tracking_number: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Data for OrderPaid event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaidData {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub host_id: EntityId,
    pub paid_at: DateTime<Utc>,
}
