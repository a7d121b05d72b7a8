//! Order entity implementation.

use std::future::Future;

use chrono::{DateTime, Utc};
use common::EntityId;
use serde::{Deserialize, Serialize};

use crate::{Address, Country, DomainError, Entity, Money};

use super::{
    Item, NewItem, OrderError, OrderEvent, OrderStatus, RejectionReason, ShipmentCostRequest,
    ShipmentInfo,
    events::{
        ItemPhotosAddedData, ItemReceivedData, OrderDeletedData, OrderDraftedData,
        OrderEditedData, OrderFinalizedData, OrderPaidData, OrderRejectedData,
        ShipmentInfoSubmittedData,
    },
};

/// An order that has not been priced yet. Never persisted.
///
/// [`OrderDraft::draft`] turns it into a [`Order`] in `Drafted` status.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    customer_id: EntityId,
    origin_country: Country,
    destination: Address,
    items: Vec<NewItem>,
}

impl OrderDraft {
    pub fn new(
        customer_id: EntityId,
        origin_country: Country,
        destination: Address,
        items: Vec<NewItem>,
    ) -> Self {
        Self {
            customer_id,
            origin_country,
            destination,
            items,
        }
    }

    pub fn origin_country(&self) -> &Country {
        &self.origin_country
    }

    pub fn destination_country(&self) -> &Country {
        &self.destination.country
    }

    /// Validates the items and prices the order with `rate`.
    ///
    /// If `rate` fails the draft fails with its error; no order exists.
    pub async fn draft<F, Fut>(self, rate: F) -> Result<Order, DomainError>
    where
        F: FnOnce(ShipmentCostRequest) -> Fut,
        Fut: Future<Output = Result<Money, DomainError>>,
    {
        let items = create_items(self.items)?;
        let request = cost_request(&self.origin_country, &self.destination, &items);
        let shipment_rate = rate(request).await?;

        Ok(Order {
            id: EntityId::new(),
            customer_id: self.customer_id,
            host_id: None,
            status: OrderStatus::Drafted,
            origin_country: self.origin_country,
            destination: self.destination,
            items,
            shipment_rate,
            shipment_info: None,
            drafted_at: Utc::now(),
            finalized_at: None,
            paid_at: None,
            rejected_at: None,
        })
    }
}

/// Changes a customer may make to a drafted order. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct OrderEdit {
    pub origin_country: Option<Country>,
    pub destination: Option<Address>,
    pub items: Option<Vec<NewItem>>,
}

impl OrderEdit {
    pub fn is_empty(&self) -> bool {
        self.origin_country.is_none() && self.destination.is_none() && self.items.is_none()
    }
}

/// Order entity.
///
/// Represents an order from drafting to shipment-fee payment or rejection.
/// Mutating methods enforce the status transition table and return the event
/// describing the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: EntityId,
    customer_id: EntityId,
    #[serde(default)]
    host_id: Option<EntityId>,
    status: OrderStatus,
    origin_country: Country,
    destination: Address,
    items: Vec<Item>,
    shipment_rate: Money,
    #[serde(default)]
    shipment_info: Option<ShipmentInfo>,
    drafted_at: DateTime<Utc>,
    #[serde(default)]
    finalized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    rejected_at: Option<DateTime<Utc>>,
}

impl Entity for Order {
    fn entity_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn customer_id(&self) -> EntityId {
        self.customer_id
    }

    pub fn host_id(&self) -> Option<EntityId> {
        self.host_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn origin_country(&self) -> &Country {
        &self.origin_country
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, item_id: EntityId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn shipment_rate(&self) -> Money {
        self.shipment_rate
    }

    pub fn shipment_info(&self) -> Option<&ShipmentInfo> {
        self.shipment_info.as_ref()
    }

    pub fn drafted_at(&self) -> DateTime<Utc> {
        self.drafted_at
    }

    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn is_owned_by(&self, customer_id: EntityId) -> bool {
        self.customer_id == customer_id
    }

    pub fn total_weight_grams(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.weight_grams)).sum()
    }

    /// Event announcing this order was drafted.
    pub fn drafted_event(&self) -> OrderEvent {
        OrderEvent::OrderDrafted(OrderDraftedData {
            order_id: self.id,
            customer_id: self.customer_id,
            origin_country: self.origin_country.clone(),
            destination_country: self.destination.country.clone(),
            shipment_rate: self.shipment_rate,
            item_count: self.items.len(),
            drafted_at: self.drafted_at,
        })
    }
}

// Command methods (mutate and return the resulting event)
impl Order {
    /// Replaces origin, destination and/or items and re-prices the order.
    ///
    /// The order is left untouched if validation or pricing fails.
    pub async fn edit<F, Fut>(
        &mut self,
        edit: OrderEdit,
        rate: F,
    ) -> Result<OrderEvent, DomainError>
    where
        F: FnOnce(ShipmentCostRequest) -> Fut,
        Fut: Future<Output = Result<Money, DomainError>>,
    {
        self.ensure(self.status.can_edit(), "edit")?;

        let origin_country = edit.origin_country.unwrap_or_else(|| self.origin_country.clone());
        let destination = edit.destination.unwrap_or_else(|| self.destination.clone());
        let items = match edit.items {
            Some(items) => create_items(items)?,
            None => self.items.clone(),
        };

        let shipment_rate = rate(cost_request(&origin_country, &destination, &items)).await?;

        self.origin_country = origin_country;
        self.destination = destination;
        self.items = items;
        self.shipment_rate = shipment_rate;

        Ok(OrderEvent::OrderEdited(OrderEditedData {
            order_id: self.id,
            shipment_rate,
            edited_at: Utc::now(),
        }))
    }

    /// Checks that the order may be deleted and returns the deletion event.
    pub fn delete(&self) -> Result<OrderEvent, OrderError> {
        self.ensure(self.status.can_delete(), "delete")?;
        Ok(OrderEvent::OrderDeleted(OrderDeletedData {
            order_id: self.id,
            customer_id: self.customer_id,
            deleted_at: Utc::now(),
        }))
    }

    /// Service fee settled: assigns the host.
    pub fn confirm(
        &mut self,
        host_id: EntityId,
        now: DateTime<Utc>,
    ) -> Result<OrderEvent, OrderError> {
        self.transition(OrderStatus::Finalized, "confirm")?;
        self.host_id = Some(host_id);
        self.finalized_at = Some(now);

        Ok(OrderEvent::OrderFinalized(OrderFinalizedData {
            order_id: self.id,
            customer_id: self.customer_id,
            host_id,
            finalized_at: now,
        }))
    }

    /// No host could take the order.
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<OrderEvent, OrderError> {
        self.transition(OrderStatus::Rejected, "reject")?;
        self.rejected_at = Some(now);

        Ok(OrderEvent::OrderRejected(OrderRejectedData {
            order_id: Some(self.id),
            customer_id: self.customer_id,
            origin_country: self.origin_country.clone(),
            destination_country: self.destination.country.clone(),
            reason: RejectionReason::NoHostAvailable,
            rejected_at: now,
        }))
    }

    /// Marks an item as delivered to the host.
    pub fn receive_item(
        &mut self,
        item_id: EntityId,
        now: DateTime<Utc>,
    ) -> Result<OrderEvent, OrderError> {
        self.ensure_items_open("receive item")?;
        let item = self.item_mut(item_id)?;
        if item.is_received() {
            return Err(OrderError::ItemAlreadyReceived { item_id });
        }
        item.received_at = Some(now);

        Ok(OrderEvent::ItemReceived(ItemReceivedData {
            order_id: self.id,
            item_id,
            received_at: now,
        }))
    }

    /// Attaches stored photos to an item.
    pub fn add_item_photos(
        &mut self,
        item_id: EntityId,
        photo_ids: Vec<EntityId>,
    ) -> Result<OrderEvent, OrderError> {
        self.ensure_items_open("add item photos")?;
        let item = self.item_mut(item_id)?;
        item.photo_ids.extend(photo_ids.iter().copied());

        Ok(OrderEvent::ItemPhotosAdded(ItemPhotosAddedData {
            order_id: self.id,
            item_id,
            photo_ids,
        }))
    }

    /// Records the final shipment cost. Every item must have been received.
    pub fn submit_shipment_info(
        &mut self,
        cost: Money,
        tracking_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OrderEvent, OrderError> {
        self.ensure_items_open("submit shipment info")?;
        let pending = self.items.iter().filter(|item| !item.is_received()).count();
        if pending > 0 {
            return Err(OrderError::ItemsNotReceived { pending });
        }
        let host_id = self.assigned_host()?;

        self.shipment_info = Some(ShipmentInfo {
            cost,
            tracking_number: tracking_number.clone(),
            submitted_at: now,
        });

        Ok(OrderEvent::ShipmentInfoSubmitted(ShipmentInfoSubmittedData {
            order_id: self.id,
            customer_id: self.customer_id,
            host_id,
            cost,
            tracking_number,
            submitted_at: now,
        }))
    }

    /// Shipment fee settled.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<OrderEvent, OrderError> {
        if !self.status.can_transition_to(OrderStatus::Paid) {
            return Err(self.invalid("mark paid"));
        }
        if self.shipment_info.is_none() {
            return Err(OrderError::ShipmentInfoMissing);
        }
        let host_id = self.assigned_host()?;
        self.status = OrderStatus::Paid;
        self.paid_at = Some(now);

        Ok(OrderEvent::OrderPaid(OrderPaidData {
            order_id: self.id,
            customer_id: self.customer_id,
            host_id,
            paid_at: now,
        }))
    }

    fn transition(&mut self, next: OrderStatus, action: &'static str) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid(action));
        }
        self.status = next;
        Ok(())
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if allowed { Ok(()) } else { Err(self.invalid(action)) }
    }

    /// Items can change while Finalized and until shipment info is submitted.
    fn ensure_items_open(&self, action: &'static str) -> Result<(), OrderError> {
        self.ensure(self.status.can_handle_items(), action)?;
        if self.shipment_info.is_some() {
            return Err(OrderError::ShipmentInfoAlreadySubmitted);
        }
        Ok(())
    }

    fn assigned_host(&self) -> Result<EntityId, OrderError> {
        self.host_id.ok_or_else(|| self.invalid("use host"))
    }

    fn item_mut(&mut self, item_id: EntityId) -> Result<&mut Item, OrderError> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(OrderError::ItemNotFound { item_id })
    }

    fn invalid(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_status: self.status,
            action,
        }
    }
}

fn create_items(items: Vec<NewItem>) -> Result<Vec<Item>, OrderError> {
    if items.is_empty() {
        return Err(OrderError::NoItems);
    }
    items.into_iter().map(Item::create).collect()
}

fn cost_request(origin: &Country, destination: &Address, items: &[Item]) -> ShipmentCostRequest {
    ShipmentCostRequest {
        origin_country: origin.clone(),
        destination_country: destination.country.clone(),
        total_weight_grams: items.iter().map(|item| u64::from(item.weight_grams)).sum(),
        item_count: items.len(),
    }
}
