//! Order entity and related types.

mod aggregate;
mod events;
mod item;
mod shipment;
mod state;

pub use aggregate::{Order, OrderDraft, OrderEdit};
pub use events::{
    ItemPhotosAddedData, ItemReceivedData, OrderDeletedData, OrderDraftedData, OrderEditedData,
    OrderEvent, OrderFinalizedData, OrderPaidData, OrderRejectedData, RejectionReason,
    ShipmentInfoSubmittedData,
};
pub use item::{Item, ItemPhoto, NewItem};
pub use shipment::{ShipmentCostRequest, ShipmentInfo};
pub use state::OrderStatus;

use common::EntityId;
use thiserror::Error;

/// Errors raised by order invariants.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The transition table has no edge for this operation.
    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    /// Item not found in order.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: EntityId },

    /// Item was already received by the host.
    #[error("Item already received: {item_id}")]
    ItemAlreadyReceived { item_id: EntityId },

    /// Shipment info requires every item to be received.
    #[error("{pending} item(s) not yet received")]
    ItemsNotReceived { pending: usize },

    /// Shipment info was already submitted; items are frozen.
    #[error("Shipment info already submitted")]
    ShipmentInfoAlreadySubmitted,

    /// The shipment fee cannot be paid before shipment info exists.
    #[error("Shipment info not submitted")]
    ShipmentInfoMissing,

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Item weight must be positive.
    #[error("Invalid weight: {weight_grams}g (must be greater than 0)")]
    InvalidWeight { weight_grams: u32 },
}
