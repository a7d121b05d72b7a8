//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Drafted ──┬──► Finalized ──► Paid
///           │
///           └──► Rejected
/// ```
///
/// An order only exists once drafted; `Paid` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Rate calculated, awaiting service-fee payment. Editable and deletable.
    #[default]
    Drafted,

    /// Service fee paid and host assigned; items are received and shipped.
    Finalized,

    /// Shipment fee paid (terminal state).
    Paid,

    /// No host could take the order (terminal state).
    Rejected,
}

impl OrderStatus {
    /// The transition table. Every other edge is an invariant violation.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Drafted, OrderStatus::Finalized)
                | (OrderStatus::Drafted, OrderStatus::Rejected)
                | (OrderStatus::Finalized, OrderStatus::Paid)
        )
    }

    /// Returns true if items, origin and destination can be edited.
    pub fn can_edit(&self) -> bool {
        matches!(self, OrderStatus::Drafted)
    }

    /// Returns true if the order can be deleted.
    pub fn can_delete(&self) -> bool {
        matches!(self, OrderStatus::Drafted)
    }

    /// Returns true if hosts can receive and photograph items.
    pub fn can_handle_items(&self) -> bool {
        matches!(self, OrderStatus::Finalized)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Rejected)
    }

    /// Returns the status name as stored in documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Drafted => "Drafted",
            OrderStatus::Finalized => "Finalized",
            OrderStatus::Paid => "Paid",
            OrderStatus::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
