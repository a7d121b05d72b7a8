//! Customer entity.

use common::EntityId;
use serde::{Deserialize, Serialize};

use crate::{Address, Entity, Order};

/// A customer placing orders. Owns its orders by ID reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub email: String,
    /// Destination used for new orders.
    pub selected_address: Address,
    #[serde(default)]
    pub order_ids: Vec<EntityId>,
}

impl Customer {
    pub fn new(email: impl Into<String>, selected_address: Address) -> Self {
        Self {
            id: EntityId::new(),
            email: email.into(),
            selected_address,
            order_ids: Vec::new(),
        }
    }

    /// Records ownership of a freshly drafted order.
    pub fn accept_order(&mut self, order: &Order) {
        if !self.owns_order(order.id()) {
            self.order_ids.push(order.id());
        }
    }

    pub fn owns_order(&self, order_id: EntityId) -> bool {
        self.order_ids.contains(&order_id)
    }
}

impl Entity for Customer {
    fn entity_type() -> &'static str {
        "Customer"
    }

    fn id(&self) -> EntityId {
        self.id
    }
}
