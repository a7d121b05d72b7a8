//! Host entity.

use common::EntityId;
use serde::{Deserialize, Serialize};

use crate::{Address, Entity, Order};

/// A fulfillment host that receives items in its country and ships them on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: EntityId,
    pub email: String,
    pub address: Address,
    /// Whether the host currently takes new orders.
    pub available: bool,
    #[serde(default)]
    pub order_ids: Vec<EntityId>,
}

impl Host {
    pub fn new(email: impl Into<String>, address: Address) -> Self {
        Self {
            id: EntityId::new(),
            email: email.into(),
            address,
            available: true,
            order_ids: Vec::new(),
        }
    }

    /// Records that this host fulfills `order`.
    pub fn accept_order(&mut self, order: &Order) {
        if !self.order_ids.contains(&order.id()) {
            self.order_ids.push(order.id());
        }
    }
}

impl Entity for Host {
    fn entity_type() -> &'static str {
        "Host"
    }

    fn id(&self) -> EntityId {
        self.id
    }
}
