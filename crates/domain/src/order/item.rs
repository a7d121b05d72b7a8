//! Items and their photos.

use chrono::{DateTime, Utc};
use common::EntityId;
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Item details supplied when drafting or editing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    pub store_name: String,
    pub weight_grams: u32,
}

impl NewItem {
    pub fn new(title: impl Into<String>, store_name: impl Into<String>, weight_grams: u32) -> Self {
        Self {
            title: title.into(),
            store_name: store_name.into(),
            weight_grams,
        }
    }
}

/// An item bought by the customer and delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityId,
    pub title: String,
    pub store_name: String,
    pub weight_grams: u32,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub photo_ids: Vec<EntityId>,
}

impl Item {
    /// Validates item details and assigns an ID.
    pub fn create(new: NewItem) -> Result<Self, OrderError> {
        if new.weight_grams == 0 {
            return Err(OrderError::InvalidWeight {
                weight_grams: new.weight_grams,
            });
        }
        Ok(Self {
            id: EntityId::new(),
            title: new.title,
            store_name: new.store_name,
            weight_grams: new.weight_grams,
            received_at: None,
            photo_ids: Vec::new(),
        })
    }

    pub fn is_received(&self) -> bool {
        self.received_at.is_some()
    }
}

/// A photo of a received item, stored apart from the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPhoto {
    pub id: EntityId,
    pub order_id: EntityId,
    pub item_id: EntityId,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ItemPhoto {
    pub fn new(
        order_id: EntityId,
        item_id: EntityId,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            order_id,
            item_id,
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }
}
