//! Shipment cost inputs and host-submitted shipment details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Country, Money};

/// What the shipment cost calculator is asked to price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCostRequest {
    pub origin_country: Country,
    pub destination_country: Country,
    pub total_weight_grams: u64,
    pub item_count: usize,
}

/// Final shipment details submitted by the host once every item arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentInfo {
    pub cost: Money,
    #[serde(default)]
    pub tracking_number: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
