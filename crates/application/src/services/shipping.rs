//! Shipment cost calculation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{DomainError, Money, ShipmentCostRequest};
use serde_json::json;

/// Prices a shipment.
#[async_trait]
pub trait ShipmentCostCalculator: Send + Sync {
    async fn get_rate(&self, request: &ShipmentCostRequest) -> Result<Money, DomainError>;
}

/// Flat base price plus a price per started kilogram.
#[derive(Debug, Clone)]
pub struct WeightBasedCostCalculator {
    base: Money,
    per_kg: Money,
    max_weight_grams: u64,
}

impl WeightBasedCostCalculator {
    pub fn new(base: Money, per_kg: Money, max_weight_grams: u64) -> Self {
        Self {
            base,
            per_kg,
            max_weight_grams,
        }
    }
}

#[async_trait]
impl ShipmentCostCalculator for WeightBasedCostCalculator {
    #[tracing::instrument(skip(self), fields(weight_grams = request.total_weight_grams))]
    async fn get_rate(&self, request: &ShipmentCostRequest) -> Result<Money, DomainError> {
        if request.total_weight_grams > self.max_weight_grams {
            return Err(DomainError::validation(format!(
                "Shipment of {} g exceeds the maximum of {} g",
                request.total_weight_grams, self.max_weight_grams
            ))
            .with_context(json!({
                "total_weight_grams": request.total_weight_grams,
                "max_weight_grams": self.max_weight_grams,
            })));
        }
        let kilograms = request.total_weight_grams.div_ceil(1000);
        let kilograms = u32::try_from(kilograms)
            .map_err(|_| DomainError::validation("Shipment weight out of range"))?;
        self.base.checked_add(self.per_kg.checked_mul(kilograms)?)
    }
}

#[derive(Debug, Default)]
struct InMemoryCalculatorState {
    rate: Money,
    fail: bool,
    requests: Vec<ShipmentCostRequest>,
}

/// In-memory calculator for testing. Returns a fixed rate.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShipmentCostCalculator {
    state: Arc<RwLock<InMemoryCalculatorState>>,
}

impl InMemoryShipmentCostCalculator {
    pub fn new(rate: Money) -> Self {
        let calculator = Self::default();
        calculator.set_rate(rate);
        calculator
    }

    pub fn set_rate(&self, rate: Money) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).rate = rate;
    }

    /// Configures the calculator to fail on every call.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail = fail;
    }

    pub fn requests(&self) -> Vec<ShipmentCostRequest> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }
}

#[async_trait]
impl ShipmentCostCalculator for InMemoryShipmentCostCalculator {
    async fn get_rate(&self, request: &ShipmentCostRequest) -> Result<Money, DomainError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(DomainError::internal("Shipment rate unavailable"));
        }
        state.requests.push(request.clone());
        Ok(state.rate)
    }
}
