//! Payment gateway port: hosted checkout sessions for the two order fees.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::EntityId;
use domain::{DomainError, Money};
use serde::{Deserialize, Serialize};

/// What a checkout pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    /// Paid at confirmation; finalizes the order.
    ServiceFee,
    /// Paid once the host submitted the shipment cost.
    ShipmentFee,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::ServiceFee => "service_fee",
            PaymentPurpose::ShipmentFee => "shipment_fee",
        }
    }
}

impl std::fmt::Display for PaymentPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentPurpose {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service_fee" => Ok(PaymentPurpose::ServiceFee),
            "shipment_fee" => Ok(PaymentPurpose::ShipmentFee),
            other => Err(DomainError::validation(format!("Unknown payment purpose: {other}"))),
        }
    }
}

/// A checkout to open for one order.
///
/// The identifiers travel through the payment processor as metadata and come
/// back in the completion webhook as a [`CompletedCheckout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub host_id: Option<EntityId>,
    pub purpose: PaymentPurpose,
    pub amount: Money,
    pub description: String,
}

/// A hosted checkout the customer is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A paid checkout reported by the payment processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheckout {
    pub event_id: String,
    pub session_id: String,
    pub order_id: EntityId,
    pub purpose: PaymentPurpose,
    pub host_id: Option<EntityId>,
}

/// Opens checkout sessions with the payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, DomainError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    requests: Vec<(String, CheckoutRequest)>,
    next_id: u32,
    fail_on_checkout: bool,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail on every checkout call.
    pub fn set_fail_on_checkout(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_checkout = fail;
    }

    /// Returns the number of checkout sessions opened.
    pub fn checkout_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .len()
    }

    /// Returns the request behind a session ID.
    pub fn request(&self, session_id: &str) -> Option<CheckoutRequest> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .iter()
            .find(|(id, _)| id == session_id)
            .map(|(_, request)| request.clone())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, DomainError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_checkout {
            return Err(DomainError::internal("Payment processor unavailable"));
        }

        state.next_id += 1;
        let id = format!("cs_test_{:04}", state.next_id);
        state.requests.push((id.clone(), request));

        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{id}"),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(purpose: PaymentPurpose) -> CheckoutRequest {
        CheckoutRequest {
            order_id: EntityId::new(),
            customer_id: EntityId::new(),
            host_id: None,
            purpose,
            amount: Money::from_cents(1500),
            description: "Service fee".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sequential_session_ids() {
        let gateway = InMemoryPaymentGateway::new();

        let s1 = gateway
            .create_checkout_session(request(PaymentPurpose::ServiceFee))
            .await
            .unwrap();
        let s2 = gateway
            .create_checkout_session(request(PaymentPurpose::ShipmentFee))
            .await
            .unwrap();

        assert_eq!(s1.id, "cs_test_0001");
        assert_eq!(s2.id, "cs_test_0002");
        assert_eq!(s2.url, "https://checkout.test/pay/cs_test_0002");
        assert_eq!(
            gateway.request(&s2.id).unwrap().purpose,
            PaymentPurpose::ShipmentFee
        );
    }

    #[tokio::test]
    async fn test_fail_on_checkout() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_checkout(true);

        let result = gateway
            .create_checkout_session(request(PaymentPurpose::ServiceFee))
            .await;
        assert!(result.is_err());
        assert_eq!(gateway.checkout_count(), 0);
    }

    #[test]
    fn test_purpose_round_trips_through_str() {
        for purpose in [PaymentPurpose::ServiceFee, PaymentPurpose::ShipmentFee] {
            assert_eq!(purpose.as_str().parse::<PaymentPurpose>().unwrap(), purpose);
        }
        assert!("tip".parse::<PaymentPurpose>().is_err());
    }
}
