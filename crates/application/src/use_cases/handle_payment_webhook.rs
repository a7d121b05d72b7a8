use std::sync::Arc;

use domain::DomainError;
use serde_json::json;

use super::{
    FinalizeOrder, FinalizeOrderRequest, PayOrderShipmentFee, PayOrderShipmentFeeRequest,
    WebhookOutcome,
};
use crate::services::{CompletedCheckout, PaymentPurpose};

/// Routes a paid checkout to the use case for its purpose.
pub struct HandlePaymentWebhook {
    finalize_order: Arc<FinalizeOrder>,
    pay_order_shipment_fee: Arc<PayOrderShipmentFee>,
}

impl HandlePaymentWebhook {
    pub fn new(
        finalize_order: Arc<FinalizeOrder>,
        pay_order_shipment_fee: Arc<PayOrderShipmentFee>,
    ) -> Self {
        Self {
            finalize_order,
            pay_order_shipment_fee,
        }
    }

    #[tracing::instrument(
        skip(self, checkout),
        fields(
            event_id = %checkout.event_id,
            order_id = %checkout.order_id,
            purpose = %checkout.purpose
        )
    )]
    pub async fn execute(
        &self,
        checkout: CompletedCheckout,
    ) -> Result<WebhookOutcome, DomainError> {
        let result = match checkout.purpose {
            PaymentPurpose::ServiceFee => {
                let host_id = checkout.host_id.ok_or_else(|| {
                    DomainError::validation("Service fee checkout has no host")
                        .with_context(json!({ "order_id": checkout.order_id }))
                })?;
                self.finalize_order
                    .execute(FinalizeOrderRequest {
                        order_id: checkout.order_id,
                        host_id,
                    })
                    .await
            }
            PaymentPurpose::ShipmentFee => {
                self.pay_order_shipment_fee
                    .execute(PayOrderShipmentFeeRequest {
                        order_id: checkout.order_id,
                    })
                    .await
            }
        };

        let outcome = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "failed",
        };
        metrics::counter!(
            "payment_webhooks_total",
            "purpose" => checkout.purpose.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }
}
