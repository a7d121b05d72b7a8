//! Stripe adapter: checkout sessions over the REST API and webhook handling.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::EntityId;
use domain::DomainError;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::payment::{
    CheckoutRequest, CheckoutSession, CompletedCheckout, PaymentGateway, PaymentPurpose,
};

type HmacSha256 = Hmac<Sha256>;

const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Stripe client configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`).
    pub api_key: String,
    /// API base URL (default: https://api.stripe.com)
    pub api_base: String,
    /// Pinned API version sent as `Stripe-Version`.
    pub api_version: String,
    pub currency: String,
    /// Where the customer lands after paying.
    pub success_url: String,
    /// Where the customer lands after abandoning checkout.
    pub cancel_url: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.stripe.com".to_string(),
            api_version: "2020-08-27".to_string(),
            currency: "usd".to_string(),
            success_url: String::new(),
            cancel_url: String::new(),
        }
    }
}

#[derive(Debug, Error)]
enum StripeError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("checkout session {0} has no url")]
    MissingUrl(String),
}

impl From<StripeError> for DomainError {
    fn from(err: StripeError) -> Self {
        let context = match &err {
            StripeError::Api { status, .. } => json!({ "status": status }),
            _ => Value::Null,
        };
        DomainError::internal(format!("Payment processor error: {err}")).with_context(context)
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// [`PaymentGateway`] creating Stripe Checkout sessions.
#[derive(Debug, Clone)]
pub struct StripePaymentGateway {
    client: Client,
    config: StripeConfig,
}

impl StripePaymentGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn form(&self, request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("mode", "payment".to_string()),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
            ("client_reference_id", request.order_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.config.currency.clone()),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount.cents().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.description.clone(),
            ),
            ("metadata[order_id]", request.order_id.to_string()),
            ("metadata[customer_id]", request.customer_id.to_string()),
            ("metadata[purpose]", request.purpose.to_string()),
        ];
        if let Some(host_id) = request.host_id {
            form.push(("metadata[host_id]", host_id.to_string()));
        }
        form
    }

    async fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .header("Stripe-Version", &self.config.api_version)
            .form(&self.form(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => status.to_string(),
            };
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response.json().await?;
        let url = session.url.ok_or_else(|| StripeError::MissingUrl(session.id.clone()))?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    #[instrument(
        skip(self, request),
        fields(order_id = %request.order_id, purpose = %request.purpose)
    )]
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, DomainError> {
        let session = self.create_session(&request).await?;
        debug!(session_id = %session.id, amount = %request.amount, "Checkout session created");
        Ok(session)
    }
}

/// Webhook verification and parsing errors.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Timestamp outside the tolerance window")]
    TimestampOutOfTolerance,

    #[error("No signature matches the payload")]
    SignatureMismatch,

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Invalid checkout metadata: {0}")]
    Metadata(String),
}

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The signed content is `"{t}.{payload}"`. Any `v1` entry may match.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: Duration,
    now: DateTime<Utc>,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }
    if now.timestamp().abs_diff(timestamp) > tolerance.num_seconds().unsigned_abs() {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            warn!("Failed to decode signature hex");
            continue;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return Err(WebhookError::SignatureMismatch);
        };
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(WebhookError::SignatureMismatch)
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutObject {
    id: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Extracts a paid checkout from a webhook payload.
///
/// Other event types and unpaid sessions yield `None`.
pub fn parse_webhook_event(payload: &[u8]) -> Result<Option<CompletedCheckout>, WebhookError> {
    let event: StripeEvent = serde_json::from_slice(payload)?;
    if event.event_type != CHECKOUT_COMPLETED {
        debug!(event_type = %event.event_type, "Ignoring webhook event");
        return Ok(None);
    }

    let checkout: CheckoutObject = serde_json::from_value(event.data.object)?;
    if checkout.payment_status.as_deref().is_some_and(|status| status != "paid") {
        debug!(session_id = %checkout.id, "Ignoring unpaid checkout");
        return Ok(None);
    }

    let order_id = metadata_id(&checkout.metadata, "order_id")?
        .ok_or_else(|| WebhookError::Metadata("order_id is missing".to_string()))?;
    let purpose = checkout
        .metadata
        .get("purpose")
        .ok_or_else(|| WebhookError::Metadata("purpose is missing".to_string()))?
        .parse::<PaymentPurpose>()
        .map_err(|e| WebhookError::Metadata(e.message))?;
    let host_id = metadata_id(&checkout.metadata, "host_id")?;

    Ok(Some(CompletedCheckout {
        event_id: event.id,
        session_id: checkout.id,
        order_id,
        purpose,
        host_id,
    }))
}

fn metadata_id(
    metadata: &HashMap<String, String>,
    key: &str,
) -> Result<Option<EntityId>, WebhookError> {
    metadata
        .get(key)
        .map(|value| {
            value
                .parse::<EntityId>()
                .map_err(|e| WebhookError::Metadata(format!("{key}: {e}")))
        })
        .transpose()
}
