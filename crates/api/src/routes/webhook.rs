//! Payment processor webhook.

use std::sync::Arc;

use application::{WebhookError, parse_webhook_event, verify_webhook_signature};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    /// `applied`, `already_applied` or `ignored`.
    pub outcome: &'static str,
}

/// POST {webhook path}: verifies the signature and applies a paid checkout.
///
/// Events other than a paid `checkout.session.completed` are acknowledged and
/// ignored so the processor stops redelivering them.
#[tracing::instrument(skip_all)]
pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    match &state.webhook.secret {
        Some(secret) => {
            let signature = headers
                .get(SIGNATURE_HEADER)
                .and_then(|value| value.to_str().ok())
                .ok_or(WebhookError::MalformedHeader)?;
            verify_webhook_signature(
                &payload,
                signature,
                secret,
                state.webhook.tolerance,
                Utc::now(),
            )?;
        }
        None => tracing::warn!("Webhook signing secret not set, accepting unsigned event"),
    }

    let Some(checkout) = parse_webhook_event(&payload)? else {
        return Ok(Json(WebhookResponse {
            received: true,
            outcome: "ignored",
        }));
    };

    let outcome = state.payment_webhook.execute(checkout).await?;
    Ok(Json(WebhookResponse {
        received: true,
        outcome: outcome.as_str(),
    }))
}
