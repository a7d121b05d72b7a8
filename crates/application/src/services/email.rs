//! Email delivery port and the Mandrill adapter.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::DomainError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{instrument, warn};

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailData {
    /// Sender; the service default is used when absent.
    pub from: Option<String>,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Sends email.
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_email(&self, email: EmailData) -> Result<(), DomainError>;
}

/// Sends `email` and logs a failure instead of returning it.
///
/// Notifications never fail the operation that triggered them.
pub async fn send_email_logged(service: &dyn EmailService, email: EmailData) {
    let to = email.to.clone();
    let subject = email.subject.clone();
    match service.send_email(email).await {
        Ok(()) => metrics::counter!("emails_sent_total", "outcome" => "sent").increment(1),
        Err(e) => {
            metrics::counter!("emails_sent_total", "outcome" => "failed").increment(1);
            warn!(error = %e, to = %to, subject = %subject, "Error sending email");
        }
    }
}

/// Mandrill client configuration.
#[derive(Debug, Clone)]
pub struct MandrillConfig {
    pub api_key: String,
    /// API base URL (default: https://mandrillapp.com/api/1.0)
    pub api_base: String,
    /// Sender used when an email has none.
    pub default_from: String,
}

impl Default for MandrillConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://mandrillapp.com/api/1.0".to_string(),
            default_from: String::new(),
        }
    }
}

#[derive(Debug, Error)]
enum MandrillError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("message to {email} was {status}: {reason}")]
    Rejected {
        email: String,
        status: String,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct SendResult {
    email: String,
    status: String,
    #[serde(default)]
    reject_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
}

/// [`EmailService`] over the Mandrill transactional API.
#[derive(Debug, Clone)]
pub struct MandrillEmailService {
    client: Client,
    config: MandrillConfig,
}

impl MandrillEmailService {
    pub fn new(config: MandrillConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn send(&self, email: &EmailData) -> Result<(), MandrillError> {
        let from = email.from.as_deref().unwrap_or(&self.config.default_from);
        let body = json!({
            "key": self.config.api_key,
            "message": {
                "from_email": from,
                "subject": email.subject,
                "text": email.text,
                "to": [{ "email": email.to, "type": "to" }],
            },
        });

        let response = self
            .client
            .post(format!("{}/messages/send.json", self.config.api_base))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorResponse>().await {
                Ok(body) => body.message,
                Err(_) => status.to_string(),
            };
            return Err(MandrillError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let results: Vec<SendResult> = response.json().await?;
        if let Some(result) = results
            .into_iter()
            .find(|r| r.status == "rejected" || r.status == "invalid")
        {
            return Err(MandrillError::Rejected {
                email: result.email,
                status: result.status,
                reason: result.reject_reason.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmailService for MandrillEmailService {
    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send_email(&self, email: EmailData) -> Result<(), DomainError> {
        self.send(&email).await.map_err(|e| {
            DomainError::internal(format!("Error sending email: {e}"))
                .with_context(json!({ "to": email.to, "subject": email.subject }))
        })
    }
}

#[derive(Debug, Default)]
struct InMemoryEmailState {
    sent: Vec<EmailData>,
    fail: bool,
}

/// In-memory email service for testing. Keeps every email sent.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmailService {
    state: Arc<RwLock<InMemoryEmailState>>,
}

impl InMemoryEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail = fail;
    }

    pub fn sent(&self) -> Vec<EmailData> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl EmailService for InMemoryEmailService {
    async fn send_email(&self, email: EmailData) -> Result<(), DomainError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(DomainError::internal("Mail server unavailable"));
        }
        state.sent.push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> EmailData {
        EmailData {
            from: None,
            to: "jane@example.com".to_string(),
            subject: "Order finalized".to_string(),
            text: "Your order is on its way to the host.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_logged_send_swallows_failures() {
        let service = InMemoryEmailService::new();
        service.set_fail(true);
        send_email_logged(&service, email()).await;
        assert!(service.sent().is_empty());

        service.set_fail(false);
        send_email_logged(&service, email()).await;
        assert_eq!(service.sent(), vec![email()]);
    }
}
