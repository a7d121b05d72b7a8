//! Ports to external services and their adapters.
//!
//! Each port is an `async_trait` with an in-memory implementation for tests
//! and local runs, plus a production adapter where one exists.

mod email;
mod host_matcher;
mod payment;
mod shipping;
mod stripe;

pub use email::{
    EmailData, EmailService, InMemoryEmailService, MandrillConfig, MandrillEmailService,
    send_email_logged,
};
pub use host_matcher::{DocumentHostMatcher, HostMatcher, InMemoryHostMatcher};
pub use payment::{
    CheckoutRequest, CheckoutSession, CompletedCheckout, InMemoryPaymentGateway, PaymentGateway,
    PaymentPurpose,
};
pub use shipping::{
    InMemoryShipmentCostCalculator, ShipmentCostCalculator, WeightBasedCostCalculator,
};
pub use stripe::{
    StripeConfig, StripePaymentGateway, WebhookError, parse_webhook_event,
    verify_webhook_signature,
};
