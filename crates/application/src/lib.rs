//! Application layer for the order lifecycle service.
//!
//! Use cases orchestrate the domain inside document-store transactions:
//! 1. Open a session and load the entities involved
//! 2. Consult external ports (host matching, shipment pricing, payments)
//! 3. Apply the domain transition and write every touched document
//! 4. Commit, then publish the resulting event
//!
//! Any failure before commit aborts the whole transaction.

pub mod events;
pub mod listeners;
pub mod repositories;
pub mod services;
pub mod use_cases;

pub use events::{BroadcastEventBus, EventBus, InMemoryEventBus};
pub use listeners::{EventDispatcher, EventListener, NotificationListener};
pub use repositories::{
    CustomerRepository, DocumentCustomerRepository, DocumentHostRepository,
    DocumentOrderRepository, HostRepository, OrderField, OrderFilter, OrderProperties,
    OrderRepository,
};
pub use services::{
    CheckoutRequest, CheckoutSession, CompletedCheckout, DocumentHostMatcher, EmailData,
    EmailService, HostMatcher, InMemoryEmailService, InMemoryHostMatcher,
    InMemoryPaymentGateway, InMemoryShipmentCostCalculator, MandrillConfig, MandrillEmailService,
    PaymentGateway, PaymentPurpose, ShipmentCostCalculator, StripeConfig, StripePaymentGateway,
    WebhookError, WeightBasedCostCalculator, parse_webhook_event, send_email_logged,
    verify_webhook_signature,
};
pub use use_cases::*;
