//! Adapter wiring and shared handler state.

use std::sync::Arc;

use application::{
    AddItemPhotos, ConfirmOrder, CreateOrder, CustomerRepository, DeleteOrder,
    DocumentCustomerRepository, DocumentHostMatcher, DocumentHostRepository,
    DocumentOrderRepository, EditOrder, EmailService, EventBus, FinalizeOrder, GetOrder,
    HandlePaymentWebhook, HostMatcher, HostRepository, InMemoryEmailService,
    InMemoryPaymentGateway, MandrillEmailService, OrderRepository, PayOrderShipmentFee,
    PayShipment, PaymentGateway, ReceiveItem, ShipmentCostCalculator, StripePaymentGateway,
    SubmitShipmentInfo, WeightBasedCostCalculator,
};
use document_store::DocumentStore;
use domain::Money;

use crate::config::Config;

/// Ports and adapters shared by the use cases and the event listeners.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn DocumentStore>,
    pub customers: Arc<dyn CustomerRepository>,
    pub hosts: Arc<dyn HostRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub host_matcher: Arc<dyn HostMatcher>,
    pub cost_calculator: Arc<dyn ShipmentCostCalculator>,
    pub payments: Arc<dyn PaymentGateway>,
    pub email: Arc<dyn EmailService>,
    pub events: Arc<dyn EventBus>,
}

impl Services {
    /// Wires the document repositories over `store` and the external adapters
    /// selected by `config`. Stripe and the mail relay fall back to in-memory
    /// fakes when their API keys are not set.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        let hosts: Arc<dyn HostRepository> = Arc::new(DocumentHostRepository::new());

        let payments: Arc<dyn PaymentGateway> = match config.stripe() {
            Some(stripe) => Arc::new(StripePaymentGateway::new(stripe)),
            None => {
                tracing::warn!("STRIPE_API_KEY not set, using in-memory payment gateway");
                Arc::new(InMemoryPaymentGateway::new())
            }
        };
        let email: Arc<dyn EmailService> = match config.mandrill() {
            Some(mandrill) => Arc::new(MandrillEmailService::new(mandrill)),
            None => {
                tracing::warn!("EMAIL_API_KEY not set, emails are kept in memory");
                Arc::new(InMemoryEmailService::new())
            }
        };

        Self {
            store,
            customers: Arc::new(DocumentCustomerRepository::new()),
            orders: Arc::new(DocumentOrderRepository::new()),
            host_matcher: Arc::new(DocumentHostMatcher::new(
                hosts.clone(),
                config.serviced_destinations.clone(),
            )),
            hosts,
            cost_calculator: Arc::new(WeightBasedCostCalculator::new(
                Money::from_cents(config.shipment_base_cents),
                Money::from_cents(config.shipment_per_kg_cents),
                config.shipment_max_weight_grams,
            )),
            payments,
            email,
            events,
        }
    }
}

/// Payment webhook verification settings.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Signing secret; `None` accepts unsigned deliveries.
    pub secret: Option<String>,
    pub tolerance: chrono::Duration,
}

impl WebhookSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            secret: config.stripe_webhook_secret.clone(),
            tolerance: config.webhook_tolerance(),
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub create_order: CreateOrder,
    pub edit_order: EditOrder,
    pub delete_order: DeleteOrder,
    pub get_order: GetOrder,
    pub confirm_order: ConfirmOrder,
    pub receive_item: ReceiveItem,
    pub add_item_photos: AddItemPhotos,
    pub submit_shipment_info: SubmitShipmentInfo,
    pub pay_shipment: PayShipment,
    pub payment_webhook: HandlePaymentWebhook,
    pub webhook: WebhookSettings,
}

impl AppState {
    pub fn new(services: &Services, service_fee: Money, webhook: WebhookSettings) -> Self {
        let s = services;
        let finalize_order = Arc::new(FinalizeOrder::new(
            s.store.clone(),
            s.orders.clone(),
            s.hosts.clone(),
            s.events.clone(),
        ));
        let pay_order_shipment_fee = Arc::new(PayOrderShipmentFee::new(
            s.store.clone(),
            s.orders.clone(),
            s.events.clone(),
        ));

        Self {
            create_order: CreateOrder::new(
                s.store.clone(),
                s.customers.clone(),
                s.orders.clone(),
                s.host_matcher.clone(),
                s.cost_calculator.clone(),
                s.events.clone(),
            ),
            edit_order: EditOrder::new(
                s.store.clone(),
                s.orders.clone(),
                s.host_matcher.clone(),
                s.cost_calculator.clone(),
                s.events.clone(),
            ),
            delete_order: DeleteOrder::new(
                s.store.clone(),
                s.orders.clone(),
                s.customers.clone(),
                s.events.clone(),
            ),
            get_order: GetOrder::new(s.store.clone(), s.orders.clone()),
            confirm_order: ConfirmOrder::new(
                s.store.clone(),
                s.orders.clone(),
                s.host_matcher.clone(),
                s.payments.clone(),
                s.events.clone(),
                service_fee,
            ),
            receive_item: ReceiveItem::new(s.store.clone(), s.orders.clone(), s.events.clone()),
            add_item_photos: AddItemPhotos::new(
                s.store.clone(),
                s.orders.clone(),
                s.events.clone(),
            ),
            submit_shipment_info: SubmitShipmentInfo::new(
                s.store.clone(),
                s.orders.clone(),
                s.events.clone(),
            ),
            pay_shipment: PayShipment::new(s.store.clone(), s.orders.clone(), s.payments.clone()),
            payment_webhook: HandlePaymentWebhook::new(finalize_order, pay_order_shipment_fee),
            webhook,
        }
    }
}
