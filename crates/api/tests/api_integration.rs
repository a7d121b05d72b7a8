//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::{AppState, Config, Services, WebhookSettings};
use application::{CustomerRepository, HostRepository, InMemoryEventBus};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::EntityId;
use document_store::{DocumentStore, InMemoryDocumentStore, Session};
use domain::{Address, Country, Customer, Host, Money};
use hmac::{Hmac, Mac};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use sha2::Sha256;
use tower::ServiceExt;

const WEBHOOK_PATH: &str = "/stripe/webhook";
const WEBHOOK_SECRET: &str = "whsec_test";
const BOUNDARY: &str = "photo-boundary";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn country(code: &str) -> Country {
    Country::new(code).unwrap()
}

struct TestApp {
    router: axum::Router,
    events: Arc<InMemoryEventBus>,
    customer: Customer,
    host: Host,
}

impl TestApp {
    /// Default configuration: in-memory payments and email, every destination
    /// served, rate of $5.00 plus $2.50 per started kilogram.
    async fn new() -> Self {
        let config = Config::default();
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let services = Services::from_config(&config, store.clone(), events.clone());

        let customer = Customer::new(
            "jane@example.com",
            Address::new(country("GB"), "1 High St", "London"),
        );
        let host = Host::new(
            "host@example.com",
            Address::new(country("US"), "5 Dock Rd", "Newark"),
        );
        let session = store.start_session().await.unwrap();
        services
            .customers
            .add_customer(session.as_ref(), &customer)
            .await
            .unwrap();
        services
            .hosts
            .add_host(session.as_ref(), &host)
            .await
            .unwrap();
        session.commit().await.unwrap();

        let state = Arc::new(AppState::new(
            &services,
            Money::from_cents(1000),
            WebhookSettings {
                secret: Some(WEBHOOK_SECRET.to_string()),
                tolerance: chrono::Duration::minutes(5),
            },
        ));
        let router = api::create_app(state, get_metrics_handle(), WEBHOOK_PATH);

        Self {
            router,
            events,
            customer,
            host,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn customer_call(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .header("x-customer-id", self.customer.id.to_string())
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn host_call(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .header("x-host-id", self.host.id.to_string())
                .header("x-host-verified", "true")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn webhook(&self, payload: Value) -> (StatusCode, Value) {
        let payload = payload.to_string();
        let timestamp = chrono::Utc::now().timestamp();
        self.send(
            Request::builder()
                .method("POST")
                .uri(WEBHOOK_PATH)
                .header("content-type", "application/json")
                .header(
                    "stripe-signature",
                    format!("t={timestamp},v1={}", sign(payload.as_bytes(), timestamp)),
                )
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
    }

    async fn draft(&self) -> Value {
        let (status, order) = self
            .customer_call(
                "POST",
                "/order",
                json!({
                    "origin_country": "us",
                    "items": [{ "title": "Camera", "store_name": "Shop", "weight_grams": 1200 }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        order
    }
}

fn sign(payload: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn checkout_completed(metadata: Value) -> Value {
    json!({
        "id": format!("evt_{}", EntityId::new()),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_0001",
            "payment_status": "paid",
            "metadata": metadata,
        }},
    })
}

fn photos_form(order_id: &str, item_id: &str) -> String {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"order_id\"\r\n\r\n\
         {order_id}\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"item_id\"\r\n\r\n\
         {item_id}\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"photos\"; filename=\"box.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\n\
         not-really-a-jpeg\r\n\
         --{BOUNDARY}--\r\n"
    )
}

// =============================================================================
// Health & Metrics
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let (status, json) = app
        .send(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

// =============================================================================
// Identity & Error Shape
// =============================================================================

mod boundary {
    use super::*;

    #[tokio::test]
    async fn test_missing_customer_identity_is_unauthorized() {
        let app = TestApp::new().await;

        let (status, json) = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/order")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "origin_country": "US", "items": [] }).to_string()))
                    .unwrap(),
            )
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_unverified_host_is_unauthorized() {
        let app = TestApp::new().await;

        let (status, _) = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/order/receiveItem")
                    .header("content-type", "application/json")
                    .header("x-host-id", app.host.id.to_string())
                    .body(Body::from(
                        json!({ "order_id": EntityId::new(), "item_id": EntityId::new() })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_validation_error() {
        let app = TestApp::new().await;

        let (status, json) = app
            .customer_call("POST", "/order", json!({ "origin_country": "Britain" }))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found_with_context() {
        let app = TestApp::new().await;
        let order_id = EntityId::new();

        let (status, json) = app
            .customer_call("GET", &format!("/order/{order_id}"), Value::Null)
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "ENTITY_NOT_FOUND");
        assert_eq!(json["message"], format!("Order (id: {order_id}) not found"));
        assert_eq!(json["context"]["order_id"], order_id.to_string());
    }

    #[tokio::test]
    async fn test_invalid_path_id_is_bad_request() {
        let app = TestApp::new().await;

        let (status, _) = app
            .customer_call("GET", "/order/not-a-uuid", Value::Null)
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Drafting
// =============================================================================

mod drafting {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_order() {
        let app = TestApp::new().await;

        let order = app.draft().await;
        assert_eq!(order["status"], "Drafted");
        assert_eq!(order["origin_country"], "US");
        assert_eq!(order["destination"]["country"], "GB");
        // $5.00 base plus two started kilograms at $2.50
        assert_eq!(order["shipment_rate"]["cents"], 1000);

        let order_id = order["id"].as_str().unwrap();
        let (status, loaded) = app
            .customer_call("GET", &format!("/order/{order_id}"), Value::Null)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(loaded, order);
        assert_eq!(app.events.event_types(), vec!["order.drafted"]);
    }

    #[tokio::test]
    async fn test_other_customer_cannot_read_order() {
        let app = TestApp::new().await;
        let order = app.draft().await;

        let (status, _) = app
            .send(
                Request::builder()
                    .uri(format!("/order/{}", order["id"].as_str().unwrap()))
                    .header("x-customer-id", EntityId::new().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unserved_origin_is_internal_error() {
        let app = TestApp::new().await;

        let (status, json) = app
            .customer_call(
                "POST",
                "/order",
                json!({
                    "origin_country": "FR",
                    "items": [{ "title": "Bag", "store_name": "Shop", "weight_grams": 300 }],
                }),
            )
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(
            json["message"],
            "Service not available in origin FR or destination GB"
        );
        assert_eq!(
            app.events.event_types(),
            vec!["order.rejected.service_availability"]
        );
    }

    #[tokio::test]
    async fn test_edit_and_delete_drafted_order() {
        let app = TestApp::new().await;
        let order = app.draft().await;
        let order_id = order["id"].as_str().unwrap();

        let (status, edited) = app
            .customer_call(
                "PATCH",
                "/order",
                json!({
                    "order_id": order_id,
                    "items": [{ "title": "Tripod", "store_name": "Shop", "weight_grams": 3500 }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{edited}");
        assert_eq!(edited["items"][0]["title"], "Tripod");
        assert_eq!(edited["shipment_rate"]["cents"], 1500);

        let (status, _) = app
            .customer_call("DELETE", "/order", json!({ "order_id": order_id }))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, json) = app
            .customer_call("DELETE", "/order", json!({ "order_id": order_id }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "ENTITY_NOT_FOUND");
    }
}

// =============================================================================
// Full Lifecycle
// =============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_order_from_draft_to_paid() {
        let app = TestApp::new().await;
        let order = app.draft().await;
        let order_id = order["id"].as_str().unwrap().to_string();
        let item_id = order["items"][0]["id"].as_str().unwrap().to_string();

        // Service fee checkout
        let (status, checkout) = app
            .customer_call("POST", "/order/confirm", json!({ "order_id": order_id }))
            .await;
        assert_eq!(status, StatusCode::OK, "{checkout}");
        assert_eq!(checkout["url"], "https://checkout.test/pay/cs_test_0001");

        let service_fee_paid = checkout_completed(json!({
            "order_id": order_id,
            "customer_id": app.customer.id,
            "host_id": app.host.id,
            "purpose": "service_fee",
        }));
        let (status, json) = app.webhook(service_fee_paid.clone()).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["outcome"], "applied");

        let (_, json) = app.webhook(service_fee_paid).await;
        assert_eq!(json["outcome"], "already_applied");

        // Host receives and photographs the item
        let (status, json) = app
            .host_call(
                "/order/receiveItem",
                json!({ "order_id": order_id, "item_id": item_id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert!(json["received_date"].is_string());

        let (status, json) = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/order/addItemPhotos")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .header("x-host-id", app.host.id.to_string())
                    .header("x-host-verified", "true")
                    .body(Body::from(photos_form(&order_id, &item_id)))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["photo_ids"].as_array().unwrap().len(), 1);

        let (status, json) = app
            .host_call(
                "/order/submitShipmentInfo",
                json!({
                    "order_id": order_id,
                    "shipment_cost_cents": 2400,
                    "tracking_number": "1Z999",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["cost"]["cents"], 2400);

        // Shipment fee checkout
        let (status, checkout) = app
            .customer_call("POST", "/order/payShipment", json!({ "order_id": order_id }))
            .await;
        assert_eq!(status, StatusCode::OK, "{checkout}");
        assert_eq!(checkout["id"], "cs_test_0002");

        let shipment_fee_paid = checkout_completed(json!({
            "order_id": order_id,
            "customer_id": app.customer.id,
            "purpose": "shipment_fee",
        }));
        let (_, json) = app.webhook(shipment_fee_paid.clone()).await;
        assert_eq!(json["outcome"], "applied");
        let (_, json) = app.webhook(shipment_fee_paid).await;
        assert_eq!(json["outcome"], "already_applied");

        let (_, order) = app
            .customer_call("GET", &format!("/order/{order_id}"), Value::Null)
            .await;
        assert_eq!(order["status"], "Paid");
        assert_eq!(order["host_id"], app.host.id.to_string());
        assert_eq!(
            app.events.event_types(),
            vec![
                "order.drafted",
                "order.finalized",
                "order.item_received",
                "order.item_photos_added",
                "order.shipment_info_submitted",
                "order.paid",
            ]
        );
    }

    #[tokio::test]
    async fn test_pay_shipment_before_shipment_info_is_conflict() {
        let app = TestApp::new().await;
        let order = app.draft().await;

        let (status, json) = app
            .customer_call("POST", "/order/payShipment", json!({ "order_id": order["id"] }))
            .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "CONFLICT");
    }
}

// =============================================================================
// Webhook Verification
// =============================================================================

mod webhook {
    use super::*;

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let app = TestApp::new().await;
        let payload = checkout_completed(json!({
            "order_id": EntityId::new(),
            "purpose": "shipment_fee",
        }))
        .to_string();

        let (status, json) = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri(WEBHOOK_PATH)
                    .header(
                        "stripe-signature",
                        format!("t={},v1=deadbeef", chrono::Utc::now().timestamp()),
                    )
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_WEBHOOK");
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let app = TestApp::new().await;

        let (status, _) = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri(WEBHOOK_PATH)
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_event_types_are_ignored() {
        let app = TestApp::new().await;

        let (status, json) = app
            .webhook(json!({
                "id": "evt_2",
                "type": "payment_intent.created",
                "data": { "object": { "id": "pi_1" } },
            }))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "ignored");
    }

    #[tokio::test]
    async fn test_shipment_fee_for_unknown_order_is_not_found() {
        let app = TestApp::new().await;

        let (status, json) = app
            .webhook(checkout_completed(json!({
                "order_id": EntityId::new(),
                "purpose": "shipment_fee",
            })))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "ENTITY_NOT_FOUND");
    }
}
