//! HTTP API server for the order lifecycle service.
//!
//! Exposes the customer and host order endpoints, the payment webhook,
//! health and Prometheus metrics, with structured logging (tracing).

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::{AppState, Services, WebhookSettings};

/// Upper bound on a photo upload request.
pub const MAX_PHOTO_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Creates the Axum application router with all routes and shared state.
///
/// `webhook_path` must start with `/`.
pub fn create_app(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    webhook_path: &str,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/order",
            post(routes::orders::create)
                .patch(routes::orders::edit)
                .delete(routes::orders::delete),
        )
        .route("/order/{id}", get(routes::orders::get))
        .route("/order/confirm", post(routes::orders::confirm))
        .route("/order/receiveItem", post(routes::orders::receive_item))
        .route(
            "/order/addItemPhotos",
            post(routes::orders::add_item_photos)
                .layer(DefaultBodyLimit::max(MAX_PHOTO_UPLOAD_BYTES)),
        )
        .route(
            "/order/submitShipmentInfo",
            post(routes::orders::submit_shipment_info),
        )
        .route("/order/payShipment", post(routes::orders::pay_shipment))
        .route(webhook_path, post(routes::webhook::handle))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
