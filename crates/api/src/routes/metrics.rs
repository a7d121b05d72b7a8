//! Prometheus metrics endpoint and metric descriptions.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the metrics recorded by the use cases and adapters.
pub fn describe() {
    describe_counter!("orders_drafted_total", "Orders drafted");
    describe_counter!("orders_rejected_total", "Orders rejected, by reason");
    describe_counter!("orders_finalized_total", "Orders finalized after the service fee");
    describe_counter!("orders_paid_total", "Orders whose shipment fee was paid");
    describe_counter!(
        "payment_webhooks_total",
        "Payment webhooks handled, by purpose and outcome"
    );
    describe_counter!("emails_sent_total", "Notification emails, by outcome");
    describe_counter!("domain_events_published_total", "Order events published");
    describe_counter!(
        "event_listener_failures_total",
        "Event listener failures, by listener"
    );
    describe_histogram!(
        "use_case_duration_seconds",
        metrics::Unit::Seconds,
        "Use case execution time"
    );
}

/// GET /metrics: Prometheus text exposition.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
