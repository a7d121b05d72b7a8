//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::{AppState, Services, WebhookSettings};
use application::{BroadcastEventBus, EventDispatcher, NotificationListener};
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const EVENT_BUS_CAPACITY: usize = 1024;
const DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

async fn open_store(config: &Config) -> Arc<dyn DocumentStore> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresDocumentStore::connect(url, DATABASE_MAX_CONNECTIONS)
                .await
                .expect("failed to connect to PostgreSQL");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL document store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory document store");
            Arc::new(InMemoryDocumentStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env().expect("invalid configuration");
    init_tracing(&config);
    tracing::info!(env = %config.app_env, "loaded configuration");

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    api::routes::metrics::describe();

    // 3. Wire the store, adapters and event bus
    let store = open_store(&config).await;
    let event_bus = Arc::new(BroadcastEventBus::new(EVENT_BUS_CAPACITY));
    let receiver = event_bus.subscribe();
    let services = Services::from_config(&config, store, event_bus);

    // 4. Dispatch order events to the notification listener
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Arc::new(NotificationListener::new(
        services.store.clone(),
        services.customers.clone(),
        services.hosts.clone(),
        services.email.clone(),
    )));
    let dispatcher_handle = dispatcher.spawn(receiver);

    // 5. Build the application
    let state = Arc::new(AppState::new(
        &services,
        config.service_fee(),
        WebhookSettings::from_config(&config),
    ));
    let app = api::create_app(state, metrics_handle, &config.stripe_webhook_path);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, webhook_path = %config.stripe_webhook_path, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    dispatcher_handle.abort();
    tracing::info!("server shut down gracefully");
}
