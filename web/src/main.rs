//! Lagoon booking platform HTTP server.

use lagoon_core::admission::AdmissionController;
use lagoon_core::environment::SystemClock;
use lagoon_core::event::EventPublisher;
use lagoon_core::event_bus::EventBus;
use lagoon_core::store::BookingStore;
use lagoon_postgres::{PostgresBookingStore, run_migrations};
use lagoon_redpanda::RedpandaEventBus;
use lagoon_web::{AppConfig, AppState, EventHub, bridge, build_router, notifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NOTIFIER_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lagoon_web=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lagoon booking platform");

    let config = AppConfig::from_env();
    info!(
        database_url = %config.database.url,
        brokers = %config.broker.brokers,
        "Configuration loaded"
    );

    // Persistence.
    let store =
        PostgresBookingStore::connect(&config.database.url, config.database.max_connections)
            .await?;
    run_migrations(store.pool()).await?;
    info!("Booking store connected, schema up to date");
    let store: Arc<dyn BookingStore> = Arc::new(store);

    // Broker.
    let bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&config.broker.brokers)
            .consumer_group(&config.broker.consumer_group)
            .build()?,
    );
    info!("Event bus connected");

    // Domain wiring: controller, publisher, hub, background tasks.
    let clock = Arc::new(SystemClock);
    let publisher = EventPublisher::new(bus.clone(), clock.clone());
    let controller = AdmissionController::new(
        store.clone(),
        publisher.clone(),
        clock,
        config.payment_payee_id.clone(),
    );
    let hub = Arc::new(EventHub::default());

    let bridge_task = tokio::spawn(bridge::run_bridge(bus.clone(), hub.clone()));
    let notifier_task = tokio::spawn(notifier::run_notifier(
        store.clone(),
        Arc::new(notifier::LoggingSink),
        NOTIFIER_POLL_INTERVAL,
    ));

    let state = AppState::new(store, controller, publisher, hub);
    let app = build_router(state);

    let addr = config.bind_addr();
    info!(%addr, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown order: stop accepting requests first (done above), then the
    // background tasks; the store pool drops last with the process.
    bridge_task.abort();
    notifier_task.abort();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(error) => tracing::error!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
