use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use iot_health_core::tracker::ArrivalTracker;
use iot_health_events::{ArrivalBus, ArrivalRecorder};
use iot_health_mqtt::MqttSubscriber;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iot_health_api::cli::Args;
use iot_health_api::config::load_registry;
use iot_health_api::router::build_app_router;
use iot_health_api::shutdown::{join_or_abort, shutdown_signal};
use iot_health_api::state::AppState;

/// How long shutdown waits for each background task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "iot_health_api=debug,iot_health_mqtt=info,iot_health_events=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        addr = %config.bind_addr(),
        mqtt_host = %config.mqtt.host,
        mqtt_port = config.mqtt.port,
        "Loaded server configuration",
    );

    // --- Topics ---
    let registry = Arc::new(load_registry(&config.topics_file));
    let topics: Vec<String> = registry.ids().map(str::to_string).collect();

    // --- Arrival bus and recorder ---
    let tracker = Arc::new(ArrivalTracker::new());
    let (arrivals, receiver) = ArrivalBus::with_default_capacity();
    let recorder_handle = tokio::spawn(ArrivalRecorder::run(Arc::clone(&tracker), receiver));

    // --- MQTT subscriber ---
    let subscriber_cancel = CancellationToken::new();
    let subscriber = MqttSubscriber::new(config.mqtt.clone(), topics, arrivals.clone());
    let subscriber_handle = tokio::spawn(subscriber.run(subscriber_cancel.clone()));
    tracing::info!(topics = registry.len(), "Background services started");

    // --- App state ---
    let addr = config.bind_addr();
    let config = Arc::new(config);
    let state = AppState {
        config: Arc::clone(&config),
        registry,
        tracker,
        arrivals,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    subscriber_cancel.cancel();
    if join_or_abort("mqtt-subscriber", subscriber_handle, SHUTDOWN_GRACE)
        .await
        .is_some()
    {
        tracing::info!("MQTT subscriber stopped");
    }

    // The router and the subscriber are gone, and with them every bus
    // handle, so the recorder drains what is queued and exits.
    if let Some(recorded) = join_or_abort("arrival-recorder", recorder_handle, SHUTDOWN_GRACE).await {
        tracing::info!(recorded, "Arrival recorder drained");
    }

    tracing::info!("Graceful shutdown complete");
}
