// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::alarm_service::AlarmService;
use crate::application::broadcast_service::BroadcastService;
use crate::application::channel_service::ChannelService;
use crate::application::log_service::LogService;
use crate::application::store::{StorePaths, TelemetryStore};
use crate::infrastructure::config::load_config;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    append_log, auto_save_logs, check_alarms, check_data_changes, create_channel, delete_channel,
    get_alarm_data, get_all_data, get_channel, get_live_value, get_logs, get_variable_data,
    health_check, list_channels, list_live_values, reload_data, save_alarm_data, server_info,
    update_channel_field,
};
use crate::presentation::stream::stream_updates;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = load_config()?;

    // Create the store (single owner of all cache state)
    let store = Arc::new(TelemetryStore::new(
        StorePaths::new(&config.store.base_dir),
        Duration::from_millis(config.store.min_check_interval_ms),
        config.store.always_stale,
    ));

    // Create services (application layer)
    let channels = ChannelService::new(store.clone());
    let logs = LogService::new(store.clone());
    let alarms = AlarmService::new(store.clone(), logs.clone());
    let broadcast = BroadcastService::new(
        store.clone(),
        alarms.clone(),
        Duration::from_secs(config.broadcast.publish_interval_secs),
    );

    // Create application state
    let state = Arc::new(AppState {
        store,
        channels,
        logs,
        alarms,
        broadcast: broadcast.clone(),
    });

    // Start the publish loop with its shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let broadcast_task = tokio::spawn(async move { broadcast.run(shutdown_rx).await });

    // Station clients live on the local network and expect open CORS.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router (presentation layer)
    let router = Router::new()
        .route("/api/data", get(get_all_data))
        .route("/api/data/variable", get(get_variable_data))
        .route("/api/data/alarm", get(get_alarm_data).post(save_alarm_data))
        .route("/api/data/check-changes", get(check_data_changes))
        .route("/api/data/reload", post(reload_data))
        .route("/api/channel", post(create_channel))
        .route(
            "/api/channel/:id",
            get(get_channel)
                .put(update_channel_field)
                .delete(delete_channel),
        )
        .route("/api/channels", get(list_channels))
        .route("/api/data/live", get(list_live_values))
        .route("/api/data/live/:channel_id", get(get_live_value))
        .route("/api/logs/:channel_id", get(get_logs).post(append_log))
        .route("/api/logs/auto-save", post(auto_save_logs))
        .route("/api/alarms/check", get(check_alarms))
        .route("/api/alarms/active", get(check_alarms))
        .route("/api/health", get(health_check))
        .route("/api/info", get(server_info))
        .route("/ws", get(stream_updates))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("starting hydrolink-telemetry on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the publish loop; it notifies connected consumers before exiting.
    let _ = shutdown_tx.send(true);
    broadcast_task.await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested");
}
