mod admin;
mod error;
mod state;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tracing::{error, info};

use replicator_core::config::ReplicatorConfig;
use replicator_dispatch::Dispatcher;
use replicator_health::{HealthMonitor, SubscriptionSweeper};
use replicator_pipeline::Pipeline;
use replicator_senders::SenderPool;
use replicator_store::Store;

use crate::admin::AdminApi;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ReplicatorConfig::load(None).unwrap_or_else(|e| {
        error!(error = %e, "failed to load config, falling back to defaults");
        ReplicatorConfig::default()
    });

    let store = match Store::open(&config.database.path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to open store, aborting startup");
            std::process::exit(1);
        }
    };

    for word in &config.admin.global_blocked_words {
        let _ = store.add_blocked_word(word, None);
    }

    let sender_pool = Arc::new(SenderPool::new(config.senders.f_max));
    let dispatcher = Dispatcher::new(sender_pool.clone(), config.dispatcher.clone());
    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        sender_pool.clone(),
        dispatcher.clone(),
        config.images.watermark_font_path.clone(),
    ));
    let health_monitor = Arc::new(HealthMonitor::new(
        store.clone(),
        sender_pool.clone(),
        dispatcher.clone(),
        config.dispatcher.queue_capacity,
    ));
    let sweeper = Arc::new(SubscriptionSweeper::new(store.clone(), sender_pool.clone()));
    let admin = Arc::new(AdminApi::new(
        store.clone(),
        pipeline.clone(),
        dispatcher.clone(),
        sender_pool.clone(),
        sweeper.clone(),
        health_monitor.clone(),
        config.images.clone(),
    ));

    match admin.status() {
        Ok(status) => info!(pairs = status.pair_count, senders = status.sender_count, "startup complete"),
        Err(e) => error!(error = %e, "failed to read startup status"),
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    dispatcher.spawn_workers();
    tokio::spawn(sender_pool.clone().run(shutdown_rx.clone()));
    tokio::spawn(health_monitor.clone().run(shutdown_rx.clone()));
    tokio::spawn(sweeper.clone().run(shutdown_rx.clone()));

    let app_state = AppState { health_monitor: health_monitor.clone() };
    let router = Router::new().route("/healthz", get(healthz)).with_state(app_state);
    let addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, addr, "failed to bind gateway HTTP listener, aborting startup");
            std::process::exit(1);
        }
    };
    info!(addr, "gateway listening");

    let serve = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "HTTP server exited with an error");
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install ctrl-c handler, shutting down anyway");
    }
    info!("shutdown signal received, draining");

    let _ = shutdown_tx.send(true);
    dispatcher.shutdown().await;
    serve.abort();
    info!("shutdown complete");
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.health_monitor.snapshot().await {
        Ok(snapshot) => Json(serde_json::json!({
            "queue_depth": snapshot.queue_depth,
            "queue_capacity": snapshot.queue_capacity,
            "error_rate": snapshot.error_rate,
            "has_eligible_sender": snapshot.has_eligible_sender,
            "alerts": snapshot.alerts.len(),
        })),
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}
