// ==============================================================================
// main.rs - Variant Annotation Service Entry Point
// ==============================================================================
// Description: Axum web server for the caching, batching variant
//              annotation API
// Author: Matt Barham
// Created: 2026-06-30
// Modified: 2026-07-30
// Version: 1.2.0
// ==============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use annotation_core::ml::PathogenicityScorer;
use annotation_core::vep::VepClient;
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, Level};

mod batch;
mod config;
mod facade;
mod handlers;
mod models;
mod registry;
mod state;
mod store;

use batch::{BatchConfig, BatchProcessor};
use config::Config;
use facade::SubmissionFacade;
use registry::PendingRegistry;
use state::AppState;
use store::AnnotationStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    info!("Starting Variant Annotation Service v1.0.0");

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize database connection and schema
    let store = AnnotationStore::connect(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    store
        .init_schema()
        .await
        .context("Failed to initialize schema")?;
    info!("Connected to PostgreSQL");

    // ML model is a deployment artifact; absence means null scores, not
    // a startup failure.
    let scorer = Arc::new(PathogenicityScorer::from_path(config.ml_model_path.as_deref()));

    let registry = Arc::new(PendingRegistry::new());
    let vep = VepClient::new(config.vep_api_url.clone(), config.vep_timeout);

    let processor = BatchProcessor::start(
        BatchConfig {
            max_batch_size: config.max_batch_size,
            max_wait_time: config.max_wait_time,
            max_workers: config.max_workers,
            max_retries: config.max_retries,
        },
        registry.clone(),
        store.clone(),
        vep,
        scorer,
    );

    // Periodic sweep evicts terminal registry entries once pollers have
    // had a chance to observe them.
    spawn_terminal_sweeper(registry.clone(), config.terminal_retention);

    let facade = SubmissionFacade::new(store.clone(), registry.clone(), processor.clone());
    let app_state = AppState::new(
        store,
        registry,
        processor.clone(),
        facade,
        config.max_batch_size,
        config.max_wait_time,
    );

    let app = build_router(app_state);

    // Bind server
    let addr: SocketAddr = format!("{}:{}", config.api_host, config.api_port)
        .parse()
        .context("Invalid API_HOST/API_PORT")?;
    info!("Annotation API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain the queue as one final set of batches before exit; variants
    // persisted here are served from cache after restart.
    processor.shutdown().await;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/submit", post(handlers::submit_variant))
        .route("/poll/{variant_key}", get(handlers::poll_variant))
        .route("/health", get(handlers::health_check))
        .route("/statistics", get(handlers::statistics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn spawn_terminal_sweeper(registry: Arc<PendingRegistry>, retention: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let swept = registry.sweep_terminal(retention);
            if swept > 0 {
                debug!("Terminal sweep evicted {} entries", swept);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
