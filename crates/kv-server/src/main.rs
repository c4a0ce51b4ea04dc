//! `kv-server` — the HTTP frontend for a single node of the replicated
//! key-value store. Binds the client surface and the internal peer surface
//! over one axum router, recovers the engine from disk on start, and runs
//! the replication manager's election/heartbeat loop for the lifetime of
//! the process.

mod config;
mod error;
mod handlers;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kv_engine::Engine;
use kv_replication::{ReplicationConfig, ReplicationManager};

use crate::config::Cli;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    info!("starting kv-server v{}", env!("CARGO_PKG_VERSION"));

    let (engine, recovery) = Engine::open(&cli.data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", cli.data_dir))?;
    info!(
        snapshot_loaded = recovery.snapshot_loaded,
        applied = recovery.wal_records_applied,
        corrupt = recovery.wal_records_corrupt,
        "recovered engine state"
    );

    let replication_config = ReplicationConfig::builder()
        .node_id(cli.node_id)
        .peers(cli.peer_list())
        .build()
        .context("invalid replication configuration")?;
    let replication = Arc::new(ReplicationManager::new(replication_config));

    let manager_handle = {
        let replication = replication.clone();
        tokio::spawn(async move {
            replication.run().await;
        })
    };

    let state = AppState {
        node_id: cli.node_id,
        engine: Arc::new(engine),
        replication: replication.clone(),
        shutdown: Arc::new(tokio::sync::Notify::new()),
    };

    let app = create_app(state.clone());
    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!("listening on {addr}");
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("http server error: {e}");
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
        _ = state.shutdown.notified() => {
            info!("shutdown requested via /shutdown");
        }
    }

    manager_handle.abort();
    info!("kv-server stopped");
    Ok(())
}

fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/get/{key}", get(handlers::get_key))
        .route("/set", post(handlers::set_key))
        .route("/delete/{key}", axum::routing::delete(handlers::delete_key))
        .route("/bulk", post(handlers::bulk_set))
        .route("/snapshot", post(handlers::snapshot))
        .route("/search", get(handlers::search))
        .route("/vector_search", get(handlers::vector_search))
        .route("/debug/info", get(handlers::debug_info))
        .route("/shutdown", post(handlers::shutdown))
        .route("/internal/heartbeat", post(handlers::internal_heartbeat))
        .route("/internal/vote", post(handlers::internal_vote))
        .route("/internal/replicate", post(handlers::internal_replicate))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).into_inner())
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = format!("kv_server={log_level},kv_engine={log_level},kv_replication={log_level},kv_storage={log_level}");
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
