// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glacier render daemon (glacierd)
//!
//! Server process that owns the scheduler loop and the HTTP listener.
//!
//! Architecture:
//! - HTTP listener: axum handlers over the auth layer, port 8888
//! - Scheduler loop: spawned task driving every supervisor's state machine
//! - Render workers: one per running task, owned by its supervisor

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use glacier_daemon::auth::AuthManager;
use glacier_daemon::{config, lifecycle, listener};
use glacier_engine::{Scheduler, TaskRegistry};
use glacier_store::{PgStore, Store};

use listener::ServerCtx;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let db_config = config::db_config()?;
    let render_config = config::render_config()?;

    info!(host = %db_config.host, port = db_config.port, "connecting to database");
    let store: Arc<dyn Store> = Arc::new(PgStore::connect(&db_config).await?);

    lifecycle::fail_orphaned_tasks(&store).await?;

    let registry = Arc::new(TaskRegistry::new());
    let auth = Arc::new(AuthManager::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        render_config,
    ));

    tokio::spawn(Scheduler::new(registry).run());

    let app = listener::router(Arc::new(ServerCtx { auth }));
    let addr = SocketAddr::from(([0, 0, 0, 0], listener::LISTEN_PORT));
    let tcp = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "ready to accept connections");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
        }
    };

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("daemon stopped");
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
