// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot user provisioning (glacier-useradd)
//!
//! Reads `GLACIER_USER` and `GLACIER_PASSWORD`, hashes the password, and
//! inserts the user. Idempotent: an existing user is left untouched, so
//! the utility can run on every container start.

use std::sync::Arc;

use tracing::info;

use glacier_daemon::auth::{self, AuthError};
use glacier_daemon::config;
use glacier_store::{PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let creds = config::useradd_config()?;
    let db_config = config::db_config()?;
    let store: Arc<dyn Store> = Arc::new(PgStore::connect(&db_config).await?);

    match auth::add_user(&store, &creds.username, &creds.password).await {
        Ok(()) => info!(username = %creds.username, "user created"),
        Err(AuthError::UserExists(username)) => info!(%username, "user already exists"),
        Err(e) => return Err(e.into()),
    }
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
