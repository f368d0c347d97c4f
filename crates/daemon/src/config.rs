// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//!
//! The server only runs inside a container, so all configuration comes
//! from the process environment and every field is required: a missing or
//! empty variable fails startup immediately.

use std::path::PathBuf;

use glacier_store::PgConfig;
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required variable {0} not found in environment")]
    Missing(&'static str),

    #[error("required variable {0} is empty")]
    Empty(&'static str),

    #[error("variable {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if value.is_empty() => Err(ConfigError::Empty(name)),
        Ok(value) => Ok(value),
        Err(_) => Err(ConfigError::Missing(name)),
    }
}

/// Database endpoint settings (`DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`,
/// `DB_PASS`).
pub fn db_config() -> Result<PgConfig, ConfigError> {
    let port_raw = require("DB_PORT")?;
    let port = port_raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
        name: "DB_PORT",
        value: port_raw.clone(),
    })?;
    Ok(PgConfig {
        host: require("DB_HOST")?,
        port,
        name: require("DB_NAME")?,
        user: require("DB_USER")?,
        pass: require("DB_PASS")?,
    })
}

/// Scratch directory and render binary (`UPLOAD_FACILITY`, `BLENDER_BIN`).
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub upload_facility: PathBuf,
    pub blender_bin: PathBuf,
}

pub fn render_config() -> Result<RenderConfig, ConfigError> {
    Ok(RenderConfig {
        upload_facility: PathBuf::from(require("UPLOAD_FACILITY")?),
        blender_bin: PathBuf::from(require("BLENDER_BIN")?),
    })
}

/// Bootstrap credentials for the provisioning utility (`GLACIER_USER`,
/// `GLACIER_PASSWORD`).
#[derive(Clone, Debug)]
pub struct UserAddConfig {
    pub username: String,
    pub password: String,
}

pub fn useradd_config() -> Result<UserAddConfig, ConfigError> {
    Ok(UserAddConfig {
        username: require("GLACIER_USER")?,
        password: require("GLACIER_PASSWORD")?,
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
