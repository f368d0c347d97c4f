// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier and durable record.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

crate::define_id! {
    /// Unique identifier for an authenticated client session.
    ///
    /// Minted as 32 hex characters (128 random bits) on login. A username
    /// has at most one live session; repeated logins return the same id.
    pub struct SessionId;
}

/// Durable session row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub username: String,
    /// Seconds since the epoch, stored as a string.
    pub creation_time: String,
}

/// Current wall-clock time as the stored `creation_time` string.
pub fn creation_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string()
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
