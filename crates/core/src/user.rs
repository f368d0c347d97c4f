// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User account record.

use std::fmt;

/// Durable user row.
///
/// Created by the provisioning utility, never mutated or deleted by the
/// server. Deliberately not `Serialize`: the password hash must never
/// leave the process over the API.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    /// Argon2 PHC string; embeds its own salt and parameters.
    pub password_hash: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
