// ABOUTME: Master API key authentication for privileged gateway endpoints
// ABOUTME: Loads the key from the environment or generates an ephemeral one
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Master Key Authentication
//!
//! The master key (`sk-` prefix) grants global admin access and is required
//! by the admin and system endpoints. Per-project API keys and OAuth bearer
//! tokens are handled by [`crate::api_keys`] and [`crate::oauth2`].

use crate::constants::{env_names, key_prefixes};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// Manages master-key authentication for the gateway
pub struct AuthManager {
    master_api_key: String,
}

impl AuthManager {
    /// Create a new authentication manager.
    ///
    /// Loads `MASTER_API_KEY` from the environment. When absent, a random
    /// ephemeral key is generated and logged as a warning; it is lost on
    /// restart.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(env_names::MASTER_API_KEY) {
            Ok(key) if !key.is_empty() => {
                info!("Authentication manager initialized");
                Self {
                    master_api_key: key,
                }
            }
            _ => {
                let key = generate_master_key();
                warn!(
                    "No MASTER_API_KEY environment variable found. \
                     Generated temporary key: {}***{} \
                     (set MASTER_API_KEY in the environment for production use)",
                    &key[..8.min(key.len())],
                    &key[key.len().saturating_sub(4)..]
                );
                Self {
                    master_api_key: key,
                }
            }
        }
    }

    /// Create a manager with an explicit master key (tests, embedding)
    #[must_use]
    pub fn with_master_key(master_api_key: String) -> Self {
        Self { master_api_key }
    }

    /// Validate a presented master key with a constant-time comparison
    #[must_use]
    pub fn validate_master_key(&self, api_key: &str) -> bool {
        let is_valid = constant_time_eq(api_key, &self.master_api_key);
        if !is_valid {
            warn!("Invalid master key attempt");
        }
        is_valid
    }

    /// Get the master key (for display during setup)
    #[must_use]
    pub fn master_key(&self) -> &str {
        &self.master_api_key
    }
}

/// Generate a fresh `sk-`-prefixed master key
#[must_use]
pub fn generate_master_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", key_prefixes::MASTER, URL_SAFE_NO_PAD.encode(bytes))
}

/// Constant-time string equality for shared secrets.
///
/// Length differences still short-circuit; the secret material itself is
/// never compared byte-by-byte with early exit.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
