// ABOUTME: CSRF token store for the OAuth authorization flow
// ABOUTME: Hex tokens, 10-minute lifetime, one-time consumption, lazy sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! Short-lived CSRF tokens embedded in the authorization consent step.
//! Tokens are consumed on first validation; expired entries are swept
//! lazily during generation.

use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// CSRF token statistics
#[derive(Debug, Clone, Serialize)]
pub struct CsrfStats {
    /// Total tokens stored (including not-yet-swept expired ones)
    pub total_tokens: usize,
    /// Tokens still valid
    pub active_tokens: usize,
    /// Expired tokens awaiting sweep
    pub expired_tokens: usize,
    /// Configured lifetime in seconds
    pub token_lifetime_seconds: u64,
}

/// In-memory store of one-time CSRF tokens
pub struct CsrfTokenStore {
    tokens: Mutex<HashMap<String, Instant>>,
    lifetime: Duration,
}

impl CsrfTokenStore {
    /// Create a store with the given token lifetime
    #[must_use]
    pub fn new(lifetime_seconds: u64) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            lifetime: Duration::from_secs(lifetime_seconds),
        }
    }

    /// Store with the default 10-minute lifetime
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(crate::constants::ttl::CSRF_TOKEN_SECS)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        match self.tokens.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Generate a new token (32 random bytes, hex-encoded).
    /// Expired tokens are swept as a side effect.
    #[must_use]
    pub fn generate_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let mut tokens = self.lock();
        let now = Instant::now();
        tokens.retain(|_, expiry| *expiry > now);
        tokens.insert(token.clone(), now + self.lifetime);

        token
    }

    /// Validate a token; with `consume` the token is removed on success
    /// (one-time use). Expired tokens are removed and fail validation.
    #[must_use]
    pub fn validate_token(&self, token: &str, consume: bool) -> bool {
        let mut tokens = self.lock();

        let Some(expiry) = tokens.get(token).copied() else {
            return false;
        };

        if Instant::now() > expiry {
            tokens.remove(token);
            return false;
        }

        if consume {
            tokens.remove(token);
        }
        true
    }

    /// Statistics about stored tokens
    #[must_use]
    pub fn stats(&self) -> CsrfStats {
        let tokens = self.lock();
        let now = Instant::now();
        let active = tokens.values().filter(|expiry| **expiry > now).count();

        CsrfStats {
            total_tokens: tokens.len(),
            active_tokens: active,
            expired_tokens: tokens.len() - active,
            token_lifetime_seconds: self.lifetime.as_secs(),
        }
    }
}

impl Default for CsrfTokenStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
