// ABOUTME: Pluggable OAuth persistence - JSON files (default) and in-memory (tests)
// ABOUTME: Revoked refresh tokens stay as tombstones for reuse detection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # OAuth Storage
//!
//! The persistence seam for authorization codes, access-token metadata, and
//! refresh tokens. `get_refresh_token(token, include_revoked=true)` is the
//! only entry point that can observe revoked tombstones; the token manager
//! relies on it to detect refresh-token reuse.
//!
//! The JSON backend rewrites the relevant file on every mutation
//! (write-to-temp-then-rename); one async mutex serializes the
//! read-modify-write sequences so a code's `used` flip and a refresh
//! token's revocation are atomic per process.

use super::models::{AccessTokenRecord, AuthorizationCode, RefreshTokenRecord};
use crate::constants::paths;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Persistence operations for OAuth codes and tokens
#[async_trait]
pub trait OAuthStorage: Send + Sync {
    /// Persist an authorization code
    async fn save_authorization_code(&self, code: &AuthorizationCode) -> AppResult<()>;
    /// Load an authorization code; expired codes are dropped and not returned
    async fn get_authorization_code(&self, code: &str) -> AppResult<Option<AuthorizationCode>>;
    /// Replace an authorization code record (e.g. mark as used)
    async fn update_authorization_code(&self, code: &AuthorizationCode) -> AppResult<()>;
    /// Delete an authorization code
    async fn delete_authorization_code(&self, code: &str) -> AppResult<()>;
    /// Persist access-token metadata
    async fn save_access_token(&self, token: &AccessTokenRecord) -> AppResult<()>;
    /// Load access-token metadata; expired tokens are dropped
    async fn get_access_token(&self, token: &str) -> AppResult<Option<AccessTokenRecord>>;
    /// Persist a refresh token
    async fn save_refresh_token(&self, token: &RefreshTokenRecord) -> AppResult<()>;
    /// Load a refresh token. With `include_revoked`, revoked tombstones are
    /// returned; without it they read as absent.
    async fn get_refresh_token(
        &self,
        token: &str,
        include_revoked: bool,
    ) -> AppResult<Option<RefreshTokenRecord>>;
    /// Mark a refresh token revoked (tombstone). Returns false when unknown.
    async fn revoke_refresh_token(&self, token: &str) -> AppResult<bool>;
    /// Remove expired codes and access tokens; a background task may call
    /// this periodically. Tombstoned refresh tokens are kept until expiry.
    async fn sweep_expired(&self) -> AppResult<()>;
}

/// JSON-file storage backend
pub struct JsonStorage {
    codes_file: PathBuf,
    access_tokens_file: PathBuf,
    refresh_tokens_file: PathBuf,
    io_lock: Mutex<()>,
}

impl JsonStorage {
    /// Open (or create) storage under `data_dir`
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir: PathBuf = data_dir.into();
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            error!("Cannot create data directory {}: {e}", data_dir.display());
        }

        info!("OAuth JSON storage initialized at {}", data_dir.display());

        Self {
            codes_file: data_dir.join(paths::OAUTH_CODES_FILE),
            access_tokens_file: data_dir.join(paths::OAUTH_ACCESS_TOKENS_FILE),
            refresh_tokens_file: data_dir.join(paths::OAUTH_REFRESH_TOKENS_FILE),
            io_lock: Mutex::new(()),
        }
    }

    async fn read_map<T: DeserializeOwned>(path: &Path) -> HashMap<String, T> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                error!("Error reading {}: {e}", path.display());
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }

    async fn write_map<T: Serialize>(path: &Path, data: &HashMap<String, T>) -> AppResult<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized)
            .await
            .map_err(|e| AppError::storage_error(format!("writing {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::storage_error(format!("renaming {}: {e}", path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl OAuthStorage for JsonStorage {
    async fn save_authorization_code(&self, code: &AuthorizationCode) -> AppResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut codes: HashMap<String, AuthorizationCode> = Self::read_map(&self.codes_file).await;
        codes.insert(code.code.clone(), code.clone());
        Self::write_map(&self.codes_file, &codes).await
    }

    async fn get_authorization_code(&self, code: &str) -> AppResult<Option<AuthorizationCode>> {
        let _guard = self.io_lock.lock().await;
        let mut codes: HashMap<String, AuthorizationCode> = Self::read_map(&self.codes_file).await;

        let Some(record) = codes.get(code).cloned() else {
            return Ok(None);
        };

        if record.is_expired() {
            codes.remove(code);
            Self::write_map(&self.codes_file, &codes).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn update_authorization_code(&self, code: &AuthorizationCode) -> AppResult<()> {
        self.save_authorization_code(code).await
    }

    async fn delete_authorization_code(&self, code: &str) -> AppResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut codes: HashMap<String, AuthorizationCode> = Self::read_map(&self.codes_file).await;
        if codes.remove(code).is_some() {
            Self::write_map(&self.codes_file, &codes).await?;
        }
        Ok(())
    }

    async fn save_access_token(&self, token: &AccessTokenRecord) -> AppResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut tokens: HashMap<String, AccessTokenRecord> =
            Self::read_map(&self.access_tokens_file).await;
        tokens.insert(token.token.clone(), token.clone());
        Self::write_map(&self.access_tokens_file, &tokens).await
    }

    async fn get_access_token(&self, token: &str) -> AppResult<Option<AccessTokenRecord>> {
        let _guard = self.io_lock.lock().await;
        let mut tokens: HashMap<String, AccessTokenRecord> =
            Self::read_map(&self.access_tokens_file).await;

        let Some(record) = tokens.get(token).cloned() else {
            return Ok(None);
        };

        if record.is_expired() {
            tokens.remove(token);
            Self::write_map(&self.access_tokens_file, &tokens).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn save_refresh_token(&self, token: &RefreshTokenRecord) -> AppResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut tokens: HashMap<String, RefreshTokenRecord> =
            Self::read_map(&self.refresh_tokens_file).await;
        tokens.insert(token.token.clone(), token.clone());
        Self::write_map(&self.refresh_tokens_file, &tokens).await
    }

    async fn get_refresh_token(
        &self,
        token: &str,
        include_revoked: bool,
    ) -> AppResult<Option<RefreshTokenRecord>> {
        let _guard = self.io_lock.lock().await;
        let tokens: HashMap<String, RefreshTokenRecord> =
            Self::read_map(&self.refresh_tokens_file).await;

        let Some(record) = tokens.get(token).cloned() else {
            return Ok(None);
        };

        if record.is_expired() {
            return Ok(None);
        }
        if record.revoked && !include_revoked {
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn revoke_refresh_token(&self, token: &str) -> AppResult<bool> {
        let _guard = self.io_lock.lock().await;
        let mut tokens: HashMap<String, RefreshTokenRecord> =
            Self::read_map(&self.refresh_tokens_file).await;

        let Some(record) = tokens.get_mut(token) else {
            return Ok(false);
        };
        record.revoked = true;
        Self::write_map(&self.refresh_tokens_file, &tokens).await?;
        Ok(true)
    }

    async fn sweep_expired(&self) -> AppResult<()> {
        let _guard = self.io_lock.lock().await;

        let codes: HashMap<String, AuthorizationCode> = Self::read_map(&self.codes_file).await;
        let before = codes.len();
        let kept: HashMap<String, AuthorizationCode> = codes
            .into_iter()
            .filter(|(_, c)| !c.is_expired())
            .collect();
        let swept_codes = before - kept.len();
        Self::write_map(&self.codes_file, &kept).await?;

        let tokens: HashMap<String, AccessTokenRecord> =
            Self::read_map(&self.access_tokens_file).await;
        let before = tokens.len();
        let kept: HashMap<String, AccessTokenRecord> = tokens
            .into_iter()
            .filter(|(_, t)| !t.is_expired())
            .collect();
        let swept_tokens = before - kept.len();
        Self::write_map(&self.access_tokens_file, &kept).await?;

        info!(
            "Cleaned up {swept_codes} expired authorization codes and {swept_tokens} expired access tokens"
        );
        Ok(())
    }
}

/// In-memory storage backend for tests
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    codes: HashMap<String, AuthorizationCode>,
    access_tokens: HashMap<String, AccessTokenRecord>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

impl MemoryStorage {
    /// Create an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OAuthStorage for MemoryStorage {
    async fn save_authorization_code(&self, code: &AuthorizationCode) -> AppResult<()> {
        self.state
            .lock()
            .await
            .codes
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn get_authorization_code(&self, code: &str) -> AppResult<Option<AuthorizationCode>> {
        let mut state = self.state.lock().await;
        let Some(record) = state.codes.get(code).cloned() else {
            return Ok(None);
        };
        if record.is_expired() {
            state.codes.remove(code);
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn update_authorization_code(&self, code: &AuthorizationCode) -> AppResult<()> {
        self.save_authorization_code(code).await
    }

    async fn delete_authorization_code(&self, code: &str) -> AppResult<()> {
        self.state.lock().await.codes.remove(code);
        Ok(())
    }

    async fn save_access_token(&self, token: &AccessTokenRecord) -> AppResult<()> {
        self.state
            .lock()
            .await
            .access_tokens
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_access_token(&self, token: &str) -> AppResult<Option<AccessTokenRecord>> {
        let mut state = self.state.lock().await;
        let Some(record) = state.access_tokens.get(token).cloned() else {
            return Ok(None);
        };
        if record.is_expired() {
            state.access_tokens.remove(token);
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn save_refresh_token(&self, token: &RefreshTokenRecord) -> AppResult<()> {
        self.state
            .lock()
            .await
            .refresh_tokens
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_refresh_token(
        &self,
        token: &str,
        include_revoked: bool,
    ) -> AppResult<Option<RefreshTokenRecord>> {
        let state = self.state.lock().await;
        let Some(record) = state.refresh_tokens.get(token).cloned() else {
            return Ok(None);
        };
        if record.is_expired() {
            return Ok(None);
        }
        if record.revoked && !include_revoked {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn revoke_refresh_token(&self, token: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(record) = state.refresh_tokens.get_mut(token) else {
            return Ok(false);
        };
        record.revoked = true;
        Ok(true)
    }

    async fn sweep_expired(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.codes.retain(|_, c| !c.is_expired());
        state.access_tokens.retain(|_, t| !t.is_expired());
        Ok(())
    }
}
