// ABOUTME: Per-project API key management with scopes, expiry, and usage tracking
// ABOUTME: Keys are stored SHA-256 hashed in a JSON file and revealed only at creation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # API Key Management
//!
//! Per-project API key generation, validation, rotation, and usage tracking.
//! A key is scoped to one project (`plugin_type_site_id`) or to all projects
//! (`"*"`), carries a normalized scope string, and may expire. Only the
//! SHA-256 hash of the key is persisted; the raw key is returned exactly
//! once at creation.

use crate::constants::key_prefixes;
use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Access scope, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Read-only operations
    Read,
    /// Read and write operations
    Write,
    /// Full administrative access
    Admin,
}

impl Scope {
    /// Privilege priority: read=0, write=1, admin=2
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::Admin => 2,
        }
    }

    /// Canonical string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    /// All scopes in ascending priority order
    pub const ALL: [Self; 3] = [Self::Read, Self::Write, Self::Admin];
}

impl std::str::FromStr for Scope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::invalid_input(format!("Invalid scope: {other}"))),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that every token of a space-separated scope string is valid
#[must_use]
pub fn validate_scope(scope: &str) -> bool {
    if scope.trim().is_empty() {
        return false;
    }
    scope.split_whitespace().all(|s| s.parse::<Scope>().is_ok())
}

/// Normalize a scope string: dedupe and order ascending by priority.
///
/// `"admin read read"` becomes `"read admin"`. Unknown tokens are dropped;
/// callers validate first. Normalization is idempotent.
#[must_use]
pub fn normalize_scope(scope: &str) -> String {
    let present: Vec<&str> = scope.split_whitespace().collect();
    Scope::ALL
        .iter()
        .filter(|s| present.contains(&s.as_str()))
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Highest privilege priority among the tokens of a scope string
#[must_use]
pub fn max_scope_priority(scope: &str) -> u8 {
    scope
        .split_whitespace()
        .filter_map(|s| s.parse::<Scope>().ok())
        .map(Scope::priority)
        .max()
        .unwrap_or(0)
}

/// A stored API key record (hash only, never the raw key)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique identifier for the key
    pub key_id: String,
    /// SHA-256 hex digest of the raw key
    pub key_hash: String,
    /// Project this key belongs to ("*" for all projects)
    pub project_id: String,
    /// Normalized scope string (e.g. "read write")
    pub scope: String,
    /// When the key was created
    pub created_at: DateTime<Utc>,
    /// Optional expiry
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Last successful validation
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Number of successful validations
    #[serde(default)]
    pub usage_count: u64,
    /// Optional free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the key has been revoked
    #[serde(default)]
    pub revoked: bool,
}

impl ApiKey {
    /// Check whether the key has expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() > exp)
    }

    /// Check whether the key is usable (not revoked, not expired)
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}

/// Result of creating a key; the only place the raw key is visible
#[derive(Debug, Clone, Serialize)]
pub struct CreatedKey {
    /// The raw API key; shown once
    pub key: String,
    /// Key identifier
    pub key_id: String,
    /// Project the key is scoped to
    pub project_id: String,
    /// Normalized scope
    pub scope: String,
    /// Optional expiry
    pub expires_at: Option<DateTime<Utc>>,
}

/// Summary of a key for listings (no hash, no raw key)
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyInfo {
    /// Key identifier
    pub key_id: String,
    /// Project the key is scoped to
    pub project_id: String,
    /// Normalized scope
    pub scope: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Optional expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Last successful validation
    pub last_used_at: Option<DateTime<Utc>>,
    /// Successful validation count
    pub usage_count: u64,
    /// Description
    pub description: Option<String>,
    /// Revocation flag
    pub revoked: bool,
    /// Whether the key has expired
    pub expired: bool,
    /// Whether the key is currently usable
    pub valid: bool,
}

impl From<&ApiKey> for ApiKeyInfo {
    fn from(key: &ApiKey) -> Self {
        Self {
            key_id: key.key_id.clone(),
            project_id: key.project_id.clone(),
            scope: key.scope.clone(),
            created_at: key.created_at,
            expires_at: key.expires_at,
            last_used_at: key.last_used_at,
            usage_count: key.usage_count,
            description: key.description.clone(),
            revoked: key.revoked,
            expired: key.is_expired(),
            valid: key.is_valid(),
        }
    }
}

/// Persistent store of per-project API keys
pub struct ApiKeyStore {
    storage_path: PathBuf,
    keys: Mutex<HashMap<String, ApiKey>>,
}

impl ApiKeyStore {
    /// Open (or create) the store at `storage_path`.
    ///
    /// Falls back to a writable temp directory when the parent directory
    /// cannot be created.
    #[must_use]
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        let mut storage_path: PathBuf = storage_path.into();

        if let Some(parent) = storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(
                        "Cannot create directory {}: {e}, falling back to temp dir",
                        parent.display()
                    );
                    storage_path = std::env::temp_dir().join("api_keys.json");
                }
            }
        }

        let keys = Self::load_keys(&storage_path);
        info!(
            "API key store initialized with {} keys (storage: {})",
            keys.len(),
            storage_path.display()
        );

        Self {
            storage_path,
            keys: Mutex::new(keys),
        }
    }

    fn load_keys(path: &Path) -> HashMap<String, ApiKey> {
        if !path.exists() {
            info!("No existing API key file found, starting fresh");
            return HashMap::new();
        }

        match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                serde_json::from_str::<HashMap<String, ApiKey>>(&raw).map_err(|e| e.to_string())
            }) {
            Ok(keys) => {
                info!("Loaded {} API keys from storage", keys.len());
                keys
            }
            Err(e) => {
                tracing::error!("Failed to load API keys: {e}");
                HashMap::new()
            }
        }
    }

    /// Rewrite the whole file; write-to-temp-then-rename so readers never
    /// observe a half-written file. In-memory state is retained on failure.
    fn save_keys(&self, keys: &HashMap<String, ApiKey>) {
        let result = serde_json::to_string_pretty(keys)
            .map_err(|e| e.to_string())
            .and_then(|data| {
                let tmp = self.storage_path.with_extension("json.tmp");
                std::fs::write(&tmp, data)
                    .and_then(|()| std::fs::rename(&tmp, &self.storage_path))
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => debug!("Saved {} API keys to storage", keys.len()),
            Err(e) => tracing::error!("Failed to save API keys: {e}"),
        }
    }

    /// SHA-256 hex digest of a raw key
    #[must_use]
    pub fn hash_key(api_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(api_key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Create a new API key.
    ///
    /// The returned [`CreatedKey`] carries the raw key; it is not stored and
    /// cannot be recovered later.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope string contains invalid tokens.
    pub fn create_key(
        &self,
        project_id: &str,
        scope: &str,
        expires_in_days: Option<i64>,
        description: Option<String>,
    ) -> AppResult<CreatedKey> {
        if !validate_scope(scope) {
            return Err(AppError::invalid_input(format!(
                "Invalid scope: {scope}. Must contain only: read, write, admin"
            )));
        }
        let normalized_scope = normalize_scope(scope);

        let api_key = format!("{}{}", key_prefixes::API_KEY, random_urlsafe(32));
        let key_id = format!("{}{}", key_prefixes::KEY_ID, random_urlsafe(16));
        let key_hash = Self::hash_key(&api_key);

        let expires_at = expires_in_days.map(|days| Utc::now() + Duration::days(days));

        let record = ApiKey {
            key_id: key_id.clone(),
            key_hash,
            project_id: project_id.to_owned(),
            scope: normalized_scope.clone(),
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
            usage_count: 0,
            description,
            revoked: false,
        };

        {
            let mut keys = lock_poisoned_ok(&self.keys);
            keys.insert(key_id.clone(), record);
            self.save_keys(&keys);
        }

        info!("Created API key {key_id} for project {project_id} with scope '{normalized_scope}'");

        Ok(CreatedKey {
            key: api_key,
            key_id,
            project_id: project_id.to_owned(),
            scope: normalized_scope,
            expires_at,
        })
    }

    /// Validate an API key for a project and required scope.
    ///
    /// On success, stamps `last_used_at`, increments the usage counter, and
    /// persists. Returns the `key_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when no key matches, the key is revoked or expired,
    /// the key is scoped to a different project (unless
    /// `skip_project_check`), or its scope is insufficient.
    pub fn validate_key(
        &self,
        api_key: &str,
        project_id: &str,
        required_scope: Scope,
        skip_project_check: bool,
    ) -> AppResult<String> {
        let key_hash = Self::hash_key(api_key);
        let mut keys = lock_poisoned_ok(&self.keys);

        let Some(key) = keys.values_mut().find(|k| k.key_hash == key_hash) else {
            warn!("No matching API key found");
            return Err(AppError::auth_invalid("Invalid API key"));
        };

        if key.revoked {
            warn!("Key {} is revoked", key.key_id);
            return Err(AppError::auth_revoked("API key has been revoked"));
        }
        if key.is_expired() {
            warn!("Key {} is expired", key.key_id);
            return Err(AppError::auth_expired("API key has expired"));
        }

        if !skip_project_check && key.project_id != "*" && key.project_id != project_id {
            warn!(
                "Key {} does not have access to project {project_id}",
                key.key_id
            );
            return Err(AppError::permission_denied(format!(
                "API key does not have access to project {project_id}"
            )));
        }

        // Scope hierarchy: admin > write > read
        if max_scope_priority(&key.scope) < required_scope.priority() {
            warn!(
                "Key {} has insufficient scope ({} does not include {required_scope})",
                key.key_id, key.scope
            );
            return Err(AppError::permission_denied(format!(
                "Insufficient scope: required {required_scope}"
            )));
        }

        key.last_used_at = Some(Utc::now());
        key.usage_count += 1;
        let key_id = key.key_id.clone();
        debug!("Key {key_id} validated successfully (scope: {})", key.scope);

        self.save_keys(&keys);
        Ok(key_id)
    }

    /// Look up a key record by its raw token, without project/scope checks
    #[must_use]
    pub fn get_key_by_token(&self, api_key: &str) -> Option<ApiKey> {
        let key_hash = Self::hash_key(api_key);
        let keys = lock_poisoned_ok(&self.keys);
        keys.values().find(|k| k.key_hash == key_hash).cloned()
    }

    /// Revoke a key by id. Returns false when the key is unknown.
    pub fn revoke_key(&self, key_id: &str) -> bool {
        let mut keys = lock_poisoned_ok(&self.keys);
        let Some(key) = keys.get_mut(key_id) else {
            warn!("Key {key_id} not found");
            return false;
        };
        key.revoked = true;
        self.save_keys(&keys);
        info!("Revoked API key {key_id}");
        true
    }

    /// Permanently delete a key by id. Returns false when the key is unknown.
    pub fn delete_key(&self, key_id: &str) -> bool {
        let mut keys = lock_poisoned_ok(&self.keys);
        if keys.remove(key_id).is_none() {
            warn!("Key {key_id} not found");
            return false;
        }
        self.save_keys(&keys);
        info!("Deleted API key {key_id}");
        true
    }

    /// List keys, optionally filtered by project, optionally including revoked
    #[must_use]
    pub fn list_keys(&self, project_id: Option<&str>, include_revoked: bool) -> Vec<ApiKeyInfo> {
        let keys = lock_poisoned_ok(&self.keys);
        let mut out: Vec<ApiKeyInfo> = keys
            .values()
            .filter(|k| {
                project_id.map_or(true, |p| k.project_id == p || k.project_id == "*")
                    && (include_revoked || !k.revoked)
            })
            .map(ApiKeyInfo::from)
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Rotate all valid keys for a project: create a replacement with the
    /// same scope, then revoke the old key. Returns the new raw keys.
    ///
    /// # Errors
    ///
    /// Returns an error if creating a replacement key fails.
    pub fn rotate_keys(&self, project_id: &str) -> AppResult<Vec<CreatedKey>> {
        let old_keys: Vec<(String, String)> = {
            let keys = lock_poisoned_ok(&self.keys);
            keys.values()
                .filter(|k| k.project_id == project_id && k.is_valid())
                .map(|k| (k.key_id.clone(), k.scope.clone()))
                .collect()
        };

        let mut new_keys = Vec::with_capacity(old_keys.len());
        for (old_key_id, scope) in old_keys {
            let created = self.create_key(
                project_id,
                &scope,
                None,
                Some(format!("Rotated from {old_key_id}")),
            )?;
            self.revoke_key(&old_key_id);
            new_keys.push(created);
        }

        info!("Rotated {} keys for project {project_id}", new_keys.len());
        Ok(new_keys)
    }

    /// Get the summary for a single key
    #[must_use]
    pub fn get_key_info(&self, key_id: &str) -> Option<ApiKeyInfo> {
        let keys = lock_poisoned_ok(&self.keys);
        keys.get(key_id).map(ApiKeyInfo::from)
    }

    /// Number of stored keys (including revoked)
    #[must_use]
    pub fn count(&self) -> usize {
        lock_poisoned_ok(&self.keys).len()
    }
}

/// Generate an URL-safe base64 token from `n` random bytes
#[must_use]
pub fn random_urlsafe(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Recover the guard even if a previous holder panicked; key data stays
/// consistent because every mutation is a single guarded block.
fn lock_poisoned_ok<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
