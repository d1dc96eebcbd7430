// ABOUTME: OAuth client registration and secret validation with JSON persistence
// ABOUTME: Client secrets are stored SHA-256 hashed and revealed once at creation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! OAuth client registry persisted to `data/oauth_clients.json`.

use super::models::{OAuthClient, ALLOWED_GRANT_TYPES};
use crate::api_keys::random_urlsafe;
use crate::auth::constant_time_eq;
use crate::constants::{key_prefixes, paths};
use crate::errors::{AppError, AppResult};
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};

/// Registry of OAuth clients
pub struct ClientRegistry {
    clients_file: PathBuf,
    clients: Mutex<HashMap<String, OAuthClient>>,
}

impl ClientRegistry {
    /// Open (or create) the registry under `data_dir`
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir: PathBuf = data_dir.into();
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            error!("Cannot create data directory {}: {e}", data_dir.display());
        }
        let clients_file = data_dir.join(paths::OAUTH_CLIENTS_FILE);

        let clients = match std::fs::read_to_string(&clients_file) {
            Ok(raw) => serde_json::from_str::<HashMap<String, OAuthClient>>(&raw).unwrap_or_else(
                |e| {
                    error!("Error reading clients file: {e}");
                    HashMap::new()
                },
            ),
            Err(_) => HashMap::new(),
        };

        info!(
            "OAuth client registry initialized with {} clients",
            clients.len()
        );

        Self {
            clients_file,
            clients: Mutex::new(clients),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, OAuthClient>> {
        match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn save(&self, clients: &HashMap<String, OAuthClient>) {
        let result = serde_json::to_string_pretty(clients)
            .map_err(|e| e.to_string())
            .and_then(|data| {
                let tmp = self.clients_file.with_extension("json.tmp");
                std::fs::write(&tmp, data)
                    .and_then(|()| std::fs::rename(&tmp, &self.clients_file))
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            error!("Error writing clients file: {e}");
        }
    }

    /// Register a new OAuth client. Returns `(client_id, client_secret)`;
    /// the secret is only visible here.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed redirect URIs or unknown grant types.
    pub fn create_client(
        &self,
        client_name: &str,
        redirect_uris: Vec<String>,
        grant_types: Option<Vec<String>>,
        allowed_scopes: Option<Vec<String>>,
        metadata: Option<Value>,
    ) -> AppResult<(String, String)> {
        for uri in &redirect_uris {
            if !uri.starts_with("http://") && !uri.starts_with("https://") {
                return Err(AppError::invalid_input(format!(
                    "Invalid redirect URI: {uri}"
                )));
            }
        }

        let grant_types = grant_types
            .unwrap_or_else(|| vec!["authorization_code".into(), "refresh_token".into()]);
        for grant in &grant_types {
            if !ALLOWED_GRANT_TYPES.contains(&grant.as_str()) {
                return Err(AppError::invalid_input(format!(
                    "Invalid grant type: {grant}"
                )));
            }
        }

        let client_id = format!("{}{}", key_prefixes::OAUTH_CLIENT, random_urlsafe(16));
        let client_secret = random_urlsafe(32);
        let client_secret_hash = format!("{:x}", Sha256::digest(client_secret.as_bytes()));

        let client = OAuthClient {
            client_id: client_id.clone(),
            client_secret_hash,
            client_name: client_name.to_owned(),
            redirect_uris,
            grant_types,
            response_types: vec!["code".into()],
            scope: "read".into(),
            allowed_scopes: allowed_scopes.unwrap_or_else(|| vec!["read".into(), "write".into()]),
            token_endpoint_auth_method: "client_secret_post".into(),
            created_at: Utc::now(),
            metadata: metadata.unwrap_or(Value::Null),
        };

        {
            let mut clients = self.lock();
            clients.insert(client_id.clone(), client);
            self.save(&clients);
        }

        info!("Created OAuth client: {client_id} ({client_name})");
        Ok((client_id, client_secret))
    }

    /// Look up a client by id
    #[must_use]
    pub fn get_client(&self, client_id: &str) -> Option<OAuthClient> {
        self.lock().get(client_id).cloned()
    }

    /// List all registered clients
    #[must_use]
    pub fn list_clients(&self) -> Vec<OAuthClient> {
        let mut clients: Vec<OAuthClient> = self.lock().values().cloned().collect();
        clients.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        clients
    }

    /// Validate a client secret with a constant-time hash comparison
    #[must_use]
    pub fn validate_client_secret(&self, client_id: &str, client_secret: &str) -> bool {
        let Some(client) = self.get_client(client_id) else {
            return false;
        };
        let secret_hash = format!("{:x}", Sha256::digest(client_secret.as_bytes()));
        constant_time_eq(&secret_hash, &client.client_secret_hash)
    }

    /// Delete a client. Returns false when unknown.
    pub fn delete_client(&self, client_id: &str) -> bool {
        let mut clients = self.lock();
        if clients.remove(client_id).is_none() {
            return false;
        }
        self.save(&clients);
        info!("Deleted OAuth client: {client_id}");
        true
    }

    /// Number of registered clients
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().len()
    }
}
