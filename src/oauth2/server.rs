// ABOUTME: OAuth 2.1 authorization server - request validation and grant handling
// ABOUTME: Authorization codes are single-use; replay raises a critical audit event
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Authorization Server
//!
//! Implements the three supported grants:
//! - Authorization Code with mandatory S256 PKCE
//! - Refresh Token with rotation
//! - Client Credentials (machine-to-machine, no refresh token)

use super::client_registry::ClientRegistry;
use super::models::{AuthorizationCode, OAuthError, TokenResponse};
use super::pkce::validate_code_challenge;
use super::storage::OAuthStorage;
use super::token_manager::{TokenError, TokenManager};
use crate::audit::{AuditLogger, LogLevel};
use crate::constants::{key_prefixes, ttl};
use crate::api_keys::random_urlsafe;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Parameters accepted by an authorization request after validation
#[derive(Debug, Clone)]
pub struct ValidatedAuthorizeRequest {
    /// Client identifier
    pub client_id: String,
    /// Redirect URI (exact match against registration)
    pub redirect_uri: String,
    /// Normalized scope string
    pub scope: String,
    /// PKCE challenge
    pub code_challenge: String,
    /// PKCE method (always "S256")
    pub code_challenge_method: String,
    /// Opaque client state
    pub state: Option<String>,
}

/// Optional API-key metadata attached to an authorization code so the
/// eventual access token inherits the key's project and scope
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGrantContext {
    /// API key id
    pub api_key_id: Option<String>,
    /// Project the key is scoped to
    pub api_key_project_id: Option<String>,
    /// Scope of the key
    pub api_key_scope: Option<String>,
}

/// The OAuth 2.1 authorization server
pub struct OAuthServer {
    clients: Arc<ClientRegistry>,
    tokens: Arc<TokenManager>,
    storage: Arc<dyn OAuthStorage>,
    audit: Option<Arc<AuditLogger>>,
    auth_code_ttl_secs: u64,
}

impl OAuthServer {
    /// Assemble the server from its collaborators
    #[must_use]
    pub fn new(
        clients: Arc<ClientRegistry>,
        tokens: Arc<TokenManager>,
        storage: Arc<dyn OAuthStorage>,
        audit: Option<Arc<AuditLogger>>,
    ) -> Self {
        Self {
            clients,
            tokens,
            storage,
            audit,
            auth_code_ttl_secs: ttl::AUTH_CODE_SECS,
        }
    }

    /// Validate an authorization request (step 1 of the code flow).
    ///
    /// # Errors
    ///
    /// Rejections, in order: unknown client (`invalid_client`, 401),
    /// non-"code" response type, client not allowed the grant, unregistered
    /// redirect URI, missing/non-S256 PKCE, scope outside the client's
    /// allowed set.
    #[allow(clippy::too_many_arguments)]
    pub fn validate_authorization_request(
        &self,
        client_id: &str,
        redirect_uri: &str,
        response_type: &str,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
        scope: Option<&str>,
        state: Option<&str>,
    ) -> Result<ValidatedAuthorizeRequest, OAuthError> {
        let Some(client) = self.clients.get_client(client_id) else {
            return Err(OAuthError::invalid_client(format!(
                "Client {client_id} not found"
            )));
        };

        if response_type != "code" {
            return Err(OAuthError::unsupported_response_type(
                "Only the 'code' response_type is supported (OAuth 2.1)",
            ));
        }

        if !client.grant_types.iter().any(|g| g == "authorization_code") {
            return Err(OAuthError::unauthorized_client(
                "Client not authorized for the authorization_code grant",
            ));
        }

        if !client.redirect_uris.iter().any(|u| u == redirect_uri) {
            return Err(OAuthError::invalid_request(format!(
                "Invalid redirect_uri: {redirect_uri}"
            )));
        }

        let (Some(code_challenge), Some(method)) = (code_challenge, code_challenge_method) else {
            return Err(OAuthError::invalid_request(
                "code_challenge and code_challenge_method are required (OAuth 2.1)",
            ));
        };
        if method != "S256" {
            return Err(OAuthError::invalid_request(
                "Only the S256 code_challenge_method is supported (OAuth 2.1)",
            ));
        }

        let requested_scopes: Vec<&str> = scope
            .map_or_else(|| vec!["read"], |s| s.split_whitespace().collect());
        for s in &requested_scopes {
            if !client.allowed_scopes.iter().any(|allowed| allowed == s) {
                return Err(OAuthError::invalid_scope(format!(
                    "Scope '{s}' not allowed for this client"
                )));
            }
        }

        Ok(ValidatedAuthorizeRequest {
            client_id: client_id.to_owned(),
            redirect_uri: redirect_uri.to_owned(),
            scope: requested_scopes.join(" "),
            code_challenge: code_challenge.to_owned(),
            code_challenge_method: method.to_owned(),
            state: state.map(str::to_owned),
        })
    }

    /// Issue an authorization code (step 2). Carries API-key metadata when
    /// the consent was granted via an API-key login.
    ///
    /// # Errors
    ///
    /// `server_error` when persistence fails.
    pub async fn create_authorization_code(
        &self,
        request: &ValidatedAuthorizeRequest,
        user_id: Option<String>,
        api_key: ApiKeyGrantContext,
    ) -> Result<String, OAuthError> {
        let code = format!("{}{}", key_prefixes::AUTH_CODE, random_urlsafe(32));
        let ttl = i64::try_from(self.auth_code_ttl_secs).unwrap_or(300);

        let record = AuthorizationCode {
            code: code.clone(),
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scope: request.scope.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
            expires_at: Utc::now() + Duration::seconds(ttl),
            used: false,
            user_id,
            api_key_id: api_key.api_key_id,
            api_key_project_id: api_key.api_key_project_id,
            api_key_scope: api_key.api_key_scope,
        };

        self.storage
            .save_authorization_code(&record)
            .await
            .map_err(|e| OAuthError::server_error(e.message))?;

        info!(
            "Created authorization code for client {}",
            request.client_id
        );
        Ok(code)
    }

    /// Exchange an authorization code for tokens (step 3).
    ///
    /// State machine on the code: `fresh -> used | expired`. A second
    /// exchange of the same code is a replay: it fails with
    /// `invalid_grant` and emits a CRITICAL audit entry.
    ///
    /// # Errors
    ///
    /// `invalid_client` for bad credentials; `invalid_grant` for
    /// absent/expired/used codes, client or redirect mismatch, and PKCE
    /// failure.
    pub async fn exchange_code_for_tokens(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthError> {
        if !self.clients.validate_client_secret(client_id, client_secret) {
            return Err(OAuthError::invalid_client("Invalid client credentials"));
        }

        let mut auth_code = self
            .storage
            .get_authorization_code(code)
            .await
            .map_err(|e| OAuthError::server_error(e.message))?
            .ok_or_else(|| {
                OAuthError::invalid_grant("Invalid or expired authorization code")
            })?;

        if auth_code.used {
            tracing::error!(
                "Authorization code reuse detected for client {client_id}! Code: {}...",
                &code[..20.min(code.len())]
            );
            if let Some(ref audit) = self.audit {
                audit.log_security_event(
                    &format!("SECURITY: Authorization code reuse detected: {client_id}"),
                    Some(&json!({
                        "client_id": client_id,
                        "code": format!("{}...", &code[..20.min(code.len())]),
                    })),
                    LogLevel::Critical,
                );
            }
            return Err(OAuthError::invalid_grant("Authorization code already used"));
        }

        if auth_code.client_id != client_id {
            return Err(OAuthError::invalid_grant("Client ID mismatch"));
        }
        if auth_code.redirect_uri != redirect_uri {
            return Err(OAuthError::invalid_grant("Redirect URI mismatch"));
        }

        if !validate_code_challenge(
            code_verifier,
            &auth_code.code_challenge,
            &auth_code.code_challenge_method,
        ) {
            return Err(OAuthError::invalid_grant(
                "Invalid code_verifier (PKCE validation failed)",
            ));
        }

        // Flip used=true before minting: a concurrent retry must observe
        // the consumed state
        auth_code.used = true;
        self.storage
            .update_authorization_code(&auth_code)
            .await
            .map_err(|e| OAuthError::server_error(e.message))?;

        // An API-key-authorized code pins the token to the key's project
        // and scope
        let project_id = auth_code
            .api_key_project_id
            .clone()
            .unwrap_or_else(|| "*".into());
        let token_scope = auth_code
            .api_key_scope
            .clone()
            .unwrap_or_else(|| auth_code.scope.clone());
        let subject = auth_code
            .user_id
            .clone()
            .or_else(|| auth_code.api_key_id.clone());

        let access_token = self
            .tokens
            .generate_access_token(client_id, &token_scope, subject.as_deref(), &project_id)
            .await
            .map_err(|e| OAuthError::server_error(e.message))?;

        let refresh_token = self
            .tokens
            .generate_refresh_token(client_id, &access_token)
            .await
            .map_err(|e| OAuthError::server_error(e.message))?;

        info!(
            "Exchanged authorization code for tokens: {client_id} \
             (project_id={project_id}, scope={token_scope})"
        );

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".into(),
            expires_in: self.tokens.access_token_ttl(),
            refresh_token: Some(refresh_token),
            scope: Some(auth_code.scope),
        })
    }

    /// Handle the refresh-token grant.
    ///
    /// # Errors
    ///
    /// `invalid_client` for bad credentials, `unauthorized_client` when the
    /// client lacks the grant, `invalid_grant` for unknown/mismatched
    /// tokens, and `invalid_grant` with a reuse description (after a
    /// CRITICAL audit entry) for rotated-token reuse.
    pub async fn handle_refresh_token_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthError> {
        if !self.clients.validate_client_secret(client_id, client_secret) {
            return Err(OAuthError::invalid_client("Invalid client credentials"));
        }

        let client = self
            .clients
            .get_client(client_id)
            .ok_or_else(|| OAuthError::invalid_client("Invalid client credentials"))?;
        if !client.grant_types.iter().any(|g| g == "refresh_token") {
            return Err(OAuthError::unauthorized_client(
                "Client not authorized for the refresh_token grant",
            ));
        }

        match self.tokens.rotate_refresh_token(refresh_token, client_id).await {
            Ok(rotation) => Ok(TokenResponse {
                access_token: rotation.access_token,
                token_type: "Bearer".into(),
                expires_in: rotation.expires_in,
                refresh_token: Some(rotation.refresh_token),
                scope: Some(rotation.scope),
            }),
            Err(TokenError::InvalidGrant(msg) | TokenError::Security(msg)) => {
                Err(OAuthError::invalid_grant(msg))
            }
            Err(TokenError::Internal(msg)) => {
                tracing::error!("Error rotating refresh token: {msg}");
                Err(OAuthError::server_error("Internal server error"))
            }
        }
    }

    /// Handle the client-credentials grant (no refresh token).
    ///
    /// # Errors
    ///
    /// `invalid_client`, `unauthorized_client`, or `invalid_scope`.
    pub async fn handle_client_credentials_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse, OAuthError> {
        if !self.clients.validate_client_secret(client_id, client_secret) {
            return Err(OAuthError::invalid_client("Invalid client credentials"));
        }

        let client = self
            .clients
            .get_client(client_id)
            .ok_or_else(|| OAuthError::invalid_client("Invalid client credentials"))?;
        if !client.grant_types.iter().any(|g| g == "client_credentials") {
            return Err(OAuthError::unauthorized_client(
                "Client not authorized for the client_credentials grant",
            ));
        }

        let requested_scopes: Vec<String> = scope.map_or_else(
            || vec![client.scope.clone()],
            |s| s.split_whitespace().map(str::to_owned).collect(),
        );
        for s in &requested_scopes {
            if !client.allowed_scopes.iter().any(|allowed| allowed == s) {
                return Err(OAuthError::invalid_scope(format!(
                    "Scope '{s}' not allowed for this client"
                )));
            }
        }
        let granted = requested_scopes.join(" ");

        let access_token = self
            .tokens
            .generate_access_token(client_id, &granted, None, "*")
            .await
            .map_err(|e| OAuthError::server_error(e.message))?;

        info!("Generated client credentials token for {client_id}");

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".into(),
            expires_in: self.tokens.access_token_ttl(),
            refresh_token: None,
            scope: Some(granted),
        })
    }
}
