// ABOUTME: JWT access token minting/validation and refresh-token rotation
// ABOUTME: Detects refresh-token reuse through revoked tombstones and audits it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Token Manager
//!
//! Access tokens are HS256 JWTs over `(client_id, scope, project_id, iat,
//! exp, nbf, jti, sub?)`; validation is stateless. Refresh tokens rotate:
//! each use mints a replacement and revokes the old token, and a revoked
//! token presented again is a reuse event that raises a security error and
//! a CRITICAL audit entry.

use super::models::{AccessTokenRecord, RefreshTokenRecord};
use super::storage::OAuthStorage;
use crate::api_keys::random_urlsafe;
use crate::audit::{AuditLogger, LogLevel};
use crate::config::OAuthConfig;
use crate::constants::key_prefixes;
use crate::errors::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Claims carried by a gateway access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuing OAuth client
    pub client_id: String,
    /// Granted scopes (space-separated)
    pub scope: String,
    /// Project scoping ("*" for global)
    pub project_id: String,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Not-before (unix seconds)
    pub nbf: i64,
    /// Unique token id
    pub jti: String,
    /// Optional subject (user or API key id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// Token operation failures
#[derive(Debug, Error)]
pub enum TokenError {
    /// The grant is invalid (absent, expired, mismatched)
    #[error("{0}")]
    InvalidGrant(String),
    /// A single-use credential was observed twice
    #[error("{0}")]
    Security(String),
    /// Internal failure (storage, encoding)
    #[error("{0}")]
    Internal(String),
}

/// Access-token validation failures; expiry and bad signatures are
/// distinct so callers can report them differently
#[derive(Debug, Error)]
pub enum JwtValidationError {
    /// The token is past its `exp`
    #[error("Access token has expired")]
    Expired,
    /// Anything else (signature, format, claims)
    #[error("Invalid access token: {0}")]
    Invalid(String),
}

/// Result of a successful refresh rotation
#[derive(Debug, Clone)]
pub struct TokenRotation {
    /// The new access token
    pub access_token: String,
    /// The new refresh token
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Scope carried over from the rotated chain
    pub scope: String,
}

/// Mints and validates access tokens, rotates refresh tokens
pub struct TokenManager {
    storage: Arc<dyn OAuthStorage>,
    jwt_secret: String,
    algorithm: Algorithm,
    access_token_ttl_secs: u64,
    refresh_token_ttl_secs: u64,
    audit: Option<Arc<AuditLogger>>,
}

impl TokenManager {
    /// Create a token manager from configuration.
    ///
    /// When `OAUTH_JWT_SECRET_KEY` is unset a random secret is generated
    /// and a warning logged; all tokens are invalidated on restart.
    #[must_use]
    pub fn new(
        config: &OAuthConfig,
        storage: Arc<dyn OAuthStorage>,
        audit: Option<Arc<AuditLogger>>,
    ) -> Self {
        let jwt_secret = config.jwt_secret.clone().unwrap_or_else(|| {
            warn!(
                "OAUTH_JWT_SECRET_KEY not set. Generated random JWT secret; \
                 all tokens will be invalidated on restart. \
                 Set OAUTH_JWT_SECRET_KEY for persistent tokens."
            );
            random_urlsafe(64)
        });

        let algorithm = match config.jwt_algorithm.as_str() {
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            _ => Algorithm::HS256,
        };

        Self {
            storage,
            jwt_secret,
            algorithm,
            access_token_ttl_secs: config.access_token_ttl_secs,
            refresh_token_ttl_secs: config.refresh_token_ttl_secs,
            audit,
        }
    }

    /// Access token lifetime in seconds
    #[must_use]
    pub const fn access_token_ttl(&self) -> u64 {
        self.access_token_ttl_secs
    }

    /// Mint a JWT access token and persist its (informational) metadata
    ///
    /// # Errors
    ///
    /// Returns an error when encoding or persistence fails.
    pub async fn generate_access_token(
        &self,
        client_id: &str,
        scope: &str,
        user_id: Option<&str>,
        project_id: &str,
    ) -> AppResult<String> {
        let now = Utc::now();
        let now_ts = now.timestamp();
        let ttl = i64::try_from(self.access_token_ttl_secs).unwrap_or(3_600);

        let claims = Claims {
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            project_id: project_id.to_owned(),
            iat: now_ts,
            exp: now_ts + ttl,
            nbf: now_ts,
            jti: random_urlsafe(16),
            sub: user_id.map(str::to_owned),
        };

        let token = encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))?;

        let record = AccessTokenRecord {
            token: token.clone(),
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            expires_at: now + Duration::seconds(ttl),
            user_id: user_id.map(str::to_owned),
            project_id: project_id.to_owned(),
            issued_at: now,
        };
        self.storage.save_access_token(&record).await?;

        info!("Generated access token for client {client_id} (scope: {scope})");
        Ok(token)
    }

    /// Validate a JWT access token (signature, `exp`, `nbf`) and return its
    /// claims.
    ///
    /// # Errors
    ///
    /// [`JwtValidationError::Expired`] for expired tokens, otherwise
    /// [`JwtValidationError::Invalid`].
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    warn!("Expired access token");
                    Err(JwtValidationError::Expired)
                }
                other => {
                    warn!("Invalid access token: {other:?}");
                    Err(JwtValidationError::Invalid(e.to_string()))
                }
            },
        }
    }

    /// Decode claims without expiry validation (used to carry scope across
    /// a rotation even when the linked access token already expired)
    fn decode_claims_ignore_expiry(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .ok()
        .map(|data| data.claims)
    }

    /// Mint a refresh token linked to an access token
    ///
    /// # Errors
    ///
    /// Returns an error when persistence fails.
    pub async fn generate_refresh_token(
        &self,
        client_id: &str,
        access_token: &str,
    ) -> AppResult<String> {
        self.generate_refresh_token_with_count(client_id, access_token, 0)
            .await
    }

    async fn generate_refresh_token_with_count(
        &self,
        client_id: &str,
        access_token: &str,
        rotation_count: u32,
    ) -> AppResult<String> {
        let now = Utc::now();
        let ttl = i64::try_from(self.refresh_token_ttl_secs).unwrap_or(604_800);
        let token = format!("{}{}", key_prefixes::REFRESH_TOKEN, random_urlsafe(32));

        let record = RefreshTokenRecord {
            token: token.clone(),
            client_id: client_id.to_owned(),
            access_token: Some(access_token.to_owned()),
            expires_at: now + Duration::seconds(ttl),
            revoked: false,
            rotation_count,
            issued_at: now,
        };
        self.storage.save_refresh_token(&record).await?;

        info!("Generated refresh token for client {client_id}");
        Ok(token)
    }

    /// Rotate a refresh token: mint a new access/refresh pair, revoke the
    /// old token, and detect reuse through the tombstone read path.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidGrant`] for unknown/expired tokens or client
    ///   mismatch
    /// - [`TokenError::Security`] for reuse of a revoked token (also emits
    ///   a CRITICAL audit entry)
    pub async fn rotate_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<TokenRotation, TokenError> {
        // Include tombstones: a revoked entry here is the reuse signal
        let record = self
            .storage
            .get_refresh_token(refresh_token, true)
            .await
            .map_err(|e| TokenError::Internal(e.message))?
            .ok_or_else(|| TokenError::InvalidGrant("Invalid or expired refresh token".into()))?;

        if record.revoked {
            tracing::error!("Refresh token reuse detected for client {client_id}!");
            if let Some(ref audit) = self.audit {
                audit.log_security_event(
                    &format!("SECURITY: Refresh token reuse detected: {client_id}"),
                    Some(&json!({
                        "client_id": client_id,
                        "token": format!("{}...", &refresh_token[..20.min(refresh_token.len())]),
                    })),
                    LogLevel::Critical,
                );
            }
            // Blanket revocation of the client's other tokens is a policy
            // decision left to the operator; the exchange always fails.
            return Err(TokenError::Security(
                "Refresh token reuse detected".into(),
            ));
        }

        if record.client_id != client_id {
            return Err(TokenError::InvalidGrant("Client ID mismatch".into()));
        }

        // Carry scope and project forward from the linked access token
        let (scope, project_id, user_id) = record
            .access_token
            .as_deref()
            .and_then(|t| self.decode_claims_ignore_expiry(t))
            .map_or_else(
                || ("read".to_owned(), "*".to_owned(), None),
                |claims| (claims.scope, claims.project_id, claims.sub),
            );

        let new_access_token = self
            .generate_access_token(client_id, &scope, user_id.as_deref(), &project_id)
            .await
            .map_err(|e| TokenError::Internal(e.message))?;

        let rotation_count = record.rotation_count + 1;
        let new_refresh_token = self
            .generate_refresh_token_with_count(client_id, &new_access_token, rotation_count)
            .await
            .map_err(|e| TokenError::Internal(e.message))?;

        self.storage
            .revoke_refresh_token(refresh_token)
            .await
            .map_err(|e| TokenError::Internal(e.message))?;

        info!("Rotated refresh token for client {client_id} (rotation #{rotation_count})");
        if let Some(ref audit) = self.audit {
            audit.log_system_event(
                &format!("Refresh token rotated for {client_id}"),
                Some(&json!({"client_id": client_id, "rotation_count": rotation_count})),
                LogLevel::Info,
            );
        }

        Ok(TokenRotation {
            access_token: new_access_token,
            refresh_token: new_refresh_token,
            expires_in: self.access_token_ttl_secs,
            scope,
        })
    }

    /// Revoke a refresh token out of band. Access tokens are stateless and
    /// expire naturally.
    ///
    /// # Errors
    ///
    /// Returns an error when persistence fails.
    pub async fn revoke_refresh_token(&self, token: &str) -> AppResult<bool> {
        let revoked = self.storage.revoke_refresh_token(token).await?;
        if revoked {
            info!("Revoked refresh token");
        }
        Ok(revoked)
    }
}
