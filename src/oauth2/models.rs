// ABOUTME: OAuth 2.1 data models for clients, codes, tokens, and wire messages
// ABOUTME: Includes the structured OAuth error type with RFC-named constructors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OAuth 2.1 client record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Client identifier (e.g. `cmp_client_xxx`)
    pub client_id: String,
    /// SHA-256 hex digest of the client secret
    pub client_secret_hash: String,
    /// Human-readable client name
    pub client_name: String,
    /// Allowed redirect URIs (exact match)
    pub redirect_uris: Vec<String>,
    /// Allowed grant types
    pub grant_types: Vec<String>,
    /// Allowed response types
    #[serde(default = "default_response_types")]
    pub response_types: Vec<String>,
    /// Default scope for this client
    #[serde(default = "default_scope")]
    pub scope: String,
    /// All scopes this client can request
    pub allowed_scopes: Vec<String>,
    /// Token endpoint authentication method
    #[serde(default = "default_auth_method")]
    pub token_endpoint_auth_method: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Value,
}

fn default_response_types() -> Vec<String> {
    vec!["code".into()]
}

fn default_scope() -> String {
    "read".into()
}

fn default_auth_method() -> String {
    "client_secret_post".into()
}

/// Grant types a client may register for
pub const ALLOWED_GRANT_TYPES: &[&str] =
    &["authorization_code", "refresh_token", "client_credentials"];

/// One-time authorization code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The code value (`auth_` prefix)
    pub code: String,
    /// Issuing client
    pub client_id: String,
    /// Redirect URI bound to the code
    pub redirect_uri: String,
    /// Granted scopes (space-separated)
    pub scope: String,
    /// PKCE code challenge
    pub code_challenge: String,
    /// PKCE method; only "S256"
    pub code_challenge_method: String,
    /// Expiry (5-minute TTL)
    pub expires_at: DateTime<Utc>,
    /// Flips false -> true exactly once; a second exchange is a reuse event
    pub used: bool,
    /// Optional authenticated user
    #[serde(default)]
    pub user_id: Option<String>,
    /// API key id when authorization was performed via API-key login
    #[serde(default)]
    pub api_key_id: Option<String>,
    /// Project inherited from the API key
    #[serde(default)]
    pub api_key_project_id: Option<String>,
    /// Scope inherited from the API key
    #[serde(default)]
    pub api_key_scope: Option<String>,
}

impl AuthorizationCode {
    /// Whether the code is past its TTL
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Access token metadata (informational; JWT validation is canonical)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    /// The JWT itself
    pub token: String,
    /// Issuing client
    pub client_id: String,
    /// Granted scopes
    pub scope: String,
    /// Expiry
    pub expires_at: DateTime<Utc>,
    /// Optional subject
    #[serde(default)]
    pub user_id: Option<String>,
    /// Project scoping ("*" for global)
    #[serde(default = "default_project")]
    pub project_id: String,
    /// Issue time
    pub issued_at: DateTime<Utc>,
}

fn default_project() -> String {
    "*".into()
}

impl AccessTokenRecord {
    /// Whether the token is past its TTL
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Refresh token record; revoked entries are retained as tombstones so
/// reuse of a rotated token can be detected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// The token value (`rt_` prefix)
    pub token: String,
    /// Issuing client
    pub client_id: String,
    /// Access token this refresh token was linked to
    #[serde(default)]
    pub access_token: Option<String>,
    /// Expiry (7-day TTL)
    pub expires_at: DateTime<Utc>,
    /// Revocation tombstone
    pub revoked: bool,
    /// Number of rotations in this token's chain
    #[serde(default)]
    pub rotation_count: u32,
    /// Issue time
    pub issued_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Whether the token is past its TTL
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// `/authorize` query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    /// Must be "code"
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Callback URI
    pub redirect_uri: String,
    /// Requested scopes (space-separated)
    #[serde(default)]
    pub scope: Option<String>,
    /// Opaque client state
    #[serde(default)]
    pub state: Option<String>,
    /// PKCE code challenge
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE method (only "S256")
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// `/token` form body
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    /// `authorization_code` | `refresh_token` | `client_credentials`
    pub grant_type: String,
    /// Authorization code (authorization_code grant)
    #[serde(default)]
    pub code: Option<String>,
    /// Redirect URI (must match the code's)
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// PKCE code verifier
    #[serde(default)]
    pub code_verifier: Option<String>,
    /// Refresh token (refresh_token grant)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Client identifier
    pub client_id: String,
    /// Client secret
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Requested scopes (client_credentials grant)
    #[serde(default)]
    pub scope: Option<String>,
}

/// `/token` success response
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// JWT access token
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Refresh token, when the grant issues one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// OAuth 2.1 structured error: `(error, error_description, status)`
#[derive(Debug, Clone, Serialize)]
pub struct OAuthError {
    /// RFC 6749 error code
    pub error: String,
    /// Human-readable description
    pub error_description: String,
    /// HTTP status to respond with
    #[serde(skip)]
    pub status: u16,
}

impl OAuthError {
    /// `invalid_request` (400)
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self {
            error: "invalid_request".into(),
            error_description: description.into(),
            status: 400,
        }
    }

    /// `invalid_client` (401)
    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self {
            error: "invalid_client".into(),
            error_description: description.into(),
            status: 401,
        }
    }

    /// `invalid_grant` (400)
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self {
            error: "invalid_grant".into(),
            error_description: description.into(),
            status: 400,
        }
    }

    /// `unauthorized_client` (400)
    #[must_use]
    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self {
            error: "unauthorized_client".into(),
            error_description: description.into(),
            status: 400,
        }
    }

    /// `unsupported_response_type` (400)
    #[must_use]
    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self {
            error: "unsupported_response_type".into(),
            error_description: description.into(),
            status: 400,
        }
    }

    /// `unsupported_grant_type` (400)
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self {
            error: "unsupported_grant_type".into(),
            error_description: "Grant type not supported".into(),
            status: 400,
        }
    }

    /// `invalid_scope` (400)
    #[must_use]
    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self {
            error: "invalid_scope".into(),
            error_description: description.into(),
            status: 400,
        }
    }

    /// `server_error` (500)
    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self {
            error: "server_error".into(),
            error_description: description.into(),
            status: 500,
        }
    }
}

impl std::fmt::Display for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.error_description)
    }
}

impl std::error::Error for OAuthError {}

impl IntoResponse for OAuthError {
    fn into_response(self) -> axum::response::Response {
        let status = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::BAD_REQUEST);
        (status, axum::Json(self)).into_response()
    }
}
