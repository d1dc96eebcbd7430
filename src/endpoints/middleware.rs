// ABOUTME: Per-endpoint middleware chain - Auth, RateLimit, Audit around tool calls
// ABOUTME: Sets and clears the request context on every exit path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Endpoint Middleware
//!
//! Composed per endpoint and run around every `tools/call`:
//!
//! 1. **Auth** classifies the credential (`sk-` master key, `cmp_` API
//!    key, otherwise JWT bearer), enforces the endpoint policy, and
//!    installs the request context.
//! 2. **RateLimit** consumes tokens for the client identifier.
//! 3. **Audit** records the call outcome with its duration.
//!
//! Failures at any stage are reported to the client; the handler is never
//!    invoked after a rejection. The request context is cleared on every
//! exit path, including handler errors.

use crate::api_keys::ApiKeyStore;
use crate::audit::AuditLogger;
use crate::auth::AuthManager;
use crate::constants::{key_prefixes, rate_limits};
use crate::context::{self, RequestIdentity};
use crate::errors::{AppError, AppResult};
use crate::oauth2::TokenManager;
use crate::rate_limiting::RateLimiter;
use crate::tool_registry::ToolResult;
use http::HeaderMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::config::EndpointConfig;

/// Authentication context resolved for one request
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Key identifier ("master", "key_...", "oauth_...")
    pub key_id: Option<String>,
    /// Project the credential is scoped to
    pub project_id: Option<String>,
    /// Space-separated scopes
    pub scope: String,
    /// Whether the caller presented the master key
    pub is_master_key: bool,
    /// Whether the caller presented an OAuth bearer token
    pub is_oauth_token: bool,
}

/// Shared collaborators the middleware needs
#[derive(Clone)]
pub struct MiddlewareDeps {
    /// Master key validation
    pub auth_manager: Arc<AuthManager>,
    /// API key lookup
    pub api_keys: Arc<ApiKeyStore>,
    /// OAuth access token validation
    pub token_manager: Arc<TokenManager>,
    /// Request admission
    pub rate_limiter: Arc<RateLimiter>,
    /// Audit trail
    pub audit: Arc<AuditLogger>,
}

/// The per-endpoint middleware stack
pub struct MiddlewareStack {
    config: Arc<EndpointConfig>,
    deps: MiddlewareDeps,
}

impl MiddlewareStack {
    /// Build the stack for one endpoint
    #[must_use]
    pub fn new(config: Arc<EndpointConfig>, deps: MiddlewareDeps) -> Self {
        Self { config, deps }
    }

    /// Run one tool call through Auth -> RateLimit -> Audit -> handler.
    ///
    /// # Errors
    ///
    /// Propagates auth/policy rejections, rate-limit rejections, and
    /// handler errors. The request context is cleared before returning on
    /// every path.
    pub async fn run<F, Fut>(
        &self,
        tool_name: &str,
        headers: &HeaderMap,
        handler: F,
    ) -> ToolResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ToolResult>,
    {
        let result = self.run_inner(tool_name, headers, handler).await;
        context::clear();
        result
    }

    async fn run_inner<F, Fut>(
        &self,
        tool_name: &str,
        headers: &HeaderMap,
        handler: F,
    ) -> ToolResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ToolResult>,
    {
        // 1. Auth
        let auth_context = match self.authenticate(headers) {
            Ok(ctx) => ctx,
            Err(e) => {
                self.deps.audit.log_authentication(
                    false,
                    None,
                    Some(&e.message),
                    client_ip(headers).as_deref(),
                );
                context::clear();
                return Err(e);
            }
        };

        if let Err(e) = self
            .check_endpoint_access(&auth_context)
            .and_then(|()| self.check_tool_access(tool_name, &auth_context))
        {
            context::clear();
            return Err(e);
        }

        if let Some(ref key_id) = auth_context.key_id {
            let project_id = auth_context
                .project_id
                .clone()
                .unwrap_or_else(|| "*".into());
            context::set(RequestIdentity {
                key_id: key_id.clone(),
                is_global: project_id == "*",
                project_id,
                scope: auth_context.scope.clone(),
            });
        }

        // 2. RateLimit
        let plugin_type = auth_context
            .project_id
            .as_deref()
            .and_then(|p| p.split('_').next())
            .map(str::to_owned);
        let client_id = rate_limit_client_id(headers);
        let decision = self.deps.rate_limiter.check_rate_limit(
            &client_id,
            Some(tool_name),
            plugin_type.as_deref(),
        );
        if !decision.allowed {
            context::clear();
            return Err(AppError::rate_limit_exceeded(decision.retry_after_seconds));
        }

        // 3. Audit around the handler
        let started = Instant::now();
        let outcome = handler().await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(_) => {
                self.deps.audit.log_tool_call(
                    tool_name,
                    None,
                    auth_context.project_id.as_deref(),
                    None,
                    None,
                    Some(duration_ms),
                    auth_context.key_id.as_deref(),
                );
                debug!(
                    "Tool {tool_name} executed successfully (key={:?}, duration={duration_ms}ms)",
                    auth_context.key_id
                );
            }
            Err(e) => {
                self.deps.audit.log_tool_call(
                    tool_name,
                    None,
                    auth_context.project_id.as_deref(),
                    None,
                    Some(&e.message),
                    Some(duration_ms),
                    auth_context.key_id.as_deref(),
                );
                warn!("Tool {tool_name} failed: {} (duration={duration_ms}ms)", e.message);
            }
        }

        outcome
    }

    /// Classify the Authorization header and resolve the caller identity.
    fn authenticate(&self, headers: &HeaderMap) -> AppResult<AuthContext> {
        let header = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if header.is_empty() {
            if self.config.require_master_key {
                return Err(AppError::auth_required(
                    "Master API key required for this endpoint",
                ));
            }
            // Anonymous caller; no context is installed
            return Ok(AuthContext {
                scope: "read".into(),
                ..AuthContext::default()
            });
        }

        let token = header.strip_prefix("Bearer ").unwrap_or(header);

        if token.starts_with(key_prefixes::MASTER) {
            if self.deps.auth_manager.validate_master_key(token) {
                return Ok(AuthContext {
                    key_id: Some("master".into()),
                    project_id: Some("*".into()),
                    scope: "admin".into(),
                    is_master_key: true,
                    is_oauth_token: false,
                });
            }
            return Err(AppError::auth_invalid("Invalid master API key"));
        }

        if token.starts_with(key_prefixes::API_KEY) {
            let key = self
                .deps
                .api_keys
                .get_key_by_token(token)
                .ok_or_else(|| AppError::auth_invalid("Invalid API key"))?;

            if key.revoked {
                return Err(AppError::auth_revoked("API key has been revoked"));
            }
            if key.is_expired() {
                return Err(AppError::auth_expired("API key has expired"));
            }

            return Ok(AuthContext {
                key_id: Some(key.key_id),
                project_id: Some(key.project_id),
                scope: key.scope,
                is_master_key: false,
                is_oauth_token: false,
            });
        }

        // Anything else is treated as an OAuth bearer token (JWT)
        match self.deps.token_manager.validate_access_token(token) {
            Ok(claims) => Ok(AuthContext {
                key_id: Some(format!(
                    "oauth_{}",
                    claims.sub.as_deref().unwrap_or("unknown")
                )),
                project_id: Some(claims.project_id),
                scope: claims.scope,
                is_master_key: false,
                is_oauth_token: true,
            }),
            Err(_) => Err(AppError::auth_invalid("Invalid authentication token")),
        }
    }

    /// Endpoint-level policy checks after identification
    fn check_endpoint_access(&self, auth: &AuthContext) -> AppResult<()> {
        // The master key always passes
        if auth.is_master_key {
            return Ok(());
        }

        if self.config.require_master_key {
            return Err(AppError::permission_denied(format!(
                "Endpoint {} requires the master API key",
                self.config.path
            )));
        }

        if !self.config.allowed_scopes.is_empty() {
            let caller_scopes: Vec<&str> = auth.scope.split_whitespace().collect();
            let intersects = caller_scopes
                .iter()
                .any(|s| self.config.allowed_scopes.contains(*s));
            if !intersects {
                return Err(AppError::permission_denied(format!(
                    "Insufficient scope. Required one of: {:?}, got: {:?}",
                    self.config.allowed_scopes, caller_scopes
                )));
            }
        }

        // A project-scoped key may only reach endpoints of its plugin type
        if let Some(ref project_id) = auth.project_id {
            if project_id != "*" && !self.config.plugin_types.is_empty() {
                if let Some(key_plugin_type) = project_id.split('_').next() {
                    if !self
                        .config
                        .plugin_types
                        .iter()
                        .any(|p| p == key_plugin_type)
                    {
                        return Err(AppError::permission_denied(format!(
                            "API key for {key_plugin_type} cannot access the {} endpoint",
                            self.config.path
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Tool-level policy re-check (defence in depth: the factory already
    /// filtered the endpoint's tool set)
    fn check_tool_access(&self, tool_name: &str, auth: &AuthContext) -> AppResult<()> {
        if auth.is_master_key {
            return Ok(());
        }

        if !self.config.allows_tool(tool_name) {
            return Err(AppError::permission_denied(format!(
                "Access denied to tool: {tool_name}"
            )));
        }

        Ok(())
    }
}

/// Client identifier for rate limiting: the Authorization header value
/// truncated, or "anonymous"
#[must_use]
pub fn rate_limit_client_id(headers: &HeaderMap) -> String {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || "anonymous".to_owned(),
            |v| v.chars().take(rate_limits::CLIENT_ID_MAX_LEN).collect(),
        )
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
