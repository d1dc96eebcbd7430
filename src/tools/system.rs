// ABOUTME: System management tools - API keys, OAuth clients, rate limits, audit
// ABOUTME: Registered under the system namespace and whitelisted on /system
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # System Tools
//!
//! Management operations bound directly to the core singletons: API key
//! lifecycle, OAuth client registration, rate-limit administration, audit
//! queries, and system status. These tools carry `plugin_type = "system"`
//! and are exposed on the master-key-only `/system` endpoint (plus the
//! admin endpoint).

use crate::api_keys::{ApiKeyStore, Scope};
use crate::audit::{AuditLogger, AuditQuery, EventType, LogLevel};
use crate::errors::AppError;
use crate::health::HealthMonitor;
use crate::oauth2::client_registry::ClientRegistry;
use crate::rate_limiting::RateLimiter;
use crate::site_registry::SiteRegistry;
use crate::tool_registry::{ToolDefinition, ToolHandler, ToolResult};
use serde_json::{json, Map, Value};
use std::sync::{Arc, RwLock};

/// Endpoint summaries published for `get_endpoints`; the gateway fills
/// this after the endpoint fleet is built.
pub type EndpointInfoSlot = Arc<RwLock<Vec<crate::endpoints::EndpointInfo>>>;

/// Collaborators the system tools operate on
#[derive(Clone)]
pub struct SystemToolsDeps {
    /// API key store
    pub api_keys: Arc<ApiKeyStore>,
    /// Rate limiter
    pub rate_limiter: Arc<RateLimiter>,
    /// Audit logger
    pub audit: Arc<AuditLogger>,
    /// Site registry
    pub sites: Arc<SiteRegistry>,
    /// OAuth client registry
    pub oauth_clients: Arc<ClientRegistry>,
    /// Health monitor
    pub health: Arc<HealthMonitor>,
    /// Endpoint summaries (filled after endpoint construction)
    pub endpoint_infos: EndpointInfoSlot,
}

fn str_param(args: &Map<String, Value>, key: &str) -> Result<String, AppError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| AppError::invalid_input(format!("Missing required parameter '{key}'")))
}

fn make_tool(
    name: &str,
    description: &str,
    input_schema: Value,
    required_scope: Scope,
    handler: ToolHandler,
) -> ToolDefinition {
    ToolDefinition {
        name: name.to_owned(),
        description: description.to_owned(),
        input_schema,
        handler,
        required_scope,
        plugin_type: "system".into(),
    }
}

/// Wrap a synchronous closure as an async tool handler
fn sync_handler<F>(f: F) -> ToolHandler
where
    F: Fn(Map<String, Value>) -> ToolResult + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |args| {
        let f = Arc::clone(&f);
        Box::pin(async move { (*f)(args) })
    })
}

/// Build the system tool set
#[must_use]
pub fn system_tools(deps: &SystemToolsDeps) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();

    tools.extend(api_key_tools(deps));
    tools.extend(status_tools(deps));
    tools.extend(oauth_tools(deps));
    tools.extend(rate_limit_tools(deps));

    tools
}

fn api_key_tools(deps: &SystemToolsDeps) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();

    let api_keys = Arc::clone(&deps.api_keys);
    tools.push(make_tool(
        "manage_api_keys_create",
        "Create a new per-project API key; the raw key is shown once",
        json!({
            "type": "object",
            "properties": {
                "project_id": {"type": "string", "description": "Project ID or '*' for all projects"},
                "scope": {"type": "string", "description": "Space-separated scopes (read write admin)", "default": "read"},
                "expires_in_days": {"type": "integer", "description": "Optional expiry in days"},
                "description": {"type": "string"}
            },
            "required": ["project_id"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let project_id = str_param(&args, "project_id")?;
            let scope = args
                .get("scope")
                .and_then(Value::as_str)
                .unwrap_or("read")
                .to_owned();
            let expires_in_days = args.get("expires_in_days").and_then(Value::as_i64);
            let description = args
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_owned);

            let created = api_keys.create_key(&project_id, &scope, expires_in_days, description)?;
            Ok(serde_json::to_value(created)?)
        }),
    ));

    let api_keys = Arc::clone(&deps.api_keys);
    tools.push(make_tool(
        "manage_api_keys_list",
        "List API keys, optionally filtered by project",
        json!({
            "type": "object",
            "properties": {
                "project_id": {"type": "string"},
                "include_revoked": {"type": "boolean", "default": false}
            }
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let project_id = args.get("project_id").and_then(Value::as_str);
            let include_revoked = args
                .get("include_revoked")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(serde_json::to_value(
                api_keys.list_keys(project_id, include_revoked),
            )?)
        }),
    ));

    let api_keys = Arc::clone(&deps.api_keys);
    tools.push(make_tool(
        "manage_api_keys_get_info",
        "Get details for one API key",
        json!({
            "type": "object",
            "properties": {
                "key_id": {"type": "string"}
            },
            "required": ["key_id"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let key_id = str_param(&args, "key_id")?;
            match api_keys.get_key_info(&key_id) {
                Some(info) => Ok(serde_json::to_value(info)?),
                None => Err(AppError::not_found(format!("Key {key_id}"))),
            }
        }),
    ));

    let api_keys = Arc::clone(&deps.api_keys);
    tools.push(make_tool(
        "manage_api_keys_revoke",
        "Revoke an API key",
        json!({
            "type": "object",
            "properties": {
                "key_id": {"type": "string"}
            },
            "required": ["key_id"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let key_id = str_param(&args, "key_id")?;
            if api_keys.revoke_key(&key_id) {
                Ok(json!({"revoked": true, "key_id": key_id}))
            } else {
                Err(AppError::not_found(format!("Key {key_id}")))
            }
        }),
    ));

    let api_keys = Arc::clone(&deps.api_keys);
    tools.push(make_tool(
        "manage_api_keys_delete",
        "Permanently delete an API key",
        json!({
            "type": "object",
            "properties": {
                "key_id": {"type": "string"}
            },
            "required": ["key_id"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let key_id = str_param(&args, "key_id")?;
            if api_keys.delete_key(&key_id) {
                Ok(json!({"deleted": true, "key_id": key_id}))
            } else {
                Err(AppError::not_found(format!("Key {key_id}")))
            }
        }),
    ));

    let api_keys = Arc::clone(&deps.api_keys);
    tools.push(make_tool(
        "manage_api_keys_rotate",
        "Rotate all valid keys for a project (new keys, old ones revoked)",
        json!({
            "type": "object",
            "properties": {
                "project_id": {"type": "string"}
            },
            "required": ["project_id"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let project_id = str_param(&args, "project_id")?;
            let rotated = api_keys.rotate_keys(&project_id)?;
            Ok(serde_json::to_value(rotated)?)
        }),
    ));

    tools
}

fn status_tools(deps: &SystemToolsDeps) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();

    let sites = Arc::clone(&deps.sites);
    tools.push(make_tool(
        "list_projects",
        "List all configured projects (tenants) across plugin types",
        json!({"type": "object", "properties": {}}),
        Scope::Read,
        sync_handler(move |_args| {
            let projects: Vec<Value> = sites
                .all_sites()
                .into_iter()
                .map(|site| {
                    json!({
                        "project_id": site.full_id(),
                        "plugin_type": site.plugin_type,
                        "site_id": site.site_id,
                        "alias": site.alias,
                        "path_suffix": sites.get_effective_path_suffix(&site.full_id()),
                    })
                })
                .collect();
            Ok(json!({"projects": projects, "counts": sites.get_count_by_type()}))
        }),
    ));

    let endpoint_infos = Arc::clone(&deps.endpoint_infos);
    tools.push(make_tool(
        "get_endpoints",
        "List all mounted MCP endpoints",
        json!({"type": "object", "properties": {}}),
        Scope::Read,
        sync_handler(move |_args| {
            let infos = endpoint_infos
                .read()
                .map(|i| i.clone())
                .unwrap_or_default();
            Ok(serde_json::to_value(infos)?)
        }),
    ));

    let health = Arc::clone(&deps.health);
    let sites = Arc::clone(&deps.sites);
    tools.push(make_tool(
        "get_system_info",
        "System metrics, uptime, and tenant counts",
        json!({"type": "object", "properties": {}}),
        Scope::Read,
        sync_handler(move |_args| {
            Ok(json!({
                "system_metrics": health.system_metrics(),
                "uptime": health.uptime(),
                "site_counts": sites.get_count_by_type(),
                "version": crate::constants::protocol::SERVER_VERSION,
            }))
        }),
    ));

    let audit = Arc::clone(&deps.audit);
    tools.push(make_tool(
        "get_audit_log",
        "Query the audit log with optional filters",
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "default": 100},
                "event_type": {"type": "string", "description": "tool_call, authentication, health_check, error, system"},
                "level": {"type": "string", "description": "INFO, WARNING, ERROR, CRITICAL"},
                "project_id": {"type": "string"},
                "tool_name": {"type": "string"},
                "success_only": {"type": "boolean"}
            }
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let query = AuditQuery {
                event_type: args.get("event_type").and_then(Value::as_str).and_then(
                    |s| match s {
                        "tool_call" => Some(EventType::ToolCall),
                        "authentication" => Some(EventType::Authentication),
                        "health_check" => Some(EventType::HealthCheck),
                        "error" => Some(EventType::Error),
                        "system" => Some(EventType::System),
                        _ => None,
                    },
                ),
                level: args
                    .get("level")
                    .and_then(Value::as_str)
                    .and_then(|s| match s {
                        "INFO" => Some(LogLevel::Info),
                        "WARNING" => Some(LogLevel::Warning),
                        "ERROR" => Some(LogLevel::Error),
                        "CRITICAL" => Some(LogLevel::Critical),
                        _ => None,
                    }),
                project_id: args
                    .get("project_id")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                tool_name: args
                    .get("tool_name")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                success_only: args.get("success_only").and_then(Value::as_bool),
                limit: args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map_or(100, |v| v as usize),
                ..AuditQuery::default()
            };
            Ok(json!({
                "entries": audit.get_logs(&query),
                "statistics": audit.get_statistics(),
            }))
        }),
    ));

    tools
}

fn oauth_tools(deps: &SystemToolsDeps) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();

    let clients = Arc::clone(&deps.oauth_clients);
    tools.push(make_tool(
        "oauth_register_client",
        "Register a new OAuth client; the secret is shown once",
        json!({
            "type": "object",
            "properties": {
                "client_name": {"type": "string"},
                "redirect_uris": {"type": "array", "items": {"type": "string"}},
                "grant_types": {"type": "array", "items": {"type": "string"}},
                "allowed_scopes": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["client_name", "redirect_uris"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let client_name = str_param(&args, "client_name")?;
            let redirect_uris: Vec<String> = args
                .get("redirect_uris")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();
            if redirect_uris.is_empty() {
                return Err(AppError::invalid_input("redirect_uris must not be empty"));
            }
            let as_string_vec = |key: &str| -> Option<Vec<String>> {
                args.get(key).and_then(Value::as_array).map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                })
            };

            let (client_id, client_secret) = clients.create_client(
                &client_name,
                redirect_uris,
                as_string_vec("grant_types"),
                as_string_vec("allowed_scopes"),
                None,
            )?;
            Ok(json!({"client_id": client_id, "client_secret": client_secret}))
        }),
    ));

    let clients = Arc::clone(&deps.oauth_clients);
    tools.push(make_tool(
        "oauth_list_clients",
        "List registered OAuth clients",
        json!({"type": "object", "properties": {}}),
        Scope::Admin,
        sync_handler(move |_args| {
            let list: Vec<Value> = clients
                .list_clients()
                .into_iter()
                .map(|c| {
                    json!({
                        "client_id": c.client_id,
                        "client_name": c.client_name,
                        "redirect_uris": c.redirect_uris,
                        "grant_types": c.grant_types,
                        "allowed_scopes": c.allowed_scopes,
                        "created_at": c.created_at.to_rfc3339(),
                    })
                })
                .collect();
            Ok(json!({"clients": list}))
        }),
    ));

    let clients = Arc::clone(&deps.oauth_clients);
    tools.push(make_tool(
        "oauth_revoke_client",
        "Delete an OAuth client registration",
        json!({
            "type": "object",
            "properties": {
                "client_id": {"type": "string"}
            },
            "required": ["client_id"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let client_id = str_param(&args, "client_id")?;
            if clients.delete_client(&client_id) {
                Ok(json!({"deleted": true, "client_id": client_id}))
            } else {
                Err(AppError::not_found(format!("Client {client_id}")))
            }
        }),
    ));

    let clients = Arc::clone(&deps.oauth_clients);
    tools.push(make_tool(
        "oauth_get_client_info",
        "Get details for one OAuth client",
        json!({
            "type": "object",
            "properties": {
                "client_id": {"type": "string"}
            },
            "required": ["client_id"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let client_id = str_param(&args, "client_id")?;
            match clients.get_client(&client_id) {
                Some(c) => Ok(json!({
                    "client_id": c.client_id,
                    "client_name": c.client_name,
                    "redirect_uris": c.redirect_uris,
                    "grant_types": c.grant_types,
                    "allowed_scopes": c.allowed_scopes,
                    "token_endpoint_auth_method": c.token_endpoint_auth_method,
                    "created_at": c.created_at.to_rfc3339(),
                })),
                None => Err(AppError::not_found(format!("Client {client_id}"))),
            }
        }),
    ));

    tools
}

fn rate_limit_tools(deps: &SystemToolsDeps) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();

    let limiter = Arc::clone(&deps.rate_limiter);
    tools.push(make_tool(
        "get_rate_limit_stats",
        "Rate limiter statistics, globally or for one client",
        json!({
            "type": "object",
            "properties": {
                "client_id": {"type": "string", "description": "Omit for global statistics"}
            }
        }),
        Scope::Admin,
        sync_handler(move |args| {
            match args.get("client_id").and_then(Value::as_str) {
                Some(client_id) => match limiter.client_stats(client_id) {
                    Some(stats) => Ok(serde_json::to_value(stats)?),
                    None => Err(AppError::not_found(format!("Client {client_id}"))),
                },
                None => Ok(serde_json::to_value(limiter.all_stats())?),
            }
        }),
    ));

    let limiter = Arc::clone(&deps.rate_limiter);
    tools.push(make_tool(
        "reset_rate_limit",
        "Reset rate-limit state for one client, or all clients when omitted",
        json!({
            "type": "object",
            "properties": {
                "client_id": {"type": "string"}
            }
        }),
        Scope::Admin,
        sync_handler(move |args| {
            match args.get("client_id").and_then(Value::as_str) {
                Some(client_id) => Ok(json!({"reset": limiter.reset_client(client_id)})),
                None => Ok(json!({"reset_clients": limiter.reset_all()})),
            }
        }),
    ));

    let limiter = Arc::clone(&deps.rate_limiter);
    tools.push(make_tool(
        "set_rate_limit_config",
        "Update rate limits for a plugin type (affects new clients)",
        json!({
            "type": "object",
            "properties": {
                "plugin_type": {"type": "string"},
                "per_minute": {"type": "integer"},
                "per_hour": {"type": "integer"},
                "per_day": {"type": "integer"}
            },
            "required": ["plugin_type"]
        }),
        Scope::Admin,
        sync_handler(move |args| {
            let plugin_type = str_param(&args, "plugin_type")?;
            let as_u32 = |key: &str| args.get(key).and_then(Value::as_u64).map(|v| v as u32);
            limiter.configure_limits(
                &plugin_type,
                as_u32("per_minute"),
                as_u32("per_hour"),
                as_u32("per_day"),
            );
            Ok(json!({"updated": true, "plugin_type": plugin_type}))
        }),
    ));

    tools
}
