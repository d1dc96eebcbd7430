// ABOUTME: Endpoint factory - filters the global tool table into scoped endpoints
// ABOUTME: Project endpoints get a shim forcing the site argument to one tenant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Endpoint Factory
//!
//! Builds one [`McpEndpoint`] per policy: iterates the global tool
//! registry, keeps tools whose plugin type the endpoint allows and which
//! pass the whitelist/blacklist, and attaches the middleware stack. For
//! project endpoints every kept handler is wrapped in a shim that forces
//! the `site` argument to the configured tenant; the wire cannot override
//! it.

use super::config::EndpointConfig;
use super::middleware::{MiddlewareDeps, MiddlewareStack};
use crate::constants::jsonrpc_errors;
use crate::mcp::protocol::{
    self, default_request_id, tool_result_content, McpRequest, McpResponse,
};
use crate::tool_registry::{ToolDefinition, ToolRegistry};
use http::HeaderMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// One scoped MCP endpoint: a policy, a filtered tool set, and a
/// middleware stack
pub struct McpEndpoint {
    /// The endpoint's immutable policy
    pub config: Arc<EndpointConfig>,
    tools: BTreeMap<String, ToolDefinition>,
    middleware: MiddlewareStack,
}

impl McpEndpoint {
    /// Number of tools exposed by this endpoint
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Names of the exposed tools
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Handle one MCP request against this endpoint.
    ///
    /// Each `tools/call` runs inside its own request-context scope so the
    /// caller identity installed by the auth middleware is visible to the
    /// tool handler and to nothing else.
    pub async fn handle_request(&self, headers: &HeaderMap, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            "initialize" => protocol::handle_initialize(&request, &self.config.name),
            "ping" => protocol::handle_ping(&request),
            "tools/list" => self.handle_tools_list(&request),
            "tools/call" => {
                crate::context::scope(self.handle_tools_call(headers, request)).await
            }
            _ => McpResponse::error(
                request.id.or_else(|| Some(default_request_id())),
                jsonrpc_errors::ERROR_METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            ),
        }
    }

    fn handle_tools_list(&self, request: &McpRequest) -> McpResponse {
        let tools: Vec<Value> = self
            .tools
            .values()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema,
                })
            })
            .collect();

        let request_id = request.id.clone().unwrap_or_else(default_request_id);
        McpResponse::success(Some(request_id), json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, headers: &HeaderMap, request: McpRequest) -> McpResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);

        let params = request.params.unwrap_or_default();
        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::error(
                Some(request_id),
                jsonrpc_errors::ERROR_INVALID_PARAMS,
                "Missing tool name",
            );
        };

        let Some(tool) = self.tools.get(tool_name) else {
            return McpResponse::error(
                Some(request_id),
                jsonrpc_errors::ERROR_METHOD_NOT_FOUND,
                format!("Unknown tool: {tool_name}"),
            );
        };

        let arguments: Map<String, Value> = params
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let handler = Arc::clone(&tool.handler);
        let outcome = self
            .middleware
            .run(tool_name, headers, move || (*handler)(arguments))
            .await;

        match outcome {
            Ok(result) => McpResponse::success(Some(request_id), tool_result_content(&result)),
            Err(e) => McpResponse::from_app_error(Some(request_id), &e),
        }
    }
}

/// Factory for creating scoped MCP endpoints
pub struct EndpointFactory {
    deps: MiddlewareDeps,
}

impl EndpointFactory {
    /// Create a factory over the shared middleware collaborators
    #[must_use]
    pub fn new(deps: MiddlewareDeps) -> Self {
        Self { deps }
    }

    /// Build an endpoint from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration fails validation.
    pub fn create_endpoint(
        &self,
        config: EndpointConfig,
        registry: &ToolRegistry,
    ) -> crate::errors::AppResult<McpEndpoint> {
        config.validate()?;
        info!("Creating endpoint: {} ({})", config.path, config.name);

        let config = Arc::new(config);
        let tools = self.tools_for_endpoint(&config, registry);

        info!(
            "  - Registering {} tools for {}",
            tools.len(),
            config.path
        );

        if tools.len() > config.max_tools {
            warn!(
                "Endpoint {} has {} tools, exceeding max_tools={}",
                config.path,
                tools.len(),
                config.max_tools
            );
        }

        let middleware = MiddlewareStack::new(Arc::clone(&config), self.deps.clone());

        Ok(McpEndpoint {
            config,
            tools,
            middleware,
        })
    }

    /// Select and (for project endpoints) wrap the tools this endpoint
    /// exposes
    fn tools_for_endpoint(
        &self,
        config: &Arc<EndpointConfig>,
        registry: &ToolRegistry,
    ) -> BTreeMap<String, ToolDefinition> {
        let mut tools = BTreeMap::new();

        for tool in registry.get_all() {
            // Plugin-type filter by longest-prefix attribution of the name
            if let Some(plugin_type) = registry.extract_plugin_type(&tool.name) {
                if !config.allows_plugin(plugin_type) {
                    continue;
                }
            } else if !config.allows_plugin("system") {
                // System tools only appear where the policy names them
                continue;
            }

            if !config.allows_tool(&tool.name) {
                continue;
            }

            let tool = match config.site_filter {
                Some(ref site_filter) => wrap_with_site_filter(tool, site_filter),
                None => (*tool).clone(),
            };

            tools.insert(tool.name.clone(), tool);
        }

        tools
    }
}

/// Pin a tool to one tenant: the shim overwrites any wire-supplied `site`
/// argument with the endpoint's configured tenant id.
fn wrap_with_site_filter(tool: &ToolDefinition, site_filter: &str) -> ToolDefinition {
    // The site parameter wants the bare site identifier; the filter is a
    // full_id like "wordpress_site1"
    let site_value = site_filter
        .split_once('_')
        .map_or(site_filter, |(_, rest)| rest)
        .to_owned();

    let inner = Arc::clone(&tool.handler);
    let handler: crate::tool_registry::ToolHandler = Arc::new(move |mut args: Map<String, Value>| {
        args.insert("site".into(), Value::String(site_value.clone()));
        (*inner)(args)
    });

    ToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.input_schema.clone(),
        handler,
        required_scope: tool.required_scope,
        plugin_type: tool.plugin_type.clone(),
    }
}
