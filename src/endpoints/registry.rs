// ABOUTME: Central endpoint registry - preset initialization and dynamic project mounts
// ABOUTME: Assembles the axum router exposing each endpoint at {path}/mcp
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Endpoint Registry
//!
//! Owns every built endpoint, keyed by mount path. Preset endpoints are
//! registered at startup; per-tenant `/project/{suffix}` endpoints are
//! created on demand. The registry also assembles the HTTP routes: each
//! endpoint's MCP wire surface is a POST handler at `{path}/mcp`.

use super::config::{preset_endpoint_configs, project_endpoint_config, EndpointConfig, EndpointType};
use super::factory::{EndpointFactory, McpEndpoint};
use crate::constants::protocol::MOUNT_SUFFIX;
use crate::mcp::protocol::McpRequest;
use crate::tool_registry::ToolRegistry;
use axum::routing::post;
use axum::{Json, Router};
use http::HeaderMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Summary of a registered endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    /// Mount path
    pub path: String,
    /// Display name
    pub name: String,
    /// Description
    pub description: String,
    /// Endpoint type
    pub endpoint_type: EndpointType,
    /// Number of exposed tools
    pub tool_count: usize,
    /// Plugin types included
    pub plugin_types: Vec<String>,
    /// Whether the master key is required
    pub require_master_key: bool,
}

/// Central registry for all MCP endpoints
pub struct EndpointRegistry {
    factory: EndpointFactory,
    endpoints: HashMap<String, Arc<McpEndpoint>>,
    initialized: bool,
}

impl EndpointRegistry {
    /// Create a registry over the endpoint factory
    #[must_use]
    pub fn new(factory: EndpointFactory) -> Self {
        Self {
            factory,
            endpoints: HashMap::new(),
            initialized: false,
        }
    }

    /// Build and register the preset endpoints. Failures are logged and
    /// skipped; the rest of the fleet still comes up.
    pub fn initialize_default_endpoints(&mut self, registry: &ToolRegistry) {
        if self.initialized {
            warn!("Endpoints already initialized");
            return;
        }

        info!("Initializing multi-endpoint architecture");

        for config in preset_endpoint_configs() {
            let path = config.path.clone();
            match self.factory.create_endpoint(config, registry) {
                Ok(endpoint) => {
                    info!("  + {path}: {}", endpoint.config.name);
                    self.endpoints.insert(path, Arc::new(endpoint));
                }
                Err(e) => error!("  - Failed to create {path}: {}", e.message),
            }
        }

        self.initialized = true;
        self.log_summary();
    }

    /// Create (or return the existing) per-tenant endpoint for a project.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint configuration fails validation.
    pub fn create_project_endpoint(
        &mut self,
        registry: &ToolRegistry,
        project_id: &str,
        plugin_type: &str,
        site_alias: Option<&str>,
    ) -> crate::errors::AppResult<Arc<McpEndpoint>> {
        let config = project_endpoint_config(project_id, plugin_type, site_alias);

        if let Some(existing) = self.endpoints.get(&config.path) {
            info!("Endpoint {} already exists", config.path);
            return Ok(Arc::clone(existing));
        }

        let path = config.path.clone();
        let endpoint = Arc::new(self.factory.create_endpoint(config, registry)?);
        self.endpoints.insert(path.clone(), Arc::clone(&endpoint));

        info!("Created project endpoint: {path}");
        Ok(endpoint)
    }

    /// Look up an endpoint by mount path
    #[must_use]
    pub fn get_endpoint(&self, path: &str) -> Option<&Arc<McpEndpoint>> {
        self.endpoints
            .get(path)
            .or_else(|| self.endpoints.get(path.trim_end_matches('/')))
    }

    /// Configuration of an endpoint by path
    #[must_use]
    pub fn get_config(&self, path: &str) -> Option<&EndpointConfig> {
        self.get_endpoint(path).map(|e| e.config.as_ref())
    }

    /// Summaries of every registered endpoint, sorted by path
    #[must_use]
    pub fn list_endpoints(&self) -> Vec<EndpointInfo> {
        let mut infos: Vec<EndpointInfo> = self
            .endpoints
            .values()
            .map(|endpoint| EndpointInfo {
                path: endpoint.config.path.clone(),
                name: endpoint.config.name.clone(),
                description: endpoint.config.description.clone(),
                endpoint_type: endpoint.config.endpoint_type,
                tool_count: endpoint.tool_count(),
                plugin_types: endpoint.config.plugin_types.clone(),
                require_master_key: endpoint.config.require_master_key,
            })
            .collect();
        infos.sort_by(|a, b| a.path.cmp(&b.path));
        infos
    }

    /// Assemble the axum router exposing every endpoint at `{path}/mcp`
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new();

        for (path, endpoint) in &self.endpoints {
            let route_path = if path == "/" {
                MOUNT_SUFFIX.to_owned()
            } else {
                format!("{path}{MOUNT_SUFFIX}")
            };

            let endpoint = Arc::clone(endpoint);
            router = router.route(
                &route_path,
                post(move |headers: HeaderMap, Json(request): Json<McpRequest>| {
                    let endpoint = Arc::clone(&endpoint);
                    async move { Json(endpoint.handle_request(&headers, request).await) }
                }),
            );
        }

        router
    }

    fn log_summary(&self) {
        info!("Endpoint summary:");
        let mut total_tools = 0;
        for endpoint_info in self.list_endpoints() {
            total_tools += endpoint_info.tool_count;
            let auth_note = if endpoint_info.require_master_key {
                " (master key required)"
            } else {
                ""
            };
            info!(
                "  {}: {} tools{auth_note}",
                endpoint_info.path, endpoint_info.tool_count
            );
        }
        info!(
            "Total: {} endpoints, {total_tools} tools",
            self.endpoints.len()
        );
    }
}
