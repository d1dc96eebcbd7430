// ABOUTME: Central registry of tool definitions with unique-name enforcement
// ABOUTME: Resolves a tool's plugin type by longest-prefix match on its name
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Tool Registry
//!
//! The flat table of every registered tool, keyed by unique name. Endpoints
//! filter this table into their own scoped tool sets. Plugin-type
//! attribution uses longest-prefix match over the registered namespaces so
//! `wordpress_advanced_` tools never fall into the `wordpress` family.

use crate::api_keys::Scope;
use crate::errors::{AppError, AppResult, ErrorCode};
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a tool invocation. `Err` means the invocation itself failed
/// (auth, policy, internal); upstream failures are reported as `Ok` values
/// carrying error strings so they reach the client as results.
pub type ToolResult = AppResult<Value>;

/// Async tool handler bound to its dependencies
pub type ToolHandler = Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// One registered tool
#[derive(Clone)]
pub struct ToolDefinition {
    /// Unique tool identifier (e.g. "wordpress_get_post")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for the tool parameters
    pub input_schema: Value,
    /// Async handler executing the tool
    pub handler: ToolHandler,
    /// Required API key scope
    pub required_scope: Scope,
    /// Plugin type this tool belongs to ("system" for built-ins)
    pub plugin_type: String,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("plugin_type", &self.plugin_type)
            .field("required_scope", &self.required_scope)
            .finish_non_exhaustive()
    }
}

/// Central registry for all tools
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    /// Known plugin namespaces for name-prefix attribution
    namespaces: BTreeSet<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a plugin namespace for prefix attribution (idempotent).
    /// Registration of a tool declares its namespace automatically.
    pub fn declare_namespace(&mut self, plugin_type: &str) {
        self.namespaces.insert(plugin_type.to_owned());
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` when the name is taken; registry
    /// state is unchanged in that case.
    pub fn register(&mut self, tool: ToolDefinition) -> AppResult<()> {
        if self.tools.contains_key(&tool.name) {
            return Err(AppError::new(
                ErrorCode::ResourceAlreadyExists,
                format!("Tool '{}' already registered", tool.name),
            ));
        }

        debug!("Registered tool: {} ({})", tool.name, tool.plugin_type);
        self.namespaces.insert(tool.plugin_type.clone());
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Register many tools best-effort; duplicates and failures are skipped
    /// with a warning. Returns the number successfully registered.
    pub fn register_many(&mut self, tools: Vec<ToolDefinition>) -> usize {
        let total = tools.len();
        let mut count = 0;
        for tool in tools {
            match self.register(tool) {
                Ok(()) => count += 1,
                Err(e) => warn!("Skipped tool registration: {}", e.message),
            }
        }
        info!("Registered {count}/{total} tools");
        count
    }

    /// All registered tools
    #[must_use]
    pub fn get_all(&self) -> Vec<&ToolDefinition> {
        let mut tools: Vec<&ToolDefinition> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Look up a tool by name
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// All tools for one plugin type
    #[must_use]
    pub fn get_by_plugin_type(&self, plugin_type: &str) -> Vec<&ToolDefinition> {
        self.tools
            .values()
            .filter(|t| t.plugin_type == plugin_type)
            .collect()
    }

    /// Total number of registered tools
    #[must_use]
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Tool counts grouped by plugin type
    #[must_use]
    pub fn count_by_plugin(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for tool in self.tools.values() {
            *counts.entry(tool.plugin_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Resolve a tool name to its plugin type by longest-prefix match over
    /// the declared namespaces. Names matching no namespace are system
    /// tools (None).
    #[must_use]
    pub fn extract_plugin_type(&self, tool_name: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .filter(|ns| {
                *ns != "system" && tool_name.starts_with(&format!("{ns}_"))
            })
            // Longest match first: wordpress_advanced_ before wordpress_
            .max_by_key(|ns| ns.len())
            .map(String::as_str)
    }

    /// Remove every registered tool (primarily for tests)
    pub fn clear(&mut self) {
        self.tools.clear();
        info!("Tool registry cleared");
    }
}
