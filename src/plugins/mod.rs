// ABOUTME: Upstream plugin seam - tool specifications plus message-passing dispatch
// ABOUTME: Each plugin is built per request from a tenant's configuration map
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Upstream Plugins
//!
//! A plugin family wraps one upstream product API (WordPress, Gitea, n8n,
//! ...). The contract with the core is deliberately small: a descriptor
//! exposes the family's tool specifications, and a constructed plugin
//! answers `call(method, args)` for any `method_name` named by a spec.
//! Plugins are instantiated per request from the resolved tenant's
//! configuration map and hold no cross-request state.

pub mod gitea;
pub mod n8n;
pub mod wordpress;

use crate::api_keys::Scope;
use crate::site_registry::SiteConfig;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// One abstract operation a plugin family offers
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Action name; the tool is published as `{plugin_type}_{name}`
    pub name: &'static str,
    /// Method name dispatched through [`SitePlugin::call`]
    pub method_name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// JSON Schema for the operation's parameters (without the `site` param)
    pub input_schema: Value,
    /// Required API key scope
    pub scope: Scope,
}

/// Errors surfaced by upstream plugins
#[derive(Debug, Error)]
pub enum PluginError {
    /// Tenant configuration is incomplete (missing URL, credentials, ...)
    #[error("{0}")]
    Configuration(String),
    /// The upstream rejected our credentials (401/403)
    #[error("{0}")]
    Authentication(String),
    /// The caller supplied invalid parameters
    #[error("{0}")]
    InvalidInput(String),
    /// Any other upstream failure
    #[error("{0}")]
    Upstream(String),
}

impl From<reqwest::Error> for PluginError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// A constructed upstream plugin bound to one tenant
#[async_trait::async_trait]
pub trait SitePlugin: Send + Sync {
    /// Invoke the operation named by a spec's `method_name`
    async fn call(&self, method: &str, args: Map<String, Value>) -> Result<Value, PluginError>;

    /// Probe the upstream for liveness; returns a JSON status object
    async fn health_check(&self) -> Result<Value, PluginError>;
}

/// Constructor signature for a plugin family
pub type PluginConstructor = fn(&SiteConfig) -> Result<Box<dyn SitePlugin>, PluginError>;

/// Static description of a plugin family
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Plugin type string (tool name prefix, endpoint filter)
    pub plugin_type: &'static str,
    /// Tool specifications the family exposes
    pub specs: fn() -> Vec<ToolSpec>,
    /// Per-tenant constructor
    pub build: PluginConstructor,
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("plugin_type", &self.plugin_type)
            .finish_non_exhaustive()
    }
}

/// Registry of known plugin families
#[derive(Debug, Default)]
pub struct PluginRegistry {
    descriptors: HashMap<&'static str, PluginDescriptor>,
}

impl PluginRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in plugin families
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(wordpress::descriptor());
        registry.register(gitea::descriptor());
        registry.register(n8n::descriptor());
        registry
    }

    /// Register a plugin family (last registration wins)
    pub fn register(&mut self, descriptor: PluginDescriptor) {
        self.descriptors.insert(descriptor.plugin_type, descriptor);
    }

    /// Look up a family by plugin type
    #[must_use]
    pub fn get(&self, plugin_type: &str) -> Option<&PluginDescriptor> {
        self.descriptors.get(plugin_type)
    }

    /// All registered plugin types, sorted
    #[must_use]
    pub fn plugin_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.descriptors.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Iterate over all descriptors
    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.descriptors.values()
    }
}

/// Fetch a required setting from a tenant configuration map
pub(crate) fn required_setting(config: &SiteConfig, key: &str) -> Result<String, PluginError> {
    config.settings.get(key).cloned().ok_or_else(|| {
        PluginError::Configuration(format!(
            "Missing '{key}' for {} site '{}'",
            config.plugin_type, config.site_id
        ))
    })
}

/// Read a string argument from a tool argument map
pub(crate) fn str_arg(args: &Map<String, Value>, key: &str) -> Result<String, PluginError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| PluginError::InvalidInput(format!("Missing required parameter '{key}'")))
}

/// Read an optional u64 argument from a tool argument map
pub(crate) fn u64_arg(args: &Map<String, Value>, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}
