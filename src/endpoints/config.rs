// ABOUTME: Endpoint policy configuration - plugin filters, scopes, tool lists
// ABOUTME: Holds the preset endpoint table and the dynamic project endpoint builder
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! Endpoint configurations. Policy is immutable after registration: the
//! path, required credentials, allowed scopes, and tool whitelist/blacklist
//! are fixed when the endpoint is built.

use crate::errors::{AppError, AppResult};
use serde::Serialize;
use std::collections::BTreeSet;

/// Types of MCP endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    /// Full administrative access (master key)
    Admin,
    /// System-management tools only (master key)
    System,
    /// WordPress content management
    Wordpress,
    /// WooCommerce e-commerce
    Woocommerce,
    /// WordPress advanced operations
    WordpressAdvanced,
    /// Gitea repository management
    Gitea,
    /// n8n workflow automation
    N8n,
    /// Supabase self-hosted management
    Supabase,
    /// OpenPanel product analytics
    Openpanel,
    /// Appwrite backend-as-a-service
    Appwrite,
    /// Directus headless CMS
    Directus,
    /// Dynamic per-tenant endpoint
    Project,
    /// Operator-defined endpoint
    Custom,
}

/// Privileged tools excluded from every plugin endpoint
fn shared_plugin_blacklist() -> BTreeSet<String> {
    [
        "manage_api_keys_create",
        "manage_api_keys_delete",
        "manage_api_keys_rotate",
        "oauth_register_client",
        "oauth_revoke_client",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// Configuration for a single MCP endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointConfig {
    /// URL mount path (e.g. "/wordpress"; the wire surface lands under
    /// `{path}/mcp`)
    pub path: String,
    /// Display name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Endpoint type
    pub endpoint_type: EndpointType,
    /// Plugin types included (empty = all)
    pub plugin_types: Vec<String>,
    /// Whether the master key is required
    pub require_master_key: bool,
    /// Allowed API key scopes (empty = all)
    pub allowed_scopes: BTreeSet<String>,
    /// Specific tools to include (None = all from the allowed plugins)
    pub tool_whitelist: Option<BTreeSet<String>>,
    /// Specific tools to exclude
    pub tool_blacklist: BTreeSet<String>,
    /// Pin every tool to one tenant (project endpoints)
    pub site_filter: Option<String>,
    /// Soft cap on the endpoint's tool count
    pub max_tools: usize,
}

impl EndpointConfig {
    /// Validate path and whitelist/blacklist disjointness
    ///
    /// # Errors
    ///
    /// Returns an error when the path does not start with `/` or a tool is
    /// in both the whitelist and the blacklist.
    pub fn validate(&self) -> AppResult<()> {
        if !self.path.starts_with('/') {
            return Err(AppError::invalid_input(format!(
                "Endpoint path must start with '/': {}",
                self.path
            )));
        }

        if let Some(ref whitelist) = self.tool_whitelist {
            let overlap: Vec<&String> = whitelist.intersection(&self.tool_blacklist).collect();
            if !overlap.is_empty() {
                return Err(AppError::invalid_input(format!(
                    "Tools cannot be in both whitelist and blacklist: {overlap:?}"
                )));
            }
        }

        Ok(())
    }

    /// Whether this endpoint includes a plugin type (empty list = all)
    #[must_use]
    pub fn allows_plugin(&self, plugin_type: &str) -> bool {
        self.plugin_types.is_empty() || self.plugin_types.iter().any(|p| p == plugin_type)
    }

    /// Whether this endpoint exposes a tool: blacklist first, then the
    /// whitelist when one exists
    #[must_use]
    pub fn allows_tool(&self, tool_name: &str) -> bool {
        if self.tool_blacklist.contains(tool_name) {
            return false;
        }
        match self.tool_whitelist {
            Some(ref whitelist) => whitelist.contains(tool_name),
            None => true,
        }
    }

    /// Whether this endpoint accepts a caller scope (empty set = all)
    #[must_use]
    pub fn allows_scope(&self, scope: &str) -> bool {
        self.allowed_scopes.is_empty() || self.allowed_scopes.contains(scope)
    }
}

fn scopes(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

fn plugin_endpoint(
    path: &str,
    name: &str,
    description: &str,
    endpoint_type: EndpointType,
    plugin_type: &str,
    max_tools: usize,
) -> EndpointConfig {
    EndpointConfig {
        path: path.to_owned(),
        name: name.to_owned(),
        description: description.to_owned(),
        endpoint_type,
        plugin_types: vec![plugin_type.to_owned()],
        require_master_key: false,
        allowed_scopes: scopes(&["read", "write", "admin"]),
        tool_whitelist: None,
        tool_blacklist: shared_plugin_blacklist(),
        site_filter: None,
        max_tools,
    }
}

/// The preset endpoint table registered at startup
#[must_use]
pub fn preset_endpoint_configs() -> Vec<EndpointConfig> {
    vec![
        // Admin endpoint: all tools, master key only
        EndpointConfig {
            path: "/".into(),
            name: "MCPHub Admin".into(),
            description: "Full administrative access to all tools and plugins".into(),
            endpoint_type: EndpointType::Admin,
            plugin_types: Vec::new(),
            require_master_key: true,
            allowed_scopes: scopes(&["admin"]),
            tool_whitelist: None,
            tool_blacklist: BTreeSet::new(),
            site_filter: None,
            max_tools: 400,
        },
        // System endpoint: management tools only, master key
        EndpointConfig {
            path: "/system".into(),
            name: "System Manager".into(),
            description: "System management tools (API keys, OAuth, health, rate limiting)".into(),
            endpoint_type: EndpointType::System,
            plugin_types: vec!["system".into()],
            require_master_key: true,
            allowed_scopes: scopes(&["admin"]),
            tool_whitelist: Some(
                [
                    // API key management
                    "manage_api_keys_create",
                    "manage_api_keys_list",
                    "manage_api_keys_get_info",
                    "manage_api_keys_revoke",
                    "manage_api_keys_delete",
                    "manage_api_keys_rotate",
                    // Health and status
                    "list_projects",
                    "get_endpoints",
                    "get_system_info",
                    "get_audit_log",
                    // OAuth management
                    "oauth_register_client",
                    "oauth_list_clients",
                    "oauth_revoke_client",
                    "oauth_get_client_info",
                    // Rate limiting
                    "get_rate_limit_stats",
                    "reset_rate_limit",
                    "set_rate_limit_config",
                ]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            ),
            tool_blacklist: BTreeSet::new(),
            site_filter: None,
            max_tools: 20,
        },
        plugin_endpoint(
            "/wordpress",
            "WordPress Manager",
            "WordPress content management tools (posts, pages, media, users)",
            EndpointType::Wordpress,
            "wordpress",
            70,
        ),
        plugin_endpoint(
            "/woocommerce",
            "WooCommerce Manager",
            "WooCommerce e-commerce tools (products, orders, customers)",
            EndpointType::Woocommerce,
            "woocommerce",
            35,
        ),
        // Advanced operations require the admin scope
        EndpointConfig {
            allowed_scopes: scopes(&["admin"]),
            tool_blacklist: BTreeSet::new(),
            ..plugin_endpoint(
                "/wordpress-advanced",
                "WordPress Advanced",
                "WordPress advanced operations (database, bulk, system)",
                EndpointType::WordpressAdvanced,
                "wordpress_advanced",
                30,
            )
        },
        plugin_endpoint(
            "/gitea",
            "Gitea Manager",
            "Git repository management tools (repos, issues, PRs)",
            EndpointType::Gitea,
            "gitea",
            60,
        ),
        plugin_endpoint(
            "/n8n",
            "n8n Automation",
            "Workflow automation management (workflows, executions)",
            EndpointType::N8n,
            "n8n",
            70,
        ),
        plugin_endpoint(
            "/supabase",
            "Supabase Manager",
            "Supabase self-hosted management (database, auth, storage, functions)",
            EndpointType::Supabase,
            "supabase",
            80,
        ),
        plugin_endpoint(
            "/openpanel",
            "OpenPanel Analytics",
            "OpenPanel product analytics management (events, funnels, dashboards)",
            EndpointType::Openpanel,
            "openpanel",
            80,
        ),
        plugin_endpoint(
            "/appwrite",
            "Appwrite Manager",
            "Appwrite self-hosted management (databases, users, teams, storage)",
            EndpointType::Appwrite,
            "appwrite",
            110,
        ),
        plugin_endpoint(
            "/directus",
            "Directus CMS",
            "Directus self-hosted CMS management (items, collections, files)",
            EndpointType::Directus,
            "directus",
            110,
        ),
    ]
}

/// Build the dynamic per-tenant endpoint configuration at
/// `/project/{alias_or_full_id}`, hard-pinned to one tenant.
#[must_use]
pub fn project_endpoint_config(
    project_id: &str,
    plugin_type: &str,
    site_alias: Option<&str>,
) -> EndpointConfig {
    let path_suffix = site_alias.unwrap_or(project_id);

    let mut blacklist = shared_plugin_blacklist();
    // Cross-tenant visibility is removed on project endpoints
    blacklist.insert("list_projects".into());
    blacklist.insert("oauth_list_clients".into());

    EndpointConfig {
        path: format!("/project/{path_suffix}"),
        name: format!("Project: {project_id}"),
        description: format!("Tools for project {project_id}"),
        endpoint_type: EndpointType::Project,
        plugin_types: vec![plugin_type.to_owned()],
        require_master_key: false,
        allowed_scopes: BTreeSet::new(),
        tool_whitelist: None,
        tool_blacklist: blacklist,
        site_filter: Some(project_id.to_owned()),
        max_tools: 120,
    }
}
