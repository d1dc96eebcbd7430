// ABOUTME: Generates site-routing tools from plugin specifications
// ABOUTME: Injects the site parameter, enforces tenant isolation, and coerces arguments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Tool Generator
//!
//! Binds one abstract tool specification to all configured tenants of its
//! plugin family. The synthesized handler routes by the `site` parameter
//! (auto-selected when exactly one tenant is configured), checks the
//! caller's project against the resolved tenant, coerces JSON-in-string
//! arguments, instantiates the plugin for the request, and translates
//! upstream failures into actionable error strings.

use crate::context;
use crate::plugins::{PluginDescriptor, PluginError};
use crate::site_registry::SiteRegistry;
use crate::tool_registry::ToolDefinition;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Plugin types that may borrow another family's tenant configuration when
/// they have none of their own. Fallback is a convenience for mixed
/// deployments; explicit configuration is always preferred.
const PLUGIN_SITE_FALLBACK: &[(&str, &str)] = &[("woocommerce", "wordpress")];

/// Resolve the plugin type used for tenant lookup, applying the fallback
/// mapping when the plugin has no sites of its own.
#[must_use]
pub fn site_plugin_type_with_fallback(plugin_type: &str, sites: &SiteRegistry) -> String {
    if sites.has_sites(plugin_type) {
        return plugin_type.to_owned();
    }

    if let Some((_, fallback)) = PLUGIN_SITE_FALLBACK
        .iter()
        .find(|(from, to)| *from == plugin_type && sites.has_sites(to))
    {
        warn!(
            "FALLBACK: Using {fallback} site config for {plugin_type}. \
             This is NOT recommended for production. Configure explicit \
             {}_SITE*_... environment variables to avoid alias and credential mismatches.",
            plugin_type.to_uppercase()
        );
        return (*fallback).to_owned();
    }

    plugin_type.to_owned()
}

/// Generates site-routing tools from plugin descriptors
pub struct ToolGenerator {
    sites: Arc<SiteRegistry>,
}

impl ToolGenerator {
    /// Create a generator over the discovered tenants
    #[must_use]
    pub fn new(sites: Arc<SiteRegistry>) -> Self {
        Self { sites }
    }

    /// Generate one tool per specification of the plugin family
    #[must_use]
    pub fn generate_tools(&self, descriptor: &PluginDescriptor) -> Vec<ToolDefinition> {
        let specs = (descriptor.specs)();
        info!(
            "Generating tools for {} from {} specifications",
            descriptor.plugin_type,
            specs.len()
        );

        let tools: Vec<ToolDefinition> = specs
            .into_iter()
            .map(|spec| self.create_tool(descriptor, spec))
            .collect();

        info!(
            "Generated {} tools for {}",
            tools.len(),
            descriptor.plugin_type
        );
        tools
    }

    /// Generate tools for every plugin family in a registry
    #[must_use]
    pub fn generate_all_tools(
        &self,
        plugins: &crate::plugins::PluginRegistry,
    ) -> Vec<ToolDefinition> {
        let mut all_tools = Vec::new();
        for descriptor in plugins.descriptors() {
            all_tools.extend(self.generate_tools(descriptor));
        }
        info!("Generated {} total tools", all_tools.len());
        all_tools
    }

    fn create_tool(
        &self,
        descriptor: &PluginDescriptor,
        spec: crate::plugins::ToolSpec,
    ) -> ToolDefinition {
        let plugin_type = descriptor.plugin_type;
        let tool_name = format!("{plugin_type}_{}", spec.name);

        let input_schema = self.add_site_parameter(&spec.input_schema, plugin_type);

        let description = if spec.description.starts_with("[UNIFIED]") {
            spec.description.to_owned()
        } else {
            format!("[UNIFIED] {}", spec.description)
        };

        let sites = Arc::clone(&self.sites);
        let build = descriptor.build;
        let method_name = spec.method_name;

        let handler: crate::tool_registry::ToolHandler = Arc::new(move |args: Map<String, Value>| {
            let sites = Arc::clone(&sites);
            Box::pin(async move {
                Ok(unified_handler(sites.as_ref(), plugin_type, build, method_name, args).await)
            })
        });

        ToolDefinition {
            name: tool_name,
            description,
            input_schema,
            handler,
            required_scope: spec.scope,
            plugin_type: plugin_type.to_owned(),
        }
    }

    /// Inject the `site` parameter into a tool's input schema.
    ///
    /// With exactly one configured tenant the parameter is optional with a
    /// default; otherwise it is required and enum-constrained to the
    /// available identifiers.
    fn add_site_parameter(&self, original_schema: &Value, plugin_type: &str) -> Value {
        let mut schema = if original_schema.is_object() {
            original_schema.clone()
        } else {
            json!({"type": "object"})
        };

        let site_plugin_type = site_plugin_type_with_fallback(plugin_type, &self.sites);
        let site_options = self.sites.list_sites(&site_plugin_type);

        // Single-tenant deployments make the parameter optional; the option
        // list may still carry both the id and an alias
        let single_tenant: Option<String> = {
            let mut tenants = self.sites.sites_of_type(&site_plugin_type);
            match (tenants.next(), tenants.next()) {
                (Some(only), None) => Some(only.site_id.clone()),
                _ => None,
            }
        };

        let site_property = if let Some(ref single_site) = single_tenant {
            json!({
                "type": "string",
                "description": format!(
                    "SINGLE SITE: connected to '{single_site}'. This parameter is optional."
                ),
                "default": single_site,
            })
        } else {
            let options_text = if site_options.is_empty() {
                "None configured".to_owned()
            } else {
                site_options.join(", ")
            };
            let mut prop = json!({
                "type": "string",
                "description": format!(
                    "Site ID or alias. Available options: {options_text}. \
                     Use list_sites to see all configured sites."
                ),
            });
            if !site_options.is_empty() {
                prop["enum"] = json!(site_options);
            }
            prop
        };

        if let Some(obj) = schema.as_object_mut() {
            let properties = obj.entry("properties").or_insert_with(|| json!({}));
            if let Some(props) = properties.as_object_mut() {
                props.insert("site".into(), site_property);
            }

            // Multi-site: site leads the required list
            if single_tenant.is_none() {
                let required = obj.entry("required").or_insert_with(|| json!([]));
                if let Some(req) = required.as_array_mut() {
                    if !req.iter().any(|v| v == "site") {
                        req.insert(0, json!("site"));
                    }
                }
            }
        }

        schema
    }
}

/// The synthesized handler body: resolve tenant, check isolation, coerce
/// arguments, build the plugin, dispatch the method. Every failure becomes
/// a result string so upstream problems never surface as server errors.
async fn unified_handler(
    sites: &SiteRegistry,
    plugin_type: &'static str,
    build: crate::plugins::PluginConstructor,
    method_name: &'static str,
    mut args: Map<String, Value>,
) -> Value {
    let site_plugin_type = site_plugin_type_with_fallback(plugin_type, sites);

    // Resolve the site argument, auto-selecting for single-tenant setups
    let site_arg = args
        .remove("site")
        .and_then(|v| v.as_str().map(str::to_owned))
        .filter(|s| !s.trim().is_empty());

    let site = match site_arg {
        Some(site) => site,
        None => {
            // Auto-select for single-tenant deployments
            let mut tenants = sites.sites_of_type(&site_plugin_type);
            match (tenants.next(), tenants.next()) {
                (Some(only), None) => only.site_id.clone(),
                (None, _) => {
                    return Value::String(
                        "Error: No sites configured. Please check environment variables.".into(),
                    )
                }
                _ => {
                    return Value::String(format!(
                        "Error: Multiple sites available ({}). Please specify the 'site' parameter.",
                        sites.list_sites(&site_plugin_type).join(", ")
                    ))
                }
            }
        }
    };

    let site_config = match sites.get_site_config(&site_plugin_type, &site) {
        Ok(config) => config,
        Err(e) => {
            warn!("Validation error in {plugin_type}_{method_name}: {}", e.message);
            return Value::String(format!("Error: {}", e.message));
        }
    };

    // Tenant isolation: a project-scoped caller may only reach its own site
    if let Some(identity) = context::get() {
        if !identity.is_global {
            let allowed_project = identity.project_id.clone();
            let current_project = format!("{site_plugin_type}_{}", site_config.site_id);

            // The key may have been created against an alias; normalize to
            // plugin_type_site_id before comparing.
            let allowed_normalized = allowed_project
                .split_once('_')
                .and_then(|(allowed_type, allowed_site)| {
                    sites
                        .get_site_config(allowed_type, allowed_site)
                        .ok()
                        .map(|c| format!("{allowed_type}_{}", c.site_id))
                })
                .unwrap_or_else(|| allowed_project.clone());

            if allowed_normalized != current_project {
                warn!(
                    "Access denied: API key for project '{allowed_project}' attempted to access '{current_project}'"
                );
                return Value::String(format!(
                    "Error: Access denied. This API key is restricted to project '{allowed_project}'. \
                     Use a global API key or create a key for '{current_project}'."
                ));
            }
        }
    }

    let plugin = match build(site_config) {
        Ok(plugin) => plugin,
        Err(e) => return translate_plugin_error(&e, plugin_type, method_name),
    };

    let filtered_args = coerce_arguments(args);

    match plugin.call(method_name, filtered_args).await {
        Ok(result) => result,
        Err(e) => translate_plugin_error(&e, plugin_type, method_name),
    }
}

/// Coerce incoming arguments: drop nulls and empty strings, and replace
/// strings that parse as JSON objects/arrays with the parsed value.
#[must_use]
pub fn coerce_arguments(args: Map<String, Value>) -> Map<String, Value> {
    let mut filtered = Map::with_capacity(args.len());
    for (key, value) in args {
        match value {
            Value::Null => {}
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if (trimmed.starts_with('{') && trimmed.ends_with('}'))
                    || (trimmed.starts_with('[') && trimmed.ends_with(']'))
                {
                    match serde_json::from_str::<Value>(trimmed) {
                        Ok(parsed) => {
                            filtered.insert(key, parsed);
                        }
                        Err(_) => {
                            // Not valid JSON after all; pass through unchanged
                            filtered.insert(key, Value::String(s));
                        }
                    }
                } else {
                    filtered.insert(key, Value::String(s));
                }
            }
            other => {
                filtered.insert(key, other);
            }
        }
    }
    filtered
}

/// Translate known upstream failure kinds into actionable error strings
fn translate_plugin_error(e: &PluginError, plugin_type: &str, method_name: &str) -> Value {
    match e {
        PluginError::Configuration(msg) => {
            error!("Configuration error in {plugin_type}_{method_name}: {msg}");
            let upper = plugin_type.to_uppercase();
            Value::String(format!(
                "Configuration Error: {msg}\n\n\
                 Hint: For {plugin_type}, ensure these environment variables are set:\n\
                 \x20 - {upper}_SITE*_URL\n\
                 \x20 - {upper}_SITE*_USERNAME\n\
                 \x20 - {upper}_SITE*_APP_PASSWORD"
            ))
        }
        PluginError::Authentication(msg) => {
            warn!("Authentication error in {plugin_type}_{method_name}: {msg}");
            Value::String(format!("Authentication Error: {msg}"))
        }
        PluginError::InvalidInput(msg) => {
            warn!("Validation error in {plugin_type}_{method_name}: {msg}");
            Value::String(format!("Error: {msg}"))
        }
        PluginError::Upstream(msg) => {
            error!("Error in unified handler for {plugin_type}_{method_name}: {msg}");
            Value::String(format!("Error (UpstreamError): {msg}"))
        }
    }
}
