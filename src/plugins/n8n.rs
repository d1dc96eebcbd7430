// ABOUTME: n8n plugin - workflow automation management over /api/v1
// ABOUTME: Authenticates with the X-N8N-API-KEY header
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! n8n workflow-automation plugin.
//!
//! Tenant settings: `url` (required), `api_key` (required).

use super::{required_setting, str_arg, u64_arg, PluginDescriptor, PluginError, SitePlugin, ToolSpec};
use crate::api_keys::Scope;
use crate::site_registry::SiteConfig;
use serde_json::{json, Map, Value};

/// n8n plugin bound to one instance
pub struct N8nPlugin {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// Descriptor for the n8n plugin family
#[must_use]
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor {
        plugin_type: "n8n",
        specs,
        build,
    }
}

fn build(config: &SiteConfig) -> Result<Box<dyn SitePlugin>, PluginError> {
    Ok(Box::new(N8nPlugin {
        base_url: required_setting(config, "url")?
            .trim_end_matches('/')
            .to_owned(),
        api_key: required_setting(config, "api_key")?,
        client: reqwest::Client::new(),
    }))
}

fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "list_workflows",
            method_name: "list_workflows",
            description: "List workflows",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "active": {"type": "boolean", "description": "Filter by active state"},
                    "limit": {"type": "integer"}
                }
            }),
            scope: Scope::Read,
        },
        ToolSpec {
            name: "get_workflow",
            method_name: "get_workflow",
            description: "Get one workflow by ID",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workflow_id": {"type": "string"}
                },
                "required": ["workflow_id"]
            }),
            scope: Scope::Read,
        },
        ToolSpec {
            name: "activate_workflow",
            method_name: "activate_workflow",
            description: "Activate a workflow",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workflow_id": {"type": "string"}
                },
                "required": ["workflow_id"]
            }),
            scope: Scope::Write,
        },
        ToolSpec {
            name: "deactivate_workflow",
            method_name: "deactivate_workflow",
            description: "Deactivate a workflow",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workflow_id": {"type": "string"}
                },
                "required": ["workflow_id"]
            }),
            scope: Scope::Write,
        },
        ToolSpec {
            name: "list_executions",
            method_name: "list_executions",
            description: "List recent workflow executions",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workflow_id": {"type": "string"},
                    "limit": {"type": "integer"}
                }
            }),
            scope: Scope::Read,
        },
    ]
}

impl N8nPlugin {
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/api/v1/{path}", self.base_url))
            .header("X-N8N-API-KEY", &self.api_key)
    }

    async fn finish(response: reqwest::Response) -> Result<Value, PluginError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PluginError::Authentication(format!(
                "n8n rejected the API key ({status})"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PluginError::Upstream(format!(
                "n8n returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait::async_trait]
impl SitePlugin for N8nPlugin {
    async fn call(&self, method: &str, args: Map<String, Value>) -> Result<Value, PluginError> {
        match method {
            "list_workflows" => {
                let mut req = self.request(reqwest::Method::GET, "workflows");
                if let Some(active) = args.get("active").and_then(Value::as_bool) {
                    req = req.query(&[("active", active.to_string())]);
                }
                if let Some(limit) = u64_arg(&args, "limit") {
                    req = req.query(&[("limit", limit.to_string())]);
                }
                Self::finish(req.send().await?).await
            }
            "get_workflow" => {
                let id = str_arg(&args, "workflow_id")?;
                let req = self.request(reqwest::Method::GET, &format!("workflows/{id}"));
                Self::finish(req.send().await?).await
            }
            "activate_workflow" => {
                let id = str_arg(&args, "workflow_id")?;
                let req = self.request(reqwest::Method::POST, &format!("workflows/{id}/activate"));
                Self::finish(req.send().await?).await
            }
            "deactivate_workflow" => {
                let id = str_arg(&args, "workflow_id")?;
                let req =
                    self.request(reqwest::Method::POST, &format!("workflows/{id}/deactivate"));
                Self::finish(req.send().await?).await
            }
            "list_executions" => {
                let mut req = self.request(reqwest::Method::GET, "executions");
                if let Some(id) = args.get("workflow_id").and_then(Value::as_str) {
                    req = req.query(&[("workflowId", id)]);
                }
                if let Some(limit) = u64_arg(&args, "limit") {
                    req = req.query(&[("limit", limit.to_string())]);
                }
                Self::finish(req.send().await?).await
            }
            other => Err(PluginError::InvalidInput(format!(
                "Method '{other}' not implemented by the n8n plugin"
            ))),
        }
    }

    async fn health_check(&self) -> Result<Value, PluginError> {
        let response = self
            .client
            .get(format!("{}/healthz", self.base_url))
            .send()
            .await?;
        let healthy = response.status().is_success();
        Ok(json!({
            "healthy": healthy,
            "status_code": response.status().as_u16(),
            "url": self.base_url,
        }))
    }
}
