// ABOUTME: Gitea plugin - repository and issue management over /api/v1
// ABOUTME: Authenticates with a personal access token header
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! Gitea repository-management plugin.
//!
//! Tenant settings: `url` (required), `token` (required).

use super::{required_setting, str_arg, u64_arg, PluginDescriptor, PluginError, SitePlugin, ToolSpec};
use crate::api_keys::Scope;
use crate::site_registry::SiteConfig;
use serde_json::{json, Map, Value};

/// Gitea plugin bound to one server
pub struct GiteaPlugin {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

/// Descriptor for the Gitea plugin family
#[must_use]
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor {
        plugin_type: "gitea",
        specs,
        build,
    }
}

fn build(config: &SiteConfig) -> Result<Box<dyn SitePlugin>, PluginError> {
    Ok(Box::new(GiteaPlugin {
        base_url: required_setting(config, "url")?
            .trim_end_matches('/')
            .to_owned(),
        token: required_setting(config, "token")?,
        client: reqwest::Client::new(),
    }))
}

fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "list_repos",
            method_name: "list_repos",
            description: "List repositories visible to the configured token",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Max results"}
                }
            }),
            scope: Scope::Read,
        },
        ToolSpec {
            name: "get_repo",
            method_name: "get_repo",
            description: "Get one repository by owner and name",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string"},
                    "repo": {"type": "string"}
                },
                "required": ["owner", "repo"]
            }),
            scope: Scope::Read,
        },
        ToolSpec {
            name: "list_issues",
            method_name: "list_issues",
            description: "List issues for a repository",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string"},
                    "repo": {"type": "string"},
                    "state": {"type": "string", "description": "open, closed, or all"}
                },
                "required": ["owner", "repo"]
            }),
            scope: Scope::Read,
        },
        ToolSpec {
            name: "create_issue",
            method_name: "create_issue",
            description: "Open a new issue in a repository",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string"},
                    "repo": {"type": "string"},
                    "title": {"type": "string"},
                    "body": {"type": "string"}
                },
                "required": ["owner", "repo", "title"]
            }),
            scope: Scope::Write,
        },
        ToolSpec {
            name: "list_pull_requests",
            method_name: "list_pull_requests",
            description: "List pull requests for a repository",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string"},
                    "repo": {"type": "string"},
                    "state": {"type": "string"}
                },
                "required": ["owner", "repo"]
            }),
            scope: Scope::Read,
        },
    ]
}

impl GiteaPlugin {
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/api/v1/{path}", self.base_url))
            .header("Authorization", format!("token {}", self.token))
    }

    async fn finish(response: reqwest::Response) -> Result<Value, PluginError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PluginError::Authentication(format!(
                "Gitea rejected the token ({status})"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PluginError::Upstream(format!(
                "Gitea returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait::async_trait]
impl SitePlugin for GiteaPlugin {
    async fn call(&self, method: &str, args: Map<String, Value>) -> Result<Value, PluginError> {
        match method {
            "list_repos" => {
                let mut req = self.request(reqwest::Method::GET, "repos/search");
                if let Some(limit) = u64_arg(&args, "limit") {
                    req = req.query(&[("limit", limit.to_string())]);
                }
                Self::finish(req.send().await?).await
            }
            "get_repo" => {
                let owner = str_arg(&args, "owner")?;
                let repo = str_arg(&args, "repo")?;
                let req = self.request(reqwest::Method::GET, &format!("repos/{owner}/{repo}"));
                Self::finish(req.send().await?).await
            }
            "list_issues" => {
                let owner = str_arg(&args, "owner")?;
                let repo = str_arg(&args, "repo")?;
                let mut req =
                    self.request(reqwest::Method::GET, &format!("repos/{owner}/{repo}/issues"));
                if let Some(state) = args.get("state").and_then(Value::as_str) {
                    req = req.query(&[("state", state)]);
                }
                Self::finish(req.send().await?).await
            }
            "create_issue" => {
                let owner = str_arg(&args, "owner")?;
                let repo = str_arg(&args, "repo")?;
                let title = str_arg(&args, "title")?;
                let body = json!({
                    "title": title,
                    "body": args.get("body").and_then(Value::as_str).unwrap_or(""),
                });
                let req = self
                    .request(reqwest::Method::POST, &format!("repos/{owner}/{repo}/issues"))
                    .json(&body);
                Self::finish(req.send().await?).await
            }
            "list_pull_requests" => {
                let owner = str_arg(&args, "owner")?;
                let repo = str_arg(&args, "repo")?;
                let mut req =
                    self.request(reqwest::Method::GET, &format!("repos/{owner}/{repo}/pulls"));
                if let Some(state) = args.get("state").and_then(Value::as_str) {
                    req = req.query(&[("state", state)]);
                }
                Self::finish(req.send().await?).await
            }
            other => Err(PluginError::InvalidInput(format!(
                "Method '{other}' not implemented by the Gitea plugin"
            ))),
        }
    }

    async fn health_check(&self) -> Result<Value, PluginError> {
        let response = self.request(reqwest::Method::GET, "version").send().await?;
        let healthy = response.status().is_success();
        Ok(json!({
            "healthy": healthy,
            "status_code": response.status().as_u16(),
            "url": self.base_url,
        }))
    }
}
