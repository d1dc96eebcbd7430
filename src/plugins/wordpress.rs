// ABOUTME: WordPress REST API plugin - content management over /wp-json/wp/v2
// ABOUTME: Thin HTTP wrapper authenticating with application passwords
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! WordPress content-management plugin.
//!
//! Tenant settings: `url` (required), `username` and `app_password`
//! (required for writes, recommended for reads).

use super::{required_setting, str_arg, u64_arg, PluginDescriptor, PluginError, SitePlugin, ToolSpec};
use crate::api_keys::Scope;
use crate::site_registry::SiteConfig;
use serde_json::{json, Map, Value};

/// WordPress plugin bound to one site
pub struct WordPressPlugin {
    base_url: String,
    username: Option<String>,
    app_password: Option<String>,
    client: reqwest::Client,
}

/// Descriptor for the WordPress plugin family
#[must_use]
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor {
        plugin_type: "wordpress",
        specs,
        build,
    }
}

fn build(config: &SiteConfig) -> Result<Box<dyn SitePlugin>, PluginError> {
    let base_url = required_setting(config, "url")?
        .trim_end_matches('/')
        .to_owned();

    Ok(Box::new(WordPressPlugin {
        base_url,
        username: config.settings.get("username").cloned(),
        app_password: config.settings.get("app_password").cloned(),
        client: reqwest::Client::new(),
    }))
}

fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "list_posts",
            method_name: "list_posts",
            description: "List posts with optional search, status, and pagination",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "search": {"type": "string", "description": "Search term"},
                    "status": {"type": "string", "description": "Post status (publish, draft, ...)"},
                    "per_page": {"type": "integer", "description": "Results per page (max 100)"},
                    "page": {"type": "integer", "description": "Page number"}
                }
            }),
            scope: Scope::Read,
        },
        ToolSpec {
            name: "get_post",
            method_name: "get_post",
            description: "Get a single post by ID",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "post_id": {"type": "integer", "description": "Post ID"}
                },
                "required": ["post_id"]
            }),
            scope: Scope::Read,
        },
        ToolSpec {
            name: "create_post",
            method_name: "create_post",
            description: "Create a new post",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Post title"},
                    "content": {"type": "string", "description": "Post body (HTML)"},
                    "status": {"type": "string", "description": "publish or draft", "default": "draft"}
                },
                "required": ["title"]
            }),
            scope: Scope::Write,
        },
        ToolSpec {
            name: "update_post",
            method_name: "update_post",
            description: "Update fields of an existing post",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "post_id": {"type": "integer", "description": "Post ID"},
                    "title": {"type": "string"},
                    "content": {"type": "string"},
                    "status": {"type": "string"}
                },
                "required": ["post_id"]
            }),
            scope: Scope::Write,
        },
        ToolSpec {
            name: "delete_post",
            method_name: "delete_post",
            description: "Delete a post (moves to trash unless force is set)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "post_id": {"type": "integer", "description": "Post ID"},
                    "force": {"type": "boolean", "description": "Bypass trash"}
                },
                "required": ["post_id"]
            }),
            scope: Scope::Admin,
        },
        ToolSpec {
            name: "list_pages",
            method_name: "list_pages",
            description: "List pages with optional search",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "search": {"type": "string"},
                    "per_page": {"type": "integer"}
                }
            }),
            scope: Scope::Read,
        },
        ToolSpec {
            name: "list_users",
            method_name: "list_users",
            description: "List site users",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "per_page": {"type": "integer"}
                }
            }),
            scope: Scope::Admin,
        },
    ]
}

impl WordPressPlugin {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{path}", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, PluginError> {
        match (&self.username, &self.app_password) {
            (Some(user), Some(pass)) => Ok(req.basic_auth(user, Some(pass))),
            _ => Err(PluginError::Configuration(
                "WordPress write operations require 'username' and 'app_password'".into(),
            )),
        }
    }

    async fn finish(response: reqwest::Response) -> Result<Value, PluginError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PluginError::Authentication(format!(
                "WordPress rejected the credentials ({status})"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PluginError::Upstream(format!(
                "WordPress returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response.json::<Value>().await?)
    }

    async fn list(&self, path: &str, args: &Map<String, Value>) -> Result<Value, PluginError> {
        let mut req = self.client.get(self.endpoint(path));
        for key in ["search", "status"] {
            if let Some(v) = args.get(key).and_then(Value::as_str) {
                req = req.query(&[(key, v)]);
            }
        }
        for key in ["per_page", "page"] {
            if let Some(v) = u64_arg(args, key) {
                req = req.query(&[(key, v.to_string())]);
            }
        }
        if let (Some(user), Some(pass)) = (&self.username, &self.app_password) {
            req = req.basic_auth(user, Some(pass));
        }
        Self::finish(req.send().await?).await
    }

    async fn get_post(&self, args: &Map<String, Value>) -> Result<Value, PluginError> {
        let post_id = u64_arg(args, "post_id")
            .ok_or_else(|| PluginError::InvalidInput("Missing required parameter 'post_id'".into()))?;
        let req = self.client.get(self.endpoint(&format!("posts/{post_id}")));
        Self::finish(req.send().await?).await
    }

    async fn create_post(&self, args: &Map<String, Value>) -> Result<Value, PluginError> {
        let title = str_arg(args, "title")?;
        let body = json!({
            "title": title,
            "content": args.get("content").and_then(Value::as_str).unwrap_or(""),
            "status": args.get("status").and_then(Value::as_str).unwrap_or("draft"),
        });
        let req = self.authed(self.client.post(self.endpoint("posts")))?.json(&body);
        Self::finish(req.send().await?).await
    }

    async fn update_post(&self, args: &Map<String, Value>) -> Result<Value, PluginError> {
        let post_id = u64_arg(args, "post_id")
            .ok_or_else(|| PluginError::InvalidInput("Missing required parameter 'post_id'".into()))?;
        let mut body = Map::new();
        for key in ["title", "content", "status"] {
            if let Some(v) = args.get(key) {
                body.insert(key.to_owned(), v.clone());
            }
        }
        let req = self
            .authed(self.client.post(self.endpoint(&format!("posts/{post_id}"))))?
            .json(&Value::Object(body));
        Self::finish(req.send().await?).await
    }

    async fn delete_post(&self, args: &Map<String, Value>) -> Result<Value, PluginError> {
        let post_id = u64_arg(args, "post_id")
            .ok_or_else(|| PluginError::InvalidInput("Missing required parameter 'post_id'".into()))?;
        let mut req = self
            .authed(self.client.delete(self.endpoint(&format!("posts/{post_id}"))))?;
        if args.get("force").and_then(Value::as_bool) == Some(true) {
            req = req.query(&[("force", "true")]);
        }
        Self::finish(req.send().await?).await
    }
}

#[async_trait::async_trait]
impl SitePlugin for WordPressPlugin {
    async fn call(&self, method: &str, args: Map<String, Value>) -> Result<Value, PluginError> {
        match method {
            "list_posts" => self.list("posts", &args).await,
            "get_post" => self.get_post(&args).await,
            "create_post" => self.create_post(&args).await,
            "update_post" => self.update_post(&args).await,
            "delete_post" => self.delete_post(&args).await,
            "list_pages" => self.list("pages", &args).await,
            "list_users" => {
                let req = self.authed(self.client.get(self.endpoint("users")))?;
                Self::finish(req.send().await?).await
            }
            other => Err(PluginError::InvalidInput(format!(
                "Method '{other}' not implemented by the WordPress plugin"
            ))),
        }
    }

    async fn health_check(&self) -> Result<Value, PluginError> {
        let response = self
            .client
            .get(format!("{}/wp-json", self.base_url))
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
