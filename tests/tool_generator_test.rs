// ABOUTME: Tests for site-routing tool synthesis
// ABOUTME: Covers schema injection, auto-select, coercion, and tenant isolation

use mcphub_server::api_keys::Scope;
use mcphub_server::context::{self, RequestIdentity};
use mcphub_server::plugins::{PluginDescriptor, PluginError, SitePlugin, ToolSpec};
use mcphub_server::site_registry::{SiteConfig, SiteRegistry};
use mcphub_server::tool_generator::{coerce_arguments, ToolGenerator};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Echoes the dispatched method and arguments back as the result
struct EchoPlugin {
    site_url: String,
}

#[async_trait::async_trait]
impl SitePlugin for EchoPlugin {
    async fn call(&self, method: &str, args: Map<String, Value>) -> Result<Value, PluginError> {
        Ok(json!({
            "method": method,
            "args": Value::Object(args),
            "url": self.site_url,
        }))
    }

    async fn health_check(&self) -> Result<Value, PluginError> {
        Ok(json!({"healthy": true}))
    }
}

fn echo_build(config: &SiteConfig) -> Result<Box<dyn SitePlugin>, PluginError> {
    Ok(Box::new(EchoPlugin {
        site_url: config.settings.get("url").cloned().unwrap_or_default(),
    }))
}

fn echo_specs() -> Vec<ToolSpec> {
    vec![ToolSpec {
        name: "echo",
        method_name: "echo",
        description: "Echo the arguments",
        input_schema: json!({
            "type": "object",
            "properties": {
                "message": {"type": "string"}
            },
            "required": ["message"]
        }),
        scope: Scope::Read,
    }]
}

fn descriptor() -> PluginDescriptor {
    PluginDescriptor {
        plugin_type: "wordpress",
        specs: echo_specs,
        build: echo_build,
    }
}

fn site(site_id: &str, alias: Option<&str>) -> SiteConfig {
    SiteConfig {
        site_id: site_id.to_owned(),
        plugin_type: "wordpress".into(),
        alias: alias.map(str::to_owned),
        settings: HashMap::from([(
            "url".to_owned(),
            format!("https://{site_id}.example.com"),
        )]),
    }
}

fn registry_with(sites: Vec<SiteConfig>) -> Arc<SiteRegistry> {
    let mut registry = SiteRegistry::new();
    for s in sites {
        registry.register_site(s);
    }
    Arc::new(registry)
}

#[test]
fn test_tool_name_and_description_prefix() {
    let generator = ToolGenerator::new(registry_with(vec![site("site1", None)]));
    let tools = generator.generate_tools(&descriptor());

    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "wordpress_echo");
    assert!(tools[0].description.starts_with("[UNIFIED] "));
    assert_eq!(tools[0].plugin_type, "wordpress");
}

#[test]
fn test_single_site_param_is_optional_with_default() {
    let generator = ToolGenerator::new(registry_with(vec![site("site1", None)]));
    let tools = generator.generate_tools(&descriptor());
    let schema = &tools[0].input_schema;

    assert_eq!(schema["properties"]["site"]["default"], "site1");
    let required: Vec<&str> = schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(!required.contains(&"site"));
    assert!(required.contains(&"message"));
}

#[test]
fn test_multi_site_param_is_required_with_enum() {
    let generator = ToolGenerator::new(registry_with(vec![
        site("site1", None),
        site("site2", Some("myblog")),
    ]));
    let tools = generator.generate_tools(&descriptor());
    let schema = &tools[0].input_schema;

    let required: Vec<&str> = schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    // site leads the required list
    assert_eq!(required[0], "site");

    let options: Vec<&str> = schema["properties"]["site"]["enum"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(options.contains(&"site1"));
    assert!(options.contains(&"site2"));
    assert!(options.contains(&"myblog"));
}

async fn call_tool(
    tools: &[mcphub_server::tool_registry::ToolDefinition],
    args: Value,
) -> Value {
    let handler = Arc::clone(&tools[0].handler);
    let args = args.as_object().cloned().unwrap_or_default();
    context::scope(async move { (*handler)(args).await.unwrap() }).await
}

#[tokio::test]
async fn test_single_site_auto_select() {
    let generator = ToolGenerator::new(registry_with(vec![site("site1", None)]));
    let tools = generator.generate_tools(&descriptor());

    let result = call_tool(&tools, json!({"message": "hi"})).await;
    assert_eq!(result["method"], "echo");
    assert_eq!(result["url"], "https://site1.example.com");
    assert_eq!(result["args"]["message"], "hi");
}

#[tokio::test]
async fn test_no_sites_configured_error_string() {
    let generator = ToolGenerator::new(registry_with(vec![]));
    let tools = generator.generate_tools(&descriptor());

    let result = call_tool(&tools, json!({"message": "hi"})).await;
    let text = result.as_str().unwrap();
    assert!(text.starts_with("Error: No sites configured"));
}

#[tokio::test]
async fn test_multi_site_without_site_param_error_string() {
    let generator = ToolGenerator::new(registry_with(vec![
        site("site1", None),
        site("site2", None),
    ]));
    let tools = generator.generate_tools(&descriptor());

    let result = call_tool(&tools, json!({"message": "hi"})).await;
    let text = result.as_str().unwrap();
    assert!(text.starts_with("Error: Multiple sites available"));
    assert!(text.contains("site1"));
    assert!(text.contains("site2"));
}

#[tokio::test]
async fn test_unknown_site_error_string() {
    let generator = ToolGenerator::new(registry_with(vec![site("site1", None)]));
    let tools = generator.generate_tools(&descriptor());

    let result = call_tool(&tools, json!({"site": "ghost", "message": "hi"})).await;
    assert!(result.as_str().unwrap().starts_with("Error:"));
}

#[tokio::test]
async fn test_site_resolution_by_alias() {
    let generator = ToolGenerator::new(registry_with(vec![site("site2", Some("myblog"))]));
    let tools = generator.generate_tools(&descriptor());

    let result = call_tool(&tools, json!({"site": "myblog", "message": "hi"})).await;
    assert_eq!(result["url"], "https://site2.example.com");
}

#[tokio::test]
async fn test_tenant_isolation_denies_foreign_project() {
    let sites = registry_with(vec![site("site1", None), site("site4", None)]);
    let generator = ToolGenerator::new(Arc::clone(&sites));
    let tools = generator.generate_tools(&descriptor());

    let handler = Arc::clone(&tools[0].handler);
    let result = context::scope(async move {
        context::set(RequestIdentity {
            key_id: "key_x".into(),
            project_id: "wordpress_site4".into(),
            scope: "admin".into(),
            is_global: false,
        });
        let mut args = Map::new();
        args.insert("site".into(), json!("site1"));
        args.insert("message".into(), json!("hi"));
        (*handler)(args).await.unwrap()
    })
    .await;

    assert!(result.as_str().unwrap().starts_with("Error: Access denied"));
}

#[tokio::test]
async fn test_tenant_isolation_allows_own_project() {
    let sites = registry_with(vec![site("site1", None), site("site4", None)]);
    let generator = ToolGenerator::new(Arc::clone(&sites));
    let tools = generator.generate_tools(&descriptor());

    let handler = Arc::clone(&tools[0].handler);
    let result = context::scope(async move {
        context::set(RequestIdentity {
            key_id: "key_x".into(),
            project_id: "wordpress_site4".into(),
            scope: "admin".into(),
            is_global: false,
        });
        let mut args = Map::new();
        args.insert("site".into(), json!("site4"));
        args.insert("message".into(), json!("hi"));
        (*handler)(args).await.unwrap()
    })
    .await;

    assert_eq!(result["url"], "https://site4.example.com");
}

#[tokio::test]
async fn test_tenant_isolation_normalizes_alias_projects() {
    // The key was created against the alias form of the project id
    let sites = registry_with(vec![site("site2", Some("myblog"))]);
    let generator = ToolGenerator::new(Arc::clone(&sites));
    let tools = generator.generate_tools(&descriptor());

    let handler = Arc::clone(&tools[0].handler);
    let result = context::scope(async move {
        context::set(RequestIdentity {
            key_id: "key_x".into(),
            project_id: "wordpress_myblog".into(),
            scope: "read".into(),
            is_global: false,
        });
        let mut args = Map::new();
        args.insert("site".into(), json!("site2"));
        args.insert("message".into(), json!("hi"));
        (*handler)(args).await.unwrap()
    })
    .await;

    assert_eq!(result["url"], "https://site2.example.com");
}

#[tokio::test]
async fn test_global_identity_reaches_all_sites() {
    let sites = registry_with(vec![site("site1", None), site("site4", None)]);
    let generator = ToolGenerator::new(Arc::clone(&sites));
    let tools = generator.generate_tools(&descriptor());

    for target in ["site1", "site4"] {
        let handler = Arc::clone(&tools[0].handler);
        let result = context::scope(async move {
            context::set(RequestIdentity {
                key_id: "master".into(),
                project_id: "*".into(),
                scope: "admin".into(),
                is_global: true,
            });
            let mut args = Map::new();
            args.insert("site".into(), json!(target));
            args.insert("message".into(), json!("hi"));
            (*handler)(args).await.unwrap()
        })
        .await;
        assert_eq!(result["method"], "echo");
    }
}

#[test]
fn test_coerce_arguments() {
    let mut args = Map::new();
    args.insert("empty".into(), json!(""));
    args.insert("null".into(), Value::Null);
    args.insert("plain".into(), json!("hello"));
    args.insert("object".into(), json!("{\"a\": 1}"));
    args.insert("array".into(), json!("[1, 2, 3]"));
    args.insert("not_json".into(), json!("{broken"));
    args.insert("number".into(), json!(7));

    let coerced = coerce_arguments(args);

    assert!(!coerced.contains_key("empty"));
    assert!(!coerced.contains_key("null"));
    assert_eq!(coerced["plain"], "hello");
    assert_eq!(coerced["object"]["a"], 1);
    assert_eq!(coerced["array"][0], 1);
    assert_eq!(coerced["not_json"], "{broken");
    assert_eq!(coerced["number"], 7);
}

#[tokio::test]
async fn test_json_string_arguments_reach_plugin_parsed() {
    let generator = ToolGenerator::new(registry_with(vec![site("site1", None)]));
    let tools = generator.generate_tools(&descriptor());

    let result = call_tool(
        &tools,
        json!({"message": "hi", "meta": "{\"tags\": [\"a\", \"b\"]}"}),
    )
    .await;
    assert_eq!(result["args"]["meta"]["tags"][0], "a");
}
