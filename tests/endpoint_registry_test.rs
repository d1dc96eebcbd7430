// ABOUTME: Tests for the endpoint registry - preset init and dynamic project mounts
// ABOUTME: Covers lookups, listings, and project endpoint idempotence

use mcphub_server::api_keys::{ApiKeyStore, Scope};
use mcphub_server::audit::AuditLogger;
use mcphub_server::auth::AuthManager;
use mcphub_server::config::OAuthConfig;
use mcphub_server::endpoints::factory::EndpointFactory;
use mcphub_server::endpoints::middleware::MiddlewareDeps;
use mcphub_server::endpoints::registry::EndpointRegistry;
use mcphub_server::oauth2::storage::MemoryStorage;
use mcphub_server::oauth2::TokenManager;
use mcphub_server::rate_limiting::{RateLimitConfig, RateLimiter};
use mcphub_server::tool_registry::{ToolDefinition, ToolRegistry};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn registry_with_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.declare_namespace("wordpress");
    let _ = registry.register(ToolDefinition {
        name: "wordpress_list_posts".into(),
        description: "list posts".into(),
        input_schema: json!({"type": "object", "properties": {}}),
        handler: Arc::new(|args| Box::pin(async move { Ok(serde_json::Value::Object(args)) })),
        required_scope: Scope::Read,
        plugin_type: "wordpress".into(),
    });
    registry
}

fn endpoint_registry(dir: &TempDir) -> EndpointRegistry {
    let oauth_config = OAuthConfig {
        jwt_secret: Some("registry-test-secret".into()),
        jwt_algorithm: "HS256".into(),
        access_token_ttl_secs: 3_600,
        refresh_token_ttl_secs: 604_800,
        storage_type: "json".into(),
        storage_path: PathBuf::from("unused"),
    };
    let deps = MiddlewareDeps {
        auth_manager: Arc::new(AuthManager::with_master_key("sk-registry-test".into())),
        api_keys: Arc::new(ApiKeyStore::new(dir.path().join("api_keys.json"))),
        token_manager: Arc::new(TokenManager::new(
            &oauth_config,
            Arc::new(MemoryStorage::new()),
            None,
        )),
        rate_limiter: Arc::new(RateLimiter::with_config(
            RateLimitConfig::default(),
            HashMap::new(),
        )),
        audit: Arc::new(AuditLogger::with_defaults(dir.path().join("logs"))),
    };
    EndpointRegistry::new(EndpointFactory::new(deps))
}

#[test]
fn test_initialize_defaults_and_lookup() {
    let dir = TempDir::new().unwrap();
    let tools = registry_with_tools();
    let mut endpoints = endpoint_registry(&dir);

    endpoints.initialize_default_endpoints(&tools);

    // All preset mounts exist
    for path in ["/", "/system", "/wordpress", "/gitea", "/n8n"] {
        assert!(endpoints.get_endpoint(path).is_some(), "missing {path}");
    }

    let config = endpoints.get_config("/wordpress").unwrap();
    assert_eq!(config.plugin_types, vec!["wordpress".to_owned()]);

    // Trailing slashes resolve too
    assert!(endpoints.get_endpoint("/wordpress/").is_some());
    assert!(endpoints.get_endpoint("/ghost").is_none());
}

#[test]
fn test_list_endpoints_sorted_with_counts() {
    let dir = TempDir::new().unwrap();
    let tools = registry_with_tools();
    let mut endpoints = endpoint_registry(&dir);
    endpoints.initialize_default_endpoints(&tools);

    let infos = endpoints.list_endpoints();
    assert!(infos.len() >= 11);
    let paths: Vec<&str> = infos.iter().map(|i| i.path.as_str()).collect();
    let mut sorted = paths.clone();
    sorted.sort_unstable();
    assert_eq!(paths, sorted);

    let wordpress = infos.iter().find(|i| i.path == "/wordpress").unwrap();
    assert_eq!(wordpress.tool_count, 1);
    let admin = infos.iter().find(|i| i.path == "/").unwrap();
    assert!(admin.require_master_key);
}

#[test]
fn test_project_endpoint_created_once() {
    let dir = TempDir::new().unwrap();
    let tools = registry_with_tools();
    let mut endpoints = endpoint_registry(&dir);
    endpoints.initialize_default_endpoints(&tools);

    let first = endpoints
        .create_project_endpoint(&tools, "wordpress_site4", "wordpress", Some("myblog"))
        .unwrap();
    assert_eq!(first.config.path, "/project/myblog");
    assert_eq!(first.config.site_filter.as_deref(), Some("wordpress_site4"));

    // A second creation for the same path returns the existing endpoint
    let second = endpoints
        .create_project_endpoint(&tools, "wordpress_site4", "wordpress", Some("myblog"))
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}
