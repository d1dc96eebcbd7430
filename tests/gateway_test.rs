// ABOUTME: Full-gateway boot test over the assembled axum router
// ABOUTME: Discovers a tenant from env and exercises the mounted wire surface

use axum::body::Body;
use http::{Request, StatusCode};
use mcphub_server::gateway::{build_router, ServerResources};
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const MASTER_KEY: &str = "sk-gateway-test-master-key";

struct EnvGuard {
    keys: Vec<&'static str>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            std::env::remove_var(key);
        }
    }
}

fn setup_env(dir: &TempDir) -> EnvGuard {
    let vars: Vec<(&'static str, String)> = vec![
        ("DATA_DIR", dir.path().join("data").display().to_string()),
        ("LOG_DIR", dir.path().join("logs").display().to_string()),
        (
            "OAUTH_STORAGE_PATH",
            dir.path().join("data").display().to_string(),
        ),
        ("MASTER_API_KEY", MASTER_KEY.to_owned()),
        ("OAUTH_JWT_SECRET_KEY", "gateway-test-secret".to_owned()),
        ("WORDPRESS_TESTSITE_URL", "https://example.com".to_owned()),
        ("WORDPRESS_TESTSITE_USERNAME", "admin".to_owned()),
        ("WORDPRESS_TESTSITE_ALIAS", "demo".to_owned()),
    ];

    let mut keys = Vec::new();
    for (key, value) in vars {
        std::env::set_var(key, value);
        keys.push(key);
    }
    EnvGuard { keys }
}

async fn post_mcp(router: &axum::Router, path: &str, auth: Option<&str>, body: Value) -> Value {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(token) = auth {
        request = request.header("authorization", format!("Bearer {token}"));
    }

    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
#[serial]
async fn test_gateway_boot_and_wire_surface() {
    let dir = TempDir::new().unwrap();
    let _guard = setup_env(&dir);

    let resources = Arc::new(ServerResources::from_env().unwrap());
    assert_eq!(resources.sites.count(), 1);

    let router = build_router(&resources).unwrap();

    // Liveness route
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // tools/list on the wordpress endpoint exposes generated tools
    let listing = post_mcp(
        &router,
        "/wordpress/mcp",
        None,
        json!({"jsonrpc": "2.0", "method": "tools/list", "id": 1}),
    )
    .await;
    let tools = listing["result"]["tools"].as_array().unwrap();
    assert!(tools
        .iter()
        .any(|t| t["name"] == "wordpress_list_posts"));

    // The single configured site makes the site parameter optional
    let list_posts = tools
        .iter()
        .find(|t| t["name"] == "wordpress_list_posts")
        .unwrap();
    assert_eq!(list_posts["inputSchema"]["properties"]["site"]["default"], "testsite");

    // The admin endpoint rejects anonymous tools/call
    let rejected = post_mcp(
        &router,
        "/mcp",
        None,
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {"name": "list_projects", "arguments": {}},
            "id": 2
        }),
    )
    .await;
    assert!(rejected["error"].is_object());

    // With the master key, the system tool runs and sees the tenant
    let projects = post_mcp(
        &router,
        "/mcp",
        Some(MASTER_KEY),
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {"name": "list_projects", "arguments": {}},
            "id": 3
        }),
    )
    .await;
    let text = projects["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("wordpress_testsite"));

    // The per-tenant endpoint is mounted under the alias
    let project_listing = post_mcp(
        &router,
        "/project/demo/mcp",
        None,
        json!({"jsonrpc": "2.0", "method": "tools/list", "id": 4}),
    )
    .await;
    let project_tools = project_listing["result"]["tools"].as_array().unwrap();
    assert!(project_tools
        .iter()
        .any(|t| t["name"] == "wordpress_list_posts"));
    // Cross-tenant system tools are absent on project endpoints
    assert!(!project_tools.iter().any(|t| t["name"] == "list_projects"));
}

#[tokio::test]
#[serial]
async fn test_oauth_token_endpoint_mounted() {
    let dir = TempDir::new().unwrap();
    let _guard = setup_env(&dir);

    let resources = Arc::new(ServerResources::from_env().unwrap());
    let router = build_router(&resources).unwrap();

    // Unknown grant type gets a structured OAuth error
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(
                    "grant_type=password&client_id=x&client_secret=y",
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "unsupported_grant_type");
}
