// ABOUTME: Tests for endpoint policy configuration and the preset table
// ABOUTME: Covers validation invariants, tool filtering, and project endpoints

use mcphub_server::endpoints::config::{
    preset_endpoint_configs, project_endpoint_config, EndpointType,
};

#[test]
fn test_presets_are_valid() {
    for config in preset_endpoint_configs() {
        config.validate().unwrap();
        assert!(config.path.starts_with('/'));
    }
}

#[test]
fn test_admin_preset() {
    let presets = preset_endpoint_configs();
    let admin = presets.iter().find(|c| c.path == "/").unwrap();

    assert_eq!(admin.endpoint_type, EndpointType::Admin);
    assert!(admin.require_master_key);
    // Empty plugin list means all plugins
    assert!(admin.plugin_types.is_empty());
    assert!(admin.allows_plugin("wordpress"));
    assert!(admin.allows_plugin("system"));
}

#[test]
fn test_system_preset_whitelist() {
    let presets = preset_endpoint_configs();
    let system = presets.iter().find(|c| c.path == "/system").unwrap();

    assert!(system.require_master_key);
    assert!(system.allows_tool("manage_api_keys_create"));
    assert!(system.allows_tool("get_audit_log"));
    assert!(system.allows_tool("get_rate_limit_stats"));
    // Not on the whitelist
    assert!(!system.allows_tool("wordpress_list_posts"));
}

#[test]
fn test_plugin_presets_blacklist_privileged_tools() {
    let presets = preset_endpoint_configs();
    let wordpress = presets.iter().find(|c| c.path == "/wordpress").unwrap();

    assert!(!wordpress.require_master_key);
    assert!(wordpress.allows_plugin("wordpress"));
    assert!(!wordpress.allows_plugin("gitea"));
    assert!(wordpress.allows_tool("wordpress_list_posts"));
    assert!(!wordpress.allows_tool("manage_api_keys_create"));
    assert!(!wordpress.allows_tool("oauth_register_client"));
}

#[test]
fn test_wordpress_advanced_requires_admin_scope() {
    let presets = preset_endpoint_configs();
    let advanced = presets
        .iter()
        .find(|c| c.path == "/wordpress-advanced")
        .unwrap();

    assert!(advanced.allows_scope("admin"));
    assert!(!advanced.allows_scope("read"));
    assert!(!advanced.allows_scope("write"));
}

#[test]
fn test_allows_scope_empty_means_all() {
    let config = project_endpoint_config("wordpress_site1", "wordpress", None);
    assert!(config.allows_scope("read"));
    assert!(config.allows_scope("admin"));
}

#[test]
fn test_validate_rejects_bad_path() {
    let mut config = project_endpoint_config("wordpress_site1", "wordpress", None);
    config.path = "no-leading-slash".into();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_whitelist_blacklist_overlap() {
    let mut config = project_endpoint_config("wordpress_site1", "wordpress", None);
    config.tool_whitelist = Some(
        ["list_projects".to_owned()].into_iter().collect(),
    );
    // list_projects is already on the project blacklist
    assert!(config.validate().is_err());
}

#[test]
fn test_project_endpoint_config() {
    let config = project_endpoint_config("wordpress_site4", "wordpress", Some("myblog"));

    assert_eq!(config.path, "/project/myblog");
    assert_eq!(config.endpoint_type, EndpointType::Project);
    assert_eq!(config.site_filter.as_deref(), Some("wordpress_site4"));
    assert_eq!(config.plugin_types, vec!["wordpress".to_owned()]);
    // Cross-tenant tools are blacklisted
    assert!(!config.allows_tool("list_projects"));
    assert!(!config.allows_tool("oauth_list_clients"));
    assert!(!config.allows_tool("manage_api_keys_create"));
    assert!(config.allows_tool("wordpress_list_posts"));
}

#[test]
fn test_project_endpoint_falls_back_to_full_id_path() {
    let config = project_endpoint_config("wordpress_site4", "wordpress", None);
    assert_eq!(config.path, "/project/wordpress_site4");
}
