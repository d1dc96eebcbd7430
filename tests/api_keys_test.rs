// ABOUTME: Integration tests for API key creation, validation, and lifecycle
// ABOUTME: Covers scope hierarchy, usage tracking, rotation, and persistence round-trips

use chrono::{Duration, Utc};
use mcphub_server::api_keys::{
    max_scope_priority, normalize_scope, validate_scope, ApiKey, ApiKeyStore, Scope,
};
use mcphub_server::errors::ErrorCode;
use tempfile::TempDir;

fn store() -> (ApiKeyStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = ApiKeyStore::new(dir.path().join("api_keys.json"));
    (store, dir)
}

#[test]
fn test_scope_validation() {
    assert!(validate_scope("read"));
    assert!(validate_scope("read write admin"));
    assert!(validate_scope("admin"));
    assert!(!validate_scope(""));
    assert!(!validate_scope("root"));
    assert!(!validate_scope("read delete"));
}

#[test]
fn test_normalize_scope_orders_and_dedupes() {
    assert_eq!(normalize_scope("admin read write"), "read write admin");
    assert_eq!(normalize_scope("admin admin read"), "read admin");
    assert_eq!(normalize_scope("write"), "write");
}

#[test]
fn test_normalize_scope_is_idempotent() {
    for scope in ["read", "admin write", "write read admin", "admin read read"] {
        let once = normalize_scope(scope);
        assert_eq!(normalize_scope(&once), once);
    }
}

#[test]
fn test_scope_hierarchy_priorities() {
    assert_eq!(Scope::Read.priority(), 0);
    assert_eq!(Scope::Write.priority(), 1);
    assert_eq!(Scope::Admin.priority(), 2);
    assert_eq!(max_scope_priority("read admin"), 2);
    assert_eq!(max_scope_priority("write"), 1);
}

#[test]
fn test_create_key_shape() {
    let (store, _dir) = store();

    let created = store
        .create_key("wordpress_site1", "read write", None, Some("test".into()))
        .unwrap();

    assert!(created.key.starts_with("cmp_"));
    assert!(created.key_id.starts_with("key_"));
    assert_eq!(created.scope, "read write");
    assert_eq!(created.project_id, "wordpress_site1");
}

#[test]
fn test_create_key_rejects_invalid_scope() {
    let (store, _dir) = store();
    let err = store
        .create_key("wordpress_site1", "superuser", None, None)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[test]
fn test_validate_key_scope_hierarchy() {
    let (store, _dir) = store();
    let created = store.create_key("*", "admin", None, None).unwrap();

    // Admin covers write and read
    for required in [Scope::Read, Scope::Write, Scope::Admin] {
        assert!(store.validate_key(&created.key, "*", required, false).is_ok());
    }

    let read_only = store.create_key("*", "read", None, None).unwrap();
    assert!(store
        .validate_key(&read_only.key, "*", Scope::Read, false)
        .is_ok());
    let err = store
        .validate_key(&read_only.key, "*", Scope::Write, false)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);
}

#[test]
fn test_validate_key_tracks_usage() {
    let (store, _dir) = store();
    let created = store.create_key("*", "read", None, None).unwrap();

    let before = store.get_key_info(&created.key_id).unwrap();
    assert_eq!(before.usage_count, 0);
    assert!(before.last_used_at.is_none());

    store
        .validate_key(&created.key, "*", Scope::Read, false)
        .unwrap();
    store
        .validate_key(&created.key, "*", Scope::Read, false)
        .unwrap();

    let after = store.get_key_info(&created.key_id).unwrap();
    assert_eq!(after.usage_count, 2);
    assert!(after.last_used_at.is_some());
}

#[test]
fn test_validate_key_project_scoping() {
    let (store, _dir) = store();
    let created = store
        .create_key("wordpress_site1", "admin", None, None)
        .unwrap();

    assert!(store
        .validate_key(&created.key, "wordpress_site1", Scope::Read, false)
        .is_ok());

    let err = store
        .validate_key(&created.key, "wordpress_site2", Scope::Read, false)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);

    // skip_project_check bypasses the project check for unified tools
    assert!(store
        .validate_key(&created.key, "wordpress_site2", Scope::Read, true)
        .is_ok());
}

#[test]
fn test_global_key_reaches_any_project() {
    let (store, _dir) = store();
    let created = store.create_key("*", "write", None, None).unwrap();

    assert!(store
        .validate_key(&created.key, "gitea_main", Scope::Read, false)
        .is_ok());
    assert!(store
        .validate_key(&created.key, "wordpress_site9", Scope::Write, false)
        .is_ok());
}

#[test]
fn test_revoked_key_rejected() {
    let (store, _dir) = store();
    let created = store.create_key("*", "read", None, None).unwrap();

    assert!(store.revoke_key(&created.key_id));
    let err = store
        .validate_key(&created.key, "*", Scope::Read, false)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthRevoked);
}

#[test]
fn test_unknown_key_rejected() {
    let (store, _dir) = store();
    let err = store
        .validate_key("cmp_definitely_not_real", "*", Scope::Read, false)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthInvalid);
}

#[test]
fn test_rotation_revokes_old_keys() {
    let (store, _dir) = store();
    let first = store
        .create_key("wordpress_site1", "read write", None, None)
        .unwrap();
    let second = store
        .create_key("wordpress_site1", "admin", None, None)
        .unwrap();

    let rotated = store.rotate_keys("wordpress_site1").unwrap();
    assert_eq!(rotated.len(), 2);

    // Old keys no longer validate
    for old in [&first.key, &second.key] {
        assert!(store
            .validate_key(old, "wordpress_site1", Scope::Read, false)
            .is_err());
    }
    // New keys preserve their scopes
    let scopes: Vec<&str> = rotated.iter().map(|k| k.scope.as_str()).collect();
    assert!(scopes.contains(&"read write"));
    assert!(scopes.contains(&"admin"));
    for new in &rotated {
        assert!(store
            .validate_key(&new.key, "wordpress_site1", Scope::Read, false)
            .is_ok());
    }
}

#[test]
fn test_persistence_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("api_keys.json");

    let created = {
        let store = ApiKeyStore::new(&path);
        store.create_key("*", "admin", Some(30), None).unwrap()
    };

    let reopened = ApiKeyStore::new(&path);
    assert_eq!(reopened.count(), 1);
    assert!(reopened
        .validate_key(&created.key, "*", Scope::Admin, false)
        .is_ok());
}

#[test]
fn test_api_key_serde_round_trip() {
    let key = ApiKey {
        key_id: "key_abc".into(),
        key_hash: "deadbeef".into(),
        project_id: "wordpress_site1".into(),
        scope: "read write".into(),
        created_at: Utc::now(),
        expires_at: Some(Utc::now() + Duration::days(7)),
        last_used_at: None,
        usage_count: 42,
        description: Some("round trip".into()),
        revoked: false,
    };

    let serialized = serde_json::to_string(&key).unwrap();
    let decoded: ApiKey = serde_json::from_str(&serialized).unwrap();
    assert_eq!(decoded, key);
}

#[test]
fn test_list_keys_filters() {
    let (store, _dir) = store();
    store.create_key("wordpress_site1", "read", None, None).unwrap();
    store.create_key("gitea_main", "read", None, None).unwrap();
    let global = store.create_key("*", "admin", None, None).unwrap();
    store.revoke_key(&global.key_id);

    // Global keys match any project filter
    let wp = store.list_keys(Some("wordpress_site1"), false);
    assert_eq!(wp.len(), 1);

    let all = store.list_keys(None, false);
    assert_eq!(all.len(), 2);

    let with_revoked = store.list_keys(None, true);
    assert_eq!(with_revoked.len(), 3);
}
