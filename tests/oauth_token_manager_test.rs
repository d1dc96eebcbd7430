// ABOUTME: Tests for JWT access tokens and refresh-token rotation
// ABOUTME: Covers claim shape, expiry vs invalidity, rotation, and reuse detection

use mcphub_server::config::OAuthConfig;
use mcphub_server::oauth2::storage::{MemoryStorage, OAuthStorage};
use mcphub_server::oauth2::token_manager::{JwtValidationError, TokenError};
use mcphub_server::oauth2::TokenManager;
use std::path::PathBuf;
use std::sync::Arc;

fn config(access_ttl: u64) -> OAuthConfig {
    OAuthConfig {
        jwt_secret: Some("test-secret-key-for-tests-only".into()),
        jwt_algorithm: "HS256".into(),
        access_token_ttl_secs: access_ttl,
        refresh_token_ttl_secs: 604_800,
        storage_type: "json".into(),
        storage_path: PathBuf::from("unused"),
    }
}

fn manager(access_ttl: u64) -> (TokenManager, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let manager = TokenManager::new(&config(access_ttl), storage.clone(), None);
    (manager, storage)
}

#[tokio::test]
async fn test_access_token_claims() {
    let (manager, _storage) = manager(3_600);

    let token = manager
        .generate_access_token("client-1", "read write", Some("user-9"), "wordpress_site1")
        .await
        .unwrap();

    let claims = manager.validate_access_token(&token).unwrap();
    assert_eq!(claims.client_id, "client-1");
    assert_eq!(claims.scope, "read write");
    assert_eq!(claims.project_id, "wordpress_site1");
    assert_eq!(claims.sub.as_deref(), Some("user-9"));
    assert!(claims.exp > claims.iat);
    assert!(!claims.jti.is_empty());
}

#[tokio::test]
async fn test_access_token_metadata_persisted() {
    let (manager, storage) = manager(3_600);
    let token = manager
        .generate_access_token("client-1", "read", None, "*")
        .await
        .unwrap();

    let record = storage.get_access_token(&token).await.unwrap().unwrap();
    assert_eq!(record.client_id, "client-1");
    assert_eq!(record.project_id, "*");
}

#[tokio::test]
async fn test_expired_and_invalid_are_distinct() {
    // TTL of zero: the token is expired the moment it is minted
    let (manager, _storage) = manager(0);
    let token = manager
        .generate_access_token("client-1", "read", None, "*")
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
    match manager.validate_access_token(&token) {
        Err(JwtValidationError::Expired) => {}
        other => panic!("expected expiry, got {other:?}"),
    }

    let (other_manager, _s) = manager_with_secret("a-completely-different-secret");
    let fresh = other_manager
        .generate_access_token("client-1", "read", None, "*")
        .await
        .unwrap();
    // Wrong signature is Invalid, never Expired
    let (verifier, _s2) = manager_with_secret("the-right-secret");
    match verifier.validate_access_token(&fresh) {
        Err(JwtValidationError::Invalid(_)) => {}
        other => panic!("expected invalid signature, got {other:?}"),
    }
}

fn manager_with_secret(secret: &str) -> (TokenManager, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let mut cfg = config(3_600);
    cfg.jwt_secret = Some(secret.into());
    (TokenManager::new(&cfg, storage.clone(), None), storage)
}

#[tokio::test]
async fn test_refresh_token_rotation() {
    let (manager, storage) = manager(3_600);

    let access = manager
        .generate_access_token("client-1", "write", None, "gitea_main")
        .await
        .unwrap();
    let refresh = manager
        .generate_refresh_token("client-1", &access)
        .await
        .unwrap();
    assert!(refresh.starts_with("rt_"));

    let rotation = manager
        .rotate_refresh_token(&refresh, "client-1")
        .await
        .unwrap();

    // Scope and project carried over from the linked access token
    assert_eq!(rotation.scope, "write");
    let claims = manager.validate_access_token(&rotation.access_token).unwrap();
    assert_eq!(claims.project_id, "gitea_main");

    // The old token is tombstoned, not deleted
    assert!(storage.get_refresh_token(&refresh, false).await.unwrap().is_none());
    let tombstone = storage.get_refresh_token(&refresh, true).await.unwrap().unwrap();
    assert!(tombstone.revoked);

    // The replacement carries the incremented rotation count
    let new_record = storage
        .get_refresh_token(&rotation.refresh_token, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(new_record.rotation_count, 1);
}

#[tokio::test]
async fn test_refresh_reuse_is_security_error() {
    let (manager, _storage) = manager(3_600);

    let access = manager
        .generate_access_token("client-1", "read", None, "*")
        .await
        .unwrap();
    let refresh = manager
        .generate_refresh_token("client-1", &access)
        .await
        .unwrap();

    let rotation = manager.rotate_refresh_token(&refresh, "client-1").await;
    assert!(rotation.is_ok());

    // Presenting the rotated token again is reuse
    match manager.rotate_refresh_token(&refresh, "client-1").await {
        Err(TokenError::Security(msg)) => assert!(msg.contains("reuse")),
        other => panic!("expected security error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refresh_client_mismatch() {
    let (manager, _storage) = manager(3_600);
    let access = manager
        .generate_access_token("client-1", "read", None, "*")
        .await
        .unwrap();
    let refresh = manager
        .generate_refresh_token("client-1", &access)
        .await
        .unwrap();

    match manager.rotate_refresh_token(&refresh, "client-2").await {
        Err(TokenError::InvalidGrant(msg)) => assert!(msg.contains("mismatch")),
        other => panic!("expected invalid grant, got {other:?}"),
    }
}

#[tokio::test]
async fn test_out_of_band_revocation() {
    let (manager, storage) = manager(3_600);
    let access = manager
        .generate_access_token("client-1", "read", None, "*")
        .await
        .unwrap();
    let refresh = manager
        .generate_refresh_token("client-1", &access)
        .await
        .unwrap();

    assert!(manager.revoke_refresh_token(&refresh).await.unwrap());
    assert!(storage.get_refresh_token(&refresh, false).await.unwrap().is_none());
    assert!(!manager.revoke_refresh_token("rt_ghost").await.unwrap());
}

#[tokio::test]
async fn test_unknown_refresh_token() {
    let (manager, _storage) = manager(3_600);
    match manager.rotate_refresh_token("rt_nope", "client-1").await {
        Err(TokenError::InvalidGrant(_)) => {}
        other => panic!("expected invalid grant, got {other:?}"),
    }
}
