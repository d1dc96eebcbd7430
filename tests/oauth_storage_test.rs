// ABOUTME: Tests for the JSON-backed OAuth storage
// ABOUTME: Covers persistence round-trips, expiry cleanup, and revocation tombstones

use chrono::{Duration, Utc};
use mcphub_server::oauth2::models::{AccessTokenRecord, AuthorizationCode, RefreshTokenRecord};
use mcphub_server::oauth2::storage::{JsonStorage, OAuthStorage};
use tempfile::TempDir;

fn code(value: &str, ttl_secs: i64) -> AuthorizationCode {
    AuthorizationCode {
        code: value.to_owned(),
        client_id: "client-1".into(),
        redirect_uri: "https://app/cb".into(),
        scope: "read".into(),
        code_challenge: "challenge".into(),
        code_challenge_method: "S256".into(),
        expires_at: Utc::now() + Duration::seconds(ttl_secs),
        used: false,
        user_id: None,
        api_key_id: None,
        api_key_project_id: None,
        api_key_scope: None,
    }
}

fn refresh(value: &str) -> RefreshTokenRecord {
    RefreshTokenRecord {
        token: value.to_owned(),
        client_id: "client-1".into(),
        access_token: Some("jwt".into()),
        expires_at: Utc::now() + Duration::days(7),
        revoked: false,
        rotation_count: 0,
        issued_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_authorization_code_round_trip() {
    let dir = TempDir::new().unwrap();
    let storage = JsonStorage::new(dir.path());

    let record = code("auth_abc", 300);
    storage.save_authorization_code(&record).await.unwrap();

    let loaded = storage.get_authorization_code("auth_abc").await.unwrap().unwrap();
    assert_eq!(loaded, record);

    // Update (mark used) persists
    let mut used = loaded;
    used.used = true;
    storage.update_authorization_code(&used).await.unwrap();
    let reloaded = storage.get_authorization_code("auth_abc").await.unwrap().unwrap();
    assert!(reloaded.used);

    storage.delete_authorization_code("auth_abc").await.unwrap();
    assert!(storage.get_authorization_code("auth_abc").await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_code_reads_as_absent() {
    let dir = TempDir::new().unwrap();
    let storage = JsonStorage::new(dir.path());

    storage.save_authorization_code(&code("auth_old", -5)).await.unwrap();
    assert!(storage.get_authorization_code("auth_old").await.unwrap().is_none());
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let storage = JsonStorage::new(dir.path());
        storage.save_authorization_code(&code("auth_keep", 300)).await.unwrap();
        storage.save_refresh_token(&refresh("rt_keep")).await.unwrap();
    }

    let reopened = JsonStorage::new(dir.path());
    assert!(reopened.get_authorization_code("auth_keep").await.unwrap().is_some());
    assert!(reopened.get_refresh_token("rt_keep", false).await.unwrap().is_some());
}

#[tokio::test]
async fn test_refresh_tombstone_visibility() {
    let dir = TempDir::new().unwrap();
    let storage = JsonStorage::new(dir.path());

    storage.save_refresh_token(&refresh("rt_x")).await.unwrap();
    assert!(storage.revoke_refresh_token("rt_x").await.unwrap());

    // Revoked tokens read as absent on the normal path
    assert!(storage.get_refresh_token("rt_x", false).await.unwrap().is_none());
    // The tombstone is visible on the reuse-detection path
    let tombstone = storage.get_refresh_token("rt_x", true).await.unwrap().unwrap();
    assert!(tombstone.revoked);

    assert!(!storage.revoke_refresh_token("rt_unknown").await.unwrap());
}

#[tokio::test]
async fn test_access_token_expiry_cleanup() {
    let dir = TempDir::new().unwrap();
    let storage = JsonStorage::new(dir.path());

    let expired = AccessTokenRecord {
        token: "jwt_old".into(),
        client_id: "client-1".into(),
        scope: "read".into(),
        expires_at: Utc::now() - Duration::seconds(5),
        user_id: None,
        project_id: "*".into(),
        issued_at: Utc::now() - Duration::hours(2),
    };
    storage.save_access_token(&expired).await.unwrap();
    assert!(storage.get_access_token("jwt_old").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_expired_removes_stale_entries() {
    let dir = TempDir::new().unwrap();
    let storage = JsonStorage::new(dir.path());

    storage.save_authorization_code(&code("auth_live", 300)).await.unwrap();
    storage.save_authorization_code(&code("auth_dead", -5)).await.unwrap();

    storage.sweep_expired().await.unwrap();

    assert!(storage.get_authorization_code("auth_live").await.unwrap().is_some());
    // Reading raw state after sweep: the dead code is gone for good
    let raw = std::fs::read_to_string(dir.path().join("oauth_codes.json")).unwrap();
    assert!(!raw.contains("auth_dead"));
}
