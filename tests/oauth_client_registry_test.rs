// ABOUTME: Tests for OAuth client registration and secret validation
// ABOUTME: Covers creation, persistence, constant-time secret checks, deletion

use mcphub_server::oauth2::client_registry::ClientRegistry;
use tempfile::TempDir;

#[test]
fn test_create_client_shape() {
    let dir = TempDir::new().unwrap();
    let registry = ClientRegistry::new(dir.path());

    let (client_id, client_secret) = registry
        .create_client("My App", vec!["https://app/cb".into()], None, None, None)
        .unwrap();

    assert!(client_id.starts_with("cmp_client_"));
    assert!(!client_secret.is_empty());

    let client = registry.get_client(&client_id).unwrap();
    assert_eq!(client.client_name, "My App");
    // Defaults: code flow plus refresh, read/write scopes
    assert!(client.grant_types.contains(&"authorization_code".to_owned()));
    assert!(client.grant_types.contains(&"refresh_token".to_owned()));
    assert_eq!(client.allowed_scopes, vec!["read".to_owned(), "write".to_owned()]);
    // The stored hash is never the raw secret
    assert_ne!(client.client_secret_hash, client_secret);
}

#[test]
fn test_invalid_redirect_uri_rejected() {
    let dir = TempDir::new().unwrap();
    let registry = ClientRegistry::new(dir.path());

    assert!(registry
        .create_client("Bad", vec!["ftp://nope".into()], None, None, None)
        .is_err());
}

#[test]
fn test_invalid_grant_type_rejected() {
    let dir = TempDir::new().unwrap();
    let registry = ClientRegistry::new(dir.path());

    assert!(registry
        .create_client(
            "Bad",
            vec!["https://app/cb".into()],
            Some(vec!["implicit".into()]),
            None,
            None,
        )
        .is_err());
}

#[test]
fn test_secret_validation() {
    let dir = TempDir::new().unwrap();
    let registry = ClientRegistry::new(dir.path());
    let (client_id, client_secret) = registry
        .create_client("App", vec!["https://app/cb".into()], None, None, None)
        .unwrap();

    assert!(registry.validate_client_secret(&client_id, &client_secret));
    assert!(!registry.validate_client_secret(&client_id, "wrong"));
    assert!(!registry.validate_client_secret("ghost", &client_secret));
}

#[test]
fn test_persistence_across_reopen() {
    let dir = TempDir::new().unwrap();
    let (client_id, client_secret) = {
        let registry = ClientRegistry::new(dir.path());
        registry
            .create_client("App", vec!["https://app/cb".into()], None, None, None)
            .unwrap()
    };

    let reopened = ClientRegistry::new(dir.path());
    assert_eq!(reopened.count(), 1);
    assert!(reopened.validate_client_secret(&client_id, &client_secret));
}

#[test]
fn test_delete_client() {
    let dir = TempDir::new().unwrap();
    let registry = ClientRegistry::new(dir.path());
    let (client_id, _secret) = registry
        .create_client("App", vec!["https://app/cb".into()], None, None, None)
        .unwrap();

    assert!(registry.delete_client(&client_id));
    assert!(registry.get_client(&client_id).is_none());
    assert!(!registry.delete_client(&client_id));
}

#[test]
fn test_list_clients_sorted_by_creation() {
    let dir = TempDir::new().unwrap();
    let registry = ClientRegistry::new(dir.path());
    registry
        .create_client("First", vec!["https://a/cb".into()], None, None, None)
        .unwrap();
    registry
        .create_client("Second", vec!["https://b/cb".into()], None, None, None)
        .unwrap();

    let names: Vec<String> = registry
        .list_clients()
        .into_iter()
        .map(|c| c.client_name)
        .collect();
    assert_eq!(names, vec!["First".to_owned(), "Second".to_owned()]);
}
