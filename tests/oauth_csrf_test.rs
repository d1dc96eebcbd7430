// ABOUTME: Tests for the one-time CSRF token store
// ABOUTME: Covers consumption, expiry, and the lazy sweep

use mcphub_server::oauth2::csrf::CsrfTokenStore;

#[test]
fn test_generate_and_validate_once() {
    let store = CsrfTokenStore::with_defaults();
    let token = store.generate_token();
    assert_eq!(token.len(), 64); // 32 bytes hex-encoded

    // One-time use: the first validation consumes the token
    assert!(store.validate_token(&token, true));
    assert!(!store.validate_token(&token, true));
}

#[test]
fn test_validate_without_consume_keeps_token() {
    let store = CsrfTokenStore::with_defaults();
    let token = store.generate_token();

    assert!(store.validate_token(&token, false));
    assert!(store.validate_token(&token, true));
}

#[test]
fn test_unknown_token_fails() {
    let store = CsrfTokenStore::with_defaults();
    assert!(!store.validate_token("deadbeef", true));
    assert!(!store.validate_token("", true));
}

#[test]
fn test_expired_token_fails_and_is_swept() {
    let store = CsrfTokenStore::new(0);
    let token = store.generate_token();

    // Zero lifetime: expired immediately
    assert!(!store.validate_token(&token, true));

    // Generation sweeps the expired leftovers; only the fresh token remains
    let _fresh = store.generate_token();
    let stats = store.stats();
    assert_eq!(stats.total_tokens, 1);
    assert_eq!(stats.active_tokens, 0); // zero lifetime again
}

#[test]
fn test_stats() {
    let store = CsrfTokenStore::new(600);
    let _a = store.generate_token();
    let _b = store.generate_token();

    let stats = store.stats();
    assert_eq!(stats.total_tokens, 2);
    assert_eq!(stats.active_tokens, 2);
    assert_eq!(stats.token_lifetime_seconds, 600);
}
