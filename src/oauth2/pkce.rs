// ABOUTME: PKCE (RFC 7636) code verifier and challenge handling, S256 only
// ABOUTME: Challenge is unpadded base64url(sha256(verifier)), compared constant-time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! PKCE implementation. OAuth 2.1 removes the `plain` method; only S256 is
//! accepted anywhere in this gateway.

use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Minimum verifier length per RFC 7636
pub const MIN_VERIFIER_LEN: usize = 43;
/// Maximum verifier length per RFC 7636
pub const MAX_VERIFIER_LEN: usize = 128;

/// Generate a PKCE code verifier of the given length (43-128 characters)
///
/// # Errors
///
/// Returns an error when the requested length is out of range.
pub fn generate_code_verifier(length: usize) -> AppResult<String> {
    if !(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&length) {
        return Err(AppError::invalid_input(
            "Code verifier length must be between 43-128",
        ));
    }

    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut verifier = URL_SAFE_NO_PAD.encode(bytes);
    verifier.truncate(length);
    Ok(verifier)
}

/// Compute `base64url(sha256(code_verifier))` with padding stripped
///
/// # Errors
///
/// Returns an error for an empty verifier or a method other than S256.
pub fn generate_code_challenge(code_verifier: &str, method: &str) -> AppResult<String> {
    if method != "S256" {
        return Err(AppError::invalid_input(
            "Only the S256 code_challenge_method is supported (OAuth 2.1)",
        ));
    }
    if code_verifier.is_empty() {
        return Err(AppError::invalid_input("Code verifier cannot be empty"));
    }

    let digest = Sha256::digest(code_verifier.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(digest))
}

/// Validate a code verifier against a challenge with a constant-time
/// comparison. Returns false on any mismatch or unsupported method.
#[must_use]
pub fn validate_code_challenge(code_verifier: &str, code_challenge: &str, method: &str) -> bool {
    let Ok(expected) = generate_code_challenge(code_verifier, method) else {
        return false;
    };

    if expected.len() != code_challenge.len() {
        return false;
    }
    expected.as_bytes().ct_eq(code_challenge.as_bytes()).into()
}
