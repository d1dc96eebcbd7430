// ABOUTME: OAuth 2.1 authorization server - PKCE, code exchange, token rotation
// ABOUTME: Submodules for models, PKCE, CSRF, clients, storage, tokens, and routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # OAuth 2.1 Subsystem
//!
//! Authorization-code grant with mandatory S256 PKCE, refresh-token
//! rotation with reuse detection, client-credentials grant, and JWT access
//! tokens with stateless validation. Persistence is pluggable behind
//! [`storage::OAuthStorage`]; the shipped backend rewrites flat JSON files.

/// OAuth client registry with JSON persistence
pub mod client_registry;
/// Short-lived one-time CSRF tokens for the authorization UI
pub mod csrf;
/// Request/response/record models and the OAuth error type
pub mod models;
/// PKCE S256 challenge generation and validation
pub mod pkce;
/// HTTP routes for /authorize, /token, and client management
pub mod routes;
/// The authorization server state machines
pub mod server;
/// Pluggable token/code persistence
pub mod storage;
/// JWT access tokens and refresh-token rotation
pub mod token_manager;

pub use models::{
    AccessTokenRecord, AuthorizationCode, AuthorizeRequest, OAuthClient, OAuthError,
    RefreshTokenRecord, TokenRequest, TokenResponse,
};
pub use server::OAuthServer;
pub use token_manager::{TokenError, TokenManager};
