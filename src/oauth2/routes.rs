// ABOUTME: HTTP surface of the OAuth server - /authorize, /token, client management
// ABOUTME: Token endpoint handles the three grants; consent is CSRF-protected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! Axum routes for the OAuth 2.1 authorization server. The consent UI
//! itself is an external collaborator; `GET /authorize` returns the data
//! the UI needs (including the CSRF token), and `POST /authorize` records
//! the approval and redirects with the authorization code.

use super::client_registry::ClientRegistry;
use super::csrf::CsrfTokenStore;
use super::models::{AuthorizeRequest, OAuthError, TokenRequest, TokenResponse};
use super::server::{ApiKeyGrantContext, OAuthServer};
use crate::api_keys::ApiKeyStore;
use crate::auth::AuthManager;
use axum::extract::{Form, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// Shared state for the OAuth routes
#[derive(Clone)]
pub struct OAuthRoutesState {
    /// The authorization server
    pub server: Arc<OAuthServer>,
    /// Client registry
    pub clients: Arc<ClientRegistry>,
    /// CSRF token store for the consent step
    pub csrf: Arc<CsrfTokenStore>,
    /// Master key validator (client management endpoints)
    pub auth_manager: Arc<AuthManager>,
    /// API key store (API-key-based consent)
    pub api_keys: Arc<ApiKeyStore>,
}

/// Build the OAuth router
pub fn router(state: OAuthRoutesState) -> Router {
    Router::new()
        .route("/authorize", get(authorize_page).post(authorize_approve))
        .route("/token", post(token))
        .route("/oauth/register", post(register_client))
        .route("/oauth/clients", get(list_clients))
        .with_state(state)
}

/// GET /authorize: validate the request and hand the consent UI its data
async fn authorize_page(
    State(state): State<OAuthRoutesState>,
    Query(request): Query<AuthorizeRequest>,
) -> Result<Json<Value>, OAuthError> {
    let validated = state.server.validate_authorization_request(
        &request.client_id,
        &request.redirect_uri,
        &request.response_type,
        request.code_challenge.as_deref(),
        request.code_challenge_method.as_deref(),
        request.scope.as_deref(),
        request.state.as_deref(),
    )?;

    let client = state
        .clients
        .get_client(&validated.client_id)
        .ok_or_else(|| OAuthError::invalid_client("Client not found"))?;

    let csrf_token = state.csrf.generate_token();

    Ok(Json(json!({
        "client_id": validated.client_id,
        "client_name": client.client_name,
        "redirect_uri": validated.redirect_uri,
        "scope": validated.scope,
        "state": validated.state,
        "csrf_token": csrf_token,
    })))
}

/// POST /authorize form body: the original parameters plus the consent
/// CSRF token and an optional API key used as the login credential
#[derive(Debug, Deserialize)]
struct AuthorizeApproval {
    response_type: String,
    client_id: String,
    redirect_uri: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    code_challenge: Option<String>,
    #[serde(default)]
    code_challenge_method: Option<String>,
    csrf_token: String,
    #[serde(default)]
    api_key: Option<String>,
}

/// POST /authorize: consume the CSRF token, issue a code, redirect back
async fn authorize_approve(
    State(state): State<OAuthRoutesState>,
    Form(approval): Form<AuthorizeApproval>,
) -> Result<Redirect, OAuthError> {
    if !state.csrf.validate_token(&approval.csrf_token, true) {
        return Err(OAuthError::invalid_request("Invalid or expired CSRF token"));
    }

    let validated = state.server.validate_authorization_request(
        &approval.client_id,
        &approval.redirect_uri,
        &approval.response_type,
        approval.code_challenge.as_deref(),
        approval.code_challenge_method.as_deref(),
        approval.scope.as_deref(),
        approval.state.as_deref(),
    )?;

    // API-key login: the eventual access token inherits the key's project
    // and scope
    let api_key_context = match approval.api_key.as_deref() {
        Some(raw_key) => {
            let key = state
                .api_keys
                .get_key_by_token(raw_key)
                .filter(crate::api_keys::ApiKey::is_valid)
                .ok_or_else(|| OAuthError::invalid_request("Invalid API key"))?;
            ApiKeyGrantContext {
                api_key_id: Some(key.key_id),
                api_key_project_id: Some(key.project_id),
                api_key_scope: Some(key.scope),
            }
        }
        None => ApiKeyGrantContext::default(),
    };

    let code = state
        .server
        .create_authorization_code(&validated, None, api_key_context)
        .await?;

    let mut redirect_url = Url::parse(&validated.redirect_uri)
        .map_err(|_| OAuthError::invalid_request("Invalid redirect_uri"))?;
    redirect_url.query_pairs_mut().append_pair("code", &code);
    if let Some(ref client_state) = validated.state {
        redirect_url
            .query_pairs_mut()
            .append_pair("state", client_state);
    }

    Ok(Redirect::to(redirect_url.as_str()))
}

/// POST /token: dispatch to the requested grant
async fn token(
    State(state): State<OAuthRoutesState>,
    Form(request): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, OAuthError> {
    let client_secret = request.client_secret.as_deref().unwrap_or_default();

    let response = match request.grant_type.as_str() {
        "authorization_code" => {
            let code = request
                .code
                .as_deref()
                .ok_or_else(|| OAuthError::invalid_request("Missing 'code' parameter"))?;
            let redirect_uri = request
                .redirect_uri
                .as_deref()
                .ok_or_else(|| OAuthError::invalid_request("Missing 'redirect_uri' parameter"))?;
            let code_verifier = request
                .code_verifier
                .as_deref()
                .ok_or_else(|| OAuthError::invalid_request("Missing 'code_verifier' parameter"))?;

            state
                .server
                .exchange_code_for_tokens(
                    &request.client_id,
                    client_secret,
                    code,
                    redirect_uri,
                    code_verifier,
                )
                .await?
        }
        "refresh_token" => {
            let refresh_token = request
                .refresh_token
                .as_deref()
                .ok_or_else(|| OAuthError::invalid_request("Missing 'refresh_token' parameter"))?;

            state
                .server
                .handle_refresh_token_grant(&request.client_id, client_secret, refresh_token)
                .await?
        }
        "client_credentials" => {
            state
                .server
                .handle_client_credentials_grant(
                    &request.client_id,
                    client_secret,
                    request.scope.as_deref(),
                )
                .await?
        }
        _ => return Err(OAuthError::unsupported_grant_type()),
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct RegisterClientRequest {
    client_name: String,
    redirect_uris: Vec<String>,
    #[serde(default)]
    grant_types: Option<Vec<String>>,
    #[serde(default)]
    allowed_scopes: Option<Vec<String>>,
    #[serde(default)]
    metadata: Option<Value>,
}

fn require_master_key(state: &OAuthRoutesState, headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
        .unwrap_or_default();

    if state.auth_manager.validate_master_key(token) {
        Ok(())
    } else {
        Err(crate::errors::AppError::auth_required(
            "Master API key required for client management",
        )
        .into_response())
    }
}

/// POST /oauth/register: master-key-guarded client registration
async fn register_client(
    State(state): State<OAuthRoutesState>,
    headers: HeaderMap,
    Json(request): Json<RegisterClientRequest>,
) -> Response {
    if let Err(response) = require_master_key(&state, &headers) {
        return response;
    }

    match state.clients.create_client(
        &request.client_name,
        request.redirect_uris,
        request.grant_types,
        request.allowed_scopes,
        request.metadata,
    ) {
        Ok((client_id, client_secret)) => {
            let Some(client) = state.clients.get_client(&client_id) else {
                return crate::errors::AppError::internal("Client registration failed")
                    .into_response();
            };
            Json(json!({
                "client_id": client_id,
                "client_secret": client_secret,
                "client_name": client.client_name,
                "redirect_uris": client.redirect_uris,
                "grant_types": client.grant_types,
                "allowed_scopes": client.allowed_scopes,
            }))
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /oauth/clients: master-key-guarded listing (no secret hashes)
async fn list_clients(State(state): State<OAuthRoutesState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_master_key(&state, &headers) {
        return response;
    }

    let clients: Vec<Value> = state
        .clients
        .list_clients()
        .into_iter()
        .map(|c| {
            json!({
                "client_id": c.client_id,
                "client_name": c.client_name,
                "redirect_uris": c.redirect_uris,
                "grant_types": c.grant_types,
                "allowed_scopes": c.allowed_scopes,
                "created_at": c.created_at.to_rfc3339(),
            })
        })
        .collect();

    Json(json!({ "clients": clients })).into_response()
}
