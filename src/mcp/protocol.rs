// ABOUTME: JSON-RPC 2.0 request/response types and MCP protocol handlers
// ABOUTME: Implements initialize version negotiation, ping, and tool listing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # MCP Protocol
//!
//! One JSON-RPC 2.0 implementation shared by every endpoint. Tool results
//! travel as MCP content blocks; invocation failures become JSON-RPC
//! errors with implementation-defined codes for auth and rate limiting.

use crate::constants::{jsonrpc_errors, protocol};
use crate::errors::{AppError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Method name to invoke
    pub method: String,
    /// Optional parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request identifier (absent for notifications)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl McpRequest {
    /// Create a new request
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<Value>) -> Self {
        Self {
            jsonrpc: protocol::JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response; exactly one of `result`/`error` is present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Result of the method call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
    /// Request identifier for correlation
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    /// Error code
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Additional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpResponse {
    /// Build a success response
    #[must_use]
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: protocol::JSONRPC_VERSION.to_owned(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Build an error response
    #[must_use]
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: protocol::JSONRPC_VERSION.to_owned(),
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Map an application error onto the JSON-RPC error space
    #[must_use]
    pub fn from_app_error(id: Option<Value>, error: &AppError) -> Self {
        let code = match error.code {
            ErrorCode::RateLimitExceeded => jsonrpc_errors::ERROR_RATE_LIMITED,
            ErrorCode::AuthRequired
            | ErrorCode::AuthInvalid
            | ErrorCode::AuthExpired
            | ErrorCode::AuthRevoked
            | ErrorCode::PermissionDenied => jsonrpc_errors::ERROR_AUTHENTICATION,
            ErrorCode::InvalidInput | ErrorCode::MissingRequiredField => {
                jsonrpc_errors::ERROR_INVALID_PARAMS
            }
            ErrorCode::ResourceNotFound => jsonrpc_errors::ERROR_METHOD_NOT_FOUND,
            _ => jsonrpc_errors::ERROR_INTERNAL,
        };
        Self::error(id, code, error.sanitized_message())
    }
}

/// Default ID for responses to requests that carried none
#[must_use]
pub fn default_request_id() -> Value {
    Value::Number(serde_json::Number::from(0))
}

/// Negotiate the protocol version with a client: the client's version when
/// supported, otherwise None.
#[must_use]
pub fn negotiate_version(client_version: &str) -> Option<&'static str> {
    protocol::SUPPORTED_VERSIONS
        .iter()
        .find(|v| **v == client_version)
        .copied()
}

/// Handle an `initialize` request for an endpoint with the given display
/// name.
#[must_use]
pub fn handle_initialize(request: &McpRequest, server_name: &str) -> McpResponse {
    let request_id = request.id.clone().unwrap_or_else(default_request_id);

    let client_version = request
        .params
        .as_ref()
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let Some(negotiated) = negotiate_version(client_version) else {
        let supported = protocol::SUPPORTED_VERSIONS.join(", ");
        return McpResponse::error(
            Some(request_id),
            jsonrpc_errors::ERROR_INVALID_PARAMS,
            format!(
                "Unsupported protocol version. Client version: {client_version}, \
                 Supported versions: {supported}"
            ),
        );
    };

    tracing::info!(
        "MCP version negotiated: {negotiated} (client: {client_version}, server supports: {:?})",
        protocol::SUPPORTED_VERSIONS
    );

    McpResponse::success(
        Some(request_id),
        json!({
            "protocolVersion": negotiated,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": server_name,
                "version": protocol::SERVER_VERSION,
            }
        }),
    )
}

/// Handle a `ping` request
#[must_use]
pub fn handle_ping(request: &McpRequest) -> McpResponse {
    let request_id = request.id.clone().unwrap_or_else(default_request_id);
    McpResponse::success(Some(request_id), json!({}))
}

/// Wrap a tool result value as MCP `tools/call` content
#[must_use]
pub fn tool_result_content(result: &Value) -> Value {
    let text = match result {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    json!({
        "content": [{
            "type": "text",
            "text": text,
        }],
        "isError": false,
    })
}
