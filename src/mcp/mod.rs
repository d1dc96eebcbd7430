// ABOUTME: MCP wire surface - JSON-RPC 2.0 framing and protocol handlers
// ABOUTME: Endpoints dispatch initialize, ping, tools/list, and tools/call here
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # MCP Protocol Module
//!
//! JSON-RPC 2.0 request/response framing and the protocol-level handlers
//! shared by every endpoint.

/// JSON-RPC 2.0 types and protocol message handling
pub mod protocol;

pub use protocol::{McpError, McpRequest, McpResponse};
