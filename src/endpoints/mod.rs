// ABOUTME: Scoped MCP endpoints - policy config, middleware stack, factory, registry
// ABOUTME: Each endpoint exposes a filtered tool set under its own authorization policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Endpoints
//!
//! One MCP endpoint per mount path, each with an immutable policy
//! ([`config::EndpointConfig`]) selecting which tools it exposes and who
//! may call them. Every tool invocation runs through the per-endpoint
//! middleware stack: Auth, then RateLimit, then Audit.

/// Endpoint policy configuration and the preset table
pub mod config;
/// The endpoint factory building scoped tool sets
pub mod factory;
/// Auth -> RateLimit -> Audit middleware chain
pub mod middleware;
/// Central endpoint registry and HTTP route assembly
pub mod registry;

pub use config::{EndpointConfig, EndpointType};
pub use factory::{EndpointFactory, McpEndpoint};
pub use registry::{EndpointInfo, EndpointRegistry};
