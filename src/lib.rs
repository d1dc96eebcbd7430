// ABOUTME: Main library entry point for the MCPHub multi-tenant MCP gateway
// ABOUTME: One long-running service exposing scoped tool endpoints over upstream APIs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

#![deny(unsafe_code)]

//! # MCPHub Server
//!
//! A multi-tenant MCP (Model-Context-Protocol) gateway: a single service
//! exposing many scoped RPC endpoints, each surfacing a curated subset of
//! tools that proxy into upstream HTTP APIs (content management, git,
//! automation).
//!
//! ## Request admission pipeline
//!
//! A wire-level MCP call arriving at a mount path runs through, in order:
//! the auth middleware (master key, hashed project API key, or OAuth
//! bearer token, then the endpoint policy), the token-bucket rate limiter,
//! and the audit recorder; the tool handler then resolves the tenant via
//! the site registry, enforces tenant isolation against the request
//! context, and dispatches to the upstream plugin with the tenant's
//! credentials injected.
//!
//! ## Architecture
//!
//! - **Site registry**: tenants discovered from environment variables,
//!   with alias conflict resolution
//! - **Tool registry / generator**: one abstract operation bound to N
//!   configured tenants via a `site` parameter
//! - **Endpoints**: policy-scoped tool sets at their own mount paths with
//!   an Auth -> RateLimit -> Audit middleware stack
//! - **OAuth 2.1**: authorization-code + PKCE, refresh rotation with
//!   reuse detection, JWT access tokens
//! - **Flat-file state**: JSON files are the only durable medium

/// Per-project API keys with scopes, expiry, and usage tracking
pub mod api_keys;

/// Append-only JSONL audit log with rotation and redaction
pub mod audit;

/// Master API key authentication
pub mod auth;

/// Environment-based server configuration
pub mod config;

/// System-wide constants and defaults
pub mod constants;

/// Per-request ambient identity for tenant isolation
pub mod context;

/// Scoped MCP endpoints, middleware, factory, and registry
pub mod endpoints;

/// Unified error handling
pub mod errors;

/// Gateway bootstrap and HTTP serving
pub mod gateway;

/// Rolling health metrics and alert thresholds
pub mod health;

/// Logging configuration and structured output
pub mod logging;

/// MCP wire protocol (JSON-RPC 2.0)
pub mod mcp;

/// OAuth 2.1 authorization server
pub mod oauth2;

/// Upstream plugin families (WordPress, Gitea, n8n)
pub mod plugins;

/// Multi-window token-bucket rate limiting
pub mod rate_limiting;

/// Tenant discovery and alias resolution
pub mod site_registry;

/// Site-routing tool synthesis from plugin specifications
pub mod tool_generator;

/// The global tool table
pub mod tool_registry;

/// Built-in system management tools
pub mod tools;
