// ABOUTME: System-wide constants and configuration values for the MCPHub gateway
// ABOUTME: Contains credential prefixes, token TTLs, rate-limit defaults, and protocol codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Constants Module
//!
//! Application constants and environment-based configuration values shared
//! across subsystems.

/// Credential and token prefixes
pub mod key_prefixes {
    /// Master API key prefix
    pub const MASTER: &str = "sk-";
    /// Per-project API key prefix
    pub const API_KEY: &str = "cmp_";
    /// API key identifier prefix
    pub const KEY_ID: &str = "key_";
    /// OAuth authorization code prefix
    pub const AUTH_CODE: &str = "auth_";
    /// OAuth refresh token prefix
    pub const REFRESH_TOKEN: &str = "rt_";
    /// OAuth client identifier prefix
    pub const OAUTH_CLIENT: &str = "cmp_client_";
}

/// Token and credential lifetimes (seconds)
pub mod ttl {
    /// Access token lifetime (1 hour)
    pub const ACCESS_TOKEN_SECS: u64 = 3_600;
    /// Refresh token lifetime (7 days)
    pub const REFRESH_TOKEN_SECS: u64 = 604_800;
    /// Authorization code lifetime (5 minutes)
    pub const AUTH_CODE_SECS: u64 = 300;
    /// CSRF token lifetime (10 minutes)
    pub const CSRF_TOKEN_SECS: u64 = 600;
}

/// Rate limiting defaults
pub mod rate_limits {
    /// Default requests per minute
    pub const PER_MINUTE: u32 = 60;
    /// Default requests per hour
    pub const PER_HOUR: u32 = 1_000;
    /// Default requests per day
    pub const PER_DAY: u32 = 10_000;
    /// Characters of the Authorization header used as the client identifier
    pub const CLIENT_ID_MAX_LEN: usize = 50;
}

/// Audit log defaults
pub mod audit {
    /// Rotate when the log reaches this size (10 MiB)
    pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
    /// Number of rotated backup files to keep
    pub const BACKUP_COUNT: u32 = 5;
    /// Default audit log file name
    pub const LOG_FILE: &str = "audit.log";
}

/// Health monitoring defaults
pub mod health {
    /// Hours of metric history retained per project
    pub const RETENTION_HOURS: i64 = 24;
    /// Maximum metrics kept per project
    pub const MAX_METRICS_PER_PROJECT: usize = 1_000;
    /// Response time above this is critical (ms)
    pub const RESPONSE_TIME_CRITICAL_MS: f64 = 5_000.0;
    /// Error rate above this is a warning (percent)
    pub const ERROR_RATE_WARNING_PCT: f64 = 10.0;
    /// Error rate above this is critical (percent)
    pub const ERROR_RATE_CRITICAL_PCT: f64 = 25.0;
}

/// Environment variable names
pub mod env_names {
    /// Master API key
    pub const MASTER_API_KEY: &str = "MASTER_API_KEY";
    /// JWT signing secret for the OAuth server
    pub const OAUTH_JWT_SECRET_KEY: &str = "OAUTH_JWT_SECRET_KEY";
    /// JWT algorithm (default HS256)
    pub const OAUTH_JWT_ALGORITHM: &str = "OAUTH_JWT_ALGORITHM";
    /// Access token TTL override
    pub const OAUTH_ACCESS_TOKEN_TTL: &str = "OAUTH_ACCESS_TOKEN_TTL";
    /// Refresh token TTL override
    pub const OAUTH_REFRESH_TOKEN_TTL: &str = "OAUTH_REFRESH_TOKEN_TTL";
    /// OAuth storage backend selector ("json")
    pub const OAUTH_STORAGE_TYPE: &str = "OAUTH_STORAGE_TYPE";
    /// OAuth storage directory
    pub const OAUTH_STORAGE_PATH: &str = "OAUTH_STORAGE_PATH";
    /// API key storage path
    pub const API_KEYS_STORAGE: &str = "API_KEYS_STORAGE";
    /// Log level
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    /// HTTP port
    pub const HTTP_PORT: &str = "HTTP_PORT";
    /// Data directory for JSON state files
    pub const DATA_DIR: &str = "DATA_DIR";
    /// Directory for the audit log
    pub const LOG_DIR: &str = "LOG_DIR";
}

/// MCP protocol constants
pub mod protocol {
    /// `JSON-RPC` version (standard, not configurable)
    pub const JSONRPC_VERSION: &str = "2.0";

    /// Supported MCP protocol versions (in preference order)
    pub const SUPPORTED_VERSIONS: &[&str] = &["2025-06-18", "2024-11-05"];

    /// Server version from Cargo.toml
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Server name reported during initialize
    pub const SERVER_NAME: &str = "mcphub-server";

    /// Path suffix the MCP wire surface is mounted under per endpoint
    pub const MOUNT_SUFFIX: &str = "/mcp";
}

/// JSON-RPC error codes
pub mod jsonrpc_errors {
    /// Parse error
    pub const ERROR_PARSE: i32 = -32700;
    /// Invalid request
    pub const ERROR_INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const ERROR_METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const ERROR_INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const ERROR_INTERNAL: i32 = -32603;
    /// Authentication failure (implementation-defined range)
    pub const ERROR_AUTHENTICATION: i32 = -32001;
    /// Rate limit exceeded (implementation-defined range)
    pub const ERROR_RATE_LIMITED: i32 = -32002;
}

/// Default filesystem locations
pub mod paths {
    /// Default data directory for JSON state
    pub const DEFAULT_DATA_DIR: &str = "data";
    /// Default log directory
    pub const DEFAULT_LOG_DIR: &str = "logs";
    /// API key store file name
    pub const API_KEYS_FILE: &str = "api_keys.json";
    /// OAuth client registry file name
    pub const OAUTH_CLIENTS_FILE: &str = "oauth_clients.json";
    /// Authorization code store file name
    pub const OAUTH_CODES_FILE: &str = "oauth_codes.json";
    /// Access token store file name
    pub const OAUTH_ACCESS_TOKENS_FILE: &str = "oauth_access_tokens.json";
    /// Refresh token store file name
    pub const OAUTH_REFRESH_TOKENS_FILE: &str = "oauth_refresh_tokens.json";
}
