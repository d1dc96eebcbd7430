// ABOUTME: Environment-based server configuration loading and validation
// ABOUTME: Collects ports, directories, token TTLs, and rate limits into one struct
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! Server configuration assembled from environment variables.
//!
//! The gateway is configured exclusively through the environment; there is
//! no configuration file. Tenant discovery reads its own
//! `{PLUGIN_TYPE}_{SITE_ID}_{KEY}` variables separately (see
//! [`crate::site_registry`]).

use crate::constants::{env_names, paths, ttl};
use crate::errors::{AppError, AppResult};
use std::env;
use std::path::PathBuf;

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Directory for JSON state files (api keys, oauth records)
    pub data_dir: PathBuf,
    /// Directory for the audit log
    pub log_dir: PathBuf,
    /// OAuth/JWT configuration
    pub oauth: OAuthConfig,
}

/// OAuth authorization server configuration
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// JWT signing secret; generated at startup when unset
    pub jwt_secret: Option<String>,
    /// JWT algorithm name (only HS256 is supported)
    pub jwt_algorithm: String,
    /// Access token TTL in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token TTL in seconds
    pub refresh_token_ttl_secs: u64,
    /// Storage backend ("json")
    pub storage_type: String,
    /// Storage directory for OAuth JSON files
    pub storage_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable fails to parse or an unknown
    /// OAuth storage backend is requested.
    pub fn from_env() -> AppResult<Self> {
        let http_port = parse_env_u64(env_names::HTTP_PORT, 8000)?;
        let http_port = u16::try_from(http_port)
            .map_err(|_| AppError::config_error(format!("HTTP_PORT out of range: {http_port}")))?;

        let data_dir = env::var(env_names::DATA_DIR)
            .map_or_else(|_| PathBuf::from(paths::DEFAULT_DATA_DIR), PathBuf::from);
        let log_dir = env::var(env_names::LOG_DIR)
            .map_or_else(|_| PathBuf::from(paths::DEFAULT_LOG_DIR), PathBuf::from);

        let oauth = OAuthConfig::from_env(&data_dir)?;

        Ok(Self {
            http_port,
            data_dir,
            log_dir,
            oauth,
        })
    }
}

impl OAuthConfig {
    /// Load OAuth configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns an error on unparsable TTLs or an unsupported storage type.
    pub fn from_env(default_data_dir: &std::path::Path) -> AppResult<Self> {
        let storage_type =
            env::var(env_names::OAUTH_STORAGE_TYPE).unwrap_or_else(|_| "json".into());
        if storage_type != "json" {
            return Err(AppError::config_error(format!(
                "Unknown OAuth storage type: {storage_type}"
            )));
        }

        let storage_path = env::var(env_names::OAUTH_STORAGE_PATH)
            .map_or_else(|_| default_data_dir.to_path_buf(), PathBuf::from);

        Ok(Self {
            jwt_secret: env::var(env_names::OAUTH_JWT_SECRET_KEY).ok(),
            jwt_algorithm: env::var(env_names::OAUTH_JWT_ALGORITHM)
                .unwrap_or_else(|_| "HS256".into()),
            access_token_ttl_secs: parse_env_u64(
                env_names::OAUTH_ACCESS_TOKEN_TTL,
                ttl::ACCESS_TOKEN_SECS,
            )?,
            refresh_token_ttl_secs: parse_env_u64(
                env_names::OAUTH_REFRESH_TOKEN_TTL,
                ttl::REFRESH_TOKEN_SECS,
            )?,
            storage_type,
            storage_path,
        })
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| AppError::config_error(format!("{name} must be a number, got: {raw}"))),
        Err(_) => Ok(default),
    }
}
