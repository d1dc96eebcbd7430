// ABOUTME: Centralized error handling and error types for the MCPHub gateway
// ABOUTME: Defines error codes, HTTP mapping, and sanitized client responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Unified Error Handling System
//!
//! Standard error types, error codes, and HTTP response formatting shared by
//! every subsystem of the gateway. Auth, rate-limit, and policy failures map
//! to client-visible errors; internal failures are sanitized before leaving
//! the process.

use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication & Authorization
    /// Authentication is required but not provided
    AuthRequired,
    /// Authentication credentials are invalid
    AuthInvalid,
    /// Authentication token has expired
    AuthExpired,
    /// Credential has been revoked
    AuthRevoked,
    /// Caller lacks permission for the requested operation
    PermissionDenied,

    // Rate Limiting
    /// Rate limit has been exceeded
    RateLimitExceeded,

    // Validation
    /// Input validation failed
    InvalidInput,
    /// Required field is missing from request
    MissingRequiredField,

    // Resource Management
    /// Requested resource was not found
    ResourceNotFound,
    /// Resource already exists (conflict)
    ResourceAlreadyExists,

    // Configuration
    /// Configuration error occurred
    ConfigError,

    // Internal Errors
    /// Internal server error
    InternalError,
    /// Persistent storage operation failed
    StorageError,
    /// Serialization/deserialization failed
    SerializationError,
}

impl ErrorCode {
    /// Get the `HTTP` status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput | Self::MissingRequiredField => 400,
            Self::AuthRequired | Self::AuthInvalid => 401,
            Self::AuthExpired | Self::AuthRevoked | Self::PermissionDenied => 403,
            Self::ResourceNotFound => 404,
            Self::ResourceAlreadyExists => 409,
            Self::RateLimitExceeded => 429,
            Self::ConfigError
            | Self::InternalError
            | Self::StorageError
            | Self::SerializationError => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication is required to access this resource",
            Self::AuthInvalid => "The provided authentication credentials are invalid",
            Self::AuthExpired => "The authentication credential has expired",
            Self::AuthRevoked => "The authentication credential has been revoked",
            Self::PermissionDenied => "You do not have permission to perform this action",
            Self::RateLimitExceeded => "Rate limit exceeded. Please slow down your requests",
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing from the request",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ResourceAlreadyExists => "A resource with this identifier already exists",
            Self::ConfigError => "Configuration error encountered",
            Self::InternalError => "An internal server error occurred",
            Self::StorageError => "Storage operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }
}

// Serialize as the variant name so error codes are stable on the wire
impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{self:?}"))
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "AuthRequired" => Ok(Self::AuthRequired),
            "AuthInvalid" => Ok(Self::AuthInvalid),
            "AuthExpired" => Ok(Self::AuthExpired),
            "AuthRevoked" => Ok(Self::AuthRevoked),
            "PermissionDenied" => Ok(Self::PermissionDenied),
            "RateLimitExceeded" => Ok(Self::RateLimitExceeded),
            "InvalidInput" => Ok(Self::InvalidInput),
            "MissingRequiredField" => Ok(Self::MissingRequiredField),
            "ResourceNotFound" => Ok(Self::ResourceNotFound),
            "ResourceAlreadyExists" => Ok(Self::ResourceAlreadyExists),
            "ConfigError" => Ok(Self::ConfigError),
            "InternalError" => Ok(Self::InternalError),
            "StorageError" => Ok(Self::StorageError),
            "SerializationError" => Ok(Self::SerializationError),
            _ => Err(serde::de::Error::unknown_variant(&s, &[])),
        }
    }
}

/// Application error type carried through every fallible core operation
#[derive(Debug, Clone, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the `HTTP` status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Get sanitized message safe for client exposure.
    /// Internal error details are replaced with generic messages.
    #[must_use]
    pub fn sanitized_message(&self) -> String {
        match self.code {
            // Validation and policy errors: message is already safe to expose
            ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::AuthRequired
            | ErrorCode::AuthInvalid
            | ErrorCode::AuthExpired
            | ErrorCode::AuthRevoked
            | ErrorCode::PermissionDenied
            | ErrorCode::RateLimitExceeded
            | ErrorCode::ResourceNotFound
            | ErrorCode::ResourceAlreadyExists => self.message.clone(),
            // Everything else: generic description (storage, config, internal)
            _ => self.code.description().to_owned(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// `HTTP` error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message (sanitized for client)
    pub message: String,
    /// RFC3339 timestamp when the error occurred
    pub timestamp: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        // Log full details internally before sanitizing
        tracing::warn!("API error: {:?}: {}", error.code, error.message);

        Self {
            code: error.code,
            message: error.sanitized_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = http::StatusCode::from_u16(self.code.http_status())
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::Json(ErrorResponse::from(self));
        (status, body).into_response()
    }
}

/// Convenience constructors for common errors
impl AppError {
    /// Authentication required
    #[must_use]
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    /// Invalid authentication
    #[must_use]
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Credential expired
    #[must_use]
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthExpired, message)
    }

    /// Credential revoked
    #[must_use]
    pub fn auth_revoked(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRevoked, message)
    }

    /// Permission denied
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Rate limit exceeded with retry hint
    #[must_use]
    pub fn rate_limit_exceeded(retry_after_seconds: f64) -> Self {
        Self::new(
            ErrorCode::RateLimitExceeded,
            format!("Rate limit exceeded. Retry after {retry_after_seconds:.0} seconds"),
        )
    }

    /// Resource not found
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        let resource_str = resource.into();
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{resource_str} not found"),
        )
    }

    /// Resource already exists
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceAlreadyExists, message)
    }

    /// Invalid input
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Configuration error
    #[must_use]
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Internal server error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Storage error
    #[must_use]
    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Serialization error
    #[must_use]
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::storage_error(err.to_string())
    }
}
