// ABOUTME: Append-only JSONL audit log with size-based rotation and redaction
// ABOUTME: Records tool calls, authentication attempts, and system events with queries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Audit Logging
//!
//! Structured audit trail for every gateway operation. One JSON object per
//! newline-terminated line; entries are never mutated after write, only
//! appended and rotated. Sensitive values in nested maps are redacted
//! before they reach disk. Logging failures never propagate to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Informational
    #[serde(rename = "INFO")]
    Info,
    /// Something suspicious but recoverable
    #[serde(rename = "WARNING")]
    Warning,
    /// An operation failed
    #[serde(rename = "ERROR")]
    Error,
    /// Security-relevant failure (e.g. credential reuse)
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl LogLevel {
    /// Wire form of the level
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Types of audited events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A tool invocation
    ToolCall,
    /// An authentication attempt
    Authentication,
    /// A health check
    HealthCheck,
    /// An error event
    Error,
    /// A system event
    System,
}

impl EventType {
    /// Wire form of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolCall => "tool_call",
            Self::Authentication => "authentication",
            Self::HealthCheck => "health_check",
            Self::Error => "error",
            Self::System => "system",
        }
    }
}

/// Key substrings whose values are redacted in logged maps
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "app_password",
    "token",
    "api_key",
    "secret",
    "credential",
    "auth",
    "private_key",
    "access_token",
    "refresh_token",
];

/// Recursively replace values under sensitive keys with `"[REDACTED]"`
#[must_use]
pub fn redact_sensitive(data: &Value) -> Value {
    match data {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let lower = key.to_lowercase();
                if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                    out.insert(key.clone(), Value::String("[REDACTED]".into()));
                } else {
                    out.insert(key.clone(), redact_sensitive(value));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive).collect()),
        other => other.clone(),
    }
}

/// Filters for querying the audit log
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Filter by event type
    pub event_type: Option<EventType>,
    /// Entries at or after this time
    pub start_time: Option<DateTime<Utc>>,
    /// Entries at or before this time
    pub end_time: Option<DateTime<Utc>>,
    /// Filter by level
    pub level: Option<LogLevel>,
    /// Filter by project id
    pub project_id: Option<String>,
    /// Filter by tool name
    pub tool_name: Option<String>,
    /// Only entries with the given success flag
    pub success_only: Option<bool>,
    /// Maximum entries to return
    pub limit: usize,
}

impl AuditQuery {
    /// Query with a result limit and no filters
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    fn matches(&self, entry: &Map<String, Value>) -> bool {
        if let Some(et) = self.event_type {
            if entry.get("event_type").and_then(Value::as_str) != Some(et.as_str()) {
                return false;
            }
        }
        if let Some(level) = self.level {
            if entry.get("level").and_then(Value::as_str) != Some(level.as_str()) {
                return false;
            }
        }
        if let Some(ref project) = self.project_id {
            if entry.get("project_id").and_then(Value::as_str) != Some(project.as_str()) {
                return false;
            }
        }
        if let Some(ref tool) = self.tool_name {
            if entry.get("tool_name").and_then(Value::as_str) != Some(tool.as_str()) {
                return false;
            }
        }
        if let Some(success) = self.success_only {
            if entry.get("success").and_then(Value::as_bool) != Some(success) {
                return false;
            }
        }
        if self.start_time.is_some() || self.end_time.is_some() {
            let Some(ts) = entry
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc))
            else {
                return false;
            };
            if self.start_time.is_some_and(|start| ts < start) {
                return false;
            }
            if self.end_time.is_some_and(|end| ts > end) {
                return false;
            }
        }
        true
    }
}

/// Audit log statistics
#[derive(Debug, Clone, Serialize)]
pub struct AuditStatistics {
    /// Total entries inspected
    pub total_entries: usize,
    /// Entry counts by event type
    pub by_type: HashMap<String, usize>,
    /// Entry counts by level
    pub by_level: HashMap<String, usize>,
    /// Success percentage among entries carrying a `success` flag
    pub success_rate: f64,
    /// Current log file size in bytes
    pub log_file_bytes: u64,
}

/// JSONL audit logger with size-based rotation
pub struct AuditLogger {
    log_file: Option<PathBuf>,
    log_dir: PathBuf,
    max_file_bytes: u64,
    backup_count: u32,
    // Serializes the size-check + append sequence
    write_lock: Mutex<()>,
}

impl AuditLogger {
    /// Create a logger writing to `log_dir/audit.log`.
    ///
    /// On permission errors, falls back to a temp directory; if that also
    /// fails, file logging is disabled and appends become no-ops.
    #[must_use]
    pub fn new(log_dir: impl Into<PathBuf>, max_file_bytes: u64, backup_count: u32) -> Self {
        let mut log_dir: PathBuf = log_dir.into();

        if let Err(e) = fs::create_dir_all(&log_dir) {
            warn!(
                "Cannot create log directory {}: {e}, using temp dir",
                log_dir.display()
            );
            log_dir = std::env::temp_dir().join("logs");
        }

        let log_file = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let path = log_dir.join(crate::constants::audit::LOG_FILE);
                info!("Audit logger initialized: {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Cannot create any log directory: {e}, audit file logging disabled");
                None
            }
        };

        Self {
            log_file,
            log_dir,
            max_file_bytes,
            backup_count,
            write_lock: Mutex::new(()),
        }
    }

    /// Create a logger with the default rotation thresholds
    #[must_use]
    pub fn with_defaults(log_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            log_dir,
            crate::constants::audit::MAX_FILE_BYTES,
            crate::constants::audit::BACKUP_COUNT,
        )
    }

    /// Rotate when the current file is at or past the size limit:
    /// audit.log -> audit.log.1 -> audit.log.2 ... dropping past backup_count.
    fn rotate_if_needed(&self, log_file: &PathBuf) {
        let Ok(meta) = fs::metadata(log_file) else {
            return;
        };
        if meta.len() < self.max_file_bytes {
            return;
        }

        let name = crate::constants::audit::LOG_FILE;
        for i in (1..self.backup_count).rev() {
            let old = self.log_dir.join(format!("{name}.{i}"));
            let new = self.log_dir.join(format!("{name}.{}", i + 1));
            if old.exists() {
                if new.exists() {
                    let _ = fs::remove_file(&new);
                }
                let _ = fs::rename(&old, &new);
            }
        }

        let backup = self.log_dir.join(format!("{name}.1"));
        if backup.exists() {
            let _ = fs::remove_file(&backup);
        }
        if fs::rename(log_file, &backup).is_ok() {
            info!("Audit log rotated: {}", log_file.display());
        }
    }

    /// Append one entry as a newline-terminated JSON line. Errors are logged
    /// and swallowed; audit failures never break request handling.
    fn write_entry(&self, entry: &Value) {
        let Some(ref log_file) = self.log_file else {
            return;
        };

        let _guard = match self.write_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        self.rotate_if_needed(log_file);

        let result = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .and_then(|mut f| {
                // serde_json preserves non-ASCII characters as-is
                let line = serde_json::to_string(entry).unwrap_or_else(|_| "{}".into());
                f.write_all(line.as_bytes())?;
                f.write_all(b"\n")
            });

        if let Err(e) = result {
            error!("Failed to write audit log: {e}");
        }
    }

    /// Log a tool call
    #[allow(clippy::too_many_arguments)]
    pub fn log_tool_call(
        &self,
        tool_name: &str,
        site: Option<&str>,
        project_id: Option<&str>,
        params: Option<&Value>,
        error: Option<&str>,
        duration_ms: Option<u64>,
        key_id: Option<&str>,
    ) {
        let level = if error.is_some() {
            LogLevel::Error
        } else {
            LogLevel::Info
        };
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": EventType::ToolCall.as_str(),
            "level": level.as_str(),
            "tool_name": tool_name,
            "site": site,
            "project_id": project_id,
            "params": params.map(redact_sensitive),
            "error": error,
            "duration_ms": duration_ms,
            "key_id": key_id,
            "success": error.is_none(),
        });
        self.write_entry(&entry);
    }

    /// Log an authentication attempt
    pub fn log_authentication(
        &self,
        success: bool,
        project_id: Option<&str>,
        reason: Option<&str>,
        client_ip: Option<&str>,
    ) {
        let level = if success {
            LogLevel::Info
        } else {
            LogLevel::Warning
        };
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": EventType::Authentication.as_str(),
            "level": level.as_str(),
            "success": success,
            "project_id": project_id,
            "reason": reason,
            "ip_address": client_ip,
        });
        self.write_entry(&entry);
    }

    /// Log an error event
    pub fn log_error(&self, error_type: &str, error_message: &str, context: Option<&Value>) {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": EventType::Error.as_str(),
            "level": LogLevel::Error.as_str(),
            "error_type": error_type,
            "error_message": error_message,
            "context": context.map(redact_sensitive),
        });
        self.write_entry(&entry);
    }

    /// Log a security event (always `event_type=error`, caller picks level)
    pub fn log_security_event(&self, event: &str, details: Option<&Value>, level: LogLevel) {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": EventType::Error.as_str(),
            "level": level.as_str(),
            "error_type": "SecurityEvent",
            "error_message": event,
            "context": details.map(redact_sensitive),
        });
        self.write_entry(&entry);
    }

    /// Log a system event
    pub fn log_system_event(&self, event: &str, details: Option<&Value>, level: LogLevel) {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": EventType::System.as_str(),
            "level": level.as_str(),
            "event": event,
            "details": details.map(redact_sensitive),
        });
        self.write_entry(&entry);
    }

    /// Stream the log and return entries matching the query, oldest first
    #[must_use]
    pub fn get_logs(&self, query: &AuditQuery) -> Vec<Value> {
        let Some(ref log_file) = self.log_file else {
            return Vec::new();
        };
        let Ok(file) = fs::File::open(log_file) else {
            return Vec::new();
        };

        let limit = if query.limit == 0 { 100 } else { query.limit };
        let mut results = Vec::new();

        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let Ok(Value::Object(entry)) = serde_json::from_str::<Value>(&line) else {
                warn!(
                    "Invalid JSON in audit log: {}...",
                    line.chars().take(50).collect::<String>()
                );
                continue;
            };
            if query.matches(&entry) {
                results.push(Value::Object(entry));
                if results.len() >= limit {
                    break;
                }
            }
        }

        results
    }

    /// The most recent entries, newest first
    #[must_use]
    pub fn get_recent_entries(&self, limit: usize) -> Vec<Value> {
        let Some(ref log_file) = self.log_file else {
            return Vec::new();
        };
        let Ok(content) = fs::read_to_string(log_file) else {
            return Vec::new();
        };

        content
            .lines()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str::<Value>(l).ok())
            .take(limit)
            .collect()
    }

    /// Derived statistics over recent entries plus the current file size
    #[must_use]
    pub fn get_statistics(&self) -> AuditStatistics {
        let logs = self.get_logs(&AuditQuery::with_limit(10_000));

        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut by_level: HashMap<String, usize> = HashMap::new();
        let mut successful = 0usize;
        let mut with_success = 0usize;

        for entry in &logs {
            let event_type = entry
                .get("event_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            *by_type.entry(event_type.to_owned()).or_insert(0) += 1;

            let level = entry
                .get("level")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            *by_level.entry(level.to_owned()).or_insert(0) += 1;

            if let Some(success) = entry.get("success").and_then(Value::as_bool) {
                with_success += 1;
                if success {
                    successful += 1;
                }
            }
        }

        let success_rate = if with_success > 0 {
            successful as f64 / with_success as f64 * 100.0
        } else {
            0.0
        };

        let log_file_bytes = self
            .log_file
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        AuditStatistics {
            total_entries: logs.len(),
            by_type,
            by_level,
            success_rate,
            log_file_bytes,
        }
    }

    /// Path of the active log file (None when file logging is disabled)
    #[must_use]
    pub fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }
}
