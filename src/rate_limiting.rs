// ABOUTME: Token-bucket rate limiting with per-minute, per-hour, and per-day windows
// ABOUTME: Tracks per-client state and refunds tighter-window tokens on rejection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Multi-Window Rate Limiting
//!
//! Every client gets three token buckets (minute, hour, day). Admission
//! consumes from the tightest window first; when a later window rejects, the
//! tokens already taken from tighter windows are refunded so a rejected
//! request costs nothing. `retry_after` comes from the first failing bucket.
//!
//! State is in-memory only and lives for the process lifetime; the unique
//! caller cardinality is bounded by the deployment.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Requests-per-window limits for one client class
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitConfig {
    /// Requests per minute
    pub per_minute: u32,
    /// Requests per hour
    pub per_hour: u32,
    /// Requests per day
    pub per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: crate::constants::rate_limits::PER_MINUTE,
            per_hour: crate::constants::rate_limits::PER_HOUR,
            per_day: crate::constants::rate_limits::PER_DAY,
        }
    }
}

impl RateLimitConfig {
    /// Load limits from `{PREFIX_}RATE_LIMIT_PER_{MINUTE,HOUR,DAY}` with an
    /// optional prefix (e.g. "WORDPRESS" for per-plugin overrides).
    #[must_use]
    pub fn from_env(prefix: Option<&str>) -> Self {
        let env_prefix = prefix.map_or_else(String::new, |p| format!("{p}_"));
        let read = |suffix: &str, default: u32| {
            std::env::var(format!("{env_prefix}RATE_LIMIT_PER_{suffix}"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Self {
            per_minute: read("MINUTE", crate::constants::rate_limits::PER_MINUTE),
            per_hour: read("HOUR", crate::constants::rate_limits::PER_HOUR),
            per_day: read("DAY", crate::constants::rate_limits::PER_DAY),
        }
    }
}

/// A single token bucket with lazy refill
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum tokens the bucket can hold
    pub capacity: u32,
    /// Tokens added per second
    pub refill_rate: f64,
    /// Currently available tokens
    pub tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket that refills `capacity / window_seconds` per second
    #[must_use]
    pub fn new(capacity: u32, window_seconds: f64) -> Self {
        Self {
            capacity,
            refill_rate: f64::from(capacity) / window_seconds,
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
        }
    }

    /// Refill tokens based on elapsed time; saturates at capacity
    pub fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = f64::from(self.capacity).min(self.tokens + elapsed * self.refill_rate);
        self.last_refill = now;
    }

    /// Attempt to consume `tokens` tokens. Returns false (and leaves the
    /// bucket untouched) when not enough are available.
    pub fn consume(&mut self, tokens: u32) -> bool {
        self.refill();
        let needed = f64::from(tokens);
        if self.tokens >= needed {
            self.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Return one token to the bucket, saturating at capacity
    pub fn refund(&mut self, tokens: u32) {
        self.tokens = f64::from(self.capacity).min(self.tokens + f64::from(tokens));
    }

    /// Currently available tokens (after refill)
    pub fn available_tokens(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    /// Seconds until `tokens` tokens will be available (0 when already there)
    pub fn wait_time(&mut self, tokens: u32) -> f64 {
        self.refill();
        let needed = f64::from(tokens);
        if self.tokens >= needed {
            0.0
        } else {
            (needed - self.tokens) / self.refill_rate
        }
    }
}

/// Rate-limit state for one client
#[derive(Debug)]
pub struct ClientRateLimitState {
    /// Client identifier
    pub client_id: String,
    /// Per-minute bucket
    pub minute_bucket: TokenBucket,
    /// Per-hour bucket
    pub hour_bucket: TokenBucket,
    /// Per-day bucket
    pub day_bucket: TokenBucket,
    /// Total admitted requests
    pub total_requests: u64,
    /// Total rejected requests
    pub rejected_requests: u64,
    /// First time this client was seen
    pub first_seen: DateTime<Utc>,
    /// Most recent request time
    pub last_seen: DateTime<Utc>,
}

impl ClientRateLimitState {
    fn new(client_id: String, config: RateLimitConfig) -> Self {
        let now = Utc::now();
        Self {
            client_id,
            minute_bucket: TokenBucket::new(config.per_minute, 60.0),
            hour_bucket: TokenBucket::new(config.per_hour, 3_600.0),
            day_bucket: TokenBucket::new(config.per_day, 86_400.0),
            total_requests: 0,
            rejected_requests: 0,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Consume one token from each window, tightest first. On failure at a
    /// later window, refund the tokens already taken at earlier windows.
    pub fn check_and_consume(&mut self) -> RateLimitDecision {
        if !self.minute_bucket.consume(1) {
            let retry_after = self.minute_bucket.wait_time(1);
            self.rejected_requests += 1;
            return RateLimitDecision::rejected(
                "Rate limit exceeded: too many requests per minute",
                retry_after,
            );
        }

        if !self.hour_bucket.consume(1) {
            let retry_after = self.hour_bucket.wait_time(1);
            self.minute_bucket.refund(1);
            self.rejected_requests += 1;
            return RateLimitDecision::rejected(
                "Rate limit exceeded: too many requests per hour",
                retry_after,
            );
        }

        if !self.day_bucket.consume(1) {
            let retry_after = self.day_bucket.wait_time(1);
            self.minute_bucket.refund(1);
            self.hour_bucket.refund(1);
            self.rejected_requests += 1;
            return RateLimitDecision::rejected(
                "Rate limit exceeded: daily limit reached",
                retry_after,
            );
        }

        self.total_requests += 1;
        self.last_seen = Utc::now();
        RateLimitDecision::allowed()
    }

    /// Snapshot of this client's counters and remaining tokens
    pub fn stats(&mut self) -> ClientStats {
        ClientStats {
            client_id: self.client_id.clone(),
            total_requests: self.total_requests,
            rejected_requests: self.rejected_requests,
            success_rate: if self.total_requests + self.rejected_requests > 0 {
                self.total_requests as f64 / (self.total_requests + self.rejected_requests) as f64
            } else {
                1.0
            },
            available_tokens: WindowValues {
                per_minute: self.minute_bucket.available_tokens(),
                per_hour: self.hour_bucket.available_tokens(),
                per_day: self.day_bucket.available_tokens(),
            },
            limits: RateLimitConfig {
                per_minute: self.minute_bucket.capacity,
                per_hour: self.hour_bucket.capacity,
                per_day: self.day_bucket.capacity,
            },
            first_seen: self.first_seen,
            last_seen: self.last_seen,
        }
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Rejection reason (empty when allowed)
    pub reason: String,
    /// Seconds to wait before retrying (0 when allowed)
    pub retry_after_seconds: f64,
}

impl RateLimitDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
            retry_after_seconds: 0.0,
        }
    }

    fn rejected(reason: &str, retry_after_seconds: f64) -> Self {
        Self {
            allowed: false,
            reason: reason.to_owned(),
            retry_after_seconds,
        }
    }
}

/// Per-window values in a stats snapshot
#[derive(Debug, Clone, Serialize)]
pub struct WindowValues {
    /// Minute-window value
    pub per_minute: f64,
    /// Hour-window value
    pub per_hour: f64,
    /// Day-window value
    pub per_day: f64,
}

/// Stats snapshot for one client
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    /// Client identifier
    pub client_id: String,
    /// Total admitted requests
    pub total_requests: u64,
    /// Total rejected requests
    pub rejected_requests: u64,
    /// Admitted / (admitted + rejected)
    pub success_rate: f64,
    /// Remaining tokens per window
    pub available_tokens: WindowValues,
    /// Configured capacities
    pub limits: RateLimitConfig,
    /// First request time
    pub first_seen: DateTime<Utc>,
    /// Most recent request time
    pub last_seen: DateTime<Utc>,
}

/// Global limiter stats
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    /// Total requests seen across all clients
    pub total_requests: u64,
    /// Total rejections across all clients
    pub total_rejected: u64,
    /// Rejected / total
    pub rejection_rate: f64,
    /// Number of tracked clients
    pub active_clients: usize,
    /// Seconds since the limiter was constructed
    pub uptime_seconds: f64,
    /// When the limiter was constructed
    pub start_time: DateTime<Utc>,
}

/// Full stats report
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    /// Global counters
    pub global: GlobalStats,
    /// Default limits
    pub default_limits: RateLimitConfig,
    /// Per-plugin overrides
    pub plugin_limits: HashMap<String, RateLimitConfig>,
    /// Per-client snapshots
    pub clients: Vec<ClientStats>,
}

/// Token-bucket rate limiter keyed by client identifier
pub struct RateLimiter {
    clients: DashMap<String, ClientRateLimitState>,
    default_config: RateLimitConfig,
    plugin_configs: std::sync::RwLock<HashMap<String, RateLimitConfig>>,
    total_requests: AtomicU64,
    total_rejected: AtomicU64,
    start_time: SystemTime,
}

impl RateLimiter {
    /// Create a limiter with defaults (and per-plugin overrides) from the
    /// environment.
    #[must_use]
    pub fn from_env(plugin_types: &[&str]) -> Self {
        let default_config = RateLimitConfig::from_env(None);
        let mut plugin_configs = HashMap::new();
        for plugin in plugin_types {
            let prefix = plugin.to_uppercase();
            // Only record an override when at least one variable is set
            let has_override = ["MINUTE", "HOUR", "DAY"]
                .iter()
                .any(|w| std::env::var(format!("{prefix}_RATE_LIMIT_PER_{w}")).is_ok());
            if has_override {
                plugin_configs.insert(
                    (*plugin).to_owned(),
                    RateLimitConfig::from_env(Some(&prefix)),
                );
            }
        }

        info!(
            "Rate limiter initialized with default limits: {}/min, {}/hour, {}/day",
            default_config.per_minute, default_config.per_hour, default_config.per_day
        );

        Self::with_config(default_config, plugin_configs)
    }

    /// Create a limiter with explicit configuration
    #[must_use]
    pub fn with_config(
        default_config: RateLimitConfig,
        plugin_configs: HashMap<String, RateLimitConfig>,
    ) -> Self {
        Self {
            clients: DashMap::new(),
            default_config,
            plugin_configs: std::sync::RwLock::new(plugin_configs),
            total_requests: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            start_time: SystemTime::now(),
        }
    }

    fn config_for(&self, plugin_type: Option<&str>) -> RateLimitConfig {
        plugin_type
            .and_then(|p| {
                self.plugin_configs
                    .read()
                    .ok()
                    .and_then(|m| m.get(p).copied())
            })
            .unwrap_or(self.default_config)
    }

    /// Check whether a request from `client_id` is admitted, consuming
    /// tokens on success. Buckets are created lazily on first sight, sized
    /// by the plugin-specific config when one exists.
    pub fn check_rate_limit(
        &self,
        client_id: &str,
        tool_name: Option<&str>,
        plugin_type: Option<&str>,
    ) -> RateLimitDecision {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let config = self.config_for(plugin_type);
        let mut state = self
            .clients
            .entry(client_id.to_owned())
            .or_insert_with(|| ClientRateLimitState::new(client_id.to_owned(), config));

        let decision = state.check_and_consume();

        let short_id: String = client_id.chars().take(8).collect();
        if decision.allowed {
            debug!("Rate limit check passed for client {short_id}... (tool: {tool_name:?})");
        } else {
            self.total_rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Rate limit exceeded for client {short_id}... (tool: {tool_name:?}, reason: {}, retry_after: {:.1}s)",
                decision.reason, decision.retry_after_seconds
            );
        }

        decision
    }

    /// Stats for one client; None when the client has never been seen
    #[must_use]
    pub fn client_stats(&self, client_id: &str) -> Option<ClientStats> {
        self.clients.get_mut(client_id).map(|mut s| s.stats())
    }

    /// Full limiter report: global counters, configured limits, all clients
    #[must_use]
    pub fn all_stats(&self) -> RateLimiterStats {
        let total = self.total_requests.load(Ordering::Relaxed);
        let rejected = self.total_rejected.load(Ordering::Relaxed);

        let clients: Vec<ClientStats> = self
            .clients
            .iter_mut()
            .map(|mut entry| entry.value_mut().stats())
            .collect();

        RateLimiterStats {
            global: GlobalStats {
                total_requests: total,
                total_rejected: rejected,
                rejection_rate: if total > 0 {
                    rejected as f64 / total as f64
                } else {
                    0.0
                },
                active_clients: clients.len(),
                uptime_seconds: self
                    .start_time
                    .elapsed()
                    .unwrap_or_default()
                    .as_secs_f64(),
                start_time: self.start_timestamp(),
            },
            default_limits: self.default_config,
            plugin_limits: self
                .plugin_configs
                .read()
                .map(|m| m.clone())
                .unwrap_or_default(),
            clients,
        }
    }

    /// Forget one client's state. Returns false when unknown.
    pub fn reset_client(&self, client_id: &str) -> bool {
        let removed = self.clients.remove(client_id).is_some();
        if removed {
            info!("Reset rate limit state for client: {client_id}");
        }
        removed
    }

    /// Forget all client state and counters. Returns the number of clients
    /// that were tracked.
    pub fn reset_all(&self) -> usize {
        let count = self.clients.len();
        self.clients.clear();
        self.total_requests.store(0, Ordering::Relaxed);
        self.total_rejected.store(0, Ordering::Relaxed);
        info!("Reset rate limit state for {count} clients");
        count
    }

    /// Update (or install) limits for a plugin type. Only affects clients
    /// created after the change.
    pub fn configure_limits(
        &self,
        plugin_type: &str,
        per_minute: Option<u32>,
        per_hour: Option<u32>,
        per_day: Option<u32>,
    ) {
        if let Ok(mut configs) = self.plugin_configs.write() {
            let config = configs
                .entry(plugin_type.to_owned())
                .or_insert(self.default_config);
            if let Some(v) = per_minute {
                config.per_minute = v;
            }
            if let Some(v) = per_hour {
                config.per_hour = v;
            }
            if let Some(v) = per_day {
                config.per_day = v;
            }
            info!(
                "Updated rate limits for {plugin_type}: {}/min, {}/hour, {}/day",
                config.per_minute, config.per_hour, config.per_day
            );
        }
    }

    /// Moment the limiter was constructed, for uptime reporting
    #[must_use]
    pub fn start_timestamp(&self) -> DateTime<Utc> {
        let secs = self
            .start_time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        DateTime::from_timestamp(secs as i64, 0).unwrap_or_else(Utc::now)
    }
}
