// ABOUTME: Health monitoring with rolling per-tenant metrics and alert thresholds
// ABOUTME: Tracks response times and error rates, dispatches plugin health checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Health Monitoring
//!
//! Per-project bounded ring buffers of request metrics, configurable alert
//! thresholds (global and per project), and system-wide aggregates. Health
//! checks dispatch to the upstream plugin's `health_check` and record the
//! outcome like any other request.

use crate::audit::{AuditLogger, LogLevel};
use crate::plugins::SitePlugin;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

/// Individual health metric data point
#[derive(Debug, Clone, Serialize)]
pub struct HealthMetric {
    /// When the request finished
    pub timestamp: DateTime<Utc>,
    /// Project that handled the request
    pub project_id: String,
    /// Wall time in milliseconds
    pub response_time_ms: f64,
    /// Whether the request succeeded
    pub success: bool,
    /// Error message when failed
    pub error_message: Option<String>,
}

/// System-wide metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    /// Seconds since the monitor was constructed
    pub uptime_seconds: f64,
    /// Total recorded requests
    pub total_requests: u64,
    /// Successful requests
    pub successful_requests: u64,
    /// Failed requests
    pub failed_requests: u64,
    /// Mean response time over the recent window
    pub average_response_time_ms: f64,
    /// Failure percentage over all recorded requests
    pub error_rate_percent: f64,
    /// Requests recorded in the last minute
    pub requests_per_minute: u64,
}

/// Health status for one project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectHealthStatus {
    /// Project identifier
    pub project_id: String,
    /// Whether the last check succeeded
    pub healthy: bool,
    /// When the check ran
    pub last_check: DateTime<Utc>,
    /// Wall time of the check in milliseconds
    pub response_time_ms: f64,
    /// Error rate over the recent window
    pub error_rate_percent: f64,
    /// Recent error messages (up to 5)
    pub recent_errors: Vec<String>,
    /// Triggered alert messages
    pub alerts: Vec<String>,
    /// Raw plugin health response
    pub details: Value,
}

/// Aggregate health over all projects
#[derive(Debug, Clone, Serialize)]
pub struct FleetHealth {
    /// When the sweep ran
    pub timestamp: DateTime<Utc>,
    /// "healthy" | "degraded" | "unhealthy"
    pub status: String,
    /// Total projects checked
    pub total_projects: usize,
    /// Healthy project count
    pub healthy: usize,
    /// Unhealthy project count
    pub unhealthy: usize,
    /// All triggered alerts
    pub alerts: Vec<String>,
    /// Per-project statuses
    pub projects: HashMap<String, ProjectHealthStatus>,
}

/// Comparison operator for alert thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Equal
    Eq,
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Needs attention
    Warning,
    /// Needs immediate attention
    Critical,
}

impl Severity {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Alert threshold configuration
#[derive(Debug, Clone, Serialize)]
pub struct AlertThreshold {
    /// Alert name
    pub name: String,
    /// Metric key ("response_time_ms", "error_rate_percent")
    pub metric: String,
    /// Threshold value
    pub threshold: f64,
    /// Comparison applied as `value <cmp> threshold`
    pub comparison: Comparison,
    /// Severity reported when triggered
    pub severity: Severity,
}

impl AlertThreshold {
    /// Whether `value` trips this threshold
    #[must_use]
    pub fn check(&self, value: f64) -> bool {
        match self.comparison {
            Comparison::Gt => value > self.threshold,
            Comparison::Lt => value < self.threshold,
            Comparison::Eq => (value - self.threshold).abs() < f64::EPSILON,
        }
    }
}

/// Metrics summary for one project over a time window
#[derive(Debug, Clone, Serialize)]
pub struct ProjectMetrics {
    /// Project identifier
    pub project_id: String,
    /// Window size in hours
    pub time_window_hours: i64,
    /// Requests in the window
    pub total_requests: usize,
    /// Successful requests
    pub successful_requests: usize,
    /// Failed requests
    pub failed_requests: usize,
    /// Failure percentage
    pub error_rate_percent: f64,
    /// Mean response time
    pub average_response_time_ms: f64,
    /// Fastest response
    pub min_response_time_ms: f64,
    /// Slowest response
    pub max_response_time_ms: f64,
    /// Up to 5 recent error messages
    pub recent_errors: Vec<String>,
}

struct MonitorState {
    metrics_history: HashMap<String, VecDeque<HealthMetric>>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    response_times: VecDeque<f64>,
    request_timestamps: VecDeque<DateTime<Utc>>,
    thresholds: HashMap<String, Vec<AlertThreshold>>,
}

/// Health monitor with rolling metrics and alerting
pub struct HealthMonitor {
    retention_hours: i64,
    max_metrics_per_project: usize,
    state: Mutex<MonitorState>,
    start_instant: Instant,
    start_time: DateTime<Utc>,
    audit: Option<std::sync::Arc<AuditLogger>>,
}

impl HealthMonitor {
    /// Create a monitor with the given retention window and ring size
    #[must_use]
    pub fn new(
        retention_hours: i64,
        max_metrics_per_project: usize,
        audit: Option<std::sync::Arc<AuditLogger>>,
    ) -> Self {
        let mut thresholds: HashMap<String, Vec<AlertThreshold>> = HashMap::new();
        thresholds.insert(
            "global".into(),
            vec![
                AlertThreshold {
                    name: "High Response Time".into(),
                    metric: "response_time_ms".into(),
                    threshold: crate::constants::health::RESPONSE_TIME_CRITICAL_MS,
                    comparison: Comparison::Gt,
                    severity: Severity::Critical,
                },
                AlertThreshold {
                    name: "High Error Rate".into(),
                    metric: "error_rate_percent".into(),
                    threshold: crate::constants::health::ERROR_RATE_WARNING_PCT,
                    comparison: Comparison::Gt,
                    severity: Severity::Warning,
                },
                AlertThreshold {
                    name: "Critical Error Rate".into(),
                    metric: "error_rate_percent".into(),
                    threshold: crate::constants::health::ERROR_RATE_CRITICAL_PCT,
                    comparison: Comparison::Gt,
                    severity: Severity::Critical,
                },
            ],
        );

        Self {
            retention_hours,
            max_metrics_per_project,
            state: Mutex::new(MonitorState {
                metrics_history: HashMap::new(),
                total_requests: 0,
                successful_requests: 0,
                failed_requests: 0,
                response_times: VecDeque::with_capacity(1_000),
                request_timestamps: VecDeque::with_capacity(1_000),
                thresholds,
            }),
            start_instant: Instant::now(),
            start_time: Utc::now(),
            audit,
        }
    }

    /// Monitor with the default retention and ring size
    #[must_use]
    pub fn with_defaults(audit: Option<std::sync::Arc<AuditLogger>>) -> Self {
        Self::new(
            crate::constants::health::RETENTION_HOURS,
            crate::constants::health::MAX_METRICS_PER_PROJECT,
            audit,
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register an alert threshold for a project (or "global")
    pub fn add_alert_threshold(&self, project_id: &str, threshold: AlertThreshold) {
        info!(
            "Added alert threshold '{}' for {project_id}",
            threshold.name
        );
        self.lock()
            .thresholds
            .entry(project_id.to_owned())
            .or_default()
            .push(threshold);
    }

    /// Record one request metric
    pub fn record_request(
        &self,
        project_id: &str,
        response_time_ms: f64,
        success: bool,
        error_message: Option<String>,
    ) {
        let metric = HealthMetric {
            timestamp: Utc::now(),
            project_id: project_id.to_owned(),
            response_time_ms,
            success,
            error_message: error_message.clone(),
        };

        {
            let mut state = self.lock();

            let cutoff = Utc::now() - Duration::hours(self.retention_hours);
            let history = state
                .metrics_history
                .entry(project_id.to_owned())
                .or_default();
            while history.front().is_some_and(|m| m.timestamp < cutoff) {
                history.pop_front();
            }
            while history.len() >= self.max_metrics_per_project {
                history.pop_front();
            }
            history.push_back(metric);

            state.total_requests += 1;
            if success {
                state.successful_requests += 1;
            } else {
                state.failed_requests += 1;
            }

            if state.response_times.len() >= 1_000 {
                state.response_times.pop_front();
            }
            state.response_times.push_back(response_time_ms);

            if state.request_timestamps.len() >= 1_000 {
                state.request_timestamps.pop_front();
            }
            state.request_timestamps.push_back(Utc::now());
        }

        if let Some(ref audit) = self.audit {
            audit.log_system_event(
                "health_metric_recorded",
                Some(&json!({
                    "project_id": project_id,
                    "response_time_ms": response_time_ms,
                    "success": success,
                    "error_message": error_message,
                })),
                LogLevel::Info,
            );
        }
    }

    /// Metrics summary for a project over the last `hours` hours
    #[must_use]
    pub fn project_metrics(&self, project_id: &str, hours: i64) -> ProjectMetrics {
        let state = self.lock();
        let cutoff = Utc::now() - Duration::hours(hours);

        let metrics: Vec<&HealthMetric> = state
            .metrics_history
            .get(project_id)
            .map(|h| h.iter().filter(|m| m.timestamp >= cutoff).collect())
            .unwrap_or_default();

        let total = metrics.len();
        let successful = metrics.iter().filter(|m| m.success).count();
        let failed = total - successful;
        let error_rate = if total > 0 {
            failed as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let times: Vec<f64> = metrics.iter().map(|m| m.response_time_ms).collect();
        let avg = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        let min = if times.is_empty() {
            0.0
        } else {
            times.iter().copied().fold(f64::INFINITY, f64::min)
        };

        let recent_errors: Vec<String> = metrics
            .iter()
            .rev()
            .filter(|m| !m.success)
            .filter_map(|m| m.error_message.clone())
            .take(5)
            .collect();

        ProjectMetrics {
            project_id: project_id.to_owned(),
            time_window_hours: hours,
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            error_rate_percent: error_rate,
            average_response_time_ms: avg,
            min_response_time_ms: min,
            max_response_time_ms: times.iter().copied().fold(0.0, f64::max),
            recent_errors,
        }
    }

    /// Evaluate global and project thresholds against current values
    #[must_use]
    pub fn check_alerts(
        &self,
        project_id: &str,
        response_time_ms: f64,
        error_rate_percent: f64,
    ) -> Vec<String> {
        let state = self.lock();
        let mut alerts = Vec::new();

        let scopes = ["global", project_id];
        for scope in scopes {
            let Some(thresholds) = state.thresholds.get(scope) else {
                continue;
            };
            for threshold in thresholds {
                let value = match threshold.metric.as_str() {
                    "response_time_ms" => response_time_ms,
                    "error_rate_percent" => error_rate_percent,
                    _ => continue,
                };
                if threshold.check(value) {
                    alerts.push(format!(
                        "[{}] {}: {}={value} (threshold: {})",
                        threshold.severity.as_str(),
                        threshold.name,
                        threshold.metric,
                        threshold.threshold
                    ));
                }
            }
        }

        alerts
    }

    /// Run a health check against one project's plugin and record the result
    pub async fn check_project_health(
        &self,
        project_id: &str,
        plugin: &dyn SitePlugin,
    ) -> ProjectHealthStatus {
        let started = Instant::now();

        let outcome = plugin.health_check().await;
        let response_time_ms = started.elapsed().as_secs_f64() * 1_000.0;

        let (healthy, details, error_message) = match outcome {
            Ok(raw) => {
                // String responses may carry JSON; try to parse, else treat
                // as a failure message
                let result = match raw {
                    Value::String(s) => serde_json::from_str::<Value>(&s)
                        .unwrap_or_else(|_| json!({"healthy": false, "message": s.clone()})),
                    other => other,
                };
                let healthy = result.get("healthy").and_then(Value::as_bool).unwrap_or(false)
                    || result.get("success").and_then(Value::as_bool).unwrap_or(false);
                let error = if healthy {
                    None
                } else {
                    result
                        .get("message")
                        .or_else(|| result.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                };
                (healthy, result, error)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Health check failed for {project_id}: {message}");
                (false, json!({"healthy": false, "message": message.clone()}), Some(message))
            }
        };

        self.record_request(project_id, response_time_ms, healthy, error_message.clone());

        let metrics = self.project_metrics(project_id, 1);
        let mut alerts =
            self.check_alerts(project_id, response_time_ms, metrics.error_rate_percent);
        if let Some(ref message) = error_message {
            alerts.push(format!("CRITICAL: Health check failed - {message}"));
        }

        ProjectHealthStatus {
            project_id: project_id.to_owned(),
            healthy,
            last_check: Utc::now(),
            response_time_ms,
            error_rate_percent: metrics.error_rate_percent,
            recent_errors: metrics.recent_errors,
            alerts,
            details,
        }
    }

    /// Check every provided project sequentially and aggregate
    pub async fn check_all_projects_health(
        &self,
        projects: Vec<(String, Box<dyn SitePlugin>)>,
    ) -> FleetHealth {
        let mut statuses = HashMap::new();
        for (project_id, plugin) in &projects {
            let status = self.check_project_health(project_id, plugin.as_ref()).await;
            statuses.insert(project_id.clone(), status);
        }

        let total = statuses.len();
        let healthy = statuses.values().filter(|s| s.healthy).count();
        let unhealthy = total - healthy;

        let alerts: Vec<String> = statuses
            .values()
            .flat_map(|s| s.alerts.iter().cloned())
            .collect();

        let status = if unhealthy == 0 {
            "healthy"
        } else if healthy > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        FleetHealth {
            timestamp: Utc::now(),
            status: status.to_owned(),
            total_projects: total,
            healthy,
            unhealthy,
            alerts,
            projects: statuses,
        }
    }

    /// System-wide metrics snapshot
    #[must_use]
    pub fn system_metrics(&self) -> SystemMetrics {
        let state = self.lock();

        let avg = if state.response_times.is_empty() {
            0.0
        } else {
            state.response_times.iter().sum::<f64>() / state.response_times.len() as f64
        };

        let error_rate = if state.total_requests > 0 {
            state.failed_requests as f64 / state.total_requests as f64 * 100.0
        } else {
            0.0
        };

        let one_minute_ago = Utc::now() - Duration::minutes(1);
        let recent = state
            .request_timestamps
            .iter()
            .filter(|ts| **ts >= one_minute_ago)
            .count() as u64;

        SystemMetrics {
            uptime_seconds: self.start_instant.elapsed().as_secs_f64(),
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            average_response_time_ms: avg,
            error_rate_percent: error_rate,
            requests_per_minute: recent,
        }
    }

    /// Uptime report
    #[must_use]
    pub fn uptime(&self) -> Value {
        let secs = self.start_instant.elapsed().as_secs_f64();
        json!({
            "start_time": self.start_time.to_rfc3339(),
            "current_time": Utc::now().to_rfc3339(),
            "uptime_seconds": secs,
            "uptime_formatted": format_uptime(secs),
        })
    }

    /// Export all metrics to a JSON file; returns the path written
    ///
    /// # Errors
    ///
    /// Returns an error when the export file cannot be written.
    pub fn export_metrics(&self, output_path: &std::path::Path) -> crate::errors::AppResult<()> {
        let project_ids: Vec<String> = {
            let state = self.lock();
            state.metrics_history.keys().cloned().collect()
        };

        let mut projects = serde_json::Map::new();
        for project_id in project_ids {
            let metrics = self.project_metrics(&project_id, self.retention_hours);
            projects.insert(project_id, serde_json::to_value(metrics)?);
        }

        let export = json!({
            "export_time": Utc::now().to_rfc3339(),
            "system_metrics": self.system_metrics(),
            "uptime": self.uptime(),
            "projects": projects,
        });

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output_path, serde_json::to_string_pretty(&export)?)?;
        info!("Metrics exported to {}", output_path.display());
        Ok(())
    }

    /// Reset all metrics (use with caution)
    pub fn reset_metrics(&self) {
        let mut state = self.lock();
        state.metrics_history.clear();
        state.total_requests = 0;
        state.successful_requests = 0;
        state.failed_requests = 0;
        state.response_times.clear();
        state.request_timestamps.clear();
        warn!("All health metrics have been reset");
    }
}

fn format_uptime(seconds: f64) -> String {
    let total = seconds as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{secs}s"));
    parts.join(" ")
}
