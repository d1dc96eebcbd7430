// ABOUTME: Integration tests for the health monitor
// ABOUTME: Covers metric recording, alert thresholds, plugin checks, aggregates

use mcphub_server::health::{AlertThreshold, Comparison, HealthMonitor, Severity};
use mcphub_server::plugins::{PluginError, SitePlugin};
use serde_json::{json, Map, Value};

struct HealthyPlugin;

#[async_trait::async_trait]
impl SitePlugin for HealthyPlugin {
    async fn call(&self, _method: &str, _args: Map<String, Value>) -> Result<Value, PluginError> {
        Ok(json!("ok"))
    }

    async fn health_check(&self) -> Result<Value, PluginError> {
        Ok(json!({"healthy": true, "status_code": 200}))
    }
}

struct FailingPlugin;

#[async_trait::async_trait]
impl SitePlugin for FailingPlugin {
    async fn call(&self, _method: &str, _args: Map<String, Value>) -> Result<Value, PluginError> {
        Err(PluginError::Upstream("down".into()))
    }

    async fn health_check(&self) -> Result<Value, PluginError> {
        Err(PluginError::Upstream("connection refused".into()))
    }
}

/// Responds with a JSON string body, which the monitor must parse
struct StringyPlugin;

#[async_trait::async_trait]
impl SitePlugin for StringyPlugin {
    async fn call(&self, _method: &str, _args: Map<String, Value>) -> Result<Value, PluginError> {
        Ok(json!("ok"))
    }

    async fn health_check(&self) -> Result<Value, PluginError> {
        Ok(Value::String("{\"healthy\": true}".into()))
    }
}

#[test]
fn test_record_and_project_metrics() {
    let monitor = HealthMonitor::with_defaults(None);

    monitor.record_request("wordpress_site1", 100.0, true, None);
    monitor.record_request("wordpress_site1", 300.0, true, None);
    monitor.record_request("wordpress_site1", 200.0, false, Some("timeout".into()));

    let metrics = monitor.project_metrics("wordpress_site1", 1);
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.successful_requests, 2);
    assert_eq!(metrics.failed_requests, 1);
    assert!((metrics.error_rate_percent - 33.33).abs() < 0.1);
    assert!((metrics.average_response_time_ms - 200.0).abs() < 0.01);
    assert!((metrics.min_response_time_ms - 100.0).abs() < 0.01);
    assert!((metrics.max_response_time_ms - 300.0).abs() < 0.01);
    assert_eq!(metrics.recent_errors, vec!["timeout".to_owned()]);
}

#[test]
fn test_ring_buffer_caps_per_project() {
    let monitor = HealthMonitor::new(24, 10, None);
    for i in 0..50 {
        monitor.record_request("p", f64::from(i), true, None);
    }
    let metrics = monitor.project_metrics("p", 24);
    assert_eq!(metrics.total_requests, 10);
}

#[test]
fn test_default_thresholds_fire() {
    let monitor = HealthMonitor::with_defaults(None);

    // Slow response trips the critical response-time threshold
    let alerts = monitor.check_alerts("p", 6_000.0, 0.0);
    assert!(alerts.iter().any(|a| a.contains("[CRITICAL]") && a.contains("High Response Time")));

    // 15% error rate trips the warning but not the critical threshold
    let alerts = monitor.check_alerts("p", 10.0, 15.0);
    assert!(alerts.iter().any(|a| a.contains("[WARNING]") && a.contains("High Error Rate")));
    assert!(!alerts.iter().any(|a| a.contains("Critical Error Rate")));

    // 30% trips both error-rate thresholds
    let alerts = monitor.check_alerts("p", 10.0, 30.0);
    assert!(alerts.iter().any(|a| a.contains("Critical Error Rate")));
}

#[test]
fn test_project_specific_threshold() {
    let monitor = HealthMonitor::with_defaults(None);
    monitor.add_alert_threshold(
        "wordpress_site1",
        AlertThreshold {
            name: "Tight Latency".into(),
            metric: "response_time_ms".into(),
            threshold: 100.0,
            comparison: Comparison::Gt,
            severity: Severity::Info,
        },
    );

    let alerts = monitor.check_alerts("wordpress_site1", 150.0, 0.0);
    assert!(alerts.iter().any(|a| a.contains("Tight Latency")));

    // Other projects are unaffected
    let alerts = monitor.check_alerts("gitea_main", 150.0, 0.0);
    assert!(!alerts.iter().any(|a| a.contains("Tight Latency")));
}

#[tokio::test]
async fn test_check_project_health_success() {
    let monitor = HealthMonitor::with_defaults(None);
    let status = monitor.check_project_health("wordpress_site1", &HealthyPlugin).await;

    assert!(status.healthy);
    assert_eq!(status.project_id, "wordpress_site1");
    assert!(status.alerts.is_empty());
    assert_eq!(status.details["status_code"], 200);
}

#[tokio::test]
async fn test_check_project_health_failure_records_metric() {
    let monitor = HealthMonitor::with_defaults(None);
    let status = monitor.check_project_health("gitea_main", &FailingPlugin).await;

    assert!(!status.healthy);
    assert!(status
        .alerts
        .iter()
        .any(|a| a.contains("CRITICAL: Health check failed")));

    let metrics = monitor.project_metrics("gitea_main", 1);
    assert_eq!(metrics.failed_requests, 1);
}

#[tokio::test]
async fn test_string_health_response_is_parsed() {
    let monitor = HealthMonitor::with_defaults(None);
    let status = monitor.check_project_health("p", &StringyPlugin).await;
    assert!(status.healthy);
}

#[tokio::test]
async fn test_fleet_aggregation() {
    let monitor = HealthMonitor::with_defaults(None);

    let fleet = monitor
        .check_all_projects_health(vec![
            ("wordpress_site1".to_owned(), Box::new(HealthyPlugin) as Box<dyn SitePlugin>),
            ("gitea_main".to_owned(), Box::new(FailingPlugin) as Box<dyn SitePlugin>),
        ])
        .await;

    assert_eq!(fleet.status, "degraded");
    assert_eq!(fleet.total_projects, 2);
    assert_eq!(fleet.healthy, 1);
    assert_eq!(fleet.unhealthy, 1);

    let all_healthy = monitor
        .check_all_projects_health(vec![(
            "wordpress_site1".to_owned(),
            Box::new(HealthyPlugin) as Box<dyn SitePlugin>,
        )])
        .await;
    assert_eq!(all_healthy.status, "healthy");

    let all_down = monitor
        .check_all_projects_health(vec![(
            "gitea_main".to_owned(),
            Box::new(FailingPlugin) as Box<dyn SitePlugin>,
        )])
        .await;
    assert_eq!(all_down.status, "unhealthy");
}

#[test]
fn test_system_metrics_and_reset() {
    let monitor = HealthMonitor::with_defaults(None);
    monitor.record_request("a", 50.0, true, None);
    monitor.record_request("b", 150.0, false, Some("x".into()));

    let metrics = monitor.system_metrics();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.failed_requests, 1);
    assert!((metrics.average_response_time_ms - 100.0).abs() < 0.01);
    assert!((metrics.error_rate_percent - 50.0).abs() < 0.01);
    assert_eq!(metrics.requests_per_minute, 2);

    monitor.reset_metrics();
    let metrics = monitor.system_metrics();
    assert_eq!(metrics.total_requests, 0);
}

#[test]
fn test_export_metrics_writes_file() {
    let monitor = HealthMonitor::with_defaults(None);
    monitor.record_request("wordpress_site1", 42.0, true, None);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("metrics_export.json");
    monitor.export_metrics(&path).unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(exported["projects"]["wordpress_site1"].is_object());
    assert_eq!(exported["system_metrics"]["total_requests"], 1);
}
