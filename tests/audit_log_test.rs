// ABOUTME: Integration tests for the JSONL audit log
// ABOUTME: Covers append format, redaction, rotation, queries, and statistics

use mcphub_server::audit::{
    redact_sensitive, AuditLogger, AuditQuery, EventType, LogLevel,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn logger() -> (AuditLogger, TempDir) {
    let dir = TempDir::new().unwrap();
    let logger = AuditLogger::with_defaults(dir.path());
    (logger, dir)
}

#[test]
fn test_entries_are_json_lines() {
    let (logger, _dir) = logger();

    logger.log_tool_call(
        "wordpress_list_posts",
        Some("site1"),
        Some("wordpress_site1"),
        None,
        None,
        Some(42),
        Some("key_abc"),
    );
    logger.log_authentication(true, Some("wordpress_site1"), None, Some("10.0.0.1"));

    let content = std::fs::read_to_string(logger.log_path().unwrap()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);

    for line in &lines {
        let entry: Value = serde_json::from_str(line).unwrap();
        assert!(entry.get("timestamp").is_some());
        assert!(entry.get("event_type").is_some());
        assert!(entry.get("level").is_some());
    }

    let first: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["event_type"], "tool_call");
    assert_eq!(first["level"], "INFO");
    assert_eq!(first["success"], true);
    assert_eq!(first["duration_ms"], 42);
}

#[test]
fn test_failed_tool_call_is_error_level() {
    let (logger, _dir) = logger();
    logger.log_tool_call(
        "gitea_create_issue",
        None,
        None,
        None,
        Some("upstream timed out"),
        Some(900),
        None,
    );

    let entries = logger.get_recent_entries(1);
    assert_eq!(entries[0]["level"], "ERROR");
    assert_eq!(entries[0]["success"], false);
}

#[test]
fn test_redaction_is_recursive_and_case_insensitive() {
    let data = json!({
        "username": "admin",
        "app_password": "hunter2",
        "API_KEY": "cmp_secret",
        "nested": {
            "Refresh_Token": "rt_xyz",
            "count": 3
        },
        "items": [{"auth": "basic abc"}]
    });

    let redacted = redact_sensitive(&data);
    assert_eq!(redacted["username"], "admin");
    assert_eq!(redacted["app_password"], "[REDACTED]");
    assert_eq!(redacted["API_KEY"], "[REDACTED]");
    assert_eq!(redacted["nested"]["Refresh_Token"], "[REDACTED]");
    assert_eq!(redacted["nested"]["count"], 3);
    assert_eq!(redacted["items"][0]["auth"], "[REDACTED]");
}

#[test]
fn test_params_redacted_on_write() {
    let (logger, _dir) = logger();
    logger.log_tool_call(
        "wordpress_create_post",
        None,
        None,
        Some(&json!({"title": "hello", "app_password": "secret"})),
        None,
        None,
        None,
    );

    let content = std::fs::read_to_string(logger.log_path().unwrap()).unwrap();
    assert!(!content.contains("secret"));
    assert!(content.contains("[REDACTED]"));
    assert!(content.contains("hello"));
}

#[test]
fn test_non_ascii_preserved() {
    let (logger, _dir) = logger();
    logger.log_system_event("日本語のイベント", None, LogLevel::Info);

    let content = std::fs::read_to_string(logger.log_path().unwrap()).unwrap();
    assert!(content.contains("日本語のイベント"));
}

#[test]
fn test_rotation_shifts_backups() {
    let dir = TempDir::new().unwrap();
    // Tiny limit so every write rotates once the file has content
    let logger = AuditLogger::new(dir.path(), 256, 3);

    for i in 0..50 {
        logger.log_system_event(&format!("event number {i}"), None, LogLevel::Info);
    }

    assert!(dir.path().join("audit.log").exists());
    assert!(dir.path().join("audit.log.1").exists());
    // Never more backups than configured
    assert!(!dir.path().join("audit.log.4").exists());
}

#[test]
fn test_query_filters() {
    let (logger, _dir) = logger();
    logger.log_tool_call("wordpress_list_posts", None, Some("wordpress_site1"), None, None, None, None);
    logger.log_tool_call("gitea_list_repos", None, Some("gitea_main"), None, Some("boom"), None, None);
    logger.log_authentication(false, None, Some("bad key"), None);
    logger.log_system_event("startup", None, LogLevel::Info);

    let tool_calls = logger.get_logs(&AuditQuery {
        event_type: Some(EventType::ToolCall),
        limit: 10,
        ..AuditQuery::default()
    });
    assert_eq!(tool_calls.len(), 2);

    let failures = logger.get_logs(&AuditQuery {
        event_type: Some(EventType::ToolCall),
        success_only: Some(false),
        limit: 10,
        ..AuditQuery::default()
    });
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["tool_name"], "gitea_list_repos");

    let by_project = logger.get_logs(&AuditQuery {
        project_id: Some("wordpress_site1".into()),
        limit: 10,
        ..AuditQuery::default()
    });
    assert_eq!(by_project.len(), 1);

    let warnings = logger.get_logs(&AuditQuery {
        level: Some(LogLevel::Warning),
        limit: 10,
        ..AuditQuery::default()
    });
    assert_eq!(warnings.len(), 1);
}

#[test]
fn test_query_respects_limit() {
    let (logger, _dir) = logger();
    for i in 0..20 {
        logger.log_system_event(&format!("event {i}"), None, LogLevel::Info);
    }

    let limited = logger.get_logs(&AuditQuery::with_limit(5));
    assert_eq!(limited.len(), 5);
}

#[test]
fn test_recent_entries_newest_first() {
    let (logger, _dir) = logger();
    logger.log_system_event("first", None, LogLevel::Info);
    logger.log_system_event("second", None, LogLevel::Info);
    logger.log_system_event("third", None, LogLevel::Info);

    let recent = logger.get_recent_entries(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["event"], "third");
    assert_eq!(recent[1]["event"], "second");
}

#[test]
fn test_statistics() {
    let (logger, _dir) = logger();
    logger.log_tool_call("a_tool", None, None, None, None, None, None);
    logger.log_tool_call("a_tool", None, None, None, Some("err"), None, None);
    logger.log_system_event("boot", None, LogLevel::Info);

    let stats = logger.get_statistics();
    assert_eq!(stats.total_entries, 3);
    assert_eq!(stats.by_type["tool_call"], 2);
    assert_eq!(stats.by_type["system"], 1);
    // One success out of two entries carrying a success flag
    assert!((stats.success_rate - 50.0).abs() < 0.01);
    assert!(stats.log_file_bytes > 0);
}

#[test]
fn test_log_error_entry() {
    let (logger, _dir) = logger();
    logger.log_error(
        "ValidationError",
        "site parameter is required",
        Some(&json!({"tool": "wordpress_list_posts", "api_key": "cmp_x"})),
    );

    let entries = logger.get_logs(&AuditQuery {
        event_type: Some(EventType::Error),
        limit: 10,
        ..AuditQuery::default()
    });
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["error_type"], "ValidationError");
    assert_eq!(entries[0]["level"], "ERROR");
    // Context is redacted on the way in
    assert_eq!(entries[0]["context"]["api_key"], "[REDACTED]");
}

#[test]
fn test_security_event_is_critical_error() {
    let (logger, _dir) = logger();
    logger.log_security_event(
        "SECURITY: Refresh token reuse detected: client-1",
        Some(&json!({"client_id": "client-1"})),
        LogLevel::Critical,
    );

    let entries = logger.get_logs(&AuditQuery {
        event_type: Some(EventType::Error),
        level: Some(LogLevel::Critical),
        limit: 10,
        ..AuditQuery::default()
    });
    assert_eq!(entries.len(), 1);
    assert!(entries[0]["error_message"]
        .as_str()
        .unwrap()
        .contains("reuse"));
}
