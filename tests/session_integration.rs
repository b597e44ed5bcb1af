//! Session manager integration tests: bounded histories, persistence
//! format, and lifecycle acks.

use collegue::models::{
    MAX_CODE_HISTORY, MAX_CONVERSATION_HISTORY, MAX_SESSION_EXECUTIONS, PERSISTED_CONTENT_LIMIT,
    TRUNCATION_MARKER,
};
use collegue::SessionManager;
use serde_json::{json, Map, Value};

#[test]
fn create_rejects_duplicate_session() {
    let manager = SessionManager::new();
    assert!(manager.create_context("session-1", None).is_some());
    assert!(manager.create_context("session-1", None).is_none());
}

#[test]
fn histories_stay_bounded_under_load() {
    let manager = SessionManager::new();
    manager.create_context("s", None);

    for i in 0..40 {
        manager.add_code_to_context("s", &format!("snippet {i}"), Some("python"), None, None);
        manager.add_message_to_context("s", "user", &format!("message {i}"), None);
        manager.add_execution_to_context("s", "secret_scan", json!({}), json!({"clean": true}));
    }

    let context = manager.get_context("s").expect("context");
    assert_eq!(context.code_history.len(), MAX_CODE_HISTORY);
    assert_eq!(context.conversation_history.len(), MAX_CONVERSATION_HISTORY);
    assert_eq!(context.execution_history.len(), MAX_SESSION_EXECUTIONS);

    // Eviction is oldest-first.
    assert_eq!(context.code_history[0].code, "snippet 20");
    assert_eq!(context.conversation_history[0].content, "message 10");
}

#[test]
fn metadata_updates_merge() {
    let manager = SessionManager::new();
    let mut initial = Map::new();
    initial.insert("project".to_string(), json!("demo"));
    manager.create_context("s", Some(initial));

    let mut update = Map::new();
    update.insert("branch".to_string(), json!("main"));
    manager.update_context_metadata("s", update);

    let context = manager.get_context("s").expect("context");
    assert_eq!(context.metadata.get("project"), Some(&json!("demo")));
    assert_eq!(context.metadata.get("branch"), Some(&json!("main")));
}

#[test]
fn persisted_file_truncates_large_open_file_content() {
    // Spec boundary: a 5 KB open-file content is stored truncated to
    // 1024 chars plus the marker.
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = SessionManager::with_storage_dir(dir.path());
    manager.create_context("s", None);

    let big = "a".repeat(5 * 1024);
    manager.add_file_to_context("s", "big.py", Some("python"), Some(&big), true);

    let path = dir.path().join("s.json");
    assert!(path.exists());
    let raw = std::fs::read_to_string(&path).expect("read");
    let parsed: Value = serde_json::from_str(&raw).expect("valid JSON document");

    let stored = parsed["open_files"][0]["content"]
        .as_str()
        .expect("content");
    assert!(stored.ends_with(TRUNCATION_MARKER));
    assert_eq!(
        stored.chars().count(),
        PERSISTED_CONTENT_LIMIT + TRUNCATION_MARKER.chars().count()
    );
}

#[test]
fn sessions_reload_from_disk_and_delete_removes_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let manager = SessionManager::with_storage_dir(dir.path());
        manager.create_context("persisted", None);
        manager.set_language_context("persisted", "python", Some("3.12"), None);
        manager.add_dependency_to_context("persisted", "fastapi", Some("0.110"), None);
    }

    let manager = SessionManager::with_storage_dir(dir.path());
    assert!(manager.list_sessions().contains(&"persisted".to_string()));

    let context = manager.get_context("persisted").expect("reloaded");
    assert_eq!(
        context.language_context.as_ref().map(|lc| lc.language.as_str()),
        Some("python")
    );
    assert!(context.dependencies.contains_key("fastapi"));

    assert!(manager.delete_context("persisted"));
    assert!(!dir.path().join("persisted.json").exists());
    assert!(manager.get_context("persisted").is_none());
}

#[test]
fn summary_reports_counts_without_histories() {
    let manager = SessionManager::new();
    manager.create_context("s", None);
    manager.add_code_to_context("s", "x = 1", Some("python"), Some("app.py"), None);
    manager.add_message_to_context("s", "user", "hello", None);

    let summary = manager.get_session_summary("s").expect("summary");
    assert_eq!(summary.session_id, "s");
    assert_eq!(summary.code_history_count, 1);
    assert_eq!(summary.conversation_history_count, 1);
    assert_eq!(summary.open_files_count, 1);
    assert_eq!(summary.current_file.as_deref(), Some("app.py"));
}
