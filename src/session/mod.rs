//! Session context management.
//!
//! Keeps per-session conversation, code, and execution histories with
//! bounded sizes. When a storage directory is configured, every mutation
//! mirrors the context to `<dir>/<session_id>.json` (atomic temp-file +
//! rename); persistence is best-effort and never fails the mutation.

use crate::models::{
    iso_timestamp, CodeEntry, DependencyEntry, LanguageContext, Message, OpenFile, SessionContext,
    SessionExecution, SessionSummary, MAX_CODE_HISTORY, MAX_CONVERSATION_HISTORY,
    MAX_SESSION_EXECUTIONS, PERSISTED_CONTENT_LIMIT, TRUNCATION_MARKER,
};
use crate::observability::metrics;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Manages session contexts, in memory and optionally on disk.
#[derive(Debug, Default)]
pub struct SessionManager {
    contexts: Mutex<HashMap<String, SessionContext>>,
    storage_dir: Option<PathBuf>,
}

impl SessionManager {
    /// Creates a manager without persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager that mirrors contexts to `storage_dir`.
    ///
    /// The directory is created if missing; on failure persistence is
    /// disabled and the manager stays memory-only.
    #[must_use]
    pub fn with_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        let storage_dir = storage_dir.into();
        if let Err(err) = std::fs::create_dir_all(&storage_dir) {
            tracing::warn!(
                dir = %storage_dir.display(),
                error = %err,
                "cannot create session storage directory, persistence disabled"
            );
            return Self::new();
        }
        Self {
            contexts: Mutex::new(HashMap::new()),
            storage_dir: Some(storage_dir),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionContext>> {
        self.contexts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Creates a new context. Returns `None` when the session id is taken.
    pub fn create_context(
        &self,
        session_id: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Option<SessionContext> {
        let mut contexts = self.lock();
        if contexts.contains_key(session_id) {
            return None;
        }
        let context = SessionContext::new(session_id, metadata);
        contexts.insert(session_id.to_string(), context.clone());
        drop(contexts);
        self.persist(&context);
        Some(context)
    }

    /// Returns a session context, lazily loading from disk on miss.
    pub fn get_context(&self, session_id: &str) -> Option<SessionContext> {
        {
            let contexts = self.lock();
            if let Some(context) = contexts.get(session_id) {
                return Some(context.clone());
            }
        }
        let loaded = self.load(session_id)?;
        self.lock()
            .entry(session_id.to_string())
            .or_insert(loaded)
            .clone()
            .into()
    }

    /// Applies untyped updates to a context.
    ///
    /// `code_history` and `conversation_history` values *append* (with
    /// eviction to the bounded size); `metadata` merges; every other key
    /// replaces the corresponding field. Unknown keys are ignored with a
    /// log entry.
    pub fn update_context(
        &self,
        session_id: &str,
        updates: Map<String, Value>,
    ) -> Option<SessionContext> {
        self.mutate(session_id, |context| {
            for (key, value) in updates {
                apply_update(context, &key, value);
            }
        })
    }

    /// Adds a code snippet to the session history.
    pub fn add_code_to_context(
        &self,
        session_id: &str,
        code: &str,
        language: Option<&str>,
        file_path: Option<&str>,
        code_type: Option<&str>,
    ) -> Option<SessionContext> {
        // Track the file first so the snippet and the open-file entry agree.
        if let Some(path) = file_path {
            let known = self
                .get_context(session_id)?
                .open_files
                .iter()
                .any(|f| f.path == path);
            if !known {
                self.add_file_to_context(session_id, path, language, None, true)?;
            }
        }
        self.mutate(session_id, |context| {
            push_bounded(
                &mut context.code_history,
                CodeEntry {
                    code: code.to_string(),
                    language: language.map(str::to_string),
                    file_path: file_path.map(str::to_string),
                    code_type: code_type.map(str::to_string),
                    timestamp: iso_timestamp(),
                },
                MAX_CODE_HISTORY,
            );
        })
    }

    /// Adds a conversation message to the session history.
    pub fn add_message_to_context(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Option<SessionContext> {
        self.mutate(session_id, |context| {
            push_bounded(
                &mut context.conversation_history,
                Message {
                    role: role.to_string(),
                    content: content.to_string(),
                    timestamp: iso_timestamp(),
                    metadata: metadata.unwrap_or_default(),
                },
                MAX_CONVERSATION_HISTORY,
            );
        })
    }

    /// Adds or refreshes a tracked file; open files become current.
    pub fn add_file_to_context(
        &self,
        session_id: &str,
        file_path: &str,
        language: Option<&str>,
        content: Option<&str>,
        is_open: bool,
    ) -> Option<SessionContext> {
        self.mutate(session_id, |context| {
            let now = iso_timestamp();
            if let Some(existing) = context.open_files.iter_mut().find(|f| f.path == file_path) {
                if language.is_some() {
                    existing.language = language.map(str::to_string);
                }
                existing.is_open = is_open;
                existing.last_accessed = now;
                if let Some(content) = content {
                    existing.content = Some(content.to_string());
                }
            } else {
                context.open_files.push(OpenFile {
                    path: file_path.to_string(),
                    language: language.map(str::to_string),
                    is_open,
                    content: content.map(str::to_string),
                    first_opened: now.clone(),
                    last_accessed: now,
                });
            }
            if is_open || context.current_file.is_none() {
                context.current_file = Some(file_path.to_string());
            }
        })
    }

    /// Records a tool execution against the session.
    pub fn add_execution_to_context(
        &self,
        session_id: &str,
        tool_name: &str,
        args: Value,
        result: Value,
    ) -> Option<SessionContext> {
        self.mutate(session_id, |context| {
            push_bounded(
                &mut context.execution_history,
                SessionExecution {
                    tool_name: tool_name.to_string(),
                    args,
                    result,
                    timestamp: iso_timestamp(),
                },
                MAX_SESSION_EXECUTIONS,
            );
        })
    }

    /// Sets the project structure snapshot.
    pub fn set_project_structure(
        &self,
        session_id: &str,
        structure: Value,
    ) -> Option<SessionContext> {
        self.mutate(session_id, |context| {
            context.project_structure = Some(structure);
        })
    }

    /// Sets the primary language context.
    pub fn set_language_context(
        &self,
        session_id: &str,
        language: &str,
        version: Option<&str>,
        frameworks: Option<Vec<String>>,
    ) -> Option<SessionContext> {
        self.mutate(session_id, |context| {
            context.language_context = Some(LanguageContext {
                language: language.to_string(),
                version: version.map(str::to_string),
                frameworks: frameworks.unwrap_or_default(),
                updated_at: iso_timestamp(),
            });
        })
    }

    /// Records a project dependency.
    pub fn add_dependency_to_context(
        &self,
        session_id: &str,
        name: &str,
        version: Option<&str>,
        kind: Option<&str>,
    ) -> Option<SessionContext> {
        self.mutate(session_id, |context| {
            context.dependencies.insert(
                name.to_string(),
                DependencyEntry {
                    name: name.to_string(),
                    version: version.map(str::to_string),
                    kind: kind.unwrap_or("package").to_string(),
                    added_at: iso_timestamp(),
                },
            );
        })
    }

    /// Merges metadata into the session context.
    pub fn update_context_metadata(
        &self,
        session_id: &str,
        metadata: Map<String, Value>,
    ) -> Option<SessionContext> {
        self.mutate(session_id, |context| {
            for (key, value) in metadata {
                context.metadata.insert(key, value);
            }
        })
    }

    /// Builds a compact summary of a session.
    pub fn get_session_summary(&self, session_id: &str) -> Option<SessionSummary> {
        self.get_context(session_id)
            .map(|context| SessionSummary::from(&context))
    }

    /// Lists all known session ids, in-memory and persisted.
    pub fn list_sessions(&self) -> Vec<String> {
        let mut sessions: Vec<String> = self.lock().keys().cloned().collect();
        if let Some(dir) = &self.storage_dir {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if let Some(session_id) = name.strip_suffix(".json") {
                        if !sessions.iter().any(|s| s == session_id) {
                            sessions.push(session_id.to_string());
                        }
                    }
                }
            }
        }
        sessions.sort();
        sessions
    }

    /// Deletes a session context and its persisted file.
    pub fn delete_context(&self, session_id: &str) -> bool {
        let removed = self.lock().remove(session_id).is_some();
        if removed {
            if let Some(path) = self.context_path(session_id) {
                if path.exists() {
                    if let Err(err) = std::fs::remove_file(&path) {
                        tracing::warn!(
                            session_id,
                            error = %err,
                            "failed to remove persisted session file"
                        );
                        metrics::record_persistence_error("delete_context");
                    }
                }
            }
        }
        removed
    }

    fn mutate(
        &self,
        session_id: &str,
        apply: impl FnOnce(&mut SessionContext),
    ) -> Option<SessionContext> {
        // Lazy-load before taking the write path.
        let _ = self.get_context(session_id)?;
        let mut contexts = self.lock();
        let context = contexts.get_mut(session_id)?;
        apply(context);
        context.touch();
        let snapshot = context.clone();
        drop(contexts);
        self.persist(&snapshot);
        Some(snapshot)
    }

    fn context_path(&self, session_id: &str) -> Option<PathBuf> {
        self.storage_dir
            .as_ref()
            .map(|dir| dir.join(format!("{session_id}.json")))
    }

    /// Writes the context to disk, truncating open-file contents.
    /// Best-effort: failures are logged and counted, never raised.
    fn persist(&self, context: &SessionContext) {
        let Some(path) = self.context_path(&context.session_id) else {
            return;
        };

        let mut copy = context.clone();
        for file in &mut copy.open_files {
            if let Some(content) = &file.content {
                if content.chars().count() > PERSISTED_CONTENT_LIMIT {
                    let truncated: String = content.chars().take(PERSISTED_CONTENT_LIMIT).collect();
                    file.content = Some(format!("{truncated}{TRUNCATION_MARKER}"));
                }
            }
        }

        if let Err(err) = write_json_atomic(&path, &copy) {
            tracing::warn!(
                session_id = %context.session_id,
                error = %err,
                "failed to persist session context"
            );
            metrics::record_persistence_error("persist_context");
        }
    }

    fn load(&self, session_id: &str) -> Option<SessionContext> {
        let path = self.context_path(session_id)?;
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(context) => Some(context),
            Err(err) => {
                tracing::warn!(session_id, error = %err, "failed to load persisted session");
                metrics::record_persistence_error("load_context");
                None
            }
        }
    }
}

/// Atomic write: temp file in the same directory, then rename.
fn write_json_atomic(path: &Path, value: &SessionContext) -> std::io::Result<()> {
    let serialized = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(serialized.as_bytes())?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn push_bounded<T>(history: &mut Vec<T>, entry: T, limit: usize) {
    history.push(entry);
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(0..excess);
    }
}

/// Applies one untyped update, mirroring the typed mutators.
fn apply_update(context: &mut SessionContext, key: &str, value: Value) {
    match key {
        "code_history" => {
            if let Ok(entry) = serde_json::from_value::<CodeEntry>(value) {
                push_bounded(&mut context.code_history, entry, MAX_CODE_HISTORY);
            }
        }
        "conversation_history" => {
            if let Ok(entry) = serde_json::from_value::<Message>(value) {
                push_bounded(
                    &mut context.conversation_history,
                    entry,
                    MAX_CONVERSATION_HISTORY,
                );
            }
        }
        "metadata" => {
            if let Value::Object(map) = value {
                for (meta_key, meta_value) in map {
                    context.metadata.insert(meta_key, meta_value);
                }
            }
        }
        "current_file" => {
            context.current_file = value.as_str().map(str::to_string);
        }
        "project_structure" => {
            context.project_structure = Some(value);
        }
        "language_context" => {
            context.language_context = serde_json::from_value(value).ok();
        }
        other => {
            tracing::debug!(key = other, "ignoring unknown context update key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_rejects_duplicate() {
        let manager = SessionManager::new();
        assert!(manager.create_context("s1", None).is_some());
        assert!(manager.create_context("s1", None).is_none());
    }

    #[test]
    fn test_code_history_bounded() {
        let manager = SessionManager::new();
        manager.create_context("s1", None);
        for i in 0..25 {
            manager.add_code_to_context("s1", &format!("code {i}"), Some("python"), None, None);
        }
        let context = manager.get_context("s1").expect("context");
        assert_eq!(context.code_history.len(), MAX_CODE_HISTORY);
        assert_eq!(context.code_history[0].code, "code 5");
    }

    #[test]
    fn test_metadata_merges() {
        let manager = SessionManager::new();
        manager.create_context("s1", None);
        let mut first = Map::new();
        first.insert("a".to_string(), json!(1));
        manager.update_context_metadata("s1", first);
        let mut second = Map::new();
        second.insert("b".to_string(), json!(2));
        manager.update_context_metadata("s1", second);

        let context = manager.get_context("s1").expect("context");
        assert_eq!(context.metadata.get("a"), Some(&json!(1)));
        assert_eq!(context.metadata.get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_file_tracking_sets_current() {
        let manager = SessionManager::new();
        manager.create_context("s1", None);
        manager.add_file_to_context("s1", "src/app.py", Some("python"), None, true);
        let context = manager.get_context("s1").expect("context");
        assert_eq!(context.current_file.as_deref(), Some("src/app.py"));
        assert_eq!(context.open_files.len(), 1);

        // Re-adding updates instead of duplicating.
        manager.add_file_to_context("s1", "src/app.py", None, Some("content"), false);
        let context = manager.get_context("s1").expect("context");
        assert_eq!(context.open_files.len(), 1);
        assert_eq!(context.open_files[0].content.as_deref(), Some("content"));
    }

    #[test]
    fn test_persistence_roundtrip_and_truncation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = SessionManager::with_storage_dir(dir.path());
        manager.create_context("s1", None);
        let big_content = "x".repeat(5 * 1024);
        manager.add_file_to_context("s1", "big.py", Some("python"), Some(&big_content), true);

        let persisted = std::fs::read_to_string(dir.path().join("s1.json")).expect("file");
        let parsed: SessionContext = serde_json::from_str(&persisted).expect("json");
        let stored = parsed.open_files[0].content.as_deref().expect("content");
        assert!(stored.ends_with(TRUNCATION_MARKER));
        assert!(stored.chars().count() <= PERSISTED_CONTENT_LIMIT + TRUNCATION_MARKER.chars().count());

        // In-memory state keeps the full content.
        let context = manager.get_context("s1").expect("context");
        assert_eq!(
            context.open_files[0].content.as_deref().map(str::len),
            Some(big_content.len())
        );
    }

    #[test]
    fn test_lazy_load_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let manager = SessionManager::with_storage_dir(dir.path());
            manager.create_context("s1", None);
            manager.add_message_to_context("s1", "user", "hello", None);
        }
        let manager = SessionManager::with_storage_dir(dir.path());
        let context = manager.get_context("s1").expect("loaded from disk");
        assert_eq!(context.conversation_history.len(), 1);
        assert!(manager.list_sessions().contains(&"s1".to_string()));
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = SessionManager::with_storage_dir(dir.path());
        manager.create_context("s1", None);
        assert!(dir.path().join("s1.json").exists());
        assert!(manager.delete_context("s1"));
        assert!(!dir.path().join("s1.json").exists());
        assert!(!manager.delete_context("s1"));
    }

    #[test]
    fn test_untyped_update_appends() {
        let manager = SessionManager::new();
        manager.create_context("s1", None);
        let mut updates = Map::new();
        updates.insert(
            "conversation_history".to_string(),
            json!({"role": "user", "content": "hi", "timestamp": "t", "metadata": {}}),
        );
        updates.insert("current_file".to_string(), json!("main.rs"));
        let context = manager.update_context("s1", updates).expect("updated");
        assert_eq!(context.conversation_history.len(), 1);
        assert_eq!(context.current_file.as_deref(), Some("main.rs"));
    }
}
