//! Session context types.

use super::iso_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Maximum entries kept in a session's code history.
pub const MAX_CODE_HISTORY: usize = 20;
/// Maximum entries kept in a session's conversation history.
pub const MAX_CONVERSATION_HISTORY: usize = 30;
/// Maximum entries kept in a session's tool-execution history.
pub const MAX_SESSION_EXECUTIONS: usize = 20;
/// Maximum characters of open-file content written to disk.
pub const PERSISTED_CONTENT_LIMIT: usize = 1024;
/// Marker appended to truncated persisted content.
pub const TRUNCATION_MARKER: &str = "… [truncated]";

/// Per-session working state: histories, open files, language context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    /// Stable session identifier.
    pub session_id: String,
    /// Code snippets submitted in this session (bounded).
    pub code_history: Vec<CodeEntry>,
    /// Conversation messages (bounded).
    pub conversation_history: Vec<Message>,
    /// Tool executions recorded against this session (bounded).
    pub execution_history: Vec<SessionExecution>,
    /// Path of the file currently in focus.
    pub current_file: Option<String>,
    /// Project structure snapshot provided by the client.
    pub project_structure: Option<Value>,
    /// Primary language, version, and frameworks.
    pub language_context: Option<LanguageContext>,
    /// Files the session has touched.
    pub open_files: Vec<OpenFile>,
    /// Declared dependencies, keyed by package name.
    pub dependencies: BTreeMap<String, DependencyEntry>,
    /// Free-form metadata; updates are merged, never replaced wholesale.
    pub metadata: Map<String, Value>,
    /// Creation timestamp (ISO-8601).
    pub created_at: String,
    /// Last-update timestamp (ISO-8601).
    pub updated_at: String,
}

impl SessionContext {
    /// Creates an empty context for the given session id.
    #[must_use]
    pub fn new(session_id: impl Into<String>, metadata: Option<Map<String, Value>>) -> Self {
        let now = iso_timestamp();
        Self {
            session_id: session_id.into(),
            code_history: Vec::new(),
            conversation_history: Vec::new(),
            execution_history: Vec::new(),
            current_file: None,
            project_structure: None,
            language_context: None,
            open_files: Vec::new(),
            dependencies: BTreeMap::new(),
            metadata: metadata.unwrap_or_default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Touches the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = iso_timestamp();
    }
}

/// One code snippet recorded in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEntry {
    /// The code itself.
    pub code: String,
    /// Language of the snippet.
    pub language: Option<String>,
    /// File the snippet came from.
    pub file_path: Option<String>,
    /// Snippet kind (snippet, function, class, …).
    pub code_type: Option<String>,
    /// When the snippet was recorded.
    pub timestamp: String,
}

/// One conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message sender role (user, assistant).
    pub role: String,
    /// Message content.
    pub content: String,
    /// When the message was recorded.
    pub timestamp: String,
    /// Message metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One tool execution recorded against a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExecution {
    /// Tool name.
    pub tool_name: String,
    /// Arguments the tool ran with.
    pub args: Value,
    /// Tool result.
    pub result: Value,
    /// When the execution was recorded.
    pub timestamp: String,
}

/// A file tracked by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFile {
    /// File path.
    pub path: String,
    /// File language.
    pub language: Option<String>,
    /// Whether the file is currently open.
    pub is_open: bool,
    /// File content, if captured. Truncated on persistence.
    pub content: Option<String>,
    /// First time the session touched the file.
    pub first_opened: String,
    /// Most recent access.
    pub last_accessed: String,
}

/// Primary language context for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageContext {
    /// Language name.
    pub language: String,
    /// Language version.
    pub version: Option<String>,
    /// Frameworks in use.
    #[serde(default)]
    pub frameworks: Vec<String>,
    /// When the language context was set.
    pub updated_at: String,
}

/// One declared dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Package name.
    pub name: String,
    /// Version, when known.
    pub version: Option<String>,
    /// Dependency kind (package, library, framework).
    #[serde(rename = "type")]
    pub kind: String,
    /// When the dependency was recorded.
    pub added_at: String,
}

/// Compact view of a session, without the full histories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last-update timestamp.
    pub updated_at: String,
    /// Current file in focus.
    pub current_file: Option<String>,
    /// Number of open files.
    pub open_files_count: usize,
    /// Number of code-history entries.
    pub code_history_count: usize,
    /// Number of conversation entries.
    pub conversation_history_count: usize,
    /// Language context, if set.
    pub language_context: Option<LanguageContext>,
    /// Number of declared dependencies.
    pub dependencies_count: usize,
    /// Session metadata.
    pub metadata: Map<String, Value>,
}

impl From<&SessionContext> for SessionSummary {
    fn from(context: &SessionContext) -> Self {
        Self {
            session_id: context.session_id.clone(),
            created_at: context.created_at.clone(),
            updated_at: context.updated_at.clone(),
            current_file: context.current_file.clone(),
            open_files_count: context.open_files.len(),
            code_history_count: context.code_history.len(),
            conversation_history_count: context.conversation_history.len(),
            language_context: context.language_context.clone(),
            dependencies_count: context.dependencies.len(),
            metadata: context.metadata.clone(),
        }
    }
}
