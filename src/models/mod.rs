//! Shared data model for tools and analyzers.

mod execution;
mod parsed;
mod session;
mod severity;

pub use execution::{ArgValidation, ExecutionRecord};
pub use parsed::{
    AttributeInfo, ClassInfo, FunctionInfo, ImportEntry, InterfaceInfo, ParamInfo, ParsedCode,
    TypeAliasInfo, VariableInfo,
};
pub use session::{
    CodeEntry, DependencyEntry, LanguageContext, Message, OpenFile, SessionContext,
    SessionExecution, SessionSummary, MAX_CODE_HISTORY, MAX_CONVERSATION_HISTORY,
    MAX_SESSION_EXECUTIONS, PERSISTED_CONTENT_LIMIT, TRUNCATION_MARKER,
};
pub use severity::{Severity, SeverityCounts};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A file submitted for analysis: relative path plus full content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInput {
    /// Relative path of the file.
    pub path: String,
    /// File content.
    pub content: String,
    /// Language tag; detected from the extension when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl FileInput {
    /// Creates a new file input without an explicit language.
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language: None,
        }
    }

    /// Returns the effective language: the explicit tag or the extension-derived one.
    #[must_use]
    pub fn effective_language(&self) -> String {
        self.language
            .clone()
            .unwrap_or_else(|| detect_language_from_extension(&self.path))
    }
}

/// Returns the current time as an ISO-8601 timestamp.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Maps a file extension to a language tag.
///
/// Returns `"unknown"` for unrecognized extensions.
#[must_use]
pub fn detect_language_from_extension(filepath: &str) -> String {
    let lower = filepath.to_lowercase();
    if lower.contains("dockerfile") {
        return "dockerfile".to_string();
    }

    let ext = lower.rsplit('.').next().unwrap_or_default();
    let language = match ext {
        "py" | "pyi" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "php" => "php",
        "java" => "java",
        "go" => "go",
        "rs" => "rust",
        "rb" => "ruby",
        "cs" | "csx" => "csharp",
        "kt" | "kts" => "kotlin",
        "sh" | "bash" | "zsh" => "shell",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" | "markdown" => "markdown",
        "sql" => "sql",
        "tf" | "tfvars" => "terraform",
        _ => "unknown",
    };
    language.to_string()
}

/// Normalizes language aliases (`js` → `javascript`, `py` → `python`, …).
#[must_use]
pub fn normalize_language(language: &str) -> String {
    let normalized = language.trim().to_lowercase();
    let canonical = match normalized.as_str() {
        "js" => "javascript",
        "ts" => "typescript",
        "py" => "python",
        "rb" => "ruby",
        "golang" => "go",
        "c#" | "c-sharp" => "csharp",
        other => other,
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language_from_extension() {
        assert_eq!(detect_language_from_extension("src/app.py"), "python");
        assert_eq!(detect_language_from_extension("src/App.TSX"), "typescript");
        assert_eq!(detect_language_from_extension("index.mjs"), "javascript");
        assert_eq!(detect_language_from_extension("main.tf"), "terraform");
        assert_eq!(detect_language_from_extension("docker/Dockerfile"), "dockerfile");
        assert_eq!(detect_language_from_extension("README"), "unknown");
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("TS"), "typescript");
        assert_eq!(normalize_language(" py "), "python");
        assert_eq!(normalize_language("C#"), "csharp");
        assert_eq!(normalize_language("rust"), "rust");
    }

    #[test]
    fn test_file_input_effective_language() {
        let explicit = FileInput {
            path: "weird.txt".to_string(),
            content: String::new(),
            language: Some("python".to_string()),
        };
        assert_eq!(explicit.effective_language(), "python");

        let derived = FileInput::new("lib.rs", "");
        assert_eq!(derived.effective_language(), "rust");
    }
}
