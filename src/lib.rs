//! # Collegue
//!
//! A code-analysis tool service for AI coding assistants.
//!
//! Collegue exposes a catalog of inspection, quality, and security tools
//! behind a uniform request/response contract: a dependency and registry
//! guard (OSV vulnerability batch queries), a secret scanner, a repository
//! consistency checker, an Infrastructure-as-Code guardrails scanner with
//! optional auto-remediation, an impact-analysis engine, a sandboxed test
//! runner, and a set of LLM-assisted content tools with deterministic
//! fallbacks.
//!
//! ## Architecture
//!
//! - [`parser`] produces structural views of Python/TypeScript/JavaScript/PHP
//!   buffers without executing them.
//! - [`tools`] implements each tool behind the [`tools::Tool`] trait.
//! - [`orchestrator`] registers tools, validates arguments, dispatches
//!   sync or async, keeps a bounded execution history, and composes tools
//!   into sequential chains.
//! - [`session`] maintains per-session conversation/code/execution
//!   histories with optional on-disk persistence.
//! - [`llm`] defines the provider contract consumed by content tools and
//!   deep-analysis paths; every LLM path has a local fallback.
//!
//! ## Example
//!
//! ```rust,ignore
//! use collegue::orchestrator::Orchestrator;
//! use serde_json::json;
//!
//! let orchestrator = Orchestrator::with_builtin_tools(services);
//! let result = orchestrator.execute_tool(
//!     "secret_scan",
//!     json!({"content": "api_key = \"sk-1234567890abcdef\""}),
//!     None,
//! );
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod parser;
pub mod session;
pub mod tools;

// Re-exports for convenience
pub use config::{CollegueConfig, LlmConfig};
pub use llm::{LlmManager, LlmProvider};
pub use models::{FileInput, Severity, SeverityCounts};
pub use orchestrator::Orchestrator;
pub use parser::CodeParser;
pub use session::SessionManager;
pub use tools::{Services, Tool};

/// Error type for collegue operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed JSON arguments, unknown enum values, empty required fields |
/// | `Validation` | A request violates a tool's declared contract (missing args, unsupported language) |
/// | `Execution` | A tool core failed (subprocess error, unparsable output) |
/// | `Configuration` | A required capability is missing and the tool has no fallback |
/// | `ExternalService` | OSV, a package registry, or an LLM provider failed or timed out |
/// | `OperationFailed` | I/O errors and other infrastructure failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A request does not satisfy the tool's declared contract.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A tool core failed during execution.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A required capability is not configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An upstream service returned an error or timed out.
    #[error("external service '{service}' failed: {cause}")]
    ExternalService {
        /// The service that failed (osv, pypi, npm, llm).
        service: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns the error kind name used in wire-level `exception_type` fields.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::Validation(_) => "ValidationError",
            Self::Execution(_) => "ExecutionError",
            Self::Configuration(_) => "ConfigurationError",
            Self::ExternalService { .. } => "ExternalServiceError",
            Self::OperationFailed { .. } => "OperationFailed",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON error: {err}"))
    }
}

/// Result type alias for collegue operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("missing argument 'code'".to_string());
        let display = format!("{err}");
        assert!(display.contains("validation failed"));
        assert!(display.contains("missing argument"));
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(
            Error::Validation(String::new()).kind_name(),
            "ValidationError"
        );
        assert_eq!(Error::Execution(String::new()).kind_name(), "ExecutionError");
        assert_eq!(
            Error::ExternalService {
                service: "osv".to_string(),
                cause: "timeout".to_string(),
            }
            .kind_name(),
            "ExternalServiceError"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        assert_eq!(err.kind_name(), "InvalidInput");
    }
}
