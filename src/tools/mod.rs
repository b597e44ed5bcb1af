//! Tool contract layer.
//!
//! Every tool implements [`Tool`]: a descriptor (name, category, argument
//! lists, supported languages, long-running flag) plus a synchronous core.
//! Requests arrive as JSON values, are deserialized into the tool's typed
//! request struct, and responses are serialized back from typed structs —
//! so a tool cannot produce a response outside its declared shape.
//!
//! Tools never panic and never raise across the orchestrator boundary:
//! cores return [`crate::Result`] and the orchestrator normalizes errors
//! into `{"error": …, "exception_type": …}` result maps.

pub mod consistency;
pub mod content;
pub mod dependency_guard;
pub mod iac;
pub mod impact;
pub mod osv;
pub(crate) mod process;
pub mod secret_scan;
pub mod test_runner;

use crate::llm::LlmManager;
use crate::parser::CodeParser;
use crate::session::SessionManager;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Shared services injected into every tool execution.
///
/// Built once at startup (the composition root) and passed by reference;
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Services {
    /// Structural code parser.
    pub parser: CodeParser,
    /// LLM manager, when a provider is configured.
    pub llm_manager: Option<LlmManager>,
    /// Session context manager.
    pub session_manager: Arc<SessionManager>,
}

impl Services {
    /// Builds services from configuration.
    #[must_use]
    pub fn from_config(config: &crate::config::CollegueConfig) -> Self {
        let session_manager = config.storage_dir.as_ref().map_or_else(
            || Arc::new(SessionManager::new()),
            |dir| Arc::new(SessionManager::with_storage_dir(dir)),
        );
        Self {
            parser: CodeParser::new(),
            llm_manager: LlmManager::from_config(&config.llm),
            session_manager,
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self {
            parser: CodeParser::new(),
            llm_manager: None,
            session_manager: Arc::new(SessionManager::new()),
        }
    }
}

/// Progress reporting for cooperative executions.
pub trait ProgressSink: Send + Sync {
    /// Reports `progress` out of `total` steps.
    fn report(&self, progress: u64, total: u64);
}

/// Dispatches a tool invocation by name. Implemented by the orchestrator
/// and injected into executions so composite tools (chains, auto-chained
/// remediation) can invoke other tools in-process.
pub trait ToolDispatcher: Send + Sync {
    /// Executes the named tool, returning its wire-level result map.
    fn dispatch(&self, name: &str, args: Value, context: Option<Value>) -> Value;
}

/// Per-invocation context passed to every tool core.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// Injected shared services.
    pub services: &'a Services,
    /// Caller-provided session/context value, when present.
    pub caller_context: Option<&'a Value>,
    /// Progress sink for cooperative executions.
    pub progress: Option<&'a dyn ProgressSink>,
    /// Tool dispatcher for composite tools.
    pub dispatcher: Option<&'a dyn ToolDispatcher>,
}

impl<'a> ExecutionContext<'a> {
    /// A minimal context carrying only services.
    #[must_use]
    pub const fn new(services: &'a Services) -> Self {
        Self {
            services,
            caller_context: None,
            progress: None,
            dispatcher: None,
        }
    }

    /// The effective LLM manager for this execution.
    #[must_use]
    pub fn llm_manager(&self) -> Option<&LlmManager> {
        self.services.llm_manager.as_ref()
    }
}

/// Static description of a tool: identity, contract, and capabilities.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human description.
    pub description: String,
    /// Category tag (generation, security, analysis, …).
    pub category: String,
    /// Required argument names, in declaration order.
    pub required_args: Vec<String>,
    /// Optional argument names, in declaration order.
    pub optional_args: Vec<String>,
    /// Languages the tool accepts in its `language` argument.
    pub supported_languages: Vec<String>,
    /// True when the tool suspends (LLM calls, subprocesses, network).
    pub long_running: bool,
    /// Names of tools this tool depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Human-readable capability list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

impl ToolDescriptor {
    /// Creates a descriptor with empty argument lists.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: "general".to_string(),
            required_args: Vec::new(),
            optional_args: Vec::new(),
            supported_languages: Vec::new(),
            long_running: false,
            dependencies: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets the required argument names.
    #[must_use]
    pub fn required(mut self, args: &[&str]) -> Self {
        self.required_args = args.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Sets the optional argument names.
    #[must_use]
    pub fn optional(mut self, args: &[&str]) -> Self {
        self.optional_args = args.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Sets the supported languages.
    #[must_use]
    pub fn languages(mut self, languages: &[&str]) -> Self {
        self.supported_languages = languages.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Marks the tool as long-running (suspendable).
    #[must_use]
    pub const fn long_running(mut self, long_running: bool) -> Self {
        self.long_running = long_running;
        self
    }

    /// Sets the dependency tool names.
    #[must_use]
    pub fn dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Sets the capability list.
    #[must_use]
    pub fn capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(|s| (*s).to_string()).collect();
        self
    }
}

/// A named unit of work with a declared contract.
pub trait Tool: Send + Sync {
    /// The tool's descriptor.
    fn descriptor(&self) -> ToolDescriptor;

    /// Runs the tool core. Arguments have already passed name-level
    /// validation; the core deserializes them into its request type.
    ///
    /// # Errors
    ///
    /// Returns an error for contract violations ([`Error::Validation`]),
    /// core failures ([`Error::Execution`]), or missing capabilities
    /// ([`Error::Configuration`]).
    fn execute(&self, args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value>;
}

/// A tool backed by a plain function. Used for tests and ad-hoc
/// registrations; the built-in analyzers implement [`Tool`] directly.
pub struct FunctionTool<F> {
    descriptor: ToolDescriptor,
    func: F,
}

impl<F> FunctionTool<F>
where
    F: Fn(&Value, &ExecutionContext<'_>) -> Result<Value> + Send + Sync,
{
    /// Wraps a function with its descriptor.
    pub const fn new(descriptor: ToolDescriptor, func: F) -> Self {
        Self { descriptor, func }
    }
}

impl<F> Tool for FunctionTool<F>
where
    F: Fn(&Value, &ExecutionContext<'_>) -> Result<Value> + Send + Sync,
{
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    fn execute(&self, args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value> {
        (self.func)(args, ctx)
    }
}

/// The full built-in tool catalog, in registration order.
#[must_use]
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(content::CodeGenerationTool::new()) as Arc<dyn Tool>,
        Arc::new(content::CodeExplanationTool::new()),
        Arc::new(content::RefactoringTool::new()),
        Arc::new(content::DocumentationTool::new()),
        Arc::new(content::TestGenerationTool::new()),
        Arc::new(dependency_guard::DependencyGuardTool::new()),
        Arc::new(secret_scan::SecretScanTool::new()),
        Arc::new(consistency::RepoConsistencyCheckTool::new()),
        Arc::new(iac::IacGuardrailsScanTool::new()),
        Arc::new(impact::ImpactAnalysisTool::new()),
        Arc::new(test_runner::RunTestsTool::new()),
    ]
}

/// Deserializes a request value into a tool's typed request.
pub(crate) fn parse_request<T: DeserializeOwned>(args: &Value) -> Result<T> {
    serde_json::from_value(args.clone())
        .map_err(|e| Error::Validation(format!("invalid request: {e}")))
}

/// Serializes a typed response back to the wire value.
pub(crate) fn to_response<T: Serialize>(response: &T) -> Result<Value> {
    serde_json::to_value(response).map_err(|e| Error::Execution(format!("invalid response: {e}")))
}

/// Checks a request's `language` against a tool's supported set.
pub(crate) fn check_language(descriptor: &ToolDescriptor, args: &Value) -> Result<()> {
    let Some(language) = args.get("language").and_then(Value::as_str) else {
        return Ok(());
    };
    if language.is_empty() || descriptor.supported_languages.is_empty() {
        return Ok(());
    }
    let language = language.to_lowercase();
    let supported = descriptor
        .supported_languages
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(&language));
    if supported {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "language '{language}' is not supported by {}. Supported: {}",
            descriptor.name,
            descriptor.supported_languages.join(", ")
        )))
    }
}

/// Reports one step of the fixed progress ladder {0, 1, mid, total}.
pub(crate) fn report_progress(ctx: &ExecutionContext<'_>, progress: u64, total: u64) {
    if let Some(sink) = ctx.progress {
        sink.report(progress, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_builder() {
        let descriptor = ToolDescriptor::new("demo", "a demo tool")
            .category("testing")
            .required(&["code"])
            .optional(&["language"])
            .languages(&["python"])
            .long_running(true);
        assert_eq!(descriptor.name, "demo");
        assert_eq!(descriptor.required_args, vec!["code"]);
        assert!(descriptor.long_running);
    }

    #[test]
    fn test_check_language() {
        let descriptor = ToolDescriptor::new("demo", "").languages(&["python", "typescript"]);
        assert!(check_language(&descriptor, &json!({"language": "Python"})).is_ok());
        assert!(check_language(&descriptor, &json!({})).is_ok());
        assert!(check_language(&descriptor, &json!({"language": "cobol"})).is_err());
    }

    #[test]
    fn test_function_tool() {
        let tool = FunctionTool::new(
            ToolDescriptor::new("add", "adds numbers").required(&["a", "b"]),
            |args, _ctx| {
                let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
                let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!({"result": a + b}))
            },
        );
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let result = tool.execute(&json!({"a": 2, "b": 3}), &ctx).expect("ok");
        assert_eq!(result["result"], json!(5));
    }
}
