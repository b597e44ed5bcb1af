//! Tool registry and orchestrator.
//!
//! Owns the tool catalog, validates arguments, dispatches executions
//! (blocking or cooperative), keeps a bounded execution history, scores
//! tool suggestions, tracks inter-tool dependencies, and composes tools
//! into sequential chains.
//!
//! # Failure semantics
//!
//! Argument errors and unknown-tool errors are *returned* as result maps,
//! not raised. Core errors are caught, normalized to
//! `{"error", "exception_type"}`, and recorded. No automatic retry.

mod chain;

pub use chain::{extract_result_value, ChainStep};

use crate::models::{ArgValidation, ExecutionRecord};
use crate::observability::metrics;
use crate::tools::{
    check_language, ExecutionContext, ProgressSink, Services, Tool, ToolDescriptor, ToolDispatcher,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// Maximum executions retained in the orchestrator history.
pub const MAX_EXECUTION_HISTORY: usize = 100;

/// Total steps reported on the cooperative progress ladder.
const PROGRESS_TOTAL: u64 = 4;

/// A suggested tool with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSuggestion {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// Tool category.
    pub category: String,
    /// Deterministic relevance score (higher is better).
    pub relevance: u32,
    /// Required arguments, so callers can build an invocation.
    pub required_args: Vec<String>,
}

/// Keyword table for suggestion scoring. Each entry maps an action word
/// (as typed by users, French and English mixed) to the category it
/// boosts and related words that reinforce the boost.
const SUGGESTION_KEYWORDS: &[(&str, &str, &[&str])] = &[
    ("générer", "generation", &["generation", "code", "créer", "nouveau"]),
    ("expliquer", "explanation", &["explication", "comprendre", "clarifier"]),
    ("refactorer", "refactoring", &["refactoring", "améliorer", "optimiser"]),
    ("documenter", "documentation", &["documentation", "commentaires", "docstring"]),
    ("tester", "testing", &["test", "vérifier", "valider"]),
];

struct Inner {
    services: Services,
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    registration_order: RwLock<Vec<String>>,
    dependencies: RwLock<HashMap<String, HashSet<String>>>,
    history: Mutex<VecDeque<ExecutionRecord>>,
}

/// The tool orchestrator. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tools", &self.read_order().len())
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator with an empty registry.
    #[must_use]
    pub fn new(services: Services) -> Self {
        Self {
            inner: Arc::new(Inner {
                services,
                tools: RwLock::new(HashMap::new()),
                registration_order: RwLock::new(Vec::new()),
                dependencies: RwLock::new(HashMap::new()),
                history: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Creates an orchestrator with every built-in tool registered.
    #[must_use]
    pub fn with_builtin_tools(services: Services) -> Self {
        let orchestrator = Self::new(services);
        for tool in crate::tools::builtin_tools() {
            orchestrator.register_tool(tool);
        }
        orchestrator
    }

    /// The shared services.
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    fn read_order(&self) -> Vec<String> {
        self.inner
            .registration_order
            .read()
            .map(|order| order.clone())
            .unwrap_or_default()
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.inner
            .tools
            .read()
            .ok()
            .and_then(|tools| tools.get(name).cloned())
    }

    /// Registers a tool. Returns `false` when the name is already taken;
    /// existing registrations are never overwritten.
    pub fn register_tool(&self, tool: Arc<dyn Tool>) -> bool {
        let descriptor = tool.descriptor();
        let Ok(mut tools) = self.inner.tools.write() else {
            return false;
        };
        if tools.contains_key(&descriptor.name) {
            return false;
        }
        tools.insert(descriptor.name.clone(), tool);
        drop(tools);

        if let Ok(mut order) = self.inner.registration_order.write() {
            order.push(descriptor.name.clone());
        }
        if !descriptor.dependencies.is_empty() {
            if let Ok(mut dependencies) = self.inner.dependencies.write() {
                dependencies.insert(
                    descriptor.name.clone(),
                    descriptor.dependencies.iter().cloned().collect(),
                );
            }
        }
        tracing::debug!(tool = %descriptor.name, category = %descriptor.category, "registered tool");
        true
    }

    /// Returns a tool's descriptor.
    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<ToolDescriptor> {
        self.lookup(name).map(|tool| tool.descriptor())
    }

    /// Lists registered tools, optionally filtered by category, in
    /// registration order.
    #[must_use]
    pub fn list_tools(&self, category: Option<&str>) -> Vec<ToolDescriptor> {
        self.read_order()
            .iter()
            .filter_map(|name| self.get_tool(name))
            .filter(|descriptor| category.is_none_or(|c| descriptor.category == c))
            .collect()
    }

    /// Validates an argument map against a tool's declared contract.
    ///
    /// Missing required arguments are errors; unknown arguments are
    /// warnings. The special `context` key is always accepted.
    #[must_use]
    pub fn validate_args(&self, tool_name: &str, args: &Value) -> ArgValidation {
        let Some(descriptor) = self.get_tool(tool_name) else {
            return ArgValidation {
                valid: false,
                error: Some(format!("Tool not found: {tool_name}")),
                ..ArgValidation::default()
            };
        };

        let provided: HashSet<&str> = args
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default();

        let missing_args: Vec<String> = descriptor
            .required_args
            .iter()
            .filter(|arg| !provided.contains(arg.as_str()))
            .cloned()
            .collect();
        if !missing_args.is_empty() {
            return ArgValidation {
                valid: false,
                error: Some(format!(
                    "Missing required arguments: {}",
                    missing_args.join(", ")
                )),
                missing_args,
                ..ArgValidation::default()
            };
        }

        let known: HashSet<&str> = descriptor
            .required_args
            .iter()
            .chain(descriptor.optional_args.iter())
            .map(String::as_str)
            .collect();
        let unknown: Vec<&str> = provided
            .iter()
            .filter(|arg| !known.contains(**arg) && **arg != "context")
            .copied()
            .collect();

        let mut validation = ArgValidation::ok();
        if !unknown.is_empty() {
            let mut unknown: Vec<&str> = unknown;
            unknown.sort_unstable();
            validation
                .warnings
                .push(format!("Unknown arguments: {}", unknown.join(", ")));
        }
        validation
    }

    /// Executes a tool, blocking until it completes.
    ///
    /// Returns the tool's result map; failures come back as
    /// `{"error", "exception_type"?}` maps, never as panics.
    #[must_use]
    pub fn execute_tool(&self, name: &str, args: Value, context: Option<Value>) -> Value {
        self.run(name, args, context, None)
    }

    /// Cooperative execution entry.
    ///
    /// The blocking core runs on a worker thread so the scheduler is not
    /// stalled; progress is reported at the fixed checkpoints
    /// {0, 1, mid, total}.
    pub async fn execute_tool_async(
        &self,
        name: &str,
        args: Value,
        context: Option<Value>,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Value {
        let this = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || this.run(&name, args, context, progress.as_deref()))
            .await
            .unwrap_or_else(|err| {
                json!({
                    "error": format!("worker task failed: {err}"),
                    "exception_type": "ExecutionError",
                })
            })
    }

    /// Shared execution path: validate, execute, normalize, record.
    fn run(
        &self,
        name: &str,
        args: Value,
        context: Option<Value>,
        progress: Option<&dyn ProgressSink>,
    ) -> Value {
        if let Some(sink) = progress {
            sink.report(0, PROGRESS_TOTAL);
        }

        let Some(tool) = self.lookup(name) else {
            let result = json!({"error": format!("Tool not found: {name}")});
            self.record(name, &args, &result);
            return result;
        };

        let validation = self.validate_args(name, &args);
        if !validation.valid {
            let result = json!({
                "error": validation
                    .error
                    .unwrap_or_else(|| "invalid arguments".to_string()),
            });
            self.record(name, &args, &result);
            return result;
        }
        for warning in &validation.warnings {
            tracing::warn!(tool = name, "{warning}");
        }

        let descriptor = tool.descriptor();
        if let Err(err) = check_language(&descriptor, &args) {
            let result = json!({"error": err.to_string()});
            self.record(name, &args, &result);
            return result;
        }

        if let Some(sink) = progress {
            sink.report(1, PROGRESS_TOTAL);
        }

        let ctx = ExecutionContext {
            services: &self.inner.services,
            caller_context: context.as_ref(),
            progress,
            dispatcher: Some(self),
        };

        let start = Instant::now();
        let input_size = args.to_string().len();
        let result = match tool.execute(&args, &ctx) {
            Ok(value) => {
                metrics::record_tool_execution(
                    name,
                    start.elapsed(),
                    true,
                    input_size,
                    value.to_string().len(),
                );
                value
            }
            Err(err) => {
                tracing::error!(tool = name, error = %err, "tool execution failed");
                metrics::record_tool_execution(name, start.elapsed(), false, input_size, 0);
                json!({
                    "error": err.to_string(),
                    "exception_type": err.kind_name(),
                })
            }
        };

        if let Some(sink) = progress {
            sink.report(3, PROGRESS_TOTAL);
        }

        self.record(name, &args, &result);

        if let Some(sink) = progress {
            sink.report(PROGRESS_TOTAL, PROGRESS_TOTAL);
        }
        result
    }

    /// Appends one execution record, evicting oldest-first past the cap.
    fn record(&self, name: &str, args: &Value, result: &Value) {
        let record = ExecutionRecord::new(name, args.clone(), result.clone());
        if let Ok(mut history) = self.inner.history.lock() {
            history.push_back(record);
            while history.len() > MAX_EXECUTION_HISTORY {
                history.pop_front();
            }
        }
    }

    /// Returns execution history entries, optionally filtered.
    #[must_use]
    pub fn get_execution_history(
        &self,
        limit: Option<usize>,
        tool_name: Option<&str>,
        success_only: bool,
    ) -> Vec<ExecutionRecord> {
        let Ok(history) = self.inner.history.lock() else {
            return Vec::new();
        };
        let filtered: Vec<ExecutionRecord> = history
            .iter()
            .filter(|record| tool_name.is_none_or(|name| record.tool_name == name))
            .filter(|record| !success_only || record.success)
            .cloned()
            .collect();
        match limit {
            Some(limit) if limit > 0 && filtered.len() > limit => {
                filtered[filtered.len() - limit..].to_vec()
            }
            _ => filtered,
        }
    }

    /// Clears the execution history.
    pub fn clear_execution_history(&self) {
        if let Ok(mut history) = self.inner.history.lock() {
            history.clear();
        }
    }

    /// Ranks tools against a query using a deterministic scoring rubric.
    ///
    /// Tools scoring zero are excluded; ties keep registration order.
    #[must_use]
    pub fn suggest_tools(&self, query: &str, context: Option<&Value>) -> Vec<ToolSuggestion> {
        let query_lower = query.to_lowercase();
        let query_words: HashSet<&str> = query_lower.split_whitespace().collect();

        let mut suggestions: Vec<ToolSuggestion> = Vec::new();
        for name in self.read_order() {
            let Some(descriptor) = self.get_tool(&name) else {
                continue;
            };
            let mut score = 0u32;

            let description_lower = descriptor.description.to_lowercase();
            let description_words: HashSet<&str> = description_lower.split_whitespace().collect();
            let common = query_words.intersection(&description_words).count();
            score += u32::try_from(common).unwrap_or(u32::MAX).saturating_mul(2);

            if query_lower.contains(&name.to_lowercase()) {
                score += 5;
            }

            for (action, category, related_words) in SUGGESTION_KEYWORDS {
                if query_lower.contains(action) {
                    score += 3;
                }
                for word in *related_words {
                    if query_lower.contains(word) && descriptor.category == *category {
                        score += 2;
                    }
                }
            }

            if let Some(context) = context {
                if let Some(language) = context
                    .get("language_context")
                    .and_then(|lc| lc.get("language"))
                    .and_then(Value::as_str)
                {
                    let language = language.to_lowercase();
                    if !language.is_empty() && descriptor.category.to_lowercase().contains(&language)
                    {
                        score += 3;
                    }
                }
                let has_current_file = context
                    .get("current_file")
                    .and_then(Value::as_str)
                    .is_some_and(|f| !f.is_empty());
                if has_current_file
                    && (description_lower.contains("file") || description_lower.contains("fichier"))
                {
                    score += 2;
                }
            }

            if score > 0 {
                suggestions.push(ToolSuggestion {
                    name: descriptor.name,
                    description: descriptor.description,
                    category: descriptor.category,
                    relevance: score,
                    required_args: descriptor.required_args,
                });
            }
        }

        suggestions.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        suggestions
    }

    /// Returns a tool's dependency set, optionally transitively.
    #[must_use]
    pub fn get_tool_dependencies(&self, name: &str, recursive: bool) -> HashSet<String> {
        let Ok(dependencies) = self.inner.dependencies.read() else {
            return HashSet::new();
        };
        let Some(direct) = dependencies.get(name) else {
            return HashSet::new();
        };
        let mut result = direct.clone();
        if recursive {
            let mut queue: Vec<String> = direct.iter().cloned().collect();
            while let Some(dep) = queue.pop() {
                if let Some(transitive) = dependencies.get(&dep) {
                    for further in transitive {
                        if result.insert(further.clone()) {
                            queue.push(further.clone());
                        }
                    }
                }
            }
        }
        result
    }

    /// Creates a sequential tool chain and registers it as a synthetic
    /// tool. Returns `false` when a referenced tool does not exist or
    /// the chain name is taken.
    pub fn create_tool_chain(&self, chain_name: &str, steps: Vec<ChainStep>) -> bool {
        if steps.is_empty() {
            return false;
        }
        for step in &steps {
            if self.get_tool(&step.name).is_none() {
                tracing::warn!(
                    chain = chain_name,
                    tool = %step.name,
                    "chain references unknown tool"
                );
                return false;
            }
        }
        self.register_tool(Arc::new(chain::ChainTool::new(chain_name, steps)))
    }
}

impl ToolDispatcher for Orchestrator {
    fn dispatch(&self, name: &str, args: Value, context: Option<Value>) -> Value {
        self.execute_tool(name, args, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FunctionTool;
    use serde_json::json;

    fn arithmetic_orchestrator() -> Orchestrator {
        let orchestrator = Orchestrator::new(Services::default());
        orchestrator.register_tool(Arc::new(FunctionTool::new(
            ToolDescriptor::new("add", "adds two numbers")
                .category("math")
                .required(&["a", "b"]),
            |args, _ctx| {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!({"result": a + b}))
            },
        )));
        orchestrator.register_tool(Arc::new(FunctionTool::new(
            ToolDescriptor::new("multiply", "multiplies two numbers")
                .category("math")
                .required(&["a", "b"]),
            |args, _ctx| {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!({"result": a * b}))
            },
        )));
        orchestrator
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let orchestrator = arithmetic_orchestrator();
        let duplicate = Arc::new(FunctionTool::new(
            ToolDescriptor::new("add", "other description"),
            |_args, _ctx| Ok(json!({})),
        ));
        assert!(!orchestrator.register_tool(duplicate));
        // Registry unchanged.
        assert_eq!(
            orchestrator.get_tool("add").map(|d| d.description),
            Some("adds two numbers".to_string())
        );
    }

    #[test]
    fn test_validate_args() {
        let orchestrator = arithmetic_orchestrator();

        let ok = orchestrator.validate_args("add", &json!({"a": 1, "b": 2}));
        assert!(ok.valid);

        let missing = orchestrator.validate_args("add", &json!({"a": 1}));
        assert!(!missing.valid);
        assert_eq!(missing.missing_args, vec!["b"]);

        let unknown = orchestrator.validate_args("add", &json!({"a": 1, "b": 2, "c": 3}));
        assert!(unknown.valid);
        assert_eq!(unknown.warnings.len(), 1);

        // `context` is always accepted.
        let with_context =
            orchestrator.validate_args("add", &json!({"a": 1, "b": 2, "context": {}}));
        assert!(with_context.valid);
        assert!(with_context.warnings.is_empty());

        let not_found = orchestrator.validate_args("nope", &json!({}));
        assert!(!not_found.valid);
    }

    #[test]
    fn test_execute_and_history() {
        let orchestrator = arithmetic_orchestrator();
        let result = orchestrator.execute_tool("add", json!({"a": 2, "b": 3}), None);
        assert_eq!(result["result"], json!(5.0));

        let unknown = orchestrator.execute_tool("nope", json!({}), None);
        assert!(unknown["error"].as_str().is_some_and(|e| e.contains("nope")));

        let history = orchestrator.get_execution_history(None, None, false);
        assert_eq!(history.len(), 2);
        assert!(history[0].success);
        assert!(!history[1].success);

        let only_add = orchestrator.get_execution_history(None, Some("add"), false);
        assert_eq!(only_add.len(), 1);

        let success_only = orchestrator.get_execution_history(None, None, true);
        assert_eq!(success_only.len(), 1);
    }

    #[test]
    fn test_history_bounded() {
        let orchestrator = arithmetic_orchestrator();
        for i in 0..(MAX_EXECUTION_HISTORY + 20) {
            let _ = orchestrator.execute_tool(
                "add",
                json!({"a": i, "b": 1}),
                None,
            );
        }
        let history = orchestrator.get_execution_history(None, None, false);
        assert_eq!(history.len(), MAX_EXECUTION_HISTORY);
    }

    #[test]
    fn test_chain_execution() {
        let orchestrator = arithmetic_orchestrator();
        let steps = vec![
            ChainStep {
                name: "add".to_string(),
                args: json!({"a": 5, "b": 3})
                    .as_object()
                    .expect("object")
                    .clone(),
                result_mapping: [("b".to_string(), "result".to_string())].into(),
            },
            ChainStep {
                name: "multiply".to_string(),
                args: json!({"a": 2}).as_object().expect("object").clone(),
                result_mapping: HashMap::new(),
            },
        ];
        assert!(orchestrator.create_tool_chain("add_then_multiply", steps));

        let result = orchestrator.execute_tool("add_then_multiply", json!({}), None);
        assert_eq!(result["completed_steps"], json!(2));
        assert_eq!(result["total_steps"], json!(2));
        assert_eq!(result["results"][1]["result"], json!(16.0));
    }

    #[test]
    fn test_chain_rejects_unknown_tool() {
        let orchestrator = arithmetic_orchestrator();
        let steps = vec![ChainStep {
            name: "missing".to_string(),
            args: serde_json::Map::new(),
            result_mapping: HashMap::new(),
        }];
        assert!(!orchestrator.create_tool_chain("broken", steps));
        assert!(orchestrator.get_tool("broken").is_none());
    }

    #[test]
    fn test_chain_short_circuits() {
        let orchestrator = arithmetic_orchestrator();
        orchestrator.register_tool(Arc::new(FunctionTool::new(
            ToolDescriptor::new("boom", "always fails"),
            |_args, _ctx| Err(crate::Error::Execution("boom".to_string())),
        )));
        let steps = vec![
            ChainStep {
                name: "boom".to_string(),
                args: serde_json::Map::new(),
                result_mapping: HashMap::new(),
            },
            ChainStep {
                name: "add".to_string(),
                args: json!({"a": 1, "b": 1}).as_object().expect("object").clone(),
                result_mapping: HashMap::new(),
            },
        ];
        assert!(orchestrator.create_tool_chain("failing_chain", steps));
        let result = orchestrator.execute_tool("failing_chain", json!({}), None);
        assert_eq!(result["completed_steps"], json!(1));
        assert_eq!(result["total_steps"], json!(2));
        assert!(result["error"].as_str().is_some_and(|e| e.contains("step 1")));
    }

    #[test]
    fn test_suggest_tools_scoring() {
        let orchestrator = arithmetic_orchestrator();
        let suggestions = orchestrator.suggest_tools("please add these numbers", None);
        assert!(!suggestions.is_empty());
        assert_eq!(suggestions[0].name, "add");

        // Zero-score tools are excluded.
        let none = orchestrator.suggest_tools("completely unrelated query", None);
        assert!(none.is_empty());
    }

    #[test]
    fn test_dependencies_recursive() {
        let orchestrator = arithmetic_orchestrator();
        orchestrator.register_tool(Arc::new(FunctionTool::new(
            ToolDescriptor::new("outer", "outer tool").dependencies(&["middle"]),
            |_args, _ctx| Ok(json!({})),
        )));
        orchestrator.register_tool(Arc::new(FunctionTool::new(
            ToolDescriptor::new("middle", "middle tool").dependencies(&["add"]),
            |_args, _ctx| Ok(json!({})),
        )));

        let direct = orchestrator.get_tool_dependencies("outer", false);
        assert_eq!(direct, HashSet::from(["middle".to_string()]));

        let transitive = orchestrator.get_tool_dependencies("outer", true);
        assert_eq!(
            transitive,
            HashSet::from(["middle".to_string(), "add".to_string()])
        );
    }

    #[tokio::test]
    async fn test_async_execution_with_progress() {
        struct Recorder(Mutex<Vec<(u64, u64)>>);
        impl ProgressSink for Recorder {
            fn report(&self, progress: u64, total: u64) {
                if let Ok(mut steps) = self.0.lock() {
                    steps.push((progress, total));
                }
            }
        }

        let orchestrator = arithmetic_orchestrator();
        let sink = Arc::new(Recorder(Mutex::new(Vec::new())));
        let result = orchestrator
            .execute_tool_async(
                "add",
                json!({"a": 1, "b": 2}),
                None,
                Some(sink.clone() as Arc<dyn ProgressSink>),
            )
            .await;
        assert_eq!(result["result"], json!(3.0));
        let steps = sink.0.lock().expect("steps").clone();
        assert_eq!(steps, vec![(0, 4), (1, 4), (3, 4), (4, 4)]);
    }
}
