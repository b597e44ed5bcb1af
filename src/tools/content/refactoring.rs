//! Code refactoring tool.
//!
//! Also the execution target of the IaC scanner's auto-chain policy, so
//! the supported-language set includes the IaC file kinds.

use super::strip_code_fence;
use crate::llm::with_llm_fallback;
use crate::tools::{parse_request, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const REFACTORING_TYPES: &[&str] =
    &["rename", "extract", "simplify", "optimize", "clean", "modernize"];

/// Refactoring request.
#[derive(Debug, Clone, Deserialize)]
pub struct RefactoringRequest {
    /// Code to refactor.
    pub code: String,
    /// Code language.
    pub language: String,
    /// Session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// `rename`, `extract`, `simplify`, `optimize`, `clean`, `modernize`.
    pub refactoring_type: String,
    /// Type-specific parameters (e.g. `old_name`/`new_name` for rename,
    /// `instructions` for guided cleanups).
    #[serde(default)]
    pub parameters: Option<Value>,
    /// File the code comes from.
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Refactoring response.
#[derive(Debug, Clone, Serialize)]
pub struct RefactoringResponse {
    /// The refactored code.
    pub refactored_code: String,
    /// The original code.
    pub original_code: String,
    /// Code language.
    pub language: String,
    /// Applied changes, one entry per transformation.
    pub changes: Vec<Value>,
    /// Explanation of the modifications.
    pub explanation: String,
    /// Improvement metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_metrics: Option<Value>,
}

/// The refactoring tool.
#[derive(Debug, Default)]
pub struct RefactoringTool;

impl RefactoringTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for RefactoringTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "code_refactoring",
            "Refactors and improves code through several transformation types",
        )
        .category("refactoring")
        .required(&["code", "language", "refactoring_type"])
        .optional(&["session_id", "parameters", "file_path"])
        .languages(&[
            "python",
            "javascript",
            "typescript",
            "java",
            "csharp",
            // IaC kinds, for auto-chained remediation.
            "yaml",
            "kubernetes",
            "terraform",
            "dockerfile",
            "hcl",
        ])
        .long_running(true)
        .capabilities(&[
            "rename, extract, simplify, optimize, clean, modernize transformations",
            "Deterministic cleanup fallback without an LLM",
            "Change tracking with improvement metrics",
        ])
    }

    fn execute(&self, args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: RefactoringRequest = parse_request(args)?;
        let response = run(&request, ctx)?;
        to_response(&response)
    }
}

/// Whitespace cleanup: trailing blanks stripped, runs of blank lines
/// collapsed, a single trailing newline.
fn clean_code(code: &str) -> (String, Vec<Value>) {
    let mut changes = Vec::new();
    let mut trailing_stripped = 0usize;
    let mut blanks_collapsed = 0usize;

    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0usize;
    for line in code.lines() {
        let stripped = line.trim_end();
        if stripped.len() != line.len() {
            trailing_stripped += 1;
        }
        if stripped.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                blanks_collapsed += 1;
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(stripped.to_string());
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    let mut cleaned = lines.join("\n");
    cleaned.push('\n');

    if trailing_stripped > 0 {
        changes.push(json!({
            "kind": "trailing_whitespace",
            "description": format!("stripped trailing whitespace on {trailing_stripped} line(s)"),
        }));
    }
    if blanks_collapsed > 0 {
        changes.push(json!({
            "kind": "blank_lines",
            "description": format!("collapsed {blanks_collapsed} redundant blank line(s)"),
        }));
    }
    (cleaned, changes)
}

fn rename_identifier(code: &str, old_name: &str, new_name: &str) -> Result<(String, Vec<Value>)> {
    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(old_name)))
        .map_err(|e| Error::Execution(format!("invalid rename pattern: {e}")))?;
    let count = pattern.find_iter(code).count();
    if count == 0 {
        return Ok((code.to_string(), Vec::new()));
    }
    let renamed = pattern.replace_all(code, new_name).into_owned();
    Ok((
        renamed,
        vec![json!({
            "kind": "rename",
            "description": format!("renamed '{old_name}' to '{new_name}' ({count} occurrence(s))"),
            "occurrences": count,
        })],
    ))
}

fn metrics(original: &str, refactored: &str) -> Value {
    let original_lines = original.lines().count() as i64;
    let refactored_lines = refactored.lines().count() as i64;
    json!({
        "line_delta": refactored_lines - original_lines,
        "original_lines": original_lines,
        "refactored_lines": refactored_lines,
        "chars_removed": (original.len() as i64 - refactored.len() as i64).max(0),
    })
}

fn build_prompt(request: &RefactoringRequest) -> String {
    let instructions = request
        .parameters
        .as_ref()
        .and_then(|params| params.get("instructions"))
        .and_then(Value::as_str)
        .map_or_else(String::new, |i| format!("\nInstructions: {i}"));
    format!(
        "Apply a '{}' refactoring to the following {} code.{instructions}\n\n\
         ```{}\n{}\n```\n\n\
         Answer with the refactored code only, inside a single code block.",
        request.refactoring_type, request.language, request.language, request.code
    )
}

/// Deterministic local refactoring.
fn local_refactor(request: &RefactoringRequest) -> Result<RefactoringResponse> {
    let (refactored, mut changes, explanation) = match request.refactoring_type.as_str() {
        "rename" => {
            let params = request.parameters.as_ref();
            let old_name = params
                .and_then(|p| p.get("old_name"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::Validation("rename requires parameters.old_name".to_string())
                })?;
            let new_name = params
                .and_then(|p| p.get("new_name"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::Validation("rename requires parameters.new_name".to_string())
                })?;
            let (renamed, changes) = rename_identifier(&request.code, old_name, new_name)?;
            (
                renamed,
                changes,
                format!("Renamed '{old_name}' to '{new_name}' with word-boundary matching."),
            )
        }
        _ => {
            let (cleaned, changes) = clean_code(&request.code);
            (
                cleaned,
                changes,
                format!(
                    "Applied deterministic cleanup for '{}': whitespace normalization and blank-line collapsing.",
                    request.refactoring_type
                ),
            )
        }
    };

    if changes.is_empty() {
        changes.push(json!({
            "kind": "none",
            "description": "no applicable transformation found",
        }));
    }

    Ok(RefactoringResponse {
        improvement_metrics: Some(metrics(&request.code, &refactored)),
        refactored_code: refactored,
        original_code: request.code.clone(),
        language: request.language.clone(),
        changes,
        explanation,
    })
}

/// Runs the refactoring. Exposed for in-crate integration tests.
pub(crate) fn run(
    request: &RefactoringRequest,
    ctx: &ExecutionContext<'_>,
) -> Result<RefactoringResponse> {
    if !REFACTORING_TYPES.contains(&request.refactoring_type.as_str()) {
        return Err(Error::Validation(format!(
            "refactoring type '{}' is invalid. Use: {}",
            request.refactoring_type,
            REFACTORING_TYPES.join(", ")
        )));
    }

    // Rename has a fully deterministic local path; the LLM adds nothing.
    if request.refactoring_type == "rename" {
        return local_refactor(request);
    }

    let local = local_refactor(request)?;
    Ok(with_llm_fallback(
        ctx.llm_manager(),
        || build_prompt(request),
        |raw| {
            let code = strip_code_fence(raw);
            if code.trim().is_empty() {
                return Err(Error::ExternalService {
                    service: "llm".to_string(),
                    cause: "empty refactoring".to_string(),
                });
            }
            Ok(RefactoringResponse {
                improvement_metrics: Some(metrics(&request.code, &code)),
                refactored_code: code,
                original_code: request.code.clone(),
                language: request.language.clone(),
                changes: vec![json!({
                    "kind": request.refactoring_type,
                    "description": format!("LLM-applied '{}' refactoring", request.refactoring_type),
                })],
                explanation: format!(
                    "Applied '{}' refactoring through the configured LLM provider.",
                    request.refactoring_type
                ),
            })
        },
        || local.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Services;

    #[test]
    fn test_clean_refactoring() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = RefactoringRequest {
            code: "def f():   \n    return 1\n\n\n\ndef g():\n    return 2\n".to_string(),
            language: "python".to_string(),
            session_id: None,
            refactoring_type: "clean".to_string(),
            parameters: None,
            file_path: None,
        };
        let response = run(&request, &ctx).expect("run");
        assert!(!response.refactored_code.contains("   \n"));
        assert!(!response.refactored_code.contains("\n\n\n"));
        assert!(!response.changes.is_empty());
        assert!(response.improvement_metrics.is_some());
    }

    #[test]
    fn test_rename_refactoring() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = RefactoringRequest {
            code: "def old_name():\n    return old_name\n\nrenamed = old_name_extended\n"
                .to_string(),
            language: "python".to_string(),
            session_id: None,
            refactoring_type: "rename".to_string(),
            parameters: Some(json!({"old_name": "old_name", "new_name": "new_name"})),
            file_path: None,
        };
        let response = run(&request, &ctx).expect("run");
        assert!(response.refactored_code.contains("def new_name"));
        // Word boundaries protect the longer identifier.
        assert!(response.refactored_code.contains("old_name_extended"));
        assert_eq!(response.changes.len(), 1);
        assert_eq!(response.changes[0]["occurrences"], json!(2));
    }

    #[test]
    fn test_rename_requires_parameters() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = RefactoringRequest {
            code: "x = 1\n".to_string(),
            language: "python".to_string(),
            session_id: None,
            refactoring_type: "rename".to_string(),
            parameters: None,
            file_path: None,
        };
        assert!(run(&request, &ctx).is_err());
    }

    #[test]
    fn test_invalid_type_rejected() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = RefactoringRequest {
            code: "x = 1\n".to_string(),
            language: "python".to_string(),
            session_id: None,
            refactoring_type: "rewrite_everything".to_string(),
            parameters: None,
            file_path: None,
        };
        assert!(run(&request, &ctx).is_err());
    }
}
