//! Code explanation tool.

use crate::llm::with_llm_fallback;
use crate::models::ParsedCode;
use crate::tools::{parse_request, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Code explanation request.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeExplanationRequest {
    /// Code to explain.
    pub code: String,
    /// Language; auto-detected when absent.
    #[serde(default)]
    pub language: Option<String>,
    /// Session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// `basic`, `medium`, or `detailed`.
    #[serde(default = "default_detail")]
    pub detail_level: String,
    /// Aspects to focus on (algorithms, structures, ...).
    #[serde(default)]
    pub focus_on: Option<Vec<String>>,
}

fn default_detail() -> String {
    "medium".to_string()
}

/// Code explanation response.
#[derive(Debug, Clone, Serialize)]
pub struct CodeExplanationResponse {
    /// The explanation.
    pub explanation: String,
    /// Language of the analyzed code.
    pub language: String,
    /// Complexity assessment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    /// Key components identified in the code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_components: Option<Vec<HashMap<String, String>>>,
    /// Improvement suggestions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// The code explanation tool.
#[derive(Debug, Default)]
pub struct CodeExplanationTool;

impl CodeExplanationTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for CodeExplanationTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "code_explanation",
            "Analyzes and explains code in several programming languages",
        )
        .category("explanation")
        .required(&["code"])
        .optional(&["language", "session_id", "detail_level", "focus_on"])
        .languages(&[
            "python",
            "javascript",
            "typescript",
            "java",
            "csharp",
            "go",
            "rust",
            "php",
            "ruby",
        ])
        .long_running(true)
        .capabilities(&[
            "Structural code analysis",
            "Key component identification",
            "Complexity assessment",
            "Deterministic structural explanation without an LLM",
        ])
    }

    fn execute(&self, args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: CodeExplanationRequest = parse_request(args)?;
        let response = run(&request, ctx);
        to_response(&response)
    }
}

fn assess_complexity(view: &ParsedCode) -> String {
    let lines = view.raw.lines().count();
    let units = view.functions.len() + view.classes.len();
    if lines > 200 || units > 15 {
        "high".to_string()
    } else if lines > 50 || units > 5 {
        "moderate".to_string()
    } else {
        "low".to_string()
    }
}

fn key_components(view: &ParsedCode) -> Vec<HashMap<String, String>> {
    let mut components = Vec::new();
    for class in &view.classes {
        components.push(HashMap::from([
            ("type".to_string(), "class".to_string()),
            ("name".to_string(), class.name.clone()),
            (
                "description".to_string(),
                class
                    .docstring
                    .clone()
                    .unwrap_or_else(|| format!("class with {} method(s)", class.methods.len())),
            ),
        ]));
    }
    for function in &view.functions {
        if function.is_method {
            continue;
        }
        components.push(HashMap::from([
            ("type".to_string(), "function".to_string()),
            ("name".to_string(), function.name.clone()),
            (
                "description".to_string(),
                function
                    .docstring
                    .clone()
                    .unwrap_or_else(|| format!("function with {} parameter(s)", function.params.len())),
            ),
        ]));
    }
    components
}

fn structural_explanation(view: &ParsedCode, detail_level: &str) -> String {
    let mut parts = vec![format!(
        "This {} code defines {} function(s) and {} class(es) across {} line(s).",
        view.language,
        view.functions.len(),
        view.classes.len(),
        view.raw.lines().count()
    )];

    if !view.imports.is_empty() {
        let names: Vec<String> = view
            .imports
            .iter()
            .filter_map(|import| import.name.clone().or_else(|| import.statement.clone()))
            .take(8)
            .collect();
        parts.push(format!("It depends on: {}.", names.join(", ")));
    }

    if detail_level != "basic" {
        for function in view.functions.iter().filter(|f| !f.is_method).take(10) {
            let params: Vec<&str> = function.params.iter().map(|p| p.name.as_str()).collect();
            let doc = function
                .docstring
                .as_deref()
                .map_or_else(String::new, |d| format!(" — {d}"));
            parts.push(format!(
                "`{}({})`{doc}",
                function.name,
                params.join(", ")
            ));
        }
        for class in view.classes.iter().take(10) {
            let methods: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
            parts.push(format!(
                "`{}` exposes: {}.",
                class.name,
                if methods.is_empty() {
                    "no methods".to_string()
                } else {
                    methods.join(", ")
                }
            ));
        }
    }

    parts.join("\n")
}

fn build_prompt(request: &CodeExplanationRequest, view: &ParsedCode) -> String {
    let focus = request.focus_on.as_ref().map_or_else(String::new, |focus| {
        format!("\nFocus on: {}.", focus.join(", "))
    });
    format!(
        "Explain the following {} code at a {} level of detail.{focus}\n\n\
         Structural hints: {} function(s), {} class(es), {} import(s).\n\n\
         ```{}\n{}\n```",
        view.language,
        request.detail_level,
        view.functions.len(),
        view.classes.len(),
        view.imports.len(),
        view.language,
        request.code
    )
}

fn run(request: &CodeExplanationRequest, ctx: &ExecutionContext<'_>) -> CodeExplanationResponse {
    let view = ctx
        .services
        .parser
        .parse(&request.code, request.language.as_deref());
    let language = view.language.clone();
    let complexity = assess_complexity(&view);
    let components = key_components(&view);

    with_llm_fallback(
        ctx.llm_manager(),
        || build_prompt(request, &view),
        |raw| {
            if raw.trim().is_empty() {
                return Err(crate::Error::ExternalService {
                    service: "llm".to_string(),
                    cause: "empty explanation".to_string(),
                });
            }
            Ok(CodeExplanationResponse {
                explanation: raw.trim().to_string(),
                language: language.clone(),
                complexity: Some(complexity.clone()),
                key_components: Some(components.clone()),
                suggestions: None,
            })
        },
        || CodeExplanationResponse {
            explanation: structural_explanation(&view, &request.detail_level),
            language: language.clone(),
            complexity: Some(complexity.clone()),
            key_components: Some(components.clone()),
            suggestions: Some(vec![
                "Structural explanation only: configure an LLM provider for prose analysis"
                    .to_string(),
            ]),
        },
    )
}
