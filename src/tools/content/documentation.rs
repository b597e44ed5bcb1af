//! Documentation generation tool.

use super::comment_prefix;
use crate::llm::with_llm_fallback;
use crate::models::ParsedCode;
use crate::tools::{parse_request, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

const FORMATS: &[&str] = &["markdown", "rst", "html", "docstring"];
const STYLES: &[&str] = &["standard", "detailed", "minimal", "api"];

/// Documentation request.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentationRequest {
    /// Code to document.
    pub code: String,
    /// Code language.
    pub language: String,
    /// Session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// `standard`, `detailed`, `minimal`, or `api`.
    #[serde(default = "default_style")]
    pub doc_style: String,
    /// `markdown`, `rst`, `html`, or `docstring`.
    #[serde(default = "default_format")]
    pub doc_format: String,
    /// Include usage examples.
    #[serde(default)]
    pub include_examples: bool,
    /// File the code comes from.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Elements to document (functions, classes, modules, all).
    #[serde(default)]
    pub focus_on: Option<String>,
}

fn default_style() -> String {
    "standard".to_string()
}

fn default_format() -> String {
    "markdown".to_string()
}

/// Documentation response.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentationResponse {
    /// The generated documentation.
    pub documentation: String,
    /// Language of the documented code.
    pub language: String,
    /// Documentation format.
    pub format: String,
    /// Documented elements.
    pub documented_elements: Vec<HashMap<String, String>>,
    /// Share of code elements covered by the documentation (0-100).
    pub coverage: f64,
    /// Improvement suggestions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// The documentation tool.
#[derive(Debug, Default)]
pub struct DocumentationTool;

impl DocumentationTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for DocumentationTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "code_documentation",
            "Automatically generates code documentation in several formats",
        )
        .category("documentation")
        .required(&["code", "language"])
        .optional(&[
            "session_id",
            "doc_style",
            "doc_format",
            "include_examples",
            "file_path",
            "focus_on",
        ])
        .languages(&[
            "python",
            "javascript",
            "typescript",
            "java",
            "csharp",
            "go",
            "rust",
            "php",
        ])
        .long_running(true)
        .capabilities(&[
            "markdown, rst, html, docstring output formats",
            "standard, detailed, minimal, api styles",
            "Coverage estimation over parsed code elements",
            "Deterministic parser-driven fallback without an LLM",
        ])
    }

    fn execute(&self, args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: DocumentationRequest = parse_request(args)?;
        let response = run(&request, ctx)?;
        to_response(&response)
    }
}

fn documented_elements(view: &ParsedCode) -> Vec<HashMap<String, String>> {
    let mut elements = Vec::new();
    for function in view.functions.iter().filter(|f| !f.is_method) {
        elements.push(HashMap::from([
            ("type".to_string(), "function".to_string()),
            ("name".to_string(), function.name.clone()),
        ]));
    }
    for class in &view.classes {
        elements.push(HashMap::from([
            ("type".to_string(), "class".to_string()),
            ("name".to_string(), class.name.clone()),
        ]));
        for method in &class.methods {
            elements.push(HashMap::from([
                ("type".to_string(), "method".to_string()),
                ("name".to_string(), format!("{}.{}", class.name, method.name)),
            ]));
        }
    }
    elements
}

fn coverage(view: &ParsedCode) -> f64 {
    let mut total = 0usize;
    let mut documented = 0usize;
    for function in view.functions.iter().filter(|f| !f.is_method) {
        total += 1;
        if function.docstring.is_some() {
            documented += 1;
        }
    }
    for class in &view.classes {
        total += 1;
        if class.docstring.is_some() {
            documented += 1;
        }
        for method in &class.methods {
            total += 1;
            if method.docstring.is_some() {
                documented += 1;
            }
        }
    }
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = documented as f64 / total as f64;
    (ratio * 100.0).round()
}

fn signature_line(function: &crate::models::FunctionInfo) -> String {
    let params: Vec<String> = function
        .params
        .iter()
        .map(|param| {
            let mut rendered = param.name.clone();
            if let Some(annotation) = &param.type_annotation {
                rendered.push_str(&format!(": {annotation}"));
            }
            if let Some(default) = &param.default {
                rendered.push_str(&format!(" = {default}"));
            }
            rendered
        })
        .collect();
    let returns = function
        .return_type
        .as_deref()
        .map_or_else(String::new, |r| format!(" -> {r}"));
    format!("{}({}){returns}", function.name, params.join(", "))
}

/// Builds the markdown rendition, then converts to the requested format.
fn markdown_documentation(view: &ParsedCode, request: &DocumentationRequest) -> String {
    let mut doc = String::new();
    let module_name = request
        .file_path
        .as_deref()
        .and_then(|path| path.rsplit('/').next())
        .unwrap_or("module");
    doc.push_str(&format!("# {module_name}\n\n"));
    doc.push_str(&format!(
        "{} module: {} function(s), {} class(es).\n",
        view.language,
        view.functions.iter().filter(|f| !f.is_method).count(),
        view.classes.len()
    ));

    let functions: Vec<&crate::models::FunctionInfo> =
        view.functions.iter().filter(|f| !f.is_method).collect();
    if !functions.is_empty() {
        doc.push_str("\n## Functions\n");
        for function in functions {
            doc.push_str(&format!("\n### `{}`\n", signature_line(function)));
            if let Some(docstring) = &function.docstring {
                doc.push_str(&format!("\n{docstring}\n"));
            }
            if request.doc_style == "detailed" && !function.params.is_empty() {
                doc.push_str("\nParameters:\n");
                for param in &function.params {
                    doc.push_str(&format!(
                        "- `{}`{}\n",
                        param.name,
                        param
                            .type_annotation
                            .as_deref()
                            .map_or_else(String::new, |t| format!(" ({t})"))
                    ));
                }
            }
            if request.include_examples {
                doc.push_str(&format!(
                    "\nExample:\n```{}\n{}(...)\n```\n",
                    view.language, function.name
                ));
            }
        }
    }

    if !view.classes.is_empty() {
        doc.push_str("\n## Classes\n");
        for class in &view.classes {
            doc.push_str(&format!("\n### `{}`\n", class.name));
            if let Some(docstring) = &class.docstring {
                doc.push_str(&format!("\n{docstring}\n"));
            }
            if request.doc_style != "minimal" {
                for method in &class.methods {
                    doc.push_str(&format!("- `{}`", signature_line(method)));
                    if let Some(docstring) = &method.docstring {
                        doc.push_str(&format!(" — {docstring}"));
                    }
                    doc.push('\n');
                }
            }
        }
    }

    doc
}

/// Converts the markdown rendition into the requested output format.
fn convert_format(markdown: &str, format: &str, language: &str) -> String {
    match format {
        "rst" => markdown
            .lines()
            .map(|line| {
                if let Some(title) = line.strip_prefix("### ") {
                    format!("{title}\n{}", "~".repeat(title.len()))
                } else if let Some(title) = line.strip_prefix("## ") {
                    format!("{title}\n{}", "-".repeat(title.len()))
                } else if let Some(title) = line.strip_prefix("# ") {
                    format!("{title}\n{}", "=".repeat(title.len()))
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        "html" => {
            let mut html = String::from("<article>\n");
            for line in markdown.lines() {
                if let Some(title) = line.strip_prefix("### ") {
                    html.push_str(&format!("<h3>{title}</h3>\n"));
                } else if let Some(title) = line.strip_prefix("## ") {
                    html.push_str(&format!("<h2>{title}</h2>\n"));
                } else if let Some(title) = line.strip_prefix("# ") {
                    html.push_str(&format!("<h1>{title}</h1>\n"));
                } else if let Some(item) = line.strip_prefix("- ") {
                    html.push_str(&format!("<li>{item}</li>\n"));
                } else if !line.is_empty() {
                    html.push_str(&format!("<p>{line}</p>\n"));
                }
            }
            html.push_str("</article>\n");
            html
        }
        "docstring" => {
            let prefix = comment_prefix(language);
            markdown
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        prefix.to_string()
                    } else {
                        format!("{prefix} {line}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        _ => markdown.to_string(),
    }
}

fn build_prompt(request: &DocumentationRequest, view: &ParsedCode) -> String {
    format!(
        "Generate {} documentation ({} style) for the following {} code.\n\
         Document every function and class; the parser sees {} function(s) and {} class(es).\n\n\
         ```{}\n{}\n```\n\n\
         Answer with the documentation only.",
        request.doc_format,
        request.doc_style,
        request.language,
        view.functions.len(),
        view.classes.len(),
        request.language,
        request.code
    )
}

/// Runs the generation. Exposed for in-crate integration tests.
pub(crate) fn run(
    request: &DocumentationRequest,
    ctx: &ExecutionContext<'_>,
) -> Result<DocumentationResponse> {
    if !FORMATS.contains(&request.doc_format.as_str()) {
        return Err(Error::Validation(format!(
            "format '{}' is invalid. Use: {}",
            request.doc_format,
            FORMATS.join(", ")
        )));
    }
    if !STYLES.contains(&request.doc_style.as_str()) {
        return Err(Error::Validation(format!(
            "style '{}' is invalid. Use: {}",
            request.doc_style,
            STYLES.join(", ")
        )));
    }

    let view = ctx
        .services
        .parser
        .parse(&request.code, Some(&request.language));
    let elements = documented_elements(&view);
    let coverage_value = coverage(&view);

    let response = with_llm_fallback(
        ctx.llm_manager(),
        || build_prompt(request, &view),
        |raw| {
            if raw.trim().is_empty() {
                return Err(Error::ExternalService {
                    service: "llm".to_string(),
                    cause: "empty documentation".to_string(),
                });
            }
            Ok(DocumentationResponse {
                documentation: convert_format(raw.trim(), &request.doc_format, &request.language),
                language: request.language.clone(),
                format: request.doc_format.clone(),
                documented_elements: elements.clone(),
                coverage: coverage_value,
                suggestions: None,
            })
        },
        || {
            let markdown = markdown_documentation(&view, request);
            DocumentationResponse {
                documentation: convert_format(&markdown, &request.doc_format, &request.language),
                language: request.language.clone(),
                format: request.doc_format.clone(),
                documented_elements: elements.clone(),
                coverage: coverage_value,
                suggestions: Some(vec![
                    "Parser-driven documentation: configure an LLM provider for richer prose"
                        .to_string(),
                ]),
            }
        },
    );
    Ok(response)
}
