//! Impact analysis.
//!
//! Given a natural-language change intent and a file bundle, identifies
//! the files the change would touch, infers risks, and produces search
//! queries and test recommendations to complete the picture. The
//! verb-object extraction tables carry both French and English forms, as
//! shipped; they are data, not behavior.

use super::{parse_request, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::llm::LlmManager;
use crate::models::{detect_language_from_extension, FileInput, Severity};
use crate::parser::python;
use crate::{Error, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Caps applied to the response lists.
const MAX_IMPACTED_FILES: usize = 50;
const MAX_SEARCH_QUERIES: usize = 20;
const MAX_TESTS: usize = 15;
const MAX_FOLLOWUPS: usize = 10;
const MAX_INSIGHTS: usize = 10;

/// Verb-object patterns extracting identifiers from the intent.
static IDENTIFIER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"renommer\s+['"`]?(\w+)['"`]?\s+(?:en|vers|to)\s+['"`]?(\w+)['"`]?"#,
        r#"rename\s+['"`]?(\w+)['"`]?\s+(?:to|as)\s+['"`]?(\w+)['"`]?"#,
        r#"modifier\s+(?:l[ea']?\s*)?['"`]?(\w+)['"`]?"#,
        r#"modify\s+['"`]?(\w+)['"`]?"#,
        r#"supprimer\s+(?:l[ea']?\s*)?['"`]?(\w+)['"`]?"#,
        r#"delete\s+['"`]?(\w+)['"`]?"#,
        r#"ajouter\s+(?:un[e]?\s*)?['"`]?(\w+)['"`]?"#,
        r#"add\s+['"`]?(\w+)['"`]?"#,
        r#"changer\s+(?:l[ea']?\s*)?['"`]?(\w+)['"`]?"#,
        r#"change\s+['"`]?(\w+)['"`]?"#,
        r"/api/[\w/]+",
    ]
    .iter()
    .map(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("valid regex")
    })
    .collect()
});

/// PascalCase and snake_case identifier heuristics.
static NAMING_HEURISTICS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:[A-Z][a-z]+)+|[a-z]+(?:_[a-z]+)+)\b").expect("valid regex")
});

/// HTTP endpoint patterns over intent and file contents.
static API_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:GET|POST|PUT|DELETE|PATCH)\s+(/[\w/{}:-]+)",
        r#"@(?:app|router|api)\.(?:get|post|put|delete|patch)\s*\(\s*['"]([^'"]+)['"]"#,
        r#"fetch\s*\(\s*['"`]([^'"`]+)['"`]"#,
        r#"axios\.(?:get|post|put|delete|patch)\s*\(\s*['"`]([^'"`]+)['"`]"#,
    ]
    .iter()
    .map(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("valid regex")
    })
    .collect()
});

/// Risk families: (category, [(pattern, description)]).
static RISK_PATTERNS: LazyLock<Vec<(&'static str, Vec<(Regex, &'static str)>)>> =
    LazyLock::new(|| {
        let compile = |p: &str| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("valid regex")
        };
        vec![
            (
                "breaking_change",
                vec![
                    (compile(r"def\s+(\w+)\s*\([^)]*\)\s*:"), "Function signature change"),
                    (compile(r"class\s+(\w+)\s*(?:\([^)]*\))?:"), "Class definition change"),
                    (
                        compile(r"export\s+(?:default\s+)?(?:function|class|const)\s+(\w+)"),
                        "Modified export",
                    ),
                ],
            ),
            (
                "security",
                vec![
                    (compile(r"(?:password|secret|token|key|api_key)\s*="), "Sensitive variable"),
                    (compile(r"(?:eval|exec)\s*\("), "Dynamic execution"),
                    (
                        compile(r"(?:innerHTML|dangerouslySetInnerHTML)"),
                        "Potential HTML injection",
                    ),
                ],
            ),
            (
                "data_migration",
                vec![
                    (
                        compile(r"(?:CREATE|ALTER|DROP)\s+(?:TABLE|INDEX|DATABASE)"),
                        "Schema change",
                    ),
                    (compile(r"\.migrate\s*\("), "Data migration"),
                    (
                        compile(r"(?:model|schema)\.(?:add|remove|change)_field"),
                        "Model change",
                    ),
                ],
            ),
            (
                "performance",
                vec![
                    (compile(r"for\s+\w+\s+in\s+.*for\s+\w+\s+in"), "Nested loop"),
                    (compile(r"\.all\(\)"), "Full in-memory load"),
                    (compile(r"SELECT\s+\*"), "Unbounded SELECT"),
                ],
            ),
        ]
    });

static JS_IMPORT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"import\s+(?:\{[^}]+\}|\*\s+as\s+\w+|\w+)\s+from\s+['"]([^'"]+)['"]"#,
        r#"require\s*\(\s*['"]([^'"]+)['"]"#,
        r#"import\s*\(\s*['"]([^'"]+)['"]"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Impact analysis request.
#[derive(Debug, Clone, Deserialize)]
pub struct ImpactAnalysisRequest {
    /// Description of the intended change.
    pub change_intent: String,
    /// Files to analyze.
    pub files: Vec<FileInput>,
    /// Unified diff of the proposed change, when available.
    #[serde(default)]
    pub diff: Option<String>,
    /// Entry points worth special attention.
    #[serde(default)]
    pub entry_points: Option<Vec<String>>,
    /// Project constraints or assumptions.
    #[serde(default)]
    pub assumptions: Option<Vec<String>>,
    /// `conservative`, `balanced`, or `aggressive`.
    #[serde(default = "default_confidence_mode")]
    pub confidence_mode: String,
    /// `fast` (heuristics) or `deep` (LLM enrichment).
    #[serde(default = "default_depth")]
    pub analysis_depth: String,
}

fn default_confidence_mode() -> String {
    "balanced".to_string()
}

fn default_depth() -> String {
    "fast".to_string()
}

/// A file potentially impacted by the change.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactedFile {
    /// File path.
    pub path: String,
    /// Why the file is impacted.
    pub reason: String,
    /// `high`, `medium`, or `low`.
    pub confidence: String,
    /// `direct`, `indirect`, or `test`.
    pub impact_type: String,
}

/// One identified risk.
#[derive(Debug, Clone, Serialize)]
pub struct RiskNote {
    /// `breaking_change`, `security`, `data_migration`, `performance`, `compat`.
    pub category: String,
    /// Risk description.
    pub note: String,
    /// Confidence level.
    pub confidence: String,
    /// Risk severity.
    pub severity: Severity,
}

/// A search query for the IDE.
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    /// The search pattern.
    pub query: String,
    /// Why to search for it.
    pub rationale: String,
    /// `text`, `regex`, or `symbol`.
    pub search_type: String,
}

/// A recommended test command.
#[derive(Debug, Clone, Serialize)]
pub struct TestRecommendation {
    /// Command to execute.
    pub command: String,
    /// Why this test matters.
    pub rationale: String,
    /// `unit`, `integration`, or `e2e`.
    pub scope: String,
    /// Recommendation priority.
    pub priority: String,
}

/// A followup action.
#[derive(Debug, Clone, Serialize)]
pub struct FollowupAction {
    /// What to do.
    pub action: String,
    /// Why.
    pub rationale: String,
}

/// An LLM insight (deep mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmInsight {
    /// `semantic`, `architectural`, `business`, or `suggestion`.
    pub category: String,
    /// The insight.
    pub insight: String,
    /// Confidence attributed by the model.
    #[serde(default = "default_medium")]
    pub confidence: String,
}

fn default_medium() -> String {
    "medium".to_string()
}

/// Impact analysis response.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactAnalysisResponse {
    /// The analyzed change intent.
    pub change_summary: String,
    /// Impacted files (≤50).
    pub impacted_files: Vec<ImpactedFile>,
    /// Identified risks.
    pub risk_notes: Vec<RiskNote>,
    /// Search queries (≤20).
    pub search_queries: Vec<SearchQuery>,
    /// Recommended tests (≤15).
    pub tests_to_run: Vec<TestRecommendation>,
    /// Followups (≤10).
    pub followups: Vec<FollowupAction>,
    /// One-line summary.
    pub analysis_summary: String,
    /// LLM insights (deep mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_insights: Option<Vec<LlmInsight>>,
    /// LLM semantic summary (deep mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_summary: Option<String>,
    /// Depth actually used.
    pub analysis_depth_used: String,
}

/// The impact analysis tool.
#[derive(Debug, Default)]
pub struct ImpactAnalysisTool;

impl ImpactAnalysisTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for ImpactAnalysisTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "impact_analysis",
            "Analyzes the impact of a code change: impacted files, risks, tests to run",
        )
        .category("analysis")
        .required(&["change_intent", "files"])
        .optional(&[
            "diff",
            "entry_points",
            "assumptions",
            "confidence_mode",
            "analysis_depth",
        ])
        .languages(&[
            "python",
            "typescript",
            "javascript",
            "java",
            "go",
            "rust",
            "ruby",
            "any",
        ])
        .capabilities(&[
            "Identification of files impacted by a change",
            "Risk detection (breaking changes, security, migration)",
            "IDE search query generation",
            "Test recommendation",
            "Multi-language support",
        ])
    }

    fn execute(&self, args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: ImpactAnalysisRequest = parse_request(args)?;
        let response = run(&request, ctx.llm_manager())?;
        to_response(&response)
    }
}

/// Extracts identifiers from the change intent.
fn extract_identifiers(intent: &str) -> HashSet<String> {
    let mut identifiers = HashSet::new();

    for pattern in IDENTIFIER_PATTERNS.iter() {
        for captures in pattern.captures_iter(intent) {
            if captures.len() == 1 {
                // Pattern without capture groups (API paths): whole match.
                if let Some(matched) = captures.get(0) {
                    if matched.len() > 2 {
                        identifiers.insert(matched.as_str().to_string());
                    }
                }
            }
            for group in captures.iter().skip(1).flatten() {
                if group.len() > 2 {
                    identifiers.insert(group.as_str().to_string());
                }
            }
        }
    }

    for captures in NAMING_HEURISTICS.captures_iter(intent) {
        let word = &captures[1];
        if word.len() > 3 {
            identifiers.insert(word.to_string());
        }
    }

    identifiers
}

/// Extracts HTTP endpoints mentioned in the intent or the files.
fn extract_endpoints(intent: &str, files: &[FileInput]) -> HashSet<String> {
    let mut endpoints = HashSet::new();
    for pattern in API_PATTERNS.iter() {
        for captures in pattern.captures_iter(intent) {
            let value = captures
                .get(1)
                .map_or_else(|| captures[0].to_string(), |m| m.as_str().to_string());
            endpoints.insert(value);
        }
        for file in files {
            for captures in pattern.captures_iter(&file.content) {
                let value = captures
                    .get(1)
                    .map_or_else(|| captures[0].to_string(), |m| m.as_str().to_string());
                endpoints.insert(value);
            }
        }
    }
    endpoints
}

/// Per-file import list: Python AST-grade, JS/TS regex-grade.
fn collect_imports(files: &[FileInput]) -> Vec<(String, String)> {
    let mut imports = Vec::new();
    for file in files {
        let language = file
            .language
            .clone()
            .unwrap_or_else(|| detect_language_from_extension(&file.path));
        match language.as_str() {
            "python" => {
                if let Some(analysis) = python::analyze(&file.content) {
                    for import in analysis.imports {
                        imports.push((import.display_name, file.path.clone()));
                    }
                }
            }
            "typescript" | "javascript" => {
                for pattern in JS_IMPORT_PATTERNS.iter() {
                    for captures in pattern.captures_iter(&file.content) {
                        imports.push((captures[1].to_string(), file.path.clone()));
                    }
                }
            }
            _ => {}
        }
    }
    imports
}

/// Finds files referencing an identifier, with case variants.
fn find_usages(identifier: &str, files: &[FileInput]) -> Vec<ImpactedFile> {
    let variants = [
        identifier.to_string(),
        identifier.to_lowercase(),
        identifier.replace('_', "-"),
    ];
    let patterns: Vec<Regex> = variants
        .iter()
        .filter_map(|variant| {
            RegexBuilder::new(&format!(r"\b{}\b", regex::escape(variant)))
                .case_insensitive(true)
                .build()
                .ok()
        })
        .collect();

    let mut impacted = Vec::new();
    for file in files {
        for pattern in &patterns {
            let count = pattern.find_iter(&file.content).count();
            if count > 0 {
                impacted.push(ImpactedFile {
                    path: file.path.clone(),
                    reason: format!("contains {count} reference(s) to '{identifier}'"),
                    confidence: if count > 1 { "high" } else { "medium" }.to_string(),
                    impact_type: "direct".to_string(),
                });
                break;
            }
        }
    }
    impacted
}

fn analyze_risks(intent: &str, files: &[FileInput], diff: Option<&str>) -> Vec<RiskNote> {
    let mut risks = Vec::new();

    let mut content = diff.map_or_else(|| intent.to_string(), str::to_string);
    for file in files {
        content.push('\n');
        content.push_str(&file.content);
    }

    for (category, patterns) in RISK_PATTERNS.iter() {
        for (pattern, description) in patterns {
            if pattern.is_match(&content) {
                let severity = if matches!(*category, "security" | "breaking_change") {
                    Severity::High
                } else {
                    Severity::Medium
                };
                risks.push(RiskNote {
                    category: (*category).to_string(),
                    note: (*description).to_string(),
                    confidence: "medium".to_string(),
                    severity,
                });
            }
        }
    }

    let intent_lower = intent.to_lowercase();
    if ["supprimer", "delete", "remove"]
        .iter()
        .any(|kw| intent_lower.contains(kw))
    {
        risks.push(RiskNote {
            category: "breaking_change".to_string(),
            note: "Deletion can break existing dependents".to_string(),
            confidence: "high".to_string(),
            severity: Severity::High,
        });
    }
    if ["renommer", "rename"]
        .iter()
        .any(|kw| intent_lower.contains(kw))
    {
        risks.push(RiskNote {
            category: "breaking_change".to_string(),
            note: "Renaming requires updating every reference".to_string(),
            confidence: "high".to_string(),
            severity: Severity::Medium,
        });
    }
    if ["api", "endpoint", "route"]
        .iter()
        .any(|kw| intent_lower.contains(kw))
    {
        risks.push(RiskNote {
            category: "compat".to_string(),
            note: "API change: verify backward compatibility and documentation".to_string(),
            confidence: "medium".to_string(),
            severity: Severity::Medium,
        });
    }

    risks
}

fn generate_search_queries(
    identifiers: &HashSet<String>,
    endpoints: &HashSet<String>,
    files: &[FileInput],
) -> Vec<SearchQuery> {
    let mut queries = Vec::new();
    let mut sorted_identifiers: Vec<&String> = identifiers.iter().collect();
    sorted_identifiers.sort();
    for identifier in sorted_identifiers.into_iter().take(10) {
        queries.push(SearchQuery {
            query: identifier.clone(),
            rationale: format!("Find every reference to '{identifier}'"),
            search_type: "symbol".to_string(),
        });
    }

    let mut sorted_endpoints: Vec<&String> = endpoints.iter().collect();
    sorted_endpoints.sort();
    for endpoint in sorted_endpoints.into_iter().take(5) {
        queries.push(SearchQuery {
            query: endpoint.clone(),
            rationale: format!("Find callers of endpoint '{endpoint}'"),
            search_type: "text".to_string(),
        });
    }

    if files.iter().any(|file| file.path.ends_with(".py")) {
        queries.push(SearchQuery {
            query: r"from\s+\.\w+\s+import".to_string(),
            rationale: "Find relative imports that may be impacted".to_string(),
            search_type: "regex".to_string(),
        });
    }

    queries
}

fn recommend_tests(
    identifiers: &HashSet<String>,
    files: &[FileInput],
    risks: &[RiskNote],
) -> Vec<TestRecommendation> {
    let mut tests = Vec::new();
    let has_python = files.iter().any(|file| file.path.ends_with(".py"));
    let has_js = files.iter().any(|file| {
        [".js", ".ts", ".jsx", ".tsx"]
            .iter()
            .any(|ext| file.path.ends_with(ext))
    });

    if has_python {
        tests.push(TestRecommendation {
            command: "pytest --tb=short -v".to_string(),
            rationale: "Run every Python unit test".to_string(),
            scope: "unit".to_string(),
            priority: "high".to_string(),
        });
        let mut sorted: Vec<&String> = identifiers.iter().collect();
        sorted.sort();
        for identifier in sorted.into_iter().take(3) {
            tests.push(TestRecommendation {
                command: format!("pytest -k '{identifier}' -v"),
                rationale: format!("Tests related to '{identifier}'"),
                scope: "unit".to_string(),
                priority: "medium".to_string(),
            });
        }
    }

    if has_js {
        tests.push(TestRecommendation {
            command: "npm test -- --passWithNoTests".to_string(),
            rationale: "Run JavaScript/TypeScript tests".to_string(),
            scope: "unit".to_string(),
            priority: "high".to_string(),
        });
        tests.push(TestRecommendation {
            command: "npx jest --findRelatedTests <changed-files>".to_string(),
            rationale: "Tests related to the changed files".to_string(),
            scope: "unit".to_string(),
            priority: "medium".to_string(),
        });
    }

    if risks.iter().any(|risk| risk.category == "breaking_change") {
        tests.push(TestRecommendation {
            command: "# Run the full integration suite".to_string(),
            rationale: "Breaking change detected: integration tests recommended".to_string(),
            scope: "integration".to_string(),
            priority: "high".to_string(),
        });
    }
    if risks.iter().any(|risk| risk.category == "security") {
        tests.push(TestRecommendation {
            command: "# Run security tests".to_string(),
            rationale: "Security risk detected: audit recommended".to_string(),
            scope: "integration".to_string(),
            priority: "high".to_string(),
        });
    }

    tests
}

fn generate_followups(risks: &[RiskNote], impacted_count: usize) -> Vec<FollowupAction> {
    let mut followups = Vec::new();

    if impacted_count > 5 {
        followups.push(FollowupAction {
            action: "Consider incremental refactoring instead of one sweeping change".to_string(),
            rationale: format!("{impacted_count} impacted files: high regression risk"),
        });
    }
    if risks.iter().any(|risk| risk.category == "breaking_change") {
        followups.push(FollowupAction {
            action: "Document the breaking change in the CHANGELOG".to_string(),
            rationale: "Inform users of the change".to_string(),
        });
        followups.push(FollowupAction {
            action: "Check external dependents of this code".to_string(),
            rationale: "Other projects may be impacted".to_string(),
        });
    }
    if risks.iter().any(|risk| risk.category == "data_migration") {
        followups.push(FollowupAction {
            action: "Prepare a data migration script".to_string(),
            rationale: "Schema change detected".to_string(),
        });
        followups.push(FollowupAction {
            action: "Test the migration on a staging environment".to_string(),
            rationale: "Avoid production data loss".to_string(),
        });
    }
    if risks.iter().any(|risk| risk.category == "security") {
        followups.push(FollowupAction {
            action: "Run a security review of the change".to_string(),
            rationale: "Security risk identified".to_string(),
        });
    }
    followups.push(FollowupAction {
        action: "Update the documentation if needed".to_string(),
        rationale: "Keep documentation in sync with the code".to_string(),
    });

    followups
}

#[derive(Debug, Deserialize)]
struct DeepImpactPayload {
    #[serde(default)]
    semantic_summary: String,
    #[serde(default)]
    insights: Vec<LlmInsight>,
}

fn build_deep_prompt(
    request: &ImpactAnalysisRequest,
    impacted: &[ImpactedFile],
    risks: &[RiskNote],
) -> String {
    let mut files_summary = Vec::new();
    for file in request.files.iter().take(5) {
        let preview: String = file.content.chars().take(500).collect();
        let ellipsis = if file.content.len() > 500 { "..." } else { "" };
        files_summary.push(format!("## {}\n```\n{preview}{ellipsis}\n```", file.path));
    }

    let impacts: Vec<String> = impacted
        .iter()
        .take(10)
        .map(|impact| format!("- {}: {}", impact.path, impact.reason))
        .collect();
    let risk_lines: Vec<String> = risks
        .iter()
        .take(10)
        .map(|risk| format!("- {}: {}", risk.category, risk.note))
        .collect();
    let diff_section = request.diff.as_ref().map_or_else(String::new, |diff| {
        let head: String = diff.chars().take(1000).collect();
        format!("## Diff\n{head}\n")
    });

    format!(
        r#"Analyze the impact of the following change on the codebase.

## Intended change
{}

{diff_section}## Files involved
{}

## Static analysis (heuristics)
### Impacted files detected:
{}

### Risks detected:
{}

---

Provide an enriched analysis as strict JSON:
{{
  "semantic_summary": "Concise summary of what this change really does and its overall impact",
  "insights": [
    {{
      "category": "semantic|architectural|business|suggestion",
      "insight": "The detailed insight",
      "confidence": "low|medium|high"
    }}
  ]
}}

Answer ONLY with the JSON, no markdown and no explanation."#,
        request.change_intent,
        files_summary.join("\n"),
        if impacts.is_empty() {
            "None detected".to_string()
        } else {
            impacts.join("\n")
        },
        if risk_lines.is_empty() {
            "None detected".to_string()
        } else {
            risk_lines.join("\n")
        },
    )
}

/// Runs the analysis. Exposed for in-crate integration tests.
pub(crate) fn run(
    request: &ImpactAnalysisRequest,
    llm_manager: Option<&LlmManager>,
) -> Result<ImpactAnalysisResponse> {
    if request.files.is_empty() {
        return Err(Error::Validation("'files' must not be empty".to_string()));
    }
    if !["conservative", "balanced", "aggressive"].contains(&request.confidence_mode.as_str()) {
        return Err(Error::Validation(format!(
            "confidence mode '{}' is invalid. Use: conservative, balanced, aggressive",
            request.confidence_mode
        )));
    }
    if !["fast", "deep"].contains(&request.analysis_depth.as_str()) {
        return Err(Error::Validation(format!(
            "analysis depth '{}' is invalid. Use: fast, deep",
            request.analysis_depth
        )));
    }

    let intent_head: String = request.change_intent.chars().take(50).collect();
    tracing::info!(intent = %intent_head, "running impact analysis");

    let identifiers = extract_identifiers(&request.change_intent);
    let endpoints = extract_endpoints(&request.change_intent, &request.files);
    tracing::debug!(?identifiers, ?endpoints, "extracted change targets");

    let all_imports = collect_imports(&request.files);

    let mut impacted_files: Vec<ImpactedFile> = Vec::new();
    let mut seen_paths: HashSet<String> = HashSet::new();
    let mut sorted_identifiers: Vec<&String> = identifiers.iter().collect();
    sorted_identifiers.sort();
    for identifier in &sorted_identifiers {
        for impact in find_usages(identifier, &request.files) {
            if seen_paths.insert(impact.path.clone()) {
                impacted_files.push(impact);
            }
        }
    }

    match request.confidence_mode.as_str() {
        "conservative" => {
            impacted_files.retain(|impact| impact.confidence == "high");
        }
        "aggressive" => {
            // Infer low-confidence impacts from import modules matching
            // the identifiers.
            for (module, filepath) in &all_imports {
                for identifier in &sorted_identifiers {
                    if module.to_lowercase().contains(&identifier.to_lowercase())
                        && seen_paths.insert(filepath.clone())
                    {
                        impacted_files.push(ImpactedFile {
                            path: filepath.clone(),
                            reason: format!("potentially related import: {module}"),
                            confidence: "low".to_string(),
                            impact_type: "indirect".to_string(),
                        });
                    }
                }
            }
        }
        _ => {}
    }

    let risks = analyze_risks(&request.change_intent, &request.files, request.diff.as_deref());
    let search_queries = generate_search_queries(&identifiers, &endpoints, &request.files);
    let tests = recommend_tests(&identifiers, &request.files, &risks);
    let followups = generate_followups(&risks, impacted_files.len());

    let important_risks = risks
        .iter()
        .filter(|risk| matches!(risk.severity, Severity::High | Severity::Critical))
        .count();
    let risk_summary = if important_risks > 0 {
        format!(" {important_risks} significant risk(s) detected.")
    } else {
        String::new()
    };

    let mut llm_insights: Option<Vec<LlmInsight>> = None;
    let mut semantic_summary = None;
    let mut analysis_depth_used = "fast".to_string();
    if request.analysis_depth == "deep" {
        analysis_depth_used = "deep".to_string();
        if let Some(manager) = llm_manager {
            let prompt = build_deep_prompt(request, &impacted_files, &risks);
            match manager.generate_json::<DeepImpactPayload>(&prompt, None) {
                Ok(payload) => {
                    semantic_summary =
                        Some(payload.semantic_summary).filter(|summary| !summary.is_empty());
                    llm_insights =
                        Some(payload.insights.into_iter().take(MAX_INSIGHTS).collect());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "deep impact analysis failed, keeping heuristics");
                }
            }
        } else {
            tracing::warn!("no LLM manager available for deep impact analysis");
        }
    }

    let mut analysis_summary = format!(
        "Analysis of '{intent_head}...': {} potentially impacted file(s), \
         {} risk(s) identified, {} test(s) recommended.{risk_summary}",
        impacted_files.len(),
        risks.len(),
        tests.len()
    );
    if let Some(insights) = &llm_insights {
        analysis_summary.push_str(&format!(" {} LLM insight(s).", insights.len()));
    }

    impacted_files.truncate(MAX_IMPACTED_FILES);

    Ok(ImpactAnalysisResponse {
        change_summary: request.change_intent.clone(),
        impacted_files,
        risk_notes: risks,
        search_queries: search_queries.into_iter().take(MAX_SEARCH_QUERIES).collect(),
        tests_to_run: tests.into_iter().take(MAX_TESTS).collect(),
        followups: followups.into_iter().take(MAX_FOLLOWUPS).collect(),
        analysis_summary,
        llm_insights,
        semantic_summary,
        analysis_depth_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(intent: &str, files: Vec<FileInput>) -> ImpactAnalysisRequest {
        ImpactAnalysisRequest {
            change_intent: intent.to_string(),
            files,
            diff: None,
            entry_points: None,
            assumptions: None,
            confidence_mode: "balanced".to_string(),
            analysis_depth: "fast".to_string(),
        }
    }

    #[test]
    fn test_identifier_extraction_english_and_french() {
        let english = extract_identifiers("Rename UserService to AuthService");
        assert!(english.contains("UserService"));
        assert!(english.contains("AuthService"));

        let french = extract_identifiers("renommer UserService en AuthService");
        assert!(french.contains("UserService"));
        assert!(french.contains("AuthService"));

        let snake = extract_identifiers("modify the get_user_profile helper");
        assert!(snake.contains("get_user_profile"));
    }

    #[test]
    fn test_endpoint_extraction() {
        let files = vec![FileInput::new(
            "routes.ts",
            "router.get('/users', handler);\nfetch('/api/users/1');\n",
        )];
        let endpoints = extract_endpoints("Modify the API GET /users", &files);
        assert!(endpoints.contains("/users"));
        assert!(endpoints.contains("/api/users/1"));
    }

    #[test]
    fn test_impacted_files_confidence() {
        let files = vec![
            FileInput::new(
                "services/user.py",
                "class UserService:\n    pass\n\nservice = UserService()\n",
            ),
            FileInput::new("README.md", "unrelated\n"),
        ];
        let response =
            run(&request("Rename UserService to AuthService", files), None).expect("run");
        assert_eq!(response.impacted_files.len(), 1);
        assert_eq!(response.impacted_files[0].path, "services/user.py");
        assert_eq!(response.impacted_files[0].confidence, "high");
    }

    #[test]
    fn test_conservative_mode_keeps_only_high() {
        let files = vec![FileInput::new(
            "one.py",
            // Single mention: medium confidence.
            "x = UserService\n",
        )];
        let mut req = request("Rename UserService to AuthService", files);
        req.confidence_mode = "conservative".to_string();
        let response = run(&req, None).expect("run");
        assert!(response.impacted_files.is_empty());
    }

    #[test]
    fn test_rename_and_delete_risks() {
        let files = vec![FileInput::new("a.py", "def f():\n    pass\n")];
        let rename = run(&request("rename f to g", files.clone()), None).expect("run");
        assert!(rename
            .risk_notes
            .iter()
            .any(|risk| risk.category == "breaking_change"));

        let delete = run(&request("delete the f helper", files), None).expect("run");
        assert!(delete
            .risk_notes
            .iter()
            .any(|risk| risk.note.contains("Deletion")));
    }

    #[test]
    fn test_tests_and_queries_for_python() {
        let files = vec![FileInput::new("app.py", "def handler():\n    pass\n")];
        let response = run(&request("modify handler", files), None).expect("run");
        assert!(response
            .tests_to_run
            .iter()
            .any(|test| test.command.starts_with("pytest")));
        assert!(response
            .search_queries
            .iter()
            .any(|query| query.search_type == "regex"));
        assert!(response.search_queries.len() <= MAX_SEARCH_QUERIES);
        assert!(response.tests_to_run.len() <= MAX_TESTS);
    }

    #[test]
    fn test_followups_always_include_documentation() {
        let files = vec![FileInput::new("a.py", "x = 1\n")];
        let response = run(&request("tweak x", files), None).expect("run");
        assert!(response
            .followups
            .iter()
            .any(|followup| followup.action.contains("documentation")));
    }

    #[test]
    fn test_deep_mode_without_llm_falls_back() {
        let files = vec![FileInput::new("a.py", "x = 1\n")];
        let mut req = request("tweak x", files);
        req.analysis_depth = "deep".to_string();
        let response = run(&req, None).expect("run");
        assert_eq!(response.analysis_depth_used, "deep");
        assert!(response.llm_insights.is_none());
        assert!(response.semantic_summary.is_none());
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let files = vec![FileInput::new("a.py", "x = 1\n")];
        let mut req = request("tweak x", files);
        req.confidence_mode = "yolo".to_string();
        assert!(run(&req, None).is_err());
    }
}
