//! Repository consistency checker.
//!
//! Detects the silent inconsistencies AI-generated patches tend to leave
//! behind: unused imports and variables, dead code, duplicated blocks,
//! and (in deep mode) symbols that resolve nowhere in the provided file
//! set. Python checks ride on the AST-grade parser; TypeScript and
//! JavaScript checks are regex-grade.

use super::{parse_request, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::models::{detect_language_from_extension, FileInput, Severity};
use crate::parser::python;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// All checks, in the order they are reported.
const ALL_CHECKS: &[&str] = &[
    "unused_imports",
    "unused_vars",
    "dead_code",
    "duplication",
    "unresolved_symbol",
];

/// Minimum lines in a duplication window.
const DUPLICATION_MIN_LINES: usize = 5;
/// Maximum issues returned in a response.
const MAX_ISSUES: usize = 100;

static JS_NAMED_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s*\{([^}]+)\}\s*from\s*['"][^'"]+['"]"#).expect("valid regex")
});
static JS_DEFAULT_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s+(\w+)\s+from\s*['"][^'"]+['"]"#).expect("valid regex")
});
static JS_NAMESPACE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s*\*\s*as\s+(\w+)\s+from\s*['"][^'"]+['"]"#).expect("valid regex")
});
static JS_VAR_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:const|let|var)\s+(\w+)\s*=").expect("valid regex"));
static JS_DESTRUCTURED_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:const|let|var)\s+\{([^}]+)\}\s*=").expect("valid regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\w+)\b").expect("valid regex"));
static JS_DEFINITIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:function|class)\s+(\w+)",
        r"(?:const|let|var)\s+(\w+)",
        r"import\s+(?:\{[^}]*\}|\*\s+as\s+)?(\w+)",
        r"export\s+(?:default\s+)?(?:function|class|const|let|var)\s+(\w+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(//|#).*$").expect("valid regex"));

/// Python builtins treated as always-resolved.
const PYTHON_BUILTINS: &[&str] = &[
    "print", "len", "range", "str", "int", "float", "bool", "list", "dict", "set", "tuple",
    "type", "isinstance", "hasattr", "getattr", "setattr", "open", "input", "sum", "min", "max",
    "abs", "round", "sorted", "reversed", "enumerate", "zip", "map", "filter", "any", "all",
    "None", "True", "False", "Exception", "ValueError", "TypeError", "KeyError", "IndexError",
    "AttributeError", "super", "property", "staticmethod", "classmethod", "self", "cls",
    "__name__", "__file__",
];

/// JS globals treated as always-resolved.
const JS_GLOBALS: &[&str] = &[
    "console", "window", "document", "fetch", "Promise", "Array", "Object", "String", "Number",
    "Boolean", "JSON", "Math", "Date", "Error", "undefined", "null", "setTimeout", "setInterval",
    "clearTimeout", "clearInterval", "require", "module", "exports", "process", "Buffer",
    "__dirname", "__filename", "global", "this",
];

/// Consistency check request.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsistencyCheckRequest {
    /// Files to analyze.
    pub files: Vec<FileInput>,
    /// Primary language: `python`, `typescript`, `javascript`, or `auto`.
    #[serde(default = "default_language")]
    pub language: String,
    /// Checks to run; all of them when absent.
    #[serde(default)]
    pub checks: Option<Vec<String>>,
    /// `fast` or `deep`. Unresolved-symbol analysis runs in deep mode only.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Minimum confidence (0-100) for reported issues.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u32,
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_mode() -> String {
    "fast".to_string()
}

const fn default_min_confidence() -> u32 {
    60
}

/// One consistency issue.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyIssue {
    /// `unused_import`, `unused_var`, `dead_code`, `duplication`,
    /// `unresolved_symbol`, or `syntax_error`.
    pub kind: String,
    /// Issue severity.
    pub severity: Severity,
    /// File the issue is in.
    pub path: String,
    /// 1-based line number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// 0-based column, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// Human description.
    pub message: String,
    /// Confidence 0-100.
    pub confidence: u32,
    /// Suggested fix, when one is obvious.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    /// Analysis engine that produced the issue.
    pub engine: String,
}

/// Consistency check response.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyCheckResponse {
    /// True when no issues were found.
    pub valid: bool,
    /// Counts: total/high/medium/low/info.
    pub summary: HashMap<String, usize>,
    /// Issues, capped at 100.
    pub issues: Vec<ConsistencyIssue>,
    /// Number of files analyzed.
    pub files_analyzed: usize,
    /// Checks that actually ran.
    pub checks_performed: Vec<String>,
    /// One-line summary.
    pub analysis_summary: String,
}

/// The consistency checker tool.
#[derive(Debug, Default)]
pub struct RepoConsistencyCheckTool;

impl RepoConsistencyCheckTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for RepoConsistencyCheckTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "repo_consistency_check",
            "Detects code inconsistencies: unused imports and variables, dead code, duplication",
        )
        .category("analysis")
        .required(&["files"])
        .optional(&["language", "checks", "mode", "min_confidence"])
        .languages(&["python", "typescript", "javascript", "auto"])
        .capabilities(&[
            "Unused import detection (Python AST-grade, JS/TS regex-grade)",
            "Unused variable detection",
            "Dead code detection (never-referenced functions and classes)",
            "Cross-file code duplication detection",
            "Unresolved symbol detection in deep mode",
            "Multi-file analysis with cross-referencing",
        ])
    }

    fn execute(&self, args: &Value, _ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: ConsistencyCheckRequest = parse_request(args)?;
        let response = run(&request)?;
        to_response(&response)
    }
}

fn file_language(file: &FileInput, request_language: &str) -> String {
    file.language.clone().unwrap_or_else(|| {
        if request_language == "auto" {
            detect_language_from_extension(&file.path)
        } else {
            request_language.to_string()
        }
    })
}

/// Runs the checks. Exposed for in-crate integration tests.
pub(crate) fn run(request: &ConsistencyCheckRequest) -> Result<ConsistencyCheckResponse> {
    if request.files.is_empty() {
        return Err(Error::Validation("'files' must not be empty".to_string()));
    }
    if request.mode != "fast" && request.mode != "deep" {
        return Err(Error::Validation(format!(
            "mode '{}' is invalid. Use: fast, deep",
            request.mode
        )));
    }
    let checks: Vec<String> = match &request.checks {
        Some(checks) => {
            for check in checks {
                if !ALL_CHECKS.contains(&check.as_str()) {
                    return Err(Error::Validation(format!(
                        "check '{check}' is invalid. Use: {}",
                        ALL_CHECKS.join(", ")
                    )));
                }
            }
            checks.clone()
        }
        None => ALL_CHECKS.iter().map(|s| (*s).to_string()).collect(),
    };

    tracing::info!(files = request.files.len(), "running consistency checks");

    let mut issues: Vec<ConsistencyIssue> = Vec::new();
    let all_contents: String = request
        .files
        .iter()
        .map(|f| f.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    for file in &request.files {
        let language = file_language(file, &request.language);
        match language.as_str() {
            "python" => {
                if checks.iter().any(|c| c == "unused_imports") {
                    issues.extend(python_unused_imports(&file.content, &file.path));
                }
                if checks.iter().any(|c| c == "unused_vars") {
                    issues.extend(python_unused_vars(&file.content, &file.path));
                }
                if checks.iter().any(|c| c == "dead_code") {
                    issues.extend(python_dead_code(&file.content, &file.path, &all_contents));
                }
            }
            "typescript" | "javascript" => {
                if checks.iter().any(|c| c == "unused_imports") {
                    issues.extend(js_unused_imports(&file.content, &file.path));
                }
                if checks.iter().any(|c| c == "unused_vars") {
                    issues.extend(js_unused_vars(&file.content, &file.path));
                }
            }
            _ => {}
        }
    }

    if checks.iter().any(|c| c == "duplication") && request.files.len() > 1 {
        issues.extend(find_duplication(&request.files, DUPLICATION_MIN_LINES));
    }

    if checks.iter().any(|c| c == "unresolved_symbol") && request.mode == "deep" {
        issues.extend(find_unresolved_symbols(&request.files, &request.language));
    }

    issues.retain(|issue| issue.confidence >= request.min_confidence);

    let mut high = 0usize;
    let mut medium = 0usize;
    let mut low = 0usize;
    let mut info = 0usize;
    for issue in &issues {
        match issue.severity {
            Severity::High | Severity::Critical => high += 1,
            Severity::Medium => medium += 1,
            Severity::Low => low += 1,
            Severity::Info => info += 1,
        }
    }

    let summary = HashMap::from([
        ("total".to_string(), issues.len()),
        ("high".to_string(), high),
        ("medium".to_string(), medium),
        ("low".to_string(), low),
        ("info".to_string(), info),
    ]);

    let analysis_summary = if issues.is_empty() {
        format!(
            "No inconsistencies detected in {} file(s).",
            request.files.len()
        )
    } else {
        format!(
            "{} inconsistency(ies) detected in {} file(s). \
             High({high}), Medium({medium}), Low({low}), Info({info}).",
            issues.len(),
            request.files.len()
        )
    };

    let valid = issues.is_empty();
    issues.truncate(MAX_ISSUES);

    Ok(ConsistencyCheckResponse {
        valid,
        summary,
        issues,
        files_analyzed: request.files.len(),
        checks_performed: checks,
        analysis_summary,
    })
}

// ---------------------------------------------------------------------------
// Python checks (AST-grade)
// ---------------------------------------------------------------------------

fn python_unused_imports(content: &str, path: &str) -> Vec<ConsistencyIssue> {
    let Some(analysis) = python::analyze(content) else {
        return vec![ConsistencyIssue {
            kind: "syntax_error".to_string(),
            severity: Severity::High,
            path: path.to_string(),
            line: None,
            column: None,
            message: "syntax error in Python source".to_string(),
            confidence: 100,
            suggested_fix: None,
            engine: "ast-parser".to_string(),
        }];
    };

    analysis
        .imports
        .iter()
        .filter(|import| !analysis.used_names.contains(&import.local_name))
        .map(|import| ConsistencyIssue {
            kind: "unused_import".to_string(),
            severity: Severity::Low,
            path: path.to_string(),
            line: Some(import.line),
            column: None,
            message: format!(
                "import '{}' (as '{}') is never used",
                import.display_name, import.local_name
            ),
            confidence: 90,
            suggested_fix: Some(format!("Remove the import of {}", import.local_name)),
            engine: "ast-analyzer".to_string(),
        })
        .collect()
}

fn python_unused_vars(content: &str, path: &str) -> Vec<ConsistencyIssue> {
    let Some(analysis) = python::analyze(content) else {
        return Vec::new();
    };

    analysis
        .unused_vars
        .iter()
        .map(|var| ConsistencyIssue {
            kind: "unused_var".to_string(),
            severity: Severity::Medium,
            path: path.to_string(),
            line: Some(var.line),
            column: None,
            message: format!("variable '{}' is assigned but never used", var.name),
            confidence: 80,
            suggested_fix: Some(format!("Remove it or prefix with _: _{}", var.name)),
            engine: "ast-analyzer".to_string(),
        })
        .collect()
}

fn python_dead_code(content: &str, path: &str, all_contents: &str) -> Vec<ConsistencyIssue> {
    let Some(analysis) = python::analyze(content) else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    for (name, line, kind) in &analysis.top_level_defs {
        // The definition itself counts as one occurrence.
        let usage_count = WORD
            .find_iter(all_contents)
            .filter(|m| m.as_str() == name.as_str())
            .count();
        if usage_count <= 1 {
            issues.push(ConsistencyIssue {
                kind: "dead_code".to_string(),
                severity: Severity::Medium,
                path: path.to_string(),
                line: Some(*line),
                column: None,
                message: format!("{kind} '{name}' is defined but never used"),
                confidence: 70,
                suggested_fix: Some(
                    "Remove if unneeded, or check whether it is exported/used elsewhere"
                        .to_string(),
                ),
                engine: "usage-analyzer".to_string(),
            });
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// JS/TS checks (regex-grade)
// ---------------------------------------------------------------------------

fn js_collect_imports(content: &str) -> HashMap<String, usize> {
    let mut imports = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        if let Some(captures) = JS_NAMED_IMPORT.captures(line) {
            for part in captures[1].split(',') {
                let part = part.trim();
                let name = part
                    .split_once(" as ")
                    .map_or(part, |(_, alias)| alias.trim());
                if !name.is_empty() && WORD.is_match(name) && !name.contains(' ') {
                    imports.entry(name.to_string()).or_insert(index + 1);
                }
            }
        }
        if let Some(captures) = JS_NAMESPACE_IMPORT.captures(line) {
            imports.entry(captures[1].to_string()).or_insert(index + 1);
        } else if let Some(captures) = JS_DEFAULT_IMPORT.captures(line) {
            imports.entry(captures[1].to_string()).or_insert(index + 1);
        }
    }
    imports
}

/// Counts occurrences of `name` outside the given line.
fn usages_off_line(content: &str, name: &str, line: usize) -> usize {
    let mut count = 0;
    for (index, candidate_line) in content.lines().enumerate() {
        if index + 1 == line {
            continue;
        }
        count += WORD
            .find_iter(candidate_line)
            .filter(|m| m.as_str() == name)
            .count();
    }
    count
}

fn js_unused_imports(content: &str, path: &str) -> Vec<ConsistencyIssue> {
    js_collect_imports(content)
        .into_iter()
        .filter(|(name, line)| usages_off_line(content, name, *line) == 0)
        .map(|(name, line)| ConsistencyIssue {
            kind: "unused_import".to_string(),
            severity: Severity::Low,
            path: path.to_string(),
            line: Some(line),
            column: None,
            message: format!("import '{name}' is never used"),
            confidence: 85,
            suggested_fix: Some(format!("Remove '{name}' from the import")),
            engine: "regex-analyzer".to_string(),
        })
        .collect()
}

fn js_unused_vars(content: &str, path: &str) -> Vec<ConsistencyIssue> {
    let mut declarations: HashMap<String, usize> = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        for captures in JS_VAR_DECL.captures_iter(line) {
            let name = captures[1].to_string();
            if !name.starts_with('_') {
                declarations.entry(name).or_insert(index + 1);
            }
        }
        for captures in JS_DESTRUCTURED_DECL.captures_iter(line) {
            for name in WORD.find_iter(&captures[1]) {
                let name = name.as_str();
                if !name.starts_with('_') && !matches!(name, "const" | "let" | "var") {
                    declarations.entry(name.to_string()).or_insert(index + 1);
                }
            }
        }
    }

    declarations
        .into_iter()
        .filter(|(name, line)| usages_off_line(content, name, *line) == 0)
        .map(|(name, line)| ConsistencyIssue {
            kind: "unused_var".to_string(),
            severity: Severity::Medium,
            path: path.to_string(),
            line: Some(line),
            column: None,
            message: format!("variable '{name}' is declared but never used"),
            confidence: 75,
            suggested_fix: Some(format!("Remove it or prefix with _: _{name}")),
            engine: "regex-analyzer".to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Cross-language checks
// ---------------------------------------------------------------------------

fn normalize_block_line(line: &str) -> String {
    LINE_COMMENT.replace(line.trim(), "").trim().to_string()
}

/// Hashes every `block_size`-line normalized window of a file.
fn file_blocks(content: &str, block_size: usize) -> HashMap<String, usize> {
    let lines: Vec<&str> = content.lines().collect();
    let mut blocks = HashMap::new();
    if lines.len() < block_size {
        return blocks;
    }
    for start in 0..=(lines.len() - block_size) {
        let normalized: Vec<String> = lines[start..start + block_size]
            .iter()
            .map(|line| normalize_block_line(line))
            .collect();
        // Skip windows that are all-blank or trivially short.
        if normalized.iter().all(|line| line.len() < 3) {
            continue;
        }
        let digest = Sha256::digest(normalized.join("\n").as_bytes());
        blocks.entry(hex::encode(digest)).or_insert(start + 1);
    }
    blocks
}

fn find_duplication(files: &[FileInput], min_lines: usize) -> Vec<ConsistencyIssue> {
    let blocks_per_file: Vec<(&str, HashMap<String, usize>)> = files
        .iter()
        .map(|file| (file.path.as_str(), file_blocks(&file.content, min_lines)))
        .collect();

    let mut issues = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (first_index, (first_path, first_blocks)) in blocks_per_file.iter().enumerate() {
        for (second_path, second_blocks) in blocks_per_file.iter().skip(first_index + 1).map(
            |(path, blocks)| (*path, blocks),
        ) {
            for (hash, first_line) in first_blocks {
                if !second_blocks.contains_key(hash) || !seen.insert(hash.clone()) {
                    continue;
                }
                let second_line = second_blocks[hash];
                issues.push(ConsistencyIssue {
                    kind: "duplication".to_string(),
                    severity: Severity::Low,
                    path: (*first_path).to_string(),
                    line: Some(*first_line),
                    column: None,
                    message: format!("duplicated code block also in {second_path}:{second_line}"),
                    confidence: 80,
                    suggested_fix: Some("Extract into a shared function/module".to_string()),
                    engine: "hash-comparator".to_string(),
                });
            }
        }
    }
    issues
}

fn find_unresolved_symbols(files: &[FileInput], request_language: &str) -> Vec<ConsistencyIssue> {
    let mut defined: HashSet<String> = PYTHON_BUILTINS
        .iter()
        .chain(JS_GLOBALS.iter())
        .map(|s| (*s).to_string())
        .collect();

    // Pass 1: collect every definition in the bundle.
    let mut python_analyses: Vec<(usize, python::PythonAnalysis)> = Vec::new();
    for (index, file) in files.iter().enumerate() {
        match file_language(file, request_language).as_str() {
            "python" => {
                if let Some(analysis) = python::analyze(&file.content) {
                    defined.extend(analysis.definitions.iter().cloned());
                    python_analyses.push((index, analysis));
                }
            }
            "typescript" | "javascript" => {
                for pattern in JS_DEFINITIONS.iter() {
                    for captures in pattern.captures_iter(&file.content) {
                        defined.insert(captures[1].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    // Pass 2: any Python name read that resolves nowhere.
    let mut issues = Vec::new();
    for (index, analysis) in python_analyses {
        let path = &files[index].path;
        for load in &analysis.loads {
            if !defined.contains(&load.name) {
                issues.push(ConsistencyIssue {
                    kind: "unresolved_symbol".to_string(),
                    severity: Severity::High,
                    path: path.clone(),
                    line: Some(load.line),
                    column: Some(load.column),
                    message: format!(
                        "symbol '{}' does not resolve in the provided scope",
                        load.name
                    ),
                    confidence: 60,
                    suggested_fix: Some(format!(
                        "Check the import or definition of '{}'",
                        load.name
                    )),
                    engine: "scope-analyzer".to_string(),
                });
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(files: Vec<FileInput>, checks: Option<Vec<&str>>) -> ConsistencyCheckRequest {
        ConsistencyCheckRequest {
            files,
            language: "auto".to_string(),
            checks: checks.map(|c| c.iter().map(|s| (*s).to_string()).collect()),
            mode: "fast".to_string(),
            min_confidence: 60,
        }
    }

    #[test]
    fn test_python_unused_import() {
        let files = vec![FileInput::new(
            "a.py",
            "import os\nimport json\nprint(os.getcwd())",
        )];
        let response = run(&request(files, Some(vec!["unused_imports"]))).expect("run");
        assert!(!response.valid);
        assert_eq!(response.issues.len(), 1);
        let issue = &response.issues[0];
        assert_eq!(issue.kind, "unused_import");
        assert_eq!(issue.line, Some(2));
        assert_eq!(issue.severity, Severity::Low);
        assert!(issue.confidence >= 80);
        assert!(issue.message.contains("json"));
    }

    #[test]
    fn test_python_unused_var() {
        let files = vec![FileInput::new(
            "a.py",
            "def f():\n    unused = 1\n    kept = 2\n    return kept\n",
        )];
        let response = run(&request(files, Some(vec!["unused_vars"]))).expect("run");
        assert_eq!(response.issues.len(), 1);
        assert_eq!(response.issues[0].kind, "unused_var");
        assert!(response.issues[0].message.contains("unused"));
    }

    #[test]
    fn test_python_dead_code() {
        let files = vec![FileInput::new(
            "a.py",
            "def used():\n    return 1\n\ndef orphan():\n    return 2\n\nused()\n",
        )];
        let response = run(&request(files, Some(vec!["dead_code"]))).expect("run");
        let dead: Vec<&ConsistencyIssue> = response
            .issues
            .iter()
            .filter(|i| i.kind == "dead_code")
            .collect();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].message.contains("orphan"));
        assert_eq!(dead[0].confidence, 70);
    }

    #[test]
    fn test_js_unused_import_and_var() {
        let files = vec![FileInput::new(
            "app.ts",
            "import { used, unused } from './lib';\nconst kept = used();\nconsole.log(kept);\nconst dangling = 1;\n",
        )];
        let response = run(&request(
            files,
            Some(vec!["unused_imports", "unused_vars"]),
        ))
        .expect("run");
        let kinds: Vec<(&str, &str)> = response
            .issues
            .iter()
            .map(|i| (i.kind.as_str(), i.message.as_str()))
            .collect();
        assert!(kinds
            .iter()
            .any(|(kind, msg)| *kind == "unused_import" && msg.contains("unused")));
        assert!(kinds
            .iter()
            .any(|(kind, msg)| *kind == "unused_var" && msg.contains("dangling")));
        assert!(!kinds.iter().any(|(_, msg)| msg.contains("'used'")));
    }

    #[test]
    fn test_duplication_across_files() {
        let block = "let a = 1;\nlet b = 2;\nlet c = a + b;\nlet d = c * 2;\nreturn d;\n";
        let files = vec![
            FileInput::new("one.js", format!("function f() {{\n{block}}}\n")),
            FileInput::new("two.js", format!("function g() {{\n{block}}}\n")),
        ];
        let response = run(&request(files, Some(vec!["duplication"]))).expect("run");
        assert!(response
            .issues
            .iter()
            .any(|i| i.kind == "duplication" && i.message.contains("two.js")));
    }

    #[test]
    fn test_duplication_needs_two_files() {
        let files = vec![FileInput::new("only.py", "x = 1\n".repeat(20))];
        let response = run(&request(files, Some(vec!["duplication"]))).expect("run");
        assert!(response.valid);
    }

    #[test]
    fn test_unresolved_symbols_deep_mode() {
        let mut req = request(
            vec![FileInput::new(
                "a.py",
                "def f():\n    return phantom_helper()\n",
            )],
            Some(vec!["unresolved_symbol"]),
        );
        // Fast mode skips the check entirely.
        let fast = run(&req).expect("run");
        assert!(fast.valid);

        req.mode = "deep".to_string();
        let deep = run(&req).expect("run");
        let unresolved: Vec<&ConsistencyIssue> = deep
            .issues
            .iter()
            .filter(|i| i.kind == "unresolved_symbol")
            .collect();
        assert_eq!(unresolved.len(), 1);
        assert!(unresolved[0].message.contains("phantom_helper"));
        assert_eq!(unresolved[0].severity, Severity::High);
        assert_eq!(unresolved[0].confidence, 60);
    }

    #[test]
    fn test_unresolved_symbols_cross_file_resolution() {
        let mut req = request(
            vec![
                FileInput::new("lib.py", "def helper():\n    return 1\n"),
                FileInput::new("app.py", "def main():\n    return helper()\n"),
            ],
            Some(vec!["unresolved_symbol"]),
        );
        req.mode = "deep".to_string();
        let response = run(&req).expect("run");
        assert!(response.valid, "helper is defined in the bundle");
    }

    #[test]
    fn test_min_confidence_filter() {
        let mut req = request(
            vec![FileInput::new(
                "a.py",
                "def used():\n    return 1\n\ndef orphan():\n    return 2\n\nused()\n",
            )],
            Some(vec!["dead_code"]),
        );
        req.min_confidence = 90;
        let response = run(&req).expect("run");
        // Dead-code confidence is 70, below the threshold.
        assert!(response.valid);
    }

    #[test]
    fn test_invalid_check_rejected() {
        let req = request(
            vec![FileInput::new("a.py", "x = 1\n")],
            Some(vec!["bogus_check"]),
        );
        assert!(run(&req).is_err());
    }
}
