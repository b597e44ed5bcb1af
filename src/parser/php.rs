//! Regex-grade PHP extraction.

use crate::models::{ClassInfo, FunctionInfo, ImportEntry, ParsedCode, VariableInfo};
use regex::Regex;
use std::sync::LazyLock;

static USE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^use\s+([a-zA-Z0-9_\\]+)(?:\s+as\s+([a-zA-Z0-9_]+))?\s*;").expect("valid regex")
});
static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(public|protected|private|static)\s+)*function\s+([a-zA-Z0-9_]+)\s*\(([^)]*)\)(?:\s*:\s*([a-zA-Z0-9_\\?]+))?",
    )
    .expect("valid regex")
});
static CLASS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:abstract\s+|final\s+)?class\s+([a-zA-Z0-9_]+)(?:\s+extends\s+([a-zA-Z0-9_\\]+))?(?:\s+implements\s+([a-zA-Z0-9_\\,\s]+))?",
    )
    .expect("valid regex")
});
static INTERFACE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"interface\s+([a-zA-Z0-9_]+)(?:\s+extends\s+([a-zA-Z0-9_\\,\s]+))?")
        .expect("valid regex")
});
static TRAIT_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"trait\s+([a-zA-Z0-9_]+)").expect("valid regex"));
static VAR_ASSIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\$[a-zA-Z0-9_]+)\s*=\s*(.+?);").expect("valid regex"));

/// Parses a PHP buffer into a structural view.
pub(super) fn parse(code: &str) -> ParsedCode {
    ParsedCode {
        language: "php".to_string(),
        imports: extract_imports(code),
        functions: extract_functions(code),
        classes: extract_classes(code),
        variables: extract_variables(code),
        raw: code.to_string(),
        ast_valid: true,
        ..ParsedCode::default()
    }
}

fn extract_imports(code: &str) -> Vec<ImportEntry> {
    let mut imports = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(captures) = USE_IMPORT.captures(trimmed) {
            imports.push(ImportEntry {
                kind: "use".to_string(),
                name: Some(captures[1].to_string()),
                module: None,
                alias: captures.get(2).map(|m| m.as_str().to_string()),
                statement: Some(trimmed.to_string()),
                line: index + 1,
            });
        }
    }
    imports
}

fn extract_functions(code: &str) -> Vec<FunctionInfo> {
    let mut functions = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(captures) = FUNCTION_DECL.captures(trimmed) {
            let visibility = captures.get(1).map(|m| m.as_str().to_string());
            let is_method = visibility.is_some();
            functions.push(FunctionInfo {
                name: captures[2].to_string(),
                line: index + 1,
                signature: Some(trimmed.to_string()),
                params: super::javascript::split_params(&captures[3]),
                return_type: Some(
                    captures
                        .get(4)
                        .map_or_else(|| "mixed".to_string(), |m| m.as_str().to_string()),
                ),
                kind: Some(if is_method { "method" } else { "function" }.to_string()),
                visibility,
                is_method,
                ..FunctionInfo::default()
            });
        }
    }
    functions
}

fn extract_classes(code: &str) -> Vec<ClassInfo> {
    let mut classes = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.contains("class ") {
            if let Some(captures) = CLASS_DECL.captures(trimmed) {
                classes.push(ClassInfo {
                    name: captures[1].to_string(),
                    line: index + 1,
                    signature: Some(trimmed.to_string()),
                    extends: captures.get(2).map(|m| m.as_str().to_string()),
                    implements: captures.get(3).map_or_else(Vec::new, |m| {
                        m.as_str()
                            .split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    }),
                    kind: Some("class".to_string()),
                    ..ClassInfo::default()
                });
                continue;
            }
        }

        if trimmed.contains("interface ") {
            if let Some(captures) = INTERFACE_DECL.captures(trimmed) {
                classes.push(ClassInfo {
                    name: captures[1].to_string(),
                    line: index + 1,
                    signature: Some(trimmed.to_string()),
                    implements: captures.get(2).map_or_else(Vec::new, |m| {
                        m.as_str()
                            .split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    }),
                    kind: Some("interface".to_string()),
                    ..ClassInfo::default()
                });
                continue;
            }
        }

        if trimmed.contains("trait ") {
            if let Some(captures) = TRAIT_DECL.captures(trimmed) {
                classes.push(ClassInfo {
                    name: captures[1].to_string(),
                    line: index + 1,
                    signature: Some(trimmed.to_string()),
                    kind: Some("trait".to_string()),
                    ..ClassInfo::default()
                });
            }
        }
    }
    classes
}

fn extract_variables(code: &str) -> Vec<VariableInfo> {
    let mut variables = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("//") || trimmed.starts_with('#') || trimmed.starts_with('*') {
            continue;
        }
        if let Some(captures) = VAR_ASSIGN.captures(trimmed) {
            variables.push(VariableInfo {
                name: captures[1].to_string(),
                line: index + 1,
                value: Some(captures[2].trim().to_string()),
                ..VariableInfo::default()
            });
        }
    }
    variables
}
