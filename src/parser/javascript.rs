//! Regex-grade JavaScript extraction.

use crate::models::{ClassInfo, FunctionInfo, ImportEntry, ParsedCode, VariableInfo};
use regex::Regex;
use std::sync::LazyLock;

static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"function\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*\(([^)]*)\)").expect("valid regex")
});
static METHOD_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z_$][a-zA-Z0-9_$]*)\s*\(([^)]*)\)\s*\{").expect("valid regex")
});
static ARROW_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(const|let|var)\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*=\s*\(([^)]*)\)\s*=>")
        .expect("valid regex")
});
static CLASS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*(?:extends\s+([a-zA-Z_$][a-zA-Z0-9_$]*))?")
        .expect("valid regex")
});
static VAR_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(const|let|var)\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*=\s*(.+?)(?:;|$)")
        .expect("valid regex")
});

/// Parses a JavaScript buffer into a structural view.
pub(super) fn parse(code: &str) -> ParsedCode {
    ParsedCode {
        language: "javascript".to_string(),
        imports: extract_imports(code),
        functions: extract_functions(code),
        classes: extract_classes(code),
        variables: extract_variables(code),
        raw: code.to_string(),
        ast_valid: true,
        ..ParsedCode::default()
    }
}

pub(super) fn extract_imports(code: &str) -> Vec<ImportEntry> {
    let mut imports = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("import ") {
            imports.push(ImportEntry {
                kind: "es6_import".to_string(),
                name: None,
                module: None,
                alias: None,
                statement: Some(trimmed.to_string()),
                line: index + 1,
            });
        } else if trimmed.contains("require(") {
            imports.push(ImportEntry {
                kind: "commonjs_require".to_string(),
                name: None,
                module: None,
                alias: None,
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
            functions.push(FunctionInfo {
                name: captures[1].to_string(),
                line: index + 1,
                signature: Some(trimmed.to_string()),
                kind: Some("function_declaration".to_string()),
                params: split_params(&captures[2]),
                ..FunctionInfo::default()
            });
            continue;
        }

        if !trimmed.starts_with("function")
            && !trimmed.starts_with("if")
            && !trimmed.starts_with("while")
        {
            if let Some(captures) = METHOD_SHAPE.captures(trimmed) {
                functions.push(FunctionInfo {
                    name: captures[1].to_string(),
                    line: index + 1,
                    signature: Some(trimmed.to_string()),
                    kind: Some("method".to_string()),
                    params: split_params(&captures[2]),
                    ..FunctionInfo::default()
                });
                continue;
            }
        }

        if let Some(captures) = ARROW_FUNCTION.captures(trimmed) {
            functions.push(FunctionInfo {
                name: captures[2].to_string(),
                line: index + 1,
                signature: Some(trimmed.to_string()),
                kind: Some("arrow_function".to_string()),
                declaration_type: Some(captures[1].to_string()),
                params: split_params(&captures[3]),
                ..FunctionInfo::default()
            });
        }
    }
    functions
}

/// Splits a raw parameter list into named entries.
pub(super) fn split_params(raw: &str) -> Vec<crate::models::ParamInfo> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let (name_part, type_annotation) = p
                .split_once(':')
                .map_or((p, None), |(n, t)| (n, Some(t.trim().to_string())));
            let (name, default) = name_part
                .split_once('=')
                .map_or((name_part, None), |(n, d)| (n, Some(d.trim().to_string())));
            crate::models::ParamInfo {
                name: name.trim().to_string(),
                type_annotation,
                default,
            }
        })
        .collect()
}

fn extract_classes(code: &str) -> Vec<ClassInfo> {
    let mut classes = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(captures) = CLASS_DECL.captures(trimmed) {
            classes.push(ClassInfo {
                name: captures[1].to_string(),
                line: index + 1,
                signature: Some(trimmed.to_string()),
                extends: captures.get(2).map(|m| m.as_str().to_string()),
                ..ClassInfo::default()
            });
        }
    }
    classes
}

fn extract_variables(code: &str) -> Vec<VariableInfo> {
    let mut variables = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(captures) = VAR_DECL.captures(trimmed) {
            variables.push(VariableInfo {
                name: captures[2].to_string(),
                line: index + 1,
                declaration_type: Some(captures[1].to_string()),
                value: Some(captures[3].trim().to_string()),
                ..VariableInfo::default()
            });
        }
    }
    variables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_function_shapes() {
        let code = "function add(a, b) {\n  return a + b;\n}\nconst mul = (a, b) => a * b;\n";
        let view = parse(code);
        assert_eq!(view.functions.len(), 2);
        assert_eq!(view.functions[0].name, "add");
        assert_eq!(
            view.functions[1].kind.as_deref(),
            Some("arrow_function")
        );
        assert_eq!(view.functions[1].declaration_type.as_deref(), Some("const"));
    }

    #[test]
    fn test_extract_imports() {
        let code = "import fs from 'fs';\nconst path = require('path');\n";
        let view = parse(code);
        assert_eq!(view.imports.len(), 2);
        assert_eq!(view.imports[0].kind, "es6_import");
        assert_eq!(view.imports[1].kind, "commonjs_require");
    }

    #[test]
    fn test_extract_class_with_extends() {
        let code = "class Dog extends Animal {\n  bark() {}\n}\n";
        let view = parse(code);
        assert_eq!(view.classes.len(), 1);
        assert_eq!(view.classes[0].extends.as_deref(), Some("Animal"));
    }

    #[test]
    fn test_extract_variables() {
        let code = "const x = 42;\nlet name = 'bob';\n";
        let view = parse(code);
        assert_eq!(view.variables.len(), 2);
        assert_eq!(view.variables[0].declaration_type.as_deref(), Some("const"));
        assert_eq!(view.variables[1].value.as_deref(), Some("'bob'"));
    }
}
