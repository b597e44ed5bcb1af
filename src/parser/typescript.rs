//! Regex-grade TypeScript extraction.
//!
//! Shares the JavaScript import extraction and adds interfaces, type
//! aliases, typed functions, and typed variable declarations.

use super::javascript;
use crate::models::{
    ClassInfo, FunctionInfo, InterfaceInfo, ParsedCode, TypeAliasInfo, VariableInfo,
};
use regex::Regex;
use std::sync::LazyLock;

static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"function\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*(?:<[^>]*>)?\s*\(([^)]*)\)(?:\s*:\s*([a-zA-Z_$][a-zA-Z0-9_$<>.]*))?",
    )
    .expect("valid regex")
});
static METHOD_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:public\s+|private\s+|protected\s+)?(?:static\s+)?([a-zA-Z_$][a-zA-Z0-9_$]*)\s*(?:<[^>]*>)?\s*\(([^)]*)\)(?:\s*:\s*([a-zA-Z_$][a-zA-Z0-9_$<>.]*))?\s*\{",
    )
    .expect("valid regex")
});
static ARROW_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(const|let|var)\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*=\s*(?:<[^>]*>)?\s*\(([^)]*)\)(?:\s*:\s*([a-zA-Z_$][a-zA-Z0-9_$<>.]*))?\s*=>",
    )
    .expect("valid regex")
});
static CLASS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:export\s+)?class\s+([a-zA-Z_$][a-zA-Z0-9_$]*)(?:<([^>]*)>)?(?:\s+extends\s+([a-zA-Z_$][a-zA-Z0-9_$<>.]*))?(?:\s+implements\s+([a-zA-Z_$][a-zA-Z0-9_$<>.,\s]*))?",
    )
    .expect("valid regex")
});
static INTERFACE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:export\s+)?interface\s+([a-zA-Z_$][a-zA-Z0-9_$]*)(?:<([^>]*)>)?(?:\s+extends\s+([a-zA-Z_$][a-zA-Z0-9_$<>.,\s]*))?",
    )
    .expect("valid regex")
});
static TYPE_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:export\s+)?type\s+([a-zA-Z_$][a-zA-Z0-9_$]*)(?:<([^>]*)>)?\s*=\s*(.+?)(?:;|$)",
    )
    .expect("valid regex")
});
static VAR_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(const|let|var)\s+([a-zA-Z_$][a-zA-Z0-9_$]*)(?::\s*([a-zA-Z_$][a-zA-Z0-9_$<>\[\].]*))?\s*=\s*(.+?)(?:;|$)",
    )
    .expect("valid regex")
});

/// Parses a TypeScript buffer into a structural view.
pub(super) fn parse(code: &str) -> ParsedCode {
    ParsedCode {
        language: "typescript".to_string(),
        imports: javascript::extract_imports(code),
        functions: extract_functions(code),
        classes: extract_classes(code),
        interfaces: extract_interfaces(code),
        types: extract_type_aliases(code),
        variables: extract_variables(code),
        raw: code.to_string(),
        ast_valid: true,
        ..ParsedCode::default()
    }
}

fn return_type(captures: &regex::Captures<'_>, index: usize) -> Option<String> {
    Some(
        captures
            .get(index)
            .map_or_else(|| "any".to_string(), |m| m.as_str().to_string()),
    )
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
                params: javascript::split_params(&captures[2]),
                return_type: return_type(&captures, 3),
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
                    params: javascript::split_params(&captures[2]),
                    return_type: return_type(&captures, 3),
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
                params: javascript::split_params(&captures[3]),
                return_type: return_type(&captures, 4),
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
        if !trimmed.contains("class ") {
            continue;
        }
        if let Some(captures) = CLASS_DECL.captures(trimmed) {
            classes.push(ClassInfo {
                name: captures[1].to_string(),
                line: index + 1,
                signature: Some(trimmed.to_string()),
                generics: captures.get(2).map(|m| m.as_str().trim().to_string()),
                extends: captures.get(3).map(|m| m.as_str().trim().to_string()),
                implements: captures.get(4).map_or_else(Vec::new, |m| {
                    m.as_str()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }),
                ..ClassInfo::default()
            });
        }
    }
    classes
}

fn extract_interfaces(code: &str) -> Vec<InterfaceInfo> {
    let mut interfaces = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if !trimmed.contains("interface ") {
            continue;
        }
        if let Some(captures) = INTERFACE_DECL.captures(trimmed) {
            interfaces.push(InterfaceInfo {
                name: captures[1].to_string(),
                line: index + 1,
                signature: trimmed.to_string(),
                generics: captures.get(2).map(|m| m.as_str().trim().to_string()),
                extends: captures.get(3).map_or_else(Vec::new, |m| {
                    m.as_str()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }),
            });
        }
    }
    interfaces
}

fn extract_type_aliases(code: &str) -> Vec<TypeAliasInfo> {
    let mut types = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if !trimmed.contains("type ") {
            continue;
        }
        if let Some(captures) = TYPE_ALIAS.captures(trimmed) {
            types.push(TypeAliasInfo {
                name: captures[1].to_string(),
                line: index + 1,
                signature: trimmed.to_string(),
                definition: captures[3].trim().to_string(),
                generics: captures.get(2).map(|m| m.as_str().trim().to_string()),
            });
        }
    }
    types
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
                type_annotation: captures.get(3).map(|m| m.as_str().to_string()),
                value: Some(captures[4].trim().to_string()),
            });
        }
    }
    variables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_function() {
        let code = "function add(a: number, b: number): number {\n  return a + b;\n}\n";
        let view = parse(code);
        assert_eq!(view.functions.len(), 1);
        assert_eq!(view.functions[0].return_type.as_deref(), Some("number"));
        assert_eq!(
            view.functions[0].params[0].type_annotation.as_deref(),
            Some("number")
        );
    }

    #[test]
    fn test_interface_and_type_alias() {
        let code = "export interface User<T> extends Base {\n  id: T;\n}\ntype Id = string | number;\n";
        let view = parse(code);
        assert_eq!(view.interfaces.len(), 1);
        assert_eq!(view.interfaces[0].name, "User");
        assert_eq!(view.interfaces[0].generics.as_deref(), Some("T"));
        assert_eq!(view.interfaces[0].extends, vec!["Base".to_string()]);
        assert_eq!(view.types.len(), 1);
        assert_eq!(view.types[0].definition, "string | number");
    }

    #[test]
    fn test_class_implements() {
        let code = "export class Service implements Runnable, Closeable {\n}\n";
        let view = parse(code);
        assert_eq!(view.classes.len(), 1);
        assert_eq!(
            view.classes[0].implements,
            vec!["Runnable".to_string(), "Closeable".to_string()]
        );
    }

    #[test]
    fn test_typed_variable() {
        let code = "const count: number = 3;\n";
        let view = parse(code);
        assert_eq!(view.variables.len(), 1);
        assert_eq!(view.variables[0].type_annotation.as_deref(), Some("number"));
    }
}
