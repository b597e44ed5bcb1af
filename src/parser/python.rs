//! AST-grade Python parsing backed by tree-sitter.
//!
//! A full grammar parse drives import/function/class/variable extraction.
//! When the grammar rejects the buffer the module falls back to line-level
//! regex extraction and reports `ast_valid = false`, still returning
//! best-effort lists.

use crate::models::{
    AttributeInfo, ClassInfo, FunctionInfo, ImportEntry, ParamInfo, ParsedCode, VariableInfo,
};
use std::collections::{HashMap, HashSet};
use std::sync::{LazyLock, Mutex};
use tree_sitter::{Language, Node, Parser, Tree};

/// Shared Python parser (tree-sitter parsers require `&mut` to run).
static PYTHON_PARSER: LazyLock<Mutex<Parser>> = LazyLock::new(|| {
    let mut parser = Parser::new();
    let language: Language = tree_sitter_python::LANGUAGE.into();
    parser
        .set_language(&language)
        .expect("Python grammar must load");
    Mutex::new(parser)
});

fn parse_tree(code: &str) -> Option<Tree> {
    let mut parser = PYTHON_PARSER
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    parser.parse(code, None)
}

fn node_text<'a>(node: Node<'_>, src: &'a str) -> &'a str {
    node.utf8_text(src.as_bytes()).unwrap_or_default()
}

fn walk_tree<'tree>(node: Node<'tree>, visit: &mut impl FnMut(Node<'tree>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_tree(child, visit);
    }
}

/// Parses a Python buffer into a structural view.
pub(super) fn parse(code: &str) -> ParsedCode {
    let tree = parse_tree(code);
    match tree {
        Some(tree) if !tree.root_node().has_error() => {
            let root = tree.root_node();
            ParsedCode {
                language: "python".to_string(),
                imports: extract_imports(root, code),
                functions: extract_functions(root, code),
                classes: extract_classes(root, code),
                variables: extract_variables(root, code),
                raw: code.to_string(),
                ast_valid: true,
                ..ParsedCode::default()
            }
        }
        _ => ParsedCode {
            language: "python".to_string(),
            imports: fallback_imports(code),
            functions: fallback_functions(code),
            classes: fallback_classes(code),
            variables: Vec::new(),
            raw: code.to_string(),
            ast_valid: false,
            error: Some("syntax error in Python code".to_string()),
            ..ParsedCode::default()
        },
    }
}

// ---------------------------------------------------------------------------
// AST-grade extraction
// ---------------------------------------------------------------------------

fn extract_imports(root: Node<'_>, src: &str) -> Vec<ImportEntry> {
    let mut imports = Vec::new();
    walk_tree(root, &mut |node| match node.kind() {
        "import_statement" => {
            let line = node.start_position().row + 1;
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => imports.push(ImportEntry {
                        kind: "import".to_string(),
                        name: Some(node_text(child, src).to_string()),
                        module: None,
                        alias: None,
                        statement: None,
                        line,
                    }),
                    "aliased_import" => {
                        let name = child
                            .child_by_field_name("name")
                            .map(|n| node_text(n, src).to_string());
                        let alias = child
                            .child_by_field_name("alias")
                            .map(|n| node_text(n, src).to_string());
                        imports.push(ImportEntry {
                            kind: "import".to_string(),
                            name,
                            module: None,
                            alias,
                            statement: None,
                            line,
                        });
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            let line = node.start_position().row + 1;
            let module = node
                .child_by_field_name("module_name")
                .map(|n| node_text(n, src).to_string());
            let module_id = node.child_by_field_name("module_name").map(|n| n.id());
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if Some(child.id()) == module_id {
                    continue;
                }
                match child.kind() {
                    "dotted_name" => imports.push(ImportEntry {
                        kind: "from_import".to_string(),
                        name: Some(node_text(child, src).to_string()),
                        module: module.clone(),
                        alias: None,
                        statement: None,
                        line,
                    }),
                    "aliased_import" => {
                        let name = child
                            .child_by_field_name("name")
                            .map(|n| node_text(n, src).to_string());
                        let alias = child
                            .child_by_field_name("alias")
                            .map(|n| node_text(n, src).to_string());
                        imports.push(ImportEntry {
                            kind: "from_import".to_string(),
                            name,
                            module: module.clone(),
                            alias,
                            statement: None,
                            line,
                        });
                    }
                    "wildcard_import" => imports.push(ImportEntry {
                        kind: "from_import".to_string(),
                        name: Some("*".to_string()),
                        module: module.clone(),
                        alias: None,
                        statement: None,
                        line,
                    }),
                    _ => {}
                }
            }
        }
        _ => {}
    });
    imports
}

fn extract_params(parameters: Node<'_>, src: &str, skip_self: bool) -> Vec<ParamInfo> {
    let mut params = Vec::new();
    let mut cursor = parameters.walk();
    for (index, child) in parameters.named_children(&mut cursor).enumerate() {
        let param = match child.kind() {
            "identifier" => Some(ParamInfo {
                name: node_text(child, src).to_string(),
                ..ParamInfo::default()
            }),
            "typed_parameter" => {
                let name = child
                    .named_child(0)
                    .map(|n| node_text(n, src).to_string())
                    .unwrap_or_default();
                Some(ParamInfo {
                    name,
                    type_annotation: child
                        .child_by_field_name("type")
                        .map(|n| node_text(n, src).to_string()),
                    default: None,
                })
            }
            "default_parameter" => Some(ParamInfo {
                name: child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, src).to_string())
                    .unwrap_or_default(),
                type_annotation: None,
                default: child
                    .child_by_field_name("value")
                    .map(|n| node_text(n, src).to_string()),
            }),
            "typed_default_parameter" => Some(ParamInfo {
                name: child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, src).to_string())
                    .unwrap_or_default(),
                type_annotation: child
                    .child_by_field_name("type")
                    .map(|n| node_text(n, src).to_string()),
                default: child
                    .child_by_field_name("value")
                    .map(|n| node_text(n, src).to_string()),
            }),
            _ => None,
        };
        if let Some(param) = param {
            if skip_self && index == 0 && (param.name == "self" || param.name == "cls") {
                continue;
            }
            params.push(param);
        }
    }
    params
}

fn extract_docstring(body: Node<'_>, src: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string_node = first.named_child(0)?;
    if string_node.kind() != "string" {
        return None;
    }
    Some(strip_string_quotes(node_text(string_node, src)))
}

fn strip_string_quotes(raw: &str) -> String {
    let trimmed = raw.trim_start_matches(|c: char| "rbfuRBFU".contains(c));
    for delim in ["\"\"\"", "'''", "\"", "'"] {
        if trimmed.starts_with(delim) {
            return trimmed
                .strip_prefix(delim)
                .and_then(|s| s.strip_suffix(delim))
                .unwrap_or(trimmed)
                .trim()
                .to_string();
        }
    }
    trimmed.trim().to_string()
}

fn body_slice(body: Node<'_>, src: &str) -> String {
    let start = body.start_position().row;
    let end = body.end_position().row;
    src.lines()
        .skip(start)
        .take(end.saturating_sub(start) + 1)
        .collect::<Vec<_>>()
        .join("\n")
}

fn function_info(node: Node<'_>, src: &str, is_method: bool) -> Option<FunctionInfo> {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, src).to_string())?;
    let params = node
        .child_by_field_name("parameters")
        .map(|parameters| extract_params(parameters, src, is_method))
        .unwrap_or_default();
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| node_text(n, src).to_string());
    let body = node.child_by_field_name("body");
    let docstring = body.and_then(|b| extract_docstring(b, src));
    let body_text = if is_method {
        None
    } else {
        body.map(|b| body_slice(b, src))
    };

    Some(FunctionInfo {
        name,
        params,
        return_type,
        docstring,
        line: node.start_position().row + 1,
        body: body_text,
        is_method,
        ..FunctionInfo::default()
    })
}

fn extract_functions(root: Node<'_>, src: &str) -> Vec<FunctionInfo> {
    let mut functions = Vec::new();
    walk_tree(root, &mut |node| {
        if node.kind() == "function_definition" {
            if let Some(info) = function_info(node, src, false) {
                functions.push(info);
            }
        }
    });
    functions
}

/// Unwraps a `decorated_definition` to the definition it decorates.
fn unwrap_decorated(node: Node<'_>) -> Node<'_> {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn extract_classes(root: Node<'_>, src: &str) -> Vec<ClassInfo> {
    let mut classes = Vec::new();
    walk_tree(root, &mut |node| {
        if node.kind() != "class_definition" {
            return;
        }
        let Some(name) = node
            .child_by_field_name("name")
            .map(|n| node_text(n, src).to_string())
        else {
            return;
        };

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if base.kind() != "keyword_argument" {
                    bases.push(node_text(base, src).to_string());
                }
            }
        }

        let mut methods = Vec::new();
        let mut attributes = Vec::new();
        let docstring = node
            .child_by_field_name("body")
            .and_then(|b| extract_docstring(b, src));
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.named_children(&mut cursor) {
                let child = unwrap_decorated(child);
                match child.kind() {
                    "function_definition" => {
                        if let Some(info) = function_info(child, src, true) {
                            methods.push(info);
                        }
                    }
                    "expression_statement" => {
                        if let Some(assignment) = child.named_child(0) {
                            if assignment.kind() == "assignment" {
                                if let Some(left) = assignment.child_by_field_name("left") {
                                    if left.kind() == "identifier" {
                                        attributes.push(AttributeInfo {
                                            name: node_text(left, src).to_string(),
                                            line: assignment.start_position().row + 1,
                                        });
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        classes.push(ClassInfo {
            name,
            bases,
            methods,
            attributes,
            docstring,
            line: node.start_position().row + 1,
            ..ClassInfo::default()
        });
    });
    classes
}

const LITERAL_KINDS: &[&str] = &["string", "integer", "float", "true", "false", "none"];

fn extract_variables(root: Node<'_>, src: &str) -> Vec<VariableInfo> {
    let mut variables = Vec::new();
    walk_tree(root, &mut |node| {
        if node.kind() != "assignment" {
            return;
        }
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let value = node
            .child_by_field_name("right")
            .filter(|right| LITERAL_KINDS.contains(&right.kind()))
            .map(|right| node_text(right, src).to_string());
        variables.push(VariableInfo {
            name: node_text(left, src).to_string(),
            line: node.start_position().row + 1,
            value,
            ..VariableInfo::default()
        });
    });
    variables
}

// ---------------------------------------------------------------------------
// Regex-level fallback (syntax errors)
// ---------------------------------------------------------------------------

fn fallback_imports(code: &str) -> Vec<ImportEntry> {
    let mut imports = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("import ") {
            imports.push(ImportEntry {
                kind: "import".to_string(),
                name: Some(rest.trim().to_string()),
                module: None,
                alias: None,
                statement: None,
                line: index + 1,
            });
        } else if line.starts_with("from ") && line.contains(" import ") {
            if let Some((module_part, names_part)) = line.split_once(" import ") {
                imports.push(ImportEntry {
                    kind: "from_import".to_string(),
                    name: Some(names_part.trim().to_string()),
                    module: Some(module_part[5..].trim().to_string()),
                    alias: None,
                    statement: None,
                    line: index + 1,
                });
            }
        }
    }
    imports
}

fn fallback_functions(code: &str) -> Vec<FunctionInfo> {
    let mut functions = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("def ") {
            if let Some(name) = rest.split('(').next() {
                functions.push(FunctionInfo {
                    name: name.trim().to_string(),
                    line: index + 1,
                    signature: Some(trimmed.to_string()),
                    ..FunctionInfo::default()
                });
            }
        }
    }
    functions
}

fn fallback_classes(code: &str) -> Vec<ClassInfo> {
    let mut classes = Vec::new();
    for (index, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("class ") {
            let name = rest
                .split('(')
                .next()
                .and_then(|s| s.split(':').next())
                .unwrap_or_default()
                .trim()
                .to_string();
            if !name.is_empty() {
                classes.push(ClassInfo {
                    name,
                    line: index + 1,
                    signature: Some(trimmed.to_string()),
                    ..ClassInfo::default()
                });
            }
        }
    }
    classes
}

// ---------------------------------------------------------------------------
// Semantic analysis for the consistency checker
// ---------------------------------------------------------------------------

/// One imported binding: the local name it introduces and its display form.
#[derive(Debug, Clone)]
pub(crate) struct ImportBinding {
    /// Name the import binds in the module scope.
    pub local_name: String,
    /// Human-readable origin (`module.symbol` for from-imports).
    pub display_name: String,
    /// 1-based line of the import.
    pub line: usize,
}

/// A name read in load position.
#[derive(Debug, Clone)]
pub(crate) struct NameLoad {
    pub name: String,
    pub line: usize,
    pub column: usize,
}

/// An assignment or parameter that was never read in its function scope.
#[derive(Debug, Clone)]
pub(crate) struct UnusedScopeVar {
    pub name: String,
    pub line: usize,
}

/// Semantic facts about one Python buffer, for the consistency checks.
#[derive(Debug, Default)]
pub(crate) struct PythonAnalysis {
    pub imports: Vec<ImportBinding>,
    pub loads: Vec<NameLoad>,
    pub used_names: HashSet<String>,
    pub definitions: HashSet<String>,
    pub unused_vars: Vec<UnusedScopeVar>,
    pub top_level_defs: Vec<(String, usize, &'static str)>,
}

/// Analyzes a Python buffer. Returns `None` when the grammar rejects it.
pub(crate) fn analyze(code: &str) -> Option<PythonAnalysis> {
    let tree = parse_tree(code)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let mut analysis = PythonAnalysis::default();

    for entry in extract_imports(root, code) {
        let local_name = entry.alias.clone().unwrap_or_else(|| {
            let name = entry.name.clone().unwrap_or_default();
            if entry.kind == "import" {
                name.split('.').next().unwrap_or_default().to_string()
            } else {
                name
            }
        });
        if local_name == "*" || local_name.is_empty() {
            continue;
        }
        let display_name = match (&entry.module, &entry.name) {
            (Some(module), Some(name)) => format!("{module}.{name}"),
            (_, Some(name)) => name.clone(),
            _ => local_name.clone(),
        };
        analysis.definitions.insert(local_name.clone());
        analysis.imports.push(ImportBinding {
            local_name,
            display_name,
            line: entry.line,
        });
    }

    // Module-level definitions for dead-code analysis.
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let child = unwrap_decorated(child);
        match child.kind() {
            "function_definition" | "class_definition" => {
                if let Some(name) = child.child_by_field_name("name") {
                    let name = node_text(name, code).to_string();
                    if !name.starts_with('_') {
                        let kind = if child.kind() == "class_definition" {
                            "class"
                        } else {
                            "function"
                        };
                        analysis
                            .top_level_defs
                            .push((name, child.start_position().row + 1, kind));
                    }
                }
            }
            _ => {}
        }
    }

    // Definitions anywhere: functions, classes, assignment targets.
    walk_tree(root, &mut |node| match node.kind() {
        "function_definition" | "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                analysis.definitions.insert(node_text(name, code).to_string());
            }
        }
        "assignment" => {
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "identifier" {
                    analysis.definitions.insert(node_text(left, code).to_string());
                }
            }
        }
        _ => {}
    });

    let mut scopes: Vec<HashMap<String, (usize, bool)>> = vec![HashMap::new()];
    visit_scoped(root, code, &mut scopes, &mut analysis);

    analysis.used_names = analysis.loads.iter().map(|l| l.name.clone()).collect();
    Some(analysis)
}

/// Records a name read: marks it used in every enclosing scope.
fn record_load(
    node: Node<'_>,
    src: &str,
    scopes: &mut [HashMap<String, (usize, bool)>],
    analysis: &mut PythonAnalysis,
) {
    let name = node_text(node, src).to_string();
    for scope in scopes.iter_mut() {
        if let Some(entry) = scope.get_mut(&name) {
            entry.1 = true;
        }
    }
    analysis.loads.push(NameLoad {
        name,
        line: node.start_position().row + 1,
        column: node.start_position().column,
    });
}

/// Scope-aware traversal mirroring a Python `ast.NodeVisitor`:
/// assignments register variables in the innermost scope, identifier reads
/// mark them used across the scope stack, and each function scope is
/// checked when the function ends. The module scope is never reported.
fn visit_scoped(
    node: Node<'_>,
    src: &str,
    scopes: &mut Vec<HashMap<String, (usize, bool)>>,
    analysis: &mut PythonAnalysis,
) {
    match node.kind() {
        "function_definition" => {
            scopes.push(HashMap::new());
            if let Some(parameters) = node.child_by_field_name("parameters") {
                let mut cursor = parameters.walk();
                for child in parameters.named_children(&mut cursor) {
                    let (name_node, annotation, default) = match child.kind() {
                        "identifier" => (Some(child), None, None),
                        "typed_parameter" => (
                            child.named_child(0),
                            child.child_by_field_name("type"),
                            None,
                        ),
                        "default_parameter" => (
                            child.child_by_field_name("name"),
                            None,
                            child.child_by_field_name("value"),
                        ),
                        "typed_default_parameter" => (
                            child.child_by_field_name("name"),
                            child.child_by_field_name("type"),
                            child.child_by_field_name("value"),
                        ),
                        _ => (None, None, None),
                    };
                    if let Some(name_node) = name_node {
                        let name = node_text(name_node, src);
                        if name != "self" && name != "cls" && !name.starts_with('_') {
                            if let Some(scope) = scopes.last_mut() {
                                scope.insert(
                                    name.to_string(),
                                    (node.start_position().row + 1, false),
                                );
                            }
                        }
                    }
                    // Annotations and defaults are reads.
                    if let Some(annotation) = annotation {
                        visit_scoped(annotation, src, scopes, analysis);
                    }
                    if let Some(default) = default {
                        visit_scoped(default, src, scopes, analysis);
                    }
                }
            }
            if let Some(return_type) = node.child_by_field_name("return_type") {
                visit_scoped(return_type, src, scopes, analysis);
            }
            if let Some(body) = node.child_by_field_name("body") {
                visit_scoped(body, src, scopes, analysis);
            }
            if let Some(scope) = scopes.pop() {
                for (name, (line, used)) in scope {
                    if !used {
                        analysis.unused_vars.push(UnusedScopeVar { name, line });
                    }
                }
            }
        }
        "class_definition" => {
            // Class bodies share the enclosing scope; only the name is skipped.
            if let Some(superclasses) = node.child_by_field_name("superclasses") {
                visit_scoped(superclasses, src, scopes, analysis);
            }
            if let Some(body) = node.child_by_field_name("body") {
                visit_scoped(body, src, scopes, analysis);
            }
        }
        "assignment" => {
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "identifier" {
                    let name = node_text(left, src);
                    if !name.starts_with('_') {
                        if let Some(scope) = scopes.last_mut() {
                            scope.insert(
                                name.to_string(),
                                (node.start_position().row + 1, false),
                            );
                        }
                    }
                } else {
                    visit_scoped(left, src, scopes, analysis);
                }
            }
            if let Some(right) = node.child_by_field_name("right") {
                visit_scoped(right, src, scopes, analysis);
            }
            // Annotated assignments carry a type node.
            if let Some(annotation) = node.child_by_field_name("type") {
                visit_scoped(annotation, src, scopes, analysis);
            }
        }
        "augmented_assignment" => {
            if let Some(right) = node.child_by_field_name("right") {
                visit_scoped(right, src, scopes, analysis);
            }
        }
        "attribute" => {
            // Only the object root is a read; the attribute name is not.
            if let Some(object) = node.child_by_field_name("object") {
                visit_scoped(object, src, scopes, analysis);
            }
        }
        "keyword_argument" => {
            if let Some(value) = node.child_by_field_name("value") {
                visit_scoped(value, src, scopes, analysis);
            }
        }
        "for_statement" => {
            // The loop target is a store, not a read.
            if let Some(right) = node.child_by_field_name("right") {
                visit_scoped(right, src, scopes, analysis);
            }
            if let Some(body) = node.child_by_field_name("body") {
                visit_scoped(body, src, scopes, analysis);
            }
            if let Some(alternative) = node.child_by_field_name("alternative") {
                visit_scoped(alternative, src, scopes, analysis);
            }
        }
        "lambda" => {
            if let Some(body) = node.child_by_field_name("body") {
                visit_scoped(body, src, scopes, analysis);
            }
        }
        "import_statement" | "import_from_statement" => {
            // Imported names are bindings, not reads.
        }
        "identifier" => record_load(node, src, scopes, analysis),
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                visit_scoped(child, src, scopes, analysis);
            }
        }
    }
}
