//! Structural views produced by the code parser.

use serde::{Deserialize, Serialize};

/// Structural summary of a code buffer.
///
/// All lists are ordered by source position. `ast_valid` is only meaningful
/// for Python, where a real AST parse is attempted before the regex
/// fallback; the regex-grade languages report `true` unless extraction
/// itself failed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParsedCode {
    /// Language tag of the parsed buffer.
    pub language: String,
    /// Imports in source order.
    pub imports: Vec<ImportEntry>,
    /// Functions in source order.
    pub functions: Vec<FunctionInfo>,
    /// Classes (plus PHP interfaces/traits) in source order.
    pub classes: Vec<ClassInfo>,
    /// Variable declarations in source order.
    pub variables: Vec<VariableInfo>,
    /// TypeScript interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<InterfaceInfo>,
    /// TypeScript type aliases.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeAliasInfo>,
    /// The raw input buffer.
    pub raw: String,
    /// True when the buffer parsed as a valid AST (Python) or extraction
    /// completed without error.
    pub ast_valid: bool,
    /// Error description when parsing degraded or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single import statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEntry {
    /// Import flavor: `import`, `from_import`, `es6_import`,
    /// `commonjs_require`, or `use` (PHP).
    pub kind: String,
    /// Imported name (module for plain imports, symbol for from-imports).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source module for from-imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Alias when the import is renamed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Raw statement text for regex-grade extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    /// 1-based source line.
    pub line: usize,
}

/// A function parameter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParamInfo {
    /// Parameter name.
    pub name: String,
    /// Type annotation when present.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub type_annotation: Option<String>,
    /// Default value when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A function or method.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FunctionInfo {
    /// Function name.
    pub name: String,
    /// Parameters (excluding `self` for methods).
    pub params: Vec<ParamInfo>,
    /// Return type annotation when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Docstring when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// 1-based source line.
    pub line: usize,
    /// Body slice for AST-grade extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// True when the function is a class method.
    #[serde(default)]
    pub is_method: bool,
    /// Shape tag: `function_declaration`, `method`, `arrow_function`, `function`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// PHP visibility modifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// `const`/`let`/`var` for arrow functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_type: Option<String>,
    /// Raw signature line for regex-grade extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A class attribute assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeInfo {
    /// Attribute name.
    pub name: String,
    /// 1-based source line.
    pub line: usize,
}

/// A class, interface, or trait.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassInfo {
    /// Class name.
    pub name: String,
    /// Base classes (Python).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    /// Methods defined on the class.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<FunctionInfo>,
    /// Class-level attribute assignments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeInfo>,
    /// Docstring when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// 1-based source line.
    pub line: usize,
    /// Parent class (`extends`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Implemented interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    /// Shape tag: `class`, `interface`, or `trait`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Generic parameters (TypeScript).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generics: Option<String>,
    /// Raw signature line for regex-grade extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A variable declaration or assignment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VariableInfo {
    /// Variable name.
    pub name: String,
    /// 1-based source line.
    pub line: usize,
    /// Assigned value when extractable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// `const`/`let`/`var` for JS/TS declarations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_type: Option<String>,
    /// Type annotation (TypeScript).
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub type_annotation: Option<String>,
}

/// A TypeScript interface declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Interface name.
    pub name: String,
    /// 1-based source line.
    pub line: usize,
    /// Raw signature line.
    pub signature: String,
    /// Generic parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generics: Option<String>,
    /// Extended interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
}

/// A TypeScript type alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAliasInfo {
    /// Alias name.
    pub name: String,
    /// 1-based source line.
    pub line: usize,
    /// Raw signature line.
    pub signature: String,
    /// Aliased definition.
    pub definition: String,
    /// Generic parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generics: Option<String>,
}
