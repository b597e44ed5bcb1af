//! Multi-language structural parser.
//!
//! Produces a [`ParsedCode`] view of a code buffer without executing it.
//! Python gets an AST-grade parse (tree-sitter) with a regex fallback on
//! syntax errors; TypeScript, JavaScript, and PHP are regex-grade.
//!
//! The parser is pure and deterministic: no I/O, bounded by input size,
//! and it never fails on malformed input — degraded parses come back as a
//! view with an `error` string.

mod javascript;
mod php;
pub(crate) mod python;
mod typescript;

use crate::models::ParsedCode;

/// Structural code parser for Python, TypeScript, JavaScript, and PHP.
#[derive(Debug, Clone, Default)]
pub struct CodeParser;

impl CodeParser {
    /// Languages this parser understands.
    pub const SUPPORTED_LANGUAGES: &'static [&'static str] =
        &["python", "javascript", "typescript", "php"];

    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses a code buffer into a structural view.
    ///
    /// When `language` is absent it is auto-detected by keyword scoring,
    /// then by filename hints embedded in the buffer. Unsupported
    /// languages produce a view whose `error` field is set.
    #[must_use]
    pub fn parse(&self, code: &str, language: Option<&str>) -> ParsedCode {
        let language = language.map_or_else(|| Self::detect_language(code), str::to_lowercase);

        match language.as_str() {
            "python" => python::parse(code),
            "javascript" => javascript::parse(code),
            "typescript" => typescript::parse(code),
            "php" => php::parse(code),
            other => ParsedCode {
                language: other.to_string(),
                raw: code.to_string(),
                ast_valid: false,
                error: Some(format!("unsupported language: {other}")),
                ..ParsedCode::default()
            },
        }
    }

    /// Detects the language of a code buffer by scoring keyword and sigil
    /// occurrences, falling back to filename hints present in the text.
    #[must_use]
    pub fn detect_language(code: &str) -> String {
        let mut python_score = 0u32;
        let mut js_score = 0u32;
        let mut ts_score = 0u32;
        let mut php_score = 0u32;

        // PHP signals
        if code.contains("<?php") {
            php_score += 10;
        }
        if code.contains('$') && code.contains(';') {
            php_score += 2;
        }
        if code.contains("namespace ") && code.contains(';') {
            php_score += 3;
        }
        if code.contains("use ") && code.contains('\\') && code.contains(';') {
            php_score += 3;
        }
        if code.contains("public function ") || code.contains("private function ") {
            php_score += 3;
        }
        if code.contains("->") || code.contains("::") {
            php_score += 2;
        }

        // Python signals
        if code.contains("def ") {
            python_score += 2;
        }
        if code.contains("class ") && code.contains(':') {
            python_score += 2;
        }
        if code.contains("import ") || (code.contains("from ") && code.contains(" import ")) {
            python_score += 2;
        }
        if code.contains(':') && code.contains('#') {
            python_score += 1;
        }
        if code.contains("self.") {
            python_score += 1;
        }

        // JavaScript signals
        if code.contains("function ") {
            js_score += 2;
        }
        if code.contains("const ") || code.contains("let ") || code.contains("var ") {
            js_score += 2;
        }
        if code.contains("=> {") {
            js_score += 2;
        }
        if code.contains('{') && code.contains('}') {
            js_score += 1;
        }
        if code.contains(';') {
            js_score += 1;
        }
        if code.contains("export ") || (code.contains("import ") && code.contains(" from ")) {
            js_score += 2;
        }
        if code.contains("console.log") {
            js_score += 1;
        }
        if code.contains("document.") {
            js_score += 1;
        }

        // TypeScript signals
        if code.contains("interface ") {
            ts_score += 3;
        }
        if code.contains("type ") && code.contains('=') && code.contains('<') && code.contains('>')
        {
            ts_score += 3;
        }
        if code.contains(": ") && code.contains(';') {
            ts_score += 2;
        }
        if code.contains('<') && code.contains('>') && code.contains("extends") {
            ts_score += 2;
        }
        if code.contains("implements ") {
            ts_score += 2;
        }
        if code.contains("namespace ") {
            ts_score += 2;
        }
        if code.contains("enum ") {
            ts_score += 2;
        }
        ts_score += js_score / 2;

        let scores = [
            ("python", python_score),
            ("javascript", js_score),
            ("typescript", ts_score),
            ("php", php_score),
        ];
        if let Some((language, score)) = scores.iter().max_by_key(|(_, score)| *score) {
            if *score > 0 {
                return (*language).to_string();
            }
        }

        // Filename hints embedded in the buffer.
        let lower = code.to_lowercase();
        if lower.contains(".py") {
            "python".to_string()
        } else if lower.contains(".ts") || lower.contains(".tsx") {
            "typescript".to_string()
        } else if lower.contains(".js") || lower.contains(".jsx") {
            "javascript".to_string()
        } else if lower.contains(".php") {
            "php".to_string()
        } else {
            "unknown".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_python() {
        let code = "import os\n\ndef main():\n    # entry\n    print(os.getcwd())\n";
        assert_eq!(CodeParser::detect_language(code), "python");
    }

    #[test]
    fn test_detect_php() {
        let code = "<?php\nnamespace App;\nuse App\\Service;\n$x = 1;\n";
        assert_eq!(CodeParser::detect_language(code), "php");
    }

    #[test]
    fn test_detect_typescript() {
        let code = "interface User {\n  name: string;\n}\nconst u: User = { name: 'a' };\n";
        assert_eq!(CodeParser::detect_language(code), "typescript");
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(CodeParser::detect_language("just some words"), "unknown");
    }

    #[test]
    fn test_unsupported_language_view() {
        let parser = CodeParser::new();
        let view = parser.parse("SELECT 1;", Some("sql"));
        assert!(view.error.as_deref().is_some_and(|e| e.contains("unsupported")));
        assert!(!view.ast_valid);
    }

    #[test]
    fn test_parse_dispatches_on_detection() {
        let parser = CodeParser::new();
        let view = parser.parse("def greet(name):\n    return name\n", None);
        assert_eq!(view.language, "python");
        assert_eq!(view.functions.len(), 1);
    }
}
