//! Parser integration tests: auto-detection, AST-grade Python parsing,
//! and the reparse idempotence property.

use collegue::CodeParser;
use pretty_assertions::assert_eq;

const PYTHON_SAMPLE: &str = r#"
import os
from typing import Optional

DEFAULT_NAME = "world"


def greet(name: Optional[str] = None) -> str:
    """Greets a name."""
    return f"hello {name or DEFAULT_NAME}"


class Greeter:
    """Holds greeting state."""

    prefix = ">>"

    def run(self, name):
        return self.prefix + greet(name)
"#;

#[test]
fn python_structural_extraction() {
    let parser = CodeParser::new();
    let view = parser.parse(PYTHON_SAMPLE, Some("python"));

    assert!(view.ast_valid);
    assert!(view.error.is_none());
    assert_eq!(view.imports.len(), 2);
    assert_eq!(view.imports[1].module.as_deref(), Some("typing"));

    let greet = view
        .functions
        .iter()
        .find(|function| function.name == "greet")
        .expect("greet function");
    assert_eq!(greet.docstring.as_deref(), Some("Greets a name."));
    assert_eq!(greet.return_type.as_deref(), Some("str"));
    assert_eq!(greet.params.len(), 1);
    assert_eq!(greet.params[0].name, "name");

    let class = view
        .classes
        .iter()
        .find(|class| class.name == "Greeter")
        .expect("Greeter class");
    assert_eq!(class.docstring.as_deref(), Some("Holds greeting state."));
    assert_eq!(class.attributes.len(), 1);
    assert_eq!(class.methods.len(), 1);
    // `self` is stripped from method parameters.
    assert_eq!(class.methods[0].params.len(), 1);

    assert!(view
        .variables
        .iter()
        .any(|variable| variable.name == "DEFAULT_NAME"));
}

#[test]
fn reparse_of_raw_is_idempotent() {
    // Spec property: parse(parse(code).raw) is equivalent to parse(code)
    // for Python with ast_valid = true.
    let parser = CodeParser::new();
    let first = parser.parse(PYTHON_SAMPLE, Some("python"));
    assert!(first.ast_valid);
    let second = parser.parse(&first.raw, Some("python"));

    assert_eq!(
        serde_json::to_value(&first).expect("serialize"),
        serde_json::to_value(&second).expect("serialize")
    );
}

#[test]
fn syntax_error_degrades_with_best_effort_lists() {
    let parser = CodeParser::new();
    let view = parser.parse("def broken(:\n    pass\n\nclass Intact:\n    pass\n", Some("python"));
    assert!(!view.ast_valid);
    assert!(view.error.is_some());
    assert!(view.classes.iter().any(|class| class.name == "Intact"));
}

#[test]
fn language_detection_across_the_four_languages() {
    assert_eq!(
        CodeParser::detect_language("def f():\n    return 1\n# python\n"),
        "python"
    );
    assert_eq!(
        CodeParser::detect_language("<?php\n$x = 1;\necho $x;\n"),
        "php"
    );
    assert_eq!(
        CodeParser::detect_language("interface A { x: string; }\nenum B {}\n"),
        "typescript"
    );
    assert_eq!(
        CodeParser::detect_language("const x = 1;\nconsole.log(x);\nexport default x;\n"),
        "javascript"
    );
}

#[test]
fn typescript_view_includes_interfaces_and_types() {
    let parser = CodeParser::new();
    let code = "export interface User { id: number; }\ntype Alias = User | null;\nconst u: User = { id: 1 };\n";
    let view = parser.parse(code, Some("typescript"));
    assert_eq!(view.interfaces.len(), 1);
    assert_eq!(view.types.len(), 1);
    assert_eq!(view.variables.len(), 1);
    assert_eq!(view.variables[0].type_annotation.as_deref(), Some("User"));
}

#[test]
fn php_view_includes_use_aliases_and_traits() {
    let parser = CodeParser::new();
    let code = "<?php\nuse App\\Log as Logger;\ntrait Walks {}\nclass Dog { public function bark(): void {} }\n";
    let view = parser.parse(code, Some("php"));
    assert_eq!(view.imports[0].alias.as_deref(), Some("Logger"));
    assert!(view
        .classes
        .iter()
        .any(|class| class.kind.as_deref() == Some("trait")));
}
