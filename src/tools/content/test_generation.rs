//! Unit test generation tool.

use super::strip_code_fence;
use crate::llm::with_llm_fallback;
use crate::models::ParsedCode;
use crate::tools::{parse_request, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Test generation request.
#[derive(Debug, Clone, Deserialize)]
pub struct TestGenerationRequest {
    /// Code to generate tests for.
    pub code: String,
    /// Code language.
    pub language: String,
    /// Session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Framework; language default when absent (pytest, jest).
    #[serde(default)]
    pub test_framework: Option<String>,
    /// File the code comes from.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Output directory for the generated test file path.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Generate mocks for dependencies.
    #[serde(default)]
    pub include_mocks: bool,
    /// Target coverage (0.0-1.0).
    #[serde(default = "default_coverage_target")]
    pub coverage_target: f64,
}

const fn default_coverage_target() -> f64 {
    0.8
}

/// Test generation response.
#[derive(Debug, Clone, Serialize)]
pub struct TestGenerationResponse {
    /// The generated test code.
    pub test_code: String,
    /// Language of the test code.
    pub language: String,
    /// Framework the tests target.
    pub framework: String,
    /// Suggested test file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_file_path: Option<String>,
    /// Estimated coverage of the generated tests (0.0-1.0).
    pub estimated_coverage: f64,
    /// Elements the tests exercise.
    pub tested_elements: Vec<HashMap<String, String>>,
}

/// The test generation tool.
#[derive(Debug, Default)]
pub struct TestGenerationTool;

impl TestGenerationTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for TestGenerationTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "test_generation",
            "Automatically generates unit tests for source code",
        )
        .category("testing")
        .required(&["code", "language"])
        .optional(&[
            "session_id",
            "test_framework",
            "file_path",
            "output_dir",
            "include_mocks",
            "coverage_target",
        ])
        .languages(&["python", "javascript", "typescript"])
        .long_running(true)
        .dependencies(&["run_tests"])
        .capabilities(&[
            "pytest and jest test generation",
            "Per-function test skeletons from parsed structure",
            "Coverage estimation",
            "Deterministic skeleton fallback without an LLM",
        ])
    }

    fn execute(&self, args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: TestGenerationRequest = parse_request(args)?;
        let response = run(&request, ctx)?;
        to_response(&response)
    }
}

fn default_framework(language: &str) -> &'static str {
    if language == "python" { "pytest" } else { "jest" }
}

fn tested_elements(view: &ParsedCode) -> Vec<HashMap<String, String>> {
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
    }
    elements
}

/// Skeleton tests derived from the parsed structure.
fn skeleton_tests(view: &ParsedCode, request: &TestGenerationRequest, framework: &str) -> String {
    let module = request
        .file_path
        .as_deref()
        .and_then(|path| path.rsplit('/').next())
        .and_then(|name| name.split('.').next())
        .unwrap_or("module_under_test");

    if framework == "pytest" || framework == "unittest" {
        let mut code = format!("import pytest\n\nfrom {module} import *\n\n");
        for function in view.functions.iter().filter(|f| !f.is_method) {
            let args: Vec<&str> = function.params.iter().map(|_| "None").collect();
            code.push_str(&format!(
                "\ndef test_{name}():\n    result = {name}({args})\n    assert result is not None\n",
                name = function.name,
                args = args.join(", ")
            ));
        }
        for class in &view.classes {
            code.push_str(&format!(
                "\ndef test_{lower}_instantiation():\n    instance = {name}()\n    assert instance is not None\n",
                lower = class.name.to_lowercase(),
                name = class.name
            ));
        }
        if view.functions.is_empty() && view.classes.is_empty() {
            code.push_str("\ndef test_module_imports():\n    assert True\n");
        }
        code
    } else {
        let mut code = format!("const mod = require('./{module}');\n\n");
        for function in view.functions.iter().filter(|f| !f.is_method) {
            let args: Vec<&str> = function.params.iter().map(|_| "undefined").collect();
            code.push_str(&format!(
                "\ntest('{name} runs', () => {{\n  expect(mod.{name}({args})).toBeDefined();\n}});\n",
                name = function.name,
                args = args.join(", ")
            ));
        }
        for class in &view.classes {
            code.push_str(&format!(
                "\ntest('{name} instantiates', () => {{\n  expect(new mod.{name}()).toBeDefined();\n}});\n",
                name = class.name
            ));
        }
        if view.functions.is_empty() && view.classes.is_empty() {
            code.push_str("\ntest('module loads', () => {\n  expect(mod).toBeDefined();\n});\n");
        }
        code
    }
}

fn estimated_coverage(view: &ParsedCode, coverage_target: f64) -> f64 {
    let total = view.functions.iter().filter(|f| !f.is_method).count() + view.classes.len();
    if total == 0 {
        return 0.0;
    }
    // Skeletons exercise the happy path of every element; cap by the
    // requested target.
    (0.6_f64).min(coverage_target)
}

fn test_file_path(request: &TestGenerationRequest, framework: &str) -> Option<String> {
    let stem = request
        .file_path
        .as_deref()
        .and_then(|path| path.rsplit('/').next())
        .and_then(|name| name.split('.').next())?;
    let dir = request.output_dir.as_deref().unwrap_or("tests");
    let filename = if framework == "pytest" || framework == "unittest" {
        format!("test_{stem}.py")
    } else {
        let extension = if request.language == "typescript" { "ts" } else { "js" };
        format!("{stem}.test.{extension}")
    };
    Some(format!("{dir}/{filename}"))
}

fn build_prompt(request: &TestGenerationRequest, view: &ParsedCode, framework: &str) -> String {
    let mocks = if request.include_mocks {
        "\nMock external dependencies."
    } else {
        ""
    };
    format!(
        "Generate {framework} tests for the following {} code, targeting {:.0}% coverage.{mocks}\n\
         Cover the {} function(s) and {} class(es) the parser found, including edge cases.\n\n\
         ```{}\n{}\n```\n\n\
         Answer with the test code only, inside a single code block.",
        request.language,
        request.coverage_target * 100.0,
        view.functions.len(),
        view.classes.len(),
        request.language,
        request.code
    )
}

/// Runs the generation. Exposed for in-crate integration tests.
pub(crate) fn run(
    request: &TestGenerationRequest,
    ctx: &ExecutionContext<'_>,
) -> Result<TestGenerationResponse> {
    if request.code.trim().is_empty() {
        return Err(Error::Validation("'code' must not be empty".to_string()));
    }
    if !(0.0..=1.0).contains(&request.coverage_target) {
        return Err(Error::Validation(
            "coverage_target must be between 0.0 and 1.0".to_string(),
        ));
    }
    let language = request.language.trim().to_lowercase();
    let framework = request
        .test_framework
        .clone()
        .map(|framework| framework.trim().to_lowercase())
        .unwrap_or_else(|| default_framework(&language).to_string());

    let view = ctx.services.parser.parse(&request.code, Some(&language));
    let elements = tested_elements(&view);
    let path = test_file_path(request, &framework);

    let response = with_llm_fallback(
        ctx.llm_manager(),
        || build_prompt(request, &view, &framework),
        |raw| {
            let test_code = strip_code_fence(raw);
            if test_code.trim().is_empty() {
                return Err(Error::ExternalService {
                    service: "llm".to_string(),
                    cause: "empty test generation".to_string(),
                });
            }
            Ok(TestGenerationResponse {
                test_code,
                language: language.clone(),
                framework: framework.clone(),
                test_file_path: path.clone(),
                estimated_coverage: request.coverage_target.min(0.9),
                tested_elements: elements.clone(),
            })
        },
        || TestGenerationResponse {
            test_code: skeleton_tests(&view, request, &framework),
            language: language.clone(),
            framework: framework.clone(),
            test_file_path: path.clone(),
            estimated_coverage: estimated_coverage(&view, request.coverage_target),
            tested_elements: elements.clone(),
        },
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Services;

    #[test]
    fn test_pytest_skeletons() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = TestGenerationRequest {
            code: "def add(a, b):\n    return a + b\n\nclass Calc:\n    pass\n".to_string(),
            language: "python".to_string(),
            session_id: None,
            test_framework: None,
            file_path: Some("src/calc.py".to_string()),
            output_dir: None,
            include_mocks: false,
            coverage_target: 0.8,
        };
        let response = run(&request, &ctx).expect("run");
        assert_eq!(response.framework, "pytest");
        assert!(response.test_code.contains("def test_add"));
        assert!(response.test_code.contains("def test_calc_instantiation"));
        assert_eq!(response.test_file_path.as_deref(), Some("tests/test_calc.py"));
        assert!(response.estimated_coverage > 0.0);
        assert_eq!(response.tested_elements.len(), 2);
    }

    #[test]
    fn test_jest_skeletons() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = TestGenerationRequest {
            code: "function add(a, b) {\n  return a + b;\n}\n".to_string(),
            language: "javascript".to_string(),
            session_id: None,
            test_framework: None,
            file_path: Some("src/add.js".to_string()),
            output_dir: Some("spec".to_string()),
            include_mocks: false,
            coverage_target: 0.8,
        };
        let response = run(&request, &ctx).expect("run");
        assert_eq!(response.framework, "jest");
        assert!(response.test_code.contains("test('add runs'"));
        assert_eq!(response.test_file_path.as_deref(), Some("spec/add.test.js"));
    }

    #[test]
    fn test_empty_code_rejected() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = TestGenerationRequest {
            code: "  ".to_string(),
            language: "python".to_string(),
            session_id: None,
            test_framework: None,
            file_path: None,
            output_dir: None,
            include_mocks: false,
            coverage_target: 0.8,
        };
        assert!(run(&request, &ctx).is_err());
    }

    #[test]
    fn test_coverage_target_bounds() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = TestGenerationRequest {
            code: "x = 1".to_string(),
            language: "python".to_string(),
            session_id: None,
            test_framework: None,
            file_path: None,
            output_dir: None,
            include_mocks: false,
            coverage_target: 1.5,
        };
        assert!(run(&request, &ctx).is_err());
    }
}
