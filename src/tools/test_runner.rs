//! Sandboxed test runner.
//!
//! Runs pytest/unittest/jest/mocha/vitest either against a caller-provided
//! target path or inside a sandbox temp directory materialized from
//! provided source and test contents. The subprocess runs with a hard
//! timeout and a minimal CI-flavored environment; framework-specific
//! output is parsed into a uniform result and the sandbox is removed on
//! every exit path.

use super::process::run_with_timeout;
use super::{parse_request, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

/// Prefix of sandbox temp directories.
pub const SANDBOX_PREFIX: &str = "collegue_run_tests_";
/// Maximum characters of stdout/stderr kept in the response.
const MAX_OUTPUT: usize = 5000;
/// Maximum per-test results kept in the response.
const MAX_RESULTS: usize = 50;

static PYTEST_TEXT_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) passed(?:, (\d+) failed)?(?:, (\d+) skipped)?(?:, (\d+) error)?")
        .expect("valid regex")
});
static DURATION_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"in ([\d.]+)s").expect("valid regex"));
static UNITTEST_RAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Ran (\d+) tests? in ([\d.]+)s").expect("valid regex"));
static UNITTEST_TEST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(test\w+)\s+\(([^)]+)\)\s+\.\.\.\s+(ok|FAIL|ERROR|skipped)")
        .expect("valid regex")
});

/// Test execution request: either `target` or `test_content`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunTestsRequest {
    /// Test target: file, directory, pattern, or `all`.
    #[serde(default)]
    pub target: Option<String>,
    /// Test file content (sandbox mode).
    #[serde(default)]
    pub test_content: Option<String>,
    /// Source content under test (sandbox mode).
    #[serde(default)]
    pub source_content: Option<String>,
    /// `python`, `typescript`, or `javascript`.
    pub language: String,
    /// Framework; auto-detected when absent.
    #[serde(default)]
    pub framework: Option<String>,
    /// Working directory for target mode.
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Hard timeout in seconds (1-600).
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Include stdout in the response.
    #[serde(default)]
    pub verbose: bool,
    /// Test-name filter pattern.
    #[serde(default)]
    pub pattern: Option<String>,
}

const fn default_timeout() -> u64 {
    300
}

/// One test's result.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Test name.
    pub name: String,
    /// `passed`, `failed`, `skipped`, or `error`.
    pub status: String,
    /// Duration in seconds, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Failure message, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Test file, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Uniform test execution response.
#[derive(Debug, Clone, Serialize)]
pub struct RunTestsResponse {
    /// True when every test passed.
    pub success: bool,
    /// Total tests.
    pub total: usize,
    /// Passed tests.
    pub passed: usize,
    /// Failed tests.
    pub failed: usize,
    /// Skipped tests.
    pub skipped: usize,
    /// Errored tests.
    pub errors: usize,
    /// Total duration in seconds.
    pub duration: f64,
    /// Framework used.
    pub framework: String,
    /// Per-test results (≤50).
    pub results: Vec<TestResult>,
    /// Truncated stdout (verbose mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Truncated stderr, when non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// The invocation that ran.
    pub command: String,
}

#[derive(Debug, Default)]
struct ParsedRun {
    total: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
    errors: usize,
    duration: f64,
    results: Vec<TestResult>,
}

/// The test runner tool.
#[derive(Debug, Default)]
pub struct RunTestsTool;

impl RunTestsTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for RunTestsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "run_tests",
            "Runs unit tests (pytest, unittest, jest, mocha, vitest) and returns structured results",
        )
        .category("testing")
        .required(&["language"])
        .optional(&[
            "target",
            "test_content",
            "source_content",
            "framework",
            "working_dir",
            "timeout",
            "verbose",
            "pattern",
        ])
        .languages(&["python", "typescript", "javascript"])
        .long_running(true)
        .capabilities(&[
            "Python test execution with pytest or unittest",
            "TypeScript/JavaScript test execution with jest, mocha, or vitest",
            "Automatic framework detection",
            "Structured per-test results",
            "Configurable hard timeout",
            "Test-name pattern filtering",
            "stdout/stderr capture",
        ])
    }

    fn execute(&self, args: &Value, _ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: RunTestsRequest = parse_request(args)?;
        let response = run(&request)?;
        to_response(&response)
    }
}

const LANGUAGE_FRAMEWORKS: &[(&str, &[&str])] = &[
    ("python", &["pytest", "unittest"]),
    ("typescript", &["jest", "mocha", "vitest"]),
    ("javascript", &["jest", "mocha", "vitest"]),
];

fn frameworks_for(language: &str) -> &'static [&'static str] {
    LANGUAGE_FRAMEWORKS
        .iter()
        .find(|(lang, _)| *lang == language)
        .map_or(&[], |(_, frameworks)| *frameworks)
}

/// Detects the framework from project files: pytest when mentioned in
/// pyproject.toml; JS prefers vitest > jest > mocha by package.json deps.
fn detect_framework(language: &str, working_dir: &Path) -> String {
    if language == "python" {
        let pyproject = working_dir.join("pyproject.toml");
        if let Ok(content) = std::fs::read_to_string(pyproject) {
            if content.contains("pytest") {
                return "pytest".to_string();
            }
        }
        return "pytest".to_string();
    }

    let package_json = working_dir.join("package.json");
    if let Ok(content) = std::fs::read_to_string(package_json) {
        if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
            let mut deps = serde_json::Map::new();
            for section in ["dependencies", "devDependencies"] {
                if let Some(map) = parsed.get(section).and_then(Value::as_object) {
                    deps.extend(map.clone());
                }
            }
            if deps.contains_key("vitest") {
                return "vitest".to_string();
            }
            if deps.contains_key("jest") {
                return "jest".to_string();
            }
            if deps.contains_key("mocha") {
                return "mocha".to_string();
            }
        }
    }
    "jest".to_string()
}

/// Builds the invocation line for a framework and target.
fn build_command(framework: &str, target: Option<&str>, pattern: Option<&str>) -> Result<Vec<String>> {
    let mut cmd: Vec<String> = match framework {
        "pytest" => vec![
            "pytest".into(),
            "--tb=short".into(),
            "-v".into(),
            "--json-report".into(),
            "--json-report-file=-".into(),
        ],
        "unittest" => vec![
            "python".into(),
            "-m".into(),
            "unittest".into(),
            "discover".into(),
            "-v".into(),
        ],
        "jest" => vec![
            "npx".into(),
            "jest".into(),
            "--json".into(),
            "--testLocationInResults".into(),
        ],
        "mocha" => vec!["npx".into(), "mocha".into(), "--reporter".into(), "json".into()],
        "vitest" => vec![
            "npx".into(),
            "vitest".into(),
            "run".into(),
            "--reporter=json".into(),
        ],
        other => {
            return Err(Error::Execution(format!(
                "framework '{other}' is not configured"
            )))
        }
    };

    if let Some(target) = target.filter(|t| *t != "all") {
        match framework {
            "pytest" => {
                cmd.push(target.to_string());
                if let Some(pattern) = pattern {
                    cmd.push("-k".into());
                    cmd.push(pattern.to_string());
                }
            }
            "unittest" => {
                if target.ends_with(".py") {
                    cmd = vec![
                        "python".into(),
                        "-m".into(),
                        "unittest".into(),
                        target.to_string(),
                    ];
                } else {
                    cmd.push("-s".into());
                    cmd.push(target.to_string());
                }
                if let Some(pattern) = pattern {
                    cmd.push("-p".into());
                    cmd.push(pattern.to_string());
                }
            }
            "jest" | "vitest" => {
                cmd.push(target.to_string());
                if let Some(pattern) = pattern {
                    cmd.push("--testNamePattern".into());
                    cmd.push(pattern.to_string());
                }
            }
            "mocha" => {
                cmd.push(target.to_string());
                if let Some(pattern) = pattern {
                    cmd.push("--grep".into());
                    cmd.push(pattern.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(cmd)
}

/// Runs the tests. Exposed for in-crate integration tests.
pub(crate) fn run(request: &RunTestsRequest) -> Result<RunTestsResponse> {
    let language = request.language.trim().to_lowercase();
    if !["python", "typescript", "javascript"].contains(&language.as_str()) {
        return Err(Error::Validation(format!(
            "language '{language}' is not supported. Use: python, typescript, javascript"
        )));
    }
    if request.target.is_none() && request.test_content.is_none() {
        return Err(Error::Validation(
            "provide 'target' (path) or 'test_content' (test code)".to_string(),
        ));
    }
    if !(1..=600).contains(&request.timeout) {
        return Err(Error::Validation(
            "timeout must be between 1 and 600 seconds".to_string(),
        ));
    }

    // Sandbox mode: materialize a temp directory with the provided
    // source and test contents. The directory is removed when `sandbox`
    // drops, on every exit path.
    let mut sandbox: Option<tempfile::TempDir> = None;
    let (working_dir, target): (std::path::PathBuf, Option<String>) =
        if let Some(test_content) = &request.test_content {
            let dir = tempfile::Builder::new()
                .prefix(SANDBOX_PREFIX)
                .tempdir()
                .map_err(|e| Error::Execution(format!("cannot create sandbox: {e}")))?;

            let (test_filename, source_filename) = match language.as_str() {
                "python" => ("test_module.py".to_string(), "module_under_test.py".to_string()),
                "typescript" => ("module.test.ts".to_string(), "module_under_test.ts".to_string()),
                _ => ("module.test.js".to_string(), "module_under_test.js".to_string()),
            };

            if let Some(source_content) = &request.source_content {
                let source_path = dir.path().join(&source_filename);
                std::fs::write(&source_path, source_content)
                    .map_err(|e| Error::Execution(format!("cannot write source file: {e}")))?;
                tracing::info!(path = %source_path.display(), "source under test written");
            }

            // Python tests resolve the module through a sys.path prelude.
            let test_code = if language == "python" {
                format!(
                    "import sys\nsys.path.insert(0, {:?})\n{test_content}",
                    dir.path().to_string_lossy()
                )
            } else {
                test_content.clone()
            };
            let test_path = dir.path().join(&test_filename);
            std::fs::write(&test_path, test_code)
                .map_err(|e| Error::Execution(format!("cannot write test file: {e}")))?;
            tracing::info!(path = %test_path.display(), "tests written");

            let path = dir.path().to_path_buf();
            sandbox = Some(dir);
            (path, Some(test_filename))
        } else {
            let dir = request.working_dir.clone().unwrap_or_else(|| ".".to_string());
            let path = std::path::PathBuf::from(&dir);
            if !path.is_dir() {
                return Err(Error::Validation(format!(
                    "directory '{dir}' does not exist. Use 'test_content' to pass code directly."
                )));
            }
            (path, request.target.clone())
        };

    let framework = request
        .framework
        .clone()
        .map(|f| f.trim().to_lowercase())
        .unwrap_or_else(|| detect_framework(&language, &working_dir));

    let valid_frameworks = frameworks_for(&language);
    if !valid_frameworks.contains(&framework.as_str()) {
        return Err(Error::Validation(format!(
            "framework '{framework}' is incompatible with {language}. Use: {}",
            valid_frameworks.join(", ")
        )));
    }

    let cmd = build_command(&framework, target.as_deref(), request.pattern.as_deref())?;
    let cmd_str = cmd.join(" ");
    tracing::info!(command = %cmd_str, dir = %working_dir.display(), "running tests");

    let mut command = Command::new(&cmd[0]);
    command
        .args(&cmd[1..])
        .current_dir(&working_dir)
        .env("CI", "true")
        .env("FORCE_COLOR", "0");

    let output = run_with_timeout(&mut command, Duration::from_secs(request.timeout))
        .map_err(|e| {
            Error::Execution(format!(
                "command not found: {e}. Check that {framework} is installed."
            ))
        })?;
    // Keep the sandbox alive until after the subprocess finished.
    drop(sandbox);

    if output.timed_out {
        return Err(Error::Execution(format!(
            "timeout after {}s",
            request.timeout
        )));
    }

    let parsed = match framework.as_str() {
        "pytest" => parse_pytest_output(&output.stdout, &output.stderr),
        "jest" | "vitest" => parse_jest_output(&output.stdout),
        _ => parse_unittest_output(&output.stdout, &output.stderr),
    };

    let truncated_stdout = truncate_output(&output.stdout);
    let truncated_stderr = truncate_output(&output.stderr);

    Ok(RunTestsResponse {
        success: parsed.failed == 0 && parsed.errors == 0,
        total: parsed.total,
        passed: parsed.passed,
        failed: parsed.failed,
        skipped: parsed.skipped,
        errors: parsed.errors,
        duration: parsed.duration,
        framework,
        results: parsed.results,
        stdout: request.verbose.then_some(truncated_stdout),
        stderr: Some(truncated_stderr).filter(|s| !s.trim().is_empty()),
        command: cmd_str,
    })
}

fn truncate_output(output: &str) -> String {
    if output.chars().count() > MAX_OUTPUT {
        let head: String = output.chars().take(MAX_OUTPUT).collect();
        format!("{head}...[truncated]")
    } else {
        output.to_string()
    }
}

/// Parses pytest output: the JSON report blob when present, else the
/// text summary line.
fn parse_pytest_output(stdout: &str, stderr: &str) -> ParsedRun {
    let mut parsed = ParsedRun::default();

    // The JSON report is a single object containing a "summary" key.
    if let Some(start) = stdout.find('{') {
        if let Some(end) = stdout.rfind('}') {
            if start < end {
                if let Ok(report) = serde_json::from_str::<Value>(&stdout[start..=end]) {
                    if let Some(summary) = report.get("summary") {
                        let count = |key: &str| {
                            summary
                                .get(key)
                                .and_then(Value::as_u64)
                                .unwrap_or(0) as usize
                        };
                        parsed.total = count("total");
                        parsed.passed = count("passed");
                        parsed.failed = count("failed");
                        parsed.skipped = count("skipped");
                        parsed.errors = count("error");
                        parsed.duration = report
                            .get("duration")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0);

                        for test in report
                            .get("tests")
                            .and_then(Value::as_array)
                            .into_iter()
                            .flatten()
                            .take(MAX_RESULTS)
                        {
                            let outcome = test
                                .get("outcome")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown");
                            parsed.results.push(TestResult {
                                name: test
                                    .get("nodeid")
                                    .and_then(Value::as_str)
                                    .unwrap_or("unknown")
                                    .to_string(),
                                status: outcome.to_string(),
                                duration: test.get("duration").and_then(Value::as_f64),
                                message: (outcome == "failed")
                                    .then(|| {
                                        test.get("call")
                                            .and_then(|call| call.get("longrepr"))
                                            .and_then(Value::as_str)
                                            .map(str::to_string)
                                    })
                                    .flatten(),
                                file: None,
                            });
                        }
                        return parsed;
                    }
                }
            }
        }
    }

    // Text fallback: "X passed, Y failed, Z skipped".
    let combined = format!("{stdout}{stderr}");
    if let Some(captures) = PYTEST_TEXT_SUMMARY.captures(&combined) {
        let group = |index: usize| {
            captures
                .get(index)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(0)
        };
        parsed.passed = group(1);
        parsed.failed = group(2);
        parsed.skipped = group(3);
        parsed.errors = group(4);
        parsed.total = parsed.passed + parsed.failed + parsed.skipped + parsed.errors;
    }
    if let Some(captures) = DURATION_SECONDS.captures(&combined) {
        parsed.duration = captures[1].parse().unwrap_or(0.0);
    }
    parsed
}

/// Parses the jest/vitest JSON reporter output.
fn parse_jest_output(stdout: &str) -> ParsedRun {
    let mut parsed = ParsedRun::default();
    let Ok(report) = serde_json::from_str::<Value>(stdout) else {
        return parsed;
    };

    let count = |key: &str| report.get(key).and_then(Value::as_u64).unwrap_or(0) as usize;
    parsed.total = count("numTotalTests");
    parsed.passed = count("numPassedTests");
    parsed.failed = count("numFailedTests");
    parsed.skipped = count("numPendingTests");

    let start = report.get("startTime").and_then(Value::as_f64).unwrap_or(0.0);
    for suite in report
        .get("testResults")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let end = suite.get("endTime").and_then(Value::as_f64).unwrap_or(start);
        parsed.duration = parsed.duration.max((end - start) / 1000.0);

        for test in suite
            .get("assertionResults")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .take(MAX_RESULTS)
        {
            let status = test.get("status").and_then(Value::as_str).unwrap_or("failed");
            let failure_messages: Vec<&str> = test
                .get("failureMessages")
                .and_then(Value::as_array)
                .map(|messages| messages.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            parsed.results.push(TestResult {
                name: test
                    .get("fullName")
                    .or_else(|| test.get("title"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                status: if status == "passed" { "passed" } else { "failed" }.to_string(),
                duration: test
                    .get("duration")
                    .and_then(Value::as_f64)
                    .map(|ms| ms / 1000.0),
                message: (!failure_messages.is_empty()).then(|| failure_messages.join("\n")),
                file: suite
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
    }
    parsed
}

/// Parses unittest (and mocha's closest-equivalent) text output.
fn parse_unittest_output(stdout: &str, stderr: &str) -> ParsedRun {
    let mut parsed = ParsedRun::default();
    let combined = format!("{stdout}{stderr}");

    if let Some(captures) = UNITTEST_RAN.captures(&combined) {
        parsed.total = captures[1].parse().unwrap_or(0);
        parsed.duration = captures[2].parse().unwrap_or(0.0);
    }

    if combined.contains("OK") && !combined.contains("FAILED") {
        parsed.passed = parsed.total;
    } else {
        let extract = |key: &str| {
            Regex::new(&format!(r"{key}=(\d+)"))
                .ok()
                .and_then(|re| re.captures(&combined))
                .and_then(|captures| captures[1].parse::<usize>().ok())
                .unwrap_or(0)
        };
        parsed.failed = extract("failures");
        parsed.errors = extract("errors");
        parsed.skipped = extract("skipped");
        parsed.passed = parsed
            .total
            .saturating_sub(parsed.failed + parsed.errors + parsed.skipped);
    }

    for captures in UNITTEST_TEST_LINE.captures_iter(&combined).take(MAX_RESULTS) {
        let status = match &captures[3] {
            "ok" => "passed",
            "FAIL" => "failed",
            "ERROR" => "error",
            _ => "skipped",
        };
        parsed.results.push(TestResult {
            name: format!("{}.{}", &captures[2], &captures[1]),
            status: status.to_string(),
            duration: None,
            message: None,
            file: None,
        });
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_pytest_command() {
        let cmd = build_command("pytest", Some("tests/"), Some("test_auth*")).expect("cmd");
        assert_eq!(cmd[0], "pytest");
        assert!(cmd.contains(&"tests/".to_string()));
        assert!(cmd.contains(&"-k".to_string()));
    }

    #[test]
    fn test_build_unittest_command_for_file() {
        let cmd = build_command("unittest", Some("tests/test_auth.py"), None).expect("cmd");
        assert_eq!(
            cmd,
            vec!["python", "-m", "unittest", "tests/test_auth.py"]
        );
    }

    #[test]
    fn test_unknown_framework_rejected() {
        assert!(build_command("rspec", None, None).is_err());
    }

    #[test]
    fn test_parse_pytest_json_report() {
        let stdout = r#"{"duration": 0.42, "summary": {"total": 2, "passed": 1, "failed": 1}, "tests": [
            {"nodeid": "test_module.py::test_ok", "outcome": "passed", "duration": 0.01},
            {"nodeid": "test_module.py::test_bad", "outcome": "failed", "duration": 0.02,
             "call": {"longrepr": "assert 1 == 2"}}
        ]}"#;
        let parsed = parse_pytest_output(stdout, "");
        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.passed, 1);
        assert_eq!(parsed.failed, 1);
        assert!((parsed.duration - 0.42).abs() < 1e-9);
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[1].message.as_deref(), Some("assert 1 == 2"));
    }

    #[test]
    fn test_parse_pytest_text_fallback() {
        let stdout = "==== 3 passed, 1 failed in 0.52s ====";
        let parsed = parse_pytest_output(stdout, "");
        assert_eq!(parsed.total, 4);
        assert_eq!(parsed.passed, 3);
        assert_eq!(parsed.failed, 1);
        assert!((parsed.duration - 0.52).abs() < 1e-9);
    }

    #[test]
    fn test_parse_jest_output() {
        let stdout = r#"{
            "numTotalTests": 2, "numPassedTests": 1, "numFailedTests": 1,
            "numPendingTests": 0, "startTime": 1000,
            "testResults": [{
                "name": "/tmp/module.test.js", "endTime": 1500,
                "assertionResults": [
                    {"fullName": "adds numbers", "status": "passed", "duration": 3},
                    {"fullName": "breaks", "status": "failed",
                     "failureMessages": ["expected 2 got 3"]}
                ]
            }]
        }"#;
        let parsed = parse_jest_output(stdout);
        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.failed, 1);
        assert!((parsed.duration - 0.5).abs() < 1e-9);
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(
            parsed.results[1].message.as_deref(),
            Some("expected 2 got 3")
        );
    }

    #[test]
    fn test_parse_unittest_output() {
        let stderr = "test_add (tests.TestMath) ... ok\ntest_div (tests.TestMath) ... FAIL\n\nRan 2 tests in 0.003s\n\nFAILED (failures=1)\n";
        let parsed = parse_unittest_output("", stderr);
        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.failed, 1);
        assert_eq!(parsed.passed, 1);
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].name, "tests.TestMath.test_add");
    }

    #[test]
    fn test_language_framework_compatibility() {
        let request = RunTestsRequest {
            target: Some("tests/".to_string()),
            test_content: None,
            source_content: None,
            language: "python".to_string(),
            framework: Some("jest".to_string()),
            working_dir: Some(".".to_string()),
            timeout: 30,
            verbose: false,
            pattern: None,
        };
        let err = run(&request).expect_err("incompatible");
        assert!(err.to_string().contains("incompatible"));
    }

    #[test]
    fn test_timeout_bounds_validated() {
        let request = RunTestsRequest {
            target: Some("tests/".to_string()),
            test_content: None,
            source_content: None,
            language: "python".to_string(),
            framework: None,
            working_dir: Some(".".to_string()),
            timeout: 0,
            verbose: false,
            pattern: None,
        };
        assert!(run(&request).is_err());
    }

    #[test]
    fn test_detect_framework_from_package_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"devDependencies": {"mocha": "^10.0.0"}}"#,
        )
        .expect("write");
        assert_eq!(detect_framework("javascript", dir.path()), "mocha");

        std::fs::write(
            dir.path().join("package.json"),
            r#"{"devDependencies": {"mocha": "^10.0.0", "vitest": "^1.0.0"}}"#,
        )
        .expect("write");
        // vitest wins over mocha.
        assert_eq!(detect_framework("javascript", dir.path()), "vitest");
    }

    #[test]
    fn test_detect_framework_python_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(detect_framework("python", dir.path()), "pytest");
    }

    #[test]
    fn test_missing_input_rejected() {
        let request = RunTestsRequest {
            target: None,
            test_content: None,
            source_content: None,
            language: "python".to_string(),
            framework: None,
            working_dir: None,
            timeout: 30,
            verbose: false,
            pattern: None,
        };
        assert!(run(&request).is_err());
    }
}
