//! Dependency and registry guard.
//!
//! Validates a project's dependencies from manifest content alone (never
//! the filesystem): registry existence, blocklist/allowlist policy,
//! known-malicious and deprecated packages, and known CVEs via the OSV
//! batch API.
//!
//! The problem this solves: AI assistants routinely hallucinate package
//! names or pin versions with known vulnerabilities. A confirmed missing
//! package is reported `not_found/critical` as a likely hallucination or
//! typosquat.

use super::osv::OsvClient;
use super::{parse_request, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::models::{Severity, SeverityCounts};
use crate::tools::process::run_with_timeout;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

static REQUIREMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9_-]+)(?:\[.*\])?\s*((?:==|>=|<=|>|<|~=|!=)[^\s;#]+)?")
        .expect("valid regex")
});
static DEP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9_-]+)").expect("valid regex"));
static PYPI_LATEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Available versions: ([^\s,]+)").expect("valid regex"));

/// Packages known to be malicious or typosquats, per ecosystem.
const KNOWN_MALICIOUS_PACKAGES: &[(&str, &[&str])] = &[
    (
        "python",
        // `python3-dateutil` and `jeIlyfish` (capital I) were actual PyPI
        // typosquat malware; `request` squats requests, `beautifulsoup`
        // squats beautifulsoup4.
        &["jeIlyfish", "python3-dateutil", "request", "beautifulsoup"],
    ),
    (
        "javascript",
        &["crossenv", "event-stream", "flatmap-stream", "eslint-scope"],
    ),
];

/// Deprecated packages and their replacements, per ecosystem.
const DEPRECATED_PACKAGES: &[(&str, &[(&str, &str)])] = &[
    (
        "python",
        &[
            ("pycrypto", "pycryptodome"),
            ("PIL", "pillow"),
            ("distribute", "setuptools"),
            ("nose", "pytest"),
            ("mock", "unittest.mock (built-in)"),
        ],
    ),
    (
        "javascript",
        &[
            ("request", "axios or node-fetch"),
            ("moment", "dayjs or date-fns"),
            ("underscore", "lodash"),
            ("bower", "npm or yarn"),
        ],
    ),
];

/// Request for dependency validation.
///
/// Content is always passed inline (`manifest_content` / `lock_content`);
/// the tool runs in isolated environments without host filesystem access.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyGuardRequest {
    /// Manifest content (requirements.txt, pyproject.toml, package.json).
    #[serde(default)]
    pub manifest_content: Option<String>,
    /// package-lock.json content. Required for JS/TS vulnerability scans.
    #[serde(default)]
    pub lock_content: Option<String>,
    /// Manifest type; inferred from the language when absent.
    #[serde(default)]
    pub manifest_type: Option<String>,
    /// `python` or `typescript`/`javascript`.
    pub language: String,
    /// Check known CVEs via the OSV batch API.
    #[serde(default = "default_true")]
    pub check_vulnerabilities: bool,
    /// Check package existence on the registry.
    #[serde(default = "default_true")]
    pub check_existence: bool,
    /// Allowed package names; anything else is flagged.
    #[serde(default)]
    pub allowlist: Option<Vec<String>>,
    /// Forbidden package names.
    #[serde(default)]
    pub blocklist: Option<Vec<String>>,
}

const fn default_true() -> bool {
    true
}

impl DependencyGuardRequest {
    /// Normalizes the language and checks the content requirements.
    fn normalized_language(&self) -> Result<String> {
        let language = match self.language.trim().to_lowercase().as_str() {
            "typescript" | "javascript" | "js" | "ts" => "javascript".to_string(),
            "python" => "python".to_string(),
            other => {
                return Err(Error::Validation(format!(
                    "language '{other}' is not supported. Use: python, typescript, javascript"
                )))
            }
        };

        if self.manifest_content.is_none() && self.lock_content.is_none() {
            return Err(Error::Validation(
                "provide 'manifest_content' and/or 'lock_content'".to_string(),
            ));
        }
        if language == "javascript" && self.check_vulnerabilities && self.lock_content.is_none() {
            return Err(Error::Validation(
                "JS/TS vulnerability scanning requires 'lock_content' (a minified package-lock.json)"
                    .to_string(),
            ));
        }
        Ok(language)
    }
}

/// One problem found on a dependency.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyIssue {
    /// Package name.
    pub package: String,
    /// Affected version, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `not_found`, `vulnerable`, `deprecated`, `blocked`, `not_allowed`,
    /// or `malicious`.
    pub issue_type: String,
    /// Issue severity.
    pub severity: Severity,
    /// Description of the problem.
    pub message: String,
    /// How to fix it.
    pub recommendation: String,
    /// CVE ids for vulnerabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve_ids: Option<Vec<String>>,
}

/// Analyzed state of one dependency.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyInfo {
    /// Package name.
    pub name: String,
    /// Requested version specifier.
    pub version_spec: String,
    /// Resolved version, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_version: Option<String>,
    /// Latest registry version, when checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    /// True when a newer version exists for a pinned dependency.
    pub is_outdated: bool,
    /// `ok`, `warning`, or `error`.
    pub status: String,
}

/// Dependency validation response.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyGuardResponse {
    /// True iff no critical and no high issues were found.
    pub valid: bool,
    /// Number of dependencies analyzed.
    pub total_dependencies: usize,
    /// Number of issues found.
    pub issues_count: usize,
    /// Critical issues.
    pub critical_issues: usize,
    /// High issues.
    pub high_issues: usize,
    /// Medium issues.
    pub medium_issues: usize,
    /// Low issues.
    pub low_issues: usize,
    /// Analyzed dependencies.
    pub dependencies: Vec<DependencyInfo>,
    /// Issues found.
    pub issues: Vec<DependencyIssue>,
    /// Manifest the analysis ran on (content marker).
    pub manifest_file: String,
    /// One-line human-readable summary.
    pub summary: String,
}

/// Result of a registry existence probe.
struct ExistenceCheck {
    /// `Some(false)` only on a confirmed miss; `None` when the probe
    /// itself failed (timeout, missing CLI) and nothing can be concluded.
    exists: Option<bool>,
    latest_version: Option<String>,
}

/// The dependency guard tool.
#[derive(Debug, Default)]
pub struct DependencyGuardTool;

impl DependencyGuardTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for DependencyGuardTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "dependency_guard",
            "Validates project dependencies: registry existence, versions, known vulnerabilities, supply-chain risks",
        )
        .category("security")
        .required(&["language"])
        .optional(&[
            "manifest_content",
            "lock_content",
            "manifest_type",
            "check_vulnerabilities",
            "check_existence",
            "allowlist",
            "blocklist",
        ])
        .languages(&["python", "typescript", "javascript", "ts", "js"])
        .long_running(true)
        .capabilities(&[
            "Package existence checks against PyPI/npm",
            "Detection of hallucinated package names",
            "Known CVE detection via the OSV batch API",
            "Deprecated package detection",
            "Allowlist and blocklist policies",
            "Typosquat detection",
            "requirements.txt, pyproject.toml, package.json, package-lock.json parsing",
        ])
    }

    fn execute(&self, args: &Value, _ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: DependencyGuardRequest = parse_request(args)?;
        let response = run(&request, &OsvClient::from_env())?;
        to_response(&response)
    }
}

fn malicious_for(language: &str) -> &'static [&'static str] {
    KNOWN_MALICIOUS_PACKAGES
        .iter()
        .find(|(lang, _)| *lang == language)
        .map_or(&[], |(_, packages)| *packages)
}

fn deprecated_for(language: &str) -> &'static [(&'static str, &'static str)] {
    DEPRECATED_PACKAGES
        .iter()
        .find(|(lang, _)| *lang == language)
        .map_or(&[], |(_, packages)| *packages)
}

/// Runs the validation. Exposed for in-crate integration tests.
pub(crate) fn run(
    request: &DependencyGuardRequest,
    osv: &OsvClient,
) -> Result<DependencyGuardResponse> {
    let language = request.normalized_language()?;

    // Resolve the manifest source and parse dependencies out of it.
    let (deps, manifest_file) = if request.manifest_content.is_none() {
        let lock = request.lock_content.as_deref().unwrap_or_default();
        (
            parse_package_lock(lock)?,
            "[content:package-lock.json]".to_string(),
        )
    } else {
        let content = request.manifest_content.as_deref().unwrap_or_default();
        let manifest_type = request.manifest_type.clone().unwrap_or_else(|| {
            if language == "javascript" {
                "package.json".to_string()
            } else {
                "requirements.txt".to_string()
            }
        });
        let deps = match manifest_type.as_str() {
            "requirements.txt" | "requirements" => parse_requirements(content),
            "package.json" | "package" => parse_package_json(content)?,
            "pyproject.toml" | "pyproject" => parse_pyproject(content),
            "package-lock.json" => parse_package_lock(content)?,
            other => {
                return Err(Error::Validation(format!(
                    "manifest type '{other}' is not supported"
                )))
            }
        };
        (deps, format!("[content:{manifest_type}]"))
    };

    let mut issues: Vec<DependencyIssue> = Vec::new();
    let mut dependencies_info: Vec<DependencyInfo> = Vec::new();

    let blocklist: Vec<String> = request
        .blocklist
        .iter()
        .flatten()
        .map(|name| name.to_lowercase())
        .collect();
    let allowlist: Vec<String> = request
        .allowlist
        .iter()
        .flatten()
        .map(|name| name.to_lowercase())
        .collect();
    let malicious = malicious_for(&language);
    let deprecated = deprecated_for(&language);

    for (name, version) in &deps {
        let name_lower = name.to_lowercase();
        let mut info = DependencyInfo {
            name: name.clone(),
            version_spec: version.clone(),
            resolved_version: None,
            latest_version: None,
            is_outdated: false,
            status: "ok".to_string(),
        };

        if blocklist.contains(&name_lower) {
            issues.push(DependencyIssue {
                package: name.clone(),
                version: Some(version.clone()),
                issue_type: "blocked".to_string(),
                severity: Severity::High,
                message: format!("package '{name}' is on the blocklist"),
                recommendation: "Remove this package or find an approved alternative".to_string(),
                cve_ids: None,
            });
            info.status = "error".to_string();
        }

        if !allowlist.is_empty() && !allowlist.contains(&name_lower) {
            issues.push(DependencyIssue {
                package: name.clone(),
                version: Some(version.clone()),
                issue_type: "not_allowed".to_string(),
                severity: Severity::Medium,
                message: format!("package '{name}' is not on the allowlist"),
                recommendation: format!("Add '{name}' to the allowlist or remove it"),
                cve_ids: None,
            });
            info.status = "warning".to_string();
        }

        if malicious.iter().any(|m| m.to_lowercase() == name_lower) {
            issues.push(DependencyIssue {
                package: name.clone(),
                version: Some(version.clone()),
                issue_type: "malicious".to_string(),
                severity: Severity::Critical,
                message: format!("package '{name}' is known as malicious or a typosquat"),
                recommendation: "Remove this package immediately".to_string(),
                cve_ids: None,
            });
            info.status = "error".to_string();
        }

        if let Some((_, replacement)) = deprecated
            .iter()
            .find(|(dep, _)| dep.to_lowercase() == name_lower)
        {
            issues.push(DependencyIssue {
                package: name.clone(),
                version: Some(version.clone()),
                issue_type: "deprecated".to_string(),
                severity: Severity::Low,
                message: format!("package '{name}' is deprecated"),
                recommendation: format!("Use {replacement} instead"),
                cve_ids: None,
            });
            if info.status == "ok" {
                info.status = "warning".to_string();
            }
        }

        if request.check_existence {
            let check = if language == "python" {
                check_pypi_existence(name)
            } else {
                check_npm_existence(name)
            };
            if check.exists == Some(false) {
                issues.push(DependencyIssue {
                    package: name.clone(),
                    version: Some(version.clone()),
                    issue_type: "not_found".to_string(),
                    severity: Severity::Critical,
                    message: format!("package '{name}' does not exist on the official registry"),
                    recommendation:
                        "Check the spelling. This package could be an AI hallucination or a typosquat."
                            .to_string(),
                    cve_ids: None,
                });
                info.status = "error".to_string();
            } else if let Some(latest) = check.latest_version {
                if let Some(pinned) = version.strip_prefix("==") {
                    if pinned != latest {
                        info.is_outdated = true;
                    }
                }
                info.latest_version = Some(latest);
            }
        }

        dependencies_info.push(info);
    }

    if request.check_vulnerabilities {
        let ecosystem = if language == "python" { "PyPI" } else { "npm" };
        // For JS the full lockfile gives exact versions for the whole tree.
        let scan_deps = match (&request.lock_content, language.as_str()) {
            (Some(lock), "javascript") => extract_all_packages_from_lock(lock),
            _ => deps.clone(),
        };
        for vuln in osv.check_vulnerabilities(&scan_deps, ecosystem) {
            issues.push(DependencyIssue {
                package: vuln.package,
                version: Some(vuln.version),
                issue_type: "vulnerable".to_string(),
                severity: vuln.severity,
                message: vuln.description,
                recommendation: format!(
                    "Update to a fixed version: {}",
                    vuln.fix_versions.join(", ")
                ),
                cve_ids: Some(vec![vuln.vulnerability_id]),
            });
        }
    }

    let counts = SeverityCounts::from_severities(issues.iter().map(|issue| issue.severity));
    let total_deps = deps.len();
    let total_issues = issues.len();

    let summary = if total_issues == 0 {
        format!("{total_deps} dependency(ies) analyzed, no issues found.")
    } else {
        format!(
            "{total_deps} dependency(ies) analyzed, {total_issues} issue(s) found. \
             Critical: {}, High: {}, Medium: {}, Low: {}.",
            counts.critical, counts.high, counts.medium, counts.low
        )
    };

    Ok(DependencyGuardResponse {
        valid: counts.passes(),
        total_dependencies: total_deps,
        issues_count: total_issues,
        critical_issues: counts.critical,
        high_issues: counts.high,
        medium_issues: counts.medium,
        low_issues: counts.low,
        dependencies: dependencies_info,
        issues,
        manifest_file,
        summary,
    })
}

// ---------------------------------------------------------------------------
// Manifest parsing
// ---------------------------------------------------------------------------

/// Parses PEP 508-style requirement lines: `name[extras]` + specifier.
pub(crate) fn parse_requirements(content: &str) -> Vec<(String, String)> {
    let mut dependencies = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if let Some(captures) = REQUIREMENT_LINE.captures(line) {
            let name = captures[1].to_string();
            let version = captures
                .get(2)
                .map_or_else(|| "*".to_string(), |m| m.as_str().to_string());
            dependencies.push((name, version));
        }
    }
    dependencies
}

/// Extracts `project.dependencies` names from pyproject.toml.
pub(crate) fn parse_pyproject(content: &str) -> Vec<(String, String)> {
    let mut dependencies = Vec::new();

    if let Ok(parsed) = content.parse::<toml::Value>() {
        if let Some(deps) = parsed
            .get("project")
            .and_then(|project| project.get("dependencies"))
            .and_then(toml::Value::as_array)
        {
            for dep in deps {
                if let Some(spec) = dep.as_str() {
                    if let Some(captures) = DEP_NAME.captures(spec.trim()) {
                        dependencies.push((captures[1].to_string(), "*".to_string()));
                    }
                }
            }
            return dependencies;
        }
    }

    // Degraded extraction for malformed TOML.
    if let Some(start) = content.find("dependencies") {
        if let Some(open) = content[start..].find('[') {
            if let Some(close) = content[start + open..].find(']') {
                let body = &content[start + open + 1..start + open + close];
                for line in body.split(['\n', ',']) {
                    let line = line.trim().trim_matches(['"', '\'']);
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(captures) = DEP_NAME.captures(line) {
                        dependencies.push((captures[1].to_string(), "*".to_string()));
                    }
                }
            }
        }
    }
    dependencies
}

/// Unions `dependencies` and `devDependencies` from package.json.
pub(crate) fn parse_package_json(content: &str) -> Result<Vec<(String, String)>> {
    let data: Value = serde_json::from_str(content)
        .map_err(|e| Error::Validation(format!("package.json parse error: {e}")))?;
    let mut dependencies = Vec::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(map) = data.get(section).and_then(Value::as_object) {
            for (name, version) in map {
                dependencies.push((
                    name.clone(),
                    version.as_str().unwrap_or("*").to_string(),
                ));
            }
        }
    }
    Ok(dependencies)
}

/// Extracts direct dependencies from package-lock.json.
///
/// Prefers the v2/v3 shape (`packages[""].dependencies/devDependencies`)
/// and falls back to the v1 top-level `dependencies` map.
pub(crate) fn parse_package_lock(content: &str) -> Result<Vec<(String, String)>> {
    let data: Value = serde_json::from_str(content)
        .map_err(|e| Error::Validation(format!("package-lock.json parse error: {e}")))?;

    let mut dependencies = Vec::new();
    let root = data.get("packages").and_then(|packages| packages.get(""));
    if let Some(root) = root {
        for section in ["dependencies", "devDependencies"] {
            if let Some(map) = root.get(section).and_then(Value::as_object) {
                for (name, version) in map {
                    dependencies.push((
                        name.clone(),
                        version.as_str().unwrap_or("*").to_string(),
                    ));
                }
            }
        }
    }

    if dependencies.is_empty() {
        // v1: the top-level map carries the whole resolved tree.
        if let Some(map) = data.get("dependencies").and_then(Value::as_object) {
            for (name, info) in map {
                let version = info
                    .as_str()
                    .map(str::to_string)
                    .or_else(|| {
                        info.get("version")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| "*".to_string());
                dependencies.push((name.clone(), version));
            }
        }
    }
    Ok(dependencies)
}

/// Extracts ALL packages with exact versions from package-lock.json, for
/// OSV scanning. Entries without a name or version are dropped with a
/// log entry, never fabricated.
pub(crate) fn extract_all_packages_from_lock(content: &str) -> Vec<(String, String)> {
    let Ok(data) = serde_json::from_str::<Value>(content) else {
        tracing::warn!("package-lock.json parse error during full extraction");
        return Vec::new();
    };

    let mut deps = Vec::new();
    if let Some(packages) = data.get("packages").and_then(Value::as_object) {
        for (path, info) in packages {
            if path.is_empty() {
                continue;
            }
            let Some(name) = path.rsplit("node_modules/").next().filter(|n| !n.is_empty())
            else {
                tracing::debug!(path, "skipping lockfile entry without a package name");
                continue;
            };
            let Some(version) = info.get("version").and_then(Value::as_str) else {
                tracing::debug!(path, "skipping lockfile entry without a version");
                continue;
            };
            deps.push((name.to_string(), version.to_string()));
        }
    }

    if deps.is_empty() {
        if let Some(map) = data.get("dependencies").and_then(Value::as_object) {
            collect_v1_deps(map, &mut deps);
        }
    }

    tracing::info!(packages = deps.len(), "extracted lockfile packages for OSV scan");
    deps
}

fn collect_v1_deps(map: &serde_json::Map<String, Value>, deps: &mut Vec<(String, String)>) {
    for (name, info) in map {
        if let Some(version) = info.get("version").and_then(Value::as_str) {
            deps.push((name.clone(), version.to_string()));
        }
        if let Some(nested) = info.get("dependencies").and_then(Value::as_object) {
            collect_v1_deps(nested, deps);
        }
    }
}

// ---------------------------------------------------------------------------
// Registry existence checks
// ---------------------------------------------------------------------------

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(30);

fn check_pypi_existence(package_name: &str) -> ExistenceCheck {
    match run_with_timeout(
        Command::new("pip").args(["index", "versions", package_name]),
        REGISTRY_TIMEOUT,
    ) {
        Ok(output) if output.timed_out => ExistenceCheck {
            exists: None,
            latest_version: None,
        },
        Ok(output) if output.success => ExistenceCheck {
            exists: Some(true),
            latest_version: PYPI_LATEST
                .captures(&output.stdout)
                .map(|c| c[1].to_string()),
        },
        Ok(_) => ExistenceCheck {
            exists: Some(false),
            latest_version: None,
        },
        Err(err) => {
            tracing::debug!(package = package_name, error = %err, "pip existence check failed");
            ExistenceCheck {
                exists: None,
                latest_version: None,
            }
        }
    }
}

fn check_npm_existence(package_name: &str) -> ExistenceCheck {
    match run_with_timeout(
        Command::new("npm").args(["view", package_name, "version"]),
        REGISTRY_TIMEOUT,
    ) {
        Ok(output) if output.timed_out => ExistenceCheck {
            exists: None,
            latest_version: None,
        },
        Ok(output) if output.success => ExistenceCheck {
            exists: Some(true),
            latest_version: Some(output.stdout.trim().to_string()).filter(|v| !v.is_empty()),
        },
        Ok(_) => ExistenceCheck {
            exists: Some(false),
            latest_version: None,
        },
        Err(err) => {
            tracing::debug!(package = package_name, error = %err, "npm existence check failed");
            ExistenceCheck {
                exists: None,
                latest_version: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requirements() {
        let content = "django==4.2.0\nrequests>=2.28\n# comment\n-r other.txt\nuvicorn[standard]~=0.23\n";
        let deps = parse_requirements(content);
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0], ("django".to_string(), "==4.2.0".to_string()));
        assert_eq!(deps[1], ("requests".to_string(), ">=2.28".to_string()));
        assert_eq!(deps[2], ("uvicorn".to_string(), "~=0.23".to_string()));
    }

    #[test]
    fn test_parse_pyproject() {
        let content = r#"
[project]
name = "demo"
dependencies = [
    "fastapi>=0.100",
    "pydantic",
]
"#;
        let deps = parse_pyproject(content);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].0, "fastapi");
        assert_eq!(deps[1].0, "pydantic");
    }

    #[test]
    fn test_parse_package_json() {
        let content = r#"{"dependencies": {"lodash": "^4.17.0"}, "devDependencies": {"jest": "^29.0.0"}}"#;
        let mut deps = parse_package_json(content).expect("parse");
        deps.sort();
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&("lodash".to_string(), "^4.17.0".to_string())));
    }

    #[test]
    fn test_parse_package_lock_v2() {
        let content = r#"{
            "lockfileVersion": 3,
            "packages": {
                "": {"dependencies": {"lodash": "^4.17.0"}},
                "node_modules/lodash": {"version": "4.17.21"}
            }
        }"#;
        let deps = parse_package_lock(content).expect("parse");
        assert_eq!(deps, vec![("lodash".to_string(), "^4.17.0".to_string())]);
    }

    #[test]
    fn test_parse_package_lock_v1_fallback() {
        let content = r#"{
            "lockfileVersion": 1,
            "dependencies": {"express": {"version": "4.18.2"}}
        }"#;
        let deps = parse_package_lock(content).expect("parse");
        assert_eq!(deps, vec![("express".to_string(), "4.18.2".to_string())]);
    }

    #[test]
    fn test_extract_all_packages_scoped_names() {
        let content = r#"{
            "packages": {
                "": {},
                "node_modules/lodash": {"version": "4.17.21"},
                "node_modules/@babel/core": {"version": "7.23.0"},
                "node_modules/unnamed": {}
            }
        }"#;
        let mut deps = extract_all_packages_from_lock(content);
        deps.sort();
        assert_eq!(
            deps,
            vec![
                ("@babel/core".to_string(), "7.23.0".to_string()),
                ("lodash".to_string(), "4.17.21".to_string()),
            ]
        );
    }

    #[test]
    fn test_language_normalization() {
        let mut request = DependencyGuardRequest {
            manifest_content: Some("django==4.2.0".to_string()),
            lock_content: None,
            manifest_type: None,
            language: "TS".to_string(),
            check_vulnerabilities: false,
            check_existence: false,
            allowlist: None,
            blocklist: None,
        };
        assert_eq!(request.normalized_language().expect("ok"), "javascript");

        request.language = "cobol".to_string();
        assert!(request.normalized_language().is_err());
    }

    #[test]
    fn test_js_vuln_scan_requires_lock() {
        let request = DependencyGuardRequest {
            manifest_content: Some("{}".to_string()),
            lock_content: None,
            manifest_type: Some("package.json".to_string()),
            language: "javascript".to_string(),
            check_vulnerabilities: true,
            check_existence: false,
            allowlist: None,
            blocklist: None,
        };
        assert!(request.normalized_language().is_err());
    }

    #[test]
    fn test_policy_checks_without_network() {
        let request = DependencyGuardRequest {
            manifest_content: Some(
                "django==4.2.0\nrequests>=2.28\npycrypto==2.6.1\nrequest==1.0\n".to_string(),
            ),
            lock_content: None,
            manifest_type: Some("requirements.txt".to_string()),
            language: "python".to_string(),
            check_vulnerabilities: false,
            check_existence: false,
            allowlist: None,
            blocklist: None,
        };
        let response = run(&request, &OsvClient::new()).expect("run");

        assert_eq!(response.total_dependencies, 4);
        assert!(!response.valid);
        assert_eq!(response.critical_issues, 1);
        assert_eq!(response.low_issues, 1);

        let malicious = response
            .issues
            .iter()
            .find(|issue| issue.issue_type == "malicious")
            .expect("malicious issue");
        assert_eq!(malicious.package, "request");
        assert_eq!(malicious.severity, Severity::Critical);

        let deprecated = response
            .issues
            .iter()
            .find(|issue| issue.issue_type == "deprecated")
            .expect("deprecated issue");
        assert_eq!(deprecated.package, "pycrypto");
        assert!(deprecated.recommendation.contains("pycryptodome"));
    }

    #[test]
    fn test_blocklist_and_allowlist() {
        let request = DependencyGuardRequest {
            manifest_content: Some("django==4.2.0\nleft-pad==1.0\n".to_string()),
            lock_content: None,
            manifest_type: Some("requirements.txt".to_string()),
            language: "python".to_string(),
            check_vulnerabilities: false,
            check_existence: false,
            allowlist: Some(vec!["django".to_string()]),
            blocklist: Some(vec!["left-pad".to_string()]),
        };
        let response = run(&request, &OsvClient::new()).expect("run");
        let kinds: Vec<&str> = response
            .issues
            .iter()
            .map(|issue| issue.issue_type.as_str())
            .collect();
        assert!(kinds.contains(&"blocked"));
        assert!(kinds.contains(&"not_allowed"));
    }
}
