//! Infrastructure-as-Code guardrails scanner.
//!
//! Scans Kubernetes manifests, Terraform configurations, and Dockerfiles
//! for dangerous defaults: excessive privileges, open network exposure,
//! hardcoded secrets. Two engines run per file kind: the YAML-declared
//! regex rule sets ([`rules`]) and a semantic deep scanner. Optional LLM
//! enrichment blends model scores with the heuristics, and the auto-chain
//! policy hands the worst offender to the refactoring tool.

pub mod dockerfile;
pub mod kubernetes;
pub mod rules;
pub mod sarif;
pub mod terraform;

use super::{parse_request, report_progress, to_response, ExecutionContext, Tool, ToolDescriptor};
use crate::llm::LlmManager;
use crate::models::{FileInput, Severity, SeverityCounts};
use crate::{Error, Result};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

/// Maximum findings returned in a response.
const MAX_FINDINGS: usize = 100;
/// Maximum characters of file content carried into a remediation request.
const REMEDIATION_CODE_LIMIT: usize = 5000;
/// Maximum suggested remediation actions.
const MAX_REMEDIATIONS: usize = 5;

/// One IaC security finding.
#[derive(Debug, Clone, Serialize)]
pub struct IacFinding {
    /// Rule identifier.
    pub rule_id: String,
    /// Finding severity.
    pub severity: Severity,
    /// File path.
    pub path: String,
    /// 1-based line number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Affected resource name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Short title.
    pub title: String,
    /// Longer message.
    pub description: String,
    /// Remediation advice.
    pub remediation: String,
    /// Reference links.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Engine that produced the finding.
    pub engine: String,
}

/// A custom policy: regex or YAML-rule form.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomPolicy {
    /// Unique policy identifier.
    pub id: String,
    /// Policy description.
    #[serde(default)]
    pub description: Option<String>,
    /// Rule content: a regex, or a YAML object following the rule shape.
    pub content: String,
    /// `regex` or `yaml-rules`.
    #[serde(default = "default_policy_language")]
    pub language: String,
    /// Severity of findings from this policy.
    #[serde(default)]
    pub severity: Severity,
}

fn default_policy_language() -> String {
    "yaml-rules".to_string()
}

/// IaC scan request.
#[derive(Debug, Clone, Deserialize)]
pub struct IacGuardrailsRequest {
    /// Files to scan.
    pub files: Vec<FileInput>,
    /// `baseline` (default) or `strict`.
    #[serde(default = "default_profile")]
    pub policy_profile: String,
    /// Target platform hints ({cloud, k8s_version}).
    #[serde(default)]
    pub platform: Option<HashMap<String, String>>,
    /// Engines to run.
    #[serde(default = "default_engines")]
    pub engines: Vec<String>,
    /// Additional custom policies.
    #[serde(default)]
    pub custom_policies: Option<Vec<CustomPolicy>>,
    /// `json` (default) or `sarif`.
    #[serde(default = "default_output_format")]
    pub output_format: String,
    /// `fast` (rules only) or `deep` (LLM enrichment with scoring).
    #[serde(default = "default_depth")]
    pub analysis_depth: String,
    /// Trigger automatic remediation when the security score falls below
    /// `remediation_threshold`.
    #[serde(default)]
    pub auto_chain: bool,
    /// Security-score threshold for auto-chaining (0.0-1.0).
    #[serde(default = "default_threshold")]
    pub remediation_threshold: f64,
}

fn default_profile() -> String {
    "baseline".to_string()
}

fn default_engines() -> Vec<String> {
    vec!["embedded-rules".to_string()]
}

fn default_output_format() -> String {
    "json".to_string()
}

fn default_depth() -> String {
    "fast".to_string()
}

const fn default_threshold() -> f64 {
    0.5
}

/// An LLM-produced security insight (deep mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSecurityInsight {
    /// `vulnerability`, `misconfiguration`, `compliance`, or `best_practice`.
    pub category: String,
    /// The insight itself.
    pub insight: String,
    /// Risk level attributed by the model.
    #[serde(default)]
    pub risk_level: Severity,
    /// Resources the insight concerns.
    #[serde(default)]
    pub affected_resources: Vec<String>,
    /// Impacted compliance frameworks (CIS, SOC2, HIPAA, ...).
    #[serde(default)]
    pub compliance_frameworks: Vec<String>,
}

/// A suggested remediation action.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationAction {
    /// Tool to invoke (`code_refactoring`).
    pub tool_name: String,
    /// Action type (`fix_config`).
    pub action_type: String,
    /// Why this action is suggested.
    pub rationale: String,
    /// Action priority.
    pub priority: Severity,
    /// Parameters for the tool invocation.
    pub params: Value,
    /// Relevance score (0.0-1.0); higher means more urgent.
    pub score: f64,
}

/// IaC scan response.
#[derive(Debug, Clone, Serialize)]
pub struct IacGuardrailsResponse {
    /// True iff no critical and no high findings.
    pub passed: bool,
    /// Counters: total/critical/high/medium/low/passed/failed/skipped.
    pub summary: HashMap<String, usize>,
    /// Findings, deduplicated and capped.
    pub findings: Vec<IacFinding>,
    /// Number of files scanned.
    pub files_scanned: usize,
    /// Number of rules evaluated.
    pub rules_evaluated: usize,
    /// One-line summary.
    pub scan_summary: String,
    /// SARIF document when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sarif: Option<Value>,
    /// Depth actually used.
    pub analysis_depth_used: String,
    /// LLM insights (deep mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_insights: Option<Vec<LlmSecurityInsight>>,
    /// Overall security score (0.0 critical - 1.0 secure).
    pub security_score: f64,
    /// Compliance score (0.0 - 1.0).
    pub compliance_score: f64,
    /// Overall risk level.
    pub risk_level: Severity,
    /// Suggested remediation actions.
    pub suggested_remediations: Vec<RemediationAction>,
    /// True when auto-remediation ran.
    pub auto_remediation_triggered: bool,
    /// Compact auto-remediation result, when triggered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_remediation_result: Option<Value>,
}

/// The IaC guardrails scanner tool.
#[derive(Debug, Default)]
pub struct IacGuardrailsScanTool;

impl IacGuardrailsScanTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for IacGuardrailsScanTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "iac_guardrails_scan",
            "Scans Terraform/Kubernetes/Dockerfile for dangerous configurations (least privilege)",
        )
        .category("security")
        .required(&["files"])
        .optional(&[
            "policy_profile",
            "platform",
            "engines",
            "custom_policies",
            "output_format",
            "analysis_depth",
            "auto_chain",
            "remediation_threshold",
        ])
        .languages(&["terraform", "kubernetes", "dockerfile", "yaml", "hcl", "tf"])
        .dependencies(&["code_refactoring"])
        .capabilities(&[
            "Kubernetes security scanning (Pod Security Standards)",
            "Terraform security scanning (AWS, GCP, Azure)",
            "Dockerfile best-practice scanning",
            "Baseline and strict profiles",
            "Custom policy support (regex or YAML rules)",
            "SARIF output for CI/CD integration",
            "LLM-backed deep analysis with blended scoring",
            "Auto-chained remediation through the refactoring tool",
        ])
    }

    fn execute(&self, args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value> {
        let request: IacGuardrailsRequest = parse_request(args)?;
        let response = run(&request, ctx)?;
        to_response(&response)
    }
}

/// Classifies a file by name and content sniffing.
#[must_use]
pub fn detect_file_type(filepath: &str, content: &str) -> &'static str {
    let lower_path = filepath.to_lowercase();

    if lower_path.ends_with(".tf") || lower_path.ends_with(".tf.json") {
        return "terraform";
    }
    if lower_path == "dockerfile"
        || lower_path.ends_with("/dockerfile")
        || lower_path.contains("dockerfile")
    {
        return "dockerfile";
    }
    if lower_path.ends_with(".yaml") || lower_path.ends_with(".yml") {
        if ["apiVersion:", "kind:", "metadata:"]
            .iter()
            .any(|marker| content.contains(marker))
        {
            return "kubernetes";
        }
        return "yaml";
    }
    if content.contains("resource")
        && (content.contains("aws_") || content.contains("azurerm_") || content.contains("google_"))
    {
        return "terraform";
    }
    if content.trim_start().starts_with("FROM ") {
        return "dockerfile";
    }
    "unknown"
}

/// Runs the scan. Exposed for in-crate integration tests.
pub(crate) fn run(
    request: &IacGuardrailsRequest,
    ctx: &ExecutionContext<'_>,
) -> Result<IacGuardrailsResponse> {
    validate(request)?;
    tracing::info!(
        files = request.files.len(),
        profile = %request.policy_profile,
        "scanning IaC files"
    );
    report_progress(ctx, 0, 4);

    let strict = request.policy_profile == "strict";
    let mut all_findings: Vec<IacFinding> = Vec::new();
    let mut rules_evaluated = 0usize;

    for file in &request.files {
        let file_type = detect_file_type(&file.path, &file.content);
        tracing::debug!(path = %file.path, file_type, "typed IaC file");

        let rule_set = match file_type {
            "kubernetes" => Some(rules::k8s_rules()),
            "terraform" => Some(rules::terraform_rules()),
            "dockerfile" => Some(rules::dockerfile_rules()),
            _ => None,
        };
        if let Some(rule_set) = rule_set {
            rules_evaluated += rule_set.rule_count(strict);
            for rule in rule_set.active_rules(strict) {
                all_findings.extend(rules::apply_rule(rule, &file.content, &file.path));
            }
        }

        match file_type {
            "kubernetes" => all_findings.extend(kubernetes::scan(&file.content, &file.path)),
            "terraform" => all_findings.extend(terraform::scan(&file.content, &file.path)),
            "dockerfile" => all_findings.extend(dockerfile::scan(&file.content, &file.path)),
            _ => {}
        }

        if let Some(policies) = &request.custom_policies {
            rules_evaluated += policies.len();
            all_findings.extend(apply_custom_policies(&file.content, &file.path, policies));
        }
    }

    // Deduplicate on (rule, path, line): the regex rules and the deep
    // scanners intentionally overlap.
    let mut seen: HashSet<(String, String, Option<usize>)> = HashSet::new();
    let unique_findings: Vec<IacFinding> = all_findings
        .into_iter()
        .filter(|finding| {
            seen.insert((finding.rule_id.clone(), finding.path.clone(), finding.line))
        })
        .collect();

    report_progress(ctx, 1, 4);

    let counts = SeverityCounts::from_severities(unique_findings.iter().map(|f| f.severity));
    let passed = counts.passes();

    let summary = HashMap::from([
        ("total".to_string(), unique_findings.len()),
        ("critical".to_string(), counts.critical),
        ("high".to_string(), counts.high),
        ("medium".to_string(), counts.medium),
        ("low".to_string(), counts.low),
        (
            "passed".to_string(),
            rules_evaluated.saturating_sub(unique_findings.len()),
        ),
        ("failed".to_string(), unique_findings.len()),
        ("skipped".to_string(), 0),
    ]);

    // Scores: heuristics first, blended with the LLM in deep mode.
    let mut llm_insights = None;
    let mut analysis_depth_used = "fast".to_string();
    let (mut security_score, mut compliance_score, mut risk_level) =
        calculate_security_scores(&unique_findings);

    if request.analysis_depth == "deep" {
        analysis_depth_used = "deep".to_string();
        tracing::info!("deep mode: LLM security enrichment");
        if let Some((insights, security, compliance, risk)) =
            deep_analysis(request, &unique_findings, ctx.llm_manager())
        {
            llm_insights = Some(insights);
            security_score = security;
            compliance_score = compliance;
            risk_level = risk;
        }
    }
    report_progress(ctx, 2, 4);

    let suggested_remediations =
        generate_remediation_actions(&unique_findings, &request.files, security_score);

    let mut auto_remediation_triggered = false;
    let mut auto_remediation_result = None;
    if request.auto_chain
        && security_score < request.remediation_threshold
        && !suggested_remediations.is_empty()
    {
        tracing::info!(
            security_score,
            threshold = request.remediation_threshold,
            "auto-remediation engaged"
        );
        match execute_auto_remediation(&unique_findings, &suggested_remediations, ctx) {
            Some(result) => {
                auto_remediation_triggered = true;
                auto_remediation_result = Some(result);
            }
            None => {
                tracing::warn!("auto-remediation could not run");
            }
        }
    }
    report_progress(ctx, 3, 4);

    let mut scan_summary = if passed && unique_findings.is_empty() {
        format!(
            "No security issues detected in {} IaC file(s).",
            request.files.len()
        )
    } else if passed {
        format!(
            "{} minor issue(s) detected in {} file(s). Medium({}), Low({}).",
            unique_findings.len(),
            request.files.len(),
            counts.medium,
            counts.low
        )
    } else {
        format!(
            "{} security issue(s) in {} file(s)! Critical({}), High({}), Medium({}), Low({}).",
            unique_findings.len(),
            request.files.len(),
            counts.critical,
            counts.high,
            counts.medium,
            counts.low
        )
    };
    if analysis_depth_used == "deep" {
        scan_summary.push_str(&format!(
            " Security score: {:.0}%, compliance: {:.0}% (risk: {risk_level}).",
            security_score * 100.0,
            compliance_score * 100.0
        ));
        if let Some(insights) = &llm_insights {
            scan_summary.push_str(&format!(" {} insight(s).", insights.len()));
        }
    }
    if auto_remediation_triggered {
        scan_summary.push_str(" Auto-remediation triggered.");
    }

    let sarif_output = if request.output_format == "sarif" {
        Some(sarif::generate(&unique_findings))
    } else {
        None
    };

    let mut findings = unique_findings;
    findings.truncate(MAX_FINDINGS);

    Ok(IacGuardrailsResponse {
        passed,
        summary,
        findings,
        files_scanned: request.files.len(),
        rules_evaluated,
        scan_summary,
        sarif: sarif_output,
        analysis_depth_used,
        llm_insights,
        security_score,
        compliance_score,
        risk_level,
        suggested_remediations,
        auto_remediation_triggered,
        auto_remediation_result,
    })
}

fn validate(request: &IacGuardrailsRequest) -> Result<()> {
    if request.files.is_empty() {
        return Err(Error::Validation("'files' must not be empty".to_string()));
    }
    if !["baseline", "strict"].contains(&request.policy_profile.as_str()) {
        return Err(Error::Validation(format!(
            "profile '{}' is invalid. Use: baseline, strict",
            request.policy_profile
        )));
    }
    for engine in &request.engines {
        if !["embedded-rules", "opa-lite"].contains(&engine.as_str()) {
            return Err(Error::Validation(format!(
                "engine '{engine}' is invalid. Use: embedded-rules, opa-lite"
            )));
        }
    }
    if !["fast", "deep"].contains(&request.analysis_depth.as_str()) {
        return Err(Error::Validation(format!(
            "analysis depth '{}' is invalid. Use: fast, deep",
            request.analysis_depth
        )));
    }
    if !["json", "sarif"].contains(&request.output_format.as_str()) {
        return Err(Error::Validation(format!(
            "output format '{}' is invalid. Use: json, sarif",
            request.output_format
        )));
    }
    if !(0.0..=1.0).contains(&request.remediation_threshold) {
        return Err(Error::Validation(
            "remediation_threshold must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(())
}

fn apply_custom_policies(
    content: &str,
    filepath: &str,
    policies: &[CustomPolicy],
) -> Vec<IacFinding> {
    let mut findings = Vec::new();
    for policy in policies {
        match policy.language.as_str() {
            "regex" => {
                let Ok(regex) = RegexBuilder::new(&policy.content)
                    .multi_line(true)
                    .case_insensitive(true)
                    .build()
                else {
                    tracing::warn!(policy = %policy.id, "invalid regex in custom policy");
                    continue;
                };
                for found in regex.find_iter(content) {
                    let line = content[..found.start()].matches('\n').count() + 1;
                    findings.push(IacFinding {
                        rule_id: policy.id.clone(),
                        severity: policy.severity,
                        path: filepath.to_string(),
                        line: Some(line),
                        resource: None,
                        title: policy
                            .description
                            .clone()
                            .unwrap_or_else(|| format!("Custom policy {}", policy.id)),
                        description: policy
                            .description
                            .clone()
                            .unwrap_or_else(|| "Custom policy matched".to_string()),
                        remediation: "See the custom policy documentation".to_string(),
                        references: Vec::new(),
                        engine: "custom-policy".to_string(),
                    });
                }
            }
            _ => {
                // YAML rule shape: {pattern, title?, description?, remediation?, references?}
                let Ok(rule) = serde_yaml_ng::from_str::<serde_yaml_ng::Value>(&policy.content)
                else {
                    tracing::warn!(policy = %policy.id, "invalid YAML in custom policy");
                    continue;
                };
                let Some(pattern) = rule.get("pattern").and_then(serde_yaml_ng::Value::as_str)
                else {
                    continue;
                };
                let Ok(regex) = RegexBuilder::new(pattern)
                    .multi_line(true)
                    .case_insensitive(true)
                    .build()
                else {
                    tracing::warn!(policy = %policy.id, "invalid pattern in custom YAML policy");
                    continue;
                };
                if regex.is_match(content) {
                    findings.push(IacFinding {
                        rule_id: policy.id.clone(),
                        severity: policy.severity,
                        path: filepath.to_string(),
                        line: Some(1),
                        resource: None,
                        title: rule
                            .get("title")
                            .and_then(serde_yaml_ng::Value::as_str)
                            .map(str::to_string)
                            .or_else(|| policy.description.clone())
                            .unwrap_or_else(|| policy.id.clone()),
                        description: rule
                            .get("description")
                            .and_then(serde_yaml_ng::Value::as_str)
                            .map(str::to_string)
                            .or_else(|| policy.description.clone())
                            .unwrap_or_default(),
                        remediation: rule
                            .get("remediation")
                            .and_then(serde_yaml_ng::Value::as_str)
                            .unwrap_or("See documentation")
                            .to_string(),
                        references: rule
                            .get("references")
                            .and_then(serde_yaml_ng::Value::as_sequence)
                            .map(|refs| {
                                refs.iter()
                                    .filter_map(serde_yaml_ng::Value::as_str)
                                    .map(str::to_string)
                                    .collect()
                            })
                            .unwrap_or_default(),
                        engine: "custom-yaml-policy".to_string(),
                    });
                }
            }
        }
    }
    findings
}

/// Heuristic scores: weighted severity sum for security, compliance-tag
/// count for compliance, and a risk ladder.
fn calculate_security_scores(findings: &[IacFinding]) -> (f64, f64, Severity) {
    if findings.is_empty() {
        return (1.0, 1.0, Severity::Low);
    }

    let total_weight: f64 = findings
        .iter()
        .map(|finding| match finding.severity {
            Severity::Critical => 0.4,
            Severity::High => 0.25,
            Severity::Medium => 0.1,
            _ => 0.05,
        })
        .sum();
    let security_score = (1.0 - total_weight / 2.0).max(0.0);

    let compliance_related = findings
        .iter()
        .filter(|finding| {
            finding.rule_id.starts_with("K8S-") || finding.rule_id.starts_with("TF-")
        })
        .count();
    #[allow(clippy::cast_precision_loss)]
    let compliance_score = (1.0 - compliance_related as f64 * 0.1).max(0.0);

    let critical_count = findings
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .count();
    let high_count = findings.iter().filter(|f| f.severity == Severity::High).count();

    let risk_level = if critical_count > 0 {
        Severity::Critical
    } else if high_count >= 2 {
        Severity::High
    } else if high_count > 0 || findings.len() >= 5 {
        Severity::Medium
    } else {
        Severity::Low
    };

    (security_score, compliance_score, risk_level)
}

#[derive(Debug, Deserialize)]
struct DeepAnalysisPayload {
    #[serde(default = "default_half")]
    security_score: f64,
    #[serde(default = "default_half")]
    compliance_score: f64,
    #[serde(default)]
    insights: Vec<LlmSecurityInsight>,
}

const fn default_half() -> f64 {
    0.5
}

fn build_deep_prompt(request: &IacGuardrailsRequest, findings: &[IacFinding]) -> String {
    let mut files_summary = Vec::new();
    for file in request.files.iter().take(3) {
        let file_type = detect_file_type(&file.path, &file.content);
        let preview: String = file.content.chars().take(500).collect();
        let ellipsis = if file.content.len() > 500 { "..." } else { "" };
        files_summary.push(format!(
            "### {} ({file_type})\n```\n{preview}{ellipsis}\n```",
            file.path
        ));
    }

    let findings_summary: Vec<String> = findings
        .iter()
        .take(10)
        .map(|finding| {
            format!(
                "- [{}] {}: {} @ {}",
                finding.severity.as_str().to_uppercase(),
                finding.rule_id,
                finding.title,
                finding.path
            )
        })
        .collect();

    let cloud = request
        .platform
        .as_ref()
        .and_then(|platform| platform.get("cloud").cloned())
        .unwrap_or_else(|| "aws".to_string());

    format!(
        r#"Analyze the IaC configurations and the detected security findings.

## IaC files analyzed
{}

## Findings ({} total)
{}

## Context
- Cloud provider: {cloud}
- Profile: {}

---

Provide an enriched security analysis as strict JSON:
{{
  "security_score": 0.0-1.0,
  "compliance_score": 0.0-1.0,
  "risk_level": "low|medium|high|critical",
  "insights": [
    {{
      "category": "vulnerability|misconfiguration|compliance|best_practice",
      "insight": "Detailed description of the problem or recommendation",
      "risk_level": "low|medium|high|critical",
      "affected_resources": ["resource1"],
      "compliance_frameworks": ["CIS", "SOC2"]
    }}
  ]
}}

Scores: security_score 1.0 = secure, 0.0 = critical; compliance_score 1.0 = compliant.
Answer ONLY with the JSON, no markdown and no explanation."#,
        files_summary.join("\n"),
        findings.len(),
        if findings_summary.is_empty() {
            "No findings detected".to_string()
        } else {
            findings_summary.join("\n")
        },
        request.policy_profile,
    )
}

/// Deep analysis: LLM scores blended 60/40 with the heuristics; the risk
/// level is derived from the blended security score. `None` on any
/// failure, letting the caller keep the pure heuristics.
fn deep_analysis(
    request: &IacGuardrailsRequest,
    findings: &[IacFinding],
    llm_manager: Option<&LlmManager>,
) -> Option<(Vec<LlmSecurityInsight>, f64, f64, Severity)> {
    let manager = llm_manager?;
    let prompt = build_deep_prompt(request, findings);

    let payload: DeepAnalysisPayload = match manager.generate_json(&prompt, None) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "deep analysis failed, keeping heuristic scores");
            return None;
        }
    };

    let (heuristic_security, heuristic_compliance, _) = calculate_security_scores(findings);
    let security = payload
        .security_score
        .clamp(0.0, 1.0)
        .mul_add(0.6, heuristic_security * 0.4);
    let compliance = payload
        .compliance_score
        .clamp(0.0, 1.0)
        .mul_add(0.6, heuristic_compliance * 0.4);

    let risk_level = if security < 0.3 {
        Severity::Critical
    } else if security < 0.5 {
        Severity::High
    } else if security < 0.7 {
        Severity::Medium
    } else {
        Severity::Low
    };

    let insights: Vec<LlmSecurityInsight> = payload.insights.into_iter().take(10).collect();
    tracing::info!(
        insights = insights.len(),
        security,
        "deep analysis complete"
    );
    Some((insights, security, compliance, risk_level))
}

/// For each file with critical/high findings, proposes one refactoring
/// action carrying the file content and the top remediations.
fn generate_remediation_actions(
    findings: &[IacFinding],
    files: &[FileInput],
    security_score: f64,
) -> Vec<RemediationAction> {
    let mut by_file: HashMap<&str, Vec<&IacFinding>> = HashMap::new();
    for finding in findings {
        by_file.entry(finding.path.as_str()).or_default().push(finding);
    }

    let mut paths: Vec<&str> = by_file.keys().copied().collect();
    paths.sort_unstable();

    let mut actions = Vec::new();
    for path in paths {
        let file_issues = &by_file[path];
        let critical_high: Vec<&&IacFinding> = file_issues
            .iter()
            .filter(|f| matches!(f.severity, Severity::Critical | Severity::High))
            .collect();
        if critical_high.is_empty() {
            continue;
        }

        let file_content = files
            .iter()
            .find(|file| file.path == path)
            .map(|file| file.content.as_str())
            .unwrap_or_default();
        let file_type = detect_file_type(path, file_content);

        let instructions: Vec<String> = critical_high
            .iter()
            .take(3)
            .map(|f| format!("{}: {}", f.title, f.remediation))
            .collect();
        let truncated: String = file_content.chars().take(REMEDIATION_CODE_LIMIT).collect();

        let priority = if critical_high
            .iter()
            .any(|f| f.severity == Severity::Critical)
        {
            Severity::Critical
        } else {
            Severity::High
        };

        actions.push(RemediationAction {
            tool_name: "code_refactoring".to_string(),
            action_type: "fix_config".to_string(),
            rationale: format!(
                "{} critical/high issue(s) in {path}",
                critical_high.len()
            ),
            priority,
            params: json!({
                "code": truncated,
                "language": file_type,
                "refactoring_type": "clean",
                "file_path": path,
                "instructions": instructions.join("; "),
            }),
            score: 1.0 - security_score,
        });
    }

    actions.truncate(MAX_REMEDIATIONS);
    actions
}

/// Runs the best-scored remediation through the refactoring tool,
/// in-process via the dispatcher. Returns a compact result, or `None`
/// when nothing could run — the scan result is never failed by this path.
fn execute_auto_remediation(
    findings: &[IacFinding],
    remediations: &[RemediationAction],
    ctx: &ExecutionContext<'_>,
) -> Option<Value> {
    let dispatcher = ctx.dispatcher?;
    let best = remediations
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))?;
    if best.tool_name != "code_refactoring" {
        return None;
    }

    let code = best.params.get("code").and_then(Value::as_str)?;
    if code.is_empty() {
        return None;
    }
    let file_path = best.params.get("file_path").and_then(Value::as_str)?;

    let refactoring_args = json!({
        "code": code,
        "language": best.params.get("language").and_then(Value::as_str).unwrap_or("yaml"),
        "refactoring_type": "clean",
        "file_path": file_path,
        "parameters": {
            "context": "auto-triggered from iac_guardrails_scan",
            "security_fix": true,
            "instructions": best.params.get("instructions").and_then(Value::as_str).unwrap_or(""),
        },
    });

    let result = dispatcher.dispatch("code_refactoring", refactoring_args, None);
    if result.get("error").is_some() {
        tracing::warn!(
            error = %result["error"],
            "auto-remediation refactoring failed"
        );
        return None;
    }

    tracing::info!(file = file_path, "auto-remediation executed");
    let refactored = result
        .get("refactored_code")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let issues_targeted = findings.iter().filter(|f| f.path == file_path).count();

    Some(json!({
        "file_path": file_path,
        "issues_targeted": issues_targeted,
        "original_preview": preview(code),
        "remediated_preview": preview(refactored),
        "changes_count": result.get("changes").and_then(Value::as_array).map_or(0, Vec::len),
        "explanation": result.get("explanation").and_then(Value::as_str).unwrap_or_default(),
    }))
}

fn preview(content: &str) -> String {
    let head: String = content.chars().take(200).collect();
    if content.chars().count() > 200 {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Services;

    const PRIVILEGED_POD: &str = r"
apiVersion: v1
kind: Pod
metadata:
  name: risky
spec:
  containers:
    - name: app
      image: nginx:1.25.3
      securityContext:
        privileged: true
";

    fn pod_request() -> IacGuardrailsRequest {
        IacGuardrailsRequest {
            files: vec![FileInput::new("pod.yaml", PRIVILEGED_POD)],
            policy_profile: "baseline".to_string(),
            platform: None,
            engines: default_engines(),
            custom_policies: None,
            output_format: "json".to_string(),
            analysis_depth: "fast".to_string(),
            auto_chain: false,
            remediation_threshold: 0.5,
        }
    }

    #[test]
    fn test_detect_file_type() {
        assert_eq!(detect_file_type("main.tf", ""), "terraform");
        assert_eq!(detect_file_type("Dockerfile", ""), "dockerfile");
        assert_eq!(
            detect_file_type("deploy.yaml", "apiVersion: v1\nkind: Pod"),
            "kubernetes"
        );
        assert_eq!(detect_file_type("values.yaml", "replicas: 3"), "yaml");
        assert_eq!(
            detect_file_type("infra", "resource \"aws_s3_bucket\" \"b\" {}"),
            "terraform"
        );
        assert_eq!(detect_file_type("build", "FROM alpine:3.19"), "dockerfile");
        assert_eq!(detect_file_type("notes.txt", "hello"), "unknown");
    }

    #[test]
    fn test_privileged_pod_scan() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let response = run(&pod_request(), &ctx).expect("scan");

        let ids: Vec<&str> = response.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&"K8S-001"));
        assert!(ids.contains(&"K8S-007"));
        assert!(!response.passed);
        assert!(matches!(
            response.risk_level,
            Severity::High | Severity::Critical
        ));
        assert!(response.security_score < 0.7);
        assert!((0.0..=1.0).contains(&response.security_score));
    }

    #[test]
    fn test_dedup_between_rules_and_scanner() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let response = run(&pod_request(), &ctx).expect("scan");
        // K8S-001 fires from both engines; (rule, path, line) dedup keeps one.
        let k8s_001 = response
            .findings
            .iter()
            .filter(|f| f.rule_id == "K8S-001")
            .count();
        assert_eq!(k8s_001, 1);
    }

    #[test]
    fn test_strict_profile_adds_rules() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let baseline = run(&pod_request(), &ctx).expect("scan");

        let mut strict_request = pod_request();
        strict_request.policy_profile = "strict".to_string();
        let strict = run(&strict_request, &ctx).expect("scan");

        assert!(strict.rules_evaluated > baseline.rules_evaluated);
        assert!(strict.findings.iter().any(|f| f.rule_id.starts_with("K8S-1")));
    }

    #[test]
    fn test_custom_regex_policy() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let mut request = pod_request();
        request.custom_policies = Some(vec![CustomPolicy {
            id: "CUSTOM-001".to_string(),
            description: Some("nginx images are forbidden here".to_string()),
            content: "image:\\s*nginx".to_string(),
            language: "regex".to_string(),
            severity: Severity::Medium,
        }]);
        let response = run(&request, &ctx).expect("scan");
        assert!(response
            .findings
            .iter()
            .any(|f| f.rule_id == "CUSTOM-001" && f.engine == "custom-policy"));
    }

    #[test]
    fn test_sarif_output() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let mut request = pod_request();
        request.output_format = "sarif".to_string();
        let response = run(&request, &ctx).expect("scan");
        let sarif = response.sarif.expect("sarif document");
        assert_eq!(sarif["version"], json!("2.1.0"));
    }

    #[test]
    fn test_clean_scan_scores() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let request = IacGuardrailsRequest {
            files: vec![FileInput::new("values.yaml", "replicas: 3\n")],
            ..pod_request()
        };
        let response = run(&request, &ctx).expect("scan");
        assert!(response.passed);
        assert!((response.security_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(response.risk_level, Severity::Low);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let mut request = pod_request();
        request.policy_profile = "paranoid".to_string();
        assert!(run(&request, &ctx).is_err());
    }

    #[test]
    fn test_remediation_actions_carry_instructions() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let response = run(&pod_request(), &ctx).expect("scan");
        assert!(!response.suggested_remediations.is_empty());
        let action = &response.suggested_remediations[0];
        assert_eq!(action.tool_name, "code_refactoring");
        assert!(action.params["instructions"].as_str().is_some_and(|i| !i.is_empty()));
        assert!((action.score - (1.0 - response.security_score)).abs() < 1e-9);
    }

    #[test]
    fn test_auto_remediation_without_dispatcher_never_fails_scan() {
        let services = Services::default();
        let ctx = ExecutionContext::new(&services);
        let mut request = pod_request();
        request.auto_chain = true;
        request.remediation_threshold = 1.0;
        let response = run(&request, &ctx).expect("scan");
        assert!(!response.auto_remediation_triggered);
        assert!(response.auto_remediation_result.is_none());
    }
}
