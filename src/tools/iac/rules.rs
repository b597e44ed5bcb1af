//! YAML-declared IaC rule sets.
//!
//! Rule files carry two arrays, `baseline` and `strict`. Rules are
//! compiled (multi-line, case-insensitive) and validated when the set is
//! first loaded; a malformed embedded rule is a build defect, rejected at
//! load time rather than scan time. Sets are memoized for the process
//! lifetime.

use super::IacFinding;
use crate::models::Severity;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::sync::LazyLock;

/// Whether a rule fires on a match or on the lack of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// The pattern matching anywhere is a finding (per match).
    Presence,
    /// The pattern matching nowhere is a finding (once, line 1).
    Absence,
}

/// One compiled rule.
#[derive(Debug)]
pub struct IacRule {
    /// Stable rule identifier (`K8S-001`, `TF-002`, …).
    pub id: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Check kind.
    pub check_type: CheckKind,
    /// Rule severity.
    pub severity: Severity,
    /// Remediation advice.
    pub remediation: String,
    /// Reference links.
    pub references: Vec<String>,
    regex: Regex,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    id: String,
    title: String,
    description: String,
    pattern: String,
    check_type: CheckKind,
    severity: Severity,
    remediation: String,
    #[serde(default)]
    references: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRuleFile {
    #[serde(default)]
    baseline: Vec<RawRule>,
    #[serde(default)]
    strict: Vec<RawRule>,
}

/// A compiled rule set: the `baseline` tier always applies, `strict`
/// adds further rules.
#[derive(Debug)]
pub struct RuleSet {
    /// Rules applied on every scan.
    pub baseline: Vec<IacRule>,
    /// Rules added by the strict profile.
    pub strict: Vec<IacRule>,
}

impl RuleSet {
    /// Rule count for the given profile.
    #[must_use]
    pub fn rule_count(&self, strict: bool) -> usize {
        if strict {
            self.baseline.len() + self.strict.len()
        } else {
            self.baseline.len()
        }
    }

    /// The rules active for the given profile.
    pub fn active_rules(&self, strict: bool) -> impl Iterator<Item = &IacRule> {
        self.baseline
            .iter()
            .chain(self.strict.iter().take(if strict { usize::MAX } else { 0 }))
    }
}

fn compile_rule(raw: RawRule, source: &str) -> IacRule {
    let regex = RegexBuilder::new(&raw.pattern)
        .multi_line(true)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|err| panic!("rule {} in {source} has an invalid pattern: {err}", raw.id));
    IacRule {
        id: raw.id,
        title: raw.title,
        description: raw.description,
        check_type: raw.check_type,
        severity: raw.severity,
        remediation: raw.remediation,
        references: raw.references,
        regex,
    }
}

fn load_rule_set(content: &str, source: &str) -> RuleSet {
    let raw: RawRuleFile = serde_yaml_ng::from_str(content)
        .unwrap_or_else(|err| panic!("rule file {source} is invalid YAML: {err}"));
    RuleSet {
        baseline: raw
            .baseline
            .into_iter()
            .map(|rule| compile_rule(rule, source))
            .collect(),
        strict: raw
            .strict
            .into_iter()
            .map(|rule| compile_rule(rule, source))
            .collect(),
    }
}

static K8S_RULES: LazyLock<RuleSet> =
    LazyLock::new(|| load_rule_set(include_str!("rules/k8s.yaml"), "k8s.yaml"));
static TERRAFORM_RULES: LazyLock<RuleSet> =
    LazyLock::new(|| load_rule_set(include_str!("rules/terraform.yaml"), "terraform.yaml"));
static DOCKERFILE_RULES: LazyLock<RuleSet> =
    LazyLock::new(|| load_rule_set(include_str!("rules/dockerfile.yaml"), "dockerfile.yaml"));

/// The Kubernetes rule set.
#[must_use]
pub fn k8s_rules() -> &'static RuleSet {
    &K8S_RULES
}

/// The Terraform rule set.
#[must_use]
pub fn terraform_rules() -> &'static RuleSet {
    &TERRAFORM_RULES
}

/// The Dockerfile rule set.
#[must_use]
pub fn dockerfile_rules() -> &'static RuleSet {
    &DOCKERFILE_RULES
}

/// Applies one rule to a file's content.
#[must_use]
pub fn apply_rule(rule: &IacRule, content: &str, filepath: &str) -> Vec<IacFinding> {
    let mut findings = Vec::new();
    match rule.check_type {
        CheckKind::Presence => {
            for found in rule.regex.find_iter(content) {
                let line = content[..found.start()].matches('\n').count() + 1;
                findings.push(finding_for(rule, filepath, Some(line)));
            }
        }
        CheckKind::Absence => {
            if !rule.regex.is_match(content) {
                findings.push(finding_for(rule, filepath, Some(1)));
            }
        }
    }
    findings
}

fn finding_for(rule: &IacRule, filepath: &str, line: Option<usize>) -> IacFinding {
    IacFinding {
        rule_id: rule.id.clone(),
        severity: rule.severity,
        path: filepath.to_string(),
        line,
        resource: None,
        title: rule.title.clone(),
        description: rule.description.clone(),
        remediation: rule.remediation.clone(),
        references: rule.references.clone(),
        engine: "embedded-rules".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_rule_sets_compile() {
        assert!(!k8s_rules().baseline.is_empty());
        assert!(!k8s_rules().strict.is_empty());
        assert!(!terraform_rules().baseline.is_empty());
        assert!(!dockerfile_rules().baseline.is_empty());
    }

    #[test]
    fn test_presence_rule_reports_line() {
        let rule = k8s_rules()
            .baseline
            .iter()
            .find(|r| r.id == "K8S-002")
            .expect("K8S-002");
        let content = "apiVersion: v1\nkind: Pod\nspec:\n  hostNetwork: true\n";
        let findings = apply_rule(rule, content, "pod.yaml");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, Some(4));
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_absence_rule() {
        let rule = k8s_rules()
            .baseline
            .iter()
            .find(|r| r.id == "K8S-101")
            .expect("K8S-101");
        let missing = apply_rule(rule, "spec: {}\n", "pod.yaml");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].line, Some(1));

        let present = apply_rule(rule, "securityContext:\n  runAsNonRoot: true\n", "pod.yaml");
        assert!(present.is_empty());
    }

    #[test]
    fn test_profile_rule_counts() {
        let rules = k8s_rules();
        assert!(rules.rule_count(true) > rules.rule_count(false));
        assert_eq!(
            rules.active_rules(false).count(),
            rules.baseline.len()
        );
        assert_eq!(
            rules.active_rules(true).count(),
            rules.baseline.len() + rules.strict.len()
        );
    }
}
