//! SARIF 2.1.0 export.

use super::IacFinding;
use crate::models::Severity;
use serde_json::{json, Map, Value};

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

fn sarif_level(severity: Severity) -> &'static str {
    if matches!(severity, Severity::Critical | Severity::High) {
        "error"
    } else {
        "warning"
    }
}

/// Maps findings to a single-run SARIF document with rules derived from
/// the findings themselves.
#[must_use]
pub fn generate(findings: &[IacFinding]) -> Value {
    let mut rules: Map<String, Value> = Map::new();
    let mut results: Vec<Value> = Vec::new();

    for finding in findings {
        rules.entry(finding.rule_id.clone()).or_insert_with(|| {
            json!({
                "id": finding.rule_id,
                "shortDescription": {"text": finding.title},
                "fullDescription": {"text": finding.description},
                "help": {"text": finding.remediation},
                "defaultConfiguration": {"level": sarif_level(finding.severity)},
            })
        });

        results.push(json!({
            "ruleId": finding.rule_id,
            "level": sarif_level(finding.severity),
            "message": {"text": finding.description},
            "locations": [{
                "physicalLocation": {
                    "artifactLocation": {"uri": finding.path},
                    "region": {"startLine": finding.line.unwrap_or(1)},
                }
            }],
        }));
    }

    json!({
        "$schema": SARIF_SCHEMA,
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "iac_guardrails_scan",
                    "version": env!("CARGO_PKG_VERSION"),
                    "informationUri": "https://github.com/collegue/collegue",
                    "rules": rules.values().cloned().collect::<Vec<Value>>(),
                }
            },
            "results": results,
        }],
    })
}
