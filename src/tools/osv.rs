//! OSV vulnerability lookups.
//!
//! One batch `POST /v1/querybatch` asks whether N (package, version)
//! pairs have known vulnerabilities; each returned vulnerability id is
//! then fetched once via `GET /v1/vulns/{id}` for severity, aliases, and
//! fix versions. Ecosystem strings are `PyPI` and `npm`.
//!
//! Failures never propagate to the scan result: a failed batch yields an
//! empty report set with a log entry (external-service policy).

use crate::models::Severity;
use crate::observability::metrics;
use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

/// Default OSV API base.
pub const DEFAULT_BASE_URL: &str = "https://api.osv.dev";

static VERSION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*(?:-[a-zA-Z0-9.]+)?)").expect("valid regex"));

/// One vulnerability affecting one (package, version) pair.
#[derive(Debug, Clone, Serialize)]
pub struct VulnerabilityReport {
    /// Affected package name.
    pub package: String,
    /// Affected version.
    pub version: String,
    /// Display id; a CVE alias is preferred over the OSV id.
    pub vulnerability_id: String,
    /// Extracted severity.
    pub severity: Severity,
    /// Short description (truncated).
    pub description: String,
    /// Versions that fix the vulnerability.
    pub fix_versions: Vec<String>,
}

#[derive(Serialize)]
struct BatchQuery<'a> {
    package: BatchPackage<'a>,
    version: &'a str,
}

#[derive(Serialize)]
struct BatchPackage<'a> {
    name: &'a str,
    ecosystem: &'a str,
}

/// Blocking OSV API client.
pub struct OsvClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl Default for OsvClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OsvClient {
    /// Creates a client against the public OSV endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom base URL (tests, mirrors).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Creates a client honoring the `COLLEGUE_OSV_URL` override.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("COLLEGUE_OSV_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .map_or_else(Self::new, Self::with_base_url)
    }

    /// Posts one batch query. Returns, per input query, the list of
    /// vulnerability ids affecting it.
    ///
    /// # Errors
    ///
    /// Returns an error when the request or response decoding fails.
    pub fn query_batch(&self, queries: &[(String, String)], ecosystem: &str) -> Result<Vec<Vec<String>>> {
        let body: Vec<BatchQuery<'_>> = queries
            .iter()
            .map(|(name, version)| BatchQuery {
                package: BatchPackage { name, ecosystem },
                version,
            })
            .collect();

        let response = self
            .client
            .post(format!("{}/v1/querybatch", self.base_url))
            .json(&serde_json::json!({ "queries": body }))
            .send()
            .map_err(|e| Error::ExternalService {
                service: "osv".to_string(),
                cause: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::ExternalService {
                service: "osv".to_string(),
                cause: format!("batch query returned status {}", response.status()),
            });
        }

        let parsed: Value = response.json().map_err(|e| Error::ExternalService {
            service: "osv".to_string(),
            cause: format!("invalid batch response: {e}"),
        })?;

        let results = parsed
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results
            .iter()
            .map(|result| {
                result
                    .get("vulns")
                    .and_then(Value::as_array)
                    .map(|vulns| {
                        vulns
                            .iter()
                            .filter_map(|v| v.get("id").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Fetches one vulnerability detail record.
    ///
    /// # Errors
    ///
    /// Returns an error when the request or response decoding fails.
    pub fn fetch_vulnerability(&self, id: &str) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}/v1/vulns/{id}", self.base_url))
            .send()
            .map_err(|e| Error::ExternalService {
                service: "osv".to_string(),
                cause: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::ExternalService {
                service: "osv".to_string(),
                cause: format!("vulnerability fetch returned status {}", response.status()),
            });
        }

        response.json().map_err(|e| Error::ExternalService {
            service: "osv".to_string(),
            cause: format!("invalid vulnerability detail: {e}"),
        })
    }

    /// Scans dependencies, returning one report per (package, vuln).
    ///
    /// Dependencies without a pinned/extractable version are skipped.
    /// All upstream failures are downgraded to an empty or partial
    /// result with a log entry.
    #[must_use]
    pub fn check_vulnerabilities(
        &self,
        deps: &[(String, String)],
        ecosystem: &str,
    ) -> Vec<VulnerabilityReport> {
        let queries: Vec<(String, String)> = deps
            .iter()
            .filter_map(|(name, spec)| {
                let version = extract_version(spec);
                if version.is_empty() {
                    None
                } else {
                    Some((name.clone(), version))
                }
            })
            .collect();

        if queries.is_empty() {
            return Vec::new();
        }
        tracing::info!(
            packages = queries.len(),
            ecosystem,
            "querying OSV batch API"
        );

        let batch = match self.query_batch(&queries, ecosystem) {
            Ok(batch) => batch,
            Err(err) => {
                tracing::warn!(error = %err, "OSV batch query failed");
                metrics::record_external_service_error("osv");
                return Vec::new();
            }
        };

        // vuln id -> affected (package, version) pairs, detail fetched once.
        let mut vuln_to_packages: HashMap<String, Vec<(String, String)>> = HashMap::new();
        let mut vuln_order: Vec<String> = Vec::new();
        for (index, vuln_ids) in batch.iter().enumerate() {
            let Some((name, version)) = queries.get(index) else {
                continue;
            };
            for vuln_id in vuln_ids {
                let entry = vuln_to_packages.entry(vuln_id.clone()).or_default();
                if entry.is_empty() {
                    vuln_order.push(vuln_id.clone());
                }
                entry.push((name.clone(), version.clone()));
            }
        }

        tracing::info!(
            vulnerabilities = vuln_order.len(),
            "fetching OSV vulnerability details"
        );

        let mut reports = Vec::new();
        for vuln_id in vuln_order {
            let packages = vuln_to_packages.remove(&vuln_id).unwrap_or_default();
            match self.fetch_vulnerability(&vuln_id) {
                Ok(details) => {
                    let severity = extract_severity(&details);
                    let description = extract_description(&details, &vuln_id);
                    let display_id = preferred_alias(&details, &vuln_id);
                    let fix_versions = extract_fix_versions(&details);
                    for (package, version) in packages {
                        reports.push(VulnerabilityReport {
                            package,
                            version,
                            vulnerability_id: display_id.clone(),
                            severity,
                            description: description.clone(),
                            fix_versions: if fix_versions.is_empty() {
                                vec!["latest stable version".to_string()]
                            } else {
                                fix_versions.clone()
                            },
                        });
                    }
                }
                Err(err) => {
                    tracing::debug!(vuln_id, error = %err, "vulnerability detail fetch failed");
                    for (package, version) in packages {
                        reports.push(VulnerabilityReport {
                            package,
                            version,
                            vulnerability_id: vuln_id.clone(),
                            severity: Severity::Medium,
                            description: format!("Vulnerability {vuln_id}"),
                            fix_versions: vec!["latest stable version".to_string()],
                        });
                    }
                }
            }
        }
        reports
    }
}

/// Extracts the severity of an OSV vulnerability record.
///
/// Priority: `database_specific.severity`, then
/// `affected[*].ecosystem_specific.severity`, then a CVSS numeric score
/// bucketed ≥9 critical / ≥7 high / ≥4 medium / <4 low. Defaults to
/// medium.
#[must_use]
pub fn extract_severity(details: &Value) -> Severity {
    if let Some(label) = details
        .get("database_specific")
        .and_then(|db| db.get("severity"))
        .and_then(Value::as_str)
    {
        if let Some(severity) = Severity::parse(label) {
            return severity;
        }
    }

    if let Some(affected) = details.get("affected").and_then(Value::as_array) {
        for entry in affected {
            if let Some(label) = entry
                .get("ecosystem_specific")
                .and_then(|eco| eco.get("severity"))
                .and_then(Value::as_str)
            {
                if let Some(severity) = Severity::parse(label) {
                    return severity;
                }
            }
        }
    }

    if let Some(scores) = details.get("severity").and_then(Value::as_array) {
        for entry in scores {
            let Some(score_str) = entry.get("score").and_then(Value::as_str) else {
                continue;
            };
            if let Ok(score) = score_str.parse::<f64>() {
                return Severity::from_cvss_score(score);
            }
        }
    }

    Severity::Medium
}

fn extract_description(details: &Value, vuln_id: &str) -> String {
    let raw = details
        .get("summary")
        .and_then(Value::as_str)
        .or_else(|| details.get("details").and_then(Value::as_str))
        .unwrap_or_default();
    if raw.is_empty() {
        format!("Vulnerability {vuln_id}")
    } else {
        raw.chars().take(200).collect()
    }
}

/// Prefers a CVE alias as the display id.
fn preferred_alias(details: &Value, vuln_id: &str) -> String {
    details
        .get("aliases")
        .and_then(Value::as_array)
        .and_then(|aliases| {
            aliases
                .iter()
                .filter_map(Value::as_str)
                .find(|alias| alias.starts_with("CVE-"))
        })
        .unwrap_or(vuln_id)
        .to_string()
}

/// Collects `affected[*].ranges[*].events[*].fixed` versions.
fn extract_fix_versions(details: &Value) -> Vec<String> {
    let mut versions = Vec::new();
    let Some(affected) = details.get("affected").and_then(Value::as_array) else {
        return versions;
    };
    for entry in affected {
        let Some(ranges) = entry.get("ranges").and_then(Value::as_array) else {
            continue;
        };
        for range in ranges {
            let Some(events) = range.get("events").and_then(Value::as_array) else {
                continue;
            };
            for event in events {
                if let Some(fixed) = event.get("fixed").and_then(Value::as_str) {
                    versions.push(fixed.to_string());
                }
            }
        }
    }
    versions
}

/// Extracts an exact version from a version specifier
/// (`==1.0.0`, `^1.0.0`, `>=1.0.0`, `1.0.0`). Empty for `*` or ranges
/// without a concrete version.
#[must_use]
pub fn extract_version(version_spec: &str) -> String {
    let spec = version_spec.trim();
    if spec.is_empty() || spec == "*" {
        return String::new();
    }

    let mut version = spec;
    for prefix in ["==", ">=", "<=", ">", "<", "~=", "!=", "^", "~"] {
        if let Some(stripped) = version.strip_prefix(prefix) {
            version = stripped;
            break;
        }
    }

    VERSION_PREFIX
        .captures(version)
        .map_or_else(|| version.trim().to_string(), |c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("==1.2.3"), "1.2.3");
        assert_eq!(extract_version("^4.17.0"), "4.17.0");
        assert_eq!(extract_version(">=2.28"), "2.28");
        assert_eq!(extract_version("1.0.0-beta.1"), "1.0.0-beta.1");
        assert_eq!(extract_version("*"), "");
        assert_eq!(extract_version(""), "");
    }

    #[test]
    fn test_severity_database_specific() {
        let details = json!({"database_specific": {"severity": "CRITICAL"}});
        assert_eq!(extract_severity(&details), Severity::Critical);

        let moderate = json!({"database_specific": {"severity": "MODERATE"}});
        assert_eq!(extract_severity(&moderate), Severity::Medium);
    }

    #[test]
    fn test_severity_ecosystem_specific() {
        let details = json!({
            "affected": [{"ecosystem_specific": {"severity": "HIGH"}}]
        });
        assert_eq!(extract_severity(&details), Severity::High);
    }

    #[test]
    fn test_severity_cvss_score() {
        let details = json!({"severity": [{"type": "CVSS_V3", "score": "9.8"}]});
        assert_eq!(extract_severity(&details), Severity::Critical);

        let low = json!({"severity": [{"score": "2.0"}]});
        assert_eq!(extract_severity(&low), Severity::Low);
    }

    #[test]
    fn test_severity_default() {
        assert_eq!(extract_severity(&json!({})), Severity::Medium);
    }

    #[test]
    fn test_preferred_alias_and_fix_versions() {
        let details = json!({
            "id": "GHSA-xxxx",
            "aliases": ["OSV-1", "CVE-2023-1234"],
            "affected": [{
                "ranges": [{"events": [{"introduced": "0"}, {"fixed": "2.0.1"}]}]
            }]
        });
        assert_eq!(preferred_alias(&details, "GHSA-xxxx"), "CVE-2023-1234");
        assert_eq!(extract_fix_versions(&details), vec!["2.0.1"]);
    }
}
