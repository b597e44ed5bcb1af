//! Severity levels shared by every scanner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a finding.
///
/// Ordering is total (`Info < Low < Medium < High < Critical`) and is used
/// for threshold filtering and summary gating.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Low severity.
    Low,
    /// Medium severity.
    #[default]
    Medium,
    /// High severity.
    High,
    /// Critical severity.
    Critical,
}

impl Severity {
    /// Returns the lowercase string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses a severity string, case-insensitively.
    ///
    /// OSV-style labels (`MODERATE`) are accepted.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Buckets a CVSS numeric score.
    #[must_use]
    pub fn from_cvss_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-severity finding counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityCounts {
    /// Critical findings.
    pub critical: usize,
    /// High findings.
    pub high: usize,
    /// Medium findings.
    pub medium: usize,
    /// Low findings.
    pub low: usize,
    /// Informational findings.
    pub info: usize,
}

impl SeverityCounts {
    /// Records one finding at the given severity.
    pub const fn observe(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    /// Total number of findings recorded.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }

    /// True when no critical and no high findings were recorded.
    #[must_use]
    pub const fn passes(&self) -> bool {
        self.critical == 0 && self.high == 0
    }

    /// Tallies severities from an iterator.
    pub fn from_severities(severities: impl IntoIterator<Item = Severity>) -> Self {
        let mut counts = Self::default();
        for severity in severities {
            counts.observe(severity);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse("Moderate"), Some(Severity::Medium));
        assert_eq!(Severity::parse("bogus"), None);
    }

    #[test]
    fn test_cvss_buckets() {
        assert_eq!(Severity::from_cvss_score(9.8), Severity::Critical);
        assert_eq!(Severity::from_cvss_score(7.0), Severity::High);
        assert_eq!(Severity::from_cvss_score(5.5), Severity::Medium);
        assert_eq!(Severity::from_cvss_score(2.1), Severity::Low);
    }

    #[test]
    fn test_counts_passes() {
        let mut counts = SeverityCounts::default();
        counts.observe(Severity::Low);
        counts.observe(Severity::Medium);
        assert!(counts.passes());
        counts.observe(Severity::High);
        assert!(!counts.passes());
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Severity::High).expect("serialize");
        assert_eq!(json, "\"high\"");
        let parsed: Severity = serde_json::from_str("\"critical\"").expect("deserialize");
        assert_eq!(parsed, Severity::Critical);
    }
}
