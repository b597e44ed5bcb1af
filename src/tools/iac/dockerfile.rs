//! Semantic Dockerfile scanner.
//!
//! Carries the checks that need whole-file state or logic regex rules
//! cannot express: the effective USER at the end of the build, apt cache
//! cleanup pairing, and ADD-vs-COPY with URL sources exempted.

use super::IacFinding;
use crate::models::Severity;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

static USER_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^USER\s+(\S+)")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});
static FROM_NO_TAG: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^FROM\s+[\w\-./]+\s*$")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});
static APT_INSTALL: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"apt-get\s+install")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});
static APT_CLEANUP: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"rm\s+-rf\s+/var/lib/apt")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});
static ADD_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^ADD\s+(\S+)")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

fn finding(
    rule_id: &str,
    severity: Severity,
    path: &str,
    line: usize,
    title: &str,
    description: &str,
    remediation: &str,
    reference: &str,
) -> IacFinding {
    IacFinding {
        rule_id: rule_id.to_string(),
        severity,
        path: path.to_string(),
        line: Some(line),
        resource: None,
        title: title.to_string(),
        description: description.to_string(),
        remediation: remediation.to_string(),
        references: vec![reference.to_string()],
        engine: "docker-scanner".to_string(),
    }
}

/// Scans a Dockerfile.
#[must_use]
pub fn scan(content: &str, filepath: &str) -> Vec<IacFinding> {
    let mut findings = Vec::new();
    let lines: Vec<&str> = content.lines().collect();

    // The last USER directive decides the runtime user.
    let mut has_user = false;
    let mut last_user_is_root = true;
    for line in &lines {
        if let Some(captures) = USER_DIRECTIVE.captures(line.trim()) {
            has_user = true;
            let user = &captures[1];
            last_user_is_root = user.eq_ignore_ascii_case("root") || user.starts_with('0');
        }
    }
    if !has_user || last_user_is_root {
        findings.push(finding(
            "DOCKER-001",
            Severity::High,
            filepath,
            1,
            "Container runs as root",
            "Container runs as the root user (no non-root USER directive found)",
            "Add 'USER <non-root-user>' after installing dependencies",
            "https://docs.docker.com/develop/develop-images/instructions/#user",
        ));
    }

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        if FROM_NO_TAG.is_match(trimmed) {
            findings.push(finding(
                "DOCKER-003",
                Severity::Medium,
                filepath,
                index + 1,
                "No tag specified for base image",
                "FROM directive has no tag (defaults to latest)",
                "Specify an explicit version tag",
                "https://docs.docker.com/develop/develop-images/instructions/#from",
            ));
        }

        if let Some(captures) = ADD_DIRECTIVE.captures(trimmed) {
            let source = &captures[1];
            if !source.starts_with("http://") && !source.starts_with("https://") {
                findings.push(finding(
                    "DOCKER-004",
                    Severity::Low,
                    filepath,
                    index + 1,
                    "ADD used instead of COPY",
                    "ADD has auto-extract behavior that can be dangerous",
                    "Use COPY for local files instead of ADD",
                    "https://docs.docker.com/develop/develop-images/instructions/#add-or-copy",
                ));
            }
        }
    }

    if APT_INSTALL.is_match(content) && !APT_CLEANUP.is_match(content) {
        findings.push(finding(
            "DOCKER-007",
            Severity::Low,
            filepath,
            1,
            "apt-get without cleanup",
            "apt-get install without cleaning the apt cache bloats the image",
            "Add '&& rm -rf /var/lib/apt/lists/*' after apt-get install",
            "https://docs.docker.com/develop/develop-images/dockerfile_best-practices/",
        ));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_user_flagged() {
        let findings = scan("FROM python:3.11-slim\nCMD [\"app\"]\n", "Dockerfile");
        assert!(findings.iter().any(|f| f.rule_id == "DOCKER-001"));
    }

    #[test]
    fn test_last_user_wins() {
        let early_nonroot = "FROM python:3.11-slim\nUSER app\nUSER root\n";
        assert!(scan(early_nonroot, "Dockerfile")
            .iter()
            .any(|f| f.rule_id == "DOCKER-001"));

        let final_nonroot = "FROM python:3.11-slim\nUSER root\nUSER app\n";
        assert!(!scan(final_nonroot, "Dockerfile")
            .iter()
            .any(|f| f.rule_id == "DOCKER-001"));
    }

    #[test]
    fn test_missing_tag() {
        let findings = scan("FROM ubuntu\nUSER app\n", "Dockerfile");
        assert!(findings.iter().any(|f| f.rule_id == "DOCKER-003"));
    }

    #[test]
    fn test_add_vs_copy_with_url_exempt() {
        let local = scan("FROM a:1\nUSER app\nADD src/ /app\n", "Dockerfile");
        assert!(local.iter().any(|f| f.rule_id == "DOCKER-004"));

        let remote = scan(
            "FROM a:1\nUSER app\nADD https://example.com/pkg.tar.gz /tmp\n",
            "Dockerfile",
        );
        assert!(!remote.iter().any(|f| f.rule_id == "DOCKER-004"));
    }

    #[test]
    fn test_apt_cleanup_pairing() {
        let dirty = "FROM a:1\nUSER app\nRUN apt-get install -y curl\n";
        assert!(scan(dirty, "Dockerfile")
            .iter()
            .any(|f| f.rule_id == "DOCKER-007"));

        let clean =
            "FROM a:1\nUSER app\nRUN apt-get install -y curl && rm -rf /var/lib/apt/lists/*\n";
        assert!(!scan(clean, "Dockerfile")
            .iter()
            .any(|f| f.rule_id == "DOCKER-007"));
    }
}
