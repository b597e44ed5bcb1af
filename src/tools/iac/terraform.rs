//! Semantic Terraform scanner.
//!
//! Regex-driven checks over HCL text for the classic AWS footguns:
//! world-open security groups, public S3 ACLs, public RDS, wildcard IAM,
//! and unencrypted EBS volumes.

use super::IacFinding;
use crate::models::Severity;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

static OPEN_CIDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"cidr_blocks\s*=\s*\[\s*"0\.0\.0\.0/0"\s*\]"#).expect("valid regex")
});
static OPEN_SSH: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r#"(?:from_port|to_port)\s*=\s*22\b.*?cidr_blocks\s*=\s*\[\s*"0\.0\.0\.0/0"\s*\]"#)
        .dot_matches_new_line(true)
        .build()
        .expect("valid regex")
});
static PUBLIC_ACL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"acl\s*=\s*"public-read(?:-write)?""#).expect("valid regex"));
static PUBLIC_RDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"publicly_accessible\s*=\s*true").expect("valid regex"));
static WILDCARD_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""Action"\s*:\s*(?:\[\s*)?"\*""#).expect("valid regex"));
static WILDCARD_RESOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""Resource"\s*:\s*(?:\[\s*)?"\*""#).expect("valid regex"));

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

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
        engine: "tf-scanner".to_string(),
    }
}

/// Scans a Terraform configuration.
#[must_use]
pub fn scan(content: &str, filepath: &str) -> Vec<IacFinding> {
    let mut findings = Vec::new();

    for found in OPEN_CIDR.find_iter(content) {
        findings.push(finding(
            "TF-001",
            Severity::Critical,
            filepath,
            line_of(content, found.start()),
            "Security group allows all inbound traffic",
            "Security group allows traffic from 0.0.0.0/0 (any IP)",
            "Restrict cidr_blocks to specific IPs or ranges",
            "https://registry.terraform.io/providers/hashicorp/aws/latest/docs/resources/security_group",
        ));
    }

    if OPEN_SSH.is_match(content) {
        findings.push(finding(
            "TF-004",
            Severity::Critical,
            filepath,
            1,
            "SSH port open to world",
            "SSH port (22) is open to the entire internet",
            "Restrict SSH access to trusted IPs or use a bastion host",
            "https://docs.aws.amazon.com/AWSEC2/latest/UserGuide/authorizing-access-to-an-instance.html",
        ));
    }

    for found in PUBLIC_ACL.find_iter(content) {
        findings.push(finding(
            "TF-002",
            Severity::Critical,
            filepath,
            line_of(content, found.start()),
            "S3 bucket with public access",
            "S3 bucket is publicly accessible via ACL",
            "Use acl = \"private\" and configure explicit bucket policies",
            "https://docs.aws.amazon.com/AmazonS3/latest/userguide/access-control-block-public-access.html",
        ));
    }

    for found in PUBLIC_RDS.find_iter(content) {
        findings.push(finding(
            "TF-003",
            Severity::Critical,
            filepath,
            line_of(content, found.start()),
            "RDS instance publicly accessible",
            "RDS instance is accessible from the internet",
            "Set publicly_accessible = false",
            "https://docs.aws.amazon.com/AmazonRDS/latest/UserGuide/CHAP_SettingUp.html",
        ));
    }

    for found in WILDCARD_ACTION.find_iter(content) {
        findings.push(finding(
            "TF-006",
            Severity::High,
            filepath,
            line_of(content, found.start()),
            "IAM policy with wildcard actions",
            "IAM policy uses wildcard (*) for actions",
            "Specify exact actions required instead of wildcards",
            "https://docs.aws.amazon.com/IAM/latest/UserGuide/best-practices.html",
        ));
    }

    for found in WILDCARD_RESOURCE.find_iter(content) {
        findings.push(finding(
            "TF-007",
            Severity::High,
            filepath,
            line_of(content, found.start()),
            "IAM policy with wildcard resources",
            "IAM policy applies to all resources (*)",
            "Specify exact resource ARNs",
            "https://docs.aws.amazon.com/IAM/latest/UserGuide/best-practices.html",
        ));
    }

    if content.contains("aws_ebs_volume") && !content.contains("encrypted") {
        findings.push(finding(
            "TF-005",
            Severity::High,
            filepath,
            1,
            "EBS volume without encryption",
            "EBS volume may not be encrypted",
            "Add encrypted = true to the resource",
            "https://docs.aws.amazon.com/AWSEC2/latest/UserGuide/EBSEncryption.html",
        ));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_security_group_with_ssh() {
        let config = r#"
resource "aws_security_group" "ssh" {
  ingress {
    from_port   = 22
    to_port     = 22
    cidr_blocks = ["0.0.0.0/0"]
  }
}
"#;
        let findings = scan(config, "sg.tf");
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&"TF-001"));
        assert!(ids.contains(&"TF-004"));
    }

    #[test]
    fn test_public_s3_and_rds() {
        let config = r#"
resource "aws_s3_bucket" "data" {
  acl = "public-read"
}
resource "aws_db_instance" "db" {
  publicly_accessible = true
}
"#;
        let findings = scan(config, "main.tf");
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&"TF-002"));
        assert!(ids.contains(&"TF-003"));
    }

    #[test]
    fn test_iam_wildcards() {
        let config = r#"
resource "aws_iam_policy" "admin" {
  policy = <<EOF
{"Statement": [{"Action": "*", "Resource": "*"}]}
EOF
}
"#;
        let findings = scan(config, "iam.tf");
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&"TF-006"));
        assert!(ids.contains(&"TF-007"));
    }

    #[test]
    fn test_unencrypted_ebs() {
        let config = "resource \"aws_ebs_volume\" \"v\" {\n  size = 10\n}\n";
        let findings = scan(config, "ebs.tf");
        assert!(findings.iter().any(|f| f.rule_id == "TF-005"));

        let encrypted = "resource \"aws_ebs_volume\" \"v\" {\n  encrypted = true\n}\n";
        assert!(scan(encrypted, "ebs.tf").is_empty());
    }

    #[test]
    fn test_clean_config() {
        let config = r#"
resource "aws_s3_bucket" "private" {
  acl = "private"
}
"#;
        assert!(scan(config, "main.tf").is_empty());
    }
}
