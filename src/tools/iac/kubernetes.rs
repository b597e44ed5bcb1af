//! Semantic Kubernetes scanner.
//!
//! YAML-loads every document in the manifest and checks Pod specs,
//! workload templates, and Services for unsafe settings the regex rules
//! cannot see structurally.

use super::IacFinding;
use crate::models::Severity;
use serde::Deserialize;
use serde_yaml_ng::{Deserializer, Value};

/// Scans a Kubernetes manifest (possibly multi-document).
#[must_use]
pub fn scan(content: &str, filepath: &str) -> Vec<IacFinding> {
    let lines: Vec<&str> = content.lines().collect();
    let mut findings = Vec::new();

    for (doc_idx, document) in Deserializer::from_str(content).enumerate() {
        let Ok(doc) = Value::deserialize(document) else {
            tracing::warn!(path = filepath, "YAML parse error in Kubernetes manifest");
            return findings;
        };
        let Some(kind) = doc.get("kind").and_then(Value::as_str) else {
            continue;
        };

        match kind {
            "Pod" => findings.extend(scan_pod(&doc, filepath, &lines, doc_idx)),
            "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => {
                findings.extend(scan_workload(&doc, filepath, &lines, doc_idx));
            }
            "Service" => findings.extend(scan_service(&doc, filepath, &lines, doc_idx)),
            _ => {}
        }
    }

    findings
}

fn container_name(container: &Value, index: usize) -> String {
    container
        .get("name")
        .and_then(Value::as_str)
        .map_or_else(|| index.to_string(), str::to_string)
}

fn scan_pod(doc: &Value, filepath: &str, lines: &[&str], doc_idx: usize) -> Vec<IacFinding> {
    let mut findings = Vec::new();
    let containers = doc
        .get("spec")
        .and_then(|spec| spec.get("containers"))
        .and_then(Value::as_sequence);

    for (index, container) in containers.into_iter().flatten().enumerate() {
        let privileged = container
            .get("securityContext")
            .and_then(|sc| sc.get("privileged"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if privileged {
            findings.push(IacFinding {
                rule_id: "K8S-001".to_string(),
                severity: Severity::Critical,
                path: filepath.to_string(),
                line: Some(find_line(lines, "privileged:", doc_idx)),
                resource: Some(container_name(container, index)),
                title: "Container running as privileged".to_string(),
                description: format!(
                    "Container '{}' runs in privileged mode",
                    container_name(container, index)
                ),
                remediation: "Set securityContext.privileged: false or remove the field"
                    .to_string(),
                references: vec![
                    "https://kubernetes.io/docs/concepts/security/pod-security-standards/"
                        .to_string(),
                ],
                engine: "k8s-scanner".to_string(),
            });
        }

        let has_limits = container
            .get("resources")
            .and_then(|resources| resources.get("limits"))
            .is_some_and(|limits| !limits.is_null());
        if !has_limits {
            findings.push(IacFinding {
                rule_id: "K8S-007".to_string(),
                severity: Severity::Medium,
                path: filepath.to_string(),
                line: Some(find_line(lines, "containers:", doc_idx)),
                resource: Some(container_name(container, index)),
                title: "Container without resource limits".to_string(),
                description: format!(
                    "Container '{}' has no resource limits",
                    container_name(container, index)
                ),
                remediation: "Define resources.limits.cpu and resources.limits.memory".to_string(),
                references: vec![
                    "https://kubernetes.io/docs/concepts/configuration/manage-resources-containers/"
                        .to_string(),
                ],
                engine: "k8s-scanner".to_string(),
            });
        }
    }
    findings
}

fn scan_workload(doc: &Value, filepath: &str, lines: &[&str], doc_idx: usize) -> Vec<IacFinding> {
    let mut findings = Vec::new();
    let template_spec = doc
        .get("spec")
        .and_then(|spec| spec.get("template"))
        .and_then(|template| template.get("spec"));
    let Some(spec) = template_spec else {
        return findings;
    };

    if spec
        .get("hostNetwork")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        findings.push(IacFinding {
            rule_id: "K8S-002".to_string(),
            severity: Severity::High,
            path: filepath.to_string(),
            line: Some(find_line(lines, "hostNetwork:", doc_idx)),
            resource: None,
            title: "Host network enabled".to_string(),
            description: "Pod uses hostNetwork which exposes it to network attacks".to_string(),
            remediation: "Remove hostNetwork or set it to false".to_string(),
            references: vec![
                "https://kubernetes.io/docs/concepts/security/pod-security-standards/".to_string(),
            ],
            engine: "k8s-scanner".to_string(),
        });
    }

    if spec
        .get("hostPID")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        findings.push(IacFinding {
            rule_id: "K8S-003".to_string(),
            severity: Severity::High,
            path: filepath.to_string(),
            line: Some(find_line(lines, "hostPID:", doc_idx)),
            resource: None,
            title: "Host PID namespace enabled".to_string(),
            description: "Pod shares the host PID namespace, allowing process visibility and killing"
                .to_string(),
            remediation: "Remove hostPID or set it to false".to_string(),
            references: vec![
                "https://kubernetes.io/docs/concepts/security/pod-security-standards/".to_string(),
            ],
            engine: "k8s-scanner".to_string(),
        });
    }

    findings
}

fn scan_service(doc: &Value, filepath: &str, lines: &[&str], doc_idx: usize) -> Vec<IacFinding> {
    let mut findings = Vec::new();
    let Some(spec) = doc.get("spec") else {
        return findings;
    };
    if spec.get("type").and_then(Value::as_str) != Some("NodePort") {
        return findings;
    }

    for port in spec
        .get("ports")
        .and_then(Value::as_sequence)
        .into_iter()
        .flatten()
    {
        let Some(node_port) = port.get("nodePort").and_then(Value::as_i64) else {
            continue;
        };
        if (30000..=32767).contains(&node_port) {
            findings.push(IacFinding {
                rule_id: "K8S-009".to_string(),
                severity: Severity::Medium,
                path: filepath.to_string(),
                line: Some(find_line(lines, &format!("nodePort: {node_port}"), doc_idx)),
                resource: None,
                title: "NodePort exposes service externally".to_string(),
                description: format!("Service exposes NodePort {node_port} to the external network"),
                remediation: "Use ClusterIP or LoadBalancer with proper ingress controls"
                    .to_string(),
                references: vec![
                    "https://kubernetes.io/docs/concepts/services-networking/service/".to_string(),
                ],
                engine: "k8s-scanner".to_string(),
            });
        }
    }
    findings
}

fn find_line(lines: &[&str], needle: &str, doc_idx: usize) -> usize {
    lines
        .iter()
        .position(|line| line.contains(needle))
        .map_or(doc_idx + 1, |pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVILEGED_POD: &str = r"
apiVersion: v1
kind: Pod
metadata:
  name: risky
spec:
  containers:
    - name: app
      image: nginx:1.25
      securityContext:
        privileged: true
";

    #[test]
    fn test_privileged_pod_and_missing_limits() {
        let findings = scan(PRIVILEGED_POD, "pod.yaml");
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&"K8S-001"));
        assert!(ids.contains(&"K8S-007"));

        let privileged = findings.iter().find(|f| f.rule_id == "K8S-001").expect("finding");
        assert_eq!(privileged.severity, Severity::Critical);
        assert_eq!(privileged.resource.as_deref(), Some("app"));
    }

    #[test]
    fn test_pod_with_limits_is_quiet() {
        let manifest = r"
apiVersion: v1
kind: Pod
spec:
  containers:
    - name: app
      image: nginx:1.25.3
      resources:
        limits:
          cpu: 100m
          memory: 128Mi
";
        let findings = scan(manifest, "pod.yaml");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_workload_host_namespaces() {
        let manifest = r"
apiVersion: apps/v1
kind: Deployment
spec:
  template:
    spec:
      hostNetwork: true
      hostPID: true
      containers: []
";
        let findings = scan(manifest, "deploy.yaml");
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&"K8S-002"));
        assert!(ids.contains(&"K8S-003"));
    }

    #[test]
    fn test_nodeport_service() {
        let manifest = r"
apiVersion: v1
kind: Service
spec:
  type: NodePort
  ports:
    - port: 80
      nodePort: 30080
";
        let findings = scan(manifest, "svc.yaml");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "K8S-009");
    }

    #[test]
    fn test_multi_document_manifest() {
        let manifest = format!("{PRIVILEGED_POD}---\napiVersion: v1\nkind: ConfigMap\n");
        let findings = scan(&manifest, "bundle.yaml");
        assert!(findings.iter().any(|f| f.rule_id == "K8S-001"));
    }
}
