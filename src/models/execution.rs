//! Orchestrator execution records and argument validation reports.

use super::iso_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool execution recorded by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// ISO-8601 timestamp of the execution.
    pub timestamp: String,
    /// Tool name.
    pub tool_name: String,
    /// Snapshot of the arguments the tool ran with.
    pub args: Value,
    /// Result payload.
    pub result: Value,
    /// Derived success flag: a mapping result without an `error` field.
    pub success: bool,
}

impl ExecutionRecord {
    /// Builds a record for the given execution, deriving the success flag.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, args: Value, result: Value) -> Self {
        let success = result
            .as_object()
            .is_none_or(|map| !map.contains_key("error"));
        Self {
            timestamp: iso_timestamp(),
            tool_name: tool_name.into(),
            args,
            result,
            success,
        }
    }
}

/// Outcome of validating arguments against a tool descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArgValidation {
    /// True when all required arguments are present.
    pub valid: bool,
    /// Human-readable error when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Required arguments that were missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_args: Vec<String>,
    /// Warnings for unknown arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ArgValidation {
    /// A successful validation with no warnings.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_derivation() {
        let ok = ExecutionRecord::new("add", json!({"a": 1}), json!({"result": 2}));
        assert!(ok.success);

        let failed = ExecutionRecord::new("add", json!({}), json!({"error": "boom"}));
        assert!(!failed.success);

        // Non-object results count as success.
        let scalar = ExecutionRecord::new("add", json!({}), json!(42));
        assert!(scalar.success);
    }
}
