//! Tool execution metrics.
//!
//! Emits through the `metrics` facade; whether anything listens is up to
//! the embedding process. Recording against an uninstalled recorder is a
//! no-op.

use std::time::Duration;

/// Records one tool execution: wall time, success flag, payload sizes.
pub fn record_tool_execution(
    tool_name: &str,
    duration: Duration,
    success: bool,
    input_size: usize,
    output_size: usize,
) {
    let outcome = if success { "success" } else { "error" };
    metrics::counter!(
        "collegue_tool_executions_total",
        "tool" => tool_name.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
    metrics::histogram!(
        "collegue_tool_duration_seconds",
        "tool" => tool_name.to_string(),
    )
    .record(duration.as_secs_f64());
    metrics::histogram!(
        "collegue_tool_input_bytes",
        "tool" => tool_name.to_string(),
    )
    .record(input_size as f64);
    metrics::histogram!(
        "collegue_tool_output_bytes",
        "tool" => tool_name.to_string(),
    )
    .record(output_size as f64);
}

/// Records a best-effort persistence failure.
pub fn record_persistence_error(operation: &str) {
    metrics::counter!(
        "collegue_persistence_errors_total",
        "operation" => operation.to_string(),
    )
    .increment(1);
}

/// Records a degraded external-service call (OSV, registry, LLM).
pub fn record_external_service_error(service: &str) {
    metrics::counter!(
        "collegue_external_service_errors_total",
        "service" => service.to_string(),
    )
    .increment(1);
}
