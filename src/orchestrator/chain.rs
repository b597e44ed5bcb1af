//! Sequential tool chains.
//!
//! A chain is a synthetic tool: an ordered list of steps, each naming a
//! registered tool, fixed arguments, and a result-to-next-args mapping.
//! Execution is sequential by construction and short-circuits on the
//! first failing step.

use crate::tools::{ExecutionContext, Tool, ToolDescriptor};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// One step of a tool chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStep {
    /// Name of the tool to execute.
    pub name: String,
    /// Fixed arguments for this step. Accumulated mapped arguments
    /// override these on collision.
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Mapping from destination argument name to a dotted path into this
    /// step's result (e.g. `data.items[0]` or `data.items.0.value`).
    #[serde(default)]
    pub result_mapping: HashMap<String, String>,
}

/// A registered chain, executable like any other tool.
pub(super) struct ChainTool {
    chain_name: String,
    steps: Vec<ChainStep>,
}

impl ChainTool {
    pub(super) fn new(chain_name: impl Into<String>, steps: Vec<ChainStep>) -> Self {
        Self {
            chain_name: chain_name.into(),
            steps,
        }
    }
}

impl Tool for ChainTool {
    fn descriptor(&self) -> ToolDescriptor {
        let step_names: Vec<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
        ToolDescriptor::new(
            self.chain_name.clone(),
            format!(
                "Tool chain executing sequentially: {}",
                step_names.join(", ")
            ),
        )
        .category("tool_chain")
        .dependencies(&step_names)
    }

    fn execute(&self, _args: &Value, ctx: &ExecutionContext<'_>) -> Result<Value> {
        let dispatcher = ctx.dispatcher.ok_or_else(|| {
            Error::Configuration("tool chains require a dispatcher".to_string())
        })?;

        let total_steps = self.steps.len();
        let mut results: Vec<Value> = Vec::with_capacity(total_steps);
        let mut current_args: Map<String, Value> = Map::new();

        for (index, step) in self.steps.iter().enumerate() {
            let mut tool_args = step.args.clone();
            for (key, value) in &current_args {
                tool_args.insert(key.clone(), value.clone());
            }

            let result = dispatcher.dispatch(
                &step.name,
                Value::Object(tool_args),
                ctx.caller_context.cloned(),
            );
            results.push(result.clone());

            if let Some(error) = result.get("error").and_then(Value::as_str) {
                return Ok(json!({
                    "chain_name": self.chain_name,
                    "completed_steps": index + 1,
                    "total_steps": total_steps,
                    "results": results,
                    "error": format!("step {} failed: {error}", index + 1),
                }));
            }

            if index < total_steps - 1 {
                for (dest_arg, source_path) in &step.result_mapping {
                    if let Some(value) = extract_result_value(&result, source_path) {
                        current_args.insert(dest_arg.clone(), value);
                    }
                }
            }
        }

        Ok(json!({
            "chain_name": self.chain_name,
            "completed_steps": total_steps,
            "total_steps": total_steps,
            "results": results,
        }))
    }
}

/// Extracts a value from a result following a dotted path.
///
/// Supports `name[index]` and bare-numeric `.index` segments for array
/// access. Returns `None` when the path does not resolve.
#[must_use]
pub fn extract_result_value(result: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return None;
    }

    let mut current = result;
    for segment in path.split('.') {
        if let Some((name, index_str)) = segment
            .strip_suffix(']')
            .and_then(|rest| rest.split_once('['))
        {
            let index: usize = index_str.parse().ok()?;
            current = current.get(name)?.get(index)?;
        } else if let Ok(index) = segment.parse::<usize>() {
            current = current.get(index)?;
        } else {
            current = current.get(segment)?;
        }
    }
    Some(current.clone())
}
