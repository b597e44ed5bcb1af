//! Orchestrator integration tests: registry behavior, validation
//! invariants, execution history bounds, chains, and suggestions.

use collegue::orchestrator::{ChainStep, Orchestrator, MAX_EXECUTION_HISTORY};
use collegue::tools::{FunctionTool, Services, ToolDescriptor};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn orchestrator_with_math() -> Orchestrator {
    let orchestrator = Orchestrator::with_builtin_tools(Services::default());
    orchestrator.register_tool(Arc::new(FunctionTool::new(
        ToolDescriptor::new("add", "adds two numbers")
            .category("math")
            .required(&["a", "b"]),
        |args, _ctx| {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a + b}))
        },
    )));
    orchestrator.register_tool(Arc::new(FunctionTool::new(
        ToolDescriptor::new("multiply", "multiplies two numbers")
            .category("math")
            .required(&["a", "b"]),
        |args, _ctx| {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a * b}))
        },
    )));
    orchestrator
}

#[test]
fn builtin_catalog_is_complete() {
    let orchestrator = Orchestrator::with_builtin_tools(Services::default());
    for name in [
        "code_generation",
        "code_explanation",
        "code_refactoring",
        "code_documentation",
        "test_generation",
        "dependency_guard",
        "secret_scan",
        "repo_consistency_check",
        "iac_guardrails_scan",
        "impact_analysis",
        "run_tests",
    ] {
        assert!(
            orchestrator.get_tool(name).is_some(),
            "tool {name} must be registered"
        );
    }
    assert_eq!(orchestrator.list_tools(None).len(), 11);
    assert!(orchestrator
        .list_tools(Some("security"))
        .iter()
        .all(|descriptor| descriptor.category == "security"));
}

#[test]
fn validate_args_accepts_any_map_with_required_args() {
    // Spec invariant: any argument map containing every required arg
    // validates, for every registered tool.
    let orchestrator = orchestrator_with_math();
    for descriptor in orchestrator.list_tools(None) {
        let mut args = Map::new();
        for required in &descriptor.required_args {
            args.insert(required.clone(), json!("placeholder"));
        }
        let validation = orchestrator.validate_args(&descriptor.name, &Value::Object(args));
        assert!(
            validation.valid,
            "tool {} rejected a complete argument map: {:?}",
            descriptor.name, validation.error
        );
    }
}

#[test]
fn duplicate_registration_returns_negative_ack() {
    let orchestrator = orchestrator_with_math();
    let duplicate = Arc::new(FunctionTool::new(
        ToolDescriptor::new("add", "impostor"),
        |_args, _ctx| Ok(json!({})),
    ));
    assert!(!orchestrator.register_tool(duplicate));
    assert_eq!(
        orchestrator.get_tool("add").map(|d| d.description),
        Some("adds two numbers".to_string())
    );
}

#[test]
fn execution_history_is_bounded_and_records_every_call() {
    let orchestrator = orchestrator_with_math();
    orchestrator.clear_execution_history();

    for i in 0..(MAX_EXECUTION_HISTORY + 25) {
        let _ = orchestrator.execute_tool("add", json!({"a": i, "b": 1}), None);
    }
    let history = orchestrator.get_execution_history(None, None, false);
    assert_eq!(history.len(), MAX_EXECUTION_HISTORY);
    assert!(history.iter().all(|record| record.tool_name == "add"));

    // Failed executions are recorded too, with success = false.
    let _ = orchestrator.execute_tool("add", json!({"a": 1}), None);
    let failures: Vec<_> = orchestrator
        .get_execution_history(None, None, false)
        .into_iter()
        .filter(|record| !record.success)
        .collect();
    assert_eq!(failures.len(), 1);
}

#[test]
fn unknown_tool_and_bad_args_are_returned_not_raised() {
    let orchestrator = orchestrator_with_math();

    let unknown = orchestrator.execute_tool("no_such_tool", json!({}), None);
    assert!(unknown["error"]
        .as_str()
        .is_some_and(|message| message.contains("no_such_tool")));

    let missing = orchestrator.execute_tool("add", json!({"a": 1}), None);
    assert!(missing["error"]
        .as_str()
        .is_some_and(|message| message.contains("b")));
}

#[test]
fn chain_maps_results_between_steps() {
    // Spec scenario: add(5, 3) -> b, then multiply(2, b) == 16.
    let orchestrator = orchestrator_with_math();
    let steps = vec![
        ChainStep {
            name: "add".to_string(),
            args: json!({"a": 5, "b": 3}).as_object().expect("object").clone(),
            result_mapping: HashMap::from([("b".to_string(), "result".to_string())]),
        },
        ChainStep {
            name: "multiply".to_string(),
            args: json!({"a": 2}).as_object().expect("object").clone(),
            result_mapping: HashMap::new(),
        },
    ];
    assert!(orchestrator.create_tool_chain("add_then_multiply", steps));

    let result = orchestrator.execute_tool("add_then_multiply", json!({}), None);
    assert_eq!(result["completed_steps"], json!(2));
    assert_eq!(result["total_steps"], json!(2));
    assert_eq!(result["results"][0]["result"], json!(8.0));
    assert_eq!(result["results"][1]["result"], json!(16.0));
    assert!(result.get("error").is_none());
}

#[test]
fn chain_creation_validates_referenced_tools() {
    let orchestrator = orchestrator_with_math();
    let steps = vec![ChainStep {
        name: "phantom".to_string(),
        args: Map::new(),
        result_mapping: HashMap::new(),
    }];
    assert!(!orchestrator.create_tool_chain("phantom_chain", steps));
    assert!(orchestrator.get_tool("phantom_chain").is_none());
}

#[test]
fn suggestions_rank_by_relevance_and_exclude_zero_scores() {
    let orchestrator = orchestrator_with_math();

    let suggestions = orchestrator.suggest_tools("scan my code for exposed secrets", None);
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "secret_scan");
    assert!(suggestions
        .windows(2)
        .all(|pair| pair[0].relevance >= pair[1].relevance));

    let none = orchestrator.suggest_tools("qwertyuiop zxcvbnm", None);
    assert!(none.is_empty());
}

#[test]
fn suggestions_use_session_context() {
    let orchestrator = orchestrator_with_math();
    let context = json!({
        "language_context": {"language": "test"},
        "current_file": "src/app.py",
    });
    // "testing" category tools get the language boost for "test".
    let with_context = orchestrator.suggest_tools("generate tests", Some(&context));
    let without_context = orchestrator.suggest_tools("generate tests", None);

    let score_of = |suggestions: &[collegue::orchestrator::ToolSuggestion], name: &str| {
        suggestions
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.relevance)
    };
    let boosted = score_of(&with_context, "test_generation");
    let base = score_of(&without_context, "test_generation");
    assert!(boosted >= base);
}

#[tokio::test]
async fn async_execution_matches_blocking_results() {
    let orchestrator = orchestrator_with_math();
    let blocking = orchestrator.execute_tool("add", json!({"a": 4, "b": 6}), None);
    let cooperative = orchestrator
        .execute_tool_async("add", json!({"a": 4, "b": 6}), None, None)
        .await;
    assert_eq!(blocking, cooperative);
}
