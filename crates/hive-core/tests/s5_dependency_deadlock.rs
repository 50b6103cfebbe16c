//! S5 — unresolvable dependency deadlock (spec.md §8).

mod support;

use std::sync::Arc;

use hive_core::memory::NoopMemorySink;
use hive_core::provider::{Provider, ProviderRegistry};
use hive_core::worker::tool::ToolRegistry;
use hive_core::{ApiPool, Endpoint, Orchestrator, OrchestratorConfig, SubtaskStatus};

use support::ScriptedProvider;

#[tokio::test]
async fn mutually_dependent_subtasks_fail_with_deadlock_and_fall_back_to_mechanical_compilation() {
    // A depends on B and B depends on A: neither is ever ready.
    let decompose = r#"{
        "subtasks": [
            {"description": "step-a", "role": "general", "dependencies": [1], "max_iterations": 1},
            {"description": "step-b", "role": "general", "dependencies": [0], "max_iterations": 1}
        ],
        "reasoning": "a cycle"
    }"#;

    // No compile rule is registered, so the compile call gets back the
    // unmatched default, which is not valid JSON -- `parse_compilation`
    // fails and `compile_results` falls back to `mechanical_compilation`.
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(
        ScriptedProvider::new("not json").decompose(decompose),
    ));

    let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(registry)));
    pool.add_endpoint(Endpoint::new(Provider::OpenAi, "ep-1", 10)).await;
    pool.add_endpoint(Endpoint::new(Provider::OpenAi, "ep-2", 5)).await;

    let orchestrator = Orchestrator::new(
        OrchestratorConfig::default(),
        Arc::clone(&pool),
        Arc::new(NoopMemorySink),
        Arc::new(ToolRegistry::new()),
    )
    .await;

    let task = orchestrator.execute_goal("resolve the cycle", None).await;

    assert_eq!(task.subtasks.len(), 2);
    for subtask in &task.subtasks {
        assert_eq!(subtask.status, SubtaskStatus::Failed, "{}", subtask.id);
        assert_eq!(subtask.error.as_deref(), Some("dependency deadlock"));
        assert!(subtask.completed_at.is_some());
        assert!(subtask.result.is_none());
    }

    let final_result = task.final_result.expect("compile_results always runs");
    assert_eq!(final_result.summary, "Results aggregated without synthesis");
    assert_eq!(final_result.confidence_score, 0.0);
    assert!(task.completed_at.is_some());
}
