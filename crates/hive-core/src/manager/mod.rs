//! [`Manager`]: decomposes goals into subtasks and compiles/validates
//! final results, grounded in `manager.py::ManagerAgent`.
//!
//! Prompt construction is split into pure functions the way `gator-core`'s
//! `plan::generate` separates prompt-building from I/O, which
//! also makes the prompts independently testable without a live LLM call.

pub mod schema;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;

use crate::memory::MemorySink;
use crate::pool::{ApiPool, EndpointRequest};
use crate::provider::GenerateParams;
use crate::task::{Subtask, Task, WorkerRole};

use schema::{parse_compilation, parse_decomposition, CompilationResponse};

/// Outcome of [`Manager::validate_execution`]. spec §6 leaves the
/// validation response schema open beyond "JSON format with validation
/// results"; this is the minimal shape `Manager` itself needs to decide
/// anything, with the rest of the LLM's response carried in `details`.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    pub details: Value,
}

/// Decomposes goals, compiles subtask results, and validates a task's
/// overall execution.
pub struct Manager {
    pool: Arc<ApiPool>,
    memory: Arc<dyn MemorySink>,
}

impl Manager {
    pub fn new(pool: Arc<ApiPool>, memory: Arc<dyn MemorySink>) -> Self {
        Self { pool, memory }
    }

    /// Decompose `goal` into an ordered list of subtasks.
    ///
    /// Checks the memory sink for a similar prior decomposition first;
    /// on a miss, calls the LLM and parses its response, falling back to
    /// a single general subtask covering the whole goal if decomposition
    /// fails for any reason, per `manager.py::decompose_goal`.
    pub async fn decompose_goal(&self, goal: &str, context: Option<&Value>) -> Vec<Subtask> {
        match self.memory.find_similar_decomposition(goal).await {
            Ok(Some(subtasks)) if !subtasks.is_empty() => {
                tracing::info!(goal, "found similar decomposition in memory");
                return subtasks.into_iter().map(reset_for_reuse).collect();
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "memory lookup failed, continuing without it");
            }
        }

        let prompt = build_decomposition_prompt(goal, context);
        let request = EndpointRequest::default();

        let response = self
            .pool
            .execute_with_failover(&request, &prompt, &GenerateParams::default())
            .await;

        let Ok(response) = response else {
            tracing::error!(goal, "decomposition call failed, falling back to single subtask");
            return vec![fallback_subtask(goal)];
        };

        match parse_decomposition(&response.text) {
            Some(decomposition) if !decomposition.subtasks.is_empty() => {
                subtasks_from_decomposition(goal, decomposition)
            }
            _ => {
                tracing::error!(goal, "decomposition response unparseable, falling back to single subtask");
                vec![fallback_subtask(goal)]
            }
        }
    }

    /// Synthesize a [`CompilationResponse`] from a completed task's
    /// subtask results, falling back to mechanical aggregation if the
    /// LLM call or its JSON response fails, per
    /// `manager.py::compile_results`.
    pub async fn compile_results(&self, task: &Task) -> CompilationResponse {
        let prompt = build_compilation_prompt(task);
        let request = EndpointRequest::default();

        let response = self
            .pool
            .execute_with_failover(&request, &prompt, &GenerateParams::default())
            .await;

        let Ok(response) = response else {
            return mechanical_compilation(task);
        };

        parse_compilation(&response.text).unwrap_or_else(|| mechanical_compilation(task))
    }

    /// Validate a completed task's execution via an LLM call, falling
    /// back to `{valid: false, error}` on failure, per
    /// `manager.py::validate_execution`.
    pub async fn validate_execution(&self, task: &Task) -> ValidationResult {
        let prompt = build_validation_prompt(task);
        let request = EndpointRequest::default();

        let response = self
            .pool
            .execute_with_failover(&request, &prompt, &GenerateParams::default())
            .await;

        let response = match response {
            Ok(r) => r,
            Err(err) => {
                return ValidationResult {
                    valid: false,
                    error: Some(err.to_string()),
                    details: Value::Null,
                };
            }
        };

        match serde_json::from_str::<Value>(response.text.trim()) {
            Ok(details) => {
                let valid = details.get("valid").and_then(Value::as_bool).unwrap_or(false);
                ValidationResult {
                    valid,
                    error: None,
                    details,
                }
            }
            Err(err) => ValidationResult {
                valid: false,
                error: Some(err.to_string()),
                details: Value::Null,
            },
        }
    }
}

/// Deterministic short id prefix derived from `goal`, standing in for
/// `manager.py`'s `hashlib.md5(goal).hexdigest()[:12]`.
fn goal_prefix(goal: &str) -> String {
    let mut hasher = DefaultHasher::new();
    goal.hash(&mut hasher);
    format!("{:012x}", hasher.finish())
}

fn fallback_subtask(goal: &str) -> Subtask {
    Subtask::new(format!("{}_sub_000", goal_prefix(goal)), goal, WorkerRole::General)
}

/// Strip the run-specific state off a subtask recalled from memory so a
/// decomposition reused from a past, possibly-completed task starts this
/// run at `Pending` rather than replaying stale status/results straight
/// into the new task's state machine.
fn reset_for_reuse(mut subtask: Subtask) -> Subtask {
    subtask.status = crate::task::SubtaskStatus::Pending;
    subtask.assigned_worker = None;
    subtask.result = None;
    subtask.error = None;
    subtask.peer_reviews = Vec::new();
    subtask.completed_at = None;
    subtask.iteration_count = 0;
    subtask
}

fn subtasks_from_decomposition(
    goal: &str,
    decomposition: schema::DecompositionResponse,
) -> Vec<Subtask> {
    let prefix = goal_prefix(goal);
    decomposition
        .subtasks
        .into_iter()
        .enumerate()
        .map(|(i, spec)| {
            let id = format!("{prefix}_sub_{i:03}");
            let role = spec.role.parse().unwrap_or(WorkerRole::General);
            let dependencies = spec
                .dependencies
                .iter()
                .map(|dep_index| format!("{prefix}_sub_{dep_index:03}"))
                .collect();
            let mut subtask = Subtask::new(id, spec.description, role).with_dependencies(dependencies);
            subtask.max_iterations = spec.max_iterations.clamp(1, 5);
            subtask
        })
        .collect()
}

fn mechanical_compilation(task: &Task) -> CompilationResponse {
    let detailed: Vec<String> = task
        .subtasks
        .iter()
        .map(|s| format!("{}: {}", s.description, s.result.as_deref().unwrap_or("(no result)")))
        .collect();
    CompilationResponse {
        summary: "Results aggregated without synthesis".to_string(),
        detailed_results: detailed.join("\n"),
        key_findings: Vec::new(),
        recommendations: Vec::new(),
        confidence_score: 0.0,
    }
}

/// Build the goal-decomposition prompt, listing available roles and the
/// required JSON response shape, per
/// `manager.py::_build_decomposition_prompt`.
pub fn build_decomposition_prompt(goal: &str, context: Option<&Value>) -> String {
    let context_str = context
        .map(|c| serde_json::to_string_pretty(c).unwrap_or_default())
        .unwrap_or_else(|| "No additional context".to_string());

    format!(
        "You are the Manager of a multi-agent orchestration system.\n\
Your task is to decompose a complex goal into smaller, actionable sub-tasks.\n\n\
Goal: {goal}\n\n\
Context: {context_str}\n\n\
Available Worker Roles:\n\
- researcher: Gathers information, searches, analyzes data\n\
- executor: Performs actions, executes code, makes changes\n\
- auditor: Reviews, validates, checks for errors and risks\n\
- creative: Generates content, designs, creative solutions\n\
- analyst: Analyzes data, creates reports, finds patterns\n\
- coder: Writes, reviews, and debugs code\n\
- general: Handles general tasks\n\n\
Decompose the goal into sub-tasks. For each sub-task, specify:\n\
1. description: Clear, actionable description\n\
2. role: The most appropriate worker role\n\
3. dependencies: indices of sub-tasks that must complete first (0, 1, 2, ...)\n\
4. max_iterations: Maximum self-correction attempts (1-5)\n\n\
Respond in JSON format:\n\
{{\n  \"subtasks\": [\n    {{\"description\": \"...\", \"role\": \"researcher\", \"dependencies\": [], \"max_iterations\": 3}}\n  ],\n  \"reasoning\": \"Brief explanation of decomposition strategy\"\n}}\n\n\
Ensure sub-tasks are independent where possible, clearly defined, correctly ordered, and appropriately sized."
    )
}

/// Build the result-compilation prompt, per
/// `manager.py::_build_compilation_prompt`.
pub fn build_compilation_prompt(task: &Task) -> String {
    let subtask_results: Vec<Value> = task
        .subtasks
        .iter()
        .map(|s| {
            serde_json::json!({
                "description": s.description,
                "role": s.role.to_string(),
                "result": s.result,
                "status": s.status.to_string(),
            })
        })
        .collect();

    let results_json =
        serde_json::to_string_pretty(&Value::Array(subtask_results)).unwrap_or_default();

    format!(
        "You are the Manager of a multi-agent orchestration system.\n\
Compile the results of completed sub-tasks into a coherent final output.\n\n\
Original Goal: {}\n\n\
Sub-task Results:\n{results_json}\n\n\
Synthesize these results into a comprehensive final output that addresses the \
original goal completely, integrates insights from all sub-tasks, resolves any \
conflicts, and presents the information clearly.\n\n\
Respond in JSON format:\n\
{{\n  \"summary\": \"...\",\n  \"detailed_results\": \"...\",\n  \"key_findings\": [\"...\"],\n  \"recommendations\": [\"...\"],\n  \"confidence_score\": 0.95\n}}",
        task.goal
    )
}

/// Build the execution-validation prompt, per
/// `manager.py::validate_execution`.
pub fn build_validation_prompt(task: &Task) -> String {
    let statuses: Vec<Value> = task
        .subtasks
        .iter()
        .map(|s| {
            serde_json::json!({
                "desc": s.description,
                "status": s.status.to_string(),
                "error": s.error,
            })
        })
        .collect();
    let statuses_json =
        serde_json::to_string_pretty(&Value::Array(statuses)).unwrap_or_default();

    format!(
        "Validate the execution of this task:\n\n\
Goal: {}\n\n\
Sub-task Statuses:\n{statuses_json}\n\n\
Assess whether all sub-tasks completed successfully, whether there were any \
failures, whether the final result is coherent and complete, and whether any \
gaps remain. Respond in JSON format with validation results, including a \
boolean `valid` field.",
        task.goal
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NoopMemorySink;
    use crate::provider::{GenerateResponse, LlmProvider, Provider, ProviderRegistry};
    use async_trait::async_trait;

    #[test]
    fn decomposition_prompt_includes_all_roles() {
        let prompt = build_decomposition_prompt("ship a feature", None);
        for role in ["researcher", "executor", "auditor", "creative", "analyst", "coder", "general"] {
            assert!(prompt.contains(role), "missing role {role}");
        }
    }

    #[test]
    fn decomposition_prompt_uses_no_context_placeholder_when_absent() {
        let prompt = build_decomposition_prompt("goal", None);
        assert!(prompt.contains("No additional context"));
    }

    #[test]
    fn goal_prefix_is_deterministic() {
        assert_eq!(goal_prefix("same goal"), goal_prefix("same goal"));
        assert_ne!(goal_prefix("goal a"), goal_prefix("goal b"));
    }

    #[test]
    fn fallback_subtask_covers_whole_goal() {
        let s = fallback_subtask("do the thing");
        assert_eq!(s.role, WorkerRole::General);
        assert_eq!(s.description, "do the thing");
    }

    #[test]
    fn subtasks_from_decomposition_maps_dependency_indices_to_ids() {
        let decomposition = schema::DecompositionResponse {
            subtasks: vec![
                schema::SubtaskSpec {
                    description: "first".into(),
                    role: "researcher".into(),
                    dependencies: vec![],
                    max_iterations: 3,
                },
                schema::SubtaskSpec {
                    description: "second".into(),
                    role: "coder".into(),
                    dependencies: vec![0],
                    max_iterations: 3,
                },
            ],
            reasoning: String::new(),
        };
        let subtasks = subtasks_from_decomposition("goal", decomposition);
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[1].dependencies, vec![subtasks[0].id.clone()]);
    }

    #[test]
    fn mechanical_compilation_aggregates_without_llm() {
        let mut task = Task::new("goal");
        let mut s = Subtask::new("s1", "do a thing", WorkerRole::General);
        s.result = Some("done".to_string());
        task.subtasks.push(s);
        let compiled = mechanical_compilation(&task);
        assert_eq!(compiled.summary, "Results aggregated without synthesis");
        assert!(compiled.detailed_results.contains("done"));
    }

    struct StubProvider {
        response: String,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn generate(
            &self,
            _endpoint: &crate::endpoint::Endpoint,
            _prompt: &str,
            _params: &GenerateParams,
        ) -> Result<GenerateResponse, crate::error::ProviderError> {
            Ok(GenerateResponse {
                text: self.response.clone(),
                tokens_in: 10,
                tokens_out: 10,
                latency_ms: 1,
            })
        }
    }

    fn manager_with_response(response: &str) -> Manager {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider {
            response: response.to_string(),
        }));
        let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(registry)));
        Manager::new(pool, Arc::new(NoopMemorySink))
    }

    #[tokio::test]
    async fn decompose_goal_falls_back_when_no_endpoints_registered() {
        let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(ProviderRegistry::new())));
        let manager = Manager::new(pool, Arc::new(NoopMemorySink));
        let subtasks = manager.decompose_goal("goal", None).await;
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].role, WorkerRole::General);
    }

    #[tokio::test]
    async fn decompose_goal_parses_llm_response() {
        let manager = manager_with_response(
            r#"{"subtasks": [{"description": "research", "role": "researcher", "dependencies": [], "max_iterations": 2}], "reasoning": "simple"}"#,
        );
        let pool = Arc::clone(&manager.pool);
        pool.add_endpoint(crate::endpoint::Endpoint::new(Provider::OpenAi, "gpt-4", 10)).await;
        let subtasks = manager.decompose_goal("goal", None).await;
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].role, WorkerRole::Researcher);
    }

    struct StaleDecompositionSink(Subtask);

    #[async_trait]
    impl crate::memory::MemorySink for StaleDecompositionSink {
        async fn store_task(&self, _task: &crate::task::Task) -> anyhow::Result<()> {
            Ok(())
        }

        async fn find_similar_decomposition(&self, _goal_text: &str) -> anyhow::Result<Option<Vec<Subtask>>> {
            Ok(Some(vec![self.0.clone()]))
        }
    }

    #[tokio::test]
    async fn decompose_goal_resets_lifecycle_state_on_subtasks_recalled_from_memory() {
        let mut stale = Subtask::new("goal_sub_000", "goal", WorkerRole::General);
        stale.status = crate::task::SubtaskStatus::Completed;
        stale.result = Some("a stale answer from a previous run".to_string());
        stale.completed_at = Some(chrono::Utc::now());
        stale.iteration_count = 2;

        let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(ProviderRegistry::new())));
        let manager = Manager::new(pool, Arc::new(StaleDecompositionSink(stale)));

        let subtasks = manager.decompose_goal("goal", None).await;
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].status, crate::task::SubtaskStatus::Pending);
        assert!(subtasks[0].result.is_none());
        assert!(subtasks[0].completed_at.is_none());
        assert_eq!(subtasks[0].iteration_count, 0);
    }
}
