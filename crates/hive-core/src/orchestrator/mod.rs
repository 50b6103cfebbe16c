//! [`Orchestrator`]: builds the worker pool, decomposes a goal, drives its
//! subtasks to completion, and compiles the final result.
//!
//! Grounded in `orchestrator.py::Orchestrator` for the algorithm (worker
//! construction, the single-endpoint sequential path vs. the multi-endpoint
//! wave-barrier DAG path, peer review, deadlock detection) and in
//! `gator-core`'s `orchestrator::run_orchestrator` for the Rust shape
//! around it: a `CancellationToken` checked at every suspension point, a
//! `queries` module of read-only accessors, and `state::dispatch` driving
//! every status change. Unlike `gator-core`, which continuously drains a
//! semaphore-bounded task stream over potentially many-minute agent runs,
//! each subtask here is one bounded LLM exchange, so `ExecuteGoal`'s
//! multi-endpoint branch schedules whole dependency waves at once with
//! `futures::future::join_all` and awaits the barrier before computing the
//! next wave, per §4.4 step 3c.

pub mod queries;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::StateError;
use crate::manager::Manager;
use crate::memory::MemorySink;
use crate::pool::ApiPool;
use crate::state::dispatch;
use crate::task::{needs_correction, Subtask, SubtaskStatus, Task, WorkerRole};
use crate::worker::tool::ToolRegistry;
use crate::worker::{ExecutionMode, Worker, WorkerStatus};

/// Policy knobs named after spec §6's configuration table (the pool's own
/// knobs -- `maxRetries`, `circuitBreakerThreshold`,
/// `healthCheckIntervalSec` -- live on [`crate::pool::PoolConfig`]).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub peer_review_enabled: bool,
    pub self_correction_enabled: bool,
    pub max_subtask_attempts: u32,
    pub execution_step_cap: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            peer_review_enabled: true,
            self_correction_enabled: true,
            max_subtask_attempts: 3,
            execution_step_cap: 5,
        }
    }
}

/// A snapshot of one worker's identity and load, returned by
/// [`Orchestrator::workers`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerInfo {
    pub id: Uuid,
    pub role: WorkerRole,
    pub mode: ExecutionMode,
    pub current_load: u32,
    pub status: WorkerStatus,
}

/// The orchestrator's mutable state, queried through [`queries`] and
/// mutated only from within [`Orchestrator::execute_goal`].
pub struct OrchestratorState {
    workers: Vec<Arc<Worker>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
}

/// Builds a worker pool from the registered endpoints and drives goals to
/// completion against it.
pub struct Orchestrator {
    config: OrchestratorConfig,
    manager: Manager,
    memory: Arc<dyn MemorySink>,
    state: OrchestratorState,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Construct an orchestrator, building its worker pool from the
    /// endpoints currently registered on `pool` per spec §4.4's worker
    /// construction rule: one `General`/`ChainOfThought` worker for exactly
    /// one endpoint, otherwise one `Specialized` worker per endpoint with
    /// roles assigned round-robin from [`WorkerRole::SPECIALIZED`].
    pub async fn new(
        config: OrchestratorConfig,
        pool: Arc<ApiPool>,
        memory: Arc<dyn MemorySink>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let endpoint_count = pool.len().await;
        let workers = build_workers(endpoint_count, &pool, &tools, config.execution_step_cap);
        let manager = Manager::new(Arc::clone(&pool), Arc::clone(&memory));
        Self {
            config,
            manager,
            memory,
            state: OrchestratorState {
                workers,
                tasks: RwLock::new(HashMap::new()),
            },
            cancel: CancellationToken::new(),
        }
    }

    /// Begin accepting work. The worker pool is already built by [`Self::new`];
    /// this exists so callers have an explicit lifecycle hook matching spec
    /// §4.4's `Start()` contract.
    pub fn start(&self) {
        tracing::info!(workers = self.state.workers.len(), "orchestrator started");
    }

    /// Signal cancellation. Every suspending call checked against `cancel`
    /// observes it at its next suspension point; subtasks already in
    /// flight are marked `Failed` with `error = "cancelled"` rather than
    /// left dangling, per spec §5.
    pub fn stop(&self) {
        tracing::info!("orchestrator stopping");
        self.cancel.cancel();
    }

    pub fn workers(&self) -> Vec<WorkerInfo> {
        queries::workers(&self.state)
    }

    pub async fn task_status(&self, task_id: Uuid) -> Option<Task> {
        queries::task_status(&self.state, task_id).await
    }

    /// Decompose `goal`, drive every subtask to a terminal status, compile
    /// the final result, and notify the memory sink. Never returns an
    /// error: task-level failures are recorded on the `Task`/`Subtask`
    /// themselves per spec §7's propagation policy.
    pub async fn execute_goal(&self, goal: &str, context: Option<&Value>) -> Task {
        let mut task = Task::new(goal);
        task.subtasks = self.manager.decompose_goal(goal, context).await;

        let ctx = context.cloned().unwrap_or(Value::Null);

        if self.state.workers.len() <= 1 {
            self.execute_sequential(&mut task, &ctx).await;
        } else {
            self.execute_waves(&mut task, &ctx).await;
        }

        task.final_result = Some(self.manager.compile_results(&task).await);
        task.completed_at = Some(Utc::now());

        if let Err(err) = self.memory.store_task(&task).await {
            tracing::warn!(error = %err, task_id = %task.id, "memory sink failed to store task");
        }

        self.state.tasks.write().await.insert(task.id, task.clone());
        task
    }

    /// Single-endpoint path: iterate subtasks in input order, each given up
    /// to `max_subtask_attempts` tries with a flat 1-second backoff, then a
    /// self-review/correction pass (no peer review, since only one worker
    /// exists), per spec §4.4 "Single endpoint".
    async fn execute_sequential(&self, task: &mut Task, ctx: &Value) {
        let worker = Arc::clone(&self.state.workers[0]);

        for subtask in task.subtasks.iter_mut() {
            if self.cancel.is_cancelled() {
                mark_cancelled(subtask);
                continue;
            }

            subtask.assigned_worker = Some(worker.id);
            if let Err(err) = transition_to_in_progress(subtask) {
                subtask.error = Some(err.to_string());
                continue;
            }

            let attempts = self.config.max_subtask_attempts.max(1);
            let mut last_error = None;
            let mut succeeded = false;

            for attempt in 0..attempts {
                if attempt > 0 {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                match worker.execute_subtask(subtask, ctx).await {
                    Ok(result) => {
                        subtask.result = Some(result);
                        succeeded = true;
                        break;
                    }
                    Err(err) => last_error = Some(err.to_string()),
                }
            }

            if !succeeded {
                subtask.error = last_error;
                let _ = dispatch::fail(subtask);
                continue;
            }

            let verdict = worker.self_review(subtask).await;
            if verdict.needs_correction && self.config.self_correction_enabled {
                let corrected = worker.correct_subtask(subtask, &[]).await;
                subtask.result = Some(corrected);
            }
            let _ = dispatch::complete(subtask);
        }
    }

    /// Multi-endpoint path: compute the ready frontier each round, run it
    /// concurrently, await the whole wave, and repeat, per spec §4.4 step 3.
    async fn execute_waves(&self, task: &mut Task, ctx: &Value) {
        loop {
            if self.cancel.is_cancelled() {
                for subtask in task.subtasks.iter_mut() {
                    mark_cancelled(subtask);
                }
                return;
            }

            let completed: HashSet<String> = task
                .subtasks
                .iter()
                .filter(|s| s.status == SubtaskStatus::Completed)
                .map(|s| s.id.clone())
                .collect();

            let ready_ids: Vec<String> = task
                .subtasks
                .iter()
                .filter(|s| matches!(s.status, SubtaskStatus::Pending | SubtaskStatus::Assigned))
                .filter(|s| s.is_ready(&completed))
                .map(|s| s.id.clone())
                .collect();

            let pending_remains = task
                .subtasks
                .iter()
                .any(|s| !matches!(s.status, SubtaskStatus::Completed | SubtaskStatus::Failed));

            if ready_ids.is_empty() {
                if pending_remains {
                    tracing::error!(task_id = %task.id, "dependency deadlock, failing remaining subtasks");
                    fail_remaining_with_deadlock(task);
                }
                return;
            }

            // Take the ready subtasks out of the vec by value so each wave
            // member can be moved into its own future; a placeholder keeps
            // the vec's length and id order stable until results land back.
            let mut wave = Vec::with_capacity(ready_ids.len());
            for id in &ready_ids {
                let idx = task.subtasks.iter().position(|s| &s.id == id).expect("id from this task");
                let placeholder = Subtask::new(id.clone(), String::new(), WorkerRole::General);
                wave.push((idx, std::mem::replace(&mut task.subtasks[idx], placeholder)));
            }

            // Select inside the future, not before it: join_all polls each
            // future once (in order) before any of them await, so selecting
            // here lets a subtask's current_load increment (the first thing
            // execute_subtask does) before the next subtask in the same
            // wave selects a worker. Selecting eagerly up front would have
            // every same-role subtask see current_load == 0 and pile onto
            // the same worker.
            let futures = wave.into_iter().map(|(idx, subtask)| async move {
                let worker = self.select_worker(subtask.role);
                let finished = self.execute_with_peer_review(&worker, subtask, ctx).await;
                (idx, finished)
            });

            for (idx, subtask) in futures::future::join_all(futures).await {
                task.subtasks[idx] = subtask;
            }
        }
    }

    /// Run one subtask to completion: execute, peer-review (or self-review
    /// when too few other workers exist to review), correct if needed, per
    /// spec §4.4's `ExecuteWithPeerReview`.
    async fn execute_with_peer_review(&self, worker: &Worker, mut subtask: Subtask, ctx: &Value) -> Subtask {
        subtask.assigned_worker = Some(worker.id);
        if let Err(err) = transition_to_in_progress(&mut subtask) {
            subtask.error = Some(err.to_string());
            return subtask;
        }

        match worker.execute_subtask(&subtask, ctx).await {
            Ok(result) => subtask.result = Some(result),
            Err(err) => {
                subtask.error = Some(err.to_string());
                let _ = dispatch::fail(&mut subtask);
                return subtask;
            }
        }

        if let Err(err) = dispatch::begin_peer_review(&mut subtask) {
            subtask.error = Some(err.to_string());
            let _ = dispatch::fail(&mut subtask);
            return subtask;
        }

        let other_workers: Vec<&Arc<Worker>> =
            self.state.workers.iter().filter(|w| w.id != worker.id).collect();

        // Design notes: a single available reviewer evaluates the majority
        // rule to false and adds nothing, so configurations with fewer than
        // two other workers run self-review only.
        if self.config.peer_review_enabled && other_workers.len() >= 2 {
            let reviewers = &other_workers[..2];
            let reviews = futures::future::join_all(reviewers.iter().map(|r| r.review_subtask(&subtask))).await;
            subtask.peer_reviews = reviews;

            if needs_correction(&subtask.peer_reviews) && self.config.self_correction_enabled {
                let corrected = worker.correct_subtask(&subtask, &subtask.peer_reviews).await;
                subtask.result = Some(corrected);
                if dispatch::correct(&mut subtask).is_ok() {
                    let _ = dispatch::finish_correction(&mut subtask);
                }
            } else {
                let _ = dispatch::approve(&mut subtask);
            }
        } else {
            let verdict = worker.self_review(&subtask).await;
            if verdict.needs_correction && self.config.self_correction_enabled {
                let corrected = worker.correct_subtask(&subtask, &[]).await;
                subtask.result = Some(corrected);
                if dispatch::correct(&mut subtask).is_ok() {
                    let _ = dispatch::finish_correction(&mut subtask);
                }
            } else {
                let _ = dispatch::approve(&mut subtask);
            }
        }

        subtask
    }

    /// Worker-selection rule, per spec §4.4: prefer a role match with the
    /// lowest `currentLoad`, else the globally least-loaded worker. Ties
    /// broken by worker id for determinism.
    fn select_worker(&self, role: WorkerRole) -> Arc<Worker> {
        let role_matches: Vec<&Arc<Worker>> =
            self.state.workers.iter().filter(|w| w.role == role).collect();
        let candidates: Vec<&Arc<Worker>> = if role_matches.is_empty() {
            self.state.workers.iter().collect()
        } else {
            role_matches
        };
        candidates
            .into_iter()
            .min_by_key(|w| (w.current_load(), w.id))
            .cloned()
            .expect("orchestrator always builds at least one worker")
    }
}

/// Build the worker pool per spec §4.4's construction rule.
fn build_workers(
    endpoint_count: usize,
    pool: &Arc<ApiPool>,
    tools: &Arc<ToolRegistry>,
    step_cap: u32,
) -> Vec<Arc<Worker>> {
    if endpoint_count <= 1 {
        return vec![Arc::new(
            Worker::new(WorkerRole::General, ExecutionMode::ChainOfThought, Arc::clone(pool), Arc::clone(tools))
                .with_step_cap(step_cap),
        )];
    }

    WorkerRole::SPECIALIZED
        .into_iter()
        .cycle()
        .take(endpoint_count)
        .map(|role| {
            Arc::new(
                Worker::new(role, ExecutionMode::Specialized, Arc::clone(pool), Arc::clone(tools))
                    .with_step_cap(step_cap),
            )
        })
        .collect()
}

/// Transition a subtask from wherever it sits (`Pending` or a retried
/// `Assigned`) up to `InProgress`.
fn transition_to_in_progress(subtask: &mut Subtask) -> Result<(), StateError> {
    if subtask.status == SubtaskStatus::Pending {
        dispatch::assign(subtask)?;
    }
    if subtask.status == SubtaskStatus::Assigned {
        dispatch::start(subtask)?;
    }
    Ok(())
}

fn mark_cancelled(subtask: &mut Subtask) {
    if matches!(subtask.status, SubtaskStatus::Completed | SubtaskStatus::Failed) {
        return;
    }
    subtask.status = SubtaskStatus::Failed;
    subtask.error = Some("cancelled".to_string());
    subtask.completed_at = Some(Utc::now());
}

/// Deadlock sweep: every subtask that hasn't reached a terminal status is
/// forced `Failed` directly rather than through [`dispatch`], since a
/// `Pending` subtask has no valid direct edge to `Failed` and this is a
/// whole-task abort, not a single-subtask state change.
fn fail_remaining_with_deadlock(task: &mut Task) {
    for subtask in task.subtasks.iter_mut() {
        if !matches!(subtask.status, SubtaskStatus::Completed | SubtaskStatus::Failed) {
            subtask.status = SubtaskStatus::Failed;
            subtask.error = Some("dependency deadlock".to_string());
            subtask.completed_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::memory::NoopMemorySink;
    use crate::provider::{GenerateResponse, LlmProvider, Provider, ProviderRegistry};
    use async_trait::async_trait;

    struct ScriptedProvider {
        decompose: String,
        execute: String,
        compile: String,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn generate(
            &self,
            _endpoint: &Endpoint,
            prompt: &str,
            _params: &crate::provider::GenerateParams,
        ) -> Result<GenerateResponse, crate::error::ProviderError> {
            let text = if prompt.contains("Decompose the goal") {
                self.decompose.clone()
            } else if prompt.contains("Compile the results") {
                self.compile.clone()
            } else {
                self.execute.clone()
            };
            Ok(GenerateResponse {
                text,
                tokens_in: 1,
                tokens_out: 1,
                latency_ms: 0,
            })
        }
    }

    async fn single_endpoint_orchestrator(decompose: &str, execute: &str, compile: &str) -> (Orchestrator, Arc<ApiPool>) {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(ScriptedProvider {
            decompose: decompose.to_string(),
            execute: execute.to_string(),
            compile: compile.to_string(),
        }));
        let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(registry)));
        pool.add_endpoint(Endpoint::new(Provider::OpenAi, "gpt-4", 10)).await;
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            Arc::clone(&pool),
            Arc::new(NoopMemorySink),
            Arc::new(ToolRegistry::new()),
        )
        .await;
        (orchestrator, pool)
    }

    #[tokio::test]
    async fn single_endpoint_builds_one_general_worker() {
        let (orchestrator, _pool) = single_endpoint_orchestrator("{}", "42", "{}").await;
        let workers = orchestrator.workers();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].role, WorkerRole::General);
        assert_eq!(workers[0].mode, ExecutionMode::ChainOfThought);
    }

    #[tokio::test]
    async fn s1_single_endpoint_trivial_goal_completes() {
        let decompose = r#"{"subtasks": [{"description": "echo", "role": "general", "dependencies": [], "max_iterations": 1}], "reasoning": "trivial"}"#;
        let compile = r#"{"summary": "ok", "detailed_results": "42", "key_findings": [], "recommendations": [], "confidence_score": 1.0}"#;
        let (orchestrator, _pool) = single_endpoint_orchestrator(decompose, "FINAL_ANSWER: 42", compile).await;

        let task = orchestrator.execute_goal("say 42", None).await;

        assert_eq!(task.subtasks.len(), 1);
        assert_eq!(task.subtasks[0].status, SubtaskStatus::Completed);
        assert_eq!(task.subtasks[0].result.as_deref(), Some("42"));
        assert_eq!(task.final_result.unwrap().summary, "ok");
    }

    #[tokio::test]
    async fn no_endpoints_falls_back_and_still_completes() {
        let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(ProviderRegistry::new())));
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            Arc::clone(&pool),
            Arc::new(NoopMemorySink),
            Arc::new(ToolRegistry::new()),
        )
        .await;

        let task = orchestrator.execute_goal("do a thing", None).await;
        assert_eq!(task.subtasks.len(), 1);
        assert_eq!(task.subtasks[0].status, SubtaskStatus::Failed);
    }

    #[tokio::test]
    async fn s5_dependency_deadlock_fails_both_subtasks() {
        let decompose = r#"{"subtasks": [{"description": "a", "role": "general", "dependencies": [1], "max_iterations": 1}, {"description": "b", "role": "general", "dependencies": [0], "max_iterations": 1}], "reasoning": "cycle"}"#;
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(ScriptedProvider {
            decompose: decompose.to_string(),
            execute: "result".to_string(),
            compile: "{}".to_string(),
        }));
        let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(registry)));
        pool.add_endpoint(Endpoint::new(Provider::OpenAi, "a", 10)).await;
        pool.add_endpoint(Endpoint::new(Provider::OpenAi, "b", 5)).await;

        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            Arc::clone(&pool),
            Arc::new(NoopMemorySink),
            Arc::new(ToolRegistry::new()),
        )
        .await;

        let task = orchestrator.execute_goal("cyclic goal", None).await;
        assert_eq!(task.subtasks.len(), 2);
        for subtask in &task.subtasks {
            assert_eq!(subtask.status, SubtaskStatus::Failed);
            assert_eq!(subtask.error.as_deref(), Some("dependency deadlock"));
        }
    }

    #[tokio::test]
    async fn stop_marks_pending_subtasks_cancelled_before_sequential_run() {
        let decompose = r#"{"subtasks": [{"description": "a", "role": "general", "dependencies": [], "max_iterations": 1}], "reasoning": "x"}"#;
        let (orchestrator, _pool) = single_endpoint_orchestrator(decompose, "FINAL_ANSWER: ok", "{}").await;
        orchestrator.stop();

        let task = orchestrator.execute_goal("goal", None).await;
        assert_eq!(task.subtasks[0].status, SubtaskStatus::Failed);
        assert_eq!(task.subtasks[0].error.as_deref(), Some("cancelled"));
    }

    #[test]
    fn build_workers_round_robins_specialized_roles_for_multiple_endpoints() {
        let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(ProviderRegistry::new())));
        let tools = Arc::new(ToolRegistry::new());
        let workers = build_workers(8, &pool, &tools, 5);
        assert_eq!(workers.len(), 8);
        assert_eq!(workers[0].role, WorkerRole::Researcher);
        assert_eq!(workers[6].role, WorkerRole::Researcher);
        assert!(workers.iter().all(|w| w.mode == ExecutionMode::Specialized));
    }
}
