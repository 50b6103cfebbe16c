//! S3 — rate-limit failover (spec.md §8).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use hive_core::endpoint::{Endpoint, EndpointStatus};
use hive_core::error::ProviderError;
use hive_core::memory::NoopMemorySink;
use hive_core::provider::{GenerateParams, GenerateResponse, LlmProvider, Provider, ProviderRegistry};
use hive_core::worker::tool::ToolRegistry;
use hive_core::{ApiPool, Orchestrator, OrchestratorConfig, SubtaskStatus};

/// Answers decomposition and compilation prompts directly, and
/// rate-limits the first subtask-execution call that lands on
/// `endpoint-1` (both endpoints share this one registered `OpenAi`
/// client, so the provider tells them apart via `endpoint.model`).
struct RateLimitOnceProvider {
    decompose: String,
    compile: String,
    execute: String,
    endpoint_1_hit: Mutex<bool>,
}

impl RateLimitOnceProvider {
    fn new(decompose: impl Into<String>, compile: impl Into<String>, execute: impl Into<String>) -> Self {
        Self {
            decompose: decompose.into(),
            compile: compile.into(),
            execute: execute.into(),
            endpoint_1_hit: Mutex::new(false),
        }
    }
}

#[async_trait]
impl LlmProvider for RateLimitOnceProvider {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(
        &self,
        endpoint: &Endpoint,
        prompt: &str,
        _params: &GenerateParams,
    ) -> Result<GenerateResponse, ProviderError> {
        let text = if prompt.contains("Decompose the goal") {
            self.decompose.clone()
        } else if prompt.contains("Compile the results") {
            self.compile.clone()
        } else {
            if endpoint.model == "endpoint-1" {
                let mut hit = self.endpoint_1_hit.lock().unwrap();
                if !*hit {
                    *hit = true;
                    return Err(ProviderError::RateLimited);
                }
            }
            self.execute.clone()
        };

        Ok(GenerateResponse { text, tokens_in: 1, tokens_out: 1, latency_ms: 5 })
    }
}

#[tokio::test]
async fn first_endpoint_rate_limited_second_serves_the_call() {
    let decompose = r#"{"subtasks": [{"description": "only", "role": "general", "dependencies": [], "max_iterations": 1}], "reasoning": "single"}"#;
    let compile = r#"{"summary": "ok", "detailed_results": "served", "key_findings": [], "recommendations": [], "confidence_score": 1.0}"#;

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(RateLimitOnceProvider::new(decompose, compile, "FINAL_ANSWER: served")));

    let pool = Arc::new(ApiPool::new(Default::default(), Arc::new(registry)));
    let endpoint_1 = pool.add_endpoint(Endpoint::new(Provider::OpenAi, "endpoint-1", 10)).await;
    pool.add_endpoint(Endpoint::new(Provider::OpenAi, "endpoint-2", 5)).await;

    let orchestrator = Orchestrator::new(
        OrchestratorConfig::default(),
        Arc::clone(&pool),
        Arc::new(NoopMemorySink),
        Arc::new(ToolRegistry::new()),
    )
    .await;

    let task = orchestrator.execute_goal("do the one thing", None).await;

    assert_eq!(task.subtasks.len(), 1);
    assert_eq!(task.subtasks[0].status, SubtaskStatus::Completed);

    let entries_snapshot = pool.get_stats().await;
    let ep1 = entries_snapshot.iter().find(|s| s.id == endpoint_1).expect("endpoint 1 present");
    assert_eq!(ep1.status, EndpointStatus::RateLimited);
    let reset_at = ep1.rate_limit_reset_time.expect("reset time recorded");
    let last_used = ep1.last_used.expect("last_used recorded");
    assert!(reset_at > last_used + chrono::Duration::seconds(50));

    // The other endpoint is untouched: still healthy and never rate-limited.
    let ep2 = entries_snapshot
        .iter()
        .find(|s| s.id != endpoint_1)
        .expect("endpoint 2 present");
    assert_eq!(ep2.status, EndpointStatus::Healthy);
}
