//! Shared test doubles for the scenario-level integration tests in this
//! directory (spec.md §8's S1-S6). Mirrors the `ScriptedProvider` pattern
//! already used by `orchestrator::tests` and `pool::tests`, generalized to
//! also script peer-review and correction responses so a single provider
//! can drive a whole multi-worker scenario.

use async_trait::async_trait;

use hive_core::endpoint::Endpoint;
use hive_core::provider::{GenerateParams, GenerateResponse, LlmProvider, Provider};
use hive_core::error::ProviderError;

/// An `LlmProvider` whose response is picked by matching the prompt
/// against an ordered list of substrings, falling back to a default. Rules
/// are checked in registration order, so more specific markers (peer
/// review, correction) should be registered before generic per-subtask
/// execute markers.
pub struct ScriptedProvider {
    provider: Provider,
    rules: Vec<(String, String)>,
    default: String,
}

impl ScriptedProvider {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            provider: Provider::OpenAi,
            rules: Vec::new(),
            default: default.into(),
        }
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Respond with `response` the first time the prompt contains `needle`.
    pub fn on_contains(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), response.into()));
        self
    }

    pub fn decompose(self, response: impl Into<String>) -> Self {
        self.on_contains("Decompose the goal", response)
    }

    pub fn compile(self, response: impl Into<String>) -> Self {
        self.on_contains("Compile the results", response)
    }

    /// Respond to a peer-review prompt for the subtask whose description
    /// is `description`, matched via the marker
    /// `build_peer_review_prompt` opens with.
    pub fn peer_review_for(self, description: impl std::fmt::Display, response: impl Into<String>) -> Self {
        self.on_contains(
            format!("reviewing work done by another agent.\n\nOriginal Task: {description}"),
            response,
        )
    }

    /// Respond to a correction prompt for `description`, matched via the
    /// marker `build_correction_prompt` opens with.
    pub fn correction_for(self, description: impl std::fmt::Display, response: impl Into<String>) -> Self {
        self.on_contains(
            format!("Correct the following task based on review feedback:\n\nOriginal Task: {description}"),
            response,
        )
    }

    /// Respond to the execute prompt (chain-of-thought or role prompt) for
    /// the subtask whose description is `description`.
    pub fn execute_for(self, description: impl std::fmt::Display, response: impl Into<String>) -> Self {
        self.on_contains(format!("Task: {description}"), response)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(
        &self,
        _endpoint: &Endpoint,
        prompt: &str,
        _params: &GenerateParams,
    ) -> Result<GenerateResponse, ProviderError> {
        let text = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default.clone());

        Ok(GenerateResponse {
            text,
            tokens_in: 1,
            tokens_out: 1,
            latency_ms: 0,
        })
    }
}
