//! A placeholder [`LlmProvider`] wired up by `hive run`.
//!
//! Real provider clients (HTTP calls to OpenAI, Anthropic, Gemini, Ollama)
//! are explicitly out of scope per spec §1's Non-goals; callers embedding
//! this crate are expected to supply their own [`LlmProvider`] impls built
//! on top of the credential/`baseURL` pulled from [`crate::config`]. This
//! one exists so `hive run` has something to talk to out of the box, the
//! same role `gator-core`'s `NoopHarness` plays for its CLI before a
//! real agent binary is wired in.

use async_trait::async_trait;

use hive_core::{Endpoint, GenerateParams, GenerateResponse, LlmProvider, Provider};

pub struct DemoProvider {
    provider: Provider,
}

impl DemoProvider {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl LlmProvider for DemoProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(
        &self,
        endpoint: &Endpoint,
        prompt: &str,
        _params: &GenerateParams,
    ) -> Result<GenerateResponse, hive_core::error::ProviderError> {
        tracing::debug!(provider = %self.provider, model = %endpoint.model, "demo provider invoked");
        Ok(GenerateResponse {
            text: format!(
                "[demo provider response for {} prompts beginning: {:.60}]",
                self.provider,
                prompt
            ),
            tokens_in: prompt.len() as u32 / 4,
            tokens_out: 16,
            latency_ms: 0,
        })
    }
}
