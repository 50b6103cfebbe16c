//! The [`LlmProvider`] trait -- the adapter interface for remote LLM
//! endpoints.
//!
//! Each concrete provider (OpenAI, Anthropic, Gemini, Ollama, ...)
//! implements this trait. The trait is intentionally object-safe, the same
//! way `gator-core`'s `Harness` trait is, so it can be stored as
//! `Arc<dyn LlmProvider>` in a [`ProviderRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::error::ProviderError;

/// The provider a given [`Endpoint`] talks to.
///
/// spec §6 treats `provider` as opaque to the core except for health-probe
/// and cost-estimation dispatch, which is exactly what this sum type plus
/// [`ProviderRegistry`] gives us: exhaustive pattern matching in place of
/// the original's string-keyed `if provider == "openai": ...` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
    /// A provider not in the known registry (e.g. an OpenAI-compatible
    /// third party). The core treats it like any other provider; only the
    /// caller-supplied [`LlmProvider`] impl needs to understand it.
    Other,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for Provider {
    type Err = ProviderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "other" => Ok(Self::Other),
            other => Err(ProviderParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an unrecognized provider string.
#[derive(Debug, Clone)]
pub struct ProviderParseError(pub String);

impl fmt::Display for ProviderParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid provider: {:?}", self.0)
    }
}

impl std::error::Error for ProviderParseError {}

/// Parameters passed to [`LlmProvider::generate`].
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    /// Maximum tokens the provider should generate. `None` defers to the
    /// provider's own default.
    pub max_tokens: Option<u32>,
    /// Sampling temperature, where applicable.
    pub temperature: Option<f32>,
    /// If true, this is a minimal health-probe call (small token budget,
    /// trivial prompt) rather than a real generation request.
    pub is_probe: bool,
}

/// The result of a successful [`LlmProvider::generate`] call.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Generated text.
    pub text: String,
    /// Input tokens consumed, if reported by the provider.
    pub tokens_in: u32,
    /// Output tokens produced, if reported by the provider.
    pub tokens_out: u32,
    /// Round-trip latency in milliseconds, as observed by the caller.
    pub latency_ms: u64,
}

/// Adapter interface for a remote LLM endpoint.
///
/// Implementing this (OpenAI/Anthropic/Gemini/Ollama clients, or a mock for
/// tests) is explicitly out of scope for the core per spec §1; the core
/// only depends on this trait's contract.
///
/// # Object Safety
///
/// Every method returns a concrete or boxed-future type via `async_trait`,
/// so `Arc<dyn LlmProvider>` can be stored in a [`ProviderRegistry`] and in
/// [`crate::endpoint::Endpoint`] references held by the pool.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which [`Provider`] this implementation talks to.
    fn provider(&self) -> Provider;

    /// Issue a generation request against `endpoint`.
    ///
    /// Implementations must classify failures into the four
    /// [`ProviderError`] kinds so [`crate::pool::ApiPool`] can apply the
    /// correct status transition; never panic on a provider-side error.
    async fn generate(
        &self,
        endpoint: &Endpoint,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<GenerateResponse, ProviderError>;
}

// Compile-time assertion: LlmProvider must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn LlmProvider) {}
};

/// A named collection of [`LlmProvider`] implementations, keyed by
/// [`Provider`].
///
/// Mirrors `gator-core`'s `harness::HarnessRegistry`: a small, swappable
/// lookup table the pool consults for health probes and that `Manager`
/// and `Worker` consult (indirectly, through the pool) to actually talk to
/// an endpoint.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider client. Replaces any existing client for the
    /// same [`Provider`] and returns it.
    pub fn register(
        &mut self,
        client: Arc<dyn LlmProvider>,
    ) -> Option<Arc<dyn LlmProvider>> {
        self.providers.insert(client.provider(), client)
    }

    /// Look up the client for a given provider.
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(&provider).cloned()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
