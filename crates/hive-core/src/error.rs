//! Error types shared across the orchestrator.
//!
//! Leaf, matchable failures (endpoint-level, tool-level) are `thiserror`
//! enums so callers can branch on them. Orchestration-level functions that
//! aggregate several possible causes return `anyhow::Result` instead, the
//! same split `gator-core` uses between its query/state modules and
//! its orchestrator/lifecycle modules.

use thiserror::Error;

/// Errors a [`crate::provider::LlmProvider`] raises from `generate`.
///
/// This is the typed error surface named in spec §6; [`crate::pool::ApiPool`]
/// classifies these to decide status transitions and retry eligibility.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    /// The provider signaled a rate limit (HTTP 429 or an equivalent
    /// provider-specific signal).
    #[error("rate limited by provider")]
    RateLimited,

    /// The provider rejected the credential (HTTP 401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A transient, likely-recoverable failure (timeout, connection reset).
    #[error("transient provider error: {0}")]
    Transient(String),

    /// A permanent failure unlikely to succeed on retry (malformed request,
    /// unsupported model).
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

/// Errors returned by [`crate::pool::ApiPool`] operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No endpoint satisfying the request constraints (capability,
    /// preferred provider, health) is currently selectable.
    #[error("no healthy endpoint available")]
    NoHealthyEndpoint,

    /// `ExecuteWithFailover` exhausted `max_retries` attempts.
    #[error("all retries failed: {0}")]
    AllRetriesFailed(#[source] ProviderError),
}

/// Errors surfaced by a [`crate::worker::tool::Tool`] invocation.
///
/// Tool failures never crash a worker; they are folded back into the
/// conversation or recorded as the subtask's terminal error.
#[derive(Debug, Error, Clone)]
pub enum ToolError {
    /// The requested tool name is not registered.
    #[error("unknown tool: {0}")]
    NotFound(String),

    /// The tool is not on the calling role's allowlist.
    #[error("tool {tool:?} is not allowed for role {role}")]
    NotAllowed {
        /// The tool name that was rejected.
        tool: String,
        /// The role that attempted to invoke it.
        role: String,
    },

    /// The tool ran but failed.
    #[error("tool {tool:?} failed: {message}")]
    Failed {
        /// The tool name that failed.
        tool: String,
        /// A human-readable failure description.
        message: String,
    },
}

/// Errors from [`crate::state::SubtaskStateMachine`] transitions.
#[derive(Debug, Error, Clone)]
pub enum StateError {
    /// The requested transition is not an edge in the status graph.
    #[error("invalid state transition: {from} -> {to} for subtask {subtask_id}")]
    InvalidTransition {
        subtask_id: String,
        from: crate::task::SubtaskStatus,
        to: crate::task::SubtaskStatus,
    },

    /// A retry was requested but the subtask already used its attempt
    /// budget.
    #[error("subtask {subtask_id} exhausted its {max_iterations} attempt budget")]
    AttemptsExhausted {
        subtask_id: String,
        max_iterations: u32,
    },
}
