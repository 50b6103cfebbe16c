//! [`Endpoint`] and [`EndpointStatus`] -- the data model for a single
//! registered API endpoint, grounded in `api_pool.py`'s `APIEndpoint`
//! dataclass and `APIStatus` enum.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::Provider;

/// How long, in seconds, a rate-limited endpoint is skipped before it is
/// eligible for selection again, per spec §4.1's `rateLimitResetTime=now+60s`.
const RATE_LIMIT_COOLDOWN_SECS: i64 = 60;

/// Health status of an [`Endpoint`], ordered worst-to-best for sorting
/// purposes: [`Self::rank`] gives the sort key `api_pool.py::_update_endpoint_order`
/// uses, extended with `RateLimited` between `Degraded` and `Unhealthy` per
/// spec §4.1's `statusRank`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Healthy,
    Degraded,
    RateLimited,
    Unhealthy,
}

impl EndpointStatus {
    /// Sort rank used when ordering endpoints by preference: lower sorts
    /// first.
    pub fn rank(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded => 1,
            Self::RateLimited => 2,
            Self::Unhealthy => 3,
        }
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::RateLimited => "rate_limited",
            Self::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

impl FromStr for EndpointStatus {
    type Err = EndpointStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(Self::Healthy),
            "degraded" => Ok(Self::Degraded),
            "rate_limited" => Ok(Self::RateLimited),
            "unhealthy" => Ok(Self::Unhealthy),
            other => Err(EndpointStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an unrecognized endpoint status string.
#[derive(Debug, Clone)]
pub struct EndpointStatusParseError(pub String);

impl fmt::Display for EndpointStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid endpoint status: {:?}", self.0)
    }
}

impl std::error::Error for EndpointStatusParseError {}

/// A single registered API endpoint: a provider, a model, and the
/// bookkeeping the pool needs to select, retry, and demote it.
///
/// Corresponds to `api_pool.py::APIEndpoint`. `priority` and `status`
/// drive [`crate::pool::ApiPool`] selection order; `consecutive_failures`
/// drives the circuit-breaker trip into [`EndpointStatus::Unhealthy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub provider: Provider,
    pub model: String,
    /// Higher priority is preferred when multiple endpoints are otherwise
    /// equally eligible. Ties broken by registration order.
    pub priority: i32,
    pub status: EndpointStatus,
    /// Capabilities this endpoint supports (e.g. `"vision"`, `"tools"`),
    /// consulted by [`crate::pool::ApiPool::get_endpoint`]'s capability
    /// filter.
    pub capabilities: Vec<String>,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    /// When a [`EndpointStatus::RateLimited`] endpoint becomes eligible for
    /// selection again. `None` unless `status == RateLimited`.
    pub rate_limit_reset_time: Option<DateTime<Utc>>,
    /// Timestamp of the endpoint's most recent call, success or failure.
    pub last_used: Option<DateTime<Utc>>,
    /// Running mean of observed latency in milliseconds, updated on every
    /// successful call.
    pub avg_latency_ms: f64,
}

impl Endpoint {
    /// Construct a new endpoint starting out healthy, with empty counters.
    pub fn new(provider: Provider, model: impl Into<String>, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            model: model.into(),
            priority,
            status: EndpointStatus::Healthy,
            capabilities: Vec::new(),
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
            total_tokens_in: 0,
            total_tokens_out: 0,
            rate_limit_reset_time: None,
            last_used: None,
            avg_latency_ms: 0.0,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Whether this endpoint declares `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Record a successful call: resets the failure streak, promotes a
    /// degraded endpoint back to healthy, and updates `avgLatency` with a
    /// running mean per spec §4.1's `ExecuteWithFailover` success path.
    pub fn record_success(&mut self, tokens_in: u32, tokens_out: u32, latency_ms: u64) {
        self.total_requests += 1;
        self.total_tokens_in += tokens_in as u64;
        self.total_tokens_out += tokens_out as u64;
        self.consecutive_failures = 0;
        self.last_used = Some(Utc::now());
        let n = self.total_requests as f64;
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / n;
        if self.status == EndpointStatus::Degraded {
            self.status = EndpointStatus::Healthy;
        }
    }

    /// Record a failed call, tripping the circuit breaker into
    /// [`EndpointStatus::Unhealthy`] once `threshold` consecutive failures
    /// accumulate, per spec §4.1's failover algorithm's *Other* bucket.
    pub fn record_failure(&mut self, threshold: u32) {
        self.total_requests += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_used = Some(Utc::now());
        self.status = if self.consecutive_failures >= threshold {
            EndpointStatus::Unhealthy
        } else {
            EndpointStatus::Degraded
        };
    }

    /// Record a provider-signaled rate limit: spec §4.1's *RateLimit*
    /// bucket. Does not count toward the circuit breaker; the endpoint is
    /// simply benched until `rate_limit_reset_time` passes.
    pub fn record_rate_limited(&mut self) {
        self.total_requests += 1;
        self.total_failures += 1;
        self.last_used = Some(Utc::now());
        self.status = EndpointStatus::RateLimited;
        self.rate_limit_reset_time = Some(Utc::now() + chrono::Duration::seconds(RATE_LIMIT_COOLDOWN_SECS));
    }

    /// Record a credential rejection: spec §4.1's *Auth* bucket. Trips the
    /// endpoint to `Unhealthy` immediately, bypassing the circuit breaker
    /// threshold, since retrying the same bad credential cannot succeed.
    pub fn record_unauthorized(&mut self) {
        self.total_requests += 1;
        self.total_failures += 1;
        self.last_used = Some(Utc::now());
        self.status = EndpointStatus::Unhealthy;
    }

    /// If this endpoint is rate-limited and its reset time has passed,
    /// transition it back to healthy. Returns whether a transition
    /// happened. Called by [`crate::pool::ApiPool::reorder`] before each
    /// selection pass.
    pub fn try_reset_rate_limit(&mut self) -> bool {
        if self.status != EndpointStatus::RateLimited {
            return false;
        }
        let Some(reset_at) = self.rate_limit_reset_time else {
            return false;
        };
        if Utc::now() < reset_at {
            return false;
        }
        self.status = EndpointStatus::Healthy;
        self.rate_limit_reset_time = None;
        true
    }

    /// Backoff duration before the next retry against this endpoint,
    /// `2^attempt` seconds as in `api_pool.py::execute_with_failover`.
    pub fn backoff_for_attempt(attempt: u32) -> Duration {
        Duration::from_secs(2u64.saturating_pow(attempt))
    }
}
