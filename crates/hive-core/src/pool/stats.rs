//! Snapshot stats reported by [`super::ApiPool::get_stats`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::endpoint::{Endpoint, EndpointStatus};
use crate::provider::Provider;

/// Read-only snapshot of one endpoint's accumulated counters, the
/// equivalent of the dict `api_pool.py::get_stats` returns per endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStats {
    pub id: Uuid,
    pub provider: Provider,
    pub model: String,
    pub status: EndpointStatus,
    pub priority: i32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    pub avg_latency_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub rate_limit_reset_time: Option<DateTime<Utc>>,
}

impl PoolStats {
    pub fn from_endpoint(endpoint: &Endpoint) -> Self {
        Self {
            id: endpoint.id,
            provider: endpoint.provider,
            model: endpoint.model.clone(),
            status: endpoint.status,
            priority: endpoint.priority,
            total_requests: endpoint.total_requests,
            total_failures: endpoint.total_failures,
            total_tokens_in: endpoint.total_tokens_in,
            total_tokens_out: endpoint.total_tokens_out,
            avg_latency_ms: endpoint.avg_latency_ms,
            last_used: endpoint.last_used,
            rate_limit_reset_time: endpoint.rate_limit_reset_time,
        }
    }

    /// Fraction of calls that failed, `0.0` when no calls have been made.
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_requests as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;

    #[test]
    fn failure_rate_is_zero_with_no_requests() {
        let stats = PoolStats {
            id: Uuid::nil(),
            provider: Provider::OpenAi,
            model: "gpt-4".into(),
            status: EndpointStatus::Healthy,
            priority: 0,
            total_requests: 0,
            total_failures: 0,
            total_tokens_in: 0,
            total_tokens_out: 0,
            avg_latency_ms: 0.0,
            last_used: None,
            rate_limit_reset_time: None,
        };
        assert_eq!(stats.failure_rate(), 0.0);
    }

    #[test]
    fn failure_rate_divides_failures_by_requests() {
        let stats = PoolStats {
            id: Uuid::nil(),
            provider: Provider::OpenAi,
            model: "gpt-4".into(),
            status: EndpointStatus::Degraded,
            priority: 0,
            total_requests: 4,
            total_failures: 1,
            total_tokens_in: 0,
            total_tokens_out: 0,
            avg_latency_ms: 0.0,
            last_used: None,
            rate_limit_reset_time: None,
        };
        assert_eq!(stats.failure_rate(), 0.25);
    }
}
