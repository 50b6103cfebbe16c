//! [`ApiPool`]: a health-tracked, priority-ordered pool of [`Endpoint`]s
//! with retry and failover.
//!
//! Grounded in `api_pool.py::APIPool`. Where the original holds a single
//! Python-GIL-serialized list, here each endpoint is wrapped in its own
//! `Mutex` so concurrent subtasks can hit different endpoints without
//! contending on a single lock, while the priority ordering itself is
//! recomputed under a short-lived `RwLock` write, the same granularity
//! split `gator-core` uses between per-row `Mutex`-free Postgres
//! updates and an in-process ordering cache.

pub mod cost;
pub mod stats;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::endpoint::{Endpoint, EndpointStatus};
use crate::error::{PoolError, ProviderError};
use crate::provider::{GenerateParams, GenerateResponse, Provider, ProviderRegistry};

pub use stats::PoolStats;

/// Policy knobs for [`ApiPool`], named after spec §6's configuration
/// table.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_retries: u32,
    pub circuit_breaker_threshold: u32,
    pub health_check_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            circuit_breaker_threshold: 5,
            health_check_interval: Duration::from_secs(60),
        }
    }
}

/// A request for an endpoint meeting optional constraints, mirroring
/// `api_pool.py::get_endpoint`'s `capability` and `preferred_provider`
/// parameters.
#[derive(Debug, Clone, Default)]
pub struct EndpointRequest {
    pub capability: Option<String>,
    pub preferred_provider: Option<Provider>,
}

struct PoolEntry {
    endpoint: Arc<Mutex<Endpoint>>,
}

/// Health-tracked, priority-ordered pool of endpoints.
///
/// The sole LLM-call path for every other component (per spec Design
/// Notes) is [`ApiPool::execute_with_failover`]; `Manager` and `Worker`
/// never hold a provider client directly.
pub struct ApiPool {
    config: PoolConfig,
    registry: Arc<ProviderRegistry>,
    entries: RwLock<HashMap<Uuid, PoolEntry>>,
    /// Endpoint ids in selection order: healthy-first, then by descending
    /// priority. Recomputed by [`Self::reorder`] whenever membership or
    /// status changes.
    order: RwLock<Vec<Uuid>>,
}

impl ApiPool {
    pub fn new(config: PoolConfig, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            config,
            registry,
            entries: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register a new endpoint and recompute selection order.
    pub async fn add_endpoint(&self, endpoint: Endpoint) -> Uuid {
        let id = endpoint.id;
        self.entries.write().await.insert(
            id,
            PoolEntry {
                endpoint: Arc::new(Mutex::new(endpoint)),
            },
        );
        self.reorder().await;
        id
    }

    /// Remove an endpoint from the pool.
    pub async fn remove_endpoint(&self, id: Uuid) -> bool {
        let removed = self.entries.write().await.remove(&id).is_some();
        if removed {
            self.reorder().await;
        }
        removed
    }

    /// Recompute `order`: healthy endpoints first, then degraded, then
    /// rate-limited, then unhealthy, each group sorted by descending
    /// priority, matching `api_pool.py::_update_endpoint_order`. Also gives
    /// every rate-limited endpoint a chance to reset back to healthy, per
    /// spec §4.1's "on reset, transition to Healthy".
    async fn reorder(&self) {
        let entries = self.entries.read().await;
        let mut scored = Vec::with_capacity(entries.len());
        for (id, entry) in entries.iter() {
            let mut ep = entry.endpoint.lock().await;
            ep.try_reset_rate_limit();
            scored.push((*id, ep.status.rank(), -ep.priority));
        }
        scored.sort_by_key(|&(_, rank, neg_priority)| (rank, neg_priority));
        *self.order.write().await = scored.into_iter().map(|(id, ..)| id).collect();
    }

    /// Select the best eligible endpoint for `request`, per spec §4.1's
    /// selection algorithm: skip unhealthy (and not-yet-reset
    /// rate-limited) endpoints, filter by capability, prefer (but do not
    /// require) `preferred_provider`.
    pub async fn get_endpoint(&self, request: &EndpointRequest) -> Option<Arc<Mutex<Endpoint>>> {
        self.select_endpoint_excluding(request, &HashSet::new()).await
    }

    /// As [`Self::get_endpoint`], but skips any id already in `excluded`.
    /// `ExecuteWithFailover` uses this to track `attempted:set<EndpointId>`
    /// so the same endpoint is never retried twice within one call.
    async fn select_endpoint_excluding(
        &self,
        request: &EndpointRequest,
        excluded: &HashSet<Uuid>,
    ) -> Option<Arc<Mutex<Endpoint>>> {
        let order = self.order.read().await;
        let entries = self.entries.read().await;

        let mut fallback = None;
        for id in order.iter() {
            if excluded.contains(id) {
                continue;
            }
            let Some(entry) = entries.get(id) else {
                continue;
            };
            let ep = entry.endpoint.lock().await;
            if matches!(ep.status, EndpointStatus::Unhealthy | EndpointStatus::RateLimited) {
                continue;
            }
            if let Some(capability) = &request.capability {
                if !ep.has_capability(capability) {
                    continue;
                }
            }
            let matches_preferred = request
                .preferred_provider
                .map(|p| p == ep.provider)
                .unwrap_or(true);
            drop(ep);
            if matches_preferred {
                return Some(Arc::clone(&entry.endpoint));
            }
            if fallback.is_none() {
                fallback = Some(Arc::clone(&entry.endpoint));
            }
        }
        fallback
    }

    /// Execute `prompt` against the pool with retry and failover: select
    /// an endpoint, call it, and on failure select a different,
    /// not-yet-attempted endpoint, backing off `2^attempt` seconds between
    /// attempts, up to `max_retries`. An endpoint is never retried within
    /// the same call, per invariant 4, so a single-endpoint pool yields at
    /// most one attempt before `NoHealthyEndpoint`. This is the only path
    /// by which any component talks to a provider, per spec Design Notes.
    pub async fn execute_with_failover(
        &self,
        request: &EndpointRequest,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<GenerateResponse, PoolError> {
        let mut last_err = None;
        let mut attempted: HashSet<Uuid> = HashSet::new();

        for attempt in 0..self.config.max_retries {
            let Some(endpoint_handle) = self.select_endpoint_excluding(request, &attempted).await
            else {
                return Err(PoolError::NoHealthyEndpoint);
            };

            let (id, provider, client) = {
                let ep = endpoint_handle.lock().await;
                let provider = ep.provider;
                (ep.id, provider, self.registry.get(provider))
            };
            attempted.insert(id);

            let Some(client) = client else {
                last_err = Some(ProviderError::Permanent(format!(
                    "no registered client for provider {provider}"
                )));
                break;
            };

            let started = Instant::now();
            let result = {
                let ep = endpoint_handle.lock().await;
                client.generate(&ep, prompt, params).await
            };
            let elapsed = started.elapsed();

            match result {
                Ok(mut response) => {
                    response.latency_ms = elapsed.as_millis() as u64;
                    let mut ep = endpoint_handle.lock().await;
                    ep.record_success(response.tokens_in, response.tokens_out, response.latency_ms);
                    drop(ep);
                    self.reorder().await;
                    return Ok(response);
                }
                Err(err) => {
                    let mut ep = endpoint_handle.lock().await;
                    let is_permanent = matches!(err, ProviderError::Permanent(_));
                    match &err {
                        ProviderError::RateLimited => ep.record_rate_limited(),
                        ProviderError::Unauthorized(_) => ep.record_unauthorized(),
                        ProviderError::Transient(_) | ProviderError::Permanent(_) => {
                            ep.record_failure(self.config.circuit_breaker_threshold)
                        }
                    }
                    drop(ep);
                    self.reorder().await;

                    tracing::warn!(
                        attempt,
                        error = %err,
                        "endpoint call failed"
                    );

                    last_err = Some(err);
                    if is_permanent {
                        break;
                    }
                    tokio::time::sleep(Endpoint::backoff_for_attempt(attempt)).await;
                }
            }
        }

        Err(PoolError::AllRetriesFailed(
            last_err.unwrap_or(ProviderError::Transient("no attempts made".into())),
        ))
    }

    /// Probe every endpoint once, updating its status based on whether
    /// the probe call succeeds, per `api_pool.py::health_check`.
    pub async fn health_check(&self) {
        let ids: Vec<Uuid> = self.entries.read().await.keys().copied().collect();
        for id in ids {
            self.check_endpoint_health(id).await;
        }
        self.reorder().await;
    }

    async fn check_endpoint_health(&self, id: Uuid) {
        let handle = {
            let entries = self.entries.read().await;
            entries.get(&id).map(|e| Arc::clone(&e.endpoint))
        };
        let Some(handle) = handle else { return };

        let provider = handle.lock().await.provider;
        let Some(client) = self.registry.get(provider) else {
            return;
        };

        let probe_params = GenerateParams {
            is_probe: true,
            max_tokens: Some(1),
            ..Default::default()
        };
        let result = {
            let ep = handle.lock().await;
            client.generate(&ep, "ping", &probe_params).await
        };

        let mut ep = handle.lock().await;
        match result {
            Ok(_) => ep.record_success(0, 0, 0),
            Err(ProviderError::RateLimited) => ep.record_rate_limited(),
            Err(ProviderError::Unauthorized(_)) => ep.record_unauthorized(),
            Err(_) => ep.record_failure(self.config.circuit_breaker_threshold),
        }
    }

    /// Spawn a background task that calls [`Self::health_check`] on
    /// `health_check_interval` until `cancel` fires, mirroring
    /// `api_pool.py::start_health_monitoring` but as a cancellable tokio
    /// task instead of a bare asyncio loop, the idiom `gator-core` uses
    /// for its own background work.
    pub fn spawn_health_monitor(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let pool = Arc::clone(self);
        let interval = pool.config.health_check_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("health monitor stopping");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        pool.health_check().await;
                    }
                }
            }
        })
    }

    /// Snapshot stats for every endpoint, per `api_pool.py::get_stats`.
    pub async fn get_stats(&self) -> Vec<PoolStats> {
        let order = self.order.read().await;
        let entries = self.entries.read().await;
        let mut out = Vec::with_capacity(order.len());
        for id in order.iter() {
            if let Some(entry) = entries.get(id) {
                let ep = entry.endpoint.lock().await;
                out.push(PoolStats::from_endpoint(&ep));
            }
        }
        out
    }

    /// Number of registered endpoints.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Estimated cost, in USD, of a `tokens`-token exchange against each
    /// registered endpoint. See [`cost::estimate_cost`].
    pub async fn get_cost_estimate(&self, tokens: u64) -> HashMap<Uuid, f64> {
        let entries = self.entries.read().await;
        let mut out = HashMap::with_capacity(entries.len());
        for (id, entry) in entries.iter() {
            let model = entry.endpoint.lock().await.model.clone();
            out.insert(*id, cost::estimate_cost(&model, tokens));
        }
        out
    }
}
