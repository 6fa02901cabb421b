//! Parallel enrichment orchestrator
//!
//! Fans one indicator out to every applicable provider:
//! - A bounded worker pool limits concurrent provider calls
//! - Each call first takes a token from the provider's rate limiter
//! - Each call is bounded by a per-call timeout, the whole run by a global deadline
//! - Errors, timeouts and panics become error results; they never escape

use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use fusion_agents::SharedProvider;
use fusion_core::{
    IndicatorType, ProviderResult, ResultSet, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_MAX_WORKERS,
};

use crate::{GovernorError, RateGovernor};

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum concurrent provider calls
    pub max_workers: usize,
    /// Limit on a single provider call (rate limiter wait excluded)
    pub call_timeout: Duration,
    /// Abort provider calls still running when their result is abandoned.
    /// When false they are detached and their late results discarded.
    pub cancel_abandoned: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            cancel_abandoned: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_cancel_abandoned(mut self, cancel: bool) -> Self {
        self.cancel_abandoned = cancel;
        self
    }
}

/// Orchestrator construction errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] GovernorError),
}

/// Per-provider call counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderStats {
    pub requests: u64,
    pub errors: u64,
}

impl ProviderStats {
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        (self.requests - self.errors) as f64 / self.requests as f64
    }
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Coordinates provider calls for a single indicator at a time
pub struct Orchestrator {
    providers: Vec<SharedProvider>,
    governor: Arc<RateGovernor>,
    config: OrchestratorConfig,
    stats: DashMap<String, ProviderStats>,
}

impl Orchestrator {
    /// Every provider must already have a registered rate limiter
    pub fn new(
        providers: Vec<SharedProvider>,
        governor: Arc<RateGovernor>,
        config: OrchestratorConfig,
    ) -> Result<Self, OrchestratorError> {
        for provider in &providers {
            if !governor.is_registered(provider.name()) {
                return Err(GovernorError::NotRegistered(provider.name().to_string()).into());
            }
        }

        Ok(Self {
            providers,
            governor,
            config,
            stats: DashMap::new(),
        })
    }

    pub fn providers(&self) -> &[SharedProvider] {
        &self.providers
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Providers that support the indicator type, in registration order
    pub fn applicable(&self, indicator_type: IndicatorType) -> Vec<SharedProvider> {
        self.providers
            .iter()
            .filter(|p| p.supports(indicator_type))
            .cloned()
            .collect()
    }

    /// Query all applicable providers in parallel.
    ///
    /// Returns when every provider has reported or `global_timeout` elapses,
    /// whichever comes first. Providers that have not reported by then get
    /// an error result; anything they produce later is discarded.
    pub async fn enrich_parallel(
        &self,
        indicator: &str,
        indicator_type: IndicatorType,
        global_timeout: Duration,
    ) -> ResultSet {
        let start = Instant::now();
        let deadline = start + global_timeout;

        let applicable = self.applicable(indicator_type);
        if applicable.is_empty() {
            warn!("No providers support indicator type {}", indicator_type);
            return ResultSet::new().finalize(start.elapsed(), 0);
        }

        let workers = self.config.max_workers.clamp(1, applicable.len());
        let slots = Arc::new(Semaphore::new(workers));
        info!(
            "Querying {} providers for {} ({}, {} workers)",
            applicable.len(),
            indicator,
            indicator_type,
            workers
        );

        let mut pending = FuturesUnordered::new();
        let mut abort_handles = Vec::with_capacity(applicable.len());

        for provider in &applicable {
            let name = provider.name().to_string();
            let handle = tokio::spawn(run_provider(
                Arc::clone(provider),
                Arc::clone(&self.governor),
                Arc::clone(&slots),
                indicator.to_string(),
                indicator_type,
                deadline,
                self.config.call_timeout,
                self.config.cancel_abandoned,
            ));
            abort_handles.push((name.clone(), handle.abort_handle()));
            pending.push(async move { (name, handle.await) });
        }

        let mut results = ResultSet::new();
        loop {
            let next = timeout_at(deadline, pending.next()).await;
            match next {
                Ok(Some((_, Ok(result)))) => self.collect(&mut results, result),
                Ok(Some((name, Err(join_error)))) => {
                    error!("Provider task {} failed: {}", name, join_error);
                    let message = format!("Provider task failed: {}", join_error);
                    self.collect(&mut results, ProviderResult::error(&name, indicator, message));
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Global timeout ({:?}) reached with {} providers outstanding",
                        global_timeout,
                        pending.len()
                    );
                    break;
                }
            }
        }

        // Dropping the join handles detaches whatever is still running
        drop(pending);

        for (name, handle) in abort_handles {
            if results.contains(&name) {
                continue;
            }
            if self.config.cancel_abandoned {
                handle.abort();
            }
            let message = format!(
                "Global timeout (>{}s) before provider reported",
                global_timeout.as_secs_f64()
            );
            self.collect(&mut results, ProviderResult::error(&name, indicator, message));
        }

        let results = results.finalize(start.elapsed(), applicable.len());
        info!(
            "Enrichment of {} finished in {:.2}s: {}/{} providers succeeded",
            indicator,
            results.metadata().total_execution_time.as_secs_f64(),
            results.metadata().providers_succeeded,
            results.metadata().providers_queried
        );
        results
    }

    fn collect(&self, results: &mut ResultSet, result: ProviderResult) {
        let mut stats = self.stats.entry(result.provider_name.clone()).or_default();
        stats.requests += 1;
        if !result.is_success() {
            stats.errors += 1;
        }
        drop(stats);

        if !results.insert(result) {
            debug!("Duplicate provider result discarded");
        }
    }

    /// Counters accumulated across all runs, sorted by provider name
    pub fn provider_stats(&self) -> Vec<(String, ProviderStats)> {
        let mut stats: Vec<_> = self
            .stats
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }
}

/// One worker slot: pool permit, rate token, then the bounded provider call.
///
/// Waiting for the permit and the token stops at `deadline`, so a run that
/// has already given up never spends a token or calls the provider.
#[allow(clippy::too_many_arguments)]
async fn run_provider(
    provider: SharedProvider,
    governor: Arc<RateGovernor>,
    slots: Arc<Semaphore>,
    indicator: String,
    indicator_type: IndicatorType,
    deadline: Instant,
    call_timeout: Duration,
    cancel_abandoned: bool,
) -> ProviderResult {
    let name = provider.name().to_string();

    let admitted = timeout_at(deadline, async {
        let permit = slots
            .acquire_owned()
            .await
            .map_err(|_| "Worker pool closed".to_string())?;
        governor.acquire(&name).await.map_err(|e| e.to_string())?;
        Ok::<_, String>(permit)
    })
    .await;

    let _permit = match admitted {
        Ok(Ok(permit)) => permit,
        Ok(Err(message)) => return ProviderResult::error(&name, &indicator, message),
        Err(_) => {
            debug!("Deadline passed before {} was dispatched, skipping call", name);
            return ProviderResult::error(&name, &indicator, "Global timeout before dispatch");
        }
    };

    debug!("Dispatching {} for {}", name, indicator);

    // The call runs in its own task so a timed-out call can outlive its slot
    let call = tokio::spawn({
        let provider = Arc::clone(&provider);
        let indicator = indicator.clone();
        async move { provider.enrich(&indicator, indicator_type).await }
    });
    let _guard = cancel_abandoned.then(|| AbortOnDrop(call.abort_handle()));

    match timeout(call_timeout, call).await {
        Ok(Ok(Ok(payload))) => {
            debug!("{} returned {} fields", name, payload.len());
            ProviderResult::success(&name, &indicator, payload)
        }
        Ok(Ok(Err(e))) => {
            warn!("{} failed for {}: {}", name, indicator, e);
            ProviderResult::error(&name, &indicator, e.to_string())
        }
        Ok(Err(join_error)) => {
            error!("{} crashed for {}: {}", name, indicator, join_error);
            ProviderResult::error(&name, &indicator, describe_join_error(join_error))
        }
        Err(_) => {
            warn!("{} did not respond within {:?}", name, call_timeout);
            ProviderResult::timeout(&name, &indicator, call_timeout)
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => format!("Provider panicked: {}", panic_message(payload.as_ref())),
        Err(err) => format!("Provider task failed: {}", err),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
