//! Pass orchestration.
//!
//! The driver loop pulls batches of due records from the store, fans them
//! out through the dispatch engine, commits each batch's results, feeds the
//! outcome statistics to the backoff controller, and accumulates retryable
//! failures in the pending set. Once the store has no due records left, the
//! pending set is drained in retry passes (proxy mode forced on, fresh proxy
//! list per pass) until a full pass produces zero hits.
//!
//! Batches are strictly sequential: batch N+1 is not dispatched until batch
//! N's outcomes are committed and observed, because those statistics gate
//! the next batch's delay and the proxy-mode switch. The store and the
//! egress pool are only ever touched from this single task, between batches.

use crate::glm::client::CellLookup;
use crate::proxy::provider::ProxySource;
use crate::proxy::rotation::{EgressIdentity, EgressPool};
use crate::resolver::backoff::BackoffController;
use crate::resolver::dispatch::dispatch_batch;
use crate::resolver::outcome::{CellRecord, LookupOutcome};
use crate::resolver::pending::PendingSet;
use crate::resolver::stats::{BatchTally, PassStats};
use crate::runtime::config::ResolverConfig;
use crate::store::{CellStore, StoreUpdate};
use anyhow::{bail, Context, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Final accounting of one full run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Records that resolved to a committed coordinate, across all passes.
    pub resolved: u64,
    /// Records still unresolved when the retry loop converged.
    pub unresolved: usize,
    /// Retry passes executed after the primary pass.
    pub retry_passes: usize,
    /// Seconds spent sleeping between batches, across all passes.
    pub throttle_secs: u64,
}

pub struct Resolver<C, P> {
    config: ResolverConfig,
    client: C,
    provider: P,
    shutdown: CancellationToken,
}

impl<C: CellLookup, P: ProxySource> Resolver<C, P> {
    pub fn new(config: ResolverConfig, client: C, provider: P) -> Self {
        Self::with_cancellation_token(config, client, provider, CancellationToken::new())
    }

    /// Builds a resolver whose inter-batch sleeps and pass loops observe an
    /// external shutdown token.
    pub fn with_cancellation_token(
        config: ResolverConfig,
        client: C,
        provider: P,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            client,
            provider,
            shutdown,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Runs the primary pass and then retry passes to convergence.
    ///
    /// Only two faults are fatal: the proxy list being unavailable (or empty,
    /// for a pass that runs in proxy mode) at a pass start, and the store
    /// rejecting a read or commit. Everything else is a per-record outcome.
    pub async fn run(&self, store: &mut CellStore) -> Result<RunSummary> {
        let started_at = unix_now();
        let mut pending = PendingSet::new();

        let primary = self.primary_pass(store, started_at, &mut pending).await?;
        let mut resolved = primary.hits;
        let mut throttle_secs = primary.throttle_secs;
        let mut retry_passes = 0;

        if !pending.is_empty() {
            tracing::info!(
                pending = pending.len(),
                "primary pass exhausted; retrying unresolved records through proxies"
            );
        }

        while !pending.is_empty() && !self.shutdown.is_cancelled() {
            retry_passes += 1;
            let stats = self.retry_pass(store, &mut pending, retry_passes).await?;
            resolved += stats.hits;
            throttle_secs += stats.throttle_secs;

            if stats.hits == 0 {
                tracing::info!(
                    pass = retry_passes,
                    unresolved = pending.len(),
                    "retry pass made no progress; stopping"
                );
                break;
            }
        }

        let summary = RunSummary {
            resolved,
            unresolved: pending.len(),
            retry_passes,
            throttle_secs,
        };
        tracing::info!(
            resolved = summary.resolved,
            unresolved = summary.unresolved,
            retry_passes = summary.retry_passes,
            throttle_secs = summary.throttle_secs,
            "resolution run finished"
        );
        Ok(summary)
    }

    async fn primary_pass(
        &self,
        store: &mut CellStore,
        started_at: i64,
        pending: &mut PendingSet,
    ) -> Result<PassStats> {
        let due = store.count_due(started_at)?;
        let proxies = self
            .provider
            .fetch()
            .await
            .context("failed to fetch proxy list for primary pass")?;
        if self.config.start_with_proxies() && proxies.is_empty() {
            bail!("proxy list is empty; refusing to start the primary pass in proxy mode");
        }

        let mut pool = EgressPool::new(
            proxies,
            self.config.worker_width(),
            self.config.start_with_proxies(),
        );
        let mut backoff = BackoffController::new(self.config.switch_threshold_secs());
        let mut stats = PassStats::default();
        let mut batch_index = 0u64;

        tracing::info!(
            due,
            proxy_mode = pool.proxy_mode(),
            proxies = pool.proxy_count(),
            "starting primary pass"
        );

        while !self.shutdown.is_cancelled() {
            let records = store.fetch_due_batch(started_at, pool.batch_size())?;
            if records.is_empty() {
                break;
            }

            let identities = pool.assign(records.len());
            let outcomes = dispatch_batch(
                &self.client,
                &records,
                &identities,
                self.config.worker_width(),
            )
            .await;

            let settled = settle_batch(&records, &identities, &outcomes, &mut pool, pending, true);
            store.apply_batch(&settled.updates, unix_now())?;
            stats.absorb(&settled.tally);

            let switched = backoff.observe(&settled.tally, pool.proxy_mode());
            if switched {
                pool.enable_proxies();
                tracing::warn!(
                    proxies = pool.proxy_count(),
                    "direct egress appears banned; switching to proxy mode"
                );
            }

            batch_index += 1;
            self.log_batch("primary", batch_index, due, &stats, &settled, &backoff, pending);

            if !switched {
                self.throttle(&mut stats, backoff.delay()).await;
            }
        }

        Ok(stats)
    }

    async fn retry_pass(
        &self,
        store: &mut CellStore,
        pending: &mut PendingSet,
        pass_index: usize,
    ) -> Result<PassStats> {
        let proxies = self
            .provider
            .fetch()
            .await
            .with_context(|| format!("failed to fetch proxy list for retry pass {pass_index}"))?;
        if proxies.is_empty() {
            bail!("proxy list is empty; refusing to start retry pass {pass_index}");
        }

        // Retry passes always run through proxies.
        let mut pool = EgressPool::new(proxies, self.config.worker_width(), true);
        let mut backoff = BackoffController::new(self.config.switch_threshold_secs());
        let mut stats = PassStats::default();

        let snapshot = pending.snapshot();
        let sub_batch = pool.batch_size();
        tracing::info!(
            pass = pass_index,
            pending = snapshot.len(),
            sub_batch,
            proxies = pool.proxy_count(),
            "starting retry pass"
        );

        let mut batch_index = 0u64;
        for chunk in snapshot.chunks(sub_batch) {
            if self.shutdown.is_cancelled() {
                break;
            }

            let identities = pool.assign(chunk.len());
            let outcomes = dispatch_batch(
                &self.client,
                chunk,
                &identities,
                self.config.worker_width(),
            )
            .await;

            // A retry pass commits only hits; misses and failures stay in
            // the set untouched for the next pass.
            let settled = settle_batch(chunk, &identities, &outcomes, &mut pool, pending, false);
            store.apply_batch(&settled.updates, unix_now())?;
            stats.absorb(&settled.tally);
            backoff.observe(&settled.tally, true);

            batch_index += 1;
            self.log_batch(
                "retry",
                batch_index,
                snapshot.len() as u64,
                &stats,
                &settled,
                &backoff,
                pending,
            );
            self.throttle(&mut stats, backoff.delay()).await;
        }

        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn log_batch(
        &self,
        pass: &'static str,
        batch: u64,
        total: u64,
        stats: &PassStats,
        settled: &SettledBatch,
        backoff: &BackoffController,
        pending: &PendingSet,
    ) {
        tracing::info!(
            pass,
            batch,
            total,
            visited = stats.visited(),
            hits = stats.hits,
            misses = stats.misses,
            timeouts = stats.timeouts,
            connection_errors = stats.connection_errors,
            implausible = stats.implausible_coordinates + stats.implausible_ranges,
            penalized = settled.penalized,
            pending = pending.len(),
            delay_secs = backoff.delay_secs(),
            "batch settled"
        );
    }

    async fn throttle(&self, stats: &mut PassStats, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        stats.throttle_secs += delay.as_secs();
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = sleep(delay) => {}
        }
    }
}

struct SettledBatch {
    tally: BatchTally,
    updates: Vec<StoreUpdate>,
    penalized: usize,
}

/// Classifies one batch's outcomes into store updates, pending-set changes,
/// and egress penalties. Runs on the driver task after the batch's join
/// point, so the pool and pending set see no concurrent mutation.
fn settle_batch(
    records: &[CellRecord],
    identities: &[EgressIdentity],
    outcomes: &[LookupOutcome],
    pool: &mut EgressPool,
    pending: &mut PendingSet,
    touch_on_miss: bool,
) -> SettledBatch {
    let mut tally = BatchTally::default();
    let mut updates = Vec::new();
    let mut penalized = 0;

    for ((record, identity), outcome) in records.iter().zip(identities).zip(outcomes) {
        tally.record(outcome);
        let class = outcome.class();

        if let LookupOutcome::Hit { lat, lon, range_m } = outcome {
            updates.push(StoreUpdate::Hit {
                key: record.key,
                lat: *lat,
                lon: *lon,
                range_m: *range_m,
            });
            pending.remove(&record.key);
            continue;
        }

        match outcome {
            LookupOutcome::ImplausibleCoordinate { lat, lon, range_m }
            | LookupOutcome::ImplausibleRange { lat, lon, range_m } => {
                tracing::warn!(
                    key = %record.key,
                    lat, lon, range_m,
                    "upstream returned implausible result"
                );
            }
            _ => {}
        }

        if class.refreshes_watermark && touch_on_miss {
            updates.push(StoreUpdate::Touch { key: record.key });
        }
        if class.penalizes_identity {
            pool.penalize(identity);
            penalized += 1;
        }
        if class.retryable {
            pending.insert(*record);
        }
    }

    SettledBatch {
        tally,
        updates,
        penalized,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
