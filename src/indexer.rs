//! # Staking Indexer
//!
//! Drives the reconciliation handlers from chain logs.
//!
//! ## Flow
//!
//! 1. Split the requested block range into chunks.
//! 2. Fetch the logs of the two staking contracts plus every dynamic data
//!    source registered so far.
//! 3. Process them one at a time in `(block, transaction index, log index)`
//!    order. Each handler completes before the next log is looked at.
//! 4. When a handler registers a new data source, persist it and pull its logs
//!    for the rest of the chunk into the queue.
//! 5. Persist the cursor once the chunk is done.
//!
//! Reward distribution token addresses stay in every `eth_getLogs` query once
//! registered. None of their events has a handler yet, so those logs are
//! counted as ignored.
//!
//! A handler error stops the run at that log. The cursor only ever points at a
//! fully processed chunk, so a restart replays the failed chunk; handlers are
//! idempotent per event.

use async_trait::async_trait;
use chrono::Utc;
use ethers::prelude::{Address, Filter, Log, Middleware};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

use crate::data_sources::DataSources;
use crate::entities::{DynamicDataSource, IndexerCursor};
use crate::error::{IndexerError, IndexerResult};
use crate::events::{decode_log, event_meta, StakingEvent};
use crate::handlers::{HandlerOutcome, StakingHandlers};
use crate::store::{fetch, fetch_all, get_or_create, save_entity, EntityStore};
use crate::utils::create_block_chunks;

/// Id of the cursor record used by this indexer.
pub const CURSOR_ID: &str = "nftx-staking";

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Source of chain logs and the current head.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn block_number(&self) -> IndexerResult<u64>;

    /// Logs emitted by any of `addresses` in `[from, to]`, inclusive.
    async fn logs(&self, addresses: &[Address], from: u64, to: u64) -> IndexerResult<Vec<Log>>;
}

/// [`LogSource`] over an ethers middleware, retrying failed requests with
/// exponential backoff.
pub struct EthersLogSource<M> {
    client: Arc<M>,
    max_retries: usize,
    base_delay_ms: u64,
}

impl<M: Middleware + 'static> EthersLogSource<M> {
    pub fn new(client: Arc<M>, max_retries: usize, base_delay_ms: u64) -> Self {
        Self {
            client,
            max_retries,
            base_delay_ms,
        }
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        retry_delays(self.base_delay_ms, self.max_retries)
    }
}

/// Waits of `base`, `2 * base`, `4 * base`, ... capped at 30s.
///
/// `ExponentialBackoff` raises its base to the n-th power, so the base is
/// fixed at 2 and the configured delay goes into the factor.
fn retry_delays(base_delay_ms: u64, max_retries: usize) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor((base_delay_ms / 2).max(1))
        .max_delay(MAX_RETRY_DELAY)
        .take(max_retries)
}

#[async_trait]
impl<M: Middleware + 'static> LogSource for EthersLogSource<M> {
    async fn block_number(&self) -> IndexerResult<u64> {
        Retry::start(self.strategy(), || {
            let client = Arc::clone(&self.client);
            async move { client.get_block_number().await }
        })
        .await
        .map(|n| n.as_u64())
        .map_err(|e| IndexerError::Rpc(format!("eth_blockNumber: {}", e)))
    }

    async fn logs(&self, addresses: &[Address], from: u64, to: u64) -> IndexerResult<Vec<Log>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new()
            .address(addresses.to_vec())
            .from_block(from)
            .to_block(to);

        Retry::start(self.strategy(), || {
            let client = Arc::clone(&self.client);
            let filter = filter.clone();
            async move {
                client.get_logs(&filter).await.map_err(|e| {
                    warn!("eth_getLogs {}..{} failed: {}", from, to, e);
                    e
                })
            }
        })
        .await
        .map_err(|e| IndexerError::Rpc(format!("eth_getLogs {}..{}: {}", from, to, e)))
    }
}

/// Static contracts and batching parameters of the indexer.
#[derive(Debug, Clone, Copy)]
pub struct IndexerConfig {
    pub lp_staking: Address,
    pub inventory_staking: Address,
    pub chunk_size: u64,
}

/// Counters of one indexing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexerStats {
    pub logs: u64,
    pub applied: u64,
    pub skipped: u64,
    /// Logs without a handler, or a handled signature from an unexpected emitter.
    pub ignored: u64,
}

impl IndexerStats {
    fn absorb(&mut self, other: IndexerStats) {
        self.logs += other.logs;
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.ignored += other.ignored;
    }
}

/// Restores the dynamic data sources persisted by previous runs.
pub async fn load_data_sources(store: &dyn EntityStore) -> IndexerResult<DataSources> {
    let persisted = fetch_all::<DynamicDataSource>(store).await?;
    info!("Loaded {} dynamic data sources", persisted.len());
    Ok(DataSources::from_persisted(persisted))
}

pub struct StakingIndexer {
    config: IndexerConfig,
    source: Arc<dyn LogSource>,
    handlers: StakingHandlers,
    store: Arc<dyn EntityStore>,
    data_sources: Arc<DataSources>,
}

impl StakingIndexer {
    pub fn new(
        config: IndexerConfig,
        source: Arc<dyn LogSource>,
        handlers: StakingHandlers,
        store: Arc<dyn EntityStore>,
        data_sources: Arc<DataSources>,
    ) -> Self {
        Self {
            config,
            source,
            handlers,
            store,
            data_sources,
        }
    }

    pub async fn last_processed_block(&self) -> IndexerResult<Option<u64>> {
        Ok(fetch::<IndexerCursor>(self.store.as_ref(), CURSOR_ID)
            .await?
            .and_then(|c| c.last_processed_block))
    }

    /// First block that still needs processing.
    pub async fn next_block(&self, start_block: u64) -> IndexerResult<u64> {
        Ok(self
            .last_processed_block()
            .await?
            .map(|b| b + 1)
            .unwrap_or(start_block)
            .max(start_block))
    }

    /// Processes everything up to `head - confirmations`.
    ///
    /// Returns the stats and the last processed block, or `None` when there
    /// was nothing to do.
    pub async fn sync_to_head(
        &self,
        start_block: u64,
        confirmations: u64,
    ) -> IndexerResult<Option<(IndexerStats, u64)>> {
        let head = self.source.block_number().await?;
        let target = head.saturating_sub(confirmations);
        let from = self.next_block(start_block).await?;
        if from > target {
            debug!("Up to date at block {} (head {})", from.saturating_sub(1), head);
            return Ok(None);
        }
        let stats = self.run_range(from, target).await?;
        Ok(Some((stats, target)))
    }

    /// Processes `[from, to]` chunk by chunk, saving the cursor after each one.
    pub async fn run_range(&self, from: u64, to: u64) -> IndexerResult<IndexerStats> {
        let mut total = IndexerStats::default();
        if from > to {
            return Ok(total);
        }
        for (chunk_from, chunk_to) in create_block_chunks(from, to, self.config.chunk_size) {
            let stats = self.process_chunk(chunk_from, chunk_to).await?;
            self.save_cursor(chunk_to).await?;
            info!(
                "Blocks {}..{}: {} logs, {} applied, {} skipped, {} ignored",
                chunk_from, chunk_to, stats.logs, stats.applied, stats.skipped, stats.ignored
            );
            total.absorb(stats);
        }
        Ok(total)
    }

    async fn process_chunk(&self, from: u64, to: u64) -> IndexerResult<IndexerStats> {
        let mut stats = IndexerStats::default();
        let mut addresses = vec![self.config.lp_staking, self.config.inventory_staking];
        addresses.extend(self.data_sources.addresses());

        let mut queue = ordered(self.source.logs(&addresses, from, to).await?)?;

        while let Some(log) = queue.pop_front() {
            if log.removed == Some(true) {
                continue;
            }
            stats.logs += 1;
            let meta = event_meta(&log)?;

            match decode_log(&log)? {
                Some(event) if self.is_expected_emitter(meta.address, &event) => {
                    match self.handlers.dispatch(&meta, &event).await? {
                        HandlerOutcome::Applied => stats.applied += 1,
                        HandlerOutcome::Skipped => stats.skipped += 1,
                    }
                }
                Some(event) => {
                    debug!(
                        "Ignoring {} from unexpected emitter {:?}",
                        event.name(),
                        meta.address
                    );
                    stats.ignored += 1;
                }
                None => stats.ignored += 1,
            }

            let fresh = self.data_sources.take_new();
            if fresh.is_empty() {
                continue;
            }
            let mut new_addresses = Vec::with_capacity(fresh.len());
            for source in &fresh {
                save_entity(self.store.as_ref(), source).await?;
                new_addresses.push(source.address);
            }

            // Pick up what the new sources emitted after the current log.
            let position = meta.ordering_key();
            let extra = self
                .source
                .logs(&new_addresses, meta.block_number, to)
                .await?;
            let mut merged: Vec<Log> = queue.drain(..).collect();
            for log in extra {
                if event_meta(&log)?.ordering_key() > position {
                    merged.push(log);
                }
            }
            queue = ordered(merged)?;
        }

        Ok(stats)
    }

    fn is_expected_emitter(&self, emitter: Address, event: &StakingEvent) -> bool {
        match event {
            StakingEvent::PoolCreated(_) | StakingEvent::PoolUpdated(_) => {
                emitter == self.config.lp_staking
            }
            StakingEvent::XTokenCreated(_) | StakingEvent::Deposit(_) | StakingEvent::Withdraw(_) => {
                emitter == self.config.inventory_staking
            }
        }
    }

    async fn save_cursor(&self, block: u64) -> IndexerResult<()> {
        let store = self.store.as_ref();
        let mut cursor: IndexerCursor = get_or_create(store, CURSOR_ID).await?;
        cursor.last_processed_block = Some(block);
        cursor.updated_at = Some(Utc::now());
        save_entity(store, &cursor).await?;
        Ok(())
    }
}

/// Sorts logs into processing order and drops duplicates.
fn ordered(logs: Vec<Log>) -> IndexerResult<VecDeque<Log>> {
    let mut keyed = Vec::with_capacity(logs.len());
    for log in logs {
        keyed.push((event_meta(&log)?.ordering_key(), log));
    }
    keyed.sort_by_key(|(key, _)| *key);
    keyed.dedup_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, log)| log).collect())
}
