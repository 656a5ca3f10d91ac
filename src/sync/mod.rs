// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The Sync Engine.
//!
//! Heights are synced independently of each other: [`SyncEngine::sync_height`]
//! fetches one height and pushes everything derived from it. Backfill runs it
//! over a range with bounded concurrency, the follow loops run it for each new
//! head. Pushes are idempotent per key, so syncing a height twice is harmless.

mod backfill;
mod follow;
mod messages;

use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::{Duration, Instant},
};

use anyhow::Context as _;
use smart_default::SmartDefault;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::blocks::{SyncedTipset, Tipset};
use crate::chain_source::{ChainSource, TipsetLookup};
use crate::shim::ChainEpoch;
use crate::sink::{PersistedTipset, Sink, SinkRecord, Topic, payloads::*};
use crate::state_diff::{ActorChanges, StateDiffCollector};

pub use backfill::BackfillReport;
pub use messages::{collect_messages, collect_receipts};

#[derive(Debug, Clone, PartialEq, Eq, SmartDefault)]
pub struct SyncConfig {
    /// Heights synced concurrently during backfill.
    #[default(8)]
    pub workers: usize,
    /// Actors processed concurrently per tipset.
    #[default(10)]
    pub actor_workers: usize,
    pub collect_miner_sectors: bool,
    #[default(Duration::from_secs(5))]
    pub poll_interval: Duration,
    /// Head changes buffered between the subscription and the follow loop.
    #[default(5000)]
    pub head_updates_buffer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartHeight {
    Explicit(ChainEpoch),
    /// The persisted maximum height minus `offset`.
    FromPersisted { offset: ChainEpoch },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// Backfill up to the current head before following.
    pub sync_on_start: bool,
    /// Backfill from genesis, whatever has been persisted.
    pub force_full_resync: bool,
    /// Follow `Filecoin.ChainNotify`.
    pub live_follow: bool,
    /// Poll the head every [`SyncConfig::poll_interval`].
    pub poll_follow: bool,
    pub start_height: StartHeight,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            sync_on_start: true,
            force_full_resync: false,
            live_follow: true,
            poll_follow: false,
            start_height: StartHeight::FromPersisted { offset: 100 },
        }
    }
}

impl StartOptions {
    /// The first height to backfill.
    pub fn start_height(&self, persisted_max: Option<ChainEpoch>) -> ChainEpoch {
        if self.force_full_resync {
            return 0;
        }
        match self.start_height {
            StartHeight::Explicit(height) if height >= 0 => height,
            StartHeight::Explicit(_) => 0,
            StartHeight::FromPersisted { offset } => persisted_max
                .map(|max| (max - offset).max(0))
                .unwrap_or_default(),
        }
    }
}

/// The result of syncing one height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeightOutcome {
    /// Pushed, either as a normal tipset or as a null round.
    Synced(SyncedTipset),
    /// The node's head is below the height.
    NotYetMined,
}

pub struct SyncEngine {
    source: Arc<dyn ChainSource>,
    sink: Arc<dyn Sink>,
    collector: StateDiffCollector,
    config: SyncConfig,
    /// Highest height pushed or known to be persisted, -1 if none.
    synced_height: AtomicI64,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn ChainSource>, sink: Arc<dyn Sink>, config: SyncConfig) -> Self {
        let collector = StateDiffCollector::new(source.clone())
            .with_actor_workers(config.actor_workers)
            .with_miner_sectors(config.collect_miner_sectors);
        Self {
            source,
            sink,
            collector,
            config,
            synced_height: AtomicI64::new(-1),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn ChainSource> {
        &self.source
    }

    /// The highest height synced so far.
    pub fn synced_height(&self) -> Option<ChainEpoch> {
        let height = self.synced_height.load(Ordering::Acquire);
        (height >= 0).then_some(height)
    }

    /// Records that `height` is persisted.
    pub fn note_synced(&self, height: ChainEpoch) {
        self.synced_height.fetch_max(height, Ordering::AcqRel);
    }

    /// Backfills according to `options`, then follows the chain until
    /// cancelled.
    pub async fn run(
        self: Arc<Self>,
        options: StartOptions,
        persisted_max: Option<ChainEpoch>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        if let Some(max) = persisted_max {
            self.note_synced(max);
        }
        if options.sync_on_start {
            let head = self
                .source
                .head()
                .await
                .context("failed to get the chain head")?;
            let from = options.start_height(persisted_max);
            let report = self.sync_range(from, head.epoch() + 1, &cancel).await;
            info!(
                from,
                head = head.epoch(),
                synced = report.heights.len(),
                failed = report.failed.len(),
                "initial sync done"
            );
        }
        match (options.live_follow, options.poll_follow) {
            (true, true) => {
                let (live, poll) = tokio::join!(
                    self.follow_head_changes(&cancel),
                    self.poll_follow(&cancel)
                );
                live.and(poll)
            }
            (true, false) => self.follow_head_changes(&cancel).await,
            (false, true) => self.poll_follow(&cancel).await,
            (false, false) => Ok(()),
        }
    }

    /// Fetches the tipset at `height` and pushes it. A height the node skipped
    /// is pushed as a null round at `height`.
    pub async fn sync_height(&self, height: ChainEpoch) -> anyhow::Result<HeightOutcome> {
        match self.source.tipset_by_height(height).await {
            TipsetLookup::NotYetMined => {
                debug!(height, "height not reached yet");
                Ok(HeightOutcome::NotYetMined)
            }
            TipsetLookup::Error(reason) => {
                anyhow::bail!("failed to get the tipset at height {height}: {reason}")
            }
            TipsetLookup::Found(tipset) if tipset.epoch() != height => {
                debug!(height, found = tipset.epoch(), "null round");
                let synced = SyncedTipset::null(height);
                self.push(Topic::Tipsets, vec![tipset_record(&synced)])
                    .await?;
                self.note_synced(height);
                Ok(HeightOutcome::Synced(synced))
            }
            TipsetLookup::Found(tipset) => {
                self.collect_and_push(tipset.clone()).await?;
                Ok(HeightOutcome::Synced(SyncedTipset::normal(tipset)))
            }
        }
    }

    /// Pushes the blocks, messages, receipts and actor changes of `tipset`,
    /// then the tipset itself. The tipset is only pushed if everything else
    /// was. Genesis only gets its blocks.
    pub async fn collect_and_push(&self, tipset: Arc<Tipset>) -> anyhow::Result<()> {
        let height = tipset.epoch();
        if height == 0 {
            return self.push_genesis(&tipset).await;
        }
        let start = Instant::now();
        let (actors, messages, blocks) = tokio::join!(
            self.push_actor_changes(&tipset),
            self.push_messages(&tipset),
            self.push(Topic::Blocks, block_records(&tipset)),
        );
        actors.with_context(|| format!("failed to sync actor changes at height {height}"))?;
        messages.with_context(|| format!("failed to sync messages at height {height}"))?;
        blocks?;
        self.push(
            Topic::Tipsets,
            vec![tipset_record(&SyncedTipset::normal(tipset.clone()))],
        )
        .await?;
        self.note_synced(height);
        debug!(
            height,
            blocks = tipset.block_headers().len(),
            took = %humantime::format_duration(start.elapsed()),
            "synced tipset"
        );
        Ok(())
    }

    /// Genesis has no parent to diff against, only its blocks are pushed.
    pub async fn sync_genesis(&self) -> anyhow::Result<Arc<Tipset>> {
        let genesis = self
            .source
            .genesis()
            .await
            .context("failed to get the genesis tipset")?;
        self.push_genesis(&genesis).await?;
        Ok(genesis)
    }

    async fn push_genesis(&self, genesis: &Arc<Tipset>) -> anyhow::Result<()> {
        self.push(Topic::Blocks, block_records(genesis)).await?;
        self.push(
            Topic::Tipsets,
            vec![tipset_record(&SyncedTipset::normal(genesis.clone()))],
        )
        .await?;
        self.note_synced(genesis.epoch());
        Ok(())
    }

    /// Tells the sinks `tipset` is no longer canonical. Nothing is fetched.
    pub async fn push_revert(&self, tipset: &Tipset) -> anyhow::Result<()> {
        info!(height = tipset.epoch(), tipset = %tipset.key(), "reverting tipset");
        self.push(Topic::TipsetsToRevert, vec![revert_record(tipset)])
            .await
    }

    /// [`SyncEngine::push_revert`] for a tipset the node no longer has.
    pub async fn push_persisted_revert(&self, persisted: &PersistedTipset) -> anyhow::Result<()> {
        info!(height = persisted.height, "reverting persisted tipset");
        self.push(
            Topic::TipsetsToRevert,
            vec![persisted_revert_record(persisted)],
        )
        .await
    }

    async fn push_actor_changes(&self, tipset: &Tipset) -> anyhow::Result<()> {
        let ActorChanges {
            actors,
            miners,
            sectors,
            reward,
            ..
        } = self.collector.collect(tipset).await?;
        tokio::try_join!(
            self.push(Topic::ActorStates, actor_records(&actors)),
            self.push(Topic::MinerInfos, miner_info_records(&miners)),
            self.push(Topic::MinerSectors, miner_sector_records(&sectors)),
            self.push(
                Topic::RewardActorStates,
                reward.iter().map(reward_record).collect()
            ),
        )?;
        Ok(())
    }

    async fn push_messages(&self, tipset: &Tipset) -> anyhow::Result<()> {
        let source = self.source.as_ref();
        let (messages, receipts) = tokio::try_join!(
            collect_messages(source, tipset),
            collect_receipts(source, tipset)
        )?;
        tokio::try_join!(
            self.push(Topic::Messages, message_records(&messages)),
            self.push(
                Topic::MessageReceipts,
                receipt_records(tipset.epoch(), &receipts)
            ),
        )?;
        Ok(())
    }

    async fn push(&self, topic: Topic, records: Vec<SinkRecord>) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.sink
            .push(topic, records)
            .await
            .with_context(|| format!("failed to push to {topic}"))
    }
}
