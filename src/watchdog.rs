// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The Consistency Watchdog compares what the store holds against the node and
//! re-collects any height that disagrees. There is no partial repair: the
//! whole height is pushed again.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use ahash::HashSet;
use anyhow::Context as _;
use futures::{StreamExt as _, future::try_join_all, stream};
use smart_default::SmartDefault;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::blocks::{Tipset, TipsetState};
use crate::chain_source::TipsetLookup;
use crate::shim::ChainEpoch;
use crate::sink::ReadBackStore;
use crate::sync::SyncEngine;

#[derive(Debug, Clone, PartialEq, Eq, SmartDefault)]
pub struct WatchdogConfig {
    /// First height checked.
    pub check_from: ChainEpoch,
    #[default(Duration::from_secs(60))]
    pub interval: Duration,
    pub run_once: bool,
}

/// Why a height was re-collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Discrepancy {
    Missing,
    /// Persisted as a null round, the node has a tipset.
    NullPersisted,
    BlockSetMismatch,
    MissingBlocks,
    MissingMessages,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchdogReport {
    pub checked: usize,
    pub repaired: Vec<(ChainEpoch, Discrepancy)>,
    /// Heights that could not be checked or repaired.
    pub failed: Vec<ChainEpoch>,
}

pub struct Watchdog {
    engine: Arc<SyncEngine>,
    store: Arc<dyn ReadBackStore>,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(
        engine: Arc<SyncEngine>,
        store: Arc<dyn ReadBackStore>,
        config: WatchdogConfig,
    ) -> Self {
        Self {
            engine,
            store,
            config,
        }
    }

    /// Checks once, or every [`WatchdogConfig::interval`] until cancelled.
    /// Returns the report of the last pass.
    pub async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<WatchdogReport> {
        if self.config.run_once {
            return self.check_once(cancel).await;
        }
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = WatchdogReport::default();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(last),
                _ = ticker.tick() => {}
            }
            match self.check_once(cancel).await {
                Ok(report) => last = report,
                Err(e) => error!("watchdog pass failed: {e:#}"),
            }
        }
    }

    /// Checks every height from [`WatchdogConfig::check_from`] up to the
    /// highest persisted one.
    pub async fn check_once(&self, cancel: &CancellationToken) -> anyhow::Result<WatchdogReport> {
        let mut report = WatchdogReport::default();
        let Some(max) = self
            .store
            .max_height()
            .await
            .context("failed to read the persisted max height")?
        else {
            info!("nothing persisted yet");
            return Ok(report);
        };
        let from = self.config.check_from;
        info!(from, to = max, "checking persisted heights");

        let checks = stream::iter(from..=max)
            .take_until(cancel.cancelled())
            .map(|height| async move { (height, self.check_height(height).await) })
            .buffer_unordered(self.engine.config().workers.max(1));
        let mut checks = std::pin::pin!(checks);
        while let Some((height, outcome)) = checks.next().await {
            report.checked += 1;
            match outcome {
                Ok(Some(discrepancy)) => report.repaired.push((height, discrepancy)),
                Ok(None) => {}
                Err(e) => {
                    error!(height, "watchdog check failed: {e:#}");
                    report.failed.push(height);
                }
            }
        }
        report.repaired.sort_unstable_by_key(|(height, _)| *height);
        report.failed.sort_unstable();
        info!(
            checked = report.checked,
            repaired = report.repaired.len(),
            failed = report.failed.len(),
            "watchdog pass done"
        );
        Ok(report)
    }

    /// Re-collects `height` if the store disagrees with the node.
    async fn check_height(&self, height: ChainEpoch) -> anyhow::Result<Option<Discrepancy>> {
        let tipset = match self.engine.source().tipset_by_height(height).await {
            TipsetLookup::Found(tipset) => tipset,
            TipsetLookup::NotYetMined => {
                warn!(height, "persisted height is above the node's head");
                return Ok(None);
            }
            TipsetLookup::Error(reason) => {
                anyhow::bail!("failed to get the tipset at height {height}: {reason}")
            }
        };
        let persisted = self.store.tipset_at(height).await?;

        if tipset.epoch() != height {
            // the node has a null round at `height`
            let discrepancy = match persisted {
                Some(persisted) if persisted.state == TipsetState::Null => return Ok(None),
                Some(persisted) if persisted.state == TipsetState::Normal => {
                    warn!(height, "persisted tipset is a null round on the node");
                    self.engine.push_persisted_revert(&persisted).await?;
                    Discrepancy::BlockSetMismatch
                }
                _ => Discrepancy::Missing,
            };
            self.engine.sync_height(height).await?;
            return Ok(Some(discrepancy));
        }

        let discrepancy = match persisted {
            None => Some(Discrepancy::Missing),
            Some(persisted) if persisted.state != TipsetState::Normal => {
                Some(Discrepancy::NullPersisted)
            }
            Some(persisted) => {
                let node_blocks = tipset.cids().iter().collect::<BTreeSet<_>>();
                if persisted.blocks.iter().collect::<BTreeSet<_>>() != node_blocks {
                    Some(Discrepancy::BlockSetMismatch)
                } else if self.store.block_count(height).await? < tipset.block_headers().len() {
                    Some(Discrepancy::MissingBlocks)
                } else if self.store.message_count(height).await?
                    < self.node_message_count(&tipset).await?
                {
                    Some(Discrepancy::MissingMessages)
                } else {
                    None
                }
            }
        };
        let Some(discrepancy) = discrepancy else {
            debug!(height, "height is consistent");
            return Ok(None);
        };

        warn!(height, %discrepancy, "re-collecting height");
        if discrepancy == Discrepancy::BlockSetMismatch {
            self.engine.push_revert(&tipset).await?;
        }
        self.engine.collect_and_push(tipset).await?;
        Ok(Some(discrepancy))
    }

    async fn node_message_count(&self, tipset: &Tipset) -> anyhow::Result<usize> {
        let source = self.engine.source();
        let per_block = try_join_all(
            tipset
                .block_headers()
                .iter()
                .map(|header| source.block_messages(header.cid())),
        )
        .await?;
        Ok(per_block
            .iter()
            .flat_map(|messages| messages.messages.iter().map(|(cid, _)| cid))
            .collect::<HashSet<_>>()
            .len())
    }
}
