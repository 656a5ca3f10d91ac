// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use parking_lot::Mutex;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{HeightOutcome, SyncEngine};
use crate::blocks::TipsetState;
use crate::shim::ChainEpoch;

/// What one backfill pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Terminal state of every height pushed by this pass.
    pub heights: BTreeMap<ChainEpoch, TipsetState>,
    /// Heights that failed and were skipped, ascending.
    pub failed: Vec<ChainEpoch>,
    /// The pass stopped at the node's head.
    pub reached_frontier: bool,
    pub cancelled: bool,
}

impl BackfillReport {
    pub fn null_rounds(&self) -> usize {
        self.heights
            .values()
            .filter(|state| **state == TipsetState::Null)
            .count()
    }
}

impl SyncEngine {
    /// Syncs every height in `[from, to)` with at most
    /// [`super::SyncConfig::workers`] heights in flight. Heights are claimed in
    /// ascending order but may complete in any order.
    ///
    /// Claiming stops at the first height the node has not reached yet, or
    /// when `cancel` fires. Heights already claimed run to completion.
    pub async fn sync_range(
        self: &Arc<Self>,
        from: ChainEpoch,
        to: ChainEpoch,
        cancel: &CancellationToken,
    ) -> BackfillReport {
        let mut report = BackfillReport::default();
        if to <= from {
            info!(from, to, "nothing to backfill");
            return report;
        }
        let start = Instant::now();
        info!(from, to, workers = self.config.workers, "backfilling");

        let mut first = from;
        if from <= 1 {
            match self.sync_genesis().await {
                Ok(genesis) => {
                    report.heights.insert(genesis.epoch(), TipsetState::Normal);
                }
                Err(e) => {
                    error!(height = 0, "failed to sync genesis: {e:#}");
                    report.failed.push(0);
                }
            }
            first = from.max(1);
        }

        let progress = Arc::new(Mutex::new(BTreeMap::new()));
        let frontier = Arc::new(AtomicBool::new(false));
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();
        for height in first..to {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            if frontier.load(Ordering::Acquire) {
                break;
            }
            progress.lock().insert(height, TipsetState::InProgress);
            let (engine, progress, frontier) =
                (self.clone(), progress.clone(), frontier.clone());
            tasks.spawn(async move {
                let _permit = permit;
                match engine.sync_height(height).await {
                    Ok(HeightOutcome::Synced(synced)) => {
                        progress.lock().insert(height, synced.state);
                    }
                    Ok(HeightOutcome::NotYetMined) => {
                        progress.lock().remove(&height);
                        frontier.store(true, Ordering::Release);
                    }
                    Err(e) => {
                        error!(height, "skipping height: {e:#}");
                    }
                }
            });
            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    warn!("backfill worker panicked: {e}");
                }
            }
        }
        while let Some(done) = tasks.join_next().await {
            if let Err(e) = done {
                warn!("backfill worker panicked: {e}");
            }
        }

        // Whatever is still in progress failed or panicked.
        for (height, state) in std::mem::take(&mut *progress.lock()) {
            match state {
                TipsetState::InProgress => report.failed.push(height),
                state => {
                    report.heights.insert(height, state);
                }
            }
        }
        report.failed.sort_unstable();
        report.reached_frontier = frontier.load(Ordering::Acquire);
        if report.cancelled {
            debug!(from, to, "backfill cancelled");
        }
        info!(
            from,
            to,
            synced = report.heights.len(),
            null_rounds = report.null_rounds(),
            failed = report.failed.len(),
            reached_frontier = report.reached_frontier,
            took = %humantime::format_duration(start.elapsed()),
            "backfill done"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine;
    use super::*;
    use crate::sink::{MemoryStore, ReadBackStore as _, Topic};
    use crate::test_utils::MockChain;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn null_rounds_are_filled() {
        let chain = MockChain::new();
        chain.add_linear(0..3);
        chain.remove_tipset(1);
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&chain, &store);

        let report = engine.sync_range(0, 3, &CancellationToken::new()).await;
        assert_eq!(
            report.heights,
            BTreeMap::from([
                (0, TipsetState::Normal),
                (1, TipsetState::Null),
                (2, TipsetState::Normal)
            ])
        );
        assert!(report.failed.is_empty());
        assert_eq!(store.len(Topic::Tipsets), 3);
        assert_eq!(store.tipset_at(1).await.unwrap().unwrap().state, TipsetState::Null);
        assert_eq!(store.block_count(0).await.unwrap(), 1);
        assert_eq!(store.block_count(1).await.unwrap(), 0);
        assert_eq!(store.block_count(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn every_height_gets_a_terminal_state() {
        let chain = MockChain::new();
        chain.add_linear(0..40);
        for null in [7, 8, 21, 33] {
            chain.remove_tipset(null);
        }
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&chain, &store);

        let report = engine.sync_range(5, 40, &CancellationToken::new()).await;
        assert_eq!(report.heights.len(), 35);
        assert_eq!(report.null_rounds(), 4);
        assert!(
            report
                .heights
                .values()
                .all(|state| *state != TipsetState::InProgress)
        );
        for height in 5..40 {
            let persisted = store.tipset_at(height).await.unwrap().unwrap();
            assert_ne!(persisted.state, TipsetState::InProgress);
        }
        assert_eq!(store.len(Topic::Tipsets), 35);
        assert_eq!(engine.synced_height(), Some(39));
    }

    #[tokio::test]
    async fn stops_at_the_frontier() {
        let chain = MockChain::new();
        chain.add_linear(0..5);
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&chain, &store);

        let report = engine.sync_range(2, 100, &CancellationToken::new()).await;
        assert!(report.reached_frontier);
        assert_eq!(report.heights.keys().copied().collect::<Vec<_>>(), [2, 3, 4]);
        assert!(report.failed.is_empty());
        // a handful of heights past the head may be probed, not the whole range
        assert!(chain.calls("tipset_by_height") < 3 + 10);
    }

    #[tokio::test]
    async fn failed_heights_are_skipped() {
        let chain = MockChain::new();
        chain.add_linear(0..6);
        chain.fail_height(3);
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&chain, &store);

        let report = engine.sync_range(2, 6, &CancellationToken::new()).await;
        assert_eq!(report.failed, [3]);
        assert_eq!(report.heights.keys().copied().collect::<Vec<_>>(), [2, 4, 5]);
        assert_eq!(store.tipset_at(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_range_is_a_no_op() {
        let chain = MockChain::new();
        chain.add_linear(0..5);
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&chain, &store);

        let report = engine.sync_range(4, 4, &CancellationToken::new()).await;
        assert_eq!(report, BackfillReport::default());
        let report = engine.sync_range(4, 2, &CancellationToken::new()).await;
        assert_eq!(report, BackfillReport::default());
        assert_eq!(chain.total_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_claiming() {
        let chain = MockChain::new();
        chain.add_linear(0..5);
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&chain, &store);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = engine.sync_range(2, 5, &cancel).await;
        assert!(report.cancelled);
        assert!(report.heights.is_empty());
        assert_eq!(chain.calls("tipset_by_height"), 0);
    }

    #[tokio::test]
    async fn genesis_is_synced_first() {
        let chain = MockChain::new();
        chain.add_linear(0..3);
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&chain, &store);

        engine.sync_range(1, 3, &CancellationToken::new()).await;
        let tipsets = store
            .push_log()
            .into_iter()
            .filter(|(topic, _)| *topic == Topic::Tipsets)
            .collect::<Vec<_>>();
        assert_eq!(tipsets[0].1, ["0"]);
        assert_eq!(chain.calls("genesis"), 1);
        assert_eq!(chain.calls("changed_actors"), 2);
    }
}
