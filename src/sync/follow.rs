// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use anyhow::Context as _;
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::SyncEngine;
use crate::chain_source::{HeadChange, HeadChangeType};

impl SyncEngine {
    /// Follows `Filecoin.ChainNotify` until `cancel` fires. Changes are
    /// handled one at a time, in the order the node sent them.
    ///
    /// Returns an error if the subscription ends.
    pub async fn follow_head_changes(
        self: &Arc<Self>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let mut changes = self
            .source
            .head_changes()
            .await
            .context("failed to subscribe to head changes")?;
        info!("following head changes");

        let (tx, mut rx) = mpsc::channel(self.config.head_updates_buffer.max(1));
        let reader = tokio::spawn(async move {
            while let Some(batch) = changes.next().await {
                for change in batch {
                    if tx.send(change).await.is_err() {
                        return;
                    }
                }
            }
        });

        let result = loop {
            let change = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                change = rx.recv() => change,
            };
            match change {
                Some(change) => self.handle_head_change(change, cancel).await,
                None => break Err(anyhow::anyhow!("head change subscription closed")),
            }
        };
        reader.abort();
        result
    }

    /// Handles one head change. Failures are logged, the height is left for a
    /// later backfill or the watchdog.
    pub async fn handle_head_change(
        self: &Arc<Self>,
        change: HeadChange,
        cancel: &CancellationToken,
    ) {
        let HeadChange { kind, tipset } = change;
        let height = tipset.epoch();
        debug!(height, %kind, "head change");
        let result = match kind {
            HeadChangeType::Current => {
                // with nothing synced yet, the whole chain below the head is missing
                let from = self.synced_height().unwrap_or(0);
                if from < height {
                    info!(from, head = height, "catching up to the current head");
                    self.sync_range(from, height, cancel).await;
                }
                self.collect_and_push(tipset).await
            }
            HeadChangeType::Apply => self.collect_and_push(tipset).await,
            HeadChangeType::Revert => self.push_revert(&tipset).await,
            HeadChangeType::Unknown(other) => {
                warn!(height, kind = %other, "unknown head change type, applying");
                self.collect_and_push(tipset).await
            }
        };
        if let Err(e) = result {
            error!(height, "failed to handle head change: {e:#}");
        }
    }

    /// Polls the head every [`super::SyncConfig::poll_interval`] and backfills
    /// up to it.
    pub async fn poll_follow(self: &Arc<Self>, cancel: &CancellationToken) -> anyhow::Result<()> {
        info!(
            interval = %humantime::format_duration(self.config.poll_interval),
            "polling the chain head"
        );
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }
            let head = match self.source.head().await {
                Ok(head) => head,
                Err(e) => {
                    warn!("failed to poll the chain head: {e}");
                    continue;
                }
            };
            let from = self.synced_height().map_or(0, |height| height + 1);
            if head.epoch() >= from {
                self.sync_range(from, head.epoch() + 1, cancel).await;
            }
        }
    }
}
