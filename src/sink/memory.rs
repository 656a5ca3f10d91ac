// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    PersistedTipset, REVERTED_TOPICS, ReadBackStore, Sink, SinkRecord, Topic, persisted_tipset,
};
use crate::shim::ChainEpoch;

/// An in-memory [`Sink`] and [`ReadBackStore`], keyed the same way as the
/// persistent stores.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(Topic, String), SinkRecord>>,
    /// Every push in arrival order, as `(topic, keys)`.
    log: Mutex<Vec<(Topic, Vec<String>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, topic: Topic, key: &str) -> Option<SinkRecord> {
        self.records.lock().get(&(topic, key.to_owned())).cloned()
    }

    /// All records of a topic, ordered by key.
    pub fn records(&self, topic: Topic) -> Vec<SinkRecord> {
        self.records
            .lock()
            .iter()
            .filter(|((t, _), _)| *t == topic)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn len(&self, topic: Topic) -> usize {
        self.records.lock().keys().filter(|(t, _)| *t == topic).count()
    }

    pub fn push_log(&self) -> Vec<(Topic, Vec<String>)> {
        self.log.lock().clone()
    }

    fn count_at(&self, topic: Topic, height: ChainEpoch) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|((t, _), record)| *t == topic && record.height == height)
            .count()
    }
}

#[async_trait]
impl Sink for MemoryStore {
    async fn push(&self, topic: Topic, records: Vec<SinkRecord>) -> anyhow::Result<()> {
        self.log.lock().push((
            topic,
            records.iter().map(|record| record.key.clone()).collect(),
        ));
        let mut stored = self.records.lock();
        for record in records {
            if topic == Topic::TipsetsToRevert {
                let height = record.height;
                stored.retain(|(t, _), r| !(REVERTED_TOPICS.contains(t) && r.height == height));
            }
            stored.insert((topic, record.key.clone()), record);
        }
        Ok(())
    }
}

#[async_trait]
impl ReadBackStore for MemoryStore {
    async fn max_height(&self) -> anyhow::Result<Option<ChainEpoch>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|((t, _), _)| *t == Topic::Tipsets)
            .map(|(_, record)| record.height)
            .max())
    }

    async fn tipset_at(&self, height: ChainEpoch) -> anyhow::Result<Option<PersistedTipset>> {
        self.get(Topic::Tipsets, &height.to_string())
            .map(|record| persisted_tipset(height, &record.payload))
            .transpose()
    }

    async fn block_count(&self, height: ChainEpoch) -> anyhow::Result<usize> {
        Ok(self.count_at(Topic::Blocks, height))
    }

    async fn message_count(&self, height: ChainEpoch) -> anyhow::Result<usize> {
        Ok(self.count_at(Topic::Messages, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{SyncedTipset, TipsetState};
    use crate::sink::payloads::{block_records, revert_record, tipset_record};
    use crate::test_utils::tipset_at;
    use std::sync::Arc;

    #[tokio::test]
    async fn pushes_are_idempotent() {
        let store = MemoryStore::new();
        let tipset = tipset_at(3, 2);
        for _ in 0..2 {
            store
                .push(Topic::Blocks, block_records(&tipset))
                .await
                .unwrap();
        }
        assert_eq!(store.len(Topic::Blocks), 2);
        assert_eq!(store.block_count(3).await.unwrap(), 2);
        assert_eq!(store.push_log().len(), 2);
    }

    #[tokio::test]
    async fn read_back() {
        let store = MemoryStore::new();
        assert_eq!(store.max_height().await.unwrap(), None);
        let tipset = Arc::new(tipset_at(4, 1));
        store
            .push(
                Topic::Tipsets,
                vec![
                    tipset_record(&SyncedTipset::normal(tipset.clone())),
                    tipset_record(&SyncedTipset::null(5)),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.max_height().await.unwrap(), Some(5));
        let persisted = store.tipset_at(4).await.unwrap().unwrap();
        assert_eq!(persisted.blocks, tipset.cids());
        assert_eq!(
            store.tipset_at(5).await.unwrap().unwrap().state,
            TipsetState::Null
        );
        assert_eq!(store.tipset_at(6).await.unwrap(), None);
    }

    #[tokio::test]
    async fn revert_clears_the_height() {
        let store = MemoryStore::new();
        let (reverted, kept) = (Arc::new(tipset_at(7, 2)), Arc::new(tipset_at(6, 1)));
        for tipset in [&reverted, &kept] {
            store
                .push(Topic::Tipsets, vec![tipset_record(&SyncedTipset::normal(tipset.clone()))])
                .await
                .unwrap();
            store.push(Topic::Blocks, block_records(tipset)).await.unwrap();
        }
        store
            .push(Topic::TipsetsToRevert, vec![revert_record(&reverted)])
            .await
            .unwrap();
        assert_eq!(store.tipset_at(7).await.unwrap(), None);
        assert_eq!(store.block_count(7).await.unwrap(), 0);
        assert_eq!(store.block_count(6).await.unwrap(), 1);
        assert_eq!(store.len(Topic::TipsetsToRevert), 1);
    }
}
