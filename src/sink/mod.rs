// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Downstream sinks.
//!
//! A [`Sink`] receives batches of keyed JSON records per [`Topic`]. Pushing the
//! same key twice must leave the sink as if it was pushed once. A
//! [`ReadBackStore`] answers the few questions the watchdog asks about what
//! has been persisted.

mod memory;
pub mod payloads;
#[cfg(feature = "sqlite")]
mod sqlite;

use ::cid::Cid;
use async_trait::async_trait;
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use crate::blocks::TipsetState;
use crate::shim::ChainEpoch;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Topic {
    Tipsets,
    Blocks,
    Messages,
    MessageReceipts,
    ActorStates,
    MinerInfos,
    MinerSectors,
    RewardActorStates,
    TipsetsToRevert,
}

/// One entity, keyed for de-duplication.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    pub key: String,
    /// The chain height the entity belongs to.
    pub height: ChainEpoch,
    pub payload: Value,
}

#[async_trait]
pub trait Sink: Send + Sync {
    async fn push(&self, topic: Topic, records: Vec<SinkRecord>) -> anyhow::Result<()>;
}

/// A tipset as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTipset {
    pub height: ChainEpoch,
    pub blocks: Vec<Cid>,
    pub state: TipsetState,
}

#[async_trait]
pub trait ReadBackStore: Send + Sync {
    /// The highest persisted tipset height, `None` for an empty store.
    async fn max_height(&self) -> anyhow::Result<Option<ChainEpoch>>;

    async fn tipset_at(&self, height: ChainEpoch) -> anyhow::Result<Option<PersistedTipset>>;

    async fn block_count(&self, height: ChainEpoch) -> anyhow::Result<usize>;

    async fn message_count(&self, height: ChainEpoch) -> anyhow::Result<usize>;
}

/// The topics a revert notice clears at its height: every topic but the
/// notices themselves.
pub const REVERTED_TOPICS: [Topic; 8] = [
    Topic::Tipsets,
    Topic::Blocks,
    Topic::Messages,
    Topic::MessageReceipts,
    Topic::ActorStates,
    Topic::MinerInfos,
    Topic::MinerSectors,
    Topic::RewardActorStates,
];

/// Reads a [`PersistedTipset`] back from a tipset payload.
fn persisted_tipset(height: ChainEpoch, payload: &Value) -> anyhow::Result<PersistedTipset> {
    let state = payload
        .get("state")
        .and_then(Value::as_u64)
        .and_then(|state| u8::try_from(state).ok())
        .and_then(TipsetState::from_u8)
        .ok_or_else(|| anyhow::anyhow!("tipset {height} has no valid state"))?;
    let blocks = match payload.get("blocks") {
        Some(Value::Array(blocks)) => blocks
            .iter()
            .map(|cid| {
                cid.as_str()
                    .ok_or_else(|| anyhow::anyhow!("tipset {height} has a non-string block CID"))?
                    .parse::<Cid>()
                    .map_err(anyhow::Error::from)
            })
            .collect::<anyhow::Result<Vec<_>>>()?,
        _ => vec![],
    };
    Ok(PersistedTipset {
        height,
        blocks,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;
    use strum::IntoEnumIterator as _;

    #[test]
    fn reverts_clear_every_other_topic() {
        let cleared: Vec<Topic> = Topic::iter()
            .filter(|topic| *topic != Topic::TipsetsToRevert)
            .collect();
        assert_eq!(REVERTED_TOPICS.to_vec(), cleared);
    }

    #[test]
    fn topic_names() {
        assert_eq!(Topic::MessageReceipts.to_string(), "message_receipts");
        assert_eq!(Topic::TipsetsToRevert.to_string(), "tipsets_to_revert");
        for topic in Topic::iter() {
            assert_eq!(Topic::from_str(&topic.to_string()).unwrap(), topic);
        }
    }

    #[test]
    fn persisted_tipset_from_payload() {
        let cid = crate::test_utils::cid_of("b");
        let persisted = persisted_tipset(
            4,
            &serde_json::json!({"state": 0, "blocks": [cid.to_string()]}),
        )
        .unwrap();
        assert_eq!(persisted.blocks, vec![cid]);
        assert_eq!(persisted.state, TipsetState::Normal);

        let null = persisted_tipset(5, &serde_json::json!({"state": 1, "blocks": null})).unwrap();
        assert!(null.blocks.is_empty());
        assert_eq!(null.state, TipsetState::Null);

        assert!(persisted_tipset(6, &serde_json::json!({"blocks": []})).is_err());
    }
}
