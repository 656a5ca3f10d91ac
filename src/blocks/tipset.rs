// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{fmt, sync::Arc};

use crate::blocks::{BlockHeader, RawBlockHeader};
use crate::shim::ChainEpoch;
use ::cid::Cid;
use itertools::Itertools as _;
use num::BigInt;
use thiserror::Error;

/// An ordered set of block CIDs identifying a tipset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TipsetKey(Vec<Cid>);

impl TipsetKey {
    pub fn cids(&self) -> &[Cid] {
        &self.0
    }

    pub fn into_cids(self) -> Vec<Cid> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Duplicated CIDs are dropped, keeping the first occurrence.
impl FromIterator<Cid> for TipsetKey {
    fn from_iter<T: IntoIterator<Item = Cid>>(iter: T) -> Self {
        Self(iter.into_iter().unique().collect())
    }
}

/// Same rendering as Lotus' `TipSetKey.String()`, `{cid1,cid2}`.
impl fmt::Display for TipsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.iter().join(","))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CreateTipsetError {
    #[error("tipsets must contain at least one block")]
    Empty,
    #[error("tipset reports {cids} CIDs for {blocks} blocks")]
    CidCountMismatch { cids: usize, blocks: usize },
    #[error("blocks of one tipset disagree on height: {found} and {expected}")]
    BadEpoch { found: ChainEpoch, expected: ChainEpoch },
    #[error("blocks of one tipset disagree on parents")]
    BadParents,
    #[error("blocks of one tipset disagree on the parent state root")]
    BadStateRoot,
}

/// A non-empty set of blocks mined at one height on the same parents.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tipset {
    key: TipsetKey,
    headers: Vec<BlockHeader>,
}

impl Tipset {
    pub fn new(headers: Vec<BlockHeader>) -> Result<Self, CreateTipsetError> {
        let first = headers.first().ok_or(CreateTipsetError::Empty)?;
        for header in &headers[1..] {
            if header.epoch != first.epoch {
                return Err(CreateTipsetError::BadEpoch {
                    found: header.epoch,
                    expected: first.epoch,
                });
            }
            if header.parents != first.parents {
                return Err(CreateTipsetError::BadParents);
            }
            if header.state_root != first.state_root {
                return Err(CreateTipsetError::BadStateRoot);
            }
        }
        let headers: Vec<BlockHeader> = headers.into_iter().unique_by(|h| *h.cid()).collect();
        Ok(Self {
            key: headers.iter().map(|h| *h.cid()).collect(),
            headers,
        })
    }

    pub fn epoch(&self) -> ChainEpoch {
        self.first_block().epoch
    }

    pub fn key(&self) -> &TipsetKey {
        &self.key
    }

    pub fn cids(&self) -> &[Cid] {
        self.key.cids()
    }

    pub fn block_headers(&self) -> &[BlockHeader] {
        &self.headers
    }

    pub fn parents(&self) -> &TipsetKey {
        &self.first_block().parents
    }

    pub fn parent_state(&self) -> &Cid {
        &self.first_block().state_root
    }

    pub fn weight(&self) -> &BigInt {
        &self.first_block().weight
    }

    pub fn parent_base_fee(&self) -> &BigInt {
        &self.first_block().parent_base_fee
    }

    pub fn min_timestamp(&self) -> u64 {
        self.headers
            .iter()
            .map(|h| h.timestamp)
            .min()
            .unwrap_or_default()
    }

    fn first_block(&self) -> &BlockHeader {
        // `new` guarantees at least one header
        &self.headers[0]
    }
}

/// Per-height sync status as persisted by the sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TipsetState {
    Normal,
    /// No block was mined at this height.
    Null,
    /// A worker is still fetching this height. Never persisted.
    InProgress,
}

impl TipsetState {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Null => 1,
            Self::InProgress => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Normal,
            1 => Self::Null,
            2 => Self::InProgress,
            _ => return None,
        })
    }
}

/// The outcome of syncing one height.
///
/// A null round is its own record at the requested height. The tipset the node
/// returned instead (the nearest one below) is never relabelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedTipset {
    pub height: ChainEpoch,
    pub state: TipsetState,
    pub tipset: Option<Arc<Tipset>>,
}

impl SyncedTipset {
    pub fn normal(tipset: Arc<Tipset>) -> Self {
        Self {
            height: tipset.epoch(),
            state: TipsetState::Normal,
            tipset: Some(tipset),
        }
    }

    pub fn null(height: ChainEpoch) -> Self {
        Self {
            height,
            state: TipsetState::Null,
            tipset: None,
        }
    }

    pub fn in_progress(height: ChainEpoch) -> Self {
        Self {
            height,
            state: TipsetState::InProgress,
            tipset: None,
        }
    }
}

pub(crate) mod lotus_json {
    use super::*;
    use crate::lotus_json::*;
    use serde::{Deserialize, Serialize};

    impl HasLotusJson for TipsetKey {
        type LotusJson = <Vec<Cid> as HasLotusJson>::LotusJson;

        #[cfg(test)]
        fn snapshots() -> Vec<(serde_json::Value, Self)> {
            vec![(
                serde_json::json!([{"/": "baeaaaaa"}]),
                TipsetKey::from_iter([Cid::default()]),
            )]
        }

        fn into_lotus_json(self) -> Self::LotusJson {
            self.0.into_lotus_json()
        }

        fn from_lotus_json(lotus_json: Self::LotusJson) -> Self {
            Vec::<Cid>::from_lotus_json(lotus_json).into_iter().collect()
        }
    }

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct TipsetLotusJsonInner {
        cids: LotusJson<Vec<Cid>>,
        blocks: LotusJson<Vec<RawBlockHeader>>,
        height: ChainEpoch,
    }

    /// Lotus lists the block CIDs next to the headers, in the same order.
    #[derive(Clone, Serialize, Deserialize)]
    #[serde(try_from = "TipsetLotusJsonInner", into = "TipsetLotusJsonInner")]
    pub struct TipsetLotusJson(Tipset);

    impl TryFrom<TipsetLotusJsonInner> for TipsetLotusJson {
        type Error = CreateTipsetError;

        fn try_from(value: TipsetLotusJsonInner) -> Result<Self, Self::Error> {
            let TipsetLotusJsonInner { cids, blocks, .. } = value;
            let (cids, blocks) = (cids.into_inner(), blocks.into_inner());
            if cids.len() != blocks.len() {
                return Err(CreateTipsetError::CidCountMismatch {
                    cids: cids.len(),
                    blocks: blocks.len(),
                });
            }
            let headers = cids
                .into_iter()
                .zip(blocks)
                .map(|(cid, raw)| BlockHeader::new(cid, raw))
                .collect();
            Tipset::new(headers).map(Self)
        }
    }

    impl From<TipsetLotusJson> for TipsetLotusJsonInner {
        fn from(TipsetLotusJson(tipset): TipsetLotusJson) -> Self {
            let height = tipset.epoch();
            let (cids, blocks) = tipset
                .headers
                .into_iter()
                .map(|h| (*h.cid(), h.into_raw()))
                .unzip::<_, _, Vec<_>, Vec<_>>();
            Self {
                cids: cids.into(),
                blocks: blocks.into(),
                height,
            }
        }
    }

    impl HasLotusJson for Tipset {
        type LotusJson = TipsetLotusJson;

        #[cfg(test)]
        fn snapshots() -> Vec<(serde_json::Value, Self)> {
            unimplemented!("tipsets are tested via round-trips below")
        }

        fn into_lotus_json(self) -> Self::LotusJson {
            TipsetLotusJson(self)
        }

        fn from_lotus_json(TipsetLotusJson(tipset): Self::LotusJson) -> Self {
            tipset
        }
    }
}
