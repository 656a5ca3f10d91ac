// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod mock_chain;

pub use mock_chain::MockChain;

use std::sync::Arc;

use ::cid::{Cid, multihash::Multihash};
use serde_json::Value;

use crate::blocks::{BlockHeader, RawBlockHeader, Tipset, TipsetKey};
use crate::chain_source::{HeadChange, HeadChangeType};
use crate::lotus_json::HasLotusJson as _;
use crate::shim::{ChainEpoch, address::Address};

/// A CID that is unique per `name`.
pub fn cid_of(name: &str) -> Cid {
    const DAG_CBOR: u64 = 0x71;
    Cid::new_v1(DAG_CBOR, Multihash::<64>::wrap(0x00, name.as_bytes()).unwrap())
}

/// A tipset of `blocks` blocks. Block CIDs are derived from `tag`, the height
/// and the block index.
pub fn build_tipset(
    height: ChainEpoch,
    blocks: usize,
    parents: TipsetKey,
    state_root: Cid,
    tag: &str,
) -> Tipset {
    let headers = (0..blocks)
        .map(|i| {
            BlockHeader::new(
                cid_of(&format!("block-{tag}{height}-{i}")),
                RawBlockHeader {
                    miner_address: Address::new_id(1000 + i as u64),
                    parents: parents.clone(),
                    weight: height.into(),
                    epoch: height,
                    state_root,
                    message_receipts: cid_of(&format!("receipts-{tag}{height}")),
                    messages: cid_of(&format!("messages-{tag}{height}-{i}")),
                    timestamp: 30 * height as u64 + i as u64,
                    parent_base_fee: 100.into(),
                    ..Default::default()
                },
            )
        })
        .collect();
    Tipset::new(headers).unwrap()
}

/// A free-standing tipset at `height`.
pub fn tipset_at(height: ChainEpoch, blocks: usize) -> Tipset {
    build_tipset(
        height,
        blocks,
        TipsetKey::from_iter([cid_of(&format!("parent-{}", height - 1))]),
        cid_of(&format!("state-{height}")),
        "",
    )
}

/// A `Filecoin.ChainNotify` value frame.
pub fn head_change_frame(kind: &str, tipsets: &[Arc<Tipset>]) -> Value {
    tipsets
        .iter()
        .map(|tipset| HeadChange {
            kind: HeadChangeType::from(kind.to_owned()),
            tipset: tipset.clone(),
        })
        .collect::<Vec<_>>()
        .into_lotus_json_value()
        .unwrap()
}
