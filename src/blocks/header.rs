// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::ops::Deref;

use crate::blocks::TipsetKey;
use crate::lotus_json::{HasLotusJson, LotusJson, lotus_json_with_self};
use crate::shim::{ChainEpoch, address::Address, crypto::Signature};
use ::cid::Cid;
use num::BigInt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ticket {
    #[serde(rename = "VRFProof", with = "crate::lotus_json")]
    pub vrfproof: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ElectionProof {
    pub win_count: i64,
    #[serde(rename = "VRFProof", with = "crate::lotus_json")]
    pub vrfproof: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BeaconEntry {
    pub round: u64,
    #[serde(with = "crate::lotus_json")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoStProof {
    pub po_st_proof: i64,
    #[serde(with = "crate::lotus_json")]
    pub proof_bytes: Vec<u8>,
}

lotus_json_with_self!(Ticket, ElectionProof, BeaconEntry, PoStProof);

/// Header fields as the node reports them. Lotus JSON does not carry the
/// block's own CID, see [`BlockHeader`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBlockHeader {
    pub miner_address: Address,
    pub ticket: Option<Ticket>,
    pub election_proof: Option<ElectionProof>,
    pub beacon_entries: Vec<BeaconEntry>,
    pub winning_post_proof: Vec<PoStProof>,
    pub parents: TipsetKey,
    pub weight: BigInt,
    pub epoch: ChainEpoch,
    pub state_root: Cid,
    pub message_receipts: Cid,
    pub messages: Cid,
    pub bls_aggregate: Option<Signature>,
    pub timestamp: u64,
    pub signature: Option<Signature>,
    pub fork_signal: u64,
    pub parent_base_fee: BigInt,
}

/// A block header paired with the CID the node addressed it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    cid: Cid,
    raw: RawBlockHeader,
}

impl Deref for BlockHeader {
    type Target = RawBlockHeader;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl BlockHeader {
    pub fn new(cid: Cid, raw: RawBlockHeader) -> Self {
        Self { cid, raw }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn into_raw(self) -> RawBlockHeader {
        self.raw
    }

    pub fn win_count(&self) -> i64 {
        self.election_proof
            .as_ref()
            .map(|proof| proof.win_count)
            .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockHeaderLotusJson {
    miner: LotusJson<Address>,
    #[serde(skip_serializing_if = "LotusJson::is_none", default)]
    ticket: LotusJson<Option<Ticket>>,
    #[serde(skip_serializing_if = "LotusJson::is_none", default)]
    election_proof: LotusJson<Option<ElectionProof>>,
    #[serde(default)]
    beacon_entries: LotusJson<Vec<BeaconEntry>>,
    #[serde(rename = "WinPoStProof", default)]
    win_po_st_proof: LotusJson<Vec<PoStProof>>,
    parents: LotusJson<TipsetKey>,
    parent_weight: LotusJson<BigInt>,
    height: ChainEpoch,
    parent_state_root: LotusJson<Cid>,
    parent_message_receipts: LotusJson<Cid>,
    messages: LotusJson<Cid>,
    #[serde(
        rename = "BLSAggregate",
        skip_serializing_if = "LotusJson::is_none",
        default
    )]
    bls_aggregate: LotusJson<Option<Signature>>,
    timestamp: u64,
    #[serde(skip_serializing_if = "LotusJson::is_none", default)]
    block_sig: LotusJson<Option<Signature>>,
    #[serde(default)]
    fork_signaling: u64,
    parent_base_fee: LotusJson<BigInt>,
}

impl HasLotusJson for RawBlockHeader {
    type LotusJson = BlockHeaderLotusJson;

    #[cfg(test)]
    fn snapshots() -> Vec<(serde_json::Value, Self)> {
        use serde_json::json;

        vec![(
            json!({
                "Miner": "f01000",
                "ElectionProof": {"WinCount": 2, "VRFProof": "aGVsbG8="},
                "BeaconEntries": null,
                "WinPoStProof": null,
                "Parents": [{"/": "baeaaaaa"}],
                "ParentWeight": "1234",
                "Height": 10,
                "ParentStateRoot": {"/": "baeaaaaa"},
                "ParentMessageReceipts": {"/": "baeaaaaa"},
                "Messages": {"/": "baeaaaaa"},
                "Timestamp": 1598306400,
                "ForkSignaling": 0,
                "ParentBaseFee": "100",
            }),
            RawBlockHeader {
                miner_address: Address::new_id(1000),
                election_proof: Some(ElectionProof {
                    win_count: 2,
                    vrfproof: b"hello".to_vec(),
                }),
                parents: TipsetKey::from_iter([Cid::default()]),
                weight: BigInt::from(1234),
                epoch: 10,
                timestamp: 1598306400,
                parent_base_fee: BigInt::from(100),
                ..Default::default()
            },
        )]
    }

    fn into_lotus_json(self) -> Self::LotusJson {
        let Self {
            miner_address,
            ticket,
            election_proof,
            beacon_entries,
            winning_post_proof,
            parents,
            weight,
            epoch,
            state_root,
            message_receipts,
            messages,
            bls_aggregate,
            timestamp,
            signature,
            fork_signal,
            parent_base_fee,
        } = self;
        Self::LotusJson {
            miner: miner_address.into(),
            ticket: ticket.into(),
            election_proof: election_proof.into(),
            beacon_entries: beacon_entries.into(),
            win_po_st_proof: winning_post_proof.into(),
            parents: parents.into(),
            parent_weight: weight.into(),
            height: epoch,
            parent_state_root: state_root.into(),
            parent_message_receipts: message_receipts.into(),
            messages: messages.into(),
            bls_aggregate: bls_aggregate.into(),
            timestamp,
            block_sig: signature.into(),
            fork_signaling: fork_signal,
            parent_base_fee: parent_base_fee.into(),
        }
    }

    fn from_lotus_json(lotus_json: Self::LotusJson) -> Self {
        let Self::LotusJson {
            miner,
            ticket,
            election_proof,
            beacon_entries,
            win_po_st_proof,
            parents,
            parent_weight,
            height,
            parent_state_root,
            parent_message_receipts,
            messages,
            bls_aggregate,
            timestamp,
            block_sig,
            fork_signaling,
            parent_base_fee,
        } = lotus_json;
        Self {
            miner_address: miner.into_inner(),
            ticket: ticket.into_inner(),
            election_proof: election_proof.into_inner(),
            beacon_entries: beacon_entries.into_inner(),
            winning_post_proof: win_po_st_proof.into_inner(),
            parents: parents.into_inner(),
            weight: parent_weight.into_inner(),
            epoch: height,
            state_root: parent_state_root.into_inner(),
            message_receipts: parent_message_receipts.into_inner(),
            messages: messages.into_inner(),
            bls_aggregate: bls_aggregate.into_inner(),
            timestamp,
            signature: block_sig.into_inner(),
            fork_signal: fork_signaling,
            parent_base_fee: parent_base_fee.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lotus_json::assert_all_snapshots;

    #[test]
    fn snapshots() {
        assert_all_snapshots::<RawBlockHeader>();
    }

    #[test]
    fn win_count_defaults_to_zero() {
        let header = BlockHeader::new(Cid::default(), RawBlockHeader::default());
        assert_eq!(header.win_count(), 0);
    }
}
