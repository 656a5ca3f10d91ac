// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{fmt, sync::Arc};

use ::cid::Cid;
use num::BigInt;
use serde::{Deserialize, Serialize};

use crate::blocks::Tipset;
use crate::lotus_json::{HasLotusJson, LotusJson, lotus_json_with_self};
use crate::shim::{ChainEpoch, address::Address};

/// The header of an actor in the state tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActorState {
    #[serde(with = "crate::lotus_json")]
    pub code: Cid,
    #[serde(with = "crate::lotus_json")]
    pub head: Cid,
    pub nonce: u64,
    #[serde(with = "crate::lotus_json")]
    pub balance: BigInt,
}

/// `Filecoin.StateReadState`. The decoded state is actor specific and kept as
/// JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadState {
    #[serde(with = "crate::lotus_json", default)]
    pub balance: BigInt,
    #[serde(with = "crate::lotus_json", default)]
    pub code: Option<Cid>,
    #[serde(default)]
    pub state: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkerKeyChange {
    #[serde(with = "crate::lotus_json")]
    pub new_worker: Address,
    pub effective_at: ChainEpoch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MinerInfo {
    #[serde(with = "crate::lotus_json")]
    pub owner: Address,
    #[serde(with = "crate::lotus_json")]
    pub worker: Address,
    #[serde(with = "crate::lotus_json", default)]
    pub new_worker: Option<Address>,
    #[serde(with = "crate::lotus_json", default)]
    pub control_addresses: Vec<Address>,
    #[serde(default)]
    pub worker_change_epoch: ChainEpoch,
    /// Older nodes report a pending worker change here instead of `NewWorker`.
    #[serde(default)]
    pub pending_worker_key: Option<WorkerKeyChange>,
    #[serde(default)]
    pub peer_id: Option<String>,
    #[serde(with = "crate::lotus_json", default)]
    pub multiaddrs: Vec<Vec<u8>>,
    pub sector_size: u64,
    #[serde(rename = "WindowPoStPartitionSectors")]
    pub window_post_partition_sectors: u64,
}

impl MinerInfo {
    /// The pending worker address, whichever field the node used.
    pub fn new_worker_address(&self) -> Option<&Address> {
        self.new_worker
            .as_ref()
            .or(self.pending_worker_key.as_ref().map(|key| &key.new_worker))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerClaim {
    #[serde(with = "crate::lotus_json")]
    pub raw_byte_power: BigInt,
    #[serde(with = "crate::lotus_json")]
    pub quality_adj_power: BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MinerPower {
    pub miner_power: PowerClaim,
    pub total_power: PowerClaim,
    #[serde(default)]
    pub has_min_power: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SectorOnChainInfo {
    pub sector_number: u64,
    pub seal_proof: i64,
    #[serde(rename = "SealedCID", with = "crate::lotus_json")]
    pub sealed_cid: Cid,
    #[serde(rename = "DealIDs", with = "crate::lotus_json", default)]
    pub deal_ids: Vec<u64>,
    pub activation: ChainEpoch,
    pub expiration: ChainEpoch,
    #[serde(with = "crate::lotus_json")]
    pub deal_weight: BigInt,
    #[serde(with = "crate::lotus_json")]
    pub verified_deal_weight: BigInt,
    #[serde(with = "crate::lotus_json")]
    pub initial_pledge: BigInt,
    #[serde(with = "crate::lotus_json")]
    pub expected_day_reward: BigInt,
    #[serde(with = "crate::lotus_json")]
    pub expected_storage_pledge: BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Addrs", default)]
    pub addrs: Vec<String>,
}

lotus_json_with_self!(
    ActorState,
    ReadState,
    MinerInfo,
    MinerPower,
    SectorOnChainInfo,
    PeerInfo,
);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeadChangeType {
    /// The head at subscription time, sent once.
    Current,
    Apply,
    Revert,
    Unknown(String),
}

impl From<String> for HeadChangeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "current" => Self::Current,
            "apply" => Self::Apply,
            "revert" => Self::Revert,
            _ => Self::Unknown(value),
        }
    }
}

impl fmt::Display for HeadChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Current => "current",
            Self::Apply => "apply",
            Self::Revert => "revert",
            Self::Unknown(other) => other,
        })
    }
}

/// One event of `Filecoin.ChainNotify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadChange {
    pub kind: HeadChangeType,
    pub tipset: Arc<Tipset>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeadChangeLotusJson {
    r#type: String,
    val: LotusJson<Tipset>,
}

impl HasLotusJson for HeadChange {
    type LotusJson = HeadChangeLotusJson;

    #[cfg(test)]
    fn snapshots() -> Vec<(serde_json::Value, Self)> {
        unimplemented!("head changes are tested below")
    }

    fn into_lotus_json(self) -> Self::LotusJson {
        HeadChangeLotusJson {
            r#type: self.kind.to_string(),
            val: Arc::unwrap_or_clone(self.tipset).into(),
        }
    }

    fn from_lotus_json(HeadChangeLotusJson { r#type, val }: Self::LotusJson) -> Self {
        Self {
            kind: r#type.into(),
            tipset: Arc::new(val.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::tipset_at;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn actor_state() {
        let actor = ActorState::from_lotus_json_value(json!({
            "Code": {"/": "baeaaaaa"},
            "Head": {"/": "baeaaaaa"},
            "Nonce": 3,
            "Balance": "1000",
            "Address": "f01000",
        }))
        .unwrap();
        assert_eq!(actor.nonce, 3);
        assert_eq!(actor.balance, BigInt::from(1000));
    }

    #[test]
    fn miner_info_with_nulls() {
        let info = MinerInfo::from_lotus_json_value(json!({
            "Owner": "f0100",
            "Worker": "f0101",
            "NewWorker": null,
            "ControlAddresses": null,
            "PeerId": null,
            "Multiaddrs": null,
            "SectorSize": 34359738368_u64,
            "WindowPoStPartitionSectors": 2349,
        }))
        .unwrap();
        assert_eq!(info.worker.to_string(), "f0101");
        assert!(info.control_addresses.is_empty());
        assert_eq!(info.new_worker_address(), None);
        assert_eq!(info.window_post_partition_sectors, 2349);
    }

    #[test]
    fn legacy_pending_worker_key() {
        let info = MinerInfo::from_lotus_json_value(json!({
            "Owner": "f0100",
            "Worker": "f0101",
            "PendingWorkerKey": {"NewWorker": "f0102", "EffectiveAt": 10},
            "Multiaddrs": ["aGVsbG8="],
            "SectorSize": 2048,
            "WindowPoStPartitionSectors": 2,
        }))
        .unwrap();
        assert_eq!(info.new_worker_address().unwrap().to_string(), "f0102");
        assert_eq!(info.multiaddrs, vec![b"hello".to_vec()]);
    }

    #[test]
    fn head_change_types() {
        assert_eq!(HeadChangeType::from("apply".to_owned()), HeadChangeType::Apply);
        assert_eq!(
            HeadChangeType::from("split".to_owned()),
            HeadChangeType::Unknown("split".into())
        );
        assert_eq!(HeadChangeType::Revert.to_string(), "revert");
    }

    #[test]
    fn head_change_round_trip() {
        let change = HeadChange {
            kind: HeadChangeType::Current,
            tipset: Arc::new(tipset_at(12, 2)),
        };
        let value = change.clone().into_lotus_json_value().unwrap();
        assert_eq!(value["Type"], json!("current"));
        assert_eq!(value["Val"]["Height"], json!(12));
        assert_eq!(HeadChange::from_lotus_json_value(value).unwrap(), change);
    }
}
