// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Sink payloads and their de-duplication keys.
//!
//! Payloads are snake_case JSON objects. CIDs and addresses are strings, token
//! amounts and powers decimal strings, and raw bytes base64.

use ::cid::Cid;
use base64::engine::{Engine as _, general_purpose::STANDARD};
use serde::Serialize;
use sha2::{Digest as _, Sha256};

use super::{PersistedTipset, SinkRecord};
use crate::blocks::{SyncedTipset, Tipset, TipsetKey};
use crate::message::{MessageExtended, ReceiptWithCid};
use crate::shim::{ChainEpoch, crypto::Signature};
use crate::state_diff::{ActorInfo, MinerInfoRecord, MinerSectorRecord, RewardActorRecord};

fn to_record(key: String, height: ChainEpoch, payload: impl Serialize) -> SinkRecord {
    SinkRecord {
        key,
        height,
        // plain structs of strings and numbers, serialization cannot fail
        payload: serde_json::to_value(payload).unwrap_or_default(),
    }
}

fn sha256_key(preimage: String) -> String {
    hex::encode(Sha256::digest(preimage.as_bytes()))
}

fn cid_strings(cids: &[Cid]) -> Vec<String> {
    cids.iter().map(Cid::to_string).collect()
}

#[derive(Serialize)]
struct TipsetPayload {
    height: ChainEpoch,
    parent_weight: Option<String>,
    parent_state: Option<String>,
    min_timestamp: Option<u64>,
    blocks: Vec<String>,
    parents: Vec<String>,
    state: u8,
}

/// Keyed by height. A null round carries no state of its own.
pub fn tipset_record(synced: &SyncedTipset) -> SinkRecord {
    let tipset = synced.tipset.as_deref();
    to_record(
        synced.height.to_string(),
        synced.height,
        TipsetPayload {
            height: synced.height,
            parent_weight: tipset.map(|ts| ts.weight().to_string()),
            parent_state: tipset.map(|ts| ts.parent_state().to_string()),
            min_timestamp: tipset.map(Tipset::min_timestamp),
            blocks: tipset.map(|ts| cid_strings(ts.cids())).unwrap_or_default(),
            parents: tipset
                .map(|ts| cid_strings(ts.parents().cids()))
                .unwrap_or_default(),
            state: synced.state.as_u8(),
        },
    )
}

#[derive(Serialize)]
struct BlockParents {
    cids: Vec<String>,
    state_root: String,
    weight: String,
    base_fee: String,
    message_receipts: String,
}

#[derive(Serialize)]
struct BlockPayload {
    cid: String,
    height: ChainEpoch,
    win_count: i64,
    miner: String,
    messages_cid: String,
    #[serde(with = "crate::lotus_json")]
    blocksig: Option<Signature>,
    #[serde(with = "crate::lotus_json")]
    bls_aggregate: Option<Signature>,
    block_time: u64,
    parents: BlockParents,
}

/// Keyed by block CID.
pub fn block_records(tipset: &Tipset) -> Vec<SinkRecord> {
    tipset
        .block_headers()
        .iter()
        .map(|header| {
            to_record(
                header.cid().to_string(),
                header.epoch,
                BlockPayload {
                    cid: header.cid().to_string(),
                    height: header.epoch,
                    win_count: header.win_count(),
                    miner: header.miner_address.to_string(),
                    messages_cid: header.messages.to_string(),
                    blocksig: header.signature.clone(),
                    bls_aggregate: header.bls_aggregate.clone(),
                    block_time: header.timestamp,
                    parents: BlockParents {
                        cids: cid_strings(header.parents.cids()),
                        state_root: header.state_root.to_string(),
                        weight: header.weight.to_string(),
                        base_fee: header.parent_base_fee.to_string(),
                        message_receipts: header.message_receipts.to_string(),
                    },
                },
            )
        })
        .collect()
}

#[derive(Serialize)]
struct MessagePayload {
    cid: String,
    height: ChainEpoch,
    block_cids: Vec<String>,
    method: u64,
    method_name: String,
    from: String,
    from_id: Option<String>,
    from_type: String,
    to: String,
    to_id: Option<String>,
    to_type: String,
    value: String,
    gas_limit: u64,
    gas_fee_cap: String,
    gas_premium: String,
    base_fee: String,
    params: String,
    block_time: u64,
}

/// Keyed by message CID.
pub fn message_records(messages: &[MessageExtended]) -> Vec<SinkRecord> {
    messages
        .iter()
        .map(|m| {
            to_record(
                m.cid.to_string(),
                m.height,
                MessagePayload {
                    cid: m.cid.to_string(),
                    height: m.height,
                    block_cids: m.block_cids.iter().map(Cid::to_string).collect(),
                    method: m.message.method_num,
                    method_name: m.method_name.clone(),
                    from: m.message.from.to_string(),
                    from_id: m.from_id.as_ref().map(ToString::to_string),
                    from_type: m.from_type.clone(),
                    to: m.message.to.to_string(),
                    to_id: m.to_id.as_ref().map(ToString::to_string),
                    to_type: m.to_type.clone(),
                    value: m.message.value.to_string(),
                    gas_limit: m.message.gas_limit,
                    gas_fee_cap: m.message.gas_fee_cap.to_string(),
                    gas_premium: m.message.gas_premium.to_string(),
                    base_fee: m.parent_base_fee.to_string(),
                    params: STANDARD.encode(&m.message.params),
                    block_time: m.timestamp,
                },
            )
        })
        .collect()
}

#[derive(Serialize)]
struct ReceiptPayload {
    cid: String,
    gas_used: u64,
    exit_code: i64,
    #[serde(rename = "return")]
    return_data: String,
}

/// Keyed by the CID of the message the receipt belongs to. `height` is the
/// tipset whose parent state produced the receipts.
pub fn receipt_records(height: ChainEpoch, receipts: &[ReceiptWithCid]) -> Vec<SinkRecord> {
    receipts
        .iter()
        .map(|r| {
            to_record(
                r.cid.to_string(),
                height,
                ReceiptPayload {
                    cid: r.cid.to_string(),
                    gas_used: r.receipt.gas_used,
                    exit_code: r.receipt.exit_code,
                    return_data: STANDARD.encode(&r.receipt.return_data),
                },
            )
        })
        .collect()
}

#[derive(Serialize)]
struct ActorPayload {
    actor_state_key: String,
    actor_code: String,
    actor_head: String,
    nonce: u64,
    balance: String,
    state_root: String,
    height: ChainEpoch,
    ts_key: String,
    parent_ts_key: String,
    addr: String,
    state: String,
    deleted: bool,
}

/// Unique per address and tipset.
pub fn actor_state_key(info: &ActorInfo) -> String {
    sha256_key(format!("{}_{}", info.address, info.tipset_key))
}

pub fn actor_records(actors: &[ActorInfo]) -> Vec<SinkRecord> {
    actors
        .iter()
        .map(|info| {
            let key = actor_state_key(info);
            to_record(
                key.clone(),
                info.height,
                ActorPayload {
                    actor_state_key: key,
                    actor_code: info.actor.code.to_string(),
                    actor_head: info.actor.head.to_string(),
                    nonce: info.actor.nonce,
                    balance: info.actor.balance.to_string(),
                    state_root: info.state_root.to_string(),
                    height: info.height,
                    ts_key: info.tipset_key.to_string(),
                    parent_ts_key: info.parent_tipset_key.to_string(),
                    addr: info.address.to_string(),
                    state: info.state.clone(),
                    deleted: info.deleted,
                },
            )
        })
        .collect()
}

#[derive(Serialize)]
struct MinerInfoPayload {
    miner_info_key: String,
    miner: String,
    owner: String,
    worker: String,
    control_addresses: Vec<String>,
    new_worker_address: Option<String>,
    new_worker_effective_at: Option<ChainEpoch>,
    peer_id: Option<String>,
    multiaddrs: Vec<String>,
    sector_size: u64,
    window_post_partition_sectors: u64,
    miner_raw_byte_power: Option<String>,
    miner_quality_adj_power: Option<String>,
    total_raw_byte_power: Option<String>,
    total_quality_adj_power: Option<String>,
    height: ChainEpoch,
}

pub fn miner_info_records(miners: &[MinerInfoRecord]) -> Vec<SinkRecord> {
    miners
        .iter()
        .map(|record| {
            let key = sha256_key(format!("{}_{}", record.miner, record.height));
            let info = &record.info;
            let power = record.power.as_ref();
            to_record(
                key.clone(),
                record.height,
                MinerInfoPayload {
                    miner_info_key: key,
                    miner: record.miner.to_string(),
                    owner: info.owner.to_string(),
                    worker: info.worker.to_string(),
                    control_addresses: info.control_addresses.iter().map(ToString::to_string).collect(),
                    new_worker_address: info.new_worker_address().map(ToString::to_string),
                    new_worker_effective_at: info
                        .pending_worker_key
                        .as_ref()
                        .map(|key| key.effective_at)
                        .or(info.new_worker.is_some().then_some(info.worker_change_epoch)),
                    peer_id: info.peer_id.clone(),
                    multiaddrs: info.multiaddrs.iter().map(|a| STANDARD.encode(a)).collect(),
                    sector_size: info.sector_size,
                    window_post_partition_sectors: info.window_post_partition_sectors,
                    miner_raw_byte_power: power.map(|p| p.miner_power.raw_byte_power.to_string()),
                    miner_quality_adj_power: power
                        .map(|p| p.miner_power.quality_adj_power.to_string()),
                    total_raw_byte_power: power.map(|p| p.total_power.raw_byte_power.to_string()),
                    total_quality_adj_power: power
                        .map(|p| p.total_power.quality_adj_power.to_string()),
                    height: record.height,
                },
            )
        })
        .collect()
}

#[derive(Serialize)]
struct MinerSectorPayload {
    miner_sector_key: String,
    sector_number: u64,
    seal_proof: i64,
    sealed_cid: String,
    deal_ids: Vec<u64>,
    activation: ChainEpoch,
    expiration: ChainEpoch,
    deal_weight: String,
    verified_deal_weight: String,
    initial_pledge: String,
    expected_day_reward: String,
    expected_storage_pledge: String,
    miner: String,
    height: ChainEpoch,
}

pub fn miner_sector_records(sectors: &[MinerSectorRecord]) -> Vec<SinkRecord> {
    sectors
        .iter()
        .map(|record| {
            let sector = &record.sector;
            let key = sha256_key(format!(
                "{}_{}_{}",
                record.miner, sector.sector_number, record.height
            ));
            to_record(
                key.clone(),
                record.height,
                MinerSectorPayload {
                    miner_sector_key: key,
                    sector_number: sector.sector_number,
                    seal_proof: sector.seal_proof,
                    sealed_cid: sector.sealed_cid.to_string(),
                    deal_ids: sector.deal_ids.clone(),
                    activation: sector.activation,
                    expiration: sector.expiration,
                    deal_weight: sector.deal_weight.to_string(),
                    verified_deal_weight: sector.verified_deal_weight.to_string(),
                    initial_pledge: sector.initial_pledge.to_string(),
                    expected_day_reward: sector.expected_day_reward.to_string(),
                    expected_storage_pledge: sector.expected_storage_pledge.to_string(),
                    miner: record.miner.to_string(),
                    height: record.height,
                },
            )
        })
        .collect()
}

#[derive(Serialize)]
struct RewardPayload {
    epoch: ChainEpoch,
    actor_code: String,
    actor_head: String,
    nonce: u64,
    balance: String,
    state_root: String,
    ts_key: String,
    parent_ts_key: String,
    addr: String,
    cumsum_baseline: String,
    cumsum_realized: String,
    effective_baseline_power: String,
    effective_network_time: i64,
    this_epoch_baseline_power: String,
    this_epoch_reward: String,
    total_mined: String,
    simple_total: String,
    baseline_total: String,
    total_storage_power_reward: String,
    this_epoch_reward_smoothed_position_estimate: String,
    this_epoch_reward_smoothed_velocity_estimate: String,
}

/// Keyed by the epoch recorded in the reward state.
pub fn reward_record(reward: &RewardActorRecord) -> SinkRecord {
    let state = &reward.state;
    to_record(
        state.epoch.to_string(),
        reward.height,
        RewardPayload {
            epoch: state.epoch,
            actor_code: reward.actor.code.to_string(),
            actor_head: reward.actor.head.to_string(),
            nonce: reward.actor.nonce,
            balance: reward.actor.balance.to_string(),
            state_root: reward.state_root.to_string(),
            ts_key: reward.tipset_key.to_string(),
            parent_ts_key: reward.parent_tipset_key.to_string(),
            addr: reward.address.to_string(),
            cumsum_baseline: state.cumsum_baseline.to_string(),
            cumsum_realized: state.cumsum_realized.to_string(),
            effective_baseline_power: state.effective_baseline_power.to_string(),
            effective_network_time: state.effective_network_time,
            this_epoch_baseline_power: state.this_epoch_baseline_power.to_string(),
            this_epoch_reward: state.this_epoch_reward.to_string(),
            total_mined: state.total_mined.to_string(),
            simple_total: state.simple_total.to_string(),
            baseline_total: state.baseline_total.to_string(),
            total_storage_power_reward: state.total_storage_power_reward.to_string(),
            this_epoch_reward_smoothed_position_estimate: state
                .this_epoch_reward_smoothed_position_estimate
                .to_string(),
            this_epoch_reward_smoothed_velocity_estimate: state
                .this_epoch_reward_smoothed_velocity_estimate
                .to_string(),
        },
    )
}

#[derive(Serialize)]
struct RevertPayload {
    height: ChainEpoch,
    ts_key: String,
    blocks: Vec<String>,
}

/// Keyed by height, tells the sink the tipset is no longer canonical.
pub fn revert_record(tipset: &Tipset) -> SinkRecord {
    to_revert_record(tipset.epoch(), tipset.key(), tipset.cids())
}

/// [`revert_record`] for a tipset only known from what was persisted.
pub fn persisted_revert_record(persisted: &PersistedTipset) -> SinkRecord {
    let key = TipsetKey::from_iter(persisted.blocks.iter().copied());
    to_revert_record(persisted.height, &key, &persisted.blocks)
}

fn to_revert_record(height: ChainEpoch, key: &TipsetKey, blocks: &[Cid]) -> SinkRecord {
    to_record(
        height.to_string(),
        height,
        RevertPayload {
            height,
            ts_key: key.to_string(),
            blocks: cid_strings(blocks),
        },
    )
}
