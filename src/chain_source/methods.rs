// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Lotus JSON-RPC methods used by the indexer, as [`RpcRequest`] builders.

use ::cid::Cid;
use serde_json::Value;

use super::types::{ActorState, MinerInfo, MinerPower, PeerInfo, ReadState, SectorOnChainInfo};
use crate::blocks::{Tipset, TipsetKey};
use crate::message::{BlockMessages, ParentMessage, Receipt};
use crate::shim::{ChainEpoch, address::Address};
use crate::transport::RpcRequest;

pub const CHAIN_HEAD: &str = "Filecoin.ChainHead";
pub const CHAIN_GET_GENESIS: &str = "Filecoin.ChainGetGenesis";
pub const CHAIN_GET_TIPSET_BY_HEIGHT: &str = "Filecoin.ChainGetTipSetByHeight";
pub const CHAIN_GET_TIPSET: &str = "Filecoin.ChainGetTipSet";
pub const CHAIN_GET_BLOCK_MESSAGES: &str = "Filecoin.ChainGetBlockMessages";
pub const CHAIN_GET_PARENT_MESSAGES: &str = "Filecoin.ChainGetParentMessages";
pub const CHAIN_GET_PARENT_RECEIPTS: &str = "Filecoin.ChainGetParentReceipts";
pub const CHAIN_HAS_OBJ: &str = "Filecoin.ChainHasObj";
pub const CHAIN_NOTIFY: &str = "Filecoin.ChainNotify";
pub const STATE_GET_ACTOR: &str = "Filecoin.StateGetActor";
pub const STATE_CHANGED_ACTORS: &str = "Filecoin.StateChangedActors";
pub const STATE_READ_STATE: &str = "Filecoin.StateReadState";
pub const STATE_LIST_MINERS: &str = "Filecoin.StateListMiners";
pub const STATE_MINER_INFO: &str = "Filecoin.StateMinerInfo";
pub const STATE_MINER_POWER: &str = "Filecoin.StateMinerPower";
pub const STATE_MINER_SECTORS: &str = "Filecoin.StateMinerSectors";
pub const STATE_LOOKUP_ID: &str = "Filecoin.StateLookupID";
pub const STATE_ACCOUNT_KEY: &str = "Filecoin.StateAccountKey";
pub const STATE_NETWORK_NAME: &str = "Filecoin.StateNetworkName";
pub const STATE_NETWORK_VERSION: &str = "Filecoin.StateNetworkVersion";
pub const STATE_ACTOR_CODE_CIDS: &str = "Filecoin.StateActorCodeCIDs";
pub const NET_PEERS: &str = "Filecoin.NetPeers";

/// Part of the node's error when asked for a height above its head.
pub const HEIGHT_NOT_REACHED: &str = "looking for tipset with height greater than start point";

pub fn chain_head_req() -> RpcRequest<Tipset> {
    RpcRequest::new(CHAIN_HEAD, ())
}

pub fn chain_get_genesis_req() -> RpcRequest<Tipset> {
    RpcRequest::new(CHAIN_GET_GENESIS, ())
}

// Get the tipset at `epoch`, or the nearest one below if it is a null round.
// An empty key searches from the heaviest tipset.
pub fn chain_get_tipset_by_height_req(epoch: ChainEpoch, head: TipsetKey) -> RpcRequest<Tipset> {
    RpcRequest::new(CHAIN_GET_TIPSET_BY_HEIGHT, (epoch, head))
}

pub fn chain_get_tipset_req(key: TipsetKey) -> RpcRequest<Tipset> {
    RpcRequest::new(CHAIN_GET_TIPSET, (key,))
}

pub fn chain_get_block_messages_req(block: Cid) -> RpcRequest<BlockMessages> {
    RpcRequest::new(CHAIN_GET_BLOCK_MESSAGES, (block,))
}

pub fn chain_get_parent_messages_req(block: Cid) -> RpcRequest<Vec<ParentMessage>> {
    RpcRequest::new(CHAIN_GET_PARENT_MESSAGES, (block,))
}

pub fn chain_get_parent_receipts_req(block: Cid) -> RpcRequest<Vec<Receipt>> {
    RpcRequest::new(CHAIN_GET_PARENT_RECEIPTS, (block,))
}

pub fn chain_has_obj_req(cid: Cid) -> RpcRequest<bool> {
    RpcRequest::new(CHAIN_HAS_OBJ, (cid,))
}

pub fn chain_notify_req() -> RpcRequest {
    RpcRequest::new(CHAIN_NOTIFY, ())
}

pub fn state_get_actor_req(address: Address, tsk: TipsetKey) -> RpcRequest<Option<ActorState>> {
    RpcRequest::new(STATE_GET_ACTOR, (address, tsk))
}

/// The result maps address strings to [`ActorState`]s.
pub fn state_changed_actors_req(from: Cid, to: Cid) -> RpcRequest<Value> {
    RpcRequest::new(STATE_CHANGED_ACTORS, (from, to))
}

pub fn state_read_state_req(address: Address, tsk: TipsetKey) -> RpcRequest<ReadState> {
    RpcRequest::new(STATE_READ_STATE, (address, tsk))
}

pub fn state_list_miners_req(tsk: TipsetKey) -> RpcRequest<Vec<Address>> {
    RpcRequest::new(STATE_LIST_MINERS, (tsk,))
}

pub fn state_miner_info_req(miner: Address, tsk: TipsetKey) -> RpcRequest<MinerInfo> {
    RpcRequest::new(STATE_MINER_INFO, (miner, tsk))
}

pub fn state_miner_power_req(miner: Address, tsk: TipsetKey) -> RpcRequest<MinerPower> {
    RpcRequest::new(STATE_MINER_POWER, (miner, tsk))
}

/// All sectors, no sector number filter.
pub fn state_miner_sectors_req(
    miner: Address,
    tsk: TipsetKey,
) -> RpcRequest<Vec<SectorOnChainInfo>> {
    RpcRequest::new(STATE_MINER_SECTORS, (miner, None::<Value>, tsk))
}

pub fn state_lookup_id_req(address: Address, tsk: TipsetKey) -> RpcRequest<Address> {
    RpcRequest::new(STATE_LOOKUP_ID, (address, tsk))
}

pub fn state_account_key_req(address: Address, tsk: TipsetKey) -> RpcRequest<Address> {
    RpcRequest::new(STATE_ACCOUNT_KEY, (address, tsk))
}

pub fn state_network_name_req() -> RpcRequest<String> {
    RpcRequest::new(STATE_NETWORK_NAME, ())
}

pub fn state_network_version_req(tsk: TipsetKey) -> RpcRequest<u32> {
    RpcRequest::new(STATE_NETWORK_VERSION, (tsk,))
}

/// The result maps actor names to code CIDs.
pub fn state_actor_code_cids_req(network_version: u32) -> RpcRequest<Value> {
    RpcRequest::new(STATE_ACTOR_CODE_CIDS, (network_version,))
}

pub fn net_peers_req() -> RpcRequest<Vec<PeerInfo>> {
    RpcRequest::new(NET_PEERS, ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cid_of;
    use serde_json::json;

    #[test]
    fn tipset_by_height_searches_from_the_head() {
        let request = chain_get_tipset_by_height_req(42, TipsetKey::default());
        assert_eq!(request.method_name, "Filecoin.ChainGetTipSetByHeight");
        assert_eq!(request.params, json!([42, null]));
    }

    #[test]
    fn miner_sectors_has_no_filter() {
        let miner: Address = "f01000".parse().unwrap();
        let tsk = TipsetKey::from_iter([cid_of("b")]);
        let request = state_miner_sectors_req(miner, tsk);
        assert_eq!(request.params[0], json!("f01000"));
        assert_eq!(request.params[1], json!(null));
        assert_eq!(request.params[2], json!([{"/": cid_of("b").to_string()}]));
    }

    #[test]
    fn no_params_is_an_empty_list() {
        assert_eq!(chain_head_req().params, json!([]));
        assert_eq!(chain_notify_req().params, json!([]));
    }
}
