// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{collections::BTreeMap, sync::Arc};

use ::cid::Cid;
use ahash::HashMap;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{
    ActorRegistry, ActorState, AddressResolver, ChainSource, ChainSourceError, HeadChanges,
    MinerInfo, MinerPower, PeerInfo, ReadState, SectorOnChainInfo, TipsetLookup, methods::*,
};
use crate::blocks::{Tipset, TipsetKey};
use crate::lotus_json::{HasLotusJson, LotusJson};
use crate::message::{BlockMessages, ParentMessage, Receipt};
use crate::shim::{ChainEpoch, address::Address};
use crate::transport::{HttpClient, RpcRequest, RpcTransport, TransportError, WsPool};

/// [`ChainSource`] backed by a Lotus-compatible node.
///
/// Chain and state queries go through `transport`. Node information prefers
/// the HTTP client, when one is configured.
pub struct LotusChainSource<T = WsPool> {
    transport: T,
    http: Option<HttpClient>,
    resolver: AddressResolver,
    actors: ActorRegistry,
}

impl<T: RpcTransport> LotusChainSource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            http: None,
            resolver: AddressResolver::default(),
            actors: ActorRegistry::default(),
        }
    }

    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Performs `request` and decodes its result. Failures are logged with the
    /// method name.
    pub async fn call<R: HasLotusJson>(&self, request: RpcRequest<R>) -> Result<R, ChainSourceError> {
        let method = request.method_name;
        let result = self.transport.call(request.lower()).await.inspect_err(|e| {
            error!(method, "{e}");
        })?;
        decode(method, result)
    }

    async fn call_http<R: HasLotusJson>(
        &self,
        request: RpcRequest<R>,
    ) -> Result<R, ChainSourceError> {
        let Some(http) = &self.http else {
            return self.call(request).await;
        };
        let method = request.method_name;
        let result = http.call(request.lower()).await?;
        decode(method, result)
    }

    pub async fn network_name(&self) -> Result<String, ChainSourceError> {
        self.call_http(state_network_name_req()).await
    }

    pub async fn network_version(&self) -> Result<u32, ChainSourceError> {
        self.call_http(state_network_version_req(TipsetKey::default())).await
    }

    pub async fn net_peers(&self) -> Result<Vec<PeerInfo>, ChainSourceError> {
        self.call_http(net_peers_req()).await
    }

    /// Teaches the actor registry the code CIDs of the current network
    /// version. Returns how many codes the node reported.
    pub async fn load_actor_codes(&self) -> Result<usize, ChainSourceError> {
        let version = self.network_version().await?;
        let codes: HashMap<String, LotusJson<Cid>> =
            decode_json(STATE_ACTOR_CODE_CIDS, self.call(state_actor_code_cids_req(version)).await?)?;
        let count = codes.len();
        for (name, code) in codes {
            self.actors.register(name, code.into_inner());
        }
        info!(network_version = version, count, "loaded actor code CIDs");
        Ok(count)
    }
}

fn decode<R: HasLotusJson>(
    method: &'static str,
    value: serde_json::Value,
) -> Result<R, ChainSourceError> {
    R::from_lotus_json_value(value).map_err(|e| {
        error!(method, "undecodable result: {e}");
        ChainSourceError::Decode {
            method,
            reason: e.to_string(),
        }
    })
}

fn decode_json<R: serde::de::DeserializeOwned>(
    method: &'static str,
    value: serde_json::Value,
) -> Result<R, ChainSourceError> {
    serde_json::from_value(value).map_err(|e| ChainSourceError::Decode {
        method,
        reason: e.to_string(),
    })
}

#[async_trait]
impl<T: RpcTransport> ChainSource for LotusChainSource<T> {
    async fn head(&self) -> Result<Arc<Tipset>, ChainSourceError> {
        self.call(chain_head_req()).await.map(Arc::new)
    }

    async fn genesis(&self) -> Result<Arc<Tipset>, ChainSourceError> {
        self.call(chain_get_genesis_req()).await.map(Arc::new)
    }

    async fn tipset_by_height(&self, height: ChainEpoch) -> TipsetLookup {
        let request = chain_get_tipset_by_height_req(height, TipsetKey::default());
        match self.transport.call(request.lower()).await {
            Ok(value) => match Tipset::from_lotus_json_value(value) {
                Ok(tipset) => TipsetLookup::Found(Arc::new(tipset)),
                Err(e) => {
                    error!(height, "undecodable tipset: {e}");
                    TipsetLookup::Error(e.to_string())
                }
            },
            Err(TransportError::Rpc { message, .. }) if message.contains(HEIGHT_NOT_REACHED) => {
                debug!(height, "height not reached yet");
                TipsetLookup::NotYetMined
            }
            Err(e) => {
                error!(height, "failed to get the tipset: {e}");
                TipsetLookup::Error(e.to_string())
            }
        }
    }

    async fn tipset_by_key(&self, key: &TipsetKey) -> Result<Arc<Tipset>, ChainSourceError> {
        self.call(chain_get_tipset_req(key.clone())).await.map(Arc::new)
    }

    async fn block_messages(&self, block: &Cid) -> Result<BlockMessages, ChainSourceError> {
        self.call(chain_get_block_messages_req(*block)).await
    }

    async fn parent_messages(&self, block: &Cid) -> Result<Vec<ParentMessage>, ChainSourceError> {
        self.call(chain_get_parent_messages_req(*block)).await
    }

    async fn parent_receipts(&self, block: &Cid) -> Result<Vec<Receipt>, ChainSourceError> {
        self.call(chain_get_parent_receipts_req(*block)).await
    }

    async fn changed_actors(
        &self,
        from: &Cid,
        to: &Cid,
    ) -> Result<BTreeMap<String, ActorState>, ChainSourceError> {
        let value = self.call(state_changed_actors_req(*from, *to)).await?;
        if value.is_null() {
            return Ok(BTreeMap::new());
        }
        decode_json(STATE_CHANGED_ACTORS, value)
    }

    async fn has_obj(&self, cid: &Cid) -> Result<bool, ChainSourceError> {
        self.call(chain_has_obj_req(*cid)).await
    }

    async fn actor(
        &self,
        address: &Address,
        tsk: &TipsetKey,
    ) -> Result<Option<ActorState>, ChainSourceError> {
        self.call(state_get_actor_req(address.clone(), tsk.clone()))
            .await
    }

    async fn read_state(
        &self,
        address: &Address,
        tsk: &TipsetKey,
    ) -> Result<ReadState, ChainSourceError> {
        self.call(state_read_state_req(address.clone(), tsk.clone()))
            .await
    }

    async fn list_miners(&self, tsk: &TipsetKey) -> Result<Vec<Address>, ChainSourceError> {
        self.call(state_list_miners_req(tsk.clone())).await
    }

    async fn miner_info(
        &self,
        miner: &Address,
        tsk: &TipsetKey,
    ) -> Result<MinerInfo, ChainSourceError> {
        self.call(state_miner_info_req(miner.clone(), tsk.clone()))
            .await
    }

    async fn miner_power(
        &self,
        miner: &Address,
        tsk: &TipsetKey,
    ) -> Result<MinerPower, ChainSourceError> {
        self.call(state_miner_power_req(miner.clone(), tsk.clone()))
            .await
    }

    async fn miner_sectors(
        &self,
        miner: &Address,
        tsk: &TipsetKey,
    ) -> Result<Vec<SectorOnChainInfo>, ChainSourceError> {
        self.call(state_miner_sectors_req(miner.clone(), tsk.clone()))
            .await
    }

    async fn lookup_id(
        &self,
        address: &Address,
        tsk: &TipsetKey,
    ) -> Result<Address, ChainSourceError> {
        self.call(state_lookup_id_req(address.clone(), tsk.clone()))
            .await
    }

    async fn account_key(
        &self,
        id: &Address,
        tsk: &TipsetKey,
    ) -> Result<Address, ChainSourceError> {
        self.call(state_account_key_req(id.clone(), tsk.clone()))
            .await
    }

    async fn head_changes(&self) -> Result<HeadChanges, ChainSourceError> {
        let subscription = self
            .transport
            .subscribe(chain_notify_req())
            .await
            .inspect_err(|e| warn!(method = CHAIN_NOTIFY, "{e}"))?;
        info!(channel = %subscription.id(), "subscribed to head changes");
        Ok(HeadChanges::new(subscription))
    }

    fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    fn actors(&self) -> &ActorRegistry {
        &self.actors
    }
}
