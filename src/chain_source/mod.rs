// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Typed chain queries on top of the JSON-RPC [`transport`](crate::transport).
//!
//! Every accessor either returns a usable value or an error, remote failures
//! never panic. Height lookups are the exception: they return a
//! [`TipsetLookup`], which tells "not mined yet" apart from real errors.

pub mod actors;
mod lotus;
pub mod methods;
mod resolver;
mod types;

use std::{collections::BTreeMap, sync::Arc};

use ::cid::Cid;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::blocks::{Tipset, TipsetKey};
use crate::lotus_json::HasLotusJson as _;
use crate::message::{BlockMessages, ParentMessage, Receipt};
use crate::shim::{
    ChainEpoch,
    address::{Address, Protocol},
};
use crate::transport::{Subscription, TransportError};

pub use actors::ActorRegistry;
pub use lotus::LotusChainSource;
pub use resolver::AddressResolver;
pub use types::{
    ActorState, HeadChange, HeadChangeType, MinerInfo, MinerPower, PeerInfo, PowerClaim, ReadState,
    SectorOnChainInfo, WorkerKeyChange,
};

#[derive(Debug, Error)]
pub enum ChainSourceError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to decode the result of {method}: {reason}")]
    Decode { method: &'static str, reason: String },
    #[error("{0} is not supported by this chain source")]
    Unsupported(&'static str),
}

/// The outcome of asking for the tipset at one height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipsetLookup {
    /// The tipset at the requested height, or the nearest one below it if the
    /// height is a null round.
    Found(Arc<Tipset>),
    /// The node's head is below the requested height.
    NotYetMined,
    Error(String),
}

/// Decoded `Filecoin.ChainNotify` updates, in the order the node sent them.
pub struct HeadChanges {
    subscription: Subscription,
}

impl HeadChanges {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// The next batch of changes. `None` once the subscription ended.
    /// Undecodable batches are logged and skipped.
    pub async fn next(&mut self) -> Option<Vec<HeadChange>> {
        loop {
            let frame = self.subscription.next().await?;
            match Vec::<HeadChange>::from_lotus_json_value(frame) {
                Ok(changes) => return Some(changes),
                Err(e) => warn!("dropping undecodable head change: {e}"),
            }
        }
    }
}

#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn head(&self) -> Result<Arc<Tipset>, ChainSourceError>;

    async fn genesis(&self) -> Result<Arc<Tipset>, ChainSourceError>;

    async fn tipset_by_height(&self, height: ChainEpoch) -> TipsetLookup;

    async fn tipset_by_key(&self, key: &TipsetKey) -> Result<Arc<Tipset>, ChainSourceError>;

    async fn block_messages(&self, block: &Cid) -> Result<BlockMessages, ChainSourceError>;

    /// Messages executed when computing the state of the tipset containing `block`.
    async fn parent_messages(&self, block: &Cid) -> Result<Vec<ParentMessage>, ChainSourceError>;

    /// Receipts of [`ChainSource::parent_messages`], same order.
    async fn parent_receipts(&self, block: &Cid) -> Result<Vec<Receipt>, ChainSourceError>;

    /// Every actor whose state differs between two state roots, keyed by address.
    async fn changed_actors(
        &self,
        from: &Cid,
        to: &Cid,
    ) -> Result<BTreeMap<String, ActorState>, ChainSourceError>;

    async fn has_obj(&self, cid: &Cid) -> Result<bool, ChainSourceError>;

    async fn actor(
        &self,
        address: &Address,
        tsk: &TipsetKey,
    ) -> Result<Option<ActorState>, ChainSourceError>;

    async fn read_state(
        &self,
        address: &Address,
        tsk: &TipsetKey,
    ) -> Result<ReadState, ChainSourceError>;

    async fn list_miners(&self, tsk: &TipsetKey) -> Result<Vec<Address>, ChainSourceError>;

    async fn miner_info(
        &self,
        miner: &Address,
        tsk: &TipsetKey,
    ) -> Result<MinerInfo, ChainSourceError>;

    async fn miner_power(
        &self,
        miner: &Address,
        tsk: &TipsetKey,
    ) -> Result<MinerPower, ChainSourceError>;

    async fn miner_sectors(
        &self,
        miner: &Address,
        tsk: &TipsetKey,
    ) -> Result<Vec<SectorOnChainInfo>, ChainSourceError>;

    async fn lookup_id(
        &self,
        address: &Address,
        tsk: &TipsetKey,
    ) -> Result<Address, ChainSourceError>;

    async fn account_key(
        &self,
        id: &Address,
        tsk: &TipsetKey,
    ) -> Result<Address, ChainSourceError>;

    async fn head_changes(&self) -> Result<HeadChanges, ChainSourceError>;

    fn resolver(&self) -> &AddressResolver;

    fn actors(&self) -> &ActorRegistry;

    /// [`ChainSource::lookup_id`] through the [`AddressResolver`]. Failures are
    /// logged, not cached.
    async fn resolve_id(&self, address: &Address, tsk: &TipsetKey) -> Option<Address> {
        if let Some(id) = self.resolver().id_of(address) {
            return Some(id);
        }
        match self.lookup_id(address, tsk).await {
            Ok(id) => {
                self.resolver().insert_pair(address.clone(), id.clone());
                Some(id)
            }
            Err(e) => {
                warn!(%address, "failed to look up the ID address: {e}");
                None
            }
        }
    }

    /// [`ChainSource::account_key`] through the [`AddressResolver`]. BLS
    /// addresses are their own key.
    async fn resolve_key(&self, id: &Address, tsk: &TipsetKey) -> Option<Address> {
        if id.protocol() == Protocol::Bls {
            return Some(id.clone());
        }
        if let Some(key) = self.resolver().key_of(id) {
            return Some(key);
        }
        match self.account_key(id, tsk).await {
            Ok(key) => {
                self.resolver().insert_pair(key.clone(), id.clone());
                Some(key)
            }
            Err(e) => {
                warn!(address = %id, "failed to look up the account key: {e}");
                None
            }
        }
    }

    /// The builtin actor type of an ID address, e.g. `storageminer`, or
    /// [`actors::UNKNOWN`] if its code is not in the registry.
    async fn actor_type(&self, id: &Address, tsk: &TipsetKey) -> Option<String> {
        if !id.is_id() {
            debug!(address = %id, "actor types are only tracked for ID addresses");
            return None;
        }
        if let Some(actor_type) = self.resolver().type_of(id) {
            return Some(actor_type);
        }
        match self.actor(id, tsk).await {
            Ok(Some(actor)) => {
                let actor_type = self
                    .actors()
                    .name_of(&actor.code)
                    .unwrap_or_else(|| actors::UNKNOWN.to_owned());
                self.resolver().insert_type(id.clone(), actor_type.clone());
                Some(actor_type)
            }
            Ok(None) => {
                warn!(address = %id, "actor not found");
                None
            }
            Err(e) => {
                warn!(address = %id, "failed to get the actor: {e}");
                None
            }
        }
    }
}
