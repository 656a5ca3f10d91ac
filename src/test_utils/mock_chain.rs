// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use ::cid::Cid;
use ahash::{HashMap, HashSet};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::{build_tipset, cid_of};
use crate::blocks::{Tipset, TipsetKey};
use crate::chain_source::{
    ActorRegistry, ActorState, AddressResolver, ChainSource, ChainSourceError, HeadChanges,
    MinerInfo, MinerPower, ReadState, SectorOnChainInfo, TipsetLookup, methods,
};
use crate::message::{BlockMessages, ParentMessage, Receipt};
use crate::shim::{ChainEpoch, address::Address};
use crate::transport::{Subscription, TransportError};

/// A scripted in-memory chain. Clones share state, so a test can keep a handle
/// after giving one to the code under test.
#[derive(Clone, Default)]
pub struct MockChain {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    by_height: Mutex<BTreeMap<ChainEpoch, Arc<Tipset>>>,
    by_key: Mutex<HashMap<TipsetKey, Arc<Tipset>>>,
    generation: AtomicUsize,
    block_messages: Mutex<HashMap<Cid, BlockMessages>>,
    parent_messages: Mutex<HashMap<Cid, Vec<ParentMessage>>>,
    parent_receipts: Mutex<HashMap<Cid, Vec<Receipt>>>,
    changed_actors: Mutex<HashMap<Cid, BTreeMap<String, ActorState>>>,
    missing_objs: Mutex<HashSet<Cid>>,
    read_states: Mutex<HashMap<String, Value>>,
    failing_read_states: Mutex<HashSet<String>>,
    actor_codes: Mutex<HashMap<String, Cid>>,
    ids: Mutex<HashMap<String, String>>,
    failing_heights: Mutex<HashSet<ChainEpoch>>,
    head_changes: Mutex<Option<mpsc::Receiver<Value>>>,
    calls: Mutex<Vec<(&'static str, String)>>,
    resolver: AddressResolver,
    actors: ActorRegistry,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// One single-block tipset per height, each on top of the previous one.
    pub fn add_linear(&self, heights: std::ops::Range<ChainEpoch>) {
        for height in heights {
            self.add_tipset_with_blocks(height, 1);
        }
    }

    /// Adds, or replaces, the tipset at `height` on top of the highest tipset
    /// below it.
    pub fn add_tipset_with_blocks(&self, height: ChainEpoch, blocks: usize) -> Arc<Tipset> {
        let parent = self
            .inner
            .by_height
            .lock()
            .range(..height)
            .next_back()
            .map(|(_, tipset)| tipset.key().clone())
            .unwrap_or_else(|| TipsetKey::from_iter([cid_of("before genesis")]));
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let tag = format!("g{generation}-");
        let state_root = cid_of(&format!("state-{tag}{height}"));
        self.insert(build_tipset(height, blocks, parent, state_root, &tag))
    }

    /// Adds a tipset at `height` whose parent is the tipset at `parent_height`.
    pub fn add_tipset_on(&self, height: ChainEpoch, parent_height: ChainEpoch, state_root: Cid) {
        let parent = self.tipset(parent_height).unwrap().key().clone();
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        self.insert(build_tipset(
            height,
            1,
            parent,
            state_root,
            &format!("g{generation}-"),
        ));
    }

    fn insert(&self, tipset: Tipset) -> Arc<Tipset> {
        let tipset = Arc::new(tipset);
        self.inner
            .by_key
            .lock()
            .insert(tipset.key().clone(), tipset.clone());
        self.inner
            .by_height
            .lock()
            .insert(tipset.epoch(), tipset.clone());
        tipset
    }

    /// Makes `height` a null round.
    pub fn remove_tipset(&self, height: ChainEpoch) {
        self.inner.by_height.lock().remove(&height);
    }

    pub fn tipset(&self, height: ChainEpoch) -> Option<Arc<Tipset>> {
        self.inner.by_height.lock().get(&height).cloned()
    }

    pub fn set_block_messages(&self, block: Cid, messages: BlockMessages) {
        self.inner.block_messages.lock().insert(block, messages);
    }

    pub fn set_parent_messages(&self, block: Cid, messages: Vec<ParentMessage>) {
        self.inner.parent_messages.lock().insert(block, messages);
    }

    pub fn set_parent_receipts(&self, block: Cid, receipts: Vec<Receipt>) {
        self.inner.parent_receipts.lock().insert(block, receipts);
    }

    /// Actors changed on the way to state root `to`.
    pub fn set_changed_actors<'a>(
        &self,
        to: &Cid,
        actors: impl IntoIterator<Item = (&'a str, ActorState)>,
    ) {
        self.inner.changed_actors.lock().insert(
            *to,
            actors
                .into_iter()
                .map(|(address, actor)| (address.to_owned(), actor))
                .collect(),
        );
    }

    pub fn remove_obj(&self, cid: Cid) {
        self.inner.missing_objs.lock().insert(cid);
    }

    pub fn set_read_state(&self, address: &str, state: Value) {
        self.inner
            .read_states
            .lock()
            .insert(address.to_owned(), state);
    }

    pub fn fail_read_state(&self, address: &str) {
        self.inner
            .failing_read_states
            .lock()
            .insert(address.to_owned());
    }

    pub fn set_actor_code(&self, address: &str, code: Cid) {
        self.inner
            .actor_codes
            .lock()
            .insert(address.to_owned(), code);
    }

    pub fn set_id(&self, key: &str, id: &str) {
        self.inner.ids.lock().insert(key.to_owned(), id.to_owned());
    }

    /// By-height lookups of `height` fail.
    pub fn fail_height(&self, height: ChainEpoch) {
        self.inner.failing_heights.lock().insert(height);
    }

    /// Feeds the next [`ChainSource::head_changes`] subscription.
    pub fn feed_head_changes(&self) -> mpsc::Sender<Value> {
        let (tx, rx) = mpsc::channel(64);
        *self.inner.head_changes.lock() = Some(rx);
        tx
    }

    /// How often `method` was called.
    pub fn calls(&self, method: &str) -> usize {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|(m, _)| *m == method)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.inner.calls.lock().len()
    }

    /// Every call in order, with its argument.
    pub fn call_log(&self) -> Vec<(&'static str, String)> {
        self.inner.calls.lock().clone()
    }

    fn record(&self, method: &'static str, argument: impl ToString) {
        self.inner
            .calls
            .lock()
            .push((method, argument.to_string()));
    }

    fn not_found(what: impl std::fmt::Display) -> ChainSourceError {
        TransportError::Rpc {
            code: 1,
            message: format!("{what} not found"),
        }
        .into()
    }

    fn actor_state(&self, address: &Address) -> Option<ActorState> {
        if let Some(code) = self.inner.actor_codes.lock().get(address.as_str()) {
            return Some(ActorState {
                code: *code,
                head: cid_of(&format!("head-{address}")),
                nonce: 0,
                balance: 0.into(),
            });
        }
        self.inner
            .changed_actors
            .lock()
            .values()
            .find_map(|actors| actors.get(address.as_str()).cloned())
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn head(&self) -> Result<Arc<Tipset>, ChainSourceError> {
        self.record("head", "");
        self.inner
            .by_height
            .lock()
            .values()
            .next_back()
            .cloned()
            .ok_or_else(|| Self::not_found("head"))
    }

    async fn genesis(&self) -> Result<Arc<Tipset>, ChainSourceError> {
        self.record("genesis", "");
        self.tipset(0).ok_or_else(|| Self::not_found("genesis"))
    }

    async fn tipset_by_height(&self, height: ChainEpoch) -> TipsetLookup {
        self.record("tipset_by_height", height);
        if self.inner.failing_heights.lock().contains(&height) {
            return TipsetLookup::Error(format!("scripted failure at {height}"));
        }
        let by_height = self.inner.by_height.lock();
        match by_height.keys().next_back() {
            Some(head) if *head >= height => by_height
                .range(..=height)
                .next_back()
                .map(|(_, tipset)| TipsetLookup::Found(tipset.clone()))
                .unwrap_or_else(|| TipsetLookup::Error(format!("nothing at or below {height}"))),
            _ => TipsetLookup::NotYetMined,
        }
    }

    async fn tipset_by_key(&self, key: &TipsetKey) -> Result<Arc<Tipset>, ChainSourceError> {
        self.record("tipset_by_key", key);
        self.inner
            .by_key
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Self::not_found(key))
    }

    async fn block_messages(&self, block: &Cid) -> Result<BlockMessages, ChainSourceError> {
        self.record("block_messages", block);
        Ok(self
            .inner
            .block_messages
            .lock()
            .get(block)
            .cloned()
            .unwrap_or_default())
    }

    async fn parent_messages(&self, block: &Cid) -> Result<Vec<ParentMessage>, ChainSourceError> {
        self.record("parent_messages", block);
        Ok(self
            .inner
            .parent_messages
            .lock()
            .get(block)
            .cloned()
            .unwrap_or_default())
    }

    async fn parent_receipts(&self, block: &Cid) -> Result<Vec<Receipt>, ChainSourceError> {
        self.record("parent_receipts", block);
        Ok(self
            .inner
            .parent_receipts
            .lock()
            .get(block)
            .cloned()
            .unwrap_or_default())
    }

    async fn changed_actors(
        &self,
        from: &Cid,
        to: &Cid,
    ) -> Result<BTreeMap<String, ActorState>, ChainSourceError> {
        self.record("changed_actors", format!("{from}->{to}"));
        Ok(self
            .inner
            .changed_actors
            .lock()
            .get(to)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_obj(&self, cid: &Cid) -> Result<bool, ChainSourceError> {
        self.record("has_obj", cid);
        Ok(!self.inner.missing_objs.lock().contains(cid))
    }

    async fn actor(
        &self,
        address: &Address,
        _tsk: &TipsetKey,
    ) -> Result<Option<ActorState>, ChainSourceError> {
        self.record("actor", address);
        Ok(self.actor_state(address))
    }

    async fn read_state(
        &self,
        address: &Address,
        _tsk: &TipsetKey,
    ) -> Result<ReadState, ChainSourceError> {
        self.record("read_state", address);
        if self
            .inner
            .failing_read_states
            .lock()
            .contains(address.as_str())
        {
            return Err(Self::not_found(address));
        }
        let actor = self.actor_state(address);
        Ok(ReadState {
            balance: actor.as_ref().map(|a| a.balance.clone()).unwrap_or_default(),
            code: actor.map(|a| a.code),
            state: self
                .inner
                .read_states
                .lock()
                .get(address.as_str())
                .cloned()
                .unwrap_or_else(|| json!({})),
        })
    }

    async fn list_miners(&self, tsk: &TipsetKey) -> Result<Vec<Address>, ChainSourceError> {
        self.record("list_miners", tsk);
        Ok(vec![])
    }

    async fn miner_info(
        &self,
        miner: &Address,
        _tsk: &TipsetKey,
    ) -> Result<MinerInfo, ChainSourceError> {
        self.record("miner_info", miner);
        Ok(MinerInfo {
            owner: Address::new_id(100),
            worker: Address::new_id(101),
            new_worker: None,
            control_addresses: vec![Address::new_id(102)],
            worker_change_epoch: -1,
            pending_worker_key: None,
            peer_id: Some("12D3KooW".into()),
            multiaddrs: vec![],
            sector_size: 34359738368,
            window_post_partition_sectors: 2349,
        })
    }

    async fn miner_power(
        &self,
        miner: &Address,
        _tsk: &TipsetKey,
    ) -> Result<MinerPower, ChainSourceError> {
        self.record("miner_power", miner);
        Ok(MinerPower::default())
    }

    async fn miner_sectors(
        &self,
        miner: &Address,
        _tsk: &TipsetKey,
    ) -> Result<Vec<SectorOnChainInfo>, ChainSourceError> {
        self.record("miner_sectors", miner);
        Ok(vec![SectorOnChainInfo {
            sector_number: 1,
            seal_proof: 8,
            sealed_cid: cid_of("sealed"),
            deal_ids: vec![],
            activation: 10,
            expiration: 1000,
            deal_weight: 0.into(),
            verified_deal_weight: 0.into(),
            initial_pledge: 0.into(),
            expected_day_reward: 0.into(),
            expected_storage_pledge: 0.into(),
        }])
    }

    async fn lookup_id(
        &self,
        address: &Address,
        _tsk: &TipsetKey,
    ) -> Result<Address, ChainSourceError> {
        self.record("lookup_id", address);
        let id = self.inner.ids.lock().get(address.as_str()).cloned();
        id.ok_or_else(|| Self::not_found(address))?
            .parse()
            .map_err(|e| ChainSourceError::Decode {
                method: methods::STATE_LOOKUP_ID,
                reason: format!("{e}"),
            })
    }

    async fn account_key(
        &self,
        id: &Address,
        _tsk: &TipsetKey,
    ) -> Result<Address, ChainSourceError> {
        self.record("account_key", id);
        let key = self
            .inner
            .ids
            .lock()
            .iter()
            .find(|(_, v)| v.as_str() == id.as_str())
            .map(|(k, _)| k.clone());
        key.ok_or_else(|| Self::not_found(id))?
            .parse()
            .map_err(|e| ChainSourceError::Decode {
                method: methods::STATE_ACCOUNT_KEY,
                reason: format!("{e}"),
            })
    }

    async fn head_changes(&self) -> Result<HeadChanges, ChainSourceError> {
        self.record("head_changes", "");
        let frames = self
            .inner
            .head_changes
            .lock()
            .take()
            .ok_or(ChainSourceError::Unsupported("head_changes"))?;
        Ok(HeadChanges::new(Subscription::new(json!(1), frames)))
    }

    fn resolver(&self) -> &AddressResolver {
        &self.inner.resolver
    }

    fn actors(&self) -> &ActorRegistry {
        &self.inner.actors
    }
}
