// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actor-state diff collection.
//!
//! For a tipset `T` with parent `P`, the actors whose state changed between
//! `P.parent_state` and `T.parent_state` are the actors touched by `P`'s
//! messages. Each changed actor yields one [`ActorInfo`], miners additionally
//! yield their [`MinerInfoRecord`] and the reward actor its parsed state.

mod reward;

use std::{sync::Arc, time::Instant};

use ::cid::Cid;
use ahash::HashSet;
use futures::{StreamExt as _, stream};
use tracing::{debug, info, warn};

use crate::blocks::{Tipset, TipsetKey};
use crate::chain_source::{
    ActorState, ChainSource, ChainSourceError, MinerInfo, MinerPower, SectorOnChainInfo, actors,
};
use crate::shim::{ChainEpoch, address::Address};

pub use reward::RewardActorState;

/// Default bound on concurrently processed actors.
pub const DEFAULT_ACTOR_WORKERS: usize = 10;

/// The state of one actor as of a tipset's parent state.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorInfo {
    pub address: Address,
    pub actor: ActorState,
    pub state_root: Cid,
    pub height: ChainEpoch,
    pub tipset_key: TipsetKey,
    pub parent_tipset_key: TipsetKey,
    /// The node's JSON rendering of the actor state.
    pub state: String,
    /// The actor head is gone from the node's store.
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinerInfoRecord {
    pub miner: Address,
    pub height: ChainEpoch,
    pub info: MinerInfo,
    pub power: Option<MinerPower>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinerSectorRecord {
    pub miner: Address,
    pub height: ChainEpoch,
    pub sector: SectorOnChainInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardActorRecord {
    pub address: Address,
    pub actor: ActorState,
    /// Height of the tipset the change was collected for.
    pub height: ChainEpoch,
    pub state_root: Cid,
    pub tipset_key: TipsetKey,
    pub parent_tipset_key: TipsetKey,
    pub state: RewardActorState,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActorChanges {
    pub actors: Vec<ActorInfo>,
    pub miners: Vec<MinerInfoRecord>,
    pub sectors: Vec<MinerSectorRecord>,
    pub reward: Option<RewardActorRecord>,
    /// The parent tipset followed a null round, nothing was collected.
    pub null_parent: bool,
}

/// Everything collected for a single actor.
#[derive(Default)]
struct ActorOutput {
    actor: Option<ActorInfo>,
    miner: Option<MinerInfoRecord>,
    sectors: Vec<MinerSectorRecord>,
    reward: Option<RewardActorRecord>,
}

/// The context shared by all actors of one tipset.
struct TipsetContext {
    tipset_key: TipsetKey,
    parent_tipset_key: TipsetKey,
    height: ChainEpoch,
    state_root: Cid,
}

pub struct StateDiffCollector {
    source: Arc<dyn ChainSource>,
    actor_workers: usize,
    collect_miner_sectors: bool,
}

impl StateDiffCollector {
    pub fn new(source: Arc<dyn ChainSource>) -> Self {
        Self {
            source,
            actor_workers: DEFAULT_ACTOR_WORKERS,
            collect_miner_sectors: false,
        }
    }

    pub fn with_actor_workers(mut self, actor_workers: usize) -> Self {
        self.actor_workers = actor_workers.max(1);
        self
    }

    pub fn with_miner_sectors(mut self, collect_miner_sectors: bool) -> Self {
        self.collect_miner_sectors = collect_miner_sectors;
        self
    }

    /// Collects the actor changes leading to `tipset`'s parent state.
    ///
    /// Only failing to get the parent tipset or the diff itself is an error.
    /// Failures for individual actors are logged and that actor is skipped.
    pub async fn collect(&self, tipset: &Tipset) -> Result<ActorChanges, ChainSourceError> {
        let start = Instant::now();
        let height = tipset.epoch();
        let parent = self.source.tipset_by_key(tipset.parents()).await?;
        if parent.parent_state() == tipset.parent_state() {
            debug!(height, parent = %parent.key(), "parent follows a null round");
            return Ok(ActorChanges {
                null_parent: true,
                ..Default::default()
            });
        }
        let changed = self
            .source
            .changed_actors(parent.parent_state(), tipset.parent_state())
            .await?;

        // one snapshot per head, whichever address reported it first
        let mut heads_seen = HashSet::default();
        let unique: Vec<(String, ActorState)> = changed
            .into_iter()
            .filter(|(_, actor)| heads_seen.insert(actor.head))
            .collect();

        let context = TipsetContext {
            tipset_key: tipset.key().clone(),
            parent_tipset_key: tipset.parents().clone(),
            height,
            state_root: *tipset.parent_state(),
        };
        let outputs: Vec<ActorOutput> = stream::iter(unique)
            .map(|(address, actor)| self.collect_actor(&context, address, actor))
            .buffer_unordered(self.actor_workers)
            .collect()
            .await;

        let mut changes = ActorChanges::default();
        for output in outputs {
            changes.actors.extend(output.actor);
            changes.miners.extend(output.miner);
            changes.sectors.extend(output.sectors);
            if output.reward.is_some() {
                changes.reward = output.reward;
            }
        }
        info!(
            height,
            actors = changes.actors.len(),
            miners = changes.miners.len(),
            sectors = changes.sectors.len(),
            reward = changes.reward.is_some(),
            took = %humantime::format_duration(start.elapsed()),
            "collected actor changes"
        );
        Ok(changes)
    }

    async fn collect_actor(
        &self,
        context: &TipsetContext,
        address: String,
        actor: ActorState,
    ) -> ActorOutput {
        let mut output = ActorOutput::default();
        let address: Address = match address.parse() {
            Ok(address) => address,
            Err(e) => {
                warn!(height = context.height, "skipping changed actor: {e}");
                return output;
            }
        };
        let tsk = &context.tipset_key;

        let deleted = match self.source.has_obj(&actor.head).await {
            Ok(has) => !has,
            Err(e) => {
                warn!(%address, head = %actor.head, "failed to check the actor head, assuming it exists: {e}");
                false
            }
        };

        let actor_type = self.source.actors().name_of(&actor.code);
        if actor_type.as_deref() == Some(actors::MINER) {
            let (info, power) = tokio::join!(
                self.source.miner_info(&address, tsk),
                self.source.miner_power(&address, tsk)
            );
            match info {
                Ok(info) => {
                    output.miner = Some(MinerInfoRecord {
                        miner: address.clone(),
                        height: context.height,
                        info,
                        power: power
                            .inspect_err(|e| warn!(%address, "failed to get miner power: {e}"))
                            .ok(),
                    })
                }
                Err(e) => warn!(%address, height = context.height, "failed to get miner info: {e}"),
            }
            if self.collect_miner_sectors {
                match self.source.miner_sectors(&address, tsk).await {
                    Ok(sectors) => {
                        output.sectors = sectors
                            .into_iter()
                            .map(|sector| MinerSectorRecord {
                                miner: address.clone(),
                                height: context.height,
                                sector,
                            })
                            .collect()
                    }
                    Err(e) => warn!(%address, "failed to get miner sectors: {e}"),
                }
            }
        }

        let read_state = match self.source.read_state(&address, tsk).await {
            Ok(read_state) => read_state,
            Err(e) => {
                warn!(%address, height = context.height, "failed to read actor state: {e}");
                return output;
            }
        };

        if address.is_reward_actor() {
            output.reward = Some(RewardActorRecord {
                address: address.clone(),
                actor: actor.clone(),
                height: context.height,
                state_root: context.state_root,
                tipset_key: context.tipset_key.clone(),
                parent_tipset_key: context.parent_tipset_key.clone(),
                state: RewardActorState::parse(&read_state.state),
            });
        }

        output.actor = Some(ActorInfo {
            address,
            actor,
            state_root: context.state_root,
            height: context.height,
            tipset_key: context.tipset_key.clone(),
            parent_tipset_key: context.parent_tipset_key.clone(),
            state: read_state.state.to_string(),
            deleted,
        });
        output
    }
}
