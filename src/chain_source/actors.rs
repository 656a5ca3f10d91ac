// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Builtin actor kinds: code CIDs, display names, and method names.

use ::cid::{Cid, multihash::Multihash};
use ahash::HashMap;
use parking_lot::RwLock;

/// Multicodec of raw binary.
const RAW: u64 = 0x55;
/// Multihash code of the identity "hash".
const IDENTITY: u64 = 0x00;
/// Actor versions whose code CIDs are derived from their names.
const NAMED_CODE_VERSIONS: std::ops::RangeInclusive<u32> = 1..=9;

pub const SYSTEM: &str = "system";
pub const INIT: &str = "init";
pub const CRON: &str = "cron";
pub const POWER: &str = "storagepower";
pub const MINER: &str = "storageminer";
pub const MARKET: &str = "storagemarket";
pub const PAYCH: &str = "paymentchannel";
pub const REWARD: &str = "reward";
pub const VERIFREG: &str = "verifiedregistry";
pub const ACCOUNT: &str = "account";
pub const MULTISIG: &str = "multisig";

pub const BUILTIN_ACTORS: [&str; 11] = [
    SYSTEM, INIT, CRON, POWER, MINER, MARKET, PAYCH, REWARD, VERIFREG, ACCOUNT, MULTISIG,
];

/// Reported for an actor whose code CID is not in the registry.
pub const UNKNOWN: &str = "<unknown>";

/// `fil/<version>/<name>` wrapped in an identity multihash, as the early
/// network versions define builtin code CIDs.
pub fn named_code_cid(version: u32, name: &str) -> Option<Cid> {
    let multihash = Multihash::<64>::wrap(IDENTITY, format!("fil/{version}/{name}").as_bytes()).ok()?;
    Some(Cid::new_v1(RAW, multihash))
}

/// Maps actor code CIDs to actor type names, such as `storageminer`.
///
/// Starts out with the name-derived CIDs of every builtin actor, and learns
/// bundle CIDs of later network versions through [`ActorRegistry::register`].
#[derive(Debug)]
pub struct ActorRegistry {
    codes: RwLock<HashMap<Cid, String>>,
}

impl Default for ActorRegistry {
    fn default() -> Self {
        let codes = NAMED_CODE_VERSIONS
            .flat_map(|version| {
                BUILTIN_ACTORS.iter().filter_map(move |name| {
                    named_code_cid(version, name).map(|cid| (cid, name.to_string()))
                })
            })
            .collect();
        Self {
            codes: RwLock::new(codes),
        }
    }
}

impl ActorRegistry {
    pub fn register(&self, name: impl Into<String>, code: Cid) {
        self.codes.write().insert(code, name.into());
    }

    pub fn name_of(&self, code: &Cid) -> Option<String> {
        self.codes.read().get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.codes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.read().is_empty()
    }
}

/// The wording used in sink records, e.g. `storageminer` is `miner`.
/// Names without a special spelling are returned as is.
pub fn human_name(actor: &str) -> &str {
    match actor {
        POWER => "storage power",
        MINER => "miner",
        MARKET => "storage market",
        PAYCH => "payment channel",
        VERIFREG => "verified registry",
        other => other,
    }
}

/// Method `method` of an actor of type `actor`. Every actor shares the
/// constructor (0) and plain value transfer (1).
pub fn method_name(actor: &str, method: u64) -> Option<&'static str> {
    match method {
        0 => return Some("Constructor"),
        1 => return Some("Send"),
        _ => {}
    }
    Some(match (actor, method) {
        (ACCOUNT, 2) => "PubkeyAddress",
        (INIT, 2) => "Exec",
        (CRON, 2) => "EpochTick",
        (REWARD, 2) => "AwardBlockReward",
        (REWARD, 3) => "ThisEpochReward",
        (REWARD, 4) => "UpdateNetworkKPI",
        (MULTISIG, 2) => "Propose",
        (MULTISIG, 3) => "Approve",
        (MULTISIG, 4) => "Cancel",
        (MULTISIG, 5) => "AddSigner",
        (MULTISIG, 6) => "RemoveSigner",
        (MULTISIG, 7) => "SwapSigner",
        (MULTISIG, 8) => "ChangeNumApprovalsThreshold",
        (MULTISIG, 9) => "LockBalance",
        (PAYCH, 2) => "UpdateChannelState",
        (PAYCH, 3) => "Settle",
        (PAYCH, 4) => "Collect",
        (MARKET, 2) => "AddBalance",
        (MARKET, 3) => "WithdrawBalance",
        (MARKET, 4) => "PublishStorageDeals",
        (MARKET, 5) => "VerifyDealsForActivation",
        (MARKET, 6) => "ActivateDeals",
        (MARKET, 7) => "OnMinerSectorsTerminate",
        (MARKET, 8) => "ComputeDataCommitment",
        (MARKET, 9) => "CronTick",
        (POWER, 2) => "CreateMiner",
        (POWER, 3) => "UpdateClaimedPower",
        (POWER, 4) => "EnrollCronEvent",
        (POWER, 5) => "OnEpochTickEnd",
        (POWER, 6) => "UpdatePledgeTotal",
        (POWER, 7) => "Deprecated1",
        (POWER, 8) => "SubmitPoRepForBulkVerify",
        (POWER, 9) => "CurrentTotalPower",
        (MINER, 2) => "ControlAddresses",
        (MINER, 3) => "ChangeWorkerAddress",
        (MINER, 4) => "ChangePeerID",
        (MINER, 5) => "SubmitWindowedPoSt",
        (MINER, 6) => "PreCommitSector",
        (MINER, 7) => "ProveCommitSector",
        (MINER, 8 | 9) => "ExtendSectorExpiration",
        (MINER, 10) => "DeclareFaults",
        (MINER, 11) => "DeclareFaultsRecovered",
        (MINER, 12) => "OnDeferredCronEvent",
        (MINER, 13) => "CheckSectorProven",
        (MINER, 14) => "ApplyRewards",
        (MINER, 15) => "ReportConsensusFault",
        (MINER, 16) => "WithdrawBalance",
        (MINER, 17) => "ConfirmSectorProofsValid",
        (MINER, 18) => "ChangeMultiaddrs",
        (MINER, 19) => "CompactPartitions",
        (MINER, 20) => "CompactSectorNumbers",
        (MINER, 21) => "ConfirmUpdateWorkerKey",
        (MINER, 22) => "RepayDebt",
        (MINER, 23) => "ChangeOwnerAddress",
        (MINER, 24) => "DisputeWindowedPoSt",
        (VERIFREG, 2) => "AddVerifier",
        (VERIFREG, 3) => "RemoveVerifier",
        (VERIFREG, 4) => "AddVerifiedClient",
        (VERIFREG, 5) => "UseBytes",
        (VERIFREG, 6) => "RestoreBytes",
        _ => return None,
    })
}
