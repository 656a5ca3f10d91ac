// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod header;
mod tipset;

pub use header::{BeaconEntry, BlockHeader, ElectionProof, PoStProof, RawBlockHeader, Ticket};
pub use tipset::{CreateTipsetError, SyncedTipset, Tipset, TipsetKey, TipsetState};
