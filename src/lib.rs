// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! A Filecoin chain indexer. Tipsets, blocks, messages, receipts and actor
//! state changes are read from a Lotus-compatible node and pushed to sinks,
//! both while backfilling history and while following the chain head.

#[cfg(all(feature = "jemalloc", not(feature = "rustalloc")))]
#[global_allocator]
static GLOBAL: cli_shared::tikv_jemallocator::Jemalloc = cli_shared::tikv_jemallocator::Jemalloc;

pub mod blocks;
pub mod chain_source;
mod cli;
pub mod cli_shared;
pub mod lotus_json;
pub mod message;
pub mod shim;
pub mod sink;
pub mod state_diff;
pub mod sync;
#[cfg(test)]
mod test_utils;
pub mod transport;
pub mod utils;
pub mod watchdog;

pub use cli::main as indexer_main;
pub use cli_shared::Config;
