// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod address;
pub mod crypto;

/// Chain height.
pub type ChainEpoch = i64;
