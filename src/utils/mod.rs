// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod io;
#[cfg(feature = "sqlite")]
pub mod sqlite;
