// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

/// A block or message signature. The indexer forwards signatures verbatim
/// and never verifies them, so the type byte is kept as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub sig_type: u8,
    pub bytes: Vec<u8>,
}

