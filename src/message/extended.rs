// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeSet;

use crate::message::{Message, Receipt};
use crate::shim::{ChainEpoch, address::Address};
use ::cid::Cid;
use num::BigInt;

/// A message as mined in one tipset, with its resolved context.
///
/// A message may be included by several blocks of the same tipset, one
/// `MessageExtended` carries all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageExtended {
    pub cid: Cid,
    pub height: ChainEpoch,
    pub block_cids: BTreeSet<Cid>,
    pub message: Message,
    pub from_id: Option<Address>,
    pub to_id: Option<Address>,
    pub from_type: String,
    pub to_type: String,
    pub method_name: String,
    pub timestamp: u64,
    pub parent_base_fee: BigInt,
}

impl MessageExtended {
    /// Folds another observation of the same message into this one.
    pub fn merge(&mut self, other: MessageExtended) {
        debug_assert_eq!(self.cid, other.cid);
        self.block_cids.extend(other.block_cids);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptWithCid {
    /// CID of the message the receipt belongs to.
    pub cid: Cid,
    pub receipt: Receipt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cid_of;

    #[test]
    fn merge_unions_block_cids() {
        let (b1, b2) = (cid_of("b1"), cid_of("b2"));
        let base = MessageExtended {
            cid: cid_of("m"),
            height: 10,
            block_cids: BTreeSet::from([b1]),
            message: Message::default(),
            from_id: None,
            to_id: None,
            from_type: String::new(),
            to_type: String::new(),
            method_name: "Send".into(),
            timestamp: 0,
            parent_base_fee: BigInt::from(0),
        };
        let mut merged = base.clone();
        merged.merge(MessageExtended {
            block_cids: BTreeSet::from([b2, b1]),
            ..base
        });
        assert_eq!(merged.block_cids, BTreeSet::from([b1, b2]));
    }
}
