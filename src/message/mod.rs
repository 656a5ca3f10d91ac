// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod extended;

pub use extended::{MessageExtended, ReceiptWithCid};

use crate::shim::{address::Address, crypto::Signature};
use ::cid::Cid;
use num::BigInt;

/// An unsigned state-transition instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub version: u64,
    pub from: Address,
    pub to: Address,
    pub sequence: u64,
    pub value: BigInt,
    pub method_num: u64,
    pub params: Vec<u8>,
    pub gas_limit: u64,
    pub gas_fee_cap: BigInt,
    pub gas_premium: BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignedMessage {
    pub message: Message,
    pub signature: Signature,
}

/// Execution result of one message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Receipt {
    pub exit_code: i64,
    pub return_data: Vec<u8>,
    pub gas_used: u64,
    pub events_root: Option<Cid>,
}

/// Messages included by one block, keyed by their CIDs. BLS messages come
/// first, followed by secp256k1 messages, matching `Filecoin.ChainGetBlockMessages`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockMessages {
    pub messages: Vec<(Cid, Message)>,
}

impl BlockMessages {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cids(&self) -> impl Iterator<Item = &Cid> {
        self.messages.iter().map(|(cid, _)| cid)
    }
}

/// An entry of `Filecoin.ChainGetParentMessages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentMessage {
    pub cid: Cid,
    pub message: Message,
}

pub(crate) mod lotus_json {
    use super::*;
    use crate::lotus_json::{HasLotusJson, LotusJson};
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("block messages list {cids} CIDs for {messages} messages")]
    pub struct CidCountMismatch {
        cids: usize,
        messages: usize,
    }

    #[derive(Clone, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct BlockMessagesLotusJsonInner {
        bls_messages: LotusJson<Vec<Message>>,
        secpk_messages: LotusJson<Vec<SignedMessage>>,
        cids: LotusJson<Vec<Cid>>,
    }

    #[derive(Clone, Serialize, Deserialize)]
    #[serde(
        try_from = "BlockMessagesLotusJsonInner",
        into = "BlockMessagesLotusJsonInner"
    )]
    pub struct BlockMessagesLotusJson(BlockMessages);

    impl TryFrom<BlockMessagesLotusJsonInner> for BlockMessagesLotusJson {
        type Error = CidCountMismatch;

        fn try_from(value: BlockMessagesLotusJsonInner) -> Result<Self, Self::Error> {
            let BlockMessagesLotusJsonInner {
                bls_messages,
                secpk_messages,
                cids,
            } = value;
            let (bls, secpk, cids) = (
                bls_messages.into_inner(),
                secpk_messages.into_inner(),
                cids.into_inner(),
            );
            let messages = bls.len() + secpk.len();
            if cids.len() != messages {
                return Err(CidCountMismatch {
                    cids: cids.len(),
                    messages,
                });
            }
            let messages = cids
                .into_iter()
                .zip(
                    bls.into_iter()
                        .chain(secpk.into_iter().map(|signed| signed.message)),
                )
                .collect();
            Ok(Self(BlockMessages { messages }))
        }
    }

    // Signatures are not retained, secp256k1 messages are emitted unsigned.
    impl From<BlockMessagesLotusJson> for BlockMessagesLotusJsonInner {
        fn from(BlockMessagesLotusJson(block_messages): BlockMessagesLotusJson) -> Self {
            let (cids, messages): (Vec<_>, Vec<_>) = block_messages.messages.into_iter().unzip();
            Self {
                bls_messages: messages.into(),
                secpk_messages: Vec::<SignedMessage>::new().into(),
                cids: cids.into(),
            }
        }
    }

    impl HasLotusJson for BlockMessages {
        type LotusJson = BlockMessagesLotusJson;

        #[cfg(test)]
        fn snapshots() -> Vec<(serde_json::Value, Self)> {
            unimplemented!("block messages are tested in the parent module")
        }

        fn into_lotus_json(self) -> Self::LotusJson {
            BlockMessagesLotusJson(self)
        }

        fn from_lotus_json(BlockMessagesLotusJson(block_messages): Self::LotusJson) -> Self {
            block_messages
        }
    }

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct ParentMessageLotusJson {
        cid: LotusJson<Cid>,
        message: LotusJson<Message>,
    }

    impl HasLotusJson for ParentMessage {
        type LotusJson = ParentMessageLotusJson;

        #[cfg(test)]
        fn snapshots() -> Vec<(serde_json::Value, Self)> {
            unimplemented!("parent messages are tested in the parent module")
        }

        fn into_lotus_json(self) -> Self::LotusJson {
            ParentMessageLotusJson {
                cid: self.cid.into(),
                message: self.message.into(),
            }
        }

        fn from_lotus_json(ParentMessageLotusJson { cid, message }: Self::LotusJson) -> Self {
            Self {
                cid: cid.into_inner(),
                message: message.into_inner(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lotus_json::HasLotusJson;
    use crate::test_utils::cid_of;
    use serde_json::json;

    fn message_json(nonce: u64) -> serde_json::Value {
        json!({
            "Version": 0,
            "To": "f01",
            "From": "f0100",
            "Nonce": nonce,
            "Value": "0",
            "GasLimit": 1000,
            "GasFeeCap": "1",
            "GasPremium": "1",
            "Method": 2,
            "Params": null,
        })
    }

    #[test]
    fn block_messages_zip_bls_then_secpk() {
        let (bls, secpk) = (cid_of("bls"), cid_of("secpk"));
        let decoded = BlockMessages::from_lotus_json_value(json!({
            "BlsMessages": [message_json(1)],
            "SecpkMessages": [{
                "Message": message_json(2),
                "Signature": {"Type": 1, "Data": "aGVsbG8="},
            }],
            "Cids": [{"/": bls.to_string()}, {"/": secpk.to_string()}],
        }))
        .unwrap();
        assert_eq!(decoded.cids().copied().collect::<Vec<_>>(), vec![bls, secpk]);
        assert_eq!(decoded.messages[0].1.sequence, 1);
        assert_eq!(decoded.messages[1].1.sequence, 2);
    }

    #[test]
    fn block_messages_with_nulls_are_empty() {
        let decoded = BlockMessages::from_lotus_json_value(json!({
            "BlsMessages": null,
            "SecpkMessages": null,
            "Cids": null,
        }))
        .unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn block_messages_reject_missing_cids() {
        let decoded = BlockMessages::from_lotus_json_value(json!({
            "BlsMessages": [message_json(1)],
            "SecpkMessages": [],
            "Cids": [],
        }));
        assert!(decoded.is_err());
    }

    #[test]
    fn parent_messages() {
        let cid = cid_of("parent");
        let decoded = Vec::<ParentMessage>::from_lotus_json_value(json!([
            {"Cid": {"/": cid.to_string()}, "Message": message_json(3)}
        ]))
        .unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].cid, cid);
        assert_eq!(decoded[0].message.method_num, 2);
    }
}
