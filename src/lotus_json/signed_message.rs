// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;

use crate::message::{Message, SignedMessage};
use crate::shim::crypto::Signature;
use ::cid::Cid;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignedMessageLotusJson {
    message: LotusJson<Message>,
    signature: LotusJson<Signature>,
    #[serde(rename = "CID", skip_serializing_if = "LotusJson::is_none", default)]
    cid: LotusJson<Option<Cid>>,
}

impl HasLotusJson for SignedMessage {
    type LotusJson = SignedMessageLotusJson;

    #[cfg(test)]
    fn snapshots() -> Vec<(serde_json::Value, Self)> {
        vec![(
            json!({
                "Message": {
                    "From": "f00",
                    "GasFeeCap": "0",
                    "GasLimit": 0,
                    "GasPremium": "0",
                    "Method": 0,
                    "Nonce": 0,
                    "Params": "",
                    "To": "f00",
                    "Value": "0",
                    "Version": 0
                },
                "Signature": {"Type": 2, "Data": "aGVsbG8gd29ybGQh"}
            }),
            SignedMessage {
                message: Message::default(),
                signature: Signature {
                    sig_type: 2,
                    bytes: Vec::from_iter(*b"hello world!"),
                },
            },
        )]
    }

    fn into_lotus_json(self) -> Self::LotusJson {
        let Self { message, signature } = self;
        Self::LotusJson {
            message: message.into(),
            signature: signature.into(),
            cid: None.into(),
        }
    }

    // The embedded CID is informational, block message CIDs are authoritative.
    fn from_lotus_json(lotus_json: Self::LotusJson) -> Self {
        let Self::LotusJson {
            message, signature, ..
        } = lotus_json;
        Self {
            message: message.into_inner(),
            signature: signature.into_inner(),
        }
    }
}

#[test]
fn snapshots() {
    assert_all_snapshots::<SignedMessage>();
}
