// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;

use crate::shim::crypto::Signature;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignatureLotusJson {
    r#type: u8,
    data: LotusJson<Vec<u8>>,
}

impl HasLotusJson for Signature {
    type LotusJson = SignatureLotusJson;

    #[cfg(test)]
    fn snapshots() -> Vec<(serde_json::Value, Self)> {
        vec![(
            json!({"Type": 2, "Data": "aGVsbG8gd29ybGQh"}),
            Signature {
                sig_type: 2,
                bytes: Vec::from_iter(*b"hello world!"),
            },
        )]
    }

    fn into_lotus_json(self) -> Self::LotusJson {
        let Signature { sig_type, bytes } = self;
        SignatureLotusJson {
            r#type: sig_type,
            data: bytes.into(),
        }
    }

    fn from_lotus_json(SignatureLotusJson { r#type, data }: Self::LotusJson) -> Self {
        Signature {
            sig_type: r#type,
            bytes: data.into_inner(),
        }
    }
}

#[test]
fn snapshots() {
    assert_all_snapshots::<Signature>();
}
