// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;

use crate::message::Message;
use crate::shim::address::Address;
use num::BigInt;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageLotusJson {
    #[serde(default)]
    version: u64,
    #[serde(with = "crate::lotus_json")]
    to: Address,
    #[serde(with = "crate::lotus_json")]
    from: Address,
    #[serde(default)]
    nonce: u64,
    #[serde(with = "crate::lotus_json", default)]
    value: BigInt,
    #[serde(default)]
    gas_limit: u64,
    #[serde(with = "crate::lotus_json", default)]
    gas_fee_cap: BigInt,
    #[serde(with = "crate::lotus_json", default)]
    gas_premium: BigInt,
    #[serde(default)]
    method: u64,
    #[serde(with = "crate::lotus_json", default)]
    params: Vec<u8>,
}

impl HasLotusJson for Message {
    type LotusJson = MessageLotusJson;

    #[cfg(test)]
    fn snapshots() -> Vec<(serde_json::Value, Self)> {
        vec![(
            json!({
                "From": "f00",
                "GasFeeCap": "0",
                "GasLimit": 0,
                "GasPremium": "0",
                "Method": 0,
                "Nonce": 0,
                "Params": "",
                "To": "f00",
                "Value": "0",
                "Version": 0,
            }),
            Message::default(),
        )]
    }

    fn into_lotus_json(self) -> Self::LotusJson {
        let Self {
            version,
            from,
            to,
            sequence,
            value,
            method_num,
            params,
            gas_limit,
            gas_fee_cap,
            gas_premium,
        } = self;
        Self::LotusJson {
            version,
            to,
            from,
            nonce: sequence,
            value,
            gas_limit,
            gas_fee_cap,
            gas_premium,
            method: method_num,
            params,
        }
    }

    fn from_lotus_json(lotus_json: Self::LotusJson) -> Self {
        let Self::LotusJson {
            version,
            to,
            from,
            nonce,
            value,
            gas_limit,
            gas_fee_cap,
            gas_premium,
            method,
            params,
        } = lotus_json;
        Self {
            version,
            from,
            to,
            sequence: nonce,
            value,
            method_num: method,
            params,
            gas_limit,
            gas_fee_cap,
            gas_premium,
        }
    }
}

#[test]
fn snapshots() {
    assert_all_snapshots::<Message>();
}
