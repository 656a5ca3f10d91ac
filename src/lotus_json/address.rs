// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;

use crate::shim::address::Address;

impl HasLotusJson for Address {
    type LotusJson = Stringify<Address>;

    #[cfg(test)]
    fn snapshots() -> Vec<(serde_json::Value, Self)> {
        vec![
            (json!("f01"), Address::new_id(1)),
            (json!("t0100"), "t0100".parse().unwrap()),
        ]
    }

    fn into_lotus_json(self) -> Self::LotusJson {
        self.into()
    }

    fn from_lotus_json(Stringify(address): Self::LotusJson) -> Self {
        address
    }
}

#[test]
fn snapshots() {
    assert_all_snapshots::<Address>();
}
