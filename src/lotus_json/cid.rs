// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;

use ::cid::Cid;

#[derive(Serialize, Deserialize)]
pub struct CidLotusJson {
    #[serde(rename = "/", with = "stringify")]
    slash: Cid,
}

impl HasLotusJson for Cid {
    type LotusJson = CidLotusJson;

    #[cfg(test)]
    fn snapshots() -> Vec<(serde_json::Value, Self)> {
        vec![(json!({"/": "baeaaaaa"}), Cid::default())]
    }

    fn into_lotus_json(self) -> Self::LotusJson {
        CidLotusJson { slash: self }
    }

    fn from_lotus_json(CidLotusJson { slash }: Self::LotusJson) -> Self {
        slash
    }
}

#[test]
fn snapshots() {
    assert_all_snapshots::<Cid>();
}
