// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Lotus exposes chain objects over JSON-RPC in its own JSON dialect:
//! - CIDs are objects of the form `{ "/": "bafy..." }`
//! - big integers (balances, weights, fees) are decimal strings
//! - byte payloads are standard base64 strings
//! - empty arrays are frequently `null`
//!
//! The indexer never sees the CBOR wire format, so the domain types in
//! [`crate::blocks`] and [`crate::message`] are plain Rust structs. Each of them
//! implements [`HasLotusJson`], which attaches a private JSON mirror type and
//! conversions to and from it.
//!
//! Whenever you need the lotus JSON of an object, use the [`LotusJson`] wrapper,
//! or annotate a field with `#[serde(with = "crate::lotus_json")]`.
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct ActorState {
//!     #[serde(with = "crate::lotus_json")]
//!     code: Cid,
//!     #[serde(with = "crate::lotus_json")]
//!     balance: BigInt,
//! }
//! ```
//!
//! ## Implementation notes
//! Prefer implementing [`HasLotusJson`] in this module for small leaf types, and
//! next to the struct definition for compound chain objects, e.g.
//! [`crate::blocks::Tipset`].
//!
//! Conversion must be tested: provide [`HasLotusJson::snapshots`] and call
//! [`assert_all_snapshots`] in the module's tests.

use derive_more::From;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
#[cfg(test)]
use serde_json::json;
use std::{fmt::Display, str::FromStr};
#[cfg(test)]
use pretty_assertions::assert_eq;

pub trait HasLotusJson: Sized {
    /// The struct representing JSON. You should `#[derive(Deserialize, Serialize)]` on it.
    type LotusJson: Serialize + DeserializeOwned;
    /// Snapshots of the JSON, and the domain value it should deserialize to.
    ///
    /// Serialization and de-serialization of the domain type should match the snapshot.
    #[cfg(test)]
    fn snapshots() -> Vec<(serde_json::Value, Self)>;
    fn into_lotus_json(self) -> Self::LotusJson;
    fn from_lotus_json(lotus_json: Self::LotusJson) -> Self;
    fn into_lotus_json_value(self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.into_lotus_json())
    }
    fn into_lotus_json_string(self) -> serde_json::Result<String> {
        serde_json::to_string(&self.into_lotus_json())
    }
    /// Decodes a domain value directly from a JSON-RPC `result`.
    fn from_lotus_json_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value::<Self::LotusJson>(value).map(Self::from_lotus_json)
    }
}

mod address;
mod big_int;
mod cid;
mod message;
mod opt;
mod receipt;
mod signature;
mod signed_message;
mod vec;
mod vec_u8;

pub use vec::*;

#[cfg(test)]
pub fn assert_all_snapshots<T>()
where
    T: HasLotusJson + PartialEq + std::fmt::Debug + Clone,
{
    let snapshots = T::snapshots();
    assert!(!snapshots.is_empty());
    for (lotus_json, val) in snapshots {
        assert_one_snapshot(lotus_json, val);
    }
}

#[cfg(test)]
pub fn assert_one_snapshot<T>(lotus_json: serde_json::Value, val: T)
where
    T: HasLotusJson + PartialEq + std::fmt::Debug + Clone,
{
    // T -> T::LotusJson -> lotus_json
    let serialized = val.clone().into_lotus_json_value().unwrap();
    assert_eq!(
        serialized,
        lotus_json,
        "snapshot failed for {}",
        std::any::type_name::<T>()
    );

    // lotus_json -> T::LotusJson -> T
    let deserialized = match serde_json::from_value::<T::LotusJson>(lotus_json.clone()) {
        Ok(lotus_json) => T::from_lotus_json(lotus_json),
        Err(e) => panic!(
            "couldn't deserialize a {} from {}: {e}",
            std::any::type_name::<T::LotusJson>(),
            lotus_json
        ),
    };
    assert_eq!(deserialized, val);
}

/// Usage: `#[serde(with = "stringify")]`
pub mod stringify {
    use super::*;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Usage: `#[serde(with = "base64_standard")]`
pub mod base64_standard {
    use super::*;

    use base64::engine::{Engine as _, general_purpose::STANDARD};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        // `null` and `""` both stand for an empty payload
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(vec![]),
        }
    }
}

/// MUST NOT be used in any `LotusJson` structs
pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: HasLotusJson + Clone,
{
    value.clone().into_lotus_json().serialize(serializer)
}

/// MUST NOT be used in any `LotusJson` structs.
pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: HasLotusJson,
{
    Ok(T::from_lotus_json(Deserialize::deserialize(deserializer)?))
}

/// A domain struct that is (de) serialized through its lotus JSON representation.
#[derive(
    Debug, Deserialize, From, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Clone,
)]
#[serde(bound = "T: HasLotusJson + Clone", transparent)]
pub struct LotusJson<T>(#[serde(with = "self")] pub T);

impl<T> LotusJson<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> LotusJson<Option<T>> {
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// A value that is represented by its [`Display`] / [`FromStr`] strings.
#[derive(Debug, Clone, PartialEq, Eq, From, Serialize, Deserialize)]
#[serde(bound = "T: Display + FromStr, T::Err: Display")]
pub struct Stringify<T>(#[serde(with = "stringify")] pub T);

macro_rules! lotus_json_with_self {
    ($($domain_ty:ty),* $(,)?) => {
        $(
            impl $crate::lotus_json::HasLotusJson for $domain_ty {
                type LotusJson = Self;
                #[cfg(test)]
                fn snapshots() -> Vec<(serde_json::Value, Self)> {
                    unimplemented!("tests are trivial for HasLotusJson<LotusJson = Self>")
                }
                fn into_lotus_json(self) -> Self::LotusJson {
                    self
                }
                fn from_lotus_json(lotus_json: Self::LotusJson) -> Self {
                    lotus_json
                }
            }
        )*
    }
}
pub(crate) use lotus_json_with_self;

lotus_json_with_self!(
    u32,
    u64,
    i64,
    String,
    serde_json::Value,
    bool,
    (),
);

// JSON-RPC positional parameters
macro_rules! tuple_lotus_json {
    ($($ty:ident),+) => {
        impl<$($ty: HasLotusJson),+> HasLotusJson for ($($ty,)+) {
            type LotusJson = ($($ty::LotusJson,)+);
            #[cfg(test)]
            fn snapshots() -> Vec<(serde_json::Value, Self)> {
                unimplemented!("tests are trivial for tuples")
            }
            #[allow(non_snake_case)]
            fn into_lotus_json(self) -> Self::LotusJson {
                let ($($ty,)+) = self;
                ($($ty.into_lotus_json(),)+)
            }
            #[allow(non_snake_case)]
            fn from_lotus_json(lotus_json: Self::LotusJson) -> Self {
                let ($($ty,)+) = lotus_json;
                ($($ty::from_lotus_json($ty),)+)
            }
        }
    };
}

tuple_lotus_json!(A);
tuple_lotus_json!(A, B);
tuple_lotus_json!(A, B, C);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Wrapped {
        #[serde(with = "crate::lotus_json")]
        root: ::cid::Cid,
        #[serde(with = "crate::lotus_json")]
        balance: num::BigInt,
    }

    #[test]
    fn field_level_with_attribute() {
        let wrapped: Wrapped = serde_json::from_value(json!({
            "Root": {"/": "baeaaaaa"},
            "Balance": "1000000000000000000000",
        }))
        .unwrap();
        assert_eq!(wrapped.root, ::cid::Cid::default());
        assert_eq!(
            wrapped.balance,
            "1000000000000000000000".parse::<num::BigInt>().unwrap()
        );
    }

    #[test]
    fn tuples_are_positional() {
        let params = (::cid::Cid::default(), 5_i64).into_lotus_json_value().unwrap();
        assert_eq!(params, json!([{"/": "baeaaaaa"}, 5]));
    }

    #[test]
    fn base64_accepts_null() {
        #[derive(Deserialize)]
        struct Bytes(#[serde(with = "base64_standard")] Vec<u8>);
        let Bytes(bytes) = serde_json::from_value(json!(null)).unwrap();
        assert!(bytes.is_empty());
    }
}
