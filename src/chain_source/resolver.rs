// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use ahash::HashMap;
use parking_lot::RwLock;

use crate::shim::address::Address;

/// Process-wide memo of address resolutions.
///
/// Resolving an address costs a round trip to the node, while the same
/// addresses recur at every height. Entries are never evicted, the maps only
/// grow with the set of addresses actually seen.
#[derive(Debug, Default)]
pub struct AddressResolver {
    /// robust (key) address -> ID address
    ids: RwLock<HashMap<Address, Address>>,
    /// ID address -> robust (key) address
    keys: RwLock<HashMap<Address, Address>>,
    /// ID address -> actor type name
    types: RwLock<HashMap<Address, String>>,
}

impl AddressResolver {
    /// ID addresses resolve to themselves.
    pub fn id_of(&self, address: &Address) -> Option<Address> {
        if address.is_id() {
            return Some(address.clone());
        }
        self.ids.read().get(address).cloned()
    }

    pub fn key_of(&self, id: &Address) -> Option<Address> {
        self.keys.read().get(id).cloned()
    }

    pub fn type_of(&self, id: &Address) -> Option<String> {
        self.types.read().get(id).cloned()
    }

    /// Remembers both directions of a resolution.
    pub fn insert_pair(&self, key: Address, id: Address) {
        self.keys.write().entry(id.clone()).or_insert_with(|| key.clone());
        self.ids.write().entry(key).or_insert(id);
    }

    /// Only ID addresses carry a type.
    pub fn insert_type(&self, id: Address, actor_type: impl Into<String>) {
        if id.is_id() {
            self.types.write().entry(id).or_insert_with(|| actor_type.into());
        }
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn id_addresses_resolve_to_themselves() {
        let resolver = AddressResolver::default();
        assert_eq!(resolver.id_of(&addr("f01000")), Some(addr("f01000")));
        assert!(resolver.is_empty());
    }

    #[test]
    fn pairs_resolve_both_ways() {
        let resolver = AddressResolver::default();
        let key = addr("f1abjxfbp274xpdqcpuaykwkfb43omjotacm2p3za");
        assert_eq!(resolver.id_of(&key), None);
        resolver.insert_pair(key.clone(), addr("f0100"));
        assert_eq!(resolver.id_of(&key), Some(addr("f0100")));
        assert_eq!(resolver.key_of(&addr("f0100")), Some(key));
    }

    #[test]
    fn entries_are_append_only() {
        let resolver = AddressResolver::default();
        resolver.insert_type(addr("f0100"), "account");
        resolver.insert_type(addr("f0100"), "multisig");
        assert_eq!(resolver.type_of(&addr("f0100")).as_deref(), Some("account"));
    }

    #[test]
    fn robust_addresses_have_no_type() {
        let resolver = AddressResolver::default();
        let key = addr("f1abjxfbp274xpdqcpuaykwkfb43omjotacm2p3za");
        resolver.insert_type(key.clone(), "account");
        assert_eq!(resolver.type_of(&key), None);
    }
}
