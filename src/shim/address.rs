// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Filecoin addresses in their string form.
//!
//! The node hands out addresses already encoded for its own network (`f` or
//! `t` prefix). They are kept verbatim, so caches and sink keys match what the
//! node reports, and only the protocol and ID payload are interpreted.

use std::{fmt, str::FromStr};

use thiserror::Error;

const MAINNET_PREFIX: char = 'f';
const TESTNET_PREFIX: char = 't';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address {0:?} is too short")]
    TooShort(String),
    #[error("address {0:?} has an unknown network prefix")]
    UnknownNetwork(String),
    #[error("address {0:?} has an unknown protocol")]
    UnknownProtocol(String),
    #[error("address {0:?} has an invalid payload")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
pub enum Protocol {
    Id,
    Secp256k1,
    Actor,
    Bls,
    Delegated,
}

impl Protocol {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '0' => Self::Id,
            '1' => Self::Secp256k1,
            '2' => Self::Actor,
            '3' => Self::Bls,
            '4' => Self::Delegated,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    repr: String,
    protocol: Protocol,
}

impl Address {
    /// Well-known ID of the reward actor.
    pub const REWARD_ACTOR_ID: u64 = 2;

    pub fn new_id(id: u64) -> Self {
        Self {
            repr: format!("{MAINNET_PREFIX}0{id}"),
            protocol: Protocol::Id,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn is_id(&self) -> bool {
        self.protocol == Protocol::Id
    }

    /// The numeric actor ID of an ID address.
    pub fn id(&self) -> Option<u64> {
        match self.protocol {
            Protocol::Id => self.repr.get(2..).and_then(|payload| payload.parse().ok()),
            _ => None,
        }
    }

    pub fn is_reward_actor(&self) -> bool {
        self.id() == Some(Self::REWARD_ACTOR_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.repr
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new_id(0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(network), Some(protocol)) = (chars.next(), chars.next()) else {
            return Err(AddressError::TooShort(s.into()));
        };
        if network != MAINNET_PREFIX && network != TESTNET_PREFIX {
            return Err(AddressError::UnknownNetwork(s.into()));
        }
        let protocol =
            Protocol::from_char(protocol).ok_or_else(|| AddressError::UnknownProtocol(s.into()))?;
        let payload = chars.as_str();
        let valid = match protocol {
            Protocol::Id => payload.parse::<u64>().is_ok(),
            _ => !payload.is_empty() && payload.chars().all(|c| c.is_ascii_alphanumeric()),
        };
        if !valid {
            return Err(AddressError::InvalidPayload(s.into()));
        }
        Ok(Self {
            repr: s.into(),
            protocol,
        })
    }
}
