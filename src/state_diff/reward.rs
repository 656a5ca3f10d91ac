// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Reward actor state, read from the node's generic JSON rendering.
//!
//! Depending on the node version the same field is a JSON number or a decimal
//! string. Missing or malformed fields are logged and read as zero.

use num::{BigInt, Zero as _};
use serde_json::Value;
use tracing::warn;

use crate::shim::ChainEpoch;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewardActorState {
    pub cumsum_baseline: BigInt,
    pub cumsum_realized: BigInt,
    pub effective_baseline_power: BigInt,
    pub effective_network_time: i64,
    pub epoch: ChainEpoch,
    pub this_epoch_baseline_power: BigInt,
    pub this_epoch_reward: BigInt,
    pub total_mined: BigInt,
    pub simple_total: BigInt,
    pub baseline_total: BigInt,
    pub total_storage_power_reward: BigInt,
    pub this_epoch_reward_smoothed_position_estimate: BigInt,
    pub this_epoch_reward_smoothed_velocity_estimate: BigInt,
}

impl RewardActorState {
    pub fn parse(state: &Value) -> Self {
        let smoothed = state.get("ThisEpochRewardSmoothed").unwrap_or(&Value::Null);
        Self {
            cumsum_baseline: big_int_field(state, "CumsumBaseline"),
            cumsum_realized: big_int_field(state, "CumsumRealized"),
            effective_baseline_power: big_int_field(state, "EffectiveBaselinePower"),
            effective_network_time: int_field(state, "EffectiveNetworkTime"),
            epoch: int_field(state, "Epoch"),
            this_epoch_baseline_power: big_int_field(state, "ThisEpochBaselinePower"),
            this_epoch_reward: big_int_field(state, "ThisEpochReward"),
            total_mined: big_int_field(state, "TotalMined"),
            simple_total: big_int_field(state, "SimpleTotal"),
            baseline_total: big_int_field(state, "BaselineTotal"),
            total_storage_power_reward: big_int_field(state, "TotalStoragePowerReward"),
            this_epoch_reward_smoothed_position_estimate: big_int_field(smoothed, "PositionEstimate"),
            this_epoch_reward_smoothed_velocity_estimate: big_int_field(smoothed, "VelocityEstimate"),
        }
    }
}

fn big_int_field(object: &Value, field: &str) -> BigInt {
    match object.get(field) {
        None | Some(Value::Null) => BigInt::zero(),
        Some(Value::String(s)) => s.parse().unwrap_or_else(|e| {
            warn!(field, value = %s, "malformed reward state field: {e}");
            BigInt::zero()
        }),
        Some(Value::Number(n)) => n.to_string().parse().unwrap_or_else(|e| {
            // floats have no exact integer value
            warn!(field, value = %n, "malformed reward state field: {e}");
            BigInt::zero()
        }),
        Some(other) => {
            warn!(field, value = %other, "unexpected reward state field type");
            BigInt::zero()
        }
    }
}

fn int_field(object: &Value, field: &str) -> i64 {
    match object.get(field) {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Some(Value::String(s)) => s.parse().unwrap_or_else(|e| {
            warn!(field, value = %s, "malformed reward state field: {e}");
            0
        }),
        Some(other) => {
            warn!(field, value = %other, "unexpected reward state field type");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn strings_and_numbers() {
        let state = RewardActorState::parse(&json!({
            "CumsumBaseline": "123456789012345678901234567890",
            "CumsumRealized": 42,
            "EffectiveNetworkTime": 1000,
            "Epoch": "77",
            "ThisEpochReward": "5",
            "ThisEpochRewardSmoothed": {
                "PositionEstimate": "10",
                "VelocityEstimate": -3,
            },
            "TotalStoragePowerReward": "9",
        }));
        assert_eq!(
            state.cumsum_baseline,
            "123456789012345678901234567890".parse::<BigInt>().unwrap()
        );
        assert_eq!(state.cumsum_realized, BigInt::from(42));
        assert_eq!(state.effective_network_time, 1000);
        assert_eq!(state.epoch, 77);
        assert_eq!(state.this_epoch_reward, BigInt::from(5));
        assert_eq!(state.this_epoch_reward_smoothed_position_estimate, BigInt::from(10));
        assert_eq!(state.this_epoch_reward_smoothed_velocity_estimate, BigInt::from(-3));
        assert_eq!(state.total_storage_power_reward, BigInt::from(9));
    }

    #[test]
    fn malformed_fields_default_to_zero() {
        let state = RewardActorState::parse(&json!({
            "CumsumBaseline": "not a number",
            "TotalMined": [1, 2],
            "SimpleTotal": 1.5,
            "Epoch": 12.0,
            "BaselineTotal": "7",
        }));
        assert_eq!(state.cumsum_baseline, BigInt::zero());
        assert_eq!(state.total_mined, BigInt::zero());
        assert_eq!(state.simple_total, BigInt::zero());
        assert_eq!(state.epoch, 12);
        // one bad field doesn't spoil the rest
        assert_eq!(state.baseline_total, BigInt::from(7));
    }

    #[test]
    fn non_object_state() {
        assert_eq!(RewardActorState::parse(&json!(null)), RewardActorState::default());
    }
}
