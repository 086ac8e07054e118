// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Staking rewards for quadratic funding pools.
//!
//! After a round ends, part of the matching pool is paid out to the addresses that staked on the
//! projects that received matching funds. [calculate_rewards] turns a pool's matching
//! distribution and raw stakes into per-staker rewards, and [generate_merkle_data] commits to the
//! reward set with a Merkle root and hands out the proofs stakers submit to the claim contract.
//!
//! Both steps are pure computations over in-memory data.

pub mod error;
pub mod merkle;
pub mod staking;
pub mod types;

pub use error::RewardsError;

pub use merkle::{
    generate_merkle_data, hash_pair, reward_leaf, verify_proof, verify_reward, RewardsMerkleTree,
    EMPTY_TREE_ROOT,
};

pub use staking::{calculate_rewards, stakes_after_cutoff, time_weight};

pub use types::{
    MatchingDistributionEntry, MerkleData, PoolKey, RewardCalculation, RewardSummary,
    RewardWithProof, Stake,
};

// Re-export the primitive types used throughout the public API.
pub use alloy_primitives::{Address, B256, U256};
