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

//! Stakes, matching awards and reward records, with the JSON shapes used by the indexer and the
//! pool store.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Identifies a funding round: the chain it lives on and its on-chain round ID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolKey {
    pub chain_id: u64,
    pub pool_id: String,
}

impl PoolKey {
    pub fn new(chain_id: u64, pool_id: impl Into<String>) -> Self {
        Self { chain_id, pool_id: pool_id.into() }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain_id, self.pool_id)
    }
}

/// A single token lock by `sender` onto the project anchored at `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stake {
    pub chain_id: u64,
    pub pool_id: String,
    /// The staker.
    pub sender: Address,
    /// Anchor address of the project the tokens were locked on.
    pub recipient: Address,
    /// Locked amount in token base units.
    #[serde(with = "u256_decimal")]
    pub amount: U256,
    /// Unix seconds of the block containing the lock.
    #[serde(with = "unix_seconds")]
    pub block_timestamp: u64,
}

/// Matching award for one project, as computed by the quadratic funding engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingDistributionEntry {
    pub project_id: String,
    pub anchor_address: Address,
    #[serde(with = "u256_decimal")]
    pub match_amount_in_token: U256,
}

/// Reward owed to a staker for a pool, before it is committed to a Merkle tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCalculation {
    pub staker: Address,
    #[serde(with = "u256_decimal")]
    pub reward: U256,
}

/// A committed reward together with its inclusion proof against the pool's Merkle root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardWithProof {
    pub staker: Address,
    #[serde(with = "u256_decimal")]
    pub amount: U256,
    /// Sibling hashes from the leaf up to the root.
    pub proof: Vec<B256>,
}

/// Proof-less view of a reward, safe to serve to anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSummary {
    pub staker: Address,
    #[serde(with = "u256_decimal")]
    pub amount: U256,
}

impl From<&RewardWithProof> for RewardSummary {
    fn from(reward: &RewardWithProof) -> Self {
        Self { staker: reward.staker, amount: reward.amount }
    }
}

/// Merkle root over a pool's reward set, plus every reward with its proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleData {
    pub merkle_root: B256,
    pub rewards: Vec<RewardWithProof>,
}

impl MerkleData {
    /// Sum of all committed reward amounts.
    pub fn total(&self) -> U256 {
        self.rewards.iter().map(|r| r.amount).sum()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

/// Serde adapter for amounts encoded as base-10 strings. JSON integers are accepted on input.
pub mod u256_decimal {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::StringOrNumber;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => parse(&s).map_err(D::Error::custom),
            StringOrNumber::Number(n) => Ok(U256::from(n)),
        }
    }

    /// Parse a base-10 amount string.
    pub fn parse(s: &str) -> Result<U256, String> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid decimal amount {s:?}"));
        }
        U256::from_str_radix(trimmed, 10).map_err(|e| format!("invalid decimal amount {s:?}: {e}"))
    }
}

/// Serde adapter for unix timestamps that may arrive as strings or integers.
pub mod unix_seconds {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::StringOrNumber;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|e| D::Error::custom(format!("invalid unix timestamp {s:?}: {e}"))),
            StringOrNumber::Number(n) => Ok(n),
        }
    }
}
