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

//! Where pool round data and stakes come from.

use std::{collections::HashMap, path::Path, sync::Arc};

use alloy::primitives::U256;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use staking_rewards::{types::u256_decimal, MatchingDistributionEntry, PoolKey, Stake};

pub type PoolDataSourceObj = Arc<dyn PoolDataSource + Send + Sync>;

/// Matching results of a finished round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundMatching {
    /// Total matching funds of the round, in token base units.
    pub match_amount: U256,
    /// Stakes are weighted by how long before this time they were made.
    pub donations_end_time: DateTime<Utc>,
    pub matching_distribution: Vec<MatchingDistributionEntry>,
}

#[async_trait]
pub trait PoolDataSource {
    async fn fetch_round(&self, pool: &PoolKey) -> Result<RoundMatching>;

    async fn fetch_stakes(&self, pool: &PoolKey) -> Result<Vec<Stake>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRound {
    chain_id: u64,
    id: String,
    #[serde(with = "u256_decimal")]
    match_amount: U256,
    #[serde(deserialize_with = "end_time::deserialize")]
    donations_end_time: DateTime<Utc>,
    #[serde(default)]
    matching_distribution: Vec<MatchingDistributionEntry>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    rounds: Vec<SnapshotRound>,
    #[serde(default)]
    stakes: Vec<Stake>,
}

/// Serves rounds and stakes from a JSON export of the indexer.
///
/// The snapshot has the shape `{ "rounds": [...], "stakes": [...] }`, where each round carries
/// `chainId`, `id`, `matchAmount`, `donationsEndTime` and its `matchingDistribution` joined with
/// project anchor addresses.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    rounds: HashMap<PoolKey, RoundMatching>,
    stakes: HashMap<PoolKey, Vec<Stake>>,
}

impl SnapshotSource {
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json).context("Invalid indexer snapshot")?;

        let mut rounds = HashMap::new();
        for round in snapshot.rounds {
            let key = PoolKey::new(round.chain_id, round.id);
            let matching = RoundMatching {
                match_amount: round.match_amount,
                donations_end_time: round.donations_end_time,
                matching_distribution: round.matching_distribution,
            };
            if rounds.insert(key.clone(), matching).is_some() {
                anyhow::bail!("Round {key} appears more than once in the snapshot");
            }
        }

        let mut stakes: HashMap<PoolKey, Vec<Stake>> = HashMap::new();
        for stake in snapshot.stakes {
            let key = PoolKey::new(stake.chain_id, stake.pool_id.clone());
            stakes.entry(key).or_default().push(stake);
        }

        Ok(Self { rounds, stakes })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Failed to load snapshot {}", path.display()))
    }
}

#[async_trait]
impl PoolDataSource for SnapshotSource {
    async fn fetch_round(&self, pool: &PoolKey) -> Result<RoundMatching> {
        self.rounds.get(pool).cloned().with_context(|| format!("Round {pool} not found"))
    }

    async fn fetch_stakes(&self, pool: &PoolKey) -> Result<Vec<Stake>> {
        Ok(self.stakes.get(pool).cloned().unwrap_or_default())
    }
}

/// Round end times arrive either as RFC 3339 strings or as unix seconds.
mod end_time {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawEndTime {
        Seconds(i64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let parsed = match RawEndTime::deserialize(deserializer)? {
            RawEndTime::Seconds(secs) => DateTime::from_timestamp(secs, 0),
            RawEndTime::Text(text) => match text.trim().parse::<i64>() {
                Ok(secs) => DateTime::from_timestamp(secs, 0),
                Err(_) => {
                    let time = DateTime::parse_from_rfc3339(text.trim())
                        .map_err(|e| D::Error::custom(format!("invalid end time {text:?}: {e}")))?;
                    Some(time.with_timezone(&Utc))
                }
            },
        };
        parsed.ok_or_else(|| D::Error::custom("end time out of range"))
    }
}
