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

use std::{collections::HashMap, str::FromStr, sync::Arc, time::Instant};

use alloy::primitives::{Address, B256, U256};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use staking_rewards::{
    calculate_rewards, generate_merkle_data, stakes_after_cutoff, types::u256_decimal, MerkleData,
    PoolKey, RewardWithProof,
};
use tokio::sync::Mutex;

use crate::{
    db::{PoolRecord, PoolReward, PoolsDbObj},
    source::PoolDataSourceObj,
};

/// A round whose rewards can be claimed through an on-chain Merkle airdrop contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimableRound {
    pub round_id: String,
    pub chain_id: u64,
    pub merkle_airdrop_address: Address,
}

impl FromStr for ClaimableRound {
    type Err = anyhow::Error;

    /// Parses `roundId:chainId:merkleAirdropAddress`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [round_id, chain_id, address] = parts.as_slice() else {
            bail!("Expected roundId:chainId:address, got {s:?}");
        };
        if round_id.is_empty() {
            bail!("Missing round ID in {s:?}");
        }
        Ok(Self {
            round_id: round_id.to_string(),
            chain_id: chain_id.parse().with_context(|| format!("Invalid chain ID in {s:?}"))?,
            merkle_airdrop_address: address
                .parse()
                .with_context(|| format!("Invalid airdrop address in {s:?}"))?,
        })
    }
}

/// Parses a comma-separated list of claimable rounds. Blank entries are skipped.
pub fn parse_claimable_rounds(list: &str) -> Result<Vec<ClaimableRound>> {
    list.split(',').filter(|entry| !entry.trim().is_empty()).map(ClaimableRound::from_str).collect()
}

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub claimable_rounds: Vec<ClaimableRound>,
}

impl ServiceConfig {
    fn airdrop_address(&self, pool: &PoolKey) -> Option<Address> {
        self.claimable_rounds
            .iter()
            .find(|round| round.round_id == pool.pool_id && round.chain_id == pool.chain_id)
            .map(|round| round.merkle_airdrop_address)
    }
}

/// Overview of a pool's committed rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSummary {
    #[serde(flatten)]
    pub pool: PoolKey,
    pub merkle_root: Option<B256>,
    pub staker_count: usize,
    #[serde(with = "u256_decimal")]
    pub total_distributed: U256,
    pub merkle_airdrop_address: Option<Address>,
    pub is_claimable: bool,
    pub updated_at: DateTime<Utc>,
}

pub struct PoolRewardsService {
    source: PoolDataSourceObj,
    db: PoolsDbObj,
    config: ServiceConfig,
    pool_locks: Mutex<HashMap<PoolKey, Arc<Mutex<()>>>>,
}

impl PoolRewardsService {
    pub fn new(source: PoolDataSourceObj, db: PoolsDbObj, config: ServiceConfig) -> Self {
        Self { source, db, config, pool_locks: Mutex::new(HashMap::new()) }
    }

    async fn pool_lock(&self, pool: &PoolKey) -> Arc<Mutex<()>> {
        self.pool_locks.lock().await.entry(pool.clone()).or_default().clone()
    }

    async fn release_pool_lock(&self, pool: &PoolKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.pool_locks.lock().await;
        drop(lock);
        // Clones are only handed out under the map lock, so a count of one means no run is
        // holding or waiting on this pool.
        if locks.get(pool).is_some_and(|held| Arc::strong_count(held) == 1) {
            locks.remove(pool);
        }
    }

    /// Calculate the rewards of a finished round, commit them to a Merkle root and store the
    /// result as the pool's reward set.
    ///
    /// Runs for the same pool are serialized; the last one to finish owns the stored set.
    pub async fn calculate(&self, pool: &PoolKey, total_reward_pool: U256) -> Result<MerkleData> {
        let lock = self.pool_lock(pool).await;
        let result = {
            let _guard = lock.lock().await;
            self.calculate_locked(pool, total_reward_pool).await
        };
        self.release_pool_lock(pool, lock).await;
        result
    }

    async fn calculate_locked(
        &self,
        pool: &PoolKey,
        total_reward_pool: U256,
    ) -> Result<MerkleData> {
        let start_time = Instant::now();
        tracing::info!("Calculating rewards for pool {pool}");

        let round = self
            .source
            .fetch_round(pool)
            .await
            .with_context(|| format!("Failed to fetch round for pool {pool}"))?;
        let stakes = self
            .source
            .fetch_stakes(pool)
            .await
            .with_context(|| format!("Failed to fetch stakes for pool {pool}"))?;

        let cutoff = u64::try_from(round.donations_end_time.timestamp()).with_context(|| {
            format!("Donation end time {} of pool {pool} is before 1970", round.donations_end_time)
        })?;

        let late = stakes_after_cutoff(&stakes, cutoff);
        if !late.is_empty() {
            tracing::warn!(
                "{} of {} stakes in pool {pool} were made after the donation end time and carry no weight",
                late.len(),
                stakes.len()
            );
        }
        tracing::debug!(
            "Pool {pool}: {} stakes, {} matched projects, match amount {}",
            stakes.len(),
            round.matching_distribution.len(),
            round.match_amount
        );

        let rewards = calculate_rewards(
            total_reward_pool,
            round.match_amount,
            cutoff,
            &round.matching_distribution,
            &stakes,
        )
        .with_context(|| format!("Failed to calculate rewards for pool {pool}"))?;

        let data = generate_merkle_data(&rewards);
        if !data.rewards.is_empty() && data.total() != total_reward_pool {
            bail!(
                "Rewards for pool {pool} sum to {} instead of the reward pool {total_reward_pool}",
                data.total()
            );
        }

        self.db
            .save_pool_rewards(pool, &data)
            .await
            .with_context(|| format!("Failed to save rewards for pool {pool}"))?;

        tracing::info!(
            "Committed {} rewards for pool {pool} under root {:#x} in {:.2}s",
            data.rewards.len(),
            data.merkle_root,
            start_time.elapsed().as_secs_f64()
        );
        Ok(data)
    }

    pub async fn create_pool(&self, pool: &PoolKey) -> Result<()> {
        self.db.create_pool(pool).await?;
        tracing::info!("Created pool {pool}");
        Ok(())
    }

    pub async fn pool_summary(&self, pool: &PoolKey) -> Result<PoolSummary> {
        let record =
            self.db.get_pool(pool).await?.with_context(|| format!("Pool {pool} not found"))?;
        Ok(self.summarize(record))
    }

    /// Summaries of known pools, ordered by chain ID then pool ID.
    pub async fn list_pools(&self, offset: u64, limit: u64) -> Result<Vec<PoolSummary>> {
        let records = self.db.list_pools(offset, limit).await?;
        Ok(records.into_iter().map(|record| self.summarize(record)).collect())
    }

    fn summarize(&self, record: PoolRecord) -> PoolSummary {
        let merkle_airdrop_address = self.config.airdrop_address(&record.key);
        PoolSummary {
            staker_count: record.rewards.len(),
            total_distributed: record.rewards.iter().map(|reward| reward.amount).sum(),
            merkle_root: record.merkle_root,
            merkle_airdrop_address,
            is_claimable: merkle_airdrop_address.is_some(),
            updated_at: record.updated_at,
            pool: record.key,
        }
    }

    /// Rewards owed to `staker` in one pool, or in every pool when `pool` is `None`.
    pub async fn rewards_for_staker(
        &self,
        staker: Address,
        pool: Option<&PoolKey>,
    ) -> Result<Vec<PoolReward>> {
        Ok(self.db.get_rewards_for_staker(staker, pool).await?)
    }

    pub async fn proof_for_staker(
        &self,
        pool: &PoolKey,
        staker: Address,
    ) -> Result<Option<RewardWithProof>> {
        Ok(self.db.get_reward_proof(pool, staker).await?)
    }
}
