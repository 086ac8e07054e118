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

use std::{str::FromStr, sync::Arc};

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    any::{AnyPoolOptions, AnyRow},
    AnyPool, Row,
};
use staking_rewards::{MerkleData, PoolKey, RewardSummary, RewardWithProof};

use super::DbError;

pub type PoolsDbObj = Arc<dyn PoolsDb + Send + Sync>;

const CREATE_POOLS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS pools (
        chain_id BIGINT NOT NULL,
        pool_id TEXT NOT NULL,
        merkle_root TEXT,
        rewards TEXT NOT NULL,
        updated_at BIGINT NOT NULL,
        PRIMARY KEY (chain_id, pool_id)
    )
"#;

/// A pool and its current reward commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRecord {
    pub key: PoolKey,
    /// Unset until rewards have been calculated for the pool.
    pub merkle_root: Option<B256>,
    pub rewards: Vec<RewardWithProof>,
    pub updated_at: DateTime<Utc>,
}

/// A staker's reward in one pool, without the proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReward {
    #[serde(flatten)]
    pub pool: PoolKey,
    #[serde(flatten)]
    pub reward: RewardSummary,
}

#[async_trait]
pub trait PoolsDb {
    /// Register a pool with no rewards yet.
    async fn create_pool(&self, key: &PoolKey) -> Result<(), DbError>;

    async fn get_pool(&self, key: &PoolKey) -> Result<Option<PoolRecord>, DbError>;

    /// Pools ordered by chain ID then pool ID.
    async fn list_pools(&self, offset: u64, limit: u64) -> Result<Vec<PoolRecord>, DbError>;

    /// Replace the pool's reward set and Merkle root, creating the pool if needed.
    async fn save_pool_rewards(&self, key: &PoolKey, data: &MerkleData) -> Result<(), DbError>;

    /// Rewards owed to `staker`, either in one pool or across every pool with a reward set.
    async fn get_rewards_for_staker(
        &self,
        staker: Address,
        pool: Option<&PoolKey>,
    ) -> Result<Vec<PoolReward>, DbError>;

    async fn get_reward_proof(
        &self,
        key: &PoolKey,
        staker: Address,
    ) -> Result<Option<RewardWithProof>, DbError>;
}

pub struct PoolsSqlDb {
    pool: AnyPool,
}

impl PoolsSqlDb {
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().max_connections(20).connect(database_url).await?;

        sqlx::query(CREATE_POOLS_TABLE).execute(&pool).await?;

        Ok(Self { pool })
    }
}

fn pool_from_row(row: &AnyRow) -> Result<PoolRecord, DbError> {
    let key = PoolKey::new(row.get::<i64, _>("chain_id") as u64, row.get::<String, _>("pool_id"));

    let merkle_root = row
        .get::<Option<String>, _>("merkle_root")
        .map(|root| {
            B256::from_str(&root)
                .map_err(|e| DbError::BadRecord(format!("merkle root of pool {key}: {e}")))
        })
        .transpose()?;

    let rewards: Vec<RewardWithProof> = serde_json::from_str(&row.get::<String, _>("rewards"))?;

    let updated_secs = row.get::<i64, _>("updated_at");
    let updated_at = DateTime::from_timestamp(updated_secs, 0).ok_or_else(|| {
        DbError::BadRecord(format!("update time {updated_secs} of pool {key} is out of range"))
    })?;

    Ok(PoolRecord { key, merkle_root, rewards, updated_at })
}

#[async_trait]
impl PoolsDb for PoolsSqlDb {
    async fn create_pool(&self, key: &PoolKey) -> Result<(), DbError> {
        let query = r#"
            INSERT INTO pools (chain_id, pool_id, merkle_root, rewards, updated_at)
            VALUES ($1, $2, NULL, '[]', $3)
            ON CONFLICT (chain_id, pool_id) DO NOTHING
        "#;

        let result = sqlx::query(query)
            .bind(key.chain_id as i64)
            .bind(key.pool_id.clone())
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::AlreadyExists(key.clone()));
        }
        Ok(())
    }

    async fn get_pool(&self, key: &PoolKey) -> Result<Option<PoolRecord>, DbError> {
        let query = r#"
            SELECT chain_id, pool_id, merkle_root, rewards, updated_at
            FROM pools
            WHERE chain_id = $1 AND pool_id = $2
        "#;

        let row = sqlx::query(query)
            .bind(key.chain_id as i64)
            .bind(key.pool_id.clone())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(pool_from_row).transpose()
    }

    async fn list_pools(&self, offset: u64, limit: u64) -> Result<Vec<PoolRecord>, DbError> {
        let query = r#"
            SELECT chain_id, pool_id, merkle_root, rewards, updated_at
            FROM pools
            ORDER BY chain_id, pool_id
            LIMIT $1 OFFSET $2
        "#;

        let rows =
            sqlx::query(query).bind(limit as i64).bind(offset as i64).fetch_all(&self.pool).await?;

        rows.iter().map(pool_from_row).collect()
    }

    async fn save_pool_rewards(&self, key: &PoolKey, data: &MerkleData) -> Result<(), DbError> {
        let rewards = serde_json::to_string(&data.rewards)?;

        let mut tx = self.pool.begin().await?;

        let query = r#"
            INSERT INTO pools (chain_id, pool_id, merkle_root, rewards, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chain_id, pool_id)
            DO UPDATE SET
                merkle_root = EXCLUDED.merkle_root,
                rewards = EXCLUDED.rewards,
                updated_at = EXCLUDED.updated_at
        "#;

        sqlx::query(query)
            .bind(key.chain_id as i64)
            .bind(key.pool_id.clone())
            .bind(format!("{:#x}", data.merkle_root))
            .bind(rewards)
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_rewards_for_staker(
        &self,
        staker: Address,
        pool: Option<&PoolKey>,
    ) -> Result<Vec<PoolReward>, DbError> {
        let pools = match pool {
            Some(key) => {
                vec![self.get_pool(key).await?.ok_or_else(|| DbError::PoolNotFound(key.clone()))?]
            }
            None => {
                let query = r#"
                    SELECT chain_id, pool_id, merkle_root, rewards, updated_at
                    FROM pools
                    WHERE merkle_root IS NOT NULL
                    ORDER BY chain_id, pool_id
                "#;
                let rows = sqlx::query(query).fetch_all(&self.pool).await?;
                rows.iter().map(pool_from_row).collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(pools
            .into_iter()
            .flat_map(|record| {
                let PoolRecord { key, rewards, .. } = record;
                rewards
                    .into_iter()
                    .filter(|reward| reward.staker == staker)
                    .map(move |reward| PoolReward {
                        pool: key.clone(),
                        reward: RewardSummary::from(&reward),
                    })
            })
            .collect())
    }

    async fn get_reward_proof(
        &self,
        key: &PoolKey,
        staker: Address,
    ) -> Result<Option<RewardWithProof>, DbError> {
        let record = self.get_pool(key).await?.ok_or_else(|| DbError::PoolNotFound(key.clone()))?;
        Ok(record.rewards.into_iter().find(|reward| reward.staker == staker))
    }
}
