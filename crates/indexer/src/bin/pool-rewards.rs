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

use std::{path::PathBuf, sync::Arc};

use alloy::primitives::{Address, B256, U256};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use staking_rewards::{types::u256_decimal, verify_reward, PoolKey};
use staking_rewards_indexer::{
    db::{PoolsDbObj, PoolsSqlDb},
    rewards::{parse_claimable_rounds, PoolRewardsService, ServiceConfig},
    source::{PoolDataSourceObj, SnapshotSource},
};

/// Calculate, store and look up staking rewards for funding pools.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct PoolRewardsArgs {
    #[clap(subcommand)]
    command: Command,

    /// DB connection string.
    #[clap(long, env = "DATABASE_URL", global = true)]
    db: Option<String>,

    /// Rounds with a Merkle airdrop contract, as comma-separated roundId:chainId:address entries.
    #[clap(long, env = "ROUNDS_WITH_MERKLE_AIRDROP_CONTRACTS", global = true)]
    claimable_rounds: Option<String>,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false, global = true)]
    log_json: bool,
}

#[derive(Args, Debug, Clone)]
struct PoolArgs {
    #[clap(long)]
    chain_id: u64,

    #[clap(long)]
    pool_id: String,
}

impl PoolArgs {
    fn key(&self) -> PoolKey {
        PoolKey::new(self.chain_id, self.pool_id.clone())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a pool with no rewards yet.
    CreatePool {
        #[clap(flatten)]
        pool: PoolArgs,
    },
    /// Calculate and store the rewards of a finished round from an indexer snapshot.
    Calculate {
        #[clap(flatten)]
        pool: PoolArgs,

        /// JSON file with the round's matching distribution and stakes.
        #[clap(long)]
        snapshot: PathBuf,

        /// Tokens to distribute, in base units.
        #[clap(long, value_parser = parse_amount)]
        total_reward_pool: U256,
    },
    /// List a staker's rewards across all pools, or in one pool.
    Rewards {
        #[clap(long)]
        staker: Address,

        #[clap(long, requires = "pool_id")]
        chain_id: Option<u64>,

        #[clap(long, requires = "chain_id")]
        pool_id: Option<String>,
    },
    /// Print a staker's reward in a pool together with its Merkle proof.
    Proof {
        #[clap(flatten)]
        pool: PoolArgs,

        #[clap(long)]
        staker: Address,
    },
    /// Print an overview of a pool's committed rewards.
    Summary {
        #[clap(flatten)]
        pool: PoolArgs,
    },
    /// List pools with their reward summaries.
    Pools {
        #[clap(long, default_value = "0")]
        offset: u64,

        #[clap(long, default_value = "10")]
        limit: u64,
    },
    /// Check a reward claim against a Merkle root.
    Verify {
        #[clap(long)]
        root: B256,

        #[clap(long)]
        staker: Address,

        #[clap(long, value_parser = parse_amount)]
        amount: U256,

        /// Comma-separated sibling hashes, leaf level first.
        #[clap(long, value_delimiter = ',')]
        proof: Vec<B256>,
    },
}

fn parse_amount(s: &str) -> Result<U256, String> {
    u256_decimal::parse(s)
}

#[derive(Serialize)]
struct Verification {
    valid: bool,
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect(args: &PoolRewardsArgs, source: PoolDataSourceObj) -> Result<PoolRewardsService> {
    let db_url = args.db.as_deref().context("A database URL is required (--db or DATABASE_URL)")?;
    let db: PoolsDbObj =
        Arc::new(PoolsSqlDb::new(db_url).await.context("Failed to connect to the database")?);

    let claimable_rounds = match &args.claimable_rounds {
        Some(list) => parse_claimable_rounds(list).context("Invalid claimable rounds")?,
        None => Vec::new(),
    };

    Ok(PoolRewardsService::new(source, db, ServiceConfig { claimable_rounds }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = PoolRewardsArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    // Stdout carries the command output, so logs go to stderr.
    if args.log_json {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    match &args.command {
        Command::CreatePool { pool } => {
            let service = connect(&args, Arc::new(SnapshotSource::default())).await?;
            let key = pool.key();
            service.create_pool(&key).await?;
            print_json(&key)?;
        }
        Command::Calculate { pool, snapshot, total_reward_pool } => {
            let source = SnapshotSource::from_path(snapshot).await?;
            let service = connect(&args, Arc::new(source)).await?;
            let data = service.calculate(&pool.key(), *total_reward_pool).await?;
            print_json(&data)?;
        }
        Command::Rewards { staker, chain_id, pool_id } => {
            let service = connect(&args, Arc::new(SnapshotSource::default())).await?;
            let key = match (chain_id, pool_id) {
                (Some(chain_id), Some(pool_id)) => Some(PoolKey::new(*chain_id, pool_id.clone())),
                _ => None,
            };
            let rewards = service.rewards_for_staker(*staker, key.as_ref()).await?;
            print_json(&rewards)?;
        }
        Command::Proof { pool, staker } => {
            let service = connect(&args, Arc::new(SnapshotSource::default())).await?;
            let key = pool.key();
            let Some(reward) = service.proof_for_staker(&key, *staker).await? else {
                bail!("No reward for {staker} in pool {key}");
            };
            print_json(&reward)?;
        }
        Command::Summary { pool } => {
            let service = connect(&args, Arc::new(SnapshotSource::default())).await?;
            print_json(&service.pool_summary(&pool.key()).await?)?;
        }
        Command::Pools { offset, limit } => {
            let service = connect(&args, Arc::new(SnapshotSource::default())).await?;
            print_json(&service.list_pools(*offset, *limit).await?)?;
        }
        Command::Verify { root, staker, amount, proof } => {
            let valid = verify_reward(*staker, *amount, proof, *root);
            print_json(&Verification { valid })?;
            if !valid {
                bail!("Proof for {staker} does not verify against root {root:#x}");
            }
        }
    }

    Ok(())
}
