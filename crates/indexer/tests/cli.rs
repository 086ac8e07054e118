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

//! Integration tests for the pool-rewards binary.

mod common;

use std::io::Write;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use staking_rewards::{MerkleData, RewardWithProof};
use tempfile::NamedTempFile;

use common::{CHAIN_ID, POOL_ID, STAKER_A, STAKER_B};

struct Env {
    db_url: String,
    snapshot: NamedTempFile,
    _db_file: NamedTempFile,
}

fn setup() -> anyhow::Result<Env> {
    let db_file = NamedTempFile::new()?;
    let db_url = format!("sqlite:{}", db_file.path().display());

    let mut snapshot = NamedTempFile::new()?;
    snapshot.write_all(common::snapshot().to_string().as_bytes())?;

    Ok(Env { db_url, snapshot, _db_file: db_file })
}

fn pool_rewards(env: &Env) -> anyhow::Result<Command> {
    let mut cmd = Command::cargo_bin("pool-rewards")?;
    cmd.env("DATABASE_URL", &env.db_url)
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "staking_rewards_indexer=debug,info")
        .env_remove("ROUNDS_WITH_MERKLE_AIRDROP_CONTRACTS");
    Ok(cmd)
}

fn pool_args() -> [String; 4] {
    ["--chain-id".into(), CHAIN_ID.to_string(), "--pool-id".into(), POOL_ID.into()]
}

fn calculate(env: &Env) -> anyhow::Result<MerkleData> {
    let output = pool_rewards(env)?
        .arg("calculate")
        .args(pool_args())
        .arg("--snapshot")
        .arg(env.snapshot.path())
        .args(["--total-reward-pool", "1000"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    Ok(serde_json::from_slice(&output)?)
}

#[test]
fn test_create_pool_twice_fails() -> anyhow::Result<()> {
    let env = setup()?;

    pool_rewards(&env)?
        .arg("create-pool")
        .args(pool_args())
        .assert()
        .success()
        .stdout(contains(r#""poolId": "609""#));

    pool_rewards(&env)?
        .arg("create-pool")
        .args(pool_args())
        .assert()
        .failure()
        .stderr(contains("already exists"));

    Ok(())
}

#[test]
fn test_calculate_then_claim_with_proof() -> anyhow::Result<()> {
    let env = setup()?;
    let data = calculate(&env)?;
    assert_eq!(data.rewards.len(), 2);
    assert_eq!(data.total().to::<u64>(), 1000);

    let output = pool_rewards(&env)?
        .arg("proof")
        .args(pool_args())
        .args(["--staker", &format!("{STAKER_B:#x}")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let reward: RewardWithProof = serde_json::from_slice(&output)?;
    assert_eq!(reward.staker, STAKER_B);
    assert_eq!(reward.amount.to::<u64>(), 750);

    let proof: Vec<String> = reward.proof.iter().map(|node| format!("{node:#x}")).collect();
    let mut verify = pool_rewards(&env)?;
    verify
        .arg("verify")
        .args(["--root", &format!("{:#x}", data.merkle_root)])
        .args(["--staker", &format!("{STAKER_B:#x}")])
        .args(["--amount", "750"])
        .args(["--proof", &proof.join(",")])
        .assert()
        .success()
        .stdout(contains(r#""valid": true"#));

    let mut tampered = pool_rewards(&env)?;
    tampered
        .arg("verify")
        .args(["--root", &format!("{:#x}", data.merkle_root)])
        .args(["--staker", &format!("{STAKER_B:#x}")])
        .args(["--amount", "751"])
        .args(["--proof", &proof.join(",")])
        .assert()
        .failure()
        .stdout(contains(r#""valid": false"#));

    Ok(())
}

#[test]
fn test_rewards_and_summary() -> anyhow::Result<()> {
    let env = setup()?;
    calculate(&env)?;

    let output = pool_rewards(&env)?
        .arg("rewards")
        .args(["--staker", &format!("{STAKER_A:#x}")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rewards: Value = serde_json::from_slice(&output)?;
    assert_eq!(rewards[0]["amount"], "250");
    assert_eq!(rewards[0]["chainId"], CHAIN_ID);
    assert!(rewards[0].get("proof").is_none());

    let airdrop = format!("{POOL_ID}:{CHAIN_ID}:0x{}", "dd".repeat(20));
    pool_rewards(&env)?
        .env("ROUNDS_WITH_MERKLE_AIRDROP_CONTRACTS", airdrop)
        .arg("summary")
        .args(pool_args())
        .assert()
        .success()
        .stdout(contains(r#""isClaimable": true"#))
        .stdout(contains(r#""stakerCount": 2"#));

    Ok(())
}

#[test]
fn test_pool_filter_needs_both_ids() -> anyhow::Result<()> {
    let env = setup()?;
    pool_rewards(&env)?
        .args(["rewards", "--staker", &format!("{STAKER_A:#x}"), "--chain-id", "1"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_missing_database_url() -> anyhow::Result<()> {
    let env = setup()?;
    pool_rewards(&env)?
        .env_remove("DATABASE_URL")
        .arg("summary")
        .args(pool_args())
        .assert()
        .failure()
        .stderr(contains("database URL is required"));
    Ok(())
}

#[test]
fn test_unknown_round() -> anyhow::Result<()> {
    let env = setup()?;
    pool_rewards(&env)?
        .args(["calculate", "--chain-id", "1", "--pool-id", "404"])
        .arg("--snapshot")
        .arg(env.snapshot.path())
        .args(["--total-reward-pool", "1000"])
        .assert()
        .failure()
        .stderr(contains("Round 1/404 not found"));
    Ok(())
}

#[test]
fn test_list_pools() -> anyhow::Result<()> {
    let env = setup()?;
    calculate(&env)?;

    let output = pool_rewards(&env)?
        .args(["pools", "--limit", "5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let pools: Value = serde_json::from_slice(&output)?;
    assert_eq!(pools.as_array().map(Vec::len), Some(1));
    assert_eq!(pools[0]["poolId"], POOL_ID);
    assert_eq!(pools[0]["stakerCount"], 2);
    Ok(())
}
