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

#![allow(dead_code)]

use std::sync::Arc;

use alloy::primitives::Address;
use serde_json::{json, Value};
use staking_rewards_indexer::db::PoolsSqlDb;
use tempfile::NamedTempFile;

pub const CHAIN_ID: u64 = 42161;
pub const POOL_ID: &str = "609";
/// 2025-02-28T10:02:00Z
pub const END_TIME: u64 = 1_740_736_920;

pub const STAKER_A: Address = Address::new([0xa0; 20]);
pub const STAKER_B: Address = Address::new([0xb0; 20]);
pub const STAKER_LATE: Address = Address::new([0xc0; 20]);
pub const PROJECT: Address = Address::new([0x01; 20]);
pub const UNMATCHED_PROJECT: Address = Address::new([0x02; 20]);

// Keeps the sqlite file alive as long as the database is in use.
pub struct TestDb {
    pub db: Arc<PoolsSqlDb>,
    pub url: String,
    _temp_file: NamedTempFile,
}

pub async fn test_db() -> TestDb {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_file.path().to_str().expect("Invalid temp path");
    let url = format!("sqlite:{}", db_path);

    let db = Arc::new(PoolsSqlDb::new(&url).await.expect("Failed to create database"));
    TestDb { db, url, _temp_file: temp_file }
}

fn stake(sender: Address, recipient: Address, amount: u64, block_timestamp: u64) -> Value {
    json!({
        "chainId": CHAIN_ID,
        "poolId": POOL_ID,
        "sender": format!("{sender:#x}"),
        "recipient": format!("{recipient:#x}"),
        "amount": amount.to_string(),
        "blockTimestamp": block_timestamp.to_string(),
    })
}

/// A finished round with one matched project and three stakers on it: A and B staked 100 tokens
/// each, 100 and 300 seconds before the end, and a third staker locked tokens after the end. A
/// stake on a project without matching funds is ignored.
///
/// With a reward pool of 1000, A is owed 250 and B 750.
pub fn snapshot() -> Value {
    json!({
        "rounds": [{
            "chainId": CHAIN_ID,
            "id": POOL_ID,
            "matchAmount": "500",
            "donationsEndTime": "2025-02-28T10:02:00Z",
            "matchingDistribution": [{
                "projectId": "0x0a",
                "anchorAddress": format!("{PROJECT:#x}"),
                "matchAmountInToken": "500",
            }],
        }],
        "stakes": [
            stake(STAKER_A, PROJECT, 100, END_TIME - 100),
            stake(STAKER_B, PROJECT, 100, END_TIME - 300),
            stake(STAKER_LATE, PROJECT, 5_000, END_TIME + 60),
            stake(STAKER_A, UNMATCHED_PROJECT, 1_000, END_TIME - 1_000),
        ],
    })
}
