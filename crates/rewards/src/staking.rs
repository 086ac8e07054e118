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

//! Time-weighted staking rewards.
//!
//! Each stake earns weight `amount * (cutoff - timestamp)`, so earlier stakes count for more. The
//! reward pool is first split across staked projects in proportion to their matching award, then
//! within each project in proportion to each staker's weight on it. Both splits truncate, and the
//! remainder is credited to a single staker so the distributed total is exact.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::{MatchingDistributionEntry, RewardCalculation, RewardsError, Stake};

/// Weight per staker per project: staker => { project anchor => weight }.
type StakerWeightMap = BTreeMap<Address, BTreeMap<Address, U256>>;

/// Time-decay weight of a single stake.
///
/// Stakes made at or after the cutoff have no time left to accrue weight and are clamped to zero.
pub fn time_weight(stake: &Stake, round_cutoff_time: u64) -> Result<U256, RewardsError> {
    let time_left = round_cutoff_time.saturating_sub(stake.block_timestamp);
    stake.amount.checked_mul(U256::from(time_left)).ok_or(RewardsError::Overflow("stake weight"))
}

/// Stakes whose timestamp is strictly after the cutoff. These carry zero weight.
pub fn stakes_after_cutoff(stakes: &[Stake], round_cutoff_time: u64) -> Vec<&Stake> {
    stakes.iter().filter(|stake| stake.block_timestamp > round_cutoff_time).collect()
}

/// Compute each staker's share of `total_reward_pool`.
///
/// Only projects that received at least one weighted stake take part in the split, so the
/// matching share of projects nobody staked on is redistributed rather than lost. The sum of the
/// returned rewards equals `total_reward_pool` exactly. Results are ordered by staker address and
/// never contain zero rewards.
pub fn calculate_rewards(
    total_reward_pool: U256,
    total_match_amount: U256,
    round_cutoff_time: u64,
    matching_distribution: &[MatchingDistributionEntry],
    stakes: &[Stake],
) -> Result<Vec<RewardCalculation>, RewardsError> {
    if total_match_amount.is_zero() {
        return Err(RewardsError::NoMatchedFunds);
    }
    if stakes.is_empty() || matching_distribution.is_empty() {
        return Ok(Vec::new());
    }

    // Accumulate weight per project and per (staker, project).
    let mut project_weights = BTreeMap::<Address, U256>::new();
    let mut staker_weights = StakerWeightMap::new();
    for stake in stakes {
        let weight = time_weight(stake, round_cutoff_time)?;
        if weight.is_zero() {
            continue;
        }

        let project_weight = project_weights.entry(stake.recipient).or_default();
        *project_weight =
            project_weight.checked_add(weight).ok_or(RewardsError::Overflow("project weight"))?;

        let staker_weight =
            staker_weights.entry(stake.sender).or_default().entry(stake.recipient).or_default();
        *staker_weight =
            staker_weight.checked_add(weight).ok_or(RewardsError::Overflow("staker weight"))?;
    }

    // Matching awards for the projects that have weighted stakes.
    let mut staked_matches = BTreeMap::<Address, U256>::new();
    for entry in matching_distribution {
        if !project_weights.contains_key(&entry.anchor_address) {
            continue;
        }
        let match_amount = staked_matches.entry(entry.anchor_address).or_default();
        *match_amount = match_amount
            .checked_add(entry.match_amount_in_token)
            .ok_or(RewardsError::Overflow("project match amount"))?;
    }

    let mut staked_match_amount = U256::ZERO;
    for match_amount in staked_matches.values() {
        staked_match_amount = staked_match_amount
            .checked_add(*match_amount)
            .ok_or(RewardsError::Overflow("staked match amount"))?;
    }
    if staked_match_amount.is_zero() {
        return Err(RewardsError::NoStakesOnMatchedProjects);
    }

    let mut project_rewards = BTreeMap::<Address, U256>::new();
    for (anchor, match_amount) in &staked_matches {
        let project_reward = match_amount
            .checked_mul(total_reward_pool)
            .ok_or(RewardsError::Overflow("project reward"))?
            / staked_match_amount;
        project_rewards.insert(*anchor, project_reward);
    }

    // Split each project's reward across its stakers. Every staker with weight on a matched
    // project gets an entry, even if truncation leaves them nothing, so that the remainder
    // always has a recipient.
    let mut rewards = BTreeMap::<Address, U256>::new();
    let mut distributed = U256::ZERO;
    for (staker, weights) in &staker_weights {
        for (anchor, weight) in weights {
            let Some(project_reward) = project_rewards.get(anchor) else {
                continue;
            };
            // NOTE: project_weights contains every anchor present in staker_weights, and the
            // weight is nonzero by construction.
            let project_weight = project_weights[anchor];
            let reward = weight
                .checked_mul(*project_reward)
                .ok_or(RewardsError::Overflow("staker reward"))?
                / project_weight;

            let total = rewards.entry(*staker).or_default();
            *total += reward;
            distributed += reward;
        }
    }

    // Truncation only ever rounds down, so the remainder is nonnegative.
    let remainder = total_reward_pool
        .checked_sub(distributed)
        .ok_or(RewardsError::Overflow("rounding remainder"))?;
    if let Some((_, first)) = rewards.iter_mut().next() {
        *first += remainder;
    }

    Ok(rewards
        .into_iter()
        .filter(|(_, reward)| !reward.is_zero())
        .map(|(staker, reward)| RewardCalculation { staker, reward })
        .collect())
}
