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

//! Merkle commitments over reward sets, compatible with OpenZeppelin's `MerkleProof` library.
//!
//! Leaves are `keccak256(abi.encodePacked(address staker, uint256 amount))`. Sibling nodes are
//! hashed in sorted order, so a proof is just the list of siblings with no left/right flags. A
//! node without a sibling at the end of a level is carried up unchanged.

use alloy_primitives::{keccak256, Address, Keccak256, B256, U256};
use alloy_sol_types::SolValue;

use crate::{MerkleData, RewardCalculation, RewardWithProof, RewardsError};

/// Root reported for a tree with no leaves.
pub const EMPTY_TREE_ROOT: B256 = B256::ZERO;

/// Leaf hash committing to a staker's reward amount.
pub fn reward_leaf(staker: Address, amount: U256) -> B256 {
    keccak256((staker, amount).abi_encode_packed())
}

/// Hash two nodes, smaller one first.
pub fn hash_pair(a: B256, b: B256) -> B256 {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Keccak256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize()
}

/// Check that `proof` connects `leaf` to `root`.
pub fn verify_proof(leaf: B256, proof: &[B256], root: B256) -> bool {
    proof.iter().fold(leaf, |node, sibling| hash_pair(node, *sibling)) == root
}

/// Check that `(staker, amount)` is committed to by `root`.
pub fn verify_reward(staker: Address, amount: U256, proof: &[B256], root: B256) -> bool {
    verify_proof(reward_leaf(staker, amount), proof, root)
}

/// A binary Merkle tree stored as its full list of layers, leaves first.
#[derive(Debug, Clone)]
pub struct RewardsMerkleTree {
    layers: Vec<Vec<B256>>,
}

impl RewardsMerkleTree {
    /// Build a tree over the given leaves, kept in the order given.
    pub fn new(leaves: Vec<B256>) -> Self {
        let mut layers = vec![leaves];
        while let Some(level) = layers.last().filter(|level| level.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(*left, *right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            layers.push(next);
        }
        Self { layers }
    }

    /// Build a tree with one leaf per reward, in input order.
    pub fn from_rewards(rewards: &[RewardCalculation]) -> Self {
        Self::new(rewards.iter().map(|r| reward_leaf(r.staker, r.reward)).collect())
    }

    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    pub fn leaf(&self, index: usize) -> Option<B256> {
        self.layers[0].get(index).copied()
    }

    /// The root hash, or [EMPTY_TREE_ROOT] when there are no leaves. With a single leaf the
    /// root is the leaf itself.
    pub fn root(&self) -> B256 {
        self.layers.last().and_then(|top| top.first()).copied().unwrap_or(EMPTY_TREE_ROOT)
    }

    /// Sibling hashes from the leaf at `index` up to the root.
    pub fn proof(&self, index: usize) -> Result<Vec<B256>, RewardsError> {
        if index >= self.len() {
            return Err(RewardsError::LeafIndexOutOfRange { index, len: self.len() });
        }

        let mut proof = Vec::with_capacity(self.layers.len().saturating_sub(1));
        let mut position = index;
        for level in &self.layers[..self.layers.len() - 1] {
            let sibling = position ^ 1;
            // Promoted nodes have no sibling at this level.
            if let Some(node) = level.get(sibling) {
                proof.push(*node);
            }
            position /= 2;
        }
        Ok(proof)
    }
}

/// Commit to a reward set and attach an inclusion proof to every reward.
///
/// Rewards keep their input order, and the same input always yields the same root and proofs.
pub fn generate_merkle_data(rewards: &[RewardCalculation]) -> MerkleData {
    let tree = RewardsMerkleTree::from_rewards(rewards);
    let rewards = rewards
        .iter()
        .enumerate()
        .map(|(index, reward)| RewardWithProof {
            staker: reward.staker,
            amount: reward.reward,
            // Every index below len() has a proof.
            proof: tree.proof(index).unwrap_or_default(),
        })
        .collect();

    MerkleData { merkle_root: tree.root(), rewards }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewards(n: u8) -> Vec<RewardCalculation> {
        (1..=n)
            .map(|i| RewardCalculation {
                staker: Address::repeat_byte(i),
                reward: U256::from(1000u64 * i as u64 + 7),
            })
            .collect()
    }

    #[test]
    fn test_leaf_encoding_is_packed_address_and_uint256() {
        let staker = Address::repeat_byte(0x42);
        let amount = U256::from(0x0102u64);

        let mut packed = Vec::with_capacity(52);
        packed.extend_from_slice(staker.as_slice());
        packed.extend_from_slice(&amount.to_be_bytes::<32>());
        assert_eq!(packed.len(), 52);

        assert_eq!(reward_leaf(staker, amount), keccak256(&packed));
    }

    #[test]
    fn test_hash_pair_is_order_independent() {
        let a = B256::repeat_byte(0x01);
        let b = B256::repeat_byte(0x02);
        assert_eq!(hash_pair(a, b), hash_pair(b, a));
        assert_eq!(hash_pair(a, b), keccak256([a.as_slice(), b.as_slice()].concat()));
    }

    #[test]
    fn test_empty_tree() {
        let data = generate_merkle_data(&[]);
        assert_eq!(data.merkle_root, EMPTY_TREE_ROOT);
        assert!(data.rewards.is_empty());

        let tree = RewardsMerkleTree::new(vec![]);
        assert!(tree.is_empty());
        assert_eq!(tree.proof(0), Err(RewardsError::LeafIndexOutOfRange { index: 0, len: 0 }));
    }

    #[test]
    fn test_single_leaf_root_is_the_leaf() {
        let reward = rewards(1)[0];
        let data = generate_merkle_data(&[reward]);

        assert_eq!(data.merkle_root, reward_leaf(reward.staker, reward.reward));
        assert!(data.rewards[0].proof.is_empty());
        assert!(verify_reward(reward.staker, reward.reward, &[], data.merkle_root));
    }

    #[test]
    fn test_three_leaves_promote_the_odd_node() {
        let input = rewards(3);
        let leaves: Vec<B256> = input.iter().map(|r| reward_leaf(r.staker, r.reward)).collect();
        let tree = RewardsMerkleTree::from_rewards(&input);

        let left = hash_pair(leaves[0], leaves[1]);
        assert_eq!(tree.root(), hash_pair(left, leaves[2]));
        assert_eq!(tree.proof(0).unwrap(), vec![leaves[1], leaves[2]]);
        assert_eq!(tree.proof(2).unwrap(), vec![left]);
    }

    #[test]
    fn test_every_proof_verifies() {
        for n in 1..=17 {
            let input = rewards(n);
            let data = generate_merkle_data(&input);
            assert_eq!(data.rewards.len(), input.len());
            for (reward, committed) in input.iter().zip(&data.rewards) {
                assert_eq!(committed.staker, reward.staker);
                assert_eq!(committed.amount, reward.reward);
                assert!(
                    verify_reward(committed.staker, committed.amount, &committed.proof, data.merkle_root),
                    "proof for leaf of {} failed with {n} leaves",
                    committed.staker
                );
            }
        }
    }

    #[test]
    fn test_tampered_amount_fails() {
        let data = generate_merkle_data(&rewards(5));
        for committed in &data.rewards {
            let tampered = committed.amount + U256::from(1);
            assert!(!verify_reward(committed.staker, tampered, &committed.proof, data.merkle_root));
        }
    }

    #[test]
    fn test_proof_does_not_verify_against_other_root() {
        let original = generate_merkle_data(&rewards(4));
        let mut altered_input = rewards(4);
        altered_input[3].reward += U256::from(1);
        let altered = generate_merkle_data(&altered_input);

        assert_ne!(original.merkle_root, altered.merkle_root);
        let first = &original.rewards[0];
        assert!(!verify_reward(first.staker, first.amount, &first.proof, altered.merkle_root));
    }

    #[test]
    fn test_commitment_is_deterministic() {
        let input = rewards(9);
        assert_eq!(generate_merkle_data(&input), generate_merkle_data(&input));
    }

    #[test]
    fn test_proof_out_of_range() {
        let tree = RewardsMerkleTree::from_rewards(&rewards(2));
        assert_eq!(tree.proof(2), Err(RewardsError::LeafIndexOutOfRange { index: 2, len: 2 }));
        assert_eq!(tree.len(), 2);
        assert!(tree.leaf(1).is_some());
        assert!(tree.leaf(2).is_none());
    }
}
