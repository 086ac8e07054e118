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

use thiserror::Error;

/// Errors raised by the reward calculator and the Merkle commitment builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardsError {
    /// The pool's total match amount is zero, so there is nothing to share out.
    #[error("no matched funds to distribute")]
    NoMatchedFunds,

    /// None of the staked projects received matching funds.
    #[error("no stakes on matched projects")]
    NoStakesOnMatchedProjects,

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error("leaf index {index} out of range for tree with {len} leaves")]
    LeafIndexOutOfRange { index: usize, len: usize },
}
