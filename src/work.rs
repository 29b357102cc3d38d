//! Work packages handed to miners and the submissions they produce

use crate::curve::CurvePoint;
use crate::difficulty::meets_target;
use crate::{Address, PoWError, Result};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Public snapshot of the active round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPackage {
    pub round: u64,
    /// Round scalar `a`, published in full
    #[serde(with = "hex::serde")]
    pub secret: [u8; 32],
    /// Cached `P_A = a·G`
    pub point: CurvePoint,
    pub difficulty: U256,
    pub reward: U256,
    pub target_pattern: Address,
}

impl WorkPackage {
    pub fn meets_target(&self, address: &Address) -> bool {
        meets_target(address, &self.target_pattern, self.difficulty)
    }

    /// Expected number of candidates to test before a hit
    pub fn expected_attempts(&self) -> U256 {
        if self.difficulty.is_zero() {
            return U256::MAX;
        }
        crate::max_difficulty() / self.difficulty
    }
}

/// A claim as sent to the verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Receives the reward
    pub beneficiary: Address,
    /// Candidate point `P_B`
    pub point: CurvePoint,
    /// 65-byte signature by `a + b`
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    /// Opaque payload bound into the signed message
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl Submission {
    pub fn new(beneficiary: Address, point: CurvePoint, signature: Vec<u8>, data: Vec<u8>) -> Self {
        Self {
            beneficiary,
            point,
            signature,
            data,
        }
    }

    pub fn with_beneficiary(mut self, beneficiary: Address) -> Self {
        self.beneficiary = beneficiary;
        self
    }
}

/// A found solution with the metadata of the search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Round the solution was mined against
    pub round: u64,
    /// Address of `P_A + P_B`
    pub combined_address: Address,
    /// Candidates tested before the hit
    pub attempts: u64,
    pub submission: Submission,
}

impl Solution {
    pub fn into_submission(self) -> Submission {
        self.submission
    }

    /// Check the solution still targets `work`
    pub fn ensure_current(&self, work: &WorkPackage) -> Result<()> {
        if self.round != work.round {
            return Err(PoWError::StaleRound {
                found: self.round,
                current: work.round,
            });
        }
        if !work.meets_target(&self.combined_address) {
            return Err(PoWError::DifficultyNotMet);
        }
        Ok(())
    }
}
