//! Per-solution reward with halving decay

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Halvings after which the reward is always zero
const MAX_HALVINGS: u64 = 256;

/// Calculates the reward owed for the next accepted solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCalculator {
    base_reward: U256,
    halving_interval: u64,
}

impl RewardCalculator {
    pub fn new(base_reward: U256, halving_interval: u64) -> Self {
        Self {
            base_reward,
            halving_interval,
        }
    }

    pub fn base_reward(&self) -> U256 {
        self.base_reward
    }

    pub fn halving_interval(&self) -> u64 {
        self.halving_interval
    }

    /// Number of halvings applied after `solutions` accepted solutions
    pub fn halvings(&self, solutions: u64) -> u64 {
        if self.halving_interval == 0 {
            return 0;
        }
        solutions / self.halving_interval
    }

    /// Reward for the solution following `solutions` accepted ones
    pub fn reward_at(&self, solutions: u64) -> U256 {
        let halvings = self.halvings(solutions);

        // Shifting a 256-bit value by 256 or more clears it
        if halvings >= MAX_HALVINGS {
            return U256::zero();
        }

        let reward = self.base_reward >> halvings as usize;
        debug!("Reward after {} solutions: {} ({} halvings)", solutions, reward, halvings);
        reward
    }

    /// Whether the reward changes once `solutions` is reached
    pub fn is_halving_point(&self, solutions: u64) -> bool {
        self.halving_interval > 0 && solutions > 0 && solutions % self.halving_interval == 0
    }

    pub fn solutions_until_halving(&self, solutions: u64) -> Option<u64> {
        if self.halving_interval == 0 {
            return None;
        }
        let next = (solutions / self.halving_interval)
            .checked_add(1)?
            .checked_mul(self.halving_interval)?;
        Some(next - solutions)
    }
}
