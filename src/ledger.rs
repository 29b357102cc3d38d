//! Reward payouts and per-beneficiary accounting
//! Pays solution rewards from the contract's token balance

use crate::token::RewardToken;
use crate::{Address, PoWError, Result};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Rewards received by one beneficiary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryAccount {
    /// Beneficiary address
    pub address: Address,
    /// Total rewards received
    pub total_rewards: U256,
    /// Number of solutions paid to this beneficiary
    pub solutions: u64,
    /// Round of the latest payout
    pub last_round: u64,
}

impl BeneficiaryAccount {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            total_rewards: U256::zero(),
            solutions: 0,
            last_round: 0,
        }
    }

    fn credit(&mut self, amount: U256, round: u64) {
        self.total_rewards = self.total_rewards.saturating_add(amount);
        self.solutions = self.solutions.saturating_add(1);
        self.last_round = round;
    }
}

/// Payout ledger of the mining contract
#[derive(Debug, Clone, Default)]
pub struct RewardLedger {
    accounts: HashMap<Address, BeneficiaryAccount>,
    total_paid: U256,
    payouts: u64,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pay `amount` from `treasury` to `beneficiary`
    ///
    /// Fails before touching any balance when the treasury cannot cover the
    /// full amount. A zero amount is recorded without a transfer.
    pub fn pay<T: RewardToken>(
        &mut self,
        token: &mut T,
        treasury: &Address,
        beneficiary: &Address,
        amount: U256,
        round: u64,
    ) -> Result<()> {
        let available = token.balance_of(treasury);
        if available < amount {
            return Err(PoWError::InsufficientBalance {
                available,
                required: amount,
            });
        }

        if amount.is_zero() {
            debug!("Zero reward for round {}, skipping transfer", round);
        } else {
            token.transfer(treasury, beneficiary, amount)?;
        }

        self.total_paid = self.total_paid.saturating_add(amount);
        self.payouts = self.payouts.saturating_add(1);
        self.accounts
            .entry(*beneficiary)
            .or_insert_with(|| BeneficiaryAccount::new(*beneficiary))
            .credit(amount, round);

        info!("Paid {} to {} for round {}", amount, beneficiary, round);
        Ok(())
    }

    pub fn account(&self, beneficiary: &Address) -> Option<&BeneficiaryAccount> {
        self.accounts.get(beneficiary)
    }

    pub fn total_paid(&self) -> U256 {
        self.total_paid
    }

    pub fn payouts(&self) -> u64 {
        self.payouts
    }

    /// Beneficiaries ordered by total rewards, highest first
    pub fn top_beneficiaries(&self, count: usize) -> Vec<BeneficiaryAccount> {
        let mut accounts: Vec<_> = self.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| b.total_rewards.cmp(&a.total_rewards));
        accounts.truncate(count);
        accounts
    }

    pub fn stats(&self) -> RewardStats {
        RewardStats {
            total_paid: self.total_paid,
            payouts: self.payouts,
            beneficiaries: self.accounts.len(),
        }
    }
}

/// Reward statistics
#[derive(Debug, Clone, Serialize)]
pub struct RewardStats {
    pub total_paid: U256,
    pub payouts: u64,
    pub beneficiaries: usize,
}
