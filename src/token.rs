//! Reward token interface and an in-memory fungible token

use crate::{Address, PoWError, Result};
use primitive_types::U256;
use std::collections::HashMap;
use tracing::debug;

/// What the engine needs from the token it pays rewards in
pub trait RewardToken {
    fn balance_of(&self, owner: &Address) -> U256;

    /// Move `amount` from `from` to `to`, all or nothing
    fn transfer(&mut self, from: &Address, to: &Address, amount: U256) -> Result<()>;
}

/// Fungible token ledger held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryToken {
    symbol: String,
    balances: HashMap<Address, U256>,
    total_supply: U256,
}

impl InMemoryToken {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            balances: HashMap::new(),
            total_supply: U256::zero(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn mint(&mut self, to: &Address, amount: U256) -> Result<()> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| PoWError::Internal("total supply overflow".to_string()))?;
        let balance = self.balance_of(to) + amount;

        self.total_supply = supply;
        self.balances.insert(*to, balance);
        debug!("Minted {} {} to {}", amount, self.symbol, to);
        Ok(())
    }

    pub fn holders(&self) -> usize {
        self.balances.values().filter(|b| !b.is_zero()).count()
    }
}

impl RewardToken for InMemoryToken {
    fn balance_of(&self, owner: &Address) -> U256 {
        self.balances.get(owner).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: U256) -> Result<()> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(PoWError::InsufficientBalance {
                available,
                required: amount,
            });
        }

        if from == to {
            return Ok(());
        }

        self.balances.insert(*from, available - amount);
        let received = self.balance_of(to) + amount;
        self.balances.insert(*to, received);
        Ok(())
    }
}
