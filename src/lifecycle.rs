//! Ownership, initialization phases and mining status
//!
//! Initialization runs in two one-way phases. Phase 1 wires the owner;
//! phase 2 introduces the mining state added by a later upgrade. Each
//! phase can run exactly once and phase 2 requires phase 1.

use crate::{Address, PoWError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InitPhase {
    Uninitialized,
    Phase1Done,
    Phase2Done,
}

impl InitPhase {
    pub fn version(&self) -> u8 {
        match self {
            InitPhase::Uninitialized => 0,
            InitPhase::Phase1Done => 1,
            InitPhase::Phase2Done => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiningStatus {
    NotStarted,
    Active,
    Stopped,
}

impl MiningStatus {
    /// Validate a transition; only NotStarted -> Active -> Stopped exists
    pub fn transition(self, to: MiningStatus) -> Result<MiningStatus> {
        match (self, to) {
            (MiningStatus::NotStarted, MiningStatus::Active)
            | (MiningStatus::Active, MiningStatus::Stopped) => Ok(to),
            (from, to) => Err(PoWError::InvalidStatusTransition { from, to }),
        }
    }
}

/// Access control and lifecycle state
#[derive(Debug, Clone)]
pub struct Lifecycle {
    phase: InitPhase,
    owner: Option<Address>,
    status: MiningStatus,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: InitPhase::Uninitialized,
            owner: None,
            status: MiningStatus::NotStarted,
        }
    }

    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn status(&self) -> MiningStatus {
        self.status
    }

    /// Phase 1: set the owner
    pub fn initialize(&mut self, owner: Address) -> Result<()> {
        if self.phase != InitPhase::Uninitialized {
            return Err(PoWError::AlreadyInitialized);
        }
        self.owner = Some(owner);
        self.phase = InitPhase::Phase1Done;
        info!("Initialized with owner {}", owner);
        Ok(())
    }

    /// Phase 2: owner-only, once, after phase 1
    pub fn initialize2(&mut self, caller: &Address) -> Result<()> {
        match self.phase {
            InitPhase::Uninitialized => return Err(PoWError::NotInitialized),
            InitPhase::Phase2Done => return Err(PoWError::AlreadyInitialized),
            InitPhase::Phase1Done => {}
        }
        self.ensure_owner(caller)?;
        self.phase = InitPhase::Phase2Done;
        info!("Second initialization phase complete");
        Ok(())
    }

    pub fn ensure_owner(&self, caller: &Address) -> Result<()> {
        match self.owner {
            Some(owner) if owner == *caller => Ok(()),
            _ => Err(PoWError::Unauthorized(*caller)),
        }
    }

    /// Owner check for operations on phase 2 state
    pub fn ensure_admin(&self, caller: &Address) -> Result<()> {
        self.ensure_owner(caller)?;
        if self.phase != InitPhase::Phase2Done {
            return Err(PoWError::NotInitialized);
        }
        Ok(())
    }

    pub fn set_status(&mut self, to: MiningStatus) -> Result<()> {
        self.status = self.status.transition(to)?;
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<Option<Address>> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(PoWError::InvalidAddress("new owner is the zero address".to_string()));
        }
        let previous = self.owner.replace(new_owner);
        info!("Ownership transferred to {}", new_owner);
        Ok(previous)
    }
}
