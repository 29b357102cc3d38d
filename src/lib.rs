//! Elliptic-curve key-search Proof-of-Work engine
//!
//! This crate implements a reward-paying mining protocol where:
//! - Each round publishes a secret scalar `a` and its point `P_A = a·G`
//! - Miners search offline for a scalar `b` such that the address of
//!   `P_A + b·G` lies close (XOR distance) to a fixed target pattern
//! - Verification costs one point addition, one signature recovery and
//!   one comparison
//! - Only the party knowing `b` can sign for `a + b`, so published
//!   solutions cannot be front-run by changing the beneficiary
//! - Difficulty retargets on a fixed solution cadence and the reward
//!   halves on a fixed schedule

pub mod address;
pub mod commitment;
pub mod context;
pub mod contract;
pub mod curve;
pub mod difficulty;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod miner;
pub mod rewards;
pub mod service;
pub mod signature;
pub mod token;
pub mod work;

pub use address::Address;
pub use commitment::Commitment;
pub use context::ExecutionContext;
pub use contract::{PowContract, SubmissionReceipt};
pub use curve::{add_points, address_of, point_from_secret, CurvePoint};
pub use difficulty::{DifficultyController, DifficultyStats, MiningParams, RetargetRecord};
pub use events::{EventLog, PowEvent};
pub use ledger::{BeneficiaryAccount, RewardLedger, RewardStats};
pub use lifecycle::{InitPhase, Lifecycle, MiningStatus};
pub use miner::{Miner, MinerConfig, MinerStats};
pub use rewards::RewardCalculator;
pub use service::{BlockProducer, MiningService, ServiceStats, SubmissionResult, SubmissionStatus};
pub use signature::{recover_signer, sign_solution, solution_digest};
pub use token::{InMemoryToken, RewardToken};
pub use work::{Solution, Submission, WorkPackage};

pub use primitive_types::U256;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoWError {
    #[error("Mining is not active")]
    NotActive,

    #[error("Invalid curve point")]
    InvalidPoint,

    #[error("Difficulty not met")]
    DifficultyNotMet,

    #[error("Stale round: solution for round {found}, current round is {current}")]
    StaleRound { found: u64, current: u64 },

    #[error("Wrong signature: signer does not own the combined key")]
    WrongSignature,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid scalar")]
    InvalidScalar,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Already initialized")]
    AlreadyInitialized,

    #[error("Not initialized")]
    NotInitialized,

    #[error("Unauthorized account: {0}")]
    Unauthorized(Address),

    #[error("Invalid mining params: {0}")]
    InvalidParams(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Mining params not set")]
    ParamsNotSet,

    #[error("Mining already started")]
    MiningAlreadyStarted,

    #[error("Invalid mining status transition: {from:?} -> {to:?}")]
    InvalidStatusTransition { from: MiningStatus, to: MiningStatus },

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: U256, required: U256 },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PoWError>;

/// Largest meaningful difficulty: every address is within `2^160` of any pattern.
pub fn max_difficulty() -> U256 {
    U256::one() << 160
}

/// Deploy-time configuration of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PoWConfig {
    /// Fixed 160-bit pattern solutions must be close to
    pub target_pattern: Address,
    /// Difficulty set by the second initializer
    pub initial_difficulty: U256,
    /// Lower clamp for retargeting
    pub min_difficulty: U256,
    /// Upper clamp for retargeting
    pub max_difficulty: U256,
    /// Target time between accepted solutions (seconds)
    pub target_solve_time_secs: u64,
    /// Reward halving interval (in accepted solutions, 0 disables decay)
    pub halving_interval: u64,
}

impl Default for PoWConfig {
    fn default() -> Self {
        Self {
            target_pattern: Address::repeat_byte(0x88),
            initial_difficulty: U256::one() << 152, // 1 in 256 addresses
            min_difficulty: U256::one(),
            max_difficulty: max_difficulty(),
            target_solve_time_secs: 60,
            halving_interval: 210_000,
        }
    }
}

impl PoWConfig {
    pub fn with_initial_difficulty(mut self, difficulty: U256) -> Self {
        self.initial_difficulty = difficulty;
        self
    }

    pub fn with_target_solve_time(mut self, secs: u64) -> Self {
        self.target_solve_time_secs = secs;
        self
    }

    pub fn with_halving_interval(mut self, interval: u64) -> Self {
        self.halving_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_difficulty.is_zero() {
            return Err(PoWError::InvalidConfig("min difficulty must be positive".to_string()));
        }

        if self.max_difficulty > max_difficulty() {
            return Err(PoWError::InvalidConfig(format!(
                "max difficulty {} exceeds 2^160",
                self.max_difficulty
            )));
        }

        if self.min_difficulty > self.max_difficulty {
            return Err(PoWError::InvalidConfig(format!(
                "min difficulty {} above max difficulty {}",
                self.min_difficulty, self.max_difficulty
            )));
        }

        if self.initial_difficulty < self.min_difficulty
            || self.initial_difficulty > self.max_difficulty
        {
            return Err(PoWError::InvalidConfig(format!(
                "initial difficulty {} outside [{}, {}]",
                self.initial_difficulty, self.min_difficulty, self.max_difficulty
            )));
        }

        if self.target_solve_time_secs == 0 {
            return Err(PoWError::InvalidConfig("target solve time must be positive".to_string()));
        }

        Ok(())
    }
}
