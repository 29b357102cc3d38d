//! Events emitted by the mining contract

use crate::difficulty::{MiningParams, RetargetRecord};
use crate::Address;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Observable state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PowEvent {
    Initialized {
        version: u8,
    },
    OwnershipTransferred {
        previous: Option<Address>,
        new: Address,
    },
    MiningParamsUpdated {
        params: MiningParams,
    },
    MiningStarted {
        round: u64,
        timestamp: u64,
    },
    MiningStopped {
        round: u64,
        timestamp: u64,
    },
    SolutionAccepted {
        round: u64,
        solver: Address,
        beneficiary: Address,
        reward: U256,
        block_number: u64,
    },
    DifficultyRetargeted {
        record: RetargetRecord,
    },
    RewardHalved {
        previous: U256,
        new: U256,
        solution_count: u64,
    },
    RoundAdvanced {
        round: u64,
        #[serde(with = "hex::serde")]
        secret: [u8; 32],
    },
}

/// Append-only event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<PowEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: PowEvent) {
        match &event {
            PowEvent::SolutionAccepted {
                round,
                solver,
                beneficiary,
                reward,
                ..
            } => info!(
                "Solution accepted for round {}: solver {} beneficiary {} reward {}",
                round, solver, beneficiary, reward
            ),
            other => info!("Event: {:?}", other),
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[PowEvent] {
        &self.events
    }

    /// Remove and return all events recorded so far
    pub fn take(&mut self) -> Vec<PowEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
