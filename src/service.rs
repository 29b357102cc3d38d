//! Async submission front end
//! Serializes submissions from many parties through one write lock

use crate::context::ExecutionContext;
use crate::contract::{PowContract, SubmissionReceipt};
use crate::ledger::RewardStats;
use crate::lifecycle::MiningStatus;
use crate::token::RewardToken;
use crate::work::{Submission, WorkPackage};
use crate::{Address, Result};
use primitive_types::U256;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Submission result
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    /// Submitting account
    pub caller: Address,
    /// Block the submission was executed in
    pub block_number: u64,
    /// Submission status
    pub status: SubmissionStatus,
    /// Present when accepted
    pub receipt: Option<SubmissionReceipt>,
    /// Error message if rejected
    pub error: Option<String>,
}

/// Submission status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubmissionStatus {
    /// Solution verified and paid
    Accepted,
    /// Verification or payout failed; state unchanged
    Rejected,
}

/// Produces strictly increasing block contexts
#[derive(Debug)]
pub struct BlockProducer {
    next_block: AtomicU64,
    /// Seconds per block; `None` uses the wall clock
    block_time: Option<u64>,
    genesis_time: u64,
}

impl BlockProducer {
    /// Blocks stamped with the current wall clock
    pub fn wall_clock(first_block: u64) -> Self {
        Self {
            next_block: AtomicU64::new(first_block),
            block_time: None,
            genesis_time: 0,
        }
    }

    /// Blocks `block_time` seconds apart starting at `genesis_time`
    pub fn simulated(first_block: u64, genesis_time: u64, block_time: u64) -> Self {
        Self {
            next_block: AtomicU64::new(first_block),
            block_time: Some(block_time),
            genesis_time,
        }
    }

    /// Next context for `caller`
    pub fn next(&self, caller: Address) -> ExecutionContext {
        let block_number = self.next_block.fetch_add(1, Ordering::SeqCst);
        let timestamp = match self.block_time {
            Some(block_time) => self
                .genesis_time
                .saturating_add(block_number.saturating_mul(block_time)),
            None => std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(self.genesis_time),
        };

        ExecutionContext::new(caller, block_number, timestamp).with_randao(rand::random())
    }

    pub fn current_block(&self) -> u64 {
        self.next_block.load(Ordering::SeqCst)
    }
}

/// Service statistics
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub status: MiningStatus,
    pub round: u64,
    pub difficulty: U256,
    pub reward: U256,
    pub token_balance: U256,
    pub accepted: u64,
    pub rejected: u64,
    pub block_number: u64,
    pub rewards: RewardStats,
}

/// Shared handle to a contract
pub struct MiningService<T: RewardToken> {
    contract: Arc<RwLock<PowContract<T>>>,
    blocks: Arc<BlockProducer>,
    accepted: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl<T: RewardToken> Clone for MiningService<T> {
    fn clone(&self) -> Self {
        Self {
            contract: Arc::clone(&self.contract),
            blocks: Arc::clone(&self.blocks),
            accepted: Arc::clone(&self.accepted),
            rejected: Arc::clone(&self.rejected),
        }
    }
}

impl<T: RewardToken + Send + Sync> MiningService<T> {
    pub fn new(contract: PowContract<T>, blocks: BlockProducer) -> Self {
        Self {
            contract: Arc::new(RwLock::new(contract)),
            blocks: Arc::new(blocks),
            accepted: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `submission` in the next block
    pub async fn submit(&self, caller: Address, submission: Submission) -> SubmissionResult {
        let mut contract = self.contract.write().await;
        // Block assigned under the lock so contexts follow execution order
        let ctx = self.blocks.next(caller);

        match contract.submit(&ctx, &submission) {
            Ok(receipt) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Block #{}: accepted round {} from {}",
                    ctx.block_number, receipt.round, caller
                );
                SubmissionResult {
                    caller,
                    block_number: ctx.block_number,
                    status: SubmissionStatus::Accepted,
                    receipt: Some(receipt),
                    error: None,
                }
            }
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Block #{}: rejected submission from {}: {}", ctx.block_number, caller, e);
                SubmissionResult {
                    caller,
                    block_number: ctx.block_number,
                    status: SubmissionStatus::Rejected,
                    receipt: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Run an arbitrary contract call in the next block
    pub async fn execute<R>(
        &self,
        caller: Address,
        call: impl FnOnce(&mut PowContract<T>, &ExecutionContext) -> Result<R>,
    ) -> Result<R> {
        let mut contract = self.contract.write().await;
        let ctx = self.blocks.next(caller);
        debug!("Executing call from {} in block #{}", caller, ctx.block_number);
        call(&mut contract, &ctx)
    }

    /// Read-only access under the read lock
    pub async fn read<R>(&self, view: impl FnOnce(&PowContract<T>) -> R) -> R {
        let contract = self.contract.read().await;
        view(&contract)
    }

    pub async fn current_work(&self) -> Result<WorkPackage> {
        self.contract.read().await.current_round()
    }

    pub async fn stats(&self) -> Result<ServiceStats> {
        let contract = self.contract.read().await;
        Ok(ServiceStats {
            status: contract.status(),
            round: contract.round()?,
            difficulty: contract.difficulty()?,
            reward: contract.reward()?,
            token_balance: contract.token_balance(),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            block_number: self.blocks.current_block(),
            rewards: contract.ledger().stats(),
        })
    }
}
