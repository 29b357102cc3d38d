//! Off-chain key-search miner
//!
//! Searches scalars `b` until the address of `(a + b)·G` meets the round
//! difficulty, then signs the claim with `a + b`. Work is split across
//! threads by striding one shared counter.

use crate::curve::{add_scalars, address_from_secret, point_from_secret};
use crate::signature::sign_solution;
use crate::work::{Solution, Submission, WorkPackage};
use crate::{Address, PoWError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Candidates between checks of the stop flags
const CHECK_INTERVAL: u64 = 256;

/// Configuration for a miner
#[derive(Debug, Clone, Copy)]
pub struct MinerConfig {
    pub num_threads: usize,
    /// Give up after this many candidates (0 = unbounded)
    pub max_attempts: u64,
    /// High 128 bits of every candidate; random when unset
    pub search_prefix: Option<u128>,
}

impl MinerConfig {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
            max_attempts: 0,
            search_prefix: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_search_prefix(mut self, prefix: u128) -> Self {
        self.search_prefix = Some(prefix);
        self
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

/// Statistics for a miner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinerStats {
    pub total_attempts: u64,
    pub solutions_found: u64,
    pub abandoned_searches: u64,
    pub keys_per_second: f64,
    pub uptime_seconds: u64,
    pub last_solution_millis: u64,
}

/// Multi-threaded key-search miner
#[derive(Clone)]
pub struct Miner {
    config: MinerConfig,
    current_work: Arc<RwLock<Option<WorkPackage>>>,
    total_attempts: Arc<AtomicU64>,
    solutions_found: Arc<AtomicU64>,
    abandoned: Arc<AtomicU64>,
    last_solution_millis: Arc<AtomicU64>,
    /// Raised to abandon the running search
    interrupt: Arc<AtomicBool>,
    start_time: Instant,
}

impl Miner {
    pub fn new(config: MinerConfig) -> Self {
        info!("Creating key-search miner with {} threads", config.num_threads);

        Self {
            config,
            current_work: Arc::new(RwLock::new(None)),
            total_attempts: Arc::new(AtomicU64::new(0)),
            solutions_found: Arc::new(AtomicU64::new(0)),
            abandoned: Arc::new(AtomicU64::new(0)),
            last_solution_millis: Arc::new(AtomicU64::new(0)),
            interrupt: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
        }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Publish a new round; a search on an older round stops early
    pub async fn set_work(&self, work: WorkPackage) {
        let mut current = self.current_work.write().await;
        if current.as_ref().map(|w| w.round) != Some(work.round) {
            self.interrupt.store(true, Ordering::Release);
        }
        debug!("Miner received work for round {}", work.round);
        *current = Some(work);
    }

    pub async fn get_current_work(&self) -> Option<WorkPackage> {
        self.current_work.read().await.clone()
    }

    /// Abandon the running search
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    /// Search `work` on the blocking pool
    pub async fn mine_work(&self, work: WorkPackage, beneficiary: Address, data: Vec<u8>) -> Result<Option<Solution>> {
        let miner = self.clone();
        tokio::task::spawn_blocking(move || miner.mine(&work, &beneficiary, &data))
            .await
            .map_err(|e| PoWError::Internal(format!("mining task failed: {}", e)))?
    }

    /// Search `work` across `num_threads` scoped threads
    ///
    /// Returns `Ok(None)` when the attempt budget runs out or the search is
    /// interrupted.
    pub fn mine(&self, work: &WorkPackage, beneficiary: &Address, data: &[u8]) -> Result<Option<Solution>> {
        self.interrupt.store(false, Ordering::Release);

        let prefix = self.config.search_prefix.unwrap_or_else(rand::random);
        let threads = self.config.num_threads.max(1) as u64;
        let found = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);
        let started = Instant::now();

        let winner = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|offset| {
                    let found = &found;
                    let attempts = &attempts;
                    scope.spawn(move || self.search(work, prefix, offset, threads, found, attempts))
                })
                .collect();

            let mut winner = None;
            for handle in handles {
                match handle.join() {
                    Ok(Some(hit)) if winner.is_none() => winner = Some(hit),
                    Ok(_) => {}
                    Err(_) => return Err(PoWError::Internal("search thread panicked".to_string())),
                }
            }
            Ok(winner)
        })?;

        let attempts = attempts.load(Ordering::Relaxed);
        self.total_attempts.fetch_add(attempts, Ordering::Relaxed);

        let Some((b, ab, combined_address)) = winner else {
            self.abandoned.fetch_add(1, Ordering::Relaxed);
            debug!("Search on round {} stopped after {} candidates", work.round, attempts);
            return Ok(None);
        };

        let submission = Submission::new(
            *beneficiary,
            point_from_secret(&b)?,
            sign_solution(&ab, beneficiary, data)?,
            data.to_vec(),
        );

        let millis = started.elapsed().as_millis() as u64;
        self.solutions_found.fetch_add(1, Ordering::Relaxed);
        self.last_solution_millis.store(millis, Ordering::Relaxed);
        info!(
            "Found solution for round {} at {} after {} candidates in {} ms",
            work.round, combined_address, attempts, millis
        );

        Ok(Some(Solution {
            round: work.round,
            combined_address,
            attempts,
            submission,
        }))
    }

    /// One thread's share: counters `offset, offset + stride, ...`
    fn search(
        &self,
        work: &WorkPackage,
        prefix: u128,
        offset: u64,
        stride: u64,
        found: &AtomicBool,
        attempts: &AtomicU64,
    ) -> Option<([u8; 32], [u8; 32], Address)> {
        let budget = self.config.max_attempts;
        let mut counter = offset;
        let mut local = 0u64;

        loop {
            if local % CHECK_INTERVAL == 0
                && (found.load(Ordering::Acquire) || self.interrupt.load(Ordering::Acquire))
            {
                break;
            }
            let seen = attempts.fetch_add(1, Ordering::Relaxed);
            if budget > 0 && seen >= budget {
                break;
            }

            let b = candidate(prefix, counter);
            counter = counter.wrapping_add(stride);
            local += 1;

            // Zero scalars and a + b = 0 are not keys
            let Ok(ab) = add_scalars(&work.secret, &b) else {
                continue;
            };
            let Ok(address) = address_from_secret(&ab) else {
                continue;
            };

            if work.meets_target(&address) {
                if found.swap(true, Ordering::AcqRel) {
                    break;
                }
                return Some((b, ab, address));
            }
        }
        None
    }

    pub fn get_stats(&self) -> MinerStats {
        let total_attempts = self.total_attempts.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed();
        let keys_per_second = if uptime.as_secs_f64() > 0.0 {
            total_attempts as f64 / uptime.as_secs_f64()
        } else {
            0.0
        };

        MinerStats {
            total_attempts,
            solutions_found: self.solutions_found.load(Ordering::Relaxed),
            abandoned_searches: self.abandoned.load(Ordering::Relaxed),
            keys_per_second,
            uptime_seconds: uptime.as_secs(),
            last_solution_millis: self.last_solution_millis.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.total_attempts.store(0, Ordering::Relaxed);
        self.solutions_found.store(0, Ordering::Relaxed);
        self.abandoned.store(0, Ordering::Relaxed);
        self.last_solution_millis.store(0, Ordering::Relaxed);
    }
}

/// Scalar with `prefix` in bytes 8..24 and `counter` in bytes 24..32
fn candidate(prefix: u128, counter: u64) -> [u8; 32] {
    let mut b = [0u8; 32];
    b[8..24].copy_from_slice(&prefix.to_be_bytes());
    b[24..].copy_from_slice(&counter.to_be_bytes());
    b
}
