//! Difficulty predicate and retargeting
//!
//! A combined address is a solution when its XOR distance to the target
//! pattern is strictly below the difficulty threshold. Every
//! `retarget_interval` accepted solutions the threshold is rescaled by
//! `actual_time / expected_time`, bounded per step by the configured ratio.

use crate::{Address, PoWConfig, PoWError, Result};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Admin-configured mining parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningParams {
    /// Base reward paid per accepted solution
    pub reward: U256,
    /// Accepted solutions per retarget window
    pub retarget_interval: u64,
    /// Per-step bound numerator (`num / den` is the largest change factor)
    pub max_step_numerator: u64,
    /// Per-step bound denominator
    pub max_step_denominator: u64,
}

impl MiningParams {
    pub fn new(
        reward: U256,
        retarget_interval: u64,
        max_step_numerator: u64,
        max_step_denominator: u64,
    ) -> Self {
        Self {
            reward,
            retarget_interval,
            max_step_numerator,
            max_step_denominator,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retarget_interval == 0 {
            return Err(PoWError::InvalidParams("retarget interval cannot be zero".to_string()));
        }

        if self.max_step_denominator == 0 {
            return Err(PoWError::InvalidParams("step denominator cannot be zero".to_string()));
        }

        if self.max_step_numerator <= self.max_step_denominator {
            return Err(PoWError::InvalidParams(format!(
                "step bound {}/{} must exceed 1",
                self.max_step_numerator, self.max_step_denominator
            )));
        }

        Ok(())
    }
}

/// `(address XOR pattern) < difficulty`
pub fn meets_target(address: &Address, pattern: &Address, difficulty: U256) -> bool {
    address.distance(pattern) < difficulty
}

/// Bounded proportional retarget
///
/// `proposed = current * actual / expected`, clamped to
/// `[current * den / num, current * num / den]` and then to `[min, max]`.
pub fn calculate_retarget(
    current: U256,
    actual_secs: u64,
    expected_secs: u64,
    step_numerator: u64,
    step_denominator: u64,
    min: U256,
    max: U256,
) -> U256 {
    if expected_secs == 0 || step_numerator == 0 || step_denominator == 0 {
        return current.max(min).min(max);
    }

    let actual = U256::from(actual_secs.max(1));
    let expected = U256::from(expected_secs);
    let num = U256::from(step_numerator);
    let den = U256::from(step_denominator);

    let proposed = current.saturating_mul(actual) / expected;
    let lower = current.saturating_mul(den) / num;
    // Integer division leaves small thresholds stuck without the +1
    let upper = (current.saturating_mul(num) / den).max(current.saturating_add(U256::one()));

    proposed.max(lower).min(upper).max(min).min(max)
}

/// Record of a completed retarget window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetRecord {
    /// Lifetime solution count at the retarget
    pub solution_count: u64,
    pub previous_difficulty: U256,
    pub new_difficulty: U256,
    /// Solutions in the closed window
    pub solutions_in_window: u64,
    /// Observed window duration (seconds)
    pub actual_secs: u64,
    /// Target window duration (seconds)
    pub expected_secs: u64,
    /// Block timestamp of the retarget
    pub timestamp: u64,
}

/// Tracks the difficulty threshold and the current retarget window
#[derive(Debug, Clone)]
pub struct DifficultyController {
    difficulty: U256,
    min_difficulty: U256,
    max_difficulty: U256,
    target_solve_time_secs: u64,
    retarget_interval: u64,
    step_numerator: u64,
    step_denominator: u64,
    solutions_in_window: u64,
    window_start: u64,
    total_solutions: u64,
    history: Vec<RetargetRecord>,
}

impl DifficultyController {
    pub fn new(config: &PoWConfig) -> Self {
        Self {
            difficulty: config.initial_difficulty,
            min_difficulty: config.min_difficulty,
            max_difficulty: config.max_difficulty,
            target_solve_time_secs: config.target_solve_time_secs,
            retarget_interval: 1,
            step_numerator: 2,
            step_denominator: 1,
            solutions_in_window: 0,
            window_start: 0,
            total_solutions: 0,
            history: Vec::new(),
        }
    }

    /// Apply the cadence and step bound of validated params
    pub fn configure(&mut self, params: &MiningParams) {
        self.retarget_interval = params.retarget_interval;
        self.step_numerator = params.max_step_numerator;
        self.step_denominator = params.max_step_denominator;
        debug!(
            "Retarget every {} solutions, step bound {}/{}",
            self.retarget_interval, self.step_numerator, self.step_denominator
        );
    }

    /// Start a fresh timing window at `timestamp`
    pub fn open_window(&mut self, timestamp: u64) {
        self.window_start = timestamp;
        self.solutions_in_window = 0;
    }

    pub fn difficulty(&self) -> U256 {
        self.difficulty
    }

    pub fn is_met(&self, address: &Address, pattern: &Address) -> bool {
        meets_target(address, pattern, self.difficulty)
    }

    /// Count an accepted solution; retargets when the window is full
    pub fn record_solution(&mut self, timestamp: u64) -> Option<RetargetRecord> {
        self.total_solutions = self.total_solutions.saturating_add(1);
        self.solutions_in_window = self.solutions_in_window.saturating_add(1);

        if self.solutions_in_window < self.retarget_interval {
            return None;
        }

        let actual_secs = timestamp.saturating_sub(self.window_start);
        let expected_secs = self
            .solutions_in_window
            .saturating_mul(self.target_solve_time_secs);

        let previous = self.difficulty;
        let next = calculate_retarget(
            previous,
            actual_secs,
            expected_secs,
            self.step_numerator,
            self.step_denominator,
            self.min_difficulty,
            self.max_difficulty,
        );

        info!(
            "Difficulty retarget after {} solutions: {} -> {} (window {}s, expected {}s)",
            self.total_solutions, previous, next, actual_secs, expected_secs
        );

        let record = RetargetRecord {
            solution_count: self.total_solutions,
            previous_difficulty: previous,
            new_difficulty: next,
            solutions_in_window: self.solutions_in_window,
            actual_secs,
            expected_secs,
            timestamp,
        };

        self.difficulty = next;
        self.history.push(record.clone());
        self.open_window(timestamp);

        Some(record)
    }

    pub fn total_solutions(&self) -> u64 {
        self.total_solutions
    }

    pub fn solutions_until_retarget(&self) -> u64 {
        self.retarget_interval.saturating_sub(self.solutions_in_window)
    }

    pub fn history(&self) -> &[RetargetRecord] {
        &self.history
    }

    pub fn stats(&self) -> DifficultyStats {
        let min_seen = self
            .history
            .iter()
            .map(|r| r.new_difficulty)
            .min()
            .unwrap_or(self.difficulty);
        let max_seen = self
            .history
            .iter()
            .map(|r| r.new_difficulty)
            .max()
            .unwrap_or(self.difficulty);

        DifficultyStats {
            current_difficulty: self.difficulty,
            min_difficulty_seen: min_seen,
            max_difficulty_seen: max_seen,
            total_retargets: self.history.len(),
            total_solutions: self.total_solutions,
            solutions_in_window: self.solutions_in_window,
            window_start: self.window_start,
            retarget_interval: self.retarget_interval,
            target_solve_time_secs: self.target_solve_time_secs,
        }
    }
}

/// Difficulty statistics
#[derive(Debug, Clone, Serialize)]
pub struct DifficultyStats {
    pub current_difficulty: U256,
    pub min_difficulty_seen: U256,
    pub max_difficulty_seen: U256,
    pub total_retargets: usize,
    pub total_solutions: u64,
    pub solutions_in_window: u64,
    pub window_start: u64,
    pub retarget_interval: u64,
    pub target_solve_time_secs: u64,
}
