//! The mining contract
//!
//! A single state machine owning the round commitment, the difficulty and
//! reward state, the payout ledger and the lifecycle. Every mutating call
//! takes the caller and block data through an [`ExecutionContext`] and
//! either commits completely or returns an error with state untouched.

use crate::commitment::Commitment;
use crate::context::ExecutionContext;
use crate::curve::{address_of_key, combine, CurvePoint};
use crate::difficulty::{DifficultyController, DifficultyStats, MiningParams, RetargetRecord};
use crate::events::{EventLog, PowEvent};
use crate::ledger::RewardLedger;
use crate::lifecycle::{InitPhase, Lifecycle, MiningStatus};
use crate::rewards::RewardCalculator;
use crate::signature::{recover_signer, solution_digest};
use crate::token::RewardToken;
use crate::work::{Submission, WorkPackage};
use crate::{Address, PoWConfig, PoWError, Result};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outcome of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Round the solution closed
    pub round: u64,
    /// Address of `P_A + P_B`
    pub combined_address: Address,
    pub beneficiary: Address,
    /// Amount paid
    pub reward: U256,
    pub block_number: u64,
    /// Round opened by the rotation
    pub next_round: u64,
    pub next_difficulty: U256,
    pub next_reward: U256,
    pub retarget: Option<RetargetRecord>,
}

/// State introduced by the second initialization phase
#[derive(Debug, Clone)]
struct MiningState {
    commitment: Commitment,
    difficulty: DifficultyController,
    params: Option<MiningParams>,
    rewards: RewardCalculator,
    reward: U256,
}

/// Proof-of-Work mining contract paying rewards in token `T`
pub struct PowContract<T: RewardToken> {
    address: Address,
    config: PoWConfig,
    token: T,
    lifecycle: Lifecycle,
    state: Option<MiningState>,
    ledger: RewardLedger,
    events: EventLog,
}

impl<T: RewardToken> PowContract<T> {
    /// Deploy with immutable wiring; the contract holds rewards at `address`
    pub fn new(address: Address, token: T, config: PoWConfig) -> Result<Self> {
        config.validate()?;
        info!("Deploying PoW contract at {}", address);

        Ok(Self {
            address,
            config,
            token,
            lifecycle: Lifecycle::new(),
            state: None,
            ledger: RewardLedger::new(),
            events: EventLog::new(),
        })
    }

    /// First initializer: owner wiring
    pub fn initialize(&mut self, _ctx: &ExecutionContext, owner: Address) -> Result<()> {
        self.lifecycle.initialize(owner)?;
        self.events.emit(PowEvent::OwnershipTransferred {
            previous: None,
            new: owner,
        });
        self.events.emit(PowEvent::Initialized {
            version: InitPhase::Phase1Done.version(),
        });
        Ok(())
    }

    /// Second initializer: mining state added by the upgrade
    pub fn initialize2(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.lifecycle.initialize2(&ctx.caller)?;

        self.state = Some(MiningState {
            commitment: Commitment::genesis(&self.address, ctx),
            difficulty: DifficultyController::new(&self.config),
            params: None,
            rewards: RewardCalculator::new(U256::zero(), self.config.halving_interval),
            reward: U256::zero(),
        });

        self.events.emit(PowEvent::Initialized {
            version: InitPhase::Phase2Done.version(),
        });
        Ok(())
    }

    /// Configure reward and retarget parameters; only before mining starts
    pub fn set_mining_params(&mut self, ctx: &ExecutionContext, params: MiningParams) -> Result<()> {
        self.lifecycle.ensure_admin(&ctx.caller)?;
        if self.lifecycle.status() != MiningStatus::NotStarted {
            return Err(PoWError::MiningAlreadyStarted);
        }
        params.validate()?;

        let state = self.state_mut()?;
        state.difficulty.configure(&params);
        state.rewards = RewardCalculator::new(params.reward, state.rewards.halving_interval());
        state.reward = params.reward;
        state.params = Some(params);

        self.events.emit(PowEvent::MiningParamsUpdated { params });
        Ok(())
    }

    /// One-way NotStarted -> Active
    pub fn start_mining(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.lifecycle.ensure_admin(&ctx.caller)?;
        if self.lifecycle.status() != MiningStatus::NotStarted {
            return Err(PoWError::MiningAlreadyStarted);
        }
        if self.state()?.params.is_none() {
            return Err(PoWError::ParamsNotSet);
        }

        // Re-seed so work done between initialization and start is void
        let address = self.address;
        let state = self.state_mut()?;
        state.commitment = Commitment::genesis(&address, ctx);
        state.difficulty.open_window(ctx.timestamp);
        let round = state.commitment.round();
        let secret = state.commitment.secret_bytes();

        self.lifecycle.set_status(MiningStatus::Active)?;
        self.events.emit(PowEvent::MiningStarted {
            round,
            timestamp: ctx.timestamp,
        });
        self.events.emit(PowEvent::RoundAdvanced { round, secret });
        Ok(())
    }

    /// Active -> Stopped; submissions are rejected afterwards
    pub fn stop_mining(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.lifecycle.ensure_admin(&ctx.caller)?;
        self.lifecycle.set_status(MiningStatus::Stopped)?;
        let round = self.state()?.commitment.round();
        self.events.emit(PowEvent::MiningStopped {
            round,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    pub fn transfer_ownership(&mut self, ctx: &ExecutionContext, new_owner: Address) -> Result<()> {
        let previous = self.lifecycle.transfer_ownership(&ctx.caller, new_owner)?;
        self.events.emit(PowEvent::OwnershipTransferred {
            previous,
            new: new_owner,
        });
        Ok(())
    }

    /// Verify a claimed solution and pay its beneficiary
    pub fn submit(&mut self, ctx: &ExecutionContext, submission: &Submission) -> Result<SubmissionReceipt> {
        if self.lifecycle.status() != MiningStatus::Active {
            return Err(PoWError::NotActive);
        }
        let state = self.state.as_ref().ok_or(PoWError::NotActive)?;

        let candidate = submission.point.to_public_key()?;
        let combined = combine(state.commitment.public_key(), &candidate)?;
        let solver = address_of_key(&combined);

        if !state.difficulty.is_met(&solver, &self.config.target_pattern) {
            debug!("Solver {} misses difficulty {}", solver, state.difficulty.difficulty());
            return Err(PoWError::DifficultyNotMet);
        }

        let digest = solution_digest(&submission.beneficiary, &submission.data);
        let signer = recover_signer(&digest, &submission.signature)?;
        if signer != solver {
            debug!("Signature by {} does not own solver {}", signer, solver);
            return Err(PoWError::WrongSignature);
        }

        let round = state.commitment.round();
        let reward = state.reward;

        // Only fallible mutation; nothing has changed if it fails
        self.ledger.pay(
            &mut self.token,
            &self.address,
            &submission.beneficiary,
            reward,
            round,
        )?;

        let state = self.state.as_mut().ok_or(PoWError::NotActive)?;
        let retarget = state.difficulty.record_solution(ctx.timestamp);
        let solutions = state.difficulty.total_solutions();

        let previous_reward = state.reward;
        state.reward = state.rewards.reward_at(solutions);
        let halved = (state.reward != previous_reward).then_some((previous_reward, state.reward));

        state.commitment = state.commitment.rotate(&solver, ctx);

        let receipt = SubmissionReceipt {
            round,
            combined_address: solver,
            beneficiary: submission.beneficiary,
            reward,
            block_number: ctx.block_number,
            next_round: state.commitment.round(),
            next_difficulty: state.difficulty.difficulty(),
            next_reward: state.reward,
            retarget: retarget.clone(),
        };
        let next_secret = state.commitment.secret_bytes();

        self.events.emit(PowEvent::SolutionAccepted {
            round,
            solver,
            beneficiary: submission.beneficiary,
            reward,
            block_number: ctx.block_number,
        });
        if let Some(record) = retarget {
            self.events.emit(PowEvent::DifficultyRetargeted { record });
        }
        if let Some((previous, new)) = halved {
            self.events.emit(PowEvent::RewardHalved {
                previous,
                new,
                solution_count: solutions,
            });
        }
        self.events.emit(PowEvent::RoundAdvanced {
            round: receipt.next_round,
            secret: next_secret,
        });

        Ok(receipt)
    }

    fn state(&self) -> Result<&MiningState> {
        self.state.as_ref().ok_or(PoWError::NotInitialized)
    }

    fn state_mut(&mut self) -> Result<&mut MiningState> {
        self.state.as_mut().ok_or(PoWError::NotInitialized)
    }

    /// Current round scalar `a`
    pub fn private_key_a(&self) -> Result<[u8; 32]> {
        Ok(self.state()?.commitment.secret_bytes())
    }

    /// Current round point `P_A`
    pub fn point_a(&self) -> Result<CurvePoint> {
        Ok(self.state()?.commitment.point())
    }

    pub fn round(&self) -> Result<u64> {
        Ok(self.state()?.commitment.round())
    }

    pub fn difficulty(&self) -> Result<U256> {
        Ok(self.state()?.difficulty.difficulty())
    }

    pub fn reward(&self) -> Result<U256> {
        Ok(self.state()?.reward)
    }

    /// Snapshot of everything a miner needs
    pub fn current_round(&self) -> Result<WorkPackage> {
        let state = self.state()?;
        Ok(WorkPackage {
            round: state.commitment.round(),
            secret: state.commitment.secret_bytes(),
            point: state.commitment.point(),
            difficulty: state.difficulty.difficulty(),
            reward: state.reward,
            target_pattern: self.config.target_pattern,
        })
    }

    pub fn mining_params(&self) -> Option<MiningParams> {
        self.state.as_ref().and_then(|s| s.params)
    }

    pub fn difficulty_stats(&self) -> Result<DifficultyStats> {
        Ok(self.state()?.difficulty.stats())
    }

    pub fn total_solutions(&self) -> u64 {
        self.state
            .as_ref()
            .map(|s| s.difficulty.total_solutions())
            .unwrap_or(0)
    }

    pub fn status(&self) -> MiningStatus {
        self.lifecycle.status()
    }

    pub fn init_phase(&self) -> InitPhase {
        self.lifecycle.phase()
    }

    pub fn owner(&self) -> Option<Address> {
        self.lifecycle.owner()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &PoWConfig {
        &self.config
    }

    /// Token balance available for rewards
    pub fn token_balance(&self) -> U256 {
        self.token.balance_of(&self.address)
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    /// Token access for funding the contract
    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    pub fn events(&self) -> &[PowEvent] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<PowEvent> {
        self.events.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{add_scalars, address_from_secret, point_from_secret};
    use crate::signature::sign_solution;
    use crate::token::InMemoryToken;

    const CONTRACT: Address = Address::repeat_byte(0xc0);
    const OWNER: Address = Address::repeat_byte(0xaa);
    const MINER: Address = Address::repeat_byte(0xbb);
    const BENEFICIARY: Address = Address::repeat_byte(0xbe);

    fn ctx(caller: Address, block: u64) -> ExecutionContext {
        ExecutionContext::new(caller, block, 1_700_000_000 + block * 12)
    }

    fn one_token() -> U256 {
        U256::exp10(18)
    }

    fn deployed(config: PoWConfig) -> PowContract<InMemoryToken> {
        let mut token = InMemoryToken::new("INF");
        token.mint(&CONTRACT, one_token() * U256::from(1_000u64)).unwrap();
        let mut contract = PowContract::new(CONTRACT, token, config).unwrap();
        contract.initialize(&ctx(OWNER, 1), OWNER).unwrap();
        contract.initialize2(&ctx(OWNER, 2)).unwrap();
        contract
    }

    fn started(config: PoWConfig) -> PowContract<InMemoryToken> {
        let mut contract = deployed(config);
        contract
            .set_mining_params(&ctx(OWNER, 3), MiningParams::new(one_token(), 1, 10, 9))
            .unwrap();
        contract.start_mining(&ctx(OWNER, 4)).unwrap();
        contract
    }

    fn easy_config() -> PoWConfig {
        PoWConfig::default().with_initial_difficulty(U256::one() << 156)
    }

    /// Brute-force a solution for the current round starting at `b = start`
    fn solve(contract: &PowContract<InMemoryToken>, start: u64, beneficiary: Address) -> (Submission, Address) {
        let work = contract.current_round().unwrap();
        let mut b = start;
        loop {
            let mut b_bytes = [0u8; 32];
            b_bytes[24..].copy_from_slice(&b.to_be_bytes());
            let ab = add_scalars(&work.secret, &b_bytes).unwrap();
            let solver = address_from_secret(&ab).unwrap();
            if work.meets_target(&solver) {
                let signature = sign_solution(&ab, &beneficiary, b"test").unwrap();
                let submission = Submission::new(
                    beneficiary,
                    point_from_secret(&b_bytes).unwrap(),
                    signature,
                    b"test".to_vec(),
                );
                return (submission, solver);
            }
            b += 1;
        }
    }

    #[test]
    fn test_deploy_rejects_invalid_config() {
        let config = PoWConfig::default().with_target_solve_time(0);
        assert!(PowContract::new(CONTRACT, InMemoryToken::new("INF"), config).is_err());
    }

    #[test]
    fn test_reads_before_phase_two_fail() {
        let mut contract = PowContract::new(CONTRACT, InMemoryToken::new("INF"), easy_config()).unwrap();
        contract.initialize(&ctx(OWNER, 1), OWNER).unwrap();
        assert_eq!(contract.private_key_a(), Err(PoWError::NotInitialized));
        assert_eq!(contract.difficulty(), Err(PoWError::NotInitialized));
        assert_eq!(contract.init_phase(), InitPhase::Phase1Done);
    }

    #[test]
    fn test_initialize2_sets_initial_state() {
        let contract = deployed(easy_config());
        assert_eq!(contract.difficulty().unwrap(), U256::one() << 156);
        assert!(contract.reward().unwrap().is_zero());
        assert_eq!(contract.status(), MiningStatus::NotStarted);
        assert_eq!(contract.round().unwrap(), 0);
        assert_eq!(
            point_from_secret(&contract.private_key_a().unwrap()).unwrap(),
            contract.point_a().unwrap()
        );
    }

    #[test]
    fn test_double_initialization_fails() {
        let mut contract = deployed(easy_config());
        assert_eq!(
            contract.initialize(&ctx(MINER, 5), MINER),
            Err(PoWError::AlreadyInitialized)
        );
        assert_eq!(contract.initialize2(&ctx(OWNER, 5)), Err(PoWError::AlreadyInitialized));
        assert_eq!(contract.owner(), Some(OWNER));
    }

    #[test]
    fn test_admin_operations_are_owner_gated() {
        let mut contract = deployed(easy_config());
        let params = MiningParams::new(one_token(), 1, 10, 9);

        assert_eq!(
            contract.set_mining_params(&ctx(MINER, 3), params),
            Err(PoWError::Unauthorized(MINER))
        );
        contract.set_mining_params(&ctx(OWNER, 3), params).unwrap();
        assert_eq!(contract.start_mining(&ctx(MINER, 4)), Err(PoWError::Unauthorized(MINER)));
        contract.start_mining(&ctx(OWNER, 4)).unwrap();
        assert_eq!(contract.stop_mining(&ctx(MINER, 5)), Err(PoWError::Unauthorized(MINER)));
    }

    #[test]
    fn test_start_requires_params() {
        let mut contract = deployed(easy_config());
        assert_eq!(contract.start_mining(&ctx(OWNER, 3)), Err(PoWError::ParamsNotSet));
    }

    #[test]
    fn test_params_locked_after_start() {
        let mut contract = started(easy_config());
        assert_eq!(
            contract.set_mining_params(&ctx(OWNER, 5), MiningParams::new(U256::one(), 1, 10, 9)),
            Err(PoWError::MiningAlreadyStarted)
        );
        assert_eq!(contract.start_mining(&ctx(OWNER, 5)), Err(PoWError::MiningAlreadyStarted));
        assert_eq!(contract.reward().unwrap(), one_token());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut contract = deployed(easy_config());
        assert!(matches!(
            contract.set_mining_params(&ctx(OWNER, 3), MiningParams::new(U256::one(), 0, 10, 9)),
            Err(PoWError::InvalidParams(_))
        ));
        assert!(contract.mining_params().is_none());
    }

    #[test]
    fn test_start_reseeds_round() {
        let mut contract = deployed(easy_config());
        let before = contract.private_key_a().unwrap();
        contract
            .set_mining_params(&ctx(OWNER, 3), MiningParams::new(one_token(), 1, 10, 9))
            .unwrap();
        contract.start_mining(&ctx(OWNER, 4)).unwrap();
        assert_ne!(contract.private_key_a().unwrap(), before);
        assert_eq!(contract.status(), MiningStatus::Active);
    }

    #[test]
    fn test_submit_before_start_is_not_active() {
        let mut contract = deployed(easy_config());
        let mut started = started(easy_config());
        let (submission, _) = solve(&started, 1, BENEFICIARY);

        assert_eq!(contract.submit(&ctx(MINER, 9), &submission), Err(PoWError::NotActive));
        assert!(started.submit(&ctx(MINER, 9), &submission).is_ok());
    }

    #[test]
    fn test_accepts_valid_solution_and_pays_reward() {
        let mut contract = started(easy_config());
        let secret_before = contract.private_key_a().unwrap();
        let difficulty_before = contract.difficulty().unwrap();
        let (submission, solver) = solve(&contract, 1, BENEFICIARY);

        let receipt = contract.submit(&ctx(MINER, 10), &submission).unwrap();

        assert_eq!(receipt.combined_address, solver);
        assert_eq!(receipt.reward, one_token());
        assert_eq!(receipt.next_round, receipt.round + 1);
        assert_eq!(contract.token().balance_of(&BENEFICIARY), one_token());
        assert_eq!(contract.token().balance_of(&MINER), U256::zero());
        assert_ne!(contract.private_key_a().unwrap(), secret_before);
        assert_ne!(contract.difficulty().unwrap(), difficulty_before);
        assert_eq!(contract.total_solutions(), 1);
        assert!(contract
            .events()
            .iter()
            .any(|e| matches!(e, PowEvent::SolutionAccepted { solver: s, .. } if *s == solver)));
    }

    #[test]
    fn test_replayed_solution_fails_after_rotation() {
        let mut contract = started(easy_config());
        let (submission, _) = solve(&contract, 1, BENEFICIARY);
        contract.submit(&ctx(MINER, 10), &submission).unwrap();

        let err = contract.submit(&ctx(MINER, 11), &submission).unwrap_err();
        assert!(matches!(err, PoWError::DifficultyNotMet | PoWError::WrongSignature));
        assert_eq!(contract.token().balance_of(&BENEFICIARY), one_token());
    }

    #[test]
    fn test_front_run_with_other_beneficiary_fails() {
        let mut contract = started(easy_config());
        let (submission, _) = solve(&contract, 1, BENEFICIARY);
        let stolen = submission.clone().with_beneficiary(MINER);

        assert_eq!(contract.submit(&ctx(MINER, 10), &stolen), Err(PoWError::WrongSignature));
        assert!(contract.submit(&ctx(MINER, 11), &submission).is_ok());
    }

    #[test]
    fn test_invalid_point_rejected() {
        let mut contract = started(easy_config());
        let (mut submission, _) = solve(&contract, 1, BENEFICIARY);
        submission.point.y[31] ^= 1;
        assert_eq!(contract.submit(&ctx(MINER, 10), &submission), Err(PoWError::InvalidPoint));
    }

    #[test]
    fn test_negated_commitment_point_rejected() {
        let mut contract = started(easy_config());
        let point_a = contract.point_a().unwrap();
        // -P_A has the same x and y' = p - y
        let p = U256::from_big_endian(&hex::decode(
            "fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f",
        )
        .unwrap());
        let neg_y = p - U256::from_big_endian(&point_a.y);
        let mut y = [0u8; 32];
        neg_y.to_big_endian(&mut y);

        let submission = Submission::new(BENEFICIARY, CurvePoint::new(point_a.x, y), vec![0u8; 65], Vec::new());
        assert_eq!(contract.submit(&ctx(MINER, 10), &submission), Err(PoWError::InvalidPoint));
    }

    #[test]
    fn test_difficulty_not_met() {
        let mut contract = started(PoWConfig::default().with_initial_difficulty(U256::one()));
        // at difficulty 1 only the exact pattern passes
        let point = point_from_secret(&[1u8; 32]).unwrap();
        let submission = Submission::new(BENEFICIARY, point, vec![0u8; 65], Vec::new());
        assert_eq!(contract.submit(&ctx(MINER, 10), &submission), Err(PoWError::DifficultyNotMet));
    }

    #[test]
    fn test_insufficient_balance_fails_without_mutation() {
        let mut token = InMemoryToken::new("INF");
        token.mint(&CONTRACT, U256::from(5u64)).unwrap();
        let mut contract = PowContract::new(CONTRACT, token, easy_config()).unwrap();
        contract.initialize(&ctx(OWNER, 1), OWNER).unwrap();
        contract.initialize2(&ctx(OWNER, 2)).unwrap();
        contract
            .set_mining_params(&ctx(OWNER, 3), MiningParams::new(U256::from(10u64), 1, 10, 9))
            .unwrap();
        contract.start_mining(&ctx(OWNER, 4)).unwrap();

        let secret = contract.private_key_a().unwrap();
        let difficulty = contract.difficulty().unwrap();
        let (submission, _) = solve(&contract, 1, BENEFICIARY);

        assert!(matches!(
            contract.submit(&ctx(MINER, 10), &submission),
            Err(PoWError::InsufficientBalance { .. })
        ));
        assert_eq!(contract.private_key_a().unwrap(), secret);
        assert_eq!(contract.difficulty().unwrap(), difficulty);
        assert_eq!(contract.total_solutions(), 0);
        assert_eq!(contract.token_balance(), U256::from(5u64));
        assert!(contract.token().balance_of(&BENEFICIARY).is_zero());
    }

    #[test]
    fn test_stop_rejects_submissions() {
        let mut contract = started(easy_config());
        let (submission, _) = solve(&contract, 1, BENEFICIARY);
        contract.stop_mining(&ctx(OWNER, 5)).unwrap();

        assert_eq!(contract.status(), MiningStatus::Stopped);
        assert_eq!(contract.submit(&ctx(MINER, 10), &submission), Err(PoWError::NotActive));
        assert!(contract.stop_mining(&ctx(OWNER, 6)).is_err());
    }

    #[test]
    fn test_reward_halves_through_submissions() {
        let mut contract = started(easy_config().with_halving_interval(2));
        for i in 0..4u64 {
            let (submission, _) = solve(&contract, 1 + i * 1_000, BENEFICIARY);
            contract.submit(&ctx(MINER, 10 + i), &submission).unwrap();
        }

        // 1 + 1 + 0.5 + 0.5
        let expected = one_token() * U256::from(3u64);
        assert_eq!(contract.token().balance_of(&BENEFICIARY), expected);
        assert_eq!(contract.reward().unwrap(), one_token() / U256::from(4u64));
        assert_eq!(
            contract
                .events()
                .iter()
                .filter(|e| matches!(e, PowEvent::RewardHalved { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_transfer_ownership_moves_admin_rights() {
        let mut contract = deployed(easy_config());
        contract.transfer_ownership(&ctx(OWNER, 3), MINER).unwrap();
        assert_eq!(contract.owner(), Some(MINER));
        assert_eq!(
            contract.set_mining_params(&ctx(OWNER, 4), MiningParams::new(U256::one(), 1, 10, 9)),
            Err(PoWError::Unauthorized(OWNER))
        );
    }
}
