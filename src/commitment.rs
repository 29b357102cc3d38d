//! Round commitments
//!
//! Each round publishes its secret scalar `a` in full together with the
//! cached point `P_A = a·G`. Publishing `a` lets every miner search
//! against the round; it does not let anyone claim another miner's
//! solution, since claims are signed with `a + b`.
//!
//! The next secret is derived from the current one, the combined address
//! that closed the round and the block data of the closing transaction.
//! The closing address is unknown until the round is solved, so secrets of
//! later rounds cannot be computed ahead of time.

use crate::context::ExecutionContext;
use crate::curve::{keccak256, secp, CurvePoint};
use crate::Address;
use secp256k1::{PublicKey, SecretKey};
use tracing::debug;

const GENESIS_DOMAIN: &[u8] = b"pow.round.genesis";
const ROTATE_DOMAIN: &[u8] = b"pow.round.next";

/// The active round's public commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    round: u64,
    secret: SecretKey,
    point: PublicKey,
}

impl Commitment {
    /// Commitment for a known secret
    pub fn from_secret(round: u64, secret: SecretKey) -> Self {
        let point = PublicKey::from_secret_key(secp(), &secret);
        Self {
            round,
            secret,
            point,
        }
    }

    /// First commitment, seeded from the deploying contract and block data
    pub fn genesis(contract: &Address, ctx: &ExecutionContext) -> Self {
        let mut seed = Vec::with_capacity(GENESIS_DOMAIN.len() + 20 + 48);
        seed.extend_from_slice(GENESIS_DOMAIN);
        seed.extend_from_slice(contract.as_bytes());
        seed.extend_from_slice(&ctx.entropy());

        let commitment = Self::from_secret(0, derive_secret(keccak256(&seed)));
        debug!("Genesis round secret 0x{}", hex::encode(commitment.secret_bytes()));
        commitment
    }

    /// Commitment for the round following one closed by `solver`
    pub fn rotate(&self, solver: &Address, ctx: &ExecutionContext) -> Self {
        let mut seed = Vec::with_capacity(ROTATE_DOMAIN.len() + 32 + 20 + 48 + 8);
        seed.extend_from_slice(ROTATE_DOMAIN);
        seed.extend_from_slice(&self.secret.secret_bytes());
        seed.extend_from_slice(solver.as_bytes());
        seed.extend_from_slice(&ctx.entropy());
        seed.extend_from_slice(&self.round.to_be_bytes());

        let next = Self::from_secret(self.round + 1, derive_secret(keccak256(&seed)));
        debug!(
            "Round {} -> {}: secret 0x{}",
            self.round,
            next.round,
            hex::encode(next.secret_bytes())
        );
        next
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// The public round scalar `a`
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.point
    }

    pub fn point(&self) -> CurvePoint {
        CurvePoint::from_public_key(&self.point)
    }
}

/// Map a hash onto a valid non-zero scalar below the group order
fn derive_secret(mut hash: [u8; 32]) -> SecretKey {
    loop {
        if let Ok(secret) = SecretKey::from_slice(&hash) {
            return secret;
        }
        hash = keccak256(&hash);
    }
}
