//! Ownership proofs for submitted solutions
//!
//! A solution is claimed by signing `keccak256(beneficiary || data)` in the
//! personal-message form (`"\x19Ethereum Signed Message:\n32" || digest`)
//! with the combined private scalar `a + b`. Signatures are 65 bytes
//! `r || s || v` with `v` in {27, 28} and `s` in the lower half of the
//! group order.

use crate::curve::{address_of_key, keccak256, secp, secret_key};
use crate::{Address, PoWError, Result};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::Message;

pub const SIGNATURE_LEN: usize = 65;

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// `n / 2` for secp256k1
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// Digest bound to a claim: `keccak256(beneficiary || data)`
pub fn solution_digest(beneficiary: &Address, data: &[u8]) -> [u8; 32] {
    let mut packed = Vec::with_capacity(20 + data.len());
    packed.extend_from_slice(beneficiary.as_bytes());
    packed.extend_from_slice(data);
    keccak256(&packed)
}

pub fn personal_message_hash(digest: &[u8; 32]) -> [u8; 32] {
    let mut message = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 32);
    message.extend_from_slice(PERSONAL_MESSAGE_PREFIX);
    message.extend_from_slice(digest);
    keccak256(&message)
}

/// Sign a digest in personal-message form
pub fn sign_digest(secret: &[u8; 32], digest: &[u8; 32]) -> Result<Vec<u8>> {
    let key = secret_key(secret)?;
    let message = Message::from_digest(personal_message_hash(digest));
    let (recovery_id, compact) = secp()
        .sign_ecdsa_recoverable(&message, &key)
        .serialize_compact();

    let mut signature = Vec::with_capacity(SIGNATURE_LEN);
    signature.extend_from_slice(&compact);
    signature.push(27 + recovery_id.to_i32() as u8);
    Ok(signature)
}

/// Sign a claim for `beneficiary` with the combined scalar
pub fn sign_solution(secret: &[u8; 32], beneficiary: &Address, data: &[u8]) -> Result<Vec<u8>> {
    sign_digest(secret, &solution_digest(beneficiary, data))
}

/// Recover the address that signed `digest` in personal-message form
pub fn recover_signer(digest: &[u8; 32], signature: &[u8]) -> Result<Address> {
    if signature.len() != SIGNATURE_LEN {
        return Err(PoWError::InvalidSignature(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }

    if signature[32..64] > HALF_ORDER[..] {
        return Err(PoWError::InvalidSignature("malleable s value".to_string()));
    }

    let v = signature[64];
    if v != 27 && v != 28 {
        return Err(PoWError::InvalidSignature(format!("invalid v value {}", v)));
    }

    let recovery_id = RecoveryId::from_i32(i32::from(v - 27))
        .map_err(|e| PoWError::InvalidSignature(e.to_string()))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|e| PoWError::InvalidSignature(e.to_string()))?;

    let message = Message::from_digest(personal_message_hash(digest));
    let key = secp()
        .recover_ecdsa(&message, &recoverable)
        .map_err(|e| PoWError::InvalidSignature(e.to_string()))?;

    Ok(address_of_key(&key))
}
