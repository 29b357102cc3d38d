//! secp256k1 point arithmetic and address derivation
//!
//! Points arriving from submitters are raw affine coordinates and are only
//! trusted after [`CurvePoint::to_public_key`] has checked the curve
//! equation. The point at infinity has no affine encoding and is never
//! accepted.

use crate::{Address, PoWError, Result};
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::sync::OnceLock;

/// Uncompressed SEC1 prefix
const UNCOMPRESSED_TAG: u8 = 0x04;

static SECP: OnceLock<Secp256k1<All>> = OnceLock::new();

/// Shared signing/verification context
pub(crate) fn secp() -> &'static Secp256k1<All> {
    SECP.get_or_init(Secp256k1::new)
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Affine curve point as submitted (big-endian coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurvePoint {
    #[serde(with = "hex::serde")]
    pub x: [u8; 32],
    #[serde(with = "hex::serde")]
    pub y: [u8; 32],
}

impl CurvePoint {
    pub fn new(x: [u8; 32], y: [u8; 32]) -> Self {
        Self { x, y }
    }

    /// Parse a 65-byte uncompressed encoding (`0x04 || x || y`)
    pub fn from_uncompressed(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 || bytes[0] != UNCOMPRESSED_TAG {
            return Err(PoWError::InvalidPoint);
        }
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[1..33]);
        y.copy_from_slice(&bytes[33..65]);
        Ok(Self { x, y })
    }

    pub fn from_public_key(key: &PublicKey) -> Self {
        let encoded = key.serialize_uncompressed();
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&encoded[1..33]);
        y.copy_from_slice(&encoded[33..65]);
        Self { x, y }
    }

    pub fn to_uncompressed(&self) -> [u8; 65] {
        let mut encoded = [0u8; 65];
        encoded[0] = UNCOMPRESSED_TAG;
        encoded[1..33].copy_from_slice(&self.x);
        encoded[33..65].copy_from_slice(&self.y);
        encoded
    }

    /// Validate coordinates against `y^2 = x^3 + 7 (mod p)`
    pub fn to_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_slice(&self.to_uncompressed()).map_err(|_| PoWError::InvalidPoint)
    }

    pub fn is_on_curve(&self) -> bool {
        self.to_public_key().is_ok()
    }
}

/// `P + Q`, rejecting invalid inputs and an infinite sum
pub fn add_points(p: &CurvePoint, q: &CurvePoint) -> Result<CurvePoint> {
    let sum = combine(&p.to_public_key()?, &q.to_public_key()?)?;
    Ok(CurvePoint::from_public_key(&sum))
}

/// Group addition on already validated keys
pub fn combine(p: &PublicKey, q: &PublicKey) -> Result<PublicKey> {
    p.combine(q).map_err(|_| PoWError::InvalidPoint)
}

pub fn secret_key(secret: &[u8; 32]) -> Result<SecretKey> {
    SecretKey::from_slice(secret).map_err(|_| PoWError::InvalidScalar)
}

/// `k·G` for a non-zero scalar below the group order
pub fn point_from_secret(secret: &[u8; 32]) -> Result<CurvePoint> {
    let key = secret_key(secret)?;
    Ok(CurvePoint::from_public_key(&PublicKey::from_secret_key(secp(), &key)))
}

/// `(a + b) mod n`, failing if the sum is zero
pub fn add_scalars(a: &[u8; 32], b: &[u8; 32]) -> Result<[u8; 32]> {
    let tweak = Scalar::from_be_bytes(*b).map_err(|_| PoWError::InvalidScalar)?;
    let sum = secret_key(a)?.add_tweak(&tweak).map_err(|_| PoWError::InvalidScalar)?;
    Ok(sum.secret_bytes())
}

/// Account address of a validated key: last 20 bytes of `keccak256(x || y)`
pub fn address_of_key(key: &PublicKey) -> Address {
    let encoded = key.serialize_uncompressed();
    Address::from_hash(&keccak256(&encoded[1..]))
}

pub fn address_of(point: &CurvePoint) -> Result<Address> {
    Ok(address_of_key(&point.to_public_key()?))
}

pub fn address_from_secret(secret: &[u8; 32]) -> Result<Address> {
    let key = secret_key(secret)?;
    Ok(address_of_key(&PublicKey::from_secret_key(secp(), &key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const GX: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const GY: &str = "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    fn scalar(n: u64) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        bytes
    }

    fn random_scalar(rng: &mut StdRng) -> [u8; 32] {
        loop {
            let bytes: [u8; 32] = rng.gen();
            if SecretKey::from_slice(&bytes).is_ok() {
                return bytes;
            }
        }
    }

    fn generator() -> CurvePoint {
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&hex::decode(GX).unwrap());
        y.copy_from_slice(&hex::decode(GY).unwrap());
        CurvePoint::new(x, y)
    }

    #[test]
    fn test_generator_from_secret_one() {
        assert_eq!(point_from_secret(&scalar(1)).unwrap(), generator());
    }

    #[test]
    fn test_known_address_vectors() {
        let one: Address = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse().unwrap();
        let two: Address = "0x2b5ad5c4795c026514f8317c7a215e218dccd6cf".parse().unwrap();

        assert_eq!(address_from_secret(&scalar(1)).unwrap(), one);
        assert_eq!(address_of(&generator()).unwrap(), one);
        assert_eq!(address_from_secret(&scalar(2)).unwrap(), two);
    }

    #[test]
    fn test_g_plus_g_is_two_g() {
        let g = generator();
        assert_eq!(add_points(&g, &g).unwrap(), point_from_secret(&scalar(2)).unwrap());
    }

    #[test]
    fn test_rejects_point_off_curve() {
        let mut bad = generator();
        bad.y[31] ^= 1;
        assert!(!bad.is_on_curve());
        assert_eq!(add_points(&bad, &generator()), Err(PoWError::InvalidPoint));
        assert_eq!(address_of(&bad), Err(PoWError::InvalidPoint));
    }

    #[test]
    fn test_rejects_zero_point_encoding() {
        let zero = CurvePoint::new([0u8; 32], [0u8; 32]);
        assert!(!zero.is_on_curve());
    }

    #[test]
    fn test_rejects_coordinates_above_field_prime() {
        let point = CurvePoint::new([0xff; 32], [0xff; 32]);
        assert_eq!(point.to_public_key(), Err(PoWError::InvalidPoint));
    }

    #[test]
    fn test_sum_at_infinity_is_rejected() {
        // n - 1 is the negation of 1, so G + (n-1)G = O
        let n_minus_one =
            hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140").unwrap();
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&n_minus_one);

        let neg_g = point_from_secret(&secret).unwrap();
        assert_eq!(neg_g.x, generator().x);
        assert_eq!(add_points(&generator(), &neg_g), Err(PoWError::InvalidPoint));
        assert_eq!(add_scalars(&scalar(1), &secret), Err(PoWError::InvalidScalar));
    }

    #[test]
    fn test_zero_scalar_rejected() {
        assert_eq!(point_from_secret(&[0u8; 32]), Err(PoWError::InvalidScalar));
    }

    #[test]
    fn test_uncompressed_roundtrip() {
        let g = generator();
        let encoded = g.to_uncompressed();
        assert_eq!(CurvePoint::from_uncompressed(&encoded).unwrap(), g);
        assert!(CurvePoint::from_uncompressed(&encoded[..64]).is_err());

        let mut compressed_tag = encoded;
        compressed_tag[0] = 0x02;
        assert!(CurvePoint::from_uncompressed(&compressed_tag).is_err());
    }

    #[test]
    fn test_addition_commutative_and_associative() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let p = point_from_secret(&random_scalar(&mut rng)).unwrap();
            let q = point_from_secret(&random_scalar(&mut rng)).unwrap();
            let r = point_from_secret(&random_scalar(&mut rng)).unwrap();

            assert_eq!(add_points(&p, &q).unwrap(), add_points(&q, &p).unwrap());

            let left = add_points(&add_points(&p, &q).unwrap(), &r).unwrap();
            let right = add_points(&p, &add_points(&q, &r).unwrap()).unwrap();
            assert_eq!(left, right);
        }
    }

    #[test]
    fn test_point_sum_matches_scalar_sum() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..32 {
            let a = random_scalar(&mut rng);
            let b = random_scalar(&mut rng);

            let sum_point = add_points(&point_from_secret(&a).unwrap(), &point_from_secret(&b).unwrap())
                .unwrap();
            let ab = add_scalars(&a, &b).unwrap();

            assert_eq!(sum_point, point_from_secret(&ab).unwrap());
            assert_eq!(address_of(&sum_point).unwrap(), address_from_secret(&ab).unwrap());
        }
    }

    #[test]
    fn test_serde_hex_coordinates() {
        let json = serde_json::to_value(generator()).unwrap();
        assert_eq!(json["x"], GX);
        let back: CurvePoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, generator());
    }
}
