//! CSP credential signatures
//!
//! A census may be attested by a credential service provider instead of a
//! Merkle tree: the CSP signs `(census_root, process_id, address, weight)`
//! with a Schnorr signature over the embedded curve, challenge derived with
//! the Poseidon hash so the verification equation is cheap in-circuit.

use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, PrimeField};
use ark_std::rand::Rng;
use ark_std::UniformRand;

use crate::crypto::elgamal::scalar_from_field;
use crate::crypto::hash::hash;
use crate::{EmbeddedAffine, EmbeddedFr, F};

/// CSP signing key.
#[derive(Clone, Debug)]
pub struct CspSigningKey {
    pub sk: EmbeddedFr,
    pub pk: EmbeddedAffine,
}

/// Schnorr signature `(R, s)`. The response scalar is carried as an
/// application-field element (its integer value is below the embedded-curve
/// group order), so the circuit can feed its bits to a scalar
/// multiplication directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CspSignature {
    pub r: EmbeddedAffine,
    pub s: F,
}

impl CspSigningKey {
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let sk = EmbeddedFr::rand(rng);
        let pk = (EmbeddedAffine::generator() * sk).into_affine();
        Self { sk, pk }
    }

    /// Sign the census claim for one voter.
    pub fn sign<Rn: Rng>(
        &self,
        census_root: F,
        process_id: F,
        address: F,
        weight: F,
        rng: &mut Rn,
    ) -> CspSignature {
        let nonce = EmbeddedFr::rand(rng);
        let r = (EmbeddedAffine::generator() * nonce).into_affine();
        let c = challenge(&r, &self.pk, census_root, process_id, address, weight);
        let s = nonce + scalar_from_field(&c) * self.sk;
        CspSignature {
            r,
            s: F::from_le_bytes_mod_order(&s.into_bigint().to_bytes_le()),
        }
    }
}

/// `c = H(R.x, R.y, PK.x, PK.y, census_root, process_id, address, weight)`.
pub fn challenge(
    r: &EmbeddedAffine,
    pk: &EmbeddedAffine,
    census_root: F,
    process_id: F,
    address: F,
    weight: F,
) -> F {
    hash(&[r.x, r.y, pk.x, pk.y, census_root, process_id, address, weight])
}

/// Check `[s]G == R + [c]PK`.
pub fn verify(
    pk: &EmbeddedAffine,
    census_root: F,
    process_id: F,
    address: F,
    weight: F,
    sig: &CspSignature,
) -> bool {
    let c = challenge(&sig.r, pk, census_root, process_id, address, weight);
    let lhs = EmbeddedAffine::generator() * scalar_from_field(&sig.s);
    let rhs = sig.r + *pk * scalar_from_field(&c);
    lhs.into_affine() == rhs.into_affine()
}
