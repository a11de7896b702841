//! Homomorphic ElGamal ballot algebra
//!
//! A ballot is a fixed-width vector of exponential-ElGamal ciphertexts over
//! the embedded Edwards curve. Ciphertexts add pointwise, so ballots form an
//! additive group with the all-neutral ballot as identity; encrypting zero
//! under fresh randomness yields a neutral element for *decryption*, which is
//! the basis of both re-encryption and the results accumulators.
//!
//! Two coordinate representations cross the protocol:
//! - **RTE** (reduced twisted Edwards): the curve's native affine form, used
//!   for state-leaf serialization and all in-circuit arithmetic.
//! - **TE** (twisted Edwards): the public-facing form, differing by the sign
//!   of the x coordinate.
//! Conversions are explicit; a point fed to the wrong layer fails the
//! corresponding hash or equality check.

use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, PrimeField, Zero};

use crate::crypto::hash::chain_hash;
use crate::errors::StateError;
use crate::{EmbeddedAffine, EmbeddedFr, EmbeddedProjective, F};

/// Convert an application-field element into an embedded-curve scalar by its
/// integer value. Matches the in-circuit `scalar_mul_le` over the element's
/// full bit decomposition.
pub fn scalar_from_field(k: &F) -> EmbeddedFr {
    EmbeddedFr::from_le_bytes_mod_order(&k.into_bigint().to_bytes_le())
}

/// RTE -> TE: negate the x coordinate.
pub fn to_te(p: &EmbeddedAffine) -> (F, F) {
    (-p.x, p.y)
}

/// TE -> RTE. Fails if the coordinates are not a subgroup point.
pub fn from_te(x: F, y: F) -> Result<EmbeddedAffine, StateError> {
    let p = EmbeddedAffine::new_unchecked(-x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(StateError::SubgroupCheckFailed);
    }
    Ok(p)
}

/// ElGamal public key (a subgroup point of the embedded curve).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncryptionKey(pub EmbeddedAffine);

impl EncryptionKey {
    pub fn new(point: EmbeddedAffine) -> Result<Self, StateError> {
        if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(StateError::SubgroupCheckFailed);
        }
        Ok(Self(point))
    }

    /// Derive the key for a secret scalar.
    pub fn from_secret(sk: &EmbeddedFr) -> Self {
        Self((EmbeddedAffine::generator() * *sk).into_affine())
    }

    /// State-leaf serialization: `[x, y]` in RTE form.
    pub fn serialize_rte(&self) -> [F; 2] {
        [self.0.x, self.0.y]
    }

    /// Public-input serialization: `[x, y]` in TE form.
    pub fn serialize_te(&self) -> [F; 2] {
        let (x, y) = to_te(&self.0);
        [x, y]
    }
}

/// One exponential-ElGamal ciphertext: `(c1, c2) = ([k]G, [k]PK + [m]G)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    pub c1: EmbeddedAffine,
    pub c2: EmbeddedAffine,
}

impl Ciphertext {
    /// The neutral ciphertext `((0,1), (0,1))`.
    pub fn neutral() -> Self {
        Self {
            c1: EmbeddedAffine::zero(),
            c2: EmbeddedAffine::zero(),
        }
    }

    pub fn encrypt(pk: &EncryptionKey, message: &F, k: &F) -> Self {
        let g = EmbeddedAffine::generator();
        let k_scalar = scalar_from_field(k);
        let m_scalar = scalar_from_field(message);
        let c1 = (g * k_scalar).into_affine();
        let c2 = (pk.0 * k_scalar + g * m_scalar).into_affine();
        Self { c1, c2 }
    }

    /// Pointwise addition; homomorphic in the plaintext.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            c1: (EmbeddedProjective::from(self.c1) + other.c1).into_affine(),
            c2: (EmbeddedProjective::from(self.c2) + other.c2).into_affine(),
        }
    }

    /// Recover `[m]G` under `sk`.
    pub fn decrypt_point(&self, sk: &EmbeddedFr) -> EmbeddedAffine {
        (EmbeddedProjective::from(self.c2) - self.c1 * *sk).into_affine()
    }
}

/// A fixed-width vector of exactly `NF` ciphertexts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ballot<const NF: usize> {
    pub ciphertexts: [Ciphertext; NF],
}

impl<const NF: usize> Default for Ballot<NF> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const NF: usize> Ballot<NF> {
    /// All-neutral ballot.
    pub fn new() -> Self {
        Self {
            ciphertexts: [Ciphertext::neutral(); NF],
        }
    }

    /// Encrypt `NF` plaintexts. Ciphertext `i` uses the `i`-th element of the
    /// randomness chain `k, H(k), H(H(k)), …`.
    pub fn encrypt(pk: &EncryptionKey, messages: &[F; NF], k0: &F) -> Self {
        let mut ciphertexts = [Ciphertext::neutral(); NF];
        let mut k = *k0;
        for (i, message) in messages.iter().enumerate() {
            ciphertexts[i] = Ciphertext::encrypt(pk, message, &k);
            k = chain_hash(k);
        }
        Self { ciphertexts }
    }

    /// An encryption of all zeroes with randomness chain starting at `k0`.
    pub fn encrypt_zero(pk: &EncryptionKey, k0: &F) -> Self {
        Self::encrypt(pk, &[F::zero(); NF], k0)
    }

    /// Re-randomize: advance the chain to `k' = H(k)`, add an encrypted zero
    /// whose chain starts at `k'`, and return the new ballot together with
    /// `k'`. Decryption is unchanged.
    pub fn reencrypt(&self, pk: &EncryptionKey, k: &F) -> (Self, F) {
        let k_next = chain_hash(*k);
        let zero = Self::encrypt_zero(pk, &k_next);
        (self.add(&zero), k_next)
    }

    /// Pointwise homomorphic sum.
    pub fn add(&self, other: &Self) -> Self {
        let mut ciphertexts = [Ciphertext::neutral(); NF];
        for i in 0..NF {
            ciphertexts[i] = self.ciphertexts[i].add(&other.ciphertexts[i]);
        }
        Self { ciphertexts }
    }

    pub fn is_equal(&self, other: &Self) -> bool {
        self == other
    }

    /// Branchless-style conditional used by the witness generator; mirrors
    /// the in-circuit select gadget.
    pub fn select(cond: bool, a: &Self, b: &Self) -> Self {
        if cond {
            *a
        } else {
            *b
        }
    }

    /// State-leaf serialization: `c1.x, c1.y, c2.x, c2.y` per ciphertext,
    /// RTE form, `4·NF` elements.
    pub fn serialize_rte(&self) -> Vec<F> {
        let mut out = Vec::with_capacity(4 * NF);
        for ct in &self.ciphertexts {
            for p in [&ct.c1, &ct.c2] {
                out.push(p.x);
                out.push(p.y);
            }
        }
        out
    }

    /// Public-facing serialization, TE form, same ordering.
    pub fn serialize_te(&self) -> Vec<F> {
        let mut out = Vec::with_capacity(4 * NF);
        for ct in &self.ciphertexts {
            for p in [&ct.c1, &ct.c2] {
                let (x, y) = to_te(p);
                out.push(x);
                out.push(y);
            }
        }
        out
    }

    /// Rebuild a ballot from its RTE serialization.
    pub fn deserialize_rte(fields: &[F]) -> Result<Self, StateError> {
        assert_eq!(fields.len(), 4 * NF);
        let mut ciphertexts = [Ciphertext::neutral(); NF];
        for i in 0..NF {
            let c1 = point_from_rte(fields[4 * i], fields[4 * i + 1])?;
            let c2 = point_from_rte(fields[4 * i + 2], fields[4 * i + 3])?;
            ciphertexts[i] = Ciphertext { c1, c2 };
        }
        Ok(Self { ciphertexts })
    }

    /// Decrypt every field, recovering plaintexts by bounded discrete log.
    /// Returns `None` if any plaintext exceeds `max_value`. Intended for
    /// result extraction and tests; plaintext domains are small by
    /// construction of the ballot mode.
    pub fn decrypt(&self, sk: &EmbeddedFr, max_value: u64) -> Option<[u64; NF]> {
        let mut out = [0u64; NF];
        for (i, ct) in self.ciphertexts.iter().enumerate() {
            out[i] = discrete_log(ct.decrypt_point(sk), max_value)?;
        }
        Some(out)
    }
}

fn point_from_rte(x: F, y: F) -> Result<EmbeddedAffine, StateError> {
    let p = EmbeddedAffine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(StateError::SubgroupCheckFailed);
    }
    Ok(p)
}

/// Bounded discrete log of `target` base `G`.
fn discrete_log(target: EmbeddedAffine, max_value: u64) -> Option<u64> {
    let g = EmbeddedProjective::from(EmbeddedAffine::generator());
    let mut acc = EmbeddedProjective::zero();
    for m in 0..=max_value {
        if acc.into_affine() == target {
            return Some(m);
        }
        acc += g;
    }
    None
}
