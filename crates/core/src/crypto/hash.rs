//! Poseidon hashing over the application field
//!
//! Two sponge configurations are used protocol-wide: a rate-4 "wide" config
//! for state leaves, Merkle nodes, and input hashes, and a rate-2 "chain"
//! config that derives per-ciphertext re-encryption randomness from a batch
//! seed. Both are deterministic functions of the field modulus, so the
//! in-circuit sponges (built from the same configs) compute identical
//! digests.

use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig};
use ark_crypto_primitives::sponge::{CryptographicSponge, FieldBasedCryptographicSponge};
use ark_crypto_primitives::sponge::poseidon::PoseidonSponge;
use ark_ff::PrimeField;
use once_cell::sync::Lazy;

use crate::F;

/// Full rounds for the alpha = 17 parameter set.
const FULL_ROUNDS: usize = 8;
/// Partial rounds for the alpha = 17 parameter set at 128-bit security.
const PARTIAL_ROUNDS: usize = 31;
/// S-box exponent; x^17 is a permutation of the 377-bit BW6-761 scalar field.
const ALPHA: u64 = 17;

fn poseidon_config(rate: usize) -> PoseidonConfig<F> {
    let (ark, mds) = find_poseidon_ark_and_mds::<F>(
        F::MODULUS_BIT_SIZE as u64,
        rate,
        FULL_ROUNDS as u64,
        PARTIAL_ROUNDS as u64,
        0,
    );
    PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, rate, 1)
}

/// Rate-4 config: state leaves, Merkle nodes, per-vote hashes.
pub static WIDE_CONFIG: Lazy<PoseidonConfig<F>> = Lazy::new(|| poseidon_config(4));

/// Rate-2 config: the re-encryption randomness chain.
pub static CHAIN_CONFIG: Lazy<PoseidonConfig<F>> = Lazy::new(|| poseidon_config(2));

/// Multi-arity algebraic hash `H`: absorb all inputs, squeeze one element.
pub fn hash(inputs: &[F]) -> F {
    let mut sponge = PoseidonSponge::new(&WIDE_CONFIG);
    sponge.absorb(&inputs.to_vec());
    sponge.squeeze_native_field_elements(1)[0]
}

/// Hash of two Merkle children.
pub fn hash_pair(left: F, right: F) -> F {
    hash(&[left, right])
}

/// One step of the re-encryption randomness chain: `k' = H_chain(k)`.
pub fn chain_hash(k: F) -> F {
    let mut sponge = PoseidonSponge::new(&CHAIN_CONFIG);
    sponge.absorb(&vec![k]);
    sponge.squeeze_native_field_elements(1)[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{One, Zero};

    #[test]
    fn test_hash_deterministic() {
        let a = hash(&[F::from(1u64), F::from(2u64)]);
        let b = hash(&[F::from(1u64), F::from(2u64)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_arity_sensitive() {
        // Trailing zero input must change the digest.
        let a = hash(&[F::one()]);
        let b = hash(&[F::one(), F::zero()]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_chain_hash_differs_from_wide() {
        let k = F::from(42u64);
        assert_ne!(chain_hash(k), hash(&[k]));
    }

    #[test]
    fn test_chain_advances() {
        let k0 = F::from(7u64);
        let k1 = chain_hash(k0);
        let k2 = chain_hash(k1);
        assert_ne!(k0, k1);
        assert_ne!(k1, k2);
    }
}
