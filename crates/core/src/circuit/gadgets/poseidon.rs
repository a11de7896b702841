//! In-circuit Poseidon, sharing the native sponge configurations

use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::crypto::hash::{CHAIN_CONFIG, WIDE_CONFIG};
use crate::F;

/// In-circuit `H`: absorb all inputs, squeeze one element.
pub fn hash_gadget(
    cs: ConstraintSystemRef<F>,
    inputs: &[FpVar<F>],
) -> Result<FpVar<F>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, &WIDE_CONFIG);
    for input in inputs {
        sponge.absorb(input)?;
    }
    Ok(sponge.squeeze_field_elements(1)?.remove(0))
}

/// In-circuit chain step `k' = H_chain(k)`.
pub fn chain_hash_gadget(
    cs: ConstraintSystemRef<F>,
    k: &FpVar<F>,
) -> Result<FpVar<F>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, &CHAIN_CONFIG);
    sponge.absorb(k)?;
    Ok(sponge.squeeze_field_elements(1)?.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::{chain_hash, hash};
    use ark_r1cs_std::alloc::AllocVar;
    use ark_r1cs_std::R1CSVar;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn test_hash_gadget_matches_native() {
        let cs = ConstraintSystem::<F>::new_ref();
        let inputs: Vec<F> = (1u64..6).map(F::from).collect();
        let vars: Vec<FpVar<F>> = inputs
            .iter()
            .map(|v| FpVar::new_witness(cs.clone(), || Ok(*v)).unwrap())
            .collect();
        let digest = hash_gadget(cs.clone(), &vars).unwrap();
        assert_eq!(digest.value().unwrap(), hash(&inputs));
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_chain_gadget_matches_native() {
        let cs = ConstraintSystem::<F>::new_ref();
        let k = F::from(7u64);
        let k_var = FpVar::new_witness(cs.clone(), || Ok(k)).unwrap();
        let next = chain_hash_gadget(cs.clone(), &k_var).unwrap();
        assert_eq!(next.value().unwrap(), chain_hash(k));
        assert!(cs.is_satisfied().unwrap());
    }
}
