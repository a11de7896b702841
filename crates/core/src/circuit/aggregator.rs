//! The aggregator-proof interface
//!
//! The aggregator is an external collaborator: one Groth16 proof over
//! BLS12-377 attesting that every per-vote SNARK in the batch is valid. Its
//! single logical public input is `H(h_0, …, h_{B-1})`, the hash of the
//! per-vote input hashes; physically the verifier consumes that value and
//! `voters_count` lifted into inner-field limbs (see
//! [`crate::circuit::gadgets::recursive_input`]).
//!
//! [`AggregatorStubCircuit`] is a minimal stand-in with the same public
//! input layout, used to produce real proofs in tests and development
//! harnesses while the production aggregator artifact is fixed externally.

use ark_ff::{BigInteger, Field, PrimeField, Zero};
use ark_groth16::{Groth16, Proof, ProvingKey, VerifyingKey};
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, RngCore};

use crate::circuit::gadgets::recursive_input::limb_capacity;
use crate::{InnerFr, InnerPairing, F};

/// The two logical aggregator inputs, in lifting order.
#[derive(Clone, Copy, Debug)]
pub struct AggregatorInputs {
    pub voters_count: F,
    pub inputs_hash: F,
}

impl AggregatorInputs {
    /// The physical public-input assignment of the aggregator proof.
    pub fn to_inner(&self) -> Vec<InnerFr> {
        lift_to_inner(&[self.voters_count, self.inputs_hash])
    }
}

/// Off-circuit twin of the in-circuit lifting: decompose each value into its
/// modulus-width bit string and pack chunks of `MODULUS_BIT_SIZE - 1` bits
/// into inner-field elements, low bits first.
pub fn lift_to_inner(values: &[F]) -> Vec<InnerFr> {
    let mut out = Vec::new();
    for value in values {
        let mut bits = value.into_bigint().to_bits_le();
        bits.truncate(F::MODULUS_BIT_SIZE as usize);
        for chunk in bits.chunks(limb_capacity()) {
            let mut acc = InnerFr::zero();
            for bit in chunk.iter().rev() {
                acc.double_in_place();
                if *bit {
                    acc += InnerFr::from(1u64);
                }
            }
            out.push(acc);
        }
    }
    out
}

/// Number of physical public inputs of the aggregator proof.
pub fn aggregator_input_len() -> usize {
    let per_value = (F::MODULUS_BIT_SIZE as usize).div_ceil(limb_capacity());
    2 * per_value
}

/// Minimal inner circuit with the aggregator's public-input layout. It
/// proves nothing about votes; the production verifying key replaces the
/// stub's at deployment.
#[derive(Clone)]
pub struct AggregatorStubCircuit {
    pub inputs: Vec<InnerFr>,
}

impl AggregatorStubCircuit {
    pub fn blank() -> Self {
        Self {
            inputs: vec![InnerFr::zero(); aggregator_input_len()],
        }
    }
}

impl ConstraintSynthesizer<InnerFr> for AggregatorStubCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<InnerFr>) -> Result<(), SynthesisError> {
        let mut vars = Vec::with_capacity(self.inputs.len());
        for value in &self.inputs {
            vars.push(FpVar::new_input(cs.clone(), || Ok(*value))?);
        }
        // One honest constraint so the proving key has a nontrivial witness.
        let square = FpVar::new_witness(cs, || Ok(self.inputs[0] * self.inputs[0]))?;
        square.enforce_equal(&(&vars[0] * &vars[0]))?;
        Ok(())
    }
}

/// Deterministic-setup helper for harnesses (zk setups ship as artifacts in
/// production).
pub fn stub_setup<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<(ProvingKey<InnerPairing>, VerifyingKey<InnerPairing>), SynthesisError> {
    Groth16::<InnerPairing>::circuit_specific_setup(AggregatorStubCircuit::blank(), rng)
}

/// Prove the stub for a concrete input assignment.
pub fn stub_prove<R: RngCore + CryptoRng>(
    pk: &ProvingKey<InnerPairing>,
    inputs: &AggregatorInputs,
    rng: &mut R,
) -> Result<Proof<InnerPairing>, SynthesisError> {
    let circuit = AggregatorStubCircuit {
        inputs: inputs.to_inner(),
    };
    Groth16::<InnerPairing>::prove(pk, circuit, rng)
}
