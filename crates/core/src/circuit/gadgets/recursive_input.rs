//! Lifting application-field values into aggregator public inputs
//!
//! The aggregator proof lives on BLS12-377, whose scalar field is smaller
//! than the application field, so every value crossing the recursion
//! boundary is decomposed into bits and packed into inner-field limbs of at
//! most `MODULUS_BIT_SIZE - 1` bits. The off-circuit twin of this packing is
//! [`crate::circuit::aggregator::lift_to_inner`]; the two must agree
//! bit-for-bit or the aggregator's verifying key is useless.

use ark_crypto_primitives::snark::BooleanInputVar;
use ark_ff::PrimeField;
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::ToBitsGadget;
use ark_relations::r1cs::SynthesisError;

use crate::{InnerFr, F};

/// Bits packed per inner-field limb.
pub fn limb_capacity() -> usize {
    InnerFr::MODULUS_BIT_SIZE as usize - 1
}

/// Collects application-field elements and exposes them as the boolean
/// input assignment of the inner-curve Groth16 verifier gadget.
#[derive(Clone, Default)]
pub struct RecursiveInputVar {
    limbs: Vec<Vec<Boolean<F>>>,
}

impl RecursiveInputVar {
    pub fn new() -> Self {
        Self { limbs: Vec::new() }
    }

    /// Append one application-field element; its bit decomposition is split
    /// into inner-field limbs, low bits first.
    pub fn push(&mut self, element: &FpVar<F>) -> Result<(), SynthesisError> {
        let bits = element.to_bits_le()?;
        for chunk in bits.chunks(limb_capacity()) {
            self.limbs.push(chunk.to_vec());
        }
        Ok(())
    }

    /// Number of inner-field inputs this assignment produces.
    pub fn len(&self) -> usize {
        self.limbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limbs.is_empty()
    }
}

impl From<RecursiveInputVar> for BooleanInputVar<InnerFr, F> {
    fn from(value: RecursiveInputVar) -> Self {
        BooleanInputVar::new(value.limbs)
    }
}
