//! In-circuit KZG evaluation binding
//!
//! The blob lives over the BLS12-377 scalar field, so its polynomial
//! evaluation runs on non-native field variables, while the pairing check of
//! the opening proof is native: BLS12-377's base field is the circuit field.
//! The check enforced is `e(C - [y]g + [z]w, h) == e(w, beta_h)`, the
//! rearranged KZG verification equation with no GT inversion.

use ark_ec::AffineRepr;
use ark_ff::PrimeField;
use ark_poly_commit::kzg10::VerifierKey;
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::nonnative::NonNativeFieldVar;
use ark_r1cs_std::fields::FieldVar;
use ark_r1cs_std::groups::CurveVar;
use ark_r1cs_std::pairing::PairingVar;
use ark_r1cs_std::select::CondSelectGadget;
use ark_r1cs_std::R1CSVar;
use ark_r1cs_std::ToBitsGadget;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::circuit::{InnerG1Var, InnerG2Var, InnerPairingVar};
use crate::{InnerFr, InnerPairing, F};

/// A blob entry or evaluation value inside the circuit.
pub type InnerFrVar = NonNativeFieldVar<InnerFr, F>;

/// Allocate a non-native witness and pin its canonical bit decomposition to
/// `bits` (low bits first; missing high bits are forced to zero).
pub fn inner_witness_from_bits(
    cs: ConstraintSystemRef<F>,
    bits: &[Boolean<F>],
) -> Result<InnerFrVar, SynthesisError> {
    assert!(bits.len() <= InnerFr::MODULUS_BIT_SIZE as usize);
    let bit_values: Vec<bool> = bits.iter().map(|b| b.value().unwrap_or(false)).collect();
    let var = InnerFrVar::new_witness(cs, || {
        let mut acc = InnerFr::from(0u64);
        for bit in bit_values.iter().rev() {
            acc += acc;
            if *bit {
                acc += InnerFr::from(1u64);
            }
        }
        Ok(acc)
    })?;
    let var_bits = var.to_bits_le()?;
    for (i, var_bit) in var_bits.iter().enumerate() {
        match bits.get(i) {
            Some(bit) => var_bit.enforce_equal(bit)?,
            None => var_bit.enforce_equal(&Boolean::FALSE)?,
        }
    }
    Ok(var)
}

/// Horner evaluation of the blob polynomial at `z`.
pub fn horner_eval(entries: &[InnerFrVar], z: &InnerFrVar) -> Result<InnerFrVar, SynthesisError> {
    let mut acc = InnerFrVar::zero();
    for entry in entries.iter().rev() {
        acc = &acc * z + entry;
    }
    Ok(acc)
}

/// Rebuild the commitment point from its public-input limbs
/// `(x, y, is_infinity)`, enforcing limb well-formedness and the curve
/// equation `y² = x³ + 1` for finite points.
pub fn commitment_from_limbs(
    x: &FpVar<F>,
    y: &FpVar<F>,
    infinity: &FpVar<F>,
) -> Result<InnerG1Var, SynthesisError> {
    let one = FpVar::constant(F::from(1u64));
    (infinity * (infinity - &one)).enforce_equal(&FpVar::zero())?;
    let is_infinity = infinity.is_eq(&one)?;

    let finite = is_infinity.not();
    let x_cubed = x * x * x;
    let y_squared = y * y;
    y_squared.conditional_enforce_equal(&(x_cubed + &one), &finite)?;

    let px = FpVar::conditionally_select(&is_infinity, &FpVar::zero(), x)?;
    let py = FpVar::conditionally_select(&is_infinity, &one, y)?;
    let pz = FpVar::conditionally_select(&is_infinity, &FpVar::zero(), &one)?;
    Ok(InnerG1Var::new(px, py, pz))
}

/// Enforce the KZG opening `(z, y, w)` of `commitment` against the verifier
/// key, whose G2 elements are circuit constants.
pub fn enforce_kzg_opening(
    cs: ConstraintSystemRef<F>,
    vk: &VerifierKey<InnerPairing>,
    commitment: &InnerG1Var,
    w: &InnerG1Var,
    z: &InnerFrVar,
    y: &InnerFrVar,
) -> Result<(), SynthesisError> {
    let g = InnerG1Var::new_constant(cs.clone(), vk.g.into_group())?;
    let h = InnerG2Var::new_constant(cs.clone(), vk.h.into_group())?;
    let beta_h = InnerG2Var::new_constant(cs, vk.beta_h.into_group())?;

    let y_bits = y.to_bits_le()?;
    let z_bits = z.to_bits_le()?;
    let y_g = g.scalar_mul_le(y_bits.iter())?;
    let z_w = w.scalar_mul_le(z_bits.iter())?;
    let lhs_g1 = commitment.clone() - y_g + z_w;

    let lhs = InnerPairingVar::pairing(
        InnerPairingVar::prepare_g1(&lhs_g1)?,
        InnerPairingVar::prepare_g2(&h)?,
    )?;
    let rhs = InnerPairingVar::pairing(
        InnerPairingVar::prepare_g1(w)?,
        InnerPairingVar::prepare_g2(&beta_h)?,
    )?;
    lhs.enforce_equal(&rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::witness::{derive_eval_point, Blob, BlobKzg};
    use ark_relations::r1cs::ConstraintSystem;
    use ark_std::test_rng;

    fn small_blob() -> Blob {
        Blob {
            entries: (1u64..9).map(InnerFr::from).collect(),
        }
    }

    #[test]
    fn test_horner_matches_native() {
        let cs = ConstraintSystem::<F>::new_ref();
        let blob = small_blob();
        let z = derive_eval_point(&F::from(1u64), &F::from(2u64));

        let entries: Vec<InnerFrVar> = blob
            .entries
            .iter()
            .map(|e| InnerFrVar::new_witness(cs.clone(), || Ok(*e)).unwrap())
            .collect();
        let z_var = InnerFrVar::new_witness(cs.clone(), || Ok(z)).unwrap();
        let eval = horner_eval(&entries, &z_var).unwrap();
        assert_eq!(eval.value().unwrap(), blob.evaluate(&z));
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_kzg_opening_gadget() {
        let mut rng = test_rng();
        let blob = small_blob();
        let kzg = BlobKzg::setup(blob.entries.len(), &mut rng).unwrap();
        let commitment = kzg.commit(&blob).unwrap();
        let z = derive_eval_point(&F::from(1u64), &F::from(2u64));
        let (y, proof) = kzg.open(&blob, &z).unwrap();

        let cs = ConstraintSystem::<F>::new_ref();
        let point = commitment.0;
        let x_var = FpVar::new_witness(cs.clone(), || Ok(point.x)).unwrap();
        let y_var = FpVar::new_witness(cs.clone(), || Ok(point.y)).unwrap();
        let inf_var = FpVar::new_witness(cs.clone(), || Ok(F::from(0u64))).unwrap();
        let commitment_var = commitment_from_limbs(&x_var, &y_var, &inf_var).unwrap();

        let w_var =
            InnerG1Var::new_witness(cs.clone(), || Ok(proof.w.into_group())).unwrap();
        let z_var = InnerFrVar::new_witness(cs.clone(), || Ok(z)).unwrap();
        let eval_var = InnerFrVar::new_witness(cs.clone(), || Ok(y)).unwrap();
        enforce_kzg_opening(cs.clone(), kzg.verifier_key(), &commitment_var, &w_var, &z_var, &eval_var)
            .unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_kzg_opening_gadget_rejects_wrong_value() {
        let mut rng = test_rng();
        let blob = small_blob();
        let kzg = BlobKzg::setup(blob.entries.len(), &mut rng).unwrap();
        let commitment = kzg.commit(&blob).unwrap();
        let z = derive_eval_point(&F::from(1u64), &F::from(2u64));
        let (y, proof) = kzg.open(&blob, &z).unwrap();

        let cs = ConstraintSystem::<F>::new_ref();
        let point = commitment.0;
        let x_var = FpVar::new_witness(cs.clone(), || Ok(point.x)).unwrap();
        let y_var = FpVar::new_witness(cs.clone(), || Ok(point.y)).unwrap();
        let inf_var = FpVar::new_witness(cs.clone(), || Ok(F::from(0u64))).unwrap();
        let commitment_var = commitment_from_limbs(&x_var, &y_var, &inf_var).unwrap();

        let w_var =
            InnerG1Var::new_witness(cs.clone(), || Ok(proof.w.into_group())).unwrap();
        let z_var = InnerFrVar::new_witness(cs.clone(), || Ok(z)).unwrap();
        let eval_var =
            InnerFrVar::new_witness(cs.clone(), || Ok(y + InnerFr::from(1u64))).unwrap();
        enforce_kzg_opening(cs.clone(), kzg.verifier_key(), &commitment_var, &w_var, &z_var, &eval_var)
            .unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_inner_witness_binding() {
        let cs = ConstraintSystem::<F>::new_ref();
        let native = FpVar::new_witness(cs.clone(), || Ok(F::from(0xABCDu64))).unwrap();
        let bits = native.to_bits_le().unwrap();
        let var = inner_witness_from_bits(cs.clone(), &bits[..224]).unwrap();
        assert_eq!(var.value().unwrap(), InnerFr::from(0xABCDu64));
        assert!(cs.is_satisfied().unwrap());
    }
}
