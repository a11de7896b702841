//! In-circuit census eligibility checks
//!
//! One gadget per slot covers both census origins. The Merkle variant
//! recomputes the packed leaf and climbs to the census root; the CSP variant
//! verifies the provider's Schnorr signature and binds the provider key to
//! the census root. Only the variant selected by the process's census origin
//! is asserted, and only for unmasked slots.

use ark_ec::AffineRepr;
use ark_ff::Field;
use ark_r1cs_std::alloc::{AllocVar, AllocationMode};
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::FieldVar;
use ark_r1cs_std::groups::CurveVar;
use ark_r1cs_std::ToBitsGadget;
use ark_relations::ns;
use ark_relations::r1cs::{ConstraintSystemRef, Namespace, SynthesisError};
use ark_std::borrow::Borrow;

use crate::census::CensusSlotProof;
use crate::circuit::gadgets::merkle::MerkleProofVar;
use crate::circuit::gadgets::poseidon::hash_gadget;
use crate::circuit::EmbeddedVar;
use crate::constants::census_origin;
use crate::{EmbeddedAffine, EmbeddedProjective, F};

#[derive(Clone)]
pub struct CensusSlotProofVar {
    pub merkle: MerkleProofVar,
    pub csp_signature_r: EmbeddedVar,
    pub csp_signature_s: FpVar<F>,
    pub csp_public_key: EmbeddedVar,
}

impl AllocVar<CensusSlotProof, F> for CensusSlotProofVar {
    fn new_variable<T: Borrow<CensusSlotProof>>(
        cs: impl Into<Namespace<F>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError> {
        let ns = cs.into();
        let cs = ns.cs();
        let proof = f()?;
        let proof = proof.borrow().clone();
        let merkle = MerkleProofVar::new_variable(ns!(cs, "merkle"), || Ok(&proof.merkle), mode)?;
        let csp_signature_r = EmbeddedVar::new_variable(
            ns!(cs, "csp_r"),
            || Ok(EmbeddedProjective::from(proof.csp_signature.r)),
            mode,
        )?;
        let csp_signature_s =
            FpVar::new_variable(ns!(cs, "csp_s"), || Ok(proof.csp_signature.s), mode)?;
        let csp_public_key = EmbeddedVar::new_variable(
            ns!(cs, "csp_pk"),
            || Ok(EmbeddedProjective::from(proof.csp_public_key)),
            mode,
        )?;
        Ok(Self {
            merkle,
            csp_signature_r,
            csp_signature_s,
            csp_public_key,
        })
    }
}

impl CensusSlotProofVar {
    /// Assert eligibility of `(address, weight)` for an unmasked slot.
    #[allow(clippy::too_many_arguments)]
    pub fn enforce(
        &self,
        cs: ConstraintSystemRef<F>,
        origin: &FpVar<F>,
        census_root: &FpVar<F>,
        process_id: &FpVar<F>,
        address: &FpVar<F>,
        weight: &FpVar<F>,
        active: &Boolean<F>,
    ) -> Result<(), SynthesisError> {
        let is_merkle = origin.is_eq(&FpVar::constant(F::from(census_origin::MERKLE)))?;
        let is_csp = origin.is_eq(&FpVar::constant(F::from(census_origin::CSP)))?;

        // Merkle origin: leaf = address + weight · 2^160, path to census_root.
        let check_merkle = active.and(&is_merkle)?;
        let shift = FpVar::constant(F::from(2u64).pow([160u64]));
        let expected_leaf = address + weight * shift;
        self.merkle
            .leaf
            .conditional_enforce_equal(&expected_leaf, &check_merkle)?;
        let computed_root = self.merkle.root(cs.clone())?;
        computed_root.conditional_enforce_equal(census_root, &check_merkle)?;

        // CSP origin: census_root commits to the provider key, and
        // [s]G == R + [c]PK over the claim.
        let check_csp = active.and(&is_csp)?;
        let pk_commitment = hash_gadget(
            cs.clone(),
            &[self.csp_public_key.x.clone(), self.csp_public_key.y.clone()],
        )?;
        pk_commitment.conditional_enforce_equal(census_root, &check_csp)?;

        let challenge = hash_gadget(
            cs,
            &[
                self.csp_signature_r.x.clone(),
                self.csp_signature_r.y.clone(),
                self.csp_public_key.x.clone(),
                self.csp_public_key.y.clone(),
                census_root.clone(),
                process_id.clone(),
                address.clone(),
                weight.clone(),
            ],
        )?;
        let generator = EmbeddedVar::constant(EmbeddedAffine::generator().into());
        let s_bits = self.csp_signature_s.to_bits_le()?;
        let lhs = generator.scalar_mul_le(s_bits.iter())?;
        let c_bits = challenge.to_bits_le()?;
        let rhs = self.csp_signature_r.clone() + self.csp_public_key.scalar_mul_le(c_bits.iter())?;
        lhs.x.conditional_enforce_equal(&rhs.x, &check_csp)?;
        lhs.y.conditional_enforce_equal(&rhs.y, &check_csp)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::{csp_census_root, CensusTree};
    use crate::crypto::schnorr::CspSigningKey;
    use ark_r1cs_std::fields::FieldVar;
    use ark_relations::r1cs::ConstraintSystem;
    use ark_std::test_rng;

    fn fp(cs: &ConstraintSystemRef<F>, v: F) -> FpVar<F> {
        FpVar::new_witness(cs.clone(), || Ok(v)).unwrap()
    }

    #[test]
    fn test_merkle_census_slot() {
        let mut census = CensusTree::new();
        census.insert(F::from(0xAAu64), F::from(3u64));
        let root = census.root();
        let slot = CensusSlotProof::from_merkle(census.prove(F::from(0xAAu64)));

        let cs = ConstraintSystem::<F>::new_ref();
        let var = CensusSlotProofVar::new_witness(cs.clone(), || Ok(slot)).unwrap();
        var.enforce(
            cs.clone(),
            &FpVar::constant(F::from(census_origin::MERKLE)),
            &fp(&cs, root),
            &fp(&cs, F::from(1u64)),
            &fp(&cs, F::from(0xAAu64)),
            &fp(&cs, F::from(3u64)),
            &Boolean::TRUE,
        )
        .unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_merkle_census_wrong_weight_unsatisfied() {
        let mut census = CensusTree::new();
        census.insert(F::from(0xAAu64), F::from(3u64));
        let root = census.root();
        let slot = CensusSlotProof::from_merkle(census.prove(F::from(0xAAu64)));

        let cs = ConstraintSystem::<F>::new_ref();
        let var = CensusSlotProofVar::new_witness(cs.clone(), || Ok(slot)).unwrap();
        var.enforce(
            cs.clone(),
            &FpVar::constant(F::from(census_origin::MERKLE)),
            &fp(&cs, root),
            &fp(&cs, F::from(1u64)),
            &fp(&cs, F::from(0xAAu64)),
            &fp(&cs, F::from(4u64)),
            &Boolean::TRUE,
        )
        .unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_csp_census_slot() {
        let mut rng = test_rng();
        let key = CspSigningKey::generate(&mut rng);
        let root = csp_census_root(&key.pk);
        let (pid, addr, weight) = (F::from(7u64), F::from(0xBBu64), F::from(2u64));
        let sig = key.sign(root, pid, addr, weight, &mut rng);
        let slot = CensusSlotProof::from_csp(sig, key.pk);

        let cs = ConstraintSystem::<F>::new_ref();
        let var = CensusSlotProofVar::new_witness(cs.clone(), || Ok(slot)).unwrap();
        var.enforce(
            cs.clone(),
            &FpVar::constant(F::from(census_origin::CSP)),
            &fp(&cs, root),
            &fp(&cs, pid),
            &fp(&cs, addr),
            &fp(&cs, weight),
            &Boolean::TRUE,
        )
        .unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_masked_slot_ignores_garbage() {
        let slot = CensusSlotProof::dummy();
        let cs = ConstraintSystem::<F>::new_ref();
        let var = CensusSlotProofVar::new_witness(cs.clone(), || Ok(slot)).unwrap();
        var.enforce(
            cs.clone(),
            &FpVar::constant(F::from(census_origin::MERKLE)),
            &FpVar::zero(),
            &FpVar::zero(),
            &FpVar::zero(),
            &FpVar::zero(),
            &Boolean::FALSE,
        )
        .unwrap();
        assert!(cs.is_satisfied().unwrap());
    }
}
