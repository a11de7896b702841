//! In-circuit Merkle proofs and leaf-update transitions

use ark_r1cs_std::alloc::{AllocVar, AllocationMode};
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::FieldVar;
use ark_r1cs_std::select::CondSelectGadget;
use ark_relations::ns;
use ark_relations::r1cs::{ConstraintSystemRef, Namespace, SynthesisError};
use ark_std::borrow::Borrow;

use crate::circuit::gadgets::poseidon::hash_gadget;
use crate::merkle::{MerkleProof, MerkleTransition, TransitionOp};
use crate::F;

/// Climb from a leaf to the root along `key_bits` (lsb first).
pub fn climb_gadget(
    cs: ConstraintSystemRef<F>,
    leaf: &FpVar<F>,
    key_bits: &[Boolean<F>],
    siblings: &[FpVar<F>],
) -> Result<FpVar<F>, SynthesisError> {
    let mut cur = leaf.clone();
    for (bit, sibling) in key_bits.iter().zip(siblings.iter()) {
        let left = FpVar::conditionally_select(bit, sibling, &cur)?;
        let right = FpVar::conditionally_select(bit, &cur, sibling)?;
        cur = hash_gadget(cs.clone(), &[left, right])?;
    }
    Ok(cur)
}

/// Inclusion (or exclusion) proof in-circuit.
#[derive(Clone)]
pub struct MerkleProofVar {
    pub key_bits: Vec<Boolean<F>>,
    pub leaf: FpVar<F>,
    pub siblings: Vec<FpVar<F>>,
}

impl AllocVar<MerkleProof, F> for MerkleProofVar {
    fn new_variable<T: Borrow<MerkleProof>>(
        cs: impl Into<Namespace<F>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError> {
        let ns = cs.into();
        let cs = ns.cs();
        let proof = f()?;
        let proof = proof.borrow().clone();
        let key_bits = proof
            .key_bits
            .iter()
            .map(|b| Boolean::new_variable(ns!(cs, "key_bit"), || Ok(*b), mode))
            .collect::<Result<Vec<_>, _>>()?;
        let leaf = FpVar::new_variable(ns!(cs, "leaf"), || Ok(proof.leaf), mode)?;
        let siblings = proof
            .siblings
            .iter()
            .map(|s| FpVar::new_variable(ns!(cs, "sibling"), || Ok(*s), mode))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            key_bits,
            leaf,
            siblings,
        })
    }
}

impl MerkleProofVar {
    pub fn root(&self, cs: ConstraintSystemRef<F>) -> Result<FpVar<F>, SynthesisError> {
        climb_gadget(cs, &self.leaf, &self.key_bits, &self.siblings)
    }

    /// Bind the path bits to a short key value.
    pub fn enforce_key(&self, key: &FpVar<F>) -> Result<(), SynthesisError> {
        Boolean::le_bits_to_fp_var(&self.key_bits)?.enforce_equal(key)
    }
}

/// A single leaf update in-circuit.
#[derive(Clone)]
pub struct MerkleTransitionVar {
    pub old_root: FpVar<F>,
    pub new_root: FpVar<F>,
    pub key: FpVar<F>,
    pub key_bits: Vec<Boolean<F>>,
    pub old_leaf: FpVar<F>,
    pub new_leaf: FpVar<F>,
    pub siblings: Vec<FpVar<F>>,
    pub op: FpVar<F>,
}

impl AllocVar<MerkleTransition, F> for MerkleTransitionVar {
    fn new_variable<T: Borrow<MerkleTransition>>(
        cs: impl Into<Namespace<F>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError> {
        let ns = cs.into();
        let cs = ns.cs();
        let t = f()?;
        let t = t.borrow().clone();
        let old_root = FpVar::new_variable(ns!(cs, "old_root"), || Ok(t.old_root), mode)?;
        let new_root = FpVar::new_variable(ns!(cs, "new_root"), || Ok(t.new_root), mode)?;
        let key = FpVar::new_variable(ns!(cs, "key"), || Ok(t.key), mode)?;
        let key_bits = t
            .key_bits
            .iter()
            .map(|b| Boolean::new_variable(ns!(cs, "key_bit"), || Ok(*b), mode))
            .collect::<Result<Vec<_>, _>>()?;
        let old_leaf = FpVar::new_variable(ns!(cs, "old_leaf"), || Ok(t.old_leaf), mode)?;
        let new_leaf = FpVar::new_variable(ns!(cs, "new_leaf"), || Ok(t.new_leaf), mode)?;
        let siblings = t
            .siblings
            .iter()
            .map(|s| FpVar::new_variable(ns!(cs, "sibling"), || Ok(*s), mode))
            .collect::<Result<Vec<_>, _>>()?;
        let op = FpVar::new_variable(ns!(cs, "op"), || Ok(t.op.as_field()), mode)?;
        Ok(Self {
            old_root,
            new_root,
            key,
            key_bits,
            old_leaf,
            new_leaf,
            siblings,
            op,
        })
    }
}

impl MerkleTransitionVar {
    pub fn is_noop(&self) -> Result<Boolean<F>, SynthesisError> {
        self.op.is_eq(&FpVar::constant(TransitionOp::Noop.as_field()))
    }

    pub fn is_insert(&self) -> Result<Boolean<F>, SynthesisError> {
        self.op.is_eq(&FpVar::constant(TransitionOp::Insert.as_field()))
    }

    pub fn is_update(&self) -> Result<Boolean<F>, SynthesisError> {
        self.op.is_eq(&FpVar::constant(TransitionOp::Update.as_field()))
    }

    /// Core transition constraints: the op tag is well-formed, both leaves
    /// climb to their roots along the shared siblings (skipped for NOOPs),
    /// a NOOP changes nothing, and the path bits match the key.
    pub fn enforce(&self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        // op ∈ {0, 1, 2}
        let one = FpVar::constant(F::from(1u64));
        let two = FpVar::constant(F::from(2u64));
        let tag_poly = &self.op * (&self.op - &one) * (&self.op - &two);
        tag_poly.enforce_equal(&FpVar::zero())?;

        let noop = self.is_noop()?;
        let active = noop.not();

        let computed_old = climb_gadget(cs.clone(), &self.old_leaf, &self.key_bits, &self.siblings)?;
        let computed_new = climb_gadget(cs, &self.new_leaf, &self.key_bits, &self.siblings)?;
        computed_old.conditional_enforce_equal(&self.old_root, &active)?;
        computed_new.conditional_enforce_equal(&self.new_root, &active)?;
        Boolean::le_bits_to_fp_var(&self.key_bits)?
            .conditional_enforce_equal(&self.key, &active)?;

        self.old_root.conditional_enforce_equal(&self.new_root, &noop)?;
        self.old_leaf.conditional_enforce_equal(&self.new_leaf, &noop)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::{key_bits_u64, SparseMerkleTree};
    use ark_r1cs_std::R1CSVar;
    use ark_relations::r1cs::ConstraintSystem;

    const DEPTH: usize = 8;

    #[test]
    fn test_proof_gadget_matches_native_root() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        tree.update(&key_bits_u64(5, DEPTH), F::from(10u64));
        tree.update(&key_bits_u64(9, DEPTH), F::from(20u64));
        let root = tree.root();
        let proof = tree.prove(&key_bits_u64(5, DEPTH));

        let cs = ConstraintSystem::<F>::new_ref();
        let var = MerkleProofVar::new_witness(cs.clone(), || Ok(proof)).unwrap();
        let computed = var.root(cs.clone()).unwrap();
        assert_eq!(computed.value().unwrap(), root);
        var.enforce_key(&FpVar::constant(F::from(5u64))).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_transition_gadget_accepts_valid_update() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        let t = tree.transition(
            F::from(5u64),
            &key_bits_u64(5, DEPTH),
            F::from(10u64),
            TransitionOp::Insert,
        );

        let cs = ConstraintSystem::<F>::new_ref();
        let var = MerkleTransitionVar::new_witness(cs.clone(), || Ok(t)).unwrap();
        var.enforce(cs.clone()).unwrap();
        assert!(var.is_insert().unwrap().value().unwrap());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_transition_gadget_rejects_wrong_new_root() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        let mut t = tree.transition(
            F::from(5u64),
            &key_bits_u64(5, DEPTH),
            F::from(10u64),
            TransitionOp::Insert,
        );
        t.new_root = F::from(999u64);

        let cs = ConstraintSystem::<F>::new_ref();
        let var = MerkleTransitionVar::new_witness(cs.clone(), || Ok(t)).unwrap();
        var.enforce(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_transition_gadget_rejects_mutating_noop() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        let mut t = tree.transition(
            F::from(5u64),
            &key_bits_u64(5, DEPTH),
            F::from(10u64),
            TransitionOp::Insert,
        );
        t.op = TransitionOp::Noop;

        let cs = ConstraintSystem::<F>::new_ref();
        let var = MerkleTransitionVar::new_witness(cs.clone(), || Ok(t)).unwrap();
        var.enforce(cs.clone()).unwrap();
        // old_root != new_root, so the NOOP invariant fails.
        assert!(!cs.is_satisfied().unwrap());
    }
}
