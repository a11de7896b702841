//! The state-transition circuit
//!
//! Proves that a batch of encrypted ballots validly moves the election state
//! from `root_before` to `root_after`. The witness carries all state; the
//! circuit is a pure function of its inputs and performs, in order:
//!
//! 1. the vote-mask latch,
//! 2. recursive verification of the aggregator proof,
//! 3. process-metadata membership against `root_before`,
//! 4. the Merkle transition chain walk,
//! 5. leaf-hash consistency for every touched leaf,
//! 6. census eligibility per slot,
//! 7. the re-encryption chain,
//! 8. the homomorphic results algebra and the two counts,
//! 9. the KZG blob binding.
//!
//! Failure of any assertion makes the proof un-provable.

use ark_crypto_primitives::snark::{BooleanInputVar, SNARKGadget};
use ark_ec::AffineRepr;
use ark_groth16::constraints::{Groth16VerifierGadget, ProofVar, VerifyingKeyVar};
use ark_groth16::{Groth16, Proof, ProvingKey, VerifyingKey};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, RngCore};
use ark_poly_commit::kzg10::VerifierKey as KzgVerifierKey;
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::FieldVar;
use ark_r1cs_std::select::CondSelectGadget;
use ark_r1cs_std::ToBitsGadget;
use ark_relations::ns;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::circuit::gadgets::ballot::BallotVar;
use crate::circuit::gadgets::census::CensusSlotProofVar;
use crate::circuit::gadgets::kzg::{
    commitment_from_limbs, enforce_kzg_opening, horner_eval, inner_witness_from_bits, InnerFrVar,
};
use crate::circuit::gadgets::merkle::{MerkleProofVar, MerkleTransitionVar};
use crate::circuit::gadgets::poseidon::{chain_hash_gadget, hash_gadget};
use crate::circuit::gadgets::recursive_input::RecursiveInputVar;
use crate::circuit::{EmbeddedVar, InnerG1Var, InnerPairingVar};
use crate::constants::{keys, BLOB_SLOT_BITS, CENSUS_ADDRESS_BIT_LEN, DUMMY_VOTE_HASH_SENTINEL};
use crate::witness::{PublicInputs, StateTransitionWitness};
use crate::{EmbeddedProjective, InnerPairing, OuterPairing, F};

/// State-leaf hash in-circuit: `H(key, H(value…), 1)`.
fn leaf_hash_gadget(
    cs: ConstraintSystemRef<F>,
    key: &FpVar<F>,
    value: &[FpVar<F>],
) -> Result<FpVar<F>, SynthesisError> {
    let value_hash = hash_gadget(cs.clone(), value)?;
    hash_gadget(cs, &[key.clone(), value_hash, FpVar::constant(F::from(1u64))])
}

/// The full circuit: witness plus the two verifying keys fixed at circuit
/// compile time.
#[derive(Clone)]
pub struct StateTransitionCircuit<const B: usize, const NF: usize, const N_BLOB: usize> {
    pub witness: StateTransitionWitness<B, NF>,
    pub aggregator_vk: VerifyingKey<InnerPairing>,
    pub kzg_vk: KzgVerifierKey<InnerPairing>,
}

impl<const B: usize, const NF: usize, const N_BLOB: usize> ConstraintSynthesizer<F>
    for StateTransitionCircuit<B, NF, N_BLOB>
{
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let w = &self.witness;
        assert_eq!(w.votes.len(), B);
        assert_eq!(w.census_proofs.len(), B);
        assert_eq!(w.transitions.len(), 2 * B + 2);

        // ============ Public inputs ============
        let public = w.public_inputs();
        let root_before = FpVar::new_input(ns!(cs, "root_before"), || Ok(public.root_before))?;
        let root_after = FpVar::new_input(ns!(cs, "root_after"), || Ok(public.root_after))?;
        let voters_count = FpVar::new_input(ns!(cs, "voters_count"), || Ok(public.voters_count))?;
        let overwritten_count =
            FpVar::new_input(ns!(cs, "overwritten_count"), || Ok(public.overwritten_count))?;
        let census_root = FpVar::new_input(ns!(cs, "census_root"), || Ok(public.census_root))?;
        let commitment_x = FpVar::new_input(ns!(cs, "blob_commitment_x"), || {
            Ok(public.blob_commitment_limbs[0])
        })?;
        let commitment_y = FpVar::new_input(ns!(cs, "blob_commitment_y"), || {
            Ok(public.blob_commitment_limbs[1])
        })?;
        let commitment_inf = FpVar::new_input(ns!(cs, "blob_commitment_inf"), || {
            Ok(public.blob_commitment_limbs[2])
        })?;

        // ============ Witness allocation ============
        let process_id = FpVar::new_witness(ns!(cs, "process_id"), || Ok(w.process.id))?;
        let census_origin = FpVar::new_witness(ns!(cs, "census_origin"), || {
            Ok(F::from(w.process.census_origin))
        })?;
        let ballot_mode: Vec<FpVar<F>> = w
            .process
            .ballot_mode
            .serialize()
            .iter()
            .map(|v| FpVar::new_witness(ns!(cs, "ballot_mode"), || Ok(*v)))
            .collect::<Result<_, _>>()?;
        let encryption_key = EmbeddedVar::new_witness(ns!(cs, "encryption_key"), || {
            Ok(EmbeddedProjective::from(w.process.encryption_key.0))
        })?;
        let census_index =
            FpVar::new_witness(ns!(cs, "census_index"), || Ok(F::from(w.census_index)))?;

        let mut addresses = Vec::with_capacity(B);
        let mut vote_ids = Vec::with_capacity(B);
        let mut weights = Vec::with_capacity(B);
        let mut ballots = Vec::with_capacity(B);
        let mut reencrypted = Vec::with_capacity(B);
        let mut overwritten = Vec::with_capacity(B);
        for vote in &w.votes {
            addresses.push(FpVar::new_witness(ns!(cs, "address"), || Ok(vote.address))?);
            vote_ids.push(FpVar::new_witness(ns!(cs, "vote_id"), || Ok(vote.vote_id))?);
            weights.push(FpVar::new_witness(ns!(cs, "weight"), || Ok(vote.weight))?);
            ballots.push(BallotVar::<NF>::new_witness(ns!(cs, "ballot"), || {
                Ok(vote.ballot)
            })?);
            reencrypted.push(BallotVar::<NF>::new_witness(ns!(cs, "reencrypted"), || {
                Ok(vote.reencrypted_ballot)
            })?);
            overwritten.push(BallotVar::<NF>::new_witness(ns!(cs, "overwritten"), || {
                Ok(vote.overwritten_ballot)
            })?);
        }

        let transitions: Vec<MerkleTransitionVar> = w
            .transitions
            .iter()
            .map(|t| MerkleTransitionVar::new_witness(ns!(cs, "transition"), || Ok(t.clone())))
            .collect::<Result<_, _>>()?;
        let metadata_proofs: Vec<MerkleProofVar> = w
            .metadata_proofs
            .iter()
            .map(|p| MerkleProofVar::new_witness(ns!(cs, "metadata"), || Ok(p.clone())))
            .collect::<Result<_, _>>()?;
        let census_proofs: Vec<CensusSlotProofVar> = w
            .census_proofs
            .iter()
            .map(|p| CensusSlotProofVar::new_witness(ns!(cs, "census"), || Ok(p.clone())))
            .collect::<Result<_, _>>()?;

        let old_results_add =
            BallotVar::<NF>::new_witness(ns!(cs, "old_results_add"), || Ok(w.old_results_add))?;
        let old_results_sub =
            BallotVar::<NF>::new_witness(ns!(cs, "old_results_sub"), || Ok(w.old_results_sub))?;
        let new_results_add =
            BallotVar::<NF>::new_witness(ns!(cs, "new_results_add"), || Ok(w.new_results_add))?;
        let new_results_sub =
            BallotVar::<NF>::new_witness(ns!(cs, "new_results_sub"), || Ok(w.new_results_sub))?;

        let reencryption_seed =
            FpVar::new_witness(ns!(cs, "reencryption_seed"), || Ok(w.reencryption_seed))?;

        // ============ 1. Vote mask ============
        // m[i] = 1 iff i < voters_count, via latch + sum; no comparisons.
        let mut mask = Vec::with_capacity(B);
        for i in 0..B {
            mask.push(Boolean::new_witness(ns!(cs, "mask"), || {
                Ok((i as u64) < w.voters_count)
            })?);
        }
        for i in 1..B {
            // Once the mask drops it stays down.
            mask[i]
                .and(&mask[i - 1].not())?
                .enforce_equal(&Boolean::FALSE)?;
        }
        let mut mask_sum = FpVar::zero();
        for m in &mask {
            mask_sum += FpVar::from(m.clone());
        }
        mask_sum.enforce_equal(&voters_count)?;

        // ============ 2. Recursive aggregator check ============
        let encryption_key_te = [encryption_key.x.negate()?, encryption_key.y.clone()];
        let mut vote_hashes = Vec::with_capacity(B);
        for i in 0..B {
            let mut preimage = Vec::with_capacity(13 + 4 * NF);
            preimage.push(process_id.clone());
            preimage.extend_from_slice(&ballot_mode);
            preimage.extend_from_slice(&encryption_key_te);
            preimage.push(addresses[i].clone());
            preimage.push(vote_ids[i].clone());
            preimage.extend(ballots[i].serialize_te()?);
            preimage.push(weights[i].clone());
            let real_hash = hash_gadget(cs.clone(), &preimage)?;
            let sentinel = FpVar::constant(F::from(DUMMY_VOTE_HASH_SENTINEL));
            vote_hashes.push(FpVar::conditionally_select(&mask[i], &real_hash, &sentinel)?);
        }
        let inputs_hash = hash_gadget(cs.clone(), &vote_hashes)?;

        let aggregator_vk_var = VerifyingKeyVar::<InnerPairing, InnerPairingVar>::new_constant(
            ns!(cs, "aggregator_vk"),
            &self.aggregator_vk,
        )?;
        let aggregator_proof_var = ProofVar::<InnerPairing, InnerPairingVar>::new_witness(
            ns!(cs, "aggregator_proof"),
            || Ok(w.aggregator_proof.clone()),
        )?;
        let mut recursive_inputs = RecursiveInputVar::new();
        recursive_inputs.push(&voters_count)?;
        recursive_inputs.push(&inputs_hash)?;
        let recursive_inputs: BooleanInputVar<_, _> = recursive_inputs.into();
        Groth16VerifierGadget::<InnerPairing, InnerPairingVar>::verify(
            &aggregator_vk_var,
            &recursive_inputs,
            &aggregator_proof_var,
        )?
        .enforce_equal(&Boolean::TRUE)?;

        // ============ 3. Process-metadata membership ============
        let metadata_values: [(u64, Vec<FpVar<F>>); 4] = [
            (keys::PROCESS_ID, vec![process_id.clone()]),
            (keys::CENSUS_ORIGIN, vec![census_origin.clone()]),
            (keys::BALLOT_MODE, ballot_mode.clone()),
            (
                keys::ENCRYPTION_KEY,
                vec![encryption_key.x.clone(), encryption_key.y.clone()],
            ),
        ];
        for (proof, (key, value)) in metadata_proofs.iter().zip(metadata_values.iter()) {
            let key_var = FpVar::constant(F::from(*key));
            let expected_leaf = leaf_hash_gadget(cs.clone(), &key_var, value)?;
            proof.leaf.enforce_equal(&expected_leaf)?;
            proof.enforce_key(&key_var)?;
            proof.root(cs.clone())?.enforce_equal(&root_before)?;
        }

        // ============ 4. Merkle transition chain ============
        let mut chained_root = root_before.clone();
        for (i, t) in transitions.iter().enumerate() {
            t.enforce(cs.clone())?;
            t.old_root.enforce_equal(&chained_root)?;
            chained_root = t.new_root.clone();
            // Dummy slots must not touch the tree.
            if i < 2 * B {
                let slot = i / 2;
                mask[slot].or(&t.is_noop()?)?.enforce_equal(&Boolean::TRUE)?;
            }
        }
        chained_root.enforce_equal(&root_after)?;

        // ============ 5. Leaf-hash consistency ============
        let shift = FpVar::constant(F::from(1u64 << CENSUS_ADDRESS_BIT_LEN));
        for i in 0..B {
            let ballot_transition = &transitions[2 * i];
            let vote_id_transition = &transitions[2 * i + 1];
            let active = &mask[i];

            // Ballot key: BALLOT_KEY_MIN + census_index·2^20 + addr mod 2^20.
            let address_bits = addresses[i].to_bits_le()?;
            let address_low = Boolean::le_bits_to_fp_var(&address_bits[..CENSUS_ADDRESS_BIT_LEN])?;
            let ballot_key = FpVar::constant(F::from(keys::BALLOT_KEY_MIN))
                + &census_index * &shift
                + address_low;
            ballot_transition
                .key
                .conditional_enforce_equal(&ballot_key, active)?;

            let new_ballot_leaf =
                leaf_hash_gadget(cs.clone(), &ballot_key, &reencrypted[i].serialize_rte())?;
            ballot_transition
                .new_leaf
                .conditional_enforce_equal(&new_ballot_leaf, active)?;

            // Inserts start from an empty slot; updates from the previous
            // (overwritten) ballot.
            let is_insert = ballot_transition.is_insert()?;
            let insert_active = is_insert.and(active)?;
            ballot_transition
                .old_leaf
                .conditional_enforce_equal(&FpVar::zero(), &insert_active)?;
            let is_update = ballot_transition.is_update()?;
            let update_active = is_update.and(active)?;
            let old_ballot_leaf =
                leaf_hash_gadget(cs.clone(), &ballot_key, &overwritten[i].serialize_rte())?;
            ballot_transition
                .old_leaf
                .conditional_enforce_equal(&old_ballot_leaf, &update_active)?;

            // Vote-id key and leaf.
            let vote_id_bits = vote_ids[i].to_bits_le()?;
            let vote_id_low = Boolean::le_bits_to_fp_var(&vote_id_bits[..30])?;
            let vote_id_key = FpVar::constant(F::from(keys::VOTE_ID_KEY_MIN)) + vote_id_low;
            vote_id_transition
                .key
                .conditional_enforce_equal(&vote_id_key, active)?;
            let vote_id_leaf =
                leaf_hash_gadget(cs.clone(), &vote_id_key, &[vote_ids[i].clone()])?;
            vote_id_transition
                .new_leaf
                .conditional_enforce_equal(&vote_id_leaf, active)?;
        }

        // Results accumulators: keys and both leaf values.
        let results_add_transition = &transitions[2 * B];
        let results_sub_transition = &transitions[2 * B + 1];
        let results_add_key = FpVar::constant(F::from(keys::RESULTS_ADD));
        let results_sub_key = FpVar::constant(F::from(keys::RESULTS_SUB));
        results_add_transition.key.enforce_equal(&results_add_key)?;
        results_sub_transition.key.enforce_equal(&results_sub_key)?;
        results_add_transition.old_leaf.enforce_equal(&leaf_hash_gadget(
            cs.clone(),
            &results_add_key,
            &old_results_add.serialize_rte(),
        )?)?;
        results_add_transition.new_leaf.enforce_equal(&leaf_hash_gadget(
            cs.clone(),
            &results_add_key,
            &new_results_add.serialize_rte(),
        )?)?;
        results_sub_transition.old_leaf.enforce_equal(&leaf_hash_gadget(
            cs.clone(),
            &results_sub_key,
            &old_results_sub.serialize_rte(),
        )?)?;
        results_sub_transition.new_leaf.enforce_equal(&leaf_hash_gadget(
            cs.clone(),
            &results_sub_key,
            &new_results_sub.serialize_rte(),
        )?)?;

        // ============ 6. Census inclusion ============
        for i in 0..B {
            census_proofs[i].enforce(
                cs.clone(),
                &census_origin,
                &census_root,
                &process_id,
                &addresses[i],
                &weights[i],
                &mask[i],
            )?;
        }

        // ============ 7. Re-encryption chain ============
        let mut k = reencryption_seed;
        for i in 0..B {
            k = chain_hash_gadget(cs.clone(), &k)?;
            let encrypted_zero = BallotVar::<NF>::encrypted_zero(cs.clone(), &encryption_key, &k)?;
            let rerandomized = ballots[i].add(&encrypted_zero)?;
            rerandomized
                .is_eq(&reencrypted[i])?
                .conditional_enforce_equal(&Boolean::TRUE, &mask[i])?;
        }

        // ============ 8. Ballot algebra & counts ============
        let neutral = BallotVar::<NF>::neutral(cs.clone())?;
        let mut sum_add = neutral.clone();
        let mut sum_sub = neutral.clone();
        let mut insert_or_update_count = FpVar::zero();
        let mut update_count = FpVar::zero();
        for i in 0..B {
            let ballot_transition = &transitions[2 * i];
            let contribution = BallotVar::select(&mask[i], &reencrypted[i], &neutral)?;
            sum_add = sum_add.add(&contribution)?;
            let is_update = ballot_transition.is_update()?;
            let sub_contribution = BallotVar::select(&is_update, &overwritten[i], &neutral)?;
            sum_sub = sum_sub.add(&sub_contribution)?;
            let touched = ballot_transition.is_insert()?.or(&is_update)?;
            insert_or_update_count += FpVar::from(touched);
            update_count += FpVar::from(is_update);
        }
        new_results_add.enforce_equal(&old_results_add.add(&sum_add)?)?;
        new_results_sub.enforce_equal(&old_results_sub.add(&sum_sub)?)?;
        insert_or_update_count.enforce_equal(&voters_count)?;
        update_count.enforce_equal(&overwritten_count)?;

        // ============ 9. Blob binding ============
        let mut blob_entries: Vec<InnerFrVar> = Vec::with_capacity(N_BLOB);
        for ballot in [&new_results_add, &new_results_sub] {
            for coord in ballot.serialize_rte() {
                let bits = coord.to_bits_le()?;
                blob_entries.push(inner_witness_from_bits(cs.clone(), &bits[..BLOB_SLOT_BITS])?);
                blob_entries.push(inner_witness_from_bits(cs.clone(), &bits[BLOB_SLOT_BITS..])?);
            }
        }
        for i in 0..B {
            let masked_short = |value: &FpVar<F>| -> Result<Vec<Boolean<F>>, SynthesisError> {
                let bits = value.to_bits_le()?;
                // Short values must fit one slot.
                for high_bit in &bits[BLOB_SLOT_BITS..] {
                    high_bit.conditional_enforce_equal(&Boolean::FALSE, &mask[i])?;
                }
                bits[..BLOB_SLOT_BITS]
                    .iter()
                    .map(|b| b.and(&mask[i]))
                    .collect()
            };
            blob_entries.push(inner_witness_from_bits(
                cs.clone(),
                &masked_short(&vote_ids[i])?,
            )?);
            blob_entries.push(inner_witness_from_bits(
                cs.clone(),
                &masked_short(&addresses[i])?,
            )?);
            for coord in reencrypted[i].serialize_rte() {
                let bits = coord.to_bits_le()?;
                let low: Vec<Boolean<F>> = bits[..BLOB_SLOT_BITS]
                    .iter()
                    .map(|b| b.and(&mask[i]))
                    .collect::<Result<_, _>>()?;
                let high: Vec<Boolean<F>> = bits[BLOB_SLOT_BITS..]
                    .iter()
                    .map(|b| b.and(&mask[i]))
                    .collect::<Result<_, _>>()?;
                blob_entries.push(inner_witness_from_bits(cs.clone(), &low)?);
                blob_entries.push(inner_witness_from_bits(cs.clone(), &high)?);
            }
        }
        assert!(blob_entries.len() <= N_BLOB, "blob layout exceeds N_BLOB");
        blob_entries.resize(N_BLOB, InnerFrVar::zero());

        let digest = hash_gadget(cs.clone(), &[process_id, root_before])?;
        let digest_bits = digest.to_bits_le()?;
        let z = inner_witness_from_bits(cs.clone(), &digest_bits[..crate::witness::EVAL_POINT_BITS])?;
        let y = horner_eval(&blob_entries, &z)?;

        let commitment = commitment_from_limbs(&commitment_x, &commitment_y, &commitment_inf)?;
        let opening_w = InnerG1Var::new_witness(ns!(cs, "kzg_w"), || {
            Ok(w.blob_proof.w.into_group())
        })?;
        enforce_kzg_opening(cs, &self.kzg_vk, &commitment, &opening_w, &z, &y)?;

        Ok(())
    }
}

/// Circuit-specific Groth16 setup over the outer curve. The witness values
/// are irrelevant; only the circuit shape matters.
pub fn setup<const B: usize, const NF: usize, const N_BLOB: usize, R: RngCore + CryptoRng>(
    circuit: StateTransitionCircuit<B, NF, N_BLOB>,
    rng: &mut R,
) -> Result<(ProvingKey<OuterPairing>, VerifyingKey<OuterPairing>), SynthesisError> {
    Groth16::<OuterPairing>::circuit_specific_setup(circuit, rng)
}

/// Produce the outer-curve state-transition proof.
pub fn prove<const B: usize, const NF: usize, const N_BLOB: usize, R: RngCore + CryptoRng>(
    pk: &ProvingKey<OuterPairing>,
    circuit: StateTransitionCircuit<B, NF, N_BLOB>,
    rng: &mut R,
) -> Result<Proof<OuterPairing>, SynthesisError> {
    Groth16::<OuterPairing>::prove(pk, circuit, rng)
}

/// Verify a state-transition proof against its public inputs.
pub fn verify(
    vk: &VerifyingKey<OuterPairing>,
    public: &PublicInputs,
    proof: &Proof<OuterPairing>,
) -> Result<bool, SynthesisError> {
    Groth16::<OuterPairing>::verify(vk, &public.to_field_elements(), proof)
        .map_err(SynthesisError::from)
}
