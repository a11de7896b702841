//! Witness assembly for the state-transition circuit

use ark_groth16::Proof as Groth16Proof;
use ark_poly_commit::kzg10::{Commitment, Proof as KzgProof};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use tracing::{debug, instrument};

use crate::census::CensusSlotProof;
use crate::constants::DUMMY_VOTE_HASH_SENTINEL;
use crate::crypto::elgamal::{Ballot, EncryptionKey};
use crate::crypto::hash::hash;
use crate::errors::WitnessError;
use crate::merkle::{MerkleProof, MerkleTransition};
use crate::state::{BatchOutput, Process, Vote};
use crate::witness::blob::{build_blob, derive_eval_point, Blob, BlobKzg};
use crate::{InnerFr, InnerPairing, F};

/// Public inputs of the state-transition proof, in their canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PublicInputs {
    pub root_before: F,
    pub root_after: F,
    pub voters_count: F,
    pub overwritten_count: F,
    pub census_root: F,
    /// Blob commitment as `(x, y, is_infinity)` of the BLS12-377 G1 point.
    pub blob_commitment_limbs: [F; 3],
}

impl PublicInputs {
    /// The exact assignment order the verifier consumes.
    pub fn to_field_elements(&self) -> Vec<F> {
        let mut out = vec![
            self.root_before,
            self.root_after,
            self.voters_count,
            self.overwritten_count,
            self.census_root,
        ];
        out.extend_from_slice(&self.blob_commitment_limbs);
        out
    }
}

/// Commitment point to public-input limbs.
pub(crate) fn commitment_limbs(commitment: &Commitment<InnerPairing>) -> [F; 3] {
    let point = commitment.0;
    [
        point.x,
        point.y,
        if point.infinity { F::from(1u64) } else { F::from(0u64) },
    ]
}

/// The fully-populated private-input structure consumed by the circuit.
#[derive(Clone, Debug)]
pub struct StateTransitionWitness<const B: usize, const NF: usize> {
    pub root_before: F,
    pub root_after: F,
    pub voters_count: u64,
    pub overwritten_count: u64,
    pub census_root: F,
    /// Census snapshot index used for ballot-key derivation.
    pub census_index: u64,

    pub process: Process,
    pub metadata_proofs: [MerkleProof; 4],
    /// Exactly `B` slots, dummy-padded.
    pub votes: Vec<Vote<NF>>,
    /// Exactly `B` slots, dummy-padded.
    pub census_proofs: Vec<CensusSlotProof>,
    /// `2·B + 2` transitions in batch order.
    pub transitions: Vec<MerkleTransition>,

    pub old_results_add: Ballot<NF>,
    pub old_results_sub: Ballot<NF>,
    pub new_results_add: Ballot<NF>,
    pub new_results_sub: Ballot<NF>,

    pub reencryption_seed: F,
    /// Per-slot input hashes; the dummy sentinel `1` for unused slots.
    pub vote_hashes: Vec<F>,
    /// `H(vote_hashes…)`: the aggregator proof's logical public input.
    pub inputs_hash: F,
    pub aggregator_proof: Groth16Proof<InnerPairing>,

    pub blob: Blob,
    pub blob_commitment: Commitment<InnerPairing>,
    pub blob_proof: KzgProof<InnerPairing>,
    pub blob_eval_point: InnerFr,
    pub blob_eval: InnerFr,
}

impl<const B: usize, const NF: usize> StateTransitionWitness<B, NF> {
    pub fn public_inputs(&self) -> PublicInputs {
        PublicInputs {
            root_before: self.root_before,
            root_after: self.root_after,
            voters_count: F::from(self.voters_count),
            overwritten_count: F::from(self.overwritten_count),
            census_root: self.census_root,
            blob_commitment_limbs: commitment_limbs(&self.blob_commitment),
        }
    }
}

/// Draw a fresh re-encryption seed from OS entropy. The chain hash makes
/// everything after the seed deterministic, so this is the only point where
/// the generator touches a randomness source.
pub fn random_seed() -> F {
    use ark_std::UniformRand;
    F::rand(&mut rand::rngs::OsRng)
}

/// Re-randomize a slot-ordered set of votes with the chain starting at
/// `seed`, writing each `reencrypted_ballot` in place. Returns the final
/// chain value. Drivers call this before feeding votes to the state store;
/// the witness generator later re-derives the same chain from the seed.
pub fn apply_reencryption<const NF: usize>(
    votes: &mut [Vote<NF>],
    encryption_key: &EncryptionKey,
    seed: &F,
) -> F {
    let mut k = *seed;
    for vote in votes.iter_mut() {
        let (reencrypted, k_next) = vote.ballot.reencrypt(encryption_key, &k);
        vote.reencrypted_ballot = reencrypted;
        k = k_next;
    }
    k
}

/// Assemble the witness for a sealed batch.
///
/// `census_proofs` carries one entry per real vote, slot order. The
/// aggregator proof is produced by the external aggregator over the same
/// per-vote hashes; it is carried opaquely.
#[instrument(skip_all, fields(votes = batch.votes.len()))]
pub fn generate_witness<const B: usize, const NF: usize, const N_BLOB: usize>(
    process: &Process,
    batch: &BatchOutput<NF>,
    census_root: F,
    census_proofs: Vec<CensusSlotProof>,
    reencryption_seed: F,
    aggregator_proof: Groth16Proof<InnerPairing>,
    kzg: &BlobKzg,
) -> Result<StateTransitionWitness<B, NF>, WitnessError> {
    let expected = 2 * B + 2;
    if batch.transitions.len() != expected {
        return Err(WitnessError::TransitionCountMismatch {
            got: batch.transitions.len(),
            expected,
        });
    }
    if batch.votes.len() > B || census_proofs.len() != batch.votes.len() {
        return Err(WitnessError::InvalidProofShape(batch.votes.len()));
    }
    check_chain(&batch.transitions, batch.old_root, batch.new_root)?;

    // Per-slot votes: re-derive the re-encryption chain from the seed and
    // check it reproduces the sealed ballots, then pad with dummies.
    let mut votes = Vec::with_capacity(B);
    let mut k = reencryption_seed;
    for (i, record) in batch.votes.iter().enumerate() {
        let (expected_ballot, k_next) = record.vote.ballot.reencrypt(&process.encryption_key, &k);
        if expected_ballot != record.vote.reencrypted_ballot {
            return Err(WitnessError::ReencryptionMismatch(i));
        }
        k = k_next;
        votes.push(record.vote);
    }
    votes.resize(B, Vote::dummy());

    let mut census = census_proofs;
    census.resize(B, CensusSlotProof::dummy());

    // Per-vote hashes with the dummy sentinel, then the hash of hashes.
    let vote_hashes: Vec<F> = votes
        .iter()
        .enumerate()
        .map(|(i, vote)| {
            if i < batch.votes.len() {
                vote.input_hash(process)
            } else {
                F::from(DUMMY_VOTE_HASH_SENTINEL)
            }
        })
        .collect();
    let inputs_hash = hash(&vote_hashes);

    // Blob, commitment, and the evaluation binding this batch.
    let real_votes = &votes[..batch.votes.len()];
    let blob = build_blob::<NF>(
        N_BLOB,
        &batch.new_results_add,
        &batch.new_results_sub,
        real_votes,
    )?;
    let blob_commitment = kzg.commit(&blob)?;
    let blob_eval_point = derive_eval_point(&process.id, &batch.old_root);
    let (blob_eval, blob_proof) = kzg.open(&blob, &blob_eval_point)?;
    if !kzg.check(&blob_commitment, &blob_eval_point, &blob_eval, &blob_proof)? {
        return Err(WitnessError::BlobMismatch(0));
    }

    debug!(%inputs_hash, voters = batch.voters_count, "witness assembled");
    Ok(StateTransitionWitness {
        root_before: batch.old_root,
        root_after: batch.new_root,
        voters_count: batch.voters_count,
        overwritten_count: batch.overwritten_count,
        census_root,
        census_index: batch.census_index,
        process: *process,
        metadata_proofs: batch.metadata_proofs.clone(),
        votes,
        census_proofs: census,
        transitions: batch.transitions.clone(),
        old_results_add: batch.old_results_add,
        old_results_sub: batch.old_results_sub,
        new_results_add: batch.new_results_add,
        new_results_sub: batch.new_results_sub,
        reencryption_seed,
        vote_hashes,
        inputs_hash,
        aggregator_proof,
        blob,
        blob_commitment,
        blob_proof,
        blob_eval_point,
        blob_eval,
    })
}

fn check_chain(
    transitions: &[MerkleTransition],
    old_root: F,
    new_root: F,
) -> Result<(), WitnessError> {
    let mut root = old_root;
    for (i, t) in transitions.iter().enumerate() {
        if t.old_root != root || !t.verify() {
            return Err(WitnessError::InvalidProofShape(i));
        }
        root = t.new_root;
    }
    if root != new_root {
        return Err(WitnessError::InvalidProofShape(transitions.len()));
    }
    Ok(())
}
