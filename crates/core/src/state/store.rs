//! The persisted election state and its batch mutation sessions
//!
//! One Merkle tree authenticates every state key: the four process-metadata
//! leaves, one ballot leaf per voter, one leaf per seen vote id, and the two
//! homomorphic results accumulators. Mutation happens only inside a batch;
//! `start_batch` snapshots the pre-root, `end_batch` seals the post-root and
//! emits the ordered transition list the circuit walks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use borsh::{BorshDeserialize, BorshSerialize};
use tracing::debug;

use crate::constants::{keys, STATE_KEY_BITS, VOTES_PER_BATCH};
use crate::crypto::elgamal::Ballot;
use crate::crypto::hash::hash;
use crate::errors::StateError;
use crate::merkle::{key_bits_u64, MerkleProof, MerkleTransition, SparseMerkleTree, TransitionOp};
use crate::state::vote::{ballot_index, vote_id_index};
use crate::state::{Process, Vote};
use crate::F;

/// State-leaf hash: `H(key, H(value…), 1)`.
pub fn leaf_hash(key: u64, value: &[F]) -> F {
    hash(&[F::from(key), hash(value), F::from(1u64)])
}

/// One processed vote slot.
#[derive(Clone, Copy, Debug)]
pub struct VoteRecord<const NF: usize> {
    pub vote: Vote<NF>,
    pub op: TransitionOp,
}

/// Everything a sealed batch hands to the witness generator.
#[derive(Clone, Debug)]
pub struct BatchOutput<const NF: usize> {
    pub old_root: F,
    pub new_root: F,
    /// Real slots only; the generator pads to `B` with dummies.
    pub votes: Vec<VoteRecord<NF>>,
    /// Per slot a ballot transition then a vote-id transition (NOOP-padded),
    /// then `ResultsAdd`, then `ResultsSub`.
    pub transitions: Vec<MerkleTransition>,
    /// Process-metadata inclusion proofs captured against `old_root`.
    pub metadata_proofs: [MerkleProof; 4],
    pub old_results_add: Ballot<NF>,
    pub old_results_sub: Ballot<NF>,
    pub new_results_add: Ballot<NF>,
    pub new_results_sub: Ballot<NF>,
    pub voters_count: u64,
    pub overwritten_count: u64,
    /// Census snapshot index used for ballot-key derivation.
    pub census_index: u64,
}

struct OpenBatch<const NF: usize> {
    old_root: F,
    metadata_proofs: [MerkleProof; 4],
    votes: Vec<VoteRecord<NF>>,
    transitions: Vec<MerkleTransition>,
    old_results_add: Ballot<NF>,
    old_results_sub: Ballot<NF>,
    results_add: Ballot<NF>,
    results_sub: Ballot<NF>,
    overwritten: u64,
}

/// The persistent key-value state of one process.
pub struct State<const NF: usize> {
    tree: SparseMerkleTree,
    values: BTreeMap<u64, Vec<F>>,
    /// Address stored behind each ballot key, for collision detection.
    ballot_owners: BTreeMap<u64, F>,
    census_index: u64,
    max_votes: usize,
    initialized: bool,
    batch: Option<OpenBatch<NF>>,
    snapshot_path: Option<PathBuf>,
}

impl<const NF: usize> State<NF> {
    pub fn new(census_index: u64) -> Self {
        Self {
            tree: SparseMerkleTree::new(STATE_KEY_BITS),
            values: BTreeMap::new(),
            ballot_owners: BTreeMap::new(),
            census_index,
            max_votes: VOTES_PER_BATCH,
            initialized: false,
            batch: None,
            snapshot_path: None,
        }
    }

    /// Override the batch capacity (tests run with small circuits).
    pub fn with_max_votes(mut self, max_votes: usize) -> Self {
        self.max_votes = max_votes;
        self
    }

    pub fn census_index(&self) -> u64 {
        self.census_index
    }

    pub fn root(&self) -> F {
        self.tree.root()
    }

    /// Write the process-metadata leaves and the two results accumulators
    /// (initialized to the encrypted-zero, i.e. neutral, ballot). Calling
    /// again with identical arguments is a no-op; differing arguments fail.
    pub fn initialize(&mut self, process: &Process) -> Result<(), StateError> {
        let fields = process.serialize();
        let entries: [(u64, Vec<F>); 6] = [
            (keys::PROCESS_ID, vec![fields[0]]),
            (keys::CENSUS_ORIGIN, vec![fields[1]]),
            (keys::BALLOT_MODE, fields[2..10].to_vec()),
            (keys::ENCRYPTION_KEY, fields[10..12].to_vec()),
            (keys::RESULTS_ADD, Ballot::<NF>::new().serialize_rte()),
            (keys::RESULTS_SUB, Ballot::<NF>::new().serialize_rte()),
        ];
        if self.initialized {
            let same = entries
                .iter()
                .take(4)
                .all(|(k, v)| self.values.get(k) == Some(v));
            return if same {
                Ok(())
            } else {
                Err(StateError::StateAlreadyInitialized)
            };
        }
        for (key, value) in entries {
            self.write(key, value);
        }
        self.initialized = true;
        debug!(root = %self.tree.root(), "state initialized");
        Ok(())
    }

    /// Snapshot the pre-root and open a mutation session. On an
    /// uninitialized state the results-accumulator reads below fail with
    /// `KeyNotFound`.
    pub fn start_batch(&mut self) -> Result<(), StateError> {
        if self.batch.is_some() {
            return Err(StateError::BatchInProgress);
        }
        let old_root = self.tree.root();
        let metadata_proofs = [
            self.inclusion_proof(keys::PROCESS_ID),
            self.inclusion_proof(keys::CENSUS_ORIGIN),
            self.inclusion_proof(keys::BALLOT_MODE),
            self.inclusion_proof(keys::ENCRYPTION_KEY),
        ];
        let results_add = self.read_ballot(keys::RESULTS_ADD)?;
        let results_sub = self.read_ballot(keys::RESULTS_SUB)?;
        self.batch = Some(OpenBatch {
            old_root,
            metadata_proofs,
            votes: Vec::new(),
            transitions: Vec::new(),
            old_results_add: results_add,
            old_results_sub: results_sub,
            results_add,
            results_sub,
            overwritten: 0,
        });
        debug!(root = %old_root, "batch opened");
        Ok(())
    }

    /// Apply one vote: write its ballot leaf (capturing any overwritten
    /// ballot) and its vote-id leaf, and fold its re-encrypted ballot into
    /// the pending results accumulators.
    pub fn add_vote(&mut self, vote: &Vote<NF>) -> Result<(), StateError> {
        let max_votes = self.max_votes;
        let census_index = self.census_index;
        {
            let batch = self.batch.as_ref().ok_or(StateError::NoBatchOpen)?;
            if batch.votes.len() >= max_votes {
                return Err(StateError::BatchFull(max_votes));
            }
        }

        let ballot_key = ballot_index(&vote.address, census_index);
        if let Some(owner) = self.ballot_owners.get(&ballot_key) {
            if *owner != vote.address {
                return Err(StateError::KeyCollision(
                    field_low_u64(owner),
                    field_low_u64(&vote.address),
                    ballot_key,
                ));
            }
        }

        let (op, overwritten_ballot) = match self.values.get(&ballot_key) {
            Some(previous) => (TransitionOp::Update, Ballot::deserialize_rte(previous)?),
            None => (TransitionOp::Insert, Ballot::new()),
        };

        let mut recorded = *vote;
        recorded.overwritten_ballot = overwritten_ballot;

        let ballot_transition = self.write_with_transition(
            ballot_key,
            recorded.reencrypted_ballot.serialize_rte(),
            op,
        );
        let vote_id_key = vote_id_index(&vote.vote_id);
        let vote_id_op = if self.values.contains_key(&vote_id_key) {
            TransitionOp::Update
        } else {
            TransitionOp::Insert
        };
        let vote_id_transition =
            self.write_with_transition(vote_id_key, vec![vote.vote_id], vote_id_op);

        self.ballot_owners.insert(ballot_key, vote.address);

        let batch = self.batch.as_mut().expect("batch checked open above");
        batch.results_add = batch.results_add.add(&recorded.reencrypted_ballot);
        if op == TransitionOp::Update {
            batch.results_sub = batch.results_sub.add(&recorded.overwritten_ballot);
            batch.overwritten += 1;
        }
        batch.transitions.push(ballot_transition);
        batch.transitions.push(vote_id_transition);
        batch.votes.push(VoteRecord { vote: recorded, op });
        Ok(())
    }

    /// Seal the batch: pad the slot transitions to capacity with NOOPs,
    /// write the results accumulators, and emit the ordered output.
    pub fn end_batch(&mut self) -> Result<BatchOutput<NF>, StateError> {
        let mut batch = self.batch.take().ok_or(StateError::NoBatchOpen)?;

        let depth = self.tree.depth();
        let padding_root = self.tree.root();
        for _ in batch.votes.len()..self.max_votes {
            batch.transitions.push(MerkleTransition::noop(padding_root, depth));
            batch.transitions.push(MerkleTransition::noop(padding_root, depth));
        }

        if batch.votes.is_empty() {
            // Nothing was folded into the accumulators; the results slots
            // become NOOPs that still carry their inclusion proofs so the
            // accumulator values stay bound to the root.
            batch.transitions.push(self.noop_with_proof(keys::RESULTS_ADD));
            batch.transitions.push(self.noop_with_proof(keys::RESULTS_SUB));
        } else {
            let add_transition = self.write_with_transition(
                keys::RESULTS_ADD,
                batch.results_add.serialize_rte(),
                TransitionOp::Update,
            );
            let sub_transition = self.write_with_transition(
                keys::RESULTS_SUB,
                batch.results_sub.serialize_rte(),
                TransitionOp::Update,
            );
            batch.transitions.push(add_transition);
            batch.transitions.push(sub_transition);
        }

        let new_root = self.tree.root();
        debug!(
            old_root = %batch.old_root,
            new_root = %new_root,
            votes = batch.votes.len(),
            overwritten = batch.overwritten,
            "batch sealed"
        );
        let voters_count = batch.votes.len() as u64;
        Ok(BatchOutput {
            old_root: batch.old_root,
            new_root,
            votes: batch.votes,
            transitions: batch.transitions,
            metadata_proofs: batch.metadata_proofs,
            old_results_add: batch.old_results_add,
            old_results_sub: batch.old_results_sub,
            new_results_add: batch.results_add,
            new_results_sub: batch.results_sub,
            voters_count,
            overwritten_count: batch.overwritten,
            census_index: self.census_index,
        })
    }

    /// Read-only inclusion proof against the current root. Safe to serve
    /// concurrently with other readers between batches.
    pub fn inclusion_proof(&self, key: u64) -> MerkleProof {
        self.tree.prove(&key_bits_u64(key, STATE_KEY_BITS))
    }

    /// Stored value fields at `key`.
    pub fn value(&self, key: u64) -> Option<&Vec<F>> {
        self.values.get(&key)
    }

    pub fn read_ballot(&self, key: u64) -> Result<Ballot<NF>, StateError> {
        let fields = self.values.get(&key).ok_or(StateError::KeyNotFound(key))?;
        Ok(Ballot::deserialize_rte(fields)?)
    }

    fn write(&mut self, key: u64, value: Vec<F>) {
        let bits = key_bits_u64(key, STATE_KEY_BITS);
        let leaf = leaf_hash(key, &value);
        self.tree.update(&bits, leaf);
        self.values.insert(key, value);
    }

    /// A NOOP transition that still proves the key's current leaf.
    fn noop_with_proof(&self, key: u64) -> MerkleTransition {
        let root = self.tree.root();
        let proof = self.tree.prove(&key_bits_u64(key, STATE_KEY_BITS));
        MerkleTransition {
            old_root: root,
            new_root: root,
            key: F::from(key),
            key_bits: proof.key_bits,
            old_leaf: proof.leaf,
            new_leaf: proof.leaf,
            siblings: proof.siblings,
            op: TransitionOp::Noop,
        }
    }

    fn write_with_transition(
        &mut self,
        key: u64,
        value: Vec<F>,
        op: TransitionOp,
    ) -> MerkleTransition {
        let bits = key_bits_u64(key, STATE_KEY_BITS);
        let leaf = leaf_hash(key, &value);
        let transition = self.tree.transition(F::from(key), &bits, leaf, op);
        self.values.insert(key, value);
        transition
    }

    // ============ Persistence ============

    /// Load a state snapshot, or start empty if the file does not exist.
    /// The tree is rebuilt from the leaves, so the root is deterministic.
    pub fn open(path: &Path, census_index: u64) -> Result<Self, StateError> {
        let mut state = Self::new(census_index);
        state.snapshot_path = Some(path.to_path_buf());
        if !path.exists() {
            return Ok(state);
        }
        let bytes =
            std::fs::read(path).map_err(|e| StateError::SnapshotIo(e.to_string()))?;
        let snapshot = Snapshot::try_from_slice(&bytes)
            .map_err(|e| StateError::SnapshotMalformed(e.to_string()))?;
        state.census_index = snapshot.census_index;
        state.max_votes = snapshot.max_votes as usize;
        state.initialized = snapshot.initialized;
        for (key, value) in snapshot.values {
            let fields = value
                .iter()
                .map(|b| field_from_bytes(b))
                .collect::<Result<Vec<F>, StateError>>()?;
            state.write(key, fields);
        }
        for (key, owner) in snapshot.ballot_owners {
            state.ballot_owners.insert(key, field_from_bytes(&owner)?);
        }
        Ok(state)
    }

    /// Write the current snapshot. Fails outside of `open`-ed states or
    /// while a batch is in progress.
    pub fn persist(&mut self) -> Result<(), StateError> {
        if self.batch.is_some() {
            return Err(StateError::BatchInProgress);
        }
        let path = self
            .snapshot_path
            .clone()
            .ok_or_else(|| StateError::SnapshotIo("state has no snapshot path".into()))?;
        let snapshot = Snapshot {
            census_index: self.census_index,
            max_votes: self.max_votes as u64,
            initialized: self.initialized,
            values: self
                .values
                .iter()
                .map(|(k, v)| (*k, v.iter().map(field_to_bytes).collect()))
                .collect(),
            ballot_owners: self
                .ballot_owners
                .iter()
                .map(|(k, v)| (*k, field_to_bytes(v)))
                .collect(),
        };
        let bytes = borsh::to_vec(&snapshot)
            .map_err(|e| StateError::SnapshotIo(e.to_string()))?;
        std::fs::write(&path, bytes).map_err(|e| StateError::SnapshotIo(e.to_string()))
    }
}

#[derive(BorshSerialize, BorshDeserialize)]
struct Snapshot {
    census_index: u64,
    max_votes: u64,
    initialized: bool,
    values: Vec<(u64, Vec<Vec<u8>>)>,
    ballot_owners: Vec<(u64, Vec<u8>)>,
}

fn field_to_bytes(f: &F) -> Vec<u8> {
    let mut out = Vec::new();
    f.serialize_compressed(&mut out).expect("field serialization");
    out
}

fn field_from_bytes(bytes: &[u8]) -> Result<F, StateError> {
    F::deserialize_compressed(bytes)
        .map_err(|e| StateError::SnapshotMalformed(e.to_string()))
}

fn field_low_u64(f: &F) -> u64 {
    use ark_ff::{BigInteger, PrimeField};
    let bytes = f.into_bigint().to_bytes_le();
    u64::from_le_bytes(bytes[..8].try_into().expect("at least 8 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::census_origin;
    use crate::crypto::elgamal::EncryptionKey;
    use crate::state::BallotMode;
    use crate::EmbeddedFr;

    const NF: usize = 2;

    fn test_process() -> Process {
        Process {
            id: F::from(1u64),
            census_origin: census_origin::MERKLE,
            ballot_mode: BallotMode {
                num_fields: NF as u64,
                unique_values: 0,
                max_value: 10,
                min_value: 0,
                max_value_sum: 20,
                min_value_sum: 0,
                cost_exponent: 1,
                cost_from_weight: 0,
            },
            encryption_key: EncryptionKey::from_secret(&EmbeddedFr::from(42u64)),
        }
    }

    fn test_vote(address: u64, vote_id: u64, plaintext: u64, process: &Process) -> Vote<NF> {
        let ballot = Ballot::<NF>::encrypt(
            &process.encryption_key,
            &[F::from(plaintext), F::zero()],
            &F::from(1000 + vote_id),
        );
        let (reencrypted, _) = ballot.reencrypt(&process.encryption_key, &F::from(vote_id));
        Vote {
            address: F::from(address),
            vote_id: F::from(vote_id),
            weight: F::from(1u64),
            ballot,
            reencrypted_ballot: reencrypted,
            overwritten_ballot: Ballot::new(),
        }
    }

    fn initialized_state() -> (State<NF>, Process) {
        let mut state = State::<NF>::new(0).with_max_votes(4);
        let process = test_process();
        state.initialize(&process).unwrap();
        (state, process)
    }

    #[test]
    fn test_initialize_idempotent_same_args() {
        let (mut state, process) = initialized_state();
        let root = state.root();
        state.initialize(&process).unwrap();
        assert_eq!(state.root(), root);
    }

    #[test]
    fn test_initialize_rejects_different_args() {
        let (mut state, mut process) = initialized_state();
        process.id = F::from(2u64);
        assert_eq!(
            state.initialize(&process),
            Err(StateError::StateAlreadyInitialized)
        );
    }

    #[test]
    fn test_batch_lifecycle_errors() {
        let (mut state, process) = initialized_state();
        assert_eq!(state.end_batch().unwrap_err(), StateError::NoBatchOpen);
        state.start_batch().unwrap();
        assert_eq!(state.start_batch().unwrap_err(), StateError::BatchInProgress);
        let vote = test_vote(0xAA, 1, 3, &process);
        assert!(state.add_vote(&vote).is_ok());
    }

    #[test]
    fn test_start_batch_before_initialize_fails() {
        let mut state = State::<NF>::new(0);
        // The results accumulators do not exist yet.
        assert_eq!(
            state.start_batch().unwrap_err(),
            StateError::KeyNotFound(keys::RESULTS_ADD)
        );
        // And no batch was left open.
        assert_eq!(state.end_batch().unwrap_err(), StateError::NoBatchOpen);
    }

    #[test]
    fn test_batch_full() {
        let (mut state, process) = initialized_state();
        state.start_batch().unwrap();
        for i in 0..4u64 {
            state.add_vote(&test_vote(0x100 + i, i + 1, 1, &process)).unwrap();
        }
        let overflow = test_vote(0x200, 9, 1, &process);
        assert_eq!(state.add_vote(&overflow), Err(StateError::BatchFull(4)));
    }

    #[test]
    fn test_insert_then_update_counts_and_results() {
        let (mut state, process) = initialized_state();
        state.start_batch().unwrap();
        state.add_vote(&test_vote(0xAA, 1, 3, &process)).unwrap();
        state.add_vote(&test_vote(0xBB, 2, 4, &process)).unwrap();
        let out = state.end_batch().unwrap();
        assert_eq!(out.voters_count, 2);
        assert_eq!(out.overwritten_count, 0);
        let sk = EmbeddedFr::from(42u64);
        assert_eq!(out.new_results_add.decrypt(&sk, 20), Some([7, 0]));
        assert_eq!(out.new_results_sub.decrypt(&sk, 20), Some([0, 0]));

        // Second batch overwrites vote A.
        state.start_batch().unwrap();
        state.add_vote(&test_vote(0xAA, 3, 5, &process)).unwrap();
        let out = state.end_batch().unwrap();
        assert_eq!(out.voters_count, 1);
        assert_eq!(out.overwritten_count, 1);
        assert_eq!(out.new_results_add.decrypt(&sk, 20), Some([12, 0]));
        assert_eq!(out.new_results_sub.decrypt(&sk, 20), Some([3, 0]));
        assert_eq!(out.votes[0].op, TransitionOp::Update);
        // The overwritten ballot is A's original re-encrypted ballot.
        let sub = out.votes[0].vote.overwritten_ballot;
        assert_eq!(sub.decrypt(&sk, 20), Some([3, 0]));
    }

    #[test]
    fn test_transitions_chain_in_order() {
        let (mut state, process) = initialized_state();
        state.start_batch().unwrap();
        state.add_vote(&test_vote(0xAA, 1, 3, &process)).unwrap();
        let out = state.end_batch().unwrap();
        // 2 per slot (4 slots) + 2 results.
        assert_eq!(out.transitions.len(), 10);
        let mut root = out.old_root;
        for (i, t) in out.transitions.iter().enumerate() {
            assert!(t.verify(), "transition {i} fails in isolation");
            assert_eq!(t.old_root, root, "chain breaks at {i}");
            root = t.new_root;
        }
        assert_eq!(root, out.new_root);
        // Dummy slots are NOOPs.
        for t in &out.transitions[2..8] {
            assert_eq!(t.op, TransitionOp::Noop);
        }
    }

    #[test]
    fn test_empty_batch_keeps_root() {
        let (mut state, _) = initialized_state();
        let root = state.root();
        state.start_batch().unwrap();
        let out = state.end_batch().unwrap();
        assert_eq!(out.old_root, root);
        // Results rewrite the same values, so the root is unchanged.
        assert_eq!(out.new_root, root);
        assert_eq!(out.voters_count, 0);
    }

    #[test]
    fn test_key_collision_detected() {
        let (mut state, process) = initialized_state();
        state.start_batch().unwrap();
        state.add_vote(&test_vote(0xAA, 1, 1, &process)).unwrap();
        // Same low 20 bits, different address.
        let colliding = test_vote(0xAA + (1 << 20), 2, 1, &process);
        assert!(matches!(
            state.add_vote(&colliding),
            Err(StateError::KeyCollision(_, _, _))
        ));
    }

    #[test]
    fn test_metadata_inclusion_proofs() {
        let (mut state, _) = initialized_state();
        let root = state.root();
        for key in [
            keys::PROCESS_ID,
            keys::CENSUS_ORIGIN,
            keys::BALLOT_MODE,
            keys::ENCRYPTION_KEY,
        ] {
            let proof = state.inclusion_proof(key);
            assert!(proof.verify(root));
            let expected = leaf_hash(key, state.value(key).unwrap());
            assert_eq!(proof.leaf, expected);
        }
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = std::env::temp_dir().join("veiltally-state-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.bin");
        let _ = std::fs::remove_file(&path);

        let process = test_process();
        let mut state = State::<NF>::open(&path, 0).unwrap().with_max_votes(4);
        state.initialize(&process).unwrap();
        state.start_batch().unwrap();
        state.add_vote(&test_vote(0xAA, 1, 3, &process)).unwrap();
        state.end_batch().unwrap();
        let root = state.root();
        state.persist().unwrap();

        let mut reloaded = State::<NF>::open(&path, 0).unwrap();
        assert_eq!(reloaded.root(), root);
        let _ = std::fs::remove_file(&path);
    }
}
