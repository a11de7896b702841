//! Poseidon sparse Merkle tree with transition proofs
//!
//! Fixed-depth binary tree over the application field. Empty subtrees hash
//! to a per-level constant derived from the zero leaf, so exclusion of a key
//! is just inclusion of the zero leaf at its slot. A single-leaf update
//! leaves the sibling path untouched, which is what a [`MerkleTransition`]
//! witnesses: two inclusion proofs sharing siblings.
//!
//! Path convention: bit `l` of the key (least significant first) selects the
//! side at level `l` while climbing from the leaf, matching the in-circuit
//! verifier.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use ark_ff::{BigInteger, PrimeField, Zero};

use crate::crypto::hash::hash_pair;
use crate::F;

/// Leaf update kind carried by a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionOp {
    Noop,
    Insert,
    Update,
}

impl TransitionOp {
    pub fn as_field(&self) -> F {
        match self {
            TransitionOp::Noop => F::zero(),
            TransitionOp::Insert => F::from(1u64),
            TransitionOp::Update => F::from(2u64),
        }
    }
}

/// Inclusion (or exclusion, when `leaf` is zero) proof for one slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// Key bits, least significant first, one per level.
    pub key_bits: Vec<bool>,
    /// Leaf hash at the slot; zero for an absent key.
    pub leaf: F,
    /// Sibling hashes, leaf level first.
    pub siblings: Vec<F>,
}

impl MerkleProof {
    /// Recompute the root this proof commits to.
    pub fn root(&self) -> F {
        climb(self.leaf, &self.key_bits, &self.siblings)
    }

    pub fn verify(&self, root: F) -> bool {
        self.root() == root
    }
}

/// Record of a single leaf update: old and new inclusion proofs sharing one
/// sibling path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTransition {
    pub old_root: F,
    pub new_root: F,
    /// The state key, as a field element.
    pub key: F,
    pub key_bits: Vec<bool>,
    pub old_leaf: F,
    pub new_leaf: F,
    pub siblings: Vec<F>,
    pub op: TransitionOp,
}

impl MerkleTransition {
    /// A transition that touches nothing. Dummy batch slots carry these.
    pub fn noop(root: F, depth: usize) -> Self {
        Self {
            old_root: root,
            new_root: root,
            key: F::zero(),
            key_bits: vec![false; depth],
            old_leaf: F::zero(),
            new_leaf: F::zero(),
            siblings: vec![F::zero(); depth],
            op: TransitionOp::Noop,
        }
    }

    /// Check this transition in isolation: both leaves must climb to their
    /// roots along the shared siblings; a NOOP must change nothing.
    pub fn verify(&self) -> bool {
        match self.op {
            TransitionOp::Noop => {
                self.old_root == self.new_root && self.old_leaf == self.new_leaf
            }
            _ => {
                climb(self.old_leaf, &self.key_bits, &self.siblings) == self.old_root
                    && climb(self.new_leaf, &self.key_bits, &self.siblings) == self.new_root
            }
        }
    }
}

fn climb(leaf: F, key_bits: &[bool], siblings: &[F]) -> F {
    let mut cur = leaf;
    for (bit, sibling) in key_bits.iter().zip(siblings.iter()) {
        cur = if *bit {
            hash_pair(*sibling, cur)
        } else {
            hash_pair(cur, *sibling)
        };
    }
    cur
}

/// Key bits for a short (integer) key, least significant first.
pub fn key_bits_u64(key: u64, depth: usize) -> Vec<bool> {
    (0..depth).map(|i| (key >> i) & 1 == 1).collect()
}

/// Key bits for a wide (field) key, least significant first.
pub fn key_bits_field(key: &F, depth: usize) -> Vec<bool> {
    let bits = key.into_bigint().to_bits_le();
    (0..depth).map(|i| bits.get(i).copied().unwrap_or(false)).collect()
}

/// In-memory sparse Merkle tree with cached internal nodes. Proofs against
/// a sealed root are read-only and may be served concurrently; the node
/// cache hides behind a lock so readers share it.
#[derive(Debug)]
pub struct SparseMerkleTree {
    depth: usize,
    /// Non-empty leaves, keyed by top-down path bits.
    leaves: BTreeMap<Vec<bool>, F>,
    /// Empty-subtree hash per height; `empty[0]` is the zero leaf.
    empty: Vec<F>,
    /// Cache of internal node hashes, keyed by top-down prefix.
    cache: RwLock<HashMap<Vec<bool>, F>>,
}

impl SparseMerkleTree {
    pub fn new(depth: usize) -> Self {
        let mut empty = Vec::with_capacity(depth + 1);
        empty.push(F::zero());
        for h in 0..depth {
            let e = empty[h];
            empty.push(hash_pair(e, e));
        }
        Self {
            depth,
            leaves: BTreeMap::new(),
            empty,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> F {
        self.node(&[])
    }

    /// Current leaf hash at `key_bits` (zero when absent).
    pub fn leaf(&self, key_bits: &[bool]) -> F {
        let path = to_path(key_bits);
        self.leaves.get(&path).copied().unwrap_or_else(F::zero)
    }

    /// Set the leaf at `key_bits`, returning the previous leaf hash and the
    /// (unchanged) sibling path.
    pub fn update(&mut self, key_bits: &[bool], new_leaf: F) -> (F, Vec<F>) {
        assert_eq!(key_bits.len(), self.depth);
        let siblings = self.siblings(key_bits);
        let path = to_path(key_bits);
        let old_leaf = if new_leaf.is_zero() {
            self.leaves.remove(&path).unwrap_or_else(F::zero)
        } else {
            self.leaves.insert(path.clone(), new_leaf).unwrap_or_else(F::zero)
        };
        // Drop every cached node on the updated path.
        let mut cache = self.cache.write().expect("node cache lock");
        for l in 0..=self.depth {
            cache.remove(&path[..self.depth - l].to_vec());
        }
        (old_leaf, siblings)
    }

    /// Inclusion/exclusion proof for `key_bits` against the current root.
    pub fn prove(&self, key_bits: &[bool]) -> MerkleProof {
        assert_eq!(key_bits.len(), self.depth);
        MerkleProof {
            key_bits: key_bits.to_vec(),
            leaf: self.leaf(key_bits),
            siblings: self.siblings(key_bits),
        }
    }

    /// Apply a single-leaf update and return the full transition record.
    pub fn transition(
        &mut self,
        key: F,
        key_bits: &[bool],
        new_leaf: F,
        op: TransitionOp,
    ) -> MerkleTransition {
        let old_root = self.root();
        let (old_leaf, siblings) = self.update(key_bits, new_leaf);
        let new_root = self.root();
        MerkleTransition {
            old_root,
            new_root,
            key,
            key_bits: key_bits.to_vec(),
            old_leaf,
            new_leaf,
            siblings,
            op,
        }
    }

    /// Sibling hashes along the path, leaf level first.
    fn siblings(&self, key_bits: &[bool]) -> Vec<F> {
        let path = to_path(key_bits);
        let mut siblings = Vec::with_capacity(self.depth);
        // Level l sibling shares the prefix above it and flips bit l.
        for l in 0..self.depth {
            let mut sib = path[..self.depth - l].to_vec();
            let last = sib.len() - 1;
            sib[last] = !sib[last];
            siblings.push(self.node(&sib));
        }
        siblings
    }

    /// Hash of the subtree under a top-down prefix.
    fn node(&self, prefix: &[bool]) -> F {
        let height = self.depth - prefix.len();
        if let Some(v) = self.cache.read().expect("node cache lock").get(prefix) {
            return *v;
        }
        let range_empty = !self
            .leaves
            .range(prefix.to_vec()..)
            .next()
            .map(|(p, _)| p.starts_with(prefix))
            .unwrap_or(false);
        let value = if range_empty {
            self.empty[height]
        } else if height == 0 {
            self.leaves.get(prefix).copied().unwrap_or_else(F::zero)
        } else {
            let mut left = prefix.to_vec();
            left.push(false);
            let mut right = prefix.to_vec();
            right.push(true);
            let (l, r) = (self.node(&left), self.node(&right));
            hash_pair(l, r)
        };
        self.cache
            .write()
            .expect("node cache lock")
            .insert(prefix.to_vec(), value);
        value
    }
}

/// Key bits (lsb-first climb order) to top-down path bits.
fn to_path(key_bits: &[bool]) -> Vec<bool> {
    key_bits.iter().rev().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH: usize = 8;

    #[test]
    fn test_empty_root_deterministic() {
        let mut a = SparseMerkleTree::new(DEPTH);
        let mut b = SparseMerkleTree::new(DEPTH);
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_insert_changes_root_and_proof_verifies() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        let empty_root = tree.root();
        let bits = key_bits_u64(5, DEPTH);
        tree.update(&bits, F::from(99u64));
        let root = tree.root();
        assert_ne!(root, empty_root);

        let proof = tree.prove(&bits);
        assert_eq!(proof.leaf, F::from(99u64));
        assert!(proof.verify(root));
        assert!(!proof.verify(empty_root));
    }

    #[test]
    fn test_exclusion_proof() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        tree.update(&key_bits_u64(5, DEPTH), F::from(99u64));
        let root = tree.root();
        // Absent key: zero leaf, proof still verifies.
        let proof = tree.prove(&key_bits_u64(6, DEPTH));
        assert!(proof.leaf.is_zero());
        assert!(proof.verify(root));
    }

    #[test]
    fn test_root_independent_of_insertion_order() {
        let mut a = SparseMerkleTree::new(DEPTH);
        let mut b = SparseMerkleTree::new(DEPTH);
        for key in [3u64, 200, 77] {
            a.update(&key_bits_u64(key, DEPTH), F::from(key));
        }
        for key in [77u64, 3, 200] {
            b.update(&key_bits_u64(key, DEPTH), F::from(key));
        }
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_transition_verifies_and_chains() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        let t1 = tree.transition(
            F::from(5u64),
            &key_bits_u64(5, DEPTH),
            F::from(10u64),
            TransitionOp::Insert,
        );
        let t2 = tree.transition(
            F::from(5u64),
            &key_bits_u64(5, DEPTH),
            F::from(20u64),
            TransitionOp::Update,
        );
        assert!(t1.verify());
        assert!(t2.verify());
        assert_eq!(t1.new_root, t2.old_root);
        assert_eq!(t2.old_leaf, F::from(10u64));
        assert_eq!(t2.new_root, tree.root());
    }

    #[test]
    fn test_noop_transition() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        tree.update(&key_bits_u64(9, DEPTH), F::from(1u64));
        let root = tree.root();
        let noop = MerkleTransition::noop(root, DEPTH);
        assert!(noop.verify());
        assert_eq!(noop.old_root, noop.new_root);
    }

    #[test]
    fn test_update_keeps_siblings() {
        let mut tree = SparseMerkleTree::new(DEPTH);
        tree.update(&key_bits_u64(12, DEPTH), F::from(7u64));
        let bits = key_bits_u64(5, DEPTH);
        let (_, before) = tree.update(&bits, F::from(1u64));
        let (old, after) = tree.update(&bits, F::from(2u64));
        assert_eq!(old, F::from(1u64));
        assert_eq!(before, after);
    }
}
