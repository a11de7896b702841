//! Voter eligibility: the census tree and CSP credentials
//!
//! A process either commits to a Merkle census (leaf = packed address and
//! weight, indexed by address bits) or delegates eligibility to a credential
//! service provider. In CSP mode the census root commits to the provider's
//! public key, so the same public input pins both origins.

use ark_ec::AffineRepr;
use ark_ff::{Field, Zero};

use crate::constants::CENSUS_TREE_DEPTH;
use crate::crypto::hash::hash;
use crate::crypto::schnorr::CspSignature;
use crate::merkle::{key_bits_field, MerkleProof, SparseMerkleTree};
use crate::{EmbeddedAffine, F};

/// Census leaf: `address + weight · 2^160`. The address occupies the low 160
/// bits, so the packing is injective for 20-byte addresses and sane weights.
pub fn census_leaf(address: F, weight: F) -> F {
    address + weight * F::from(2u64).pow([160u64])
}

/// Census root commitment for CSP mode: `H(pk.x, pk.y)`.
pub fn csp_census_root(pk: &EmbeddedAffine) -> F {
    hash(&[pk.x, pk.y])
}

/// The authenticated set of eligible voters (Merkle origin).
pub struct CensusTree {
    tree: SparseMerkleTree,
}

impl Default for CensusTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CensusTree {
    pub fn new() -> Self {
        Self {
            tree: SparseMerkleTree::new(CENSUS_TREE_DEPTH),
        }
    }

    pub fn root(&self) -> F {
        self.tree.root()
    }

    /// Register a voter; the leaf slot is the address's bit path.
    pub fn insert(&mut self, address: F, weight: F) {
        let bits = key_bits_field(&address, CENSUS_TREE_DEPTH);
        self.tree.update(&bits, census_leaf(address, weight));
    }

    pub fn prove(&self, address: F) -> MerkleProof {
        self.tree.prove(&key_bits_field(&address, CENSUS_TREE_DEPTH))
    }
}

/// Per-slot census witness. Both variants are always present; the circuit
/// asserts only the one selected by the process's census origin and ignores
/// the other, and asserts neither for masked slots.
#[derive(Clone, Debug)]
pub struct CensusSlotProof {
    pub merkle: MerkleProof,
    pub csp_signature: CspSignature,
    pub csp_public_key: EmbeddedAffine,
}

impl CensusSlotProof {
    /// Inert filler for dummy slots and for the unused variant.
    pub fn dummy() -> Self {
        Self {
            merkle: MerkleProof {
                key_bits: vec![false; CENSUS_TREE_DEPTH],
                leaf: F::zero(),
                siblings: vec![F::zero(); CENSUS_TREE_DEPTH],
            },
            csp_signature: CspSignature {
                r: EmbeddedAffine::zero(),
                s: F::zero(),
            },
            csp_public_key: EmbeddedAffine::generator(),
        }
    }

    pub fn from_merkle(merkle: MerkleProof) -> Self {
        Self {
            merkle,
            ..Self::dummy()
        }
    }

    pub fn from_csp(signature: CspSignature, public_key: EmbeddedAffine) -> Self {
        Self {
            csp_signature: signature,
            csp_public_key: public_key,
            ..Self::dummy()
        }
    }
}
