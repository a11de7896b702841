//! VeilTally - State Transition Core
//!
//! The cryptographic core of a privacy-preserving voting protocol: a single
//! recursive Groth16 proof attests that a batch of encrypted ballots validly
//! transitions a Merkle-authenticated election state from one root to the
//! next. The proof binds the old and new state roots, the voter counts, the
//! census root, and a KZG commitment to a data blob mirroring the batch.
//!
//! Layering, leaves first:
//! - [`crypto`]: Poseidon hashing and the homomorphic ElGamal ballot algebra
//!   over the Edwards curve embedded in the BW6-761 scalar field
//! - [`merkle`]: the Poseidon sparse Merkle tree and its transition proofs
//! - [`state`]: the persisted election state and its batch mutation sessions
//! - [`census`]: voter eligibility (Merkle census or CSP credential)
//! - [`witness`]: the off-circuit witness generator and KZG blob builder
//! - [`circuit`]: the in-circuit state-transition verifier

pub mod census;
pub mod circuit;
pub mod constants;
pub mod crypto;
pub mod errors;
pub mod merkle;
pub mod state;
pub mod witness;

/// Application field: the BW6-761 scalar field, which is also the base field
/// of BLS12-377. All state hashing, Merkle roots, and ballot coordinates
/// live here, and it is the native field of the state-transition circuit.
pub type F = ark_bw6_761::Fr;

/// Curve of the state-transition proof itself.
pub type OuterPairing = ark_bw6_761::BW6_761;

/// Curve of the aggregator proof and of the blob KZG commitment. Its base
/// field equals [`F`], so both are verified natively in-circuit.
pub type InnerPairing = ark_bls12_377::Bls12_377;

/// Scalar field of BLS12-377: domain of blob entries and of the aggregator
/// proof's public inputs.
pub type InnerFr = ark_bls12_377::Fr;

/// Twisted-Edwards curve embedded in [`F`]; hosts the ElGamal ballots.
pub type EmbeddedConfig = ark_ed_on_bw6_761::EdwardsConfig;
pub type EmbeddedAffine = ark_ed_on_bw6_761::EdwardsAffine;
pub type EmbeddedProjective = ark_ed_on_bw6_761::EdwardsProjective;
/// Scalar field of the embedded curve (ElGamal exponents).
pub type EmbeddedFr = ark_ed_on_bw6_761::Fr;
