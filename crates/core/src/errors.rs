//! Error kinds surfaced by the state store and the witness generator
//!
//! In-circuit failures are never recoverable: a failed assertion simply makes
//! the proof un-provable and surfaces as a `SynthesisError` from the
//! constraint system. The kinds below cover everything off-circuit.

use thiserror::Error;

/// Errors from the state store and its batch lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    // ============ Lifecycle ============
    #[error("state already initialized with different parameters")]
    StateAlreadyInitialized,

    #[error("a batch is already in progress")]
    BatchInProgress,

    #[error("no batch is open")]
    NoBatchOpen,

    #[error("batch is full ({0} votes)")]
    BatchFull(usize),

    // ============ Keys ============
    #[error("ballot key collision: addresses {0:#x} and {1:#x} map to key {2}")]
    KeyCollision(u64, u64, u64),

    #[error("state key {0} not found")]
    KeyNotFound(u64),

    // ============ Points ============
    #[error("point is not in the embedded-curve subgroup")]
    SubgroupCheckFailed,

    // ============ Persistence ============
    #[error("state snapshot io: {0}")]
    SnapshotIo(String),

    #[error("state snapshot is malformed: {0}")]
    SnapshotMalformed(String),
}

/// Errors from witness assembly and blob construction.
#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("transition chain does not compose at slot {0}")]
    InvalidProofShape(usize),

    #[error("batch output carries {got} transitions, expected {expected}")]
    TransitionCountMismatch { got: usize, expected: usize },

    #[error("blob reconstruction disagrees with the witness at slot {0}")]
    BlobMismatch(usize),

    #[error("blob overflows {0} slots")]
    BlobOverflow(usize),

    #[error("KZG setup does not cover degree {0}")]
    KzgDegreeTooLarge(usize),

    #[error("KZG commitment scheme: {0}")]
    Kzg(String),

    #[error("re-encryption chain does not reproduce slot {0}")]
    ReencryptionMismatch(usize),

    #[error(transparent)]
    State(#[from] StateError),
}
