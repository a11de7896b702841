//! Off-circuit witness assembly
//!
//! Consumes a sealed batch and produces the fully-populated private-input
//! structure for the state-transition circuit, plus the KZG blob that
//! mirrors the circuit's view of the batch.

mod blob;
mod generator;

pub use blob::{
    build_blob, derive_eval_point, narrow_to_inner, split_to_inner, Blob, BlobKzg,
    EVAL_POINT_BITS,
};
pub use generator::{apply_reencryption, generate_witness, PublicInputs, StateTransitionWitness};
