//! Circuit gadgets mirroring the native primitives

pub mod ballot;
pub mod census;
pub mod kzg;
pub mod merkle;
pub mod poseidon;
pub mod recursive_input;
