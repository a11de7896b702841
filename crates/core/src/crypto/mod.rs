//! Cryptographic primitives: Poseidon hashing and the ElGamal ballot algebra
//!
//! Everything here has an exact in-circuit counterpart under
//! [`crate::circuit::gadgets`]; the native and gadget evaluations must agree
//! bit-for-bit.

pub mod elgamal;
pub mod hash;
pub mod schnorr;
