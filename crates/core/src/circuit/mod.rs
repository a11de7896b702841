//! The in-circuit state-transition verifier
//!
//! [`statetransition::StateTransitionCircuit`] is the constraint system the
//! outer Groth16 proof is generated from; [`gadgets`] holds its building
//! blocks, each the exact in-circuit twin of an off-circuit primitive.

pub mod aggregator;
pub mod gadgets;
pub mod package;
pub mod statetransition;

/// Pairing gadget for BLS12-377 arithmetic inside the BW6-761 scalar field.
pub type InnerPairingVar = ark_bls12_377::constraints::PairingVar;
/// BLS12-377 G1 inside the circuit.
pub type InnerG1Var = ark_bls12_377::constraints::G1Var;
/// BLS12-377 G2 inside the circuit.
pub type InnerG2Var = ark_bls12_377::constraints::G2Var;
/// Embedded-curve points inside the circuit.
pub type EmbeddedVar = ark_ed_on_bw6_761::constraints::EdwardsVar;
