//! The settlement package
//!
//! What a settlement layer must accept to finalize a batch: the outer-curve
//! proof, its public inputs, and the KZG blob commitment. The commitment
//! appears twice by construction (as a point and as public-input limbs);
//! [`SettlementPackage::verify`] re-checks that binding before verifying the
//! proof itself.

use ark_ec::AffineRepr;
use ark_groth16::{Proof, VerifyingKey};
use ark_poly_commit::kzg10::Commitment;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, SerializationError, Validate};

use crate::circuit::statetransition;
use crate::witness::PublicInputs;
use crate::{InnerPairing, OuterPairing, F};

#[derive(Clone, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct SettlementPackage {
    pub proof: Proof<OuterPairing>,
    pub public_inputs: PublicInputs,
    pub blob_commitment: Commitment<InnerPairing>,
}

impl SettlementPackage {
    /// Check that the commitment point matches its public-input limbs, then
    /// verify the proof.
    pub fn verify(&self, vk: &VerifyingKey<OuterPairing>) -> bool {
        let point = self.blob_commitment.0;
        let limbs = self.public_inputs.blob_commitment_limbs;
        let expected = if point.is_zero() {
            [F::from(0u64), F::from(0u64), F::from(1u64)]
        } else {
            [point.x, point.y, F::from(0u64)]
        };
        if limbs != expected {
            return false;
        }
        statetransition::verify(vk, &self.public_inputs, &self.proof).unwrap_or(false)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut out = Vec::new();
        self.serialize_with_mode(&mut out, Compress::Yes)?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        Self::deserialize_with_mode(bytes, Compress::Yes, Validate::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::pairing::Pairing;
    use ark_ff::UniformRand;
    use ark_std::test_rng;

    fn sample() -> SettlementPackage {
        let mut rng = test_rng();
        type G1 = <OuterPairing as Pairing>::G1Affine;
        type G2 = <OuterPairing as Pairing>::G2Affine;
        let commitment_point =
            (<InnerPairing as Pairing>::G1Affine::generator() * crate::InnerFr::from(5u64)).into();
        SettlementPackage {
            proof: Proof {
                a: G1::generator(),
                b: G2::generator(),
                c: G1::generator(),
            },
            public_inputs: PublicInputs {
                root_before: F::rand(&mut rng),
                root_after: F::rand(&mut rng),
                voters_count: F::from(2u64),
                overwritten_count: F::from(0u64),
                census_root: F::rand(&mut rng),
                blob_commitment_limbs: [F::from(0u64); 3],
            },
            blob_commitment: Commitment(commitment_point),
        }
    }

    #[test]
    fn test_bytes_roundtrip() {
        let package = sample();
        let bytes = package.to_bytes().unwrap();
        let back = SettlementPackage::from_bytes(&bytes).unwrap();
        assert_eq!(back.public_inputs, package.public_inputs);
        assert_eq!(back.blob_commitment, package.blob_commitment);
    }

    #[test]
    fn test_mismatched_limbs_rejected() {
        let package = sample();
        // Limbs are zeroed but the commitment is a real point, so the
        // binding check fails before any pairing work.
        type G1 = <OuterPairing as Pairing>::G1Affine;
        type G2 = <OuterPairing as Pairing>::G2Affine;
        let vk = VerifyingKey::<OuterPairing> {
            alpha_g1: G1::generator(),
            beta_g2: G2::generator(),
            gamma_g2: G2::generator(),
            delta_g2: G2::generator(),
            gamma_abc_g1: vec![G1::generator(); 9],
        };
        assert!(!package.verify(&vk));
    }
}
