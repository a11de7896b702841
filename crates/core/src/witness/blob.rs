//! The batch blob and its KZG commitment
//!
//! A blob is a fixed-length sequence of BLS12-377 scalar elements derived
//! deterministically from a sealed batch: the two results accumulators, then
//! one group per real vote (`vote_id`, `address`, re-encrypted ballot), then
//! zeroes. A zero where a vote id would be read is the end-of-votes
//! sentinel, so real vote ids are nonzero by protocol convention.
//!
//! Embedded-curve coordinates are 377-bit and blob slots hold 253-bit
//! elements, so every coordinate is split into two limbs: the low
//! `BLOB_SLOT_BITS` bits, then the remaining high bits. Short values
//! (ids, addresses) stay single-slot.
//!
//! The blob is interpreted as the coefficients of a polynomial over the
//! BLS12-377 scalar field, committed with KZG10 and opened at a point
//! derived from `(process.id, root_before)`, which ties the commitment to
//! this specific transition.

use ark_ec::pairing::Pairing;
use ark_ff::{BigInteger, Field, PrimeField, Zero};
use ark_poly::univariate::DensePolynomial;
use ark_poly::DenseUVPolynomial;
use ark_poly::Polynomial;
use ark_poly_commit::kzg10::{Commitment, Powers, Proof, Randomness, UniversalParams, VerifierKey, KZG10};
use ark_poly_commit::PCRandomness;
use ark_std::borrow::Cow;
use ark_std::rand::RngCore;

use crate::constants::BLOB_SLOT_BITS;
use crate::crypto::elgamal::Ballot;
use crate::crypto::hash::hash;
use crate::errors::WitnessError;
use crate::state::Vote;
use crate::{InnerFr, InnerPairing, F};

type Kzg = KZG10<InnerPairing, DensePolynomial<InnerFr>>;
type G1 = <InnerPairing as Pairing>::G1Affine;

/// Bits kept when deriving the evaluation point; strictly below the
/// BLS12-377 scalar modulus bit size, so no modular reduction is needed
/// off-circuit or in-circuit.
pub const EVAL_POINT_BITS: usize = 248;

/// A fully laid-out blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub entries: Vec<InnerFr>,
}

impl Blob {
    pub fn polynomial(&self) -> DensePolynomial<InnerFr> {
        DensePolynomial::from_coefficients_slice(&self.entries)
    }

    pub fn evaluate(&self, z: &InnerFr) -> InnerFr {
        self.polynomial().evaluate(z)
    }
}

/// Low `BLOB_SLOT_BITS` bits of an application-field element as a blob
/// entry. Used for values that fit one slot by domain (ids, addresses);
/// higher bits are discarded, and the circuit constrains them to zero.
pub fn narrow_to_inner(value: &F) -> InnerFr {
    let bits = value.into_bigint().to_bits_le();
    inner_from_bits(&bits[..BLOB_SLOT_BITS.min(bits.len())])
}

/// Split a full-width application-field element into `(low, high)` limbs.
pub fn split_to_inner(value: &F) -> (InnerFr, InnerFr) {
    let bits = value.into_bigint().to_bits_le();
    let low = inner_from_bits(&bits[..BLOB_SLOT_BITS]);
    let high = inner_from_bits(&bits[BLOB_SLOT_BITS..]);
    (low, high)
}

fn inner_from_bits(bits: &[bool]) -> InnerFr {
    let mut acc = InnerFr::zero();
    let mut power = InnerFr::from(1u64);
    for bit in bits {
        if *bit {
            acc += power;
        }
        power.double_in_place();
    }
    acc
}

fn push_coord(entries: &mut Vec<InnerFr>, value: &F) {
    let (low, high) = split_to_inner(value);
    entries.push(low);
    entries.push(high);
}

fn push_ballot<const NF: usize>(entries: &mut Vec<InnerFr>, ballot: &Ballot<NF>) {
    for coord in ballot.serialize_rte() {
        push_coord(entries, &coord);
    }
}

/// Lay out the blob for a sealed batch. `votes` holds the real slots only.
pub fn build_blob<const NF: usize>(
    n_blob: usize,
    new_results_add: &Ballot<NF>,
    new_results_sub: &Ballot<NF>,
    votes: &[Vote<NF>],
) -> Result<Blob, WitnessError> {
    let mut entries = Vec::with_capacity(n_blob);
    push_ballot(&mut entries, new_results_add);
    push_ballot(&mut entries, new_results_sub);
    for vote in votes {
        entries.push(narrow_to_inner(&vote.vote_id));
        entries.push(narrow_to_inner(&vote.address));
        push_ballot(&mut entries, &vote.reencrypted_ballot);
    }
    if entries.len() > n_blob {
        return Err(WitnessError::BlobOverflow(n_blob));
    }
    entries.resize(n_blob, InnerFr::zero());
    Ok(Blob { entries })
}

/// Evaluation point `z`: the low [`EVAL_POINT_BITS`] bits of
/// `H(process_id, root_before)`.
pub fn derive_eval_point(process_id: &F, root_before: &F) -> InnerFr {
    let digest = hash(&[*process_id, *root_before]);
    let bits = digest.into_bigint().to_bits_le();
    inner_from_bits(&bits[..EVAL_POINT_BITS])
}

/// KZG powers and verifier key for blob commitments.
pub struct BlobKzg {
    powers_of_g: Vec<G1>,
    powers_of_gamma_g: Vec<G1>,
    vk: VerifierKey<InnerPairing>,
}

impl BlobKzg {
    /// Derive powers for degree-`< max_len` blobs. The universal parameters
    /// normally ship as a trusted-setup artifact; tests derive them from a
    /// seeded rng.
    pub fn setup<R: RngCore>(max_len: usize, rng: &mut R) -> Result<Self, WitnessError> {
        let pp: UniversalParams<InnerPairing> =
            Kzg::setup(max_len - 1, false, rng).map_err(|e| WitnessError::Kzg(e.to_string()))?;
        let powers_of_g = pp.powers_of_g[..max_len].to_vec();
        let powers_of_gamma_g = (0..max_len)
            .map(|i| pp.powers_of_gamma_g[&i])
            .collect::<Vec<_>>();
        let vk = VerifierKey {
            g: pp.powers_of_g[0],
            gamma_g: pp.powers_of_gamma_g[&0],
            h: pp.h,
            beta_h: pp.beta_h,
            prepared_h: pp.prepared_h.clone(),
            prepared_beta_h: pp.prepared_beta_h.clone(),
        };
        Ok(Self {
            powers_of_g,
            powers_of_gamma_g,
            vk,
        })
    }

    pub fn verifier_key(&self) -> &VerifierKey<InnerPairing> {
        &self.vk
    }

    fn powers(&self) -> Powers<'_, InnerPairing> {
        Powers {
            powers_of_g: Cow::Borrowed(&self.powers_of_g),
            powers_of_gamma_g: Cow::Borrowed(&self.powers_of_gamma_g),
        }
    }

    pub fn commit(&self, blob: &Blob) -> Result<Commitment<InnerPairing>, WitnessError> {
        if blob.entries.len() > self.powers_of_g.len() {
            return Err(WitnessError::KzgDegreeTooLarge(blob.entries.len() - 1));
        }
        let (commitment, _) = Kzg::commit(&self.powers(), &blob.polynomial(), None, None)
            .map_err(|e| WitnessError::Kzg(e.to_string()))?;
        Ok(commitment)
    }

    /// Open the blob polynomial at `z`, returning the claimed value and the
    /// evaluation proof.
    pub fn open(
        &self,
        blob: &Blob,
        z: &InnerFr,
    ) -> Result<(InnerFr, Proof<InnerPairing>), WitnessError> {
        let poly = blob.polynomial();
        let value = poly.evaluate(z);
        let rand = Randomness::<InnerFr, DensePolynomial<InnerFr>>::empty();
        let proof = Kzg::open(&self.powers(), &poly, *z, &rand)
            .map_err(|e| WitnessError::Kzg(e.to_string()))?;
        Ok((value, proof))
    }

    pub fn check(
        &self,
        commitment: &Commitment<InnerPairing>,
        z: &InnerFr,
        value: &InnerFr,
        proof: &Proof<InnerPairing>,
    ) -> Result<bool, WitnessError> {
        Kzg::check(&self.vk, commitment, *z, *value, proof)
            .map_err(|e| WitnessError::Kzg(e.to_string()))
    }
}
