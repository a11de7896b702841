//! Votes and state-key derivation

use ark_ff::{BigInteger, PrimeField, Zero};

use crate::constants::{keys, CENSUS_ADDRESS_BIT_LEN};
use crate::crypto::elgamal::Ballot;
use crate::crypto::hash::hash;
use crate::state::Process;
use crate::F;

/// A single submitted vote and everything the batch processing attaches to
/// it. `reencrypted_ballot` is the submitted ballot after one fresh
/// re-randomization; `overwritten_ballot` is the ballot previously stored at
/// this address, or the neutral ballot for a first vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vote<const NF: usize> {
    pub address: F,
    pub vote_id: F,
    pub weight: F,
    pub ballot: Ballot<NF>,
    pub reencrypted_ballot: Ballot<NF>,
    pub overwritten_ballot: Ballot<NF>,
}

impl<const NF: usize> Vote<NF> {
    /// A dummy slot: all-zero identity, neutral ballots.
    pub fn dummy() -> Self {
        Self {
            address: F::zero(),
            vote_id: F::zero(),
            weight: F::zero(),
            ballot: Ballot::new(),
            reencrypted_ballot: Ballot::new(),
            overwritten_ballot: Ballot::new(),
        }
    }

    /// Per-vote hash preimage, public-facing (TE) point forms:
    /// `process.id, ballot_mode…, encryption_key (TE), address, vote_id,
    /// ballot (TE), weight`.
    pub fn input_hash(&self, process: &Process) -> F {
        let mut preimage = Vec::with_capacity(13 + 4 * NF);
        preimage.push(process.id);
        preimage.extend_from_slice(&process.ballot_mode.serialize());
        preimage.extend_from_slice(&process.encryption_key.serialize_te());
        preimage.push(self.address);
        preimage.push(self.vote_id);
        preimage.extend_from_slice(&self.ballot.serialize_te());
        preimage.push(self.weight);
        hash(&preimage)
    }
}

/// Low `bits` of a field element's integer representation.
fn low_bits(value: &F, bits: usize) -> u64 {
    let le = value.into_bigint().to_bits_le();
    let mut out = 0u64;
    for (i, bit) in le.iter().take(bits).enumerate() {
        if *bit {
            out |= 1 << i;
        }
    }
    out
}

/// Project a voter address into the ballot-key namespace:
/// `BALLOT_KEY_MIN + census_index · 2^CensusAddressBitLen
///  + (address mod 2^CensusAddressBitLen)`.
pub fn ballot_index(address: &F, census_index: u64) -> u64 {
    keys::BALLOT_KEY_MIN
        + census_index * (1 << CENSUS_ADDRESS_BIT_LEN)
        + low_bits(address, CENSUS_ADDRESS_BIT_LEN)
}

/// Project a vote id into the vote-id key namespace.
pub fn vote_id_index(vote_id: &F) -> u64 {
    keys::VOTE_ID_KEY_MIN + low_bits(vote_id, 64) % keys::VOTE_ID_KEY_SPAN
}
