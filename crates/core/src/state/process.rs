//! Process metadata: the immutable per-election parameters

use serde::{Deserialize, Serialize};

use crate::crypto::elgamal::EncryptionKey;
use crate::F;

/// Per-process ballot-validity parameters. Enforced by the per-vote circuits
/// upstream; carried here because they are part of the state commitment and
/// of every per-vote hash preimage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotMode {
    pub num_fields: u64,
    pub unique_values: u64,
    pub max_value: u64,
    pub min_value: u64,
    pub max_value_sum: u64,
    pub min_value_sum: u64,
    pub cost_exponent: u64,
    pub cost_from_weight: u64,
}

impl BallotMode {
    /// State-leaf / hash-preimage serialization, fixed order.
    pub fn serialize(&self) -> [F; 8] {
        [
            F::from(self.num_fields),
            F::from(self.unique_values),
            F::from(self.max_value),
            F::from(self.min_value),
            F::from(self.max_value_sum),
            F::from(self.min_value_sum),
            F::from(self.cost_exponent),
            F::from(self.cost_from_weight),
        ]
    }

    pub fn deserialize(fields: &[F; 8]) -> Option<Self> {
        let as_u64 = |f: &F| -> Option<u64> {
            use ark_ff::{BigInteger, PrimeField};
            let bytes = f.into_bigint().to_bytes_le();
            if bytes[8..].iter().any(|b| *b != 0) {
                return None;
            }
            Some(u64::from_le_bytes(bytes[..8].try_into().ok()?))
        };
        Some(Self {
            num_fields: as_u64(&fields[0])?,
            unique_values: as_u64(&fields[1])?,
            max_value: as_u64(&fields[2])?,
            min_value: as_u64(&fields[3])?,
            max_value_sum: as_u64(&fields[4])?,
            min_value_sum: as_u64(&fields[5])?,
            cost_exponent: as_u64(&fields[6])?,
            cost_from_weight: as_u64(&fields[7])?,
        })
    }
}

/// A process (election). Created once; immutable for the core's purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Process {
    pub id: F,
    /// One of [`crate::constants::census_origin`].
    pub census_origin: u64,
    pub ballot_mode: BallotMode,
    pub encryption_key: EncryptionKey,
}

impl Process {
    /// State-leaf serialization:
    /// `id, census_origin, ballot_mode…, encryption_key (RTE)…`.
    pub fn serialize(&self) -> Vec<F> {
        let mut out = Vec::with_capacity(12);
        out.push(self.id);
        out.push(F::from(self.census_origin));
        out.extend_from_slice(&self.ballot_mode.serialize());
        out.extend_from_slice(&self.encryption_key.serialize_rte());
        out
    }
}
