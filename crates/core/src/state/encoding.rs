//! JSON fixtures for process metadata
//!
//! The sequencer-facing tooling exchanges process parameters as JSON with
//! hex-encoded field elements and TE-form key coordinates. Parsing converts
//! back to the internal (RTE) representation and re-checks the subgroup.

use serde::{Deserialize, Serialize};

use crate::crypto::elgamal::{from_te, to_te};
use crate::errors::StateError;
use crate::state::{BallotMode, Process};
use crate::F;

/// Wire form of a [`Process`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessFixture {
    /// Hex-encoded process id.
    pub id: String,
    pub census_origin: u64,
    pub ballot_mode: BallotMode,
    /// TE-form public key coordinates, hex-encoded.
    pub encryption_key: [String; 2],
}

impl ProcessFixture {
    pub fn from_process(process: &Process) -> Self {
        let (x, y) = to_te(&process.encryption_key.0);
        Self {
            id: field_to_hex(&process.id),
            census_origin: process.census_origin,
            ballot_mode: process.ballot_mode,
            encryption_key: [field_to_hex(&x), field_to_hex(&y)],
        }
    }

    pub fn to_process(&self) -> Result<Process, StateError> {
        let x = field_from_hex(&self.encryption_key[0])?;
        let y = field_from_hex(&self.encryption_key[1])?;
        Ok(Process {
            id: field_from_hex(&self.id)?,
            census_origin: self.census_origin,
            ballot_mode: self.ballot_mode,
            encryption_key: crate::crypto::elgamal::EncryptionKey::new(from_te(x, y)?)?,
        })
    }
}

fn field_to_hex(value: &F) -> String {
    use ark_serialize::CanonicalSerialize;
    let mut bytes = Vec::new();
    value
        .serialize_compressed(&mut bytes)
        .expect("field serialization");
    hex::encode(bytes)
}

fn field_from_hex(value: &str) -> Result<F, StateError> {
    use ark_serialize::CanonicalDeserialize;
    let bytes = hex::decode(value)
        .map_err(|e| StateError::SnapshotMalformed(format!("fixture hex: {e}")))?;
    F::deserialize_compressed(bytes.as_slice())
        .map_err(|e| StateError::SnapshotMalformed(format!("fixture field: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::census_origin;
    use crate::crypto::elgamal::EncryptionKey;
    use crate::EmbeddedFr;

    fn process() -> Process {
        Process {
            id: F::from(77u64),
            census_origin: census_origin::CSP,
            ballot_mode: BallotMode {
                num_fields: 2,
                unique_values: 1,
                max_value: 5,
                min_value: 0,
                max_value_sum: 10,
                min_value_sum: 0,
                cost_exponent: 2,
                cost_from_weight: 1,
            },
            encryption_key: EncryptionKey::from_secret(&EmbeddedFr::from(13u64)),
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let p = process();
        let json = serde_json::to_string(&ProcessFixture::from_process(&p)).unwrap();
        let parsed: ProcessFixture = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.to_process().unwrap(), p);
    }

    #[test]
    fn test_rejects_non_curve_key() {
        let mut fixture = ProcessFixture::from_process(&process());
        fixture.encryption_key[0] = field_to_hex(&F::from(3u64));
        assert!(fixture.to_process().is_err());
    }
}
