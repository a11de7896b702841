//! Protocol constants and state-key namespaces

/// Votes per batch. Unused slots are dummies and must produce NOOP
/// transitions.
pub const VOTES_PER_BATCH: usize = 100;

/// ElGamal ciphertexts per ballot.
pub const BALLOT_FIELDS: usize = 8;

/// Depth of the census Merkle tree.
pub const CENSUS_TREE_DEPTH: usize = 160;

/// State-tree key length in bits. State keys are short; ballot and vote-id
/// keys are projected into this keyspace.
pub const STATE_KEY_BITS: usize = 32;

/// Bits of a voter address kept when deriving its ballot key.
pub const CENSUS_ADDRESS_BIT_LEN: usize = 20;

/// Field-element slots per blob. Sized so a full batch fits with every
/// embedded-curve coordinate split across two slots.
pub const BLOB_LEN: usize = 8192;

/// Bits per blob slot limb. Embedded-curve coordinates are 377-bit and are
/// split into two slots of at most this many bits (low limb first).
pub const BLOB_SLOT_BITS: usize = 224;

/// Blob slots occupied by one embedded-curve coordinate.
pub const BLOB_COORD_SLOTS: usize = 2;

/// Blob slots occupied by one serialized ballot (4 coordinates per
/// ciphertext, two slots per coordinate).
pub const fn ballot_blob_slots(ballot_fields: usize) -> usize {
    ballot_fields * 4 * BLOB_COORD_SLOTS
}

/// State-key namespaces. The numeric order of the well-known keys is the
/// total order the tree preserves.
pub mod keys {
    /// Process id leaf.
    pub const PROCESS_ID: u64 = 0;
    /// Census origin leaf.
    pub const CENSUS_ORIGIN: u64 = 1;
    /// Ballot mode leaf (8 serialized fields).
    pub const BALLOT_MODE: u64 = 2;
    /// Encryption key leaf (RTE, 2 fields).
    pub const ENCRYPTION_KEY: u64 = 3;
    /// Accumulator of all re-encrypted ballots added this election.
    pub const RESULTS_ADD: u64 = 4;
    /// Accumulator of all overwritten ballots.
    pub const RESULTS_SUB: u64 = 5;
    /// First ballot key. Ballot keys never collide with the metadata or
    /// results keys above.
    pub const BALLOT_KEY_MIN: u64 = 8;
    /// First vote-id key.
    pub const VOTE_ID_KEY_MIN: u64 = 1 << 31;
    /// Width of the vote-id namespace.
    pub const VOTE_ID_KEY_SPAN: u64 = 1 << 30;
}

/// Census origin tags stored in the `CENSUS_ORIGIN` leaf.
pub mod census_origin {
    /// Eligibility proven by a Merkle path against the census root.
    pub const MERKLE: u64 = 1;
    /// Eligibility proven by a credential service provider signature.
    pub const CSP: u64 = 2;
}

/// Sentinel per-vote hash for dummy slots.
pub const DUMMY_VOTE_HASH_SENTINEL: u64 = 1;
