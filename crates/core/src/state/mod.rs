//! Election state: processes, votes, and the persisted key-value tree

mod encoding;
mod process;
mod store;
mod vote;

pub use encoding::ProcessFixture;
pub use process::{BallotMode, Process};
pub use store::{BatchOutput, State, VoteRecord};
pub use vote::{ballot_index, vote_id_index, Vote};
