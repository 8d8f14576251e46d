//! raftline-replication - the leader-only replication engine.
//!
//! Tracks per-peer `nextIndex`/`matchIndex`/`lastSent`/`messageNum` and
//! computes the commit index by majority, with the current-term commit
//! restriction applied.

pub mod commit;
pub mod progress;

pub use commit::compute_commit_index;
pub use progress::{PeerProgress, ProgressTable};
