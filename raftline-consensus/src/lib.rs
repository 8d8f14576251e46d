//! raftline-consensus - the per-node consensus state machine.
//!
//! Timer discipline, term-bump rule, follower/candidate/leader dispatch,
//! the applier, and the submission entry point. Everything here
//! runs on a single-writer actor task per node; no internal locking
//! is required because `NodeState` never has more than one owner.

pub mod applier;
pub mod election;
pub mod log;
pub mod raft;
pub mod state;
pub mod timer;

pub use raft::{NodeStatus, RaftConfig, RaftHandle, RaftNode};
pub use state::{NodeState, Role};

/// Result delivered to a command's completion handle once it has been
/// applied. Distinct from `raftline_core::Result`: a
/// non-fatal back-end error (e.g. a rejected bid) still resolves the
/// handle rather than aborting the applier.
pub type CompletionResult = raftline_core::Result<raftline_core::CommandResult>;
