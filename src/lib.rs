//! raftline - leader-based log replication consensus core (Raft-family).
//!
//! This crate is the thin runnable shell around the workspace: it wires a
//! `raftline_consensus::RaftNode` per configured peer together over the
//! in-process `ChannelTransport` (real peer sockets are out of scope, see
//! `raftline-rpc`), picks a `StateMachine` backend from configuration, and
//! exposes a minimal `RequestRouter` for local demos and tests.

pub mod cluster;
pub mod config;
pub mod router;

pub use raftline_consensus as consensus;
pub use raftline_core as core;
pub use raftline_replication as replication;
pub use raftline_rpc as rpc;
pub use raftline_statemachine as statemachine;

pub use cluster::Cluster;
pub use config::RaftlineConfig;
pub use router::LoggingRouter;

/// Commonly used types re-exported for embedders.
pub mod prelude {
    pub use crate::core::{Command, CommandResult, CommandType, PeerId, RaftlineError, Result};
    pub use crate::consensus::{RaftConfig, RaftHandle};
    pub use crate::Cluster;
    pub use crate::RaftlineConfig;
}
