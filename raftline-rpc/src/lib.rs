//! raftline-rpc - peer RPC message contracts and dispatch plumbing.
//!
//! Owns the two peer RPCs' wire contracts and the `PeerTransport`
//! seam. Connection establishment, reconnection, and peer authentication
//! are out of scope; `ChannelTransport` is a test double only.

pub mod message;
pub mod transport;

pub use message::{Message, WireLogEntry};
pub use transport::{ChannelTransport, PeerTransport};
