use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::peer::PeerId;

/// The command vocabulary accepted by the external state-machine back end.
///
/// The consensus core only ever routes by tag; it never interprets
/// `payload` beyond passing it through. The concrete encoding of each
/// command's payload is owned entirely by whichever `StateMachine`
/// implementation is plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    NewUser,
    NewAuction,
    CloseAuction,
    NewBid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command_type: CommandType,
    pub payload: Bytes,
}

impl Command {
    pub fn new(command_type: CommandType, payload: Bytes) -> Self {
        Self {
            command_type,
            payload,
        }
    }
}

/// Result fed back to the originating submitter's completion handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandResult {
    /// The disabled-backend mode still resolves handles, with no value.
    None,
    Value(Bytes),
}

/// The persistence back end that executes applied commands.
///
/// Out of scope per the core's charter: this crate only defines the seam.
/// A real back end lives outside this workspace; `raftline-statemachine`
/// ships a null implementation (disabled-backend mode) and an in-memory
/// demo implementation for tests and local runs.
#[async_trait]
pub trait StateMachine: Send + Sync {
    async fn apply(&self, command: &Command) -> Result<CommandResult>;
}

/// The front-end request router: submits commands, is told when it must
/// drop its client sessions because leadership moved elsewhere.
pub trait RequestRouter: Send + Sync {
    /// A previously submitted command has committed and been applied.
    fn on_commit(&self, index: crate::index::LogIndex, result: CommandResult);

    /// Leadership moved away from (or to) this node; client sessions
    /// bound to the old leader must be dropped.
    fn on_leadership_change(&self, new_leader: Option<PeerId>);
}
