use bytes::Bytes;
use raftline_core::{CommandType, LogIndex, PeerId};
use serde::{Deserialize, Serialize};

/// A log entry as it travels over the wire.
///
/// Deliberately distinct from the consensus crate's internal log record:
/// the wire form carries no completion handle. The
/// completion handle is a one-shot notifier owned exclusively by the
/// originating leader — a replicated copy that crossed the wire must never
/// carry one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireLogEntry {
    pub term: u64,
    pub command_type: CommandType,
    pub payload: Bytes,
}

/// The two peer RPCs and their request/response variants, tagged by
/// direction rather than mixed onto one struct with an `isResponse` flag
/// (the reference design's approach, which is worth cleaning up
/// here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    AppendEntriesRequest {
        sender_id: PeerId,
        term: u64,
        message_num: u64,
        prev_log_index: LogIndex,
        prev_log_term: u64,
        entries: Vec<WireLogEntry>,
        leader_commit: LogIndex,
    },
    AppendEntriesResponse {
        sender_id: PeerId,
        term: u64,
        success: bool,
        commit_index: LogIndex,
        last_applied: LogIndex,
    },
    RequestVoteRequest {
        sender_id: PeerId,
        term: u64,
        message_num: u64,
        last_log_index: LogIndex,
        last_log_term: u64,
    },
    RequestVoteResponse {
        sender_id: PeerId,
        term: u64,
        vote_granted: bool,
    },
    /// Reserved for future log compaction support; receivers reply with
    /// `RaftlineError::SnapshotNotImplemented` and otherwise ignore it.
    Snapshot {
        sender_id: PeerId,
        term: u64,
    },
}

impl Message {
    pub fn sender_id(&self) -> PeerId {
        match self {
            Message::AppendEntriesRequest { sender_id, .. }
            | Message::AppendEntriesResponse { sender_id, .. }
            | Message::RequestVoteRequest { sender_id, .. }
            | Message::RequestVoteResponse { sender_id, .. }
            | Message::Snapshot { sender_id, .. } => *sender_id,
        }
    }

    pub fn term(&self) -> u64 {
        match self {
            Message::AppendEntriesRequest { term, .. }
            | Message::AppendEntriesResponse { term, .. }
            | Message::RequestVoteRequest { term, .. }
            | Message::RequestVoteResponse { term, .. }
            | Message::Snapshot { term, .. } => *term,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Message::AppendEntriesResponse { .. } | Message::RequestVoteResponse { .. }
        )
    }
}
