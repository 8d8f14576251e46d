use raftline_core::{LogIndex, PeerId};
use raftline_replication::ProgressTable;

use crate::log::LogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// Logically persistent per-node state. Durability is explicitly not
/// required by this core; the log lives only in memory.
#[derive(Default)]
pub struct PersistentState {
    pub current_term: u64,
    pub voted_for: Option<PeerId>,
    pub log: LogStore,
}

/// Volatile per-node state.
#[derive(Debug, Clone, Copy)]
pub struct VolatileState {
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
}

impl Default for VolatileState {
    fn default() -> Self {
        Self {
            commit_index: LogIndex::NONE,
            last_applied: LogIndex::NONE,
        }
    }
}

/// Complete per-node state: persistent-intent, volatile, and (while
/// Leader) the replication engine's per-peer progress table.
pub struct NodeState {
    pub node_id: PeerId,
    pub role: Role,
    pub current_leader_id: Option<PeerId>,
    pub last_message_num: i64,
    pub votes_gathered: u32,
    pub persistent: PersistentState,
    pub volatile: VolatileState,
    pub leader: Option<ProgressTable>,
}

impl NodeState {
    pub fn new(node_id: PeerId) -> Self {
        Self {
            node_id,
            role: Role::Follower,
            current_leader_id: None,
            last_message_num: -1,
            votes_gathered: 0,
            persistent: PersistentState::default(),
            volatile: VolatileState::default(),
            leader: None,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }
}
