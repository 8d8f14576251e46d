use raftline_core::{CommandResult, LogIndex, PeerId, RequestRouter};

/// The simplest possible `RequestRouter`: logs every commit and every
/// leadership change instead of fanning them out to real client sessions.
///
/// The front-end request router is an external collaborator — a
/// real one sits in front of the protocol port and tracks pending client
/// requests by log index. This stands in for it in the demo binary and in
/// tests that only need to observe that the signals fired.
#[derive(Debug, Default)]
pub struct LoggingRouter {
    node_id: PeerId,
}

impl LoggingRouter {
    pub fn new(node_id: PeerId) -> Self {
        Self { node_id }
    }
}

impl RequestRouter for LoggingRouter {
    fn on_commit(&self, index: LogIndex, result: CommandResult) {
        tracing::info!(node = %self.node_id, index = %index, ?result, "entry committed and applied");
    }

    fn on_leadership_change(&self, new_leader: Option<PeerId>) {
        tracing::info!(
            node = %self.node_id,
            new_leader = ?new_leader,
            "leadership changed; disconnecting client sessions"
        );
    }
}
