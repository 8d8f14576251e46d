use raftline_core::{LogIndex, PeerId};
use std::collections::HashMap;

/// Leader-only bookkeeping for a single peer.
///
/// Reinitialized in full whenever this node wins an election:
/// `next_index` to `length(log)`, `match_index` to `-1`, `last_sent` to
/// `length(log) - 1`, `message_num` to `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerProgress {
    pub next_index: LogIndex,
    pub match_index: LogIndex,
    pub last_sent: LogIndex,
    pub message_num: u64,
}

impl PeerProgress {
    /// `last_log_index` is `length(log) - 1` (i.e. `LogIndex::NONE` for an
    /// empty log), matching the reinit rule run on every election win.
    pub fn reinit(last_log_index: LogIndex) -> Self {
        Self {
            next_index: last_log_index.next(),
            match_index: LogIndex::NONE,
            last_sent: last_log_index,
            message_num: 0,
        }
    }

    /// Applied on a successful AppendEntries response.
    pub fn on_append_success(&mut self) {
        self.match_index = self.last_sent;
        self.next_index = self.last_sent.next();
        self.message_num += 1;
    }

    /// Applied on a failed AppendEntries response: back off by one.
    pub fn on_append_failure(&mut self) {
        if self.next_index.0 > 0 {
            self.next_index = self.next_index.prev();
        }
    }
}

/// Per-peer progress table owned by the leader. Keyed by peer id, not
/// including self.
#[derive(Debug, Clone, Default)]
pub struct ProgressTable {
    peers: HashMap<PeerId, PeerProgress>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    /// Reinitialize every peer's progress on election win.
    pub fn reinit_all(&mut self, peer_ids: &[PeerId], last_log_index: LogIndex) {
        self.peers.clear();
        for &peer in peer_ids {
            self.peers.insert(peer, PeerProgress::reinit(last_log_index));
        }
    }

    pub fn get(&self, peer: PeerId) -> Option<&PeerProgress> {
        self.peers.get(&peer)
    }

    pub fn get_mut(&mut self, peer: PeerId) -> Option<&mut PeerProgress> {
        self.peers.get_mut(&peer)
    }

    pub fn match_indices(&self) -> Vec<LogIndex> {
        self.peers.values().map(|p| p.match_index).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerProgress)> {
        self.peers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinit_matches_election_win_rule() {
        let p = PeerProgress::reinit(LogIndex::new(3));
        assert_eq!(p.next_index, LogIndex::new(4));
        assert_eq!(p.match_index, LogIndex::NONE);
        assert_eq!(p.last_sent, LogIndex::new(3));
        assert_eq!(p.message_num, 0);
    }

    #[test]
    fn success_advances_match_and_next() {
        let mut p = PeerProgress::reinit(LogIndex::new(-1));
        p.last_sent = LogIndex::new(2);
        p.on_append_success();
        assert_eq!(p.match_index, LogIndex::new(2));
        assert_eq!(p.next_index, LogIndex::new(3));
        assert_eq!(p.message_num, 1);
    }

    #[test]
    fn failure_backs_off_by_one() {
        let mut p = PeerProgress::reinit(LogIndex::new(5));
        let before = p.next_index;
        p.on_append_failure();
        assert_eq!(p.next_index, before.prev());
    }
}
