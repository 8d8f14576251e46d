use raftline_core::LogIndex;

/// Recompute the leader's commit index from the cluster's replication
/// progress.
///
/// Per canonical Raft: include the leader's own last-log-index alongside
/// every peer's `match_index`, sort descending, and take the value at the
/// majority position (not just the peer `match_index` values on their
/// own, which undercounts the leader's own log). A candidate index only
/// becomes the new commit index if it is higher than the current one AND
/// its entry's term equals `current_term` (the current-term commit
/// restriction — committing an entry from an earlier term purely by
/// replica count is unsafe).
pub fn compute_commit_index(
    self_last_log_index: LogIndex,
    peer_match_indices: &[LogIndex],
    current_commit_index: LogIndex,
    current_term: u64,
    term_at: impl Fn(LogIndex) -> Option<u64>,
) -> LogIndex {
    let mut all: Vec<LogIndex> = Vec::with_capacity(peer_match_indices.len() + 1);
    all.push(self_last_log_index);
    all.extend_from_slice(peer_match_indices);
    all.sort_by(|a, b| b.cmp(a));

    let cluster_size = all.len();
    let majority_pos = cluster_size / 2; // 0-indexed position of the median-for-majority value
    let candidate = all[majority_pos];

    if candidate.0 > current_commit_index.0 && term_at(candidate) == Some(current_term) {
        candidate
    } else {
        current_commit_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_when_majority_replicated_in_current_term() {
        // 3-node cluster: leader at index 2, one peer caught up, one lagging.
        let commit = compute_commit_index(
            LogIndex::new(2),
            &[LogIndex::new(2), LogIndex::new(0)],
            LogIndex::NONE,
            1,
            |_| Some(1),
        );
        assert_eq!(commit, LogIndex::new(2));
    }

    #[test]
    fn refuses_to_advance_on_entry_from_earlier_term() {
        // Majority replicated index 2, but that entry is from term 1 while
        // the leader is now at term 2: must not commit it by count alone.
        let commit = compute_commit_index(
            LogIndex::new(2),
            &[LogIndex::new(2), LogIndex::new(0)],
            LogIndex::NONE,
            2,
            |idx| if idx == LogIndex::new(2) { Some(1) } else { Some(2) },
        );
        assert_eq!(commit, LogIndex::NONE);
    }

    #[test]
    fn never_regresses() {
        let commit = compute_commit_index(
            LogIndex::new(1),
            &[LogIndex::new(0), LogIndex::new(0)],
            LogIndex::new(3),
            1,
            |_| Some(1),
        );
        assert_eq!(commit, LogIndex::new(3));
    }
}
