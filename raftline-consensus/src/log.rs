use bytes::Bytes;
use raftline_core::{CommandType, LogIndex};
use tokio::sync::oneshot;

use crate::CompletionResult;

/// One entry in the replicated log.
///
/// `completion_handle` is set only on the copy held by the originating
/// leader; a copy that arrived over the wire as a `WireLogEntry` never
/// carries one — it is reconstructed with `completion_handle: None`.
pub struct LogRecord {
    pub term: u64,
    pub command_type: CommandType,
    pub payload: Bytes,
    pub completion_handle: Option<oneshot::Sender<CompletionResult>>,
}

impl LogRecord {
    pub fn new(term: u64, command_type: CommandType, payload: Bytes) -> Self {
        Self {
            term,
            command_type,
            payload,
            completion_handle: None,
        }
    }
}

/// In-memory ordered log store.
///
/// No durability: this core explicitly waives persistence, so there
/// is no backing file and no `save_state`/`load_state` round trip.
#[derive(Default)]
pub struct LogStore {
    entries: Vec<LogRecord>,
}

impl LogStore {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_index(&self) -> LogIndex {
        LogIndex::new(self.entries.len() as i64 - 1)
    }

    pub fn last_term(&self) -> u64 {
        self.entries.last().map(|e| e.term).unwrap_or(0)
    }

    /// Term of the entry at `index`. Index `-1`, the "before the log"
    /// sentinel, always reports term 0 — the universal virtual
    /// predecessor consulted by both the AppendEntries prevLogIndex check
    /// and the RequestVote up-to-date comparison when a log is empty.
    pub fn term_at(&self, index: LogIndex) -> Option<u64> {
        if index.0 < 0 {
            return Some(0);
        }
        self.entries.get(index.0 as usize).map(|e| e.term)
    }

    pub fn entry_at(&self, index: LogIndex) -> Option<&LogRecord> {
        let i = index.as_usize()?;
        self.entries.get(i)
    }

    pub fn entry_at_mut(&mut self, index: LogIndex) -> Option<&mut LogRecord> {
        let i = index.as_usize()?;
        self.entries.get_mut(i)
    }

    pub fn append(&mut self, record: LogRecord) {
        self.entries.push(record);
    }

    /// Truncate the log to length `index.0` (drop the entry at `index`
    /// and everything after it). A no-op if `index` is `NONE` or already
    /// past the end.
    pub fn truncate_from(&mut self, index: LogIndex) {
        if let Some(i) = index.as_usize() {
            self.entries.truncate(i);
        }
    }

    /// The tail of the log starting at `index` (the whole log if `index`
    /// is `NONE`).
    pub fn slice_from(&self, index: LogIndex) -> &[LogRecord] {
        match index.as_usize() {
            Some(i) if i <= self.entries.len() => &self.entries[i..],
            Some(_) => &[],
            None => &self.entries[..],
        }
    }
}
