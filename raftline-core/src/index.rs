use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the replicated log.
///
/// Indices are signed so "no entry yet" is representable as `-1`, matching
/// the consensus state's `commitIndex`/`lastApplied` convention directly
/// instead of wrapping every use site in an `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogIndex(pub i64);

impl LogIndex {
    pub const NONE: LogIndex = LogIndex(-1);

    #[inline]
    pub fn new(index: i64) -> Self {
        LogIndex(index)
    }

    #[inline]
    pub fn next(&self) -> Self {
        LogIndex(self.0 + 1)
    }

    #[inline]
    pub fn prev(&self) -> Self {
        LogIndex(self.0 - 1)
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn as_usize(&self) -> Option<usize> {
        if self.0 < 0 {
            None
        } else {
            Some(self.0 as usize)
        }
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<i64> for LogIndex {
    fn from(index: i64) -> Self {
        LogIndex(index)
    }
}

impl From<usize> for LogIndex {
    fn from(index: usize) -> Self {
        LogIndex(index as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_negative() {
        assert!(LogIndex::NONE.is_none());
        assert_eq!(LogIndex::NONE.as_usize(), None);
    }

    #[test]
    fn next_prev_roundtrip() {
        let idx = LogIndex::new(4);
        assert_eq!(idx.next().prev(), idx);
    }
}
