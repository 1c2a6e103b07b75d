//! Error types for diffing, list mutation and selection tracking.
//!
//! Every error here is a contract violation by the caller. Nothing is
//! retried internally and a failed operation leaves its target unchanged.

use thiserror::Error;

/// Which input sequence of a diff an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The sequence currently held (the "before" snapshot).
    Old,
    /// The incoming sequence (the "after" snapshot).
    New,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return match self {
            Side::Old => write!(f, "old"),
            Side::New => write!(f, "new"),
        };
    }
}

/// Error returned by [`crate::diff::compute_splices`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// The same key appears twice within one sequence.
    #[error("duplicate identity in {side} sequence at positions {first} and {second}")]
    DuplicateIdentity {
        side: Side,
        first: usize,
        second: usize,
    },
}

/// Error returned by [`crate::list::ObservableList`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    DuplicateIdentity(#[from] DiffError),
}

/// Error returned by [`crate::selection::SelectionTracker`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The tracker was detached from its list.
    #[error("selection tracker is not attached to a list")]
    NotAttached,
    /// The list the tracker was bound to has been dropped.
    #[error("the list bound to this selection tracker no longer exists")]
    ListDropped,
    /// The list or tracker is in the middle of dispatching events.
    #[error("the list is busy dispatching events")]
    ListBusy,
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
