use thiserror::Error;

/// Recoverable faults surfaced to callers.
///
/// Only bounds faults are recoverable. Usage faults (operating on a
/// disposed view, committing without a begin, mixing a reorder with edits
/// in one batch, disposing a source before its dependents) are producer
/// bugs and panic instead of returning.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListError {
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl ListError {
    pub(crate) fn oob(index: usize, len: usize) -> Self {
        ListError::IndexOutOfBounds { index, len }
    }
}
