//! Error types for snapshot merging.

use thiserror::Error;

/// Result type for merge operations
pub type MergeResult<T> = Result<T, MergeError>;

/// Failures while folding a mutable snapshot back into the repository.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The mutable snapshot was not handed out by this repository.
    #[error("the mutable snapshot does not belong to this repository")]
    ForeignSnapshot,

    /// The changes collide with changes committed since the mutable
    /// snapshot was opened.
    #[error("cannot merge: {reason}")]
    Unmergeable { reason: String },
}

impl MergeError {
    pub(crate) fn unmergeable(reason: impl Into<String>) -> MergeError {
        MergeError::Unmergeable {
            reason: reason.into(),
        }
    }
}
