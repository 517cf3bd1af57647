//! # Errors
//!
//! `StoreError` is what a storage plugin reports. `ForumError` is what the
//! tree engine hands back to callers, with the operation and target attached.

use thiserror::Error;

/// Failures reported by a [`crate::traits::PostStore`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("document {0} does not exist")]
    NotFound(String),

    /// A create collided with an existing document.
    #[error("document {0} already exists")]
    AlreadyExists(String),

    /// The commit lost a race with another writer and may be retried.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// A stored document does not have the shape of a post.
    #[error("malformed document {id}: {reason}")]
    Decode { id: String, reason: String },

    /// Anything else the backend reports (I/O, driver, timeout).
    #[error("storage backend: {0}")]
    Backend(String),
}

/// The error type for all ft-core operations.
#[derive(Error, Debug)]
pub enum ForumError {
    /// Rejected before touching the store (empty path, bad page size, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation addressed a post that does not exist.
    #[error("post not found with ID {0}")]
    NotFound(String),

    /// An atomic commit did not succeed.
    #[error("{op} on {target} failed to commit: {source}")]
    StorageTransactionFailure {
        op: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },

    /// A read or listing did not succeed.
    #[error("{op} on {target} failed to query: {source}")]
    StorageQueryFailure {
        op: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },

    /// A stored record could not be read back as a post.
    #[error("{op} could not decode post {id}: {reason}")]
    DecodeError {
        op: &'static str,
        id: String,
        reason: String,
    },

    /// Surface that exists but has no implementation yet.
    #[error("{0} is not supported yet")]
    NotSupported(&'static str),
}

impl ForumError {
    /// Wraps a failed commit.
    pub(crate) fn commit(op: &'static str, target: &str, source: StoreError) -> Self {
        match source {
            StoreError::NotFound(id) => ForumError::NotFound(id),
            StoreError::Decode { id, reason } => ForumError::DecodeError { op, id, reason },
            source => ForumError::StorageTransactionFailure {
                op,
                target: target.to_string(),
                source,
            },
        }
    }

    /// Wraps a failed read.
    pub(crate) fn query(op: &'static str, target: &str, source: StoreError) -> Self {
        match source {
            StoreError::NotFound(id) => ForumError::NotFound(id),
            StoreError::Decode { id, reason } => ForumError::DecodeError { op, id, reason },
            source => ForumError::StorageQueryFailure {
                op,
                target: target.to_string(),
                source,
            },
        }
    }
}

/// A specialized Result type for forum logic.
pub type Result<T> = std::result::Result<T, ForumError>;

/// Result type returned by storage plugins.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_surfaces_as_not_found() {
        let err = ForumError::commit("delete_post", "abc", StoreError::NotFound("abc".into()));
        assert!(matches!(err, ForumError::NotFound(id) if id == "abc"));
    }

    #[test]
    fn backend_failure_keeps_context() {
        let err = ForumError::query("get_children", "s1", StoreError::Backend("disk".into()));
        let msg = err.to_string();
        assert!(msg.contains("get_children"));
        assert!(msg.contains("s1"));
        assert!(msg.contains("disk"));
    }
}
