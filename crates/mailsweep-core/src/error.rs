//! Engine error types.

use crate::session::SessionError;

/// Errors surfaced by the cleanup engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation requiring a live session was called without one.
    #[error("not connected to the mail store")]
    NotConnected,

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying mail session failed.
    #[error("transport failure: {0}")]
    Transport(#[from] SessionError),

    /// A scan failed partway through; partial aggregates are discarded.
    #[error("retrieval failed: {source}")]
    Retrieval {
        /// The failure that aborted the scan.
        #[source]
        source: Box<Error>,
    },

    /// A deletion failed; no completion count is reported.
    #[error("deletion failed: {source}")]
    Deletion {
        /// The failure that aborted the deletion.
        #[source]
        source: Box<Error>,
    },

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
