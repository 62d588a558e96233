//! Error types for the sync layer.

use ctsync_diff::SynthesisError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Every variant is scoped to the smallest unit that failed: an id, a chunk,
/// one draft or one resource. None of them aborts a whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A draft references ids that have no key.
    #[error("draft with key '{key}' has unresolved references: {}", references.join(", "))]
    ResolutionGap { key: String, references: Vec<String> },

    /// Update-action synthesis failed for one resource.
    #[error("failed to build update actions: {0}")]
    Synthesis(#[from] SynthesisError),

    /// A remote lookup, create or update failed.
    #[error("remote call failed: {0}")]
    RemoteCall(String),

    /// A draft without a natural key cannot be matched or created.
    #[error("draft at position {position} has a blank key")]
    BlankKey { position: usize },

    /// Two drafts of one batch share a key.
    #[error("duplicate key '{key}' at position {position}")]
    DuplicateKey { key: String, position: usize },

    /// Document store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote answered with an unexpected response shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<ctsync_types::Error> for SyncError {
    fn from(e: ctsync_types::Error) -> Self {
        match e {
            ctsync_types::Error::Serialization(e) => Self::Serialization(e),
            other => Self::Protocol(other.to_string()),
        }
    }
}
