//! Error types for the temporal store

use thiserror::Error;

/// Result type for temporal operations
pub type TemporalResult<T> = Result<T, TemporalError>;

/// Errors raised by event chaining and tiered storage
#[derive(Error, Debug)]
pub enum TemporalError {
    /// Event belongs to a different workflow than the chain
    #[error("Workflow mismatch: chain is {expected}, event carries {actual}")]
    WorkflowMismatch { expected: String, actual: String },

    /// previous_hash does not match the chain tail
    #[error("Broken link at event {event_id}: expected previous_hash {expected}, got {actual}")]
    BrokenLink {
        event_id: String,
        expected: String,
        actual: String,
    },

    /// Stored event_hash does not match the recomputed digest
    #[error("Hash mismatch at event {0}")]
    HashMismatch(String),

    /// Event serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot compression or decompression failure
    #[error("Compression error: {0}")]
    Compression(String),

    /// Cold-tier disk I/O failure
    #[error("Cold storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
