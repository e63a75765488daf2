//! Error types for workflow net operations

use thiserror::Error;

/// Result type for net operations
pub type NetResult<T> = Result<T, NetError>;

/// Errors raised by net construction, marking arithmetic and firing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// Arc endpoints must connect a place and a transition
    #[error("Invalid arc {src} -> {target}: arcs must connect a place and a transition")]
    InvalidArc { src: String, target: String },

    /// Arc weight must be positive
    #[error("Invalid arc weight {weight} on {src} -> {target}")]
    InvalidWeight {
        src: String,
        target: String,
        weight: u32,
    },

    /// Marking does not hold enough tokens
    #[error("Cannot remove {requested} tokens from {place}: only {available} present")]
    InsufficientTokens {
        place: String,
        requested: u64,
        available: u64,
    },

    /// Attempt to fire a transition whose preset is not covered
    #[error("Transition {0} is not enabled")]
    NotEnabled(String),

    /// Transition id not present in the net
    #[error("Unknown transition {0}")]
    UnknownTransition(String),
}
