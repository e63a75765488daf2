//! Error types for pattern execution

use thiserror::Error;

/// Result type for pattern operations
pub type PatternResult<T> = Result<T, PatternError>;

/// Errors raised by pattern execution
#[derive(Error, Debug)]
pub enum PatternError {
    /// Underlying net refused the operation
    #[error(transparent)]
    Net(#[from] kgflow_net::NetError),

    /// Temporal store refused the append
    #[error(transparent)]
    Temporal(#[from] kgflow_temporal::TemporalError),

    /// Hook engine failure
    #[error(transparent)]
    Hooks(#[from] kgflow_unrdf::UnrdfError),

    /// XOR split with every guard false and no default branch
    #[error("No branch matched for task {0}")]
    NoBranchMatched(String),

    /// OR split where no guard held
    #[error("OR split on task {0} selected no branches")]
    NoBranchesSelected(String),

    /// Context variable required by a pattern is missing or mistyped
    #[error("Context variable '{0}' missing or not usable")]
    MissingVariable(String),

    /// MI spawn with a non-positive instance count
    #[error("Instance count must be positive, got {0}")]
    InvalidInstanceCount(i64),

    /// Recursion push past the configured bound
    #[error("Max recursion depth {0} exceeded")]
    MaxRecursionExceeded(usize),

    /// A PRE_TRANSACTION hook rejected the tick
    #[error("Tick rejected: {0}")]
    Rejected(String),
}
