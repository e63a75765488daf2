//! Error types for the unrdf engine

use crate::poka_yoke::PokaYokeViolation;
use thiserror::Error;

/// Result type for unrdf operations
pub type UnrdfResult<T> = Result<T, UnrdfError>;

/// Errors raised by the store port, conditions, hooks and transactions
#[derive(Error, Debug)]
pub enum UnrdfError {
    /// Shape or invariant violation at a boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// A safety gate refused or gated the operation
    #[error("Poka-yoke {}: {}", .0.id, .0.message)]
    PokaYoke(PokaYokeViolation),

    /// Hook id not registered
    #[error("Hook {0} not found")]
    HookNotFound(String),

    /// Condition or external call exceeded its deadline
    #[error("Operation timed out")]
    Timeout,

    /// File reference failed its SHA-256 integrity check
    #[error("Integrity error for {uri}: expected sha256 {expected}, got {actual}")]
    Integrity {
        uri: String,
        expected: String,
        actual: String,
    },

    /// A hook rejected the transaction
    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    /// Transaction already committed or rolled back
    #[error("Transaction {0} is finalized and cannot be modified")]
    TransactionFinalized(String),

    /// Query text the store adapter cannot evaluate
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Store backend failure
    #[error("Store error: {0}")]
    Store(String),

    /// Registry persistence failure
    #[error("Registry persistence error: {0}")]
    Persistence(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// File resolution I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for UnrdfError {
    fn from(err: sled::Error) -> Self {
        UnrdfError::Persistence(err.to_string())
    }
}

impl From<::config::ConfigError> for UnrdfError {
    fn from(err: ::config::ConfigError) -> Self {
        UnrdfError::Config(err.to_string())
    }
}
