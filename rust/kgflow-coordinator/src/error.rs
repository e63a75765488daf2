//! Error types for event coordination

use thiserror::Error;

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Errors raised by publishing and correlation tracking
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Subscription {0} not found")]
    SubscriptionNotFound(String),

    #[error("Timed out waiting for correlation {correlation_id}: saw {seen} of {expected}")]
    CorrelationTimeout {
        correlation_id: String,
        expected: usize,
        seen: usize,
    },
}
