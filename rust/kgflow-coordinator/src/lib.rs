// rust/kgflow-coordinator/src/lib.rs
// Cross-workflow coordination over an opaque pub/sub broker

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod coordinator;
pub mod error;
pub mod message;

pub use coordinator::{EventCoordinator, InMemoryCoordinator, Subscription};
pub use error::{CoordinatorError, CoordinatorResult};
pub use message::BrokerEvent;
