// rust/kgflow-temporal/src/lib.rs
// Temporal event store: hash-chained events, vector clocks, tiered storage

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod clock;
pub mod error;
pub mod event;
pub mod slice;
pub mod store;

pub use clock::VectorClock;
pub use error::{TemporalError, TemporalResult};
pub use event::{EventChain, EventKind, WorkflowEvent, GENESIS_HASH};
pub use slice::TemporalSlice;
pub use store::{
    AppendResult, CompactionPolicy, RangeQuery, RangeResult, Snapshot, TierStats,
    TieredEventStore,
};
