// rust/kgflow-patterns/src/lib.rs
// Control-flow patterns over workflow nets: splits, joins, MI, loops,
// recursion, cancellation regions, and the tick-loop executor

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cancellation;
pub mod context;
pub mod error;
pub mod executor;
pub mod loops;
pub mod mi;
pub mod recursion;
pub mod splits;

pub use cancellation::{CancellationRegion, CancellationReport};
pub use context::{ExecutionContext, ExecutionResult};
pub use error::{PatternError, PatternResult};
pub use executor::{TickResult, WorkflowExecutor};
pub use loops::{LoopKind, LoopOutcome, LoopState, StructuredLoop};
pub use mi::{InstanceState, MiSpawn, MiTracker, MiVariant};
pub use recursion::{RecursionFrame, RecursionManager};
pub use splits::{
    AndJoin, AndSplit, DeferredChoice, GuardedBranch, OrSplit, XorJoin, XorSplit,
};
