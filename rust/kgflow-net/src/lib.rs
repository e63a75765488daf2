// rust/kgflow-net/src/lib.rs
// Workflow net model: Petri net structure, marking arithmetic, soundness analysis

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod error;
pub mod petri;
pub mod soundness;

pub use error::{NetError, NetResult};
pub use petri::{
    create_arc, create_place, create_transition, create_workflow_net, Arc, FiringSequence,
    Marking, PetriNet, Place, TransitionNode, WorkflowNet,
};
pub use soundness::{
    CoverabilityAnalyzer, SoundnessResult, SoundnessVerifier, SoundnessViolation,
};
