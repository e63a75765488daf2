//! Cancellation regions: reset-net semantics.
//!
//! Each task may declare the node ids that are reset when the task
//! cancels: tokens are removed from region places and active MI instances
//! of region tasks are terminated.

use crate::mi::MiTracker;
use kgflow_net::Marking;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Node ids reset when `task_id` cancels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRegion {
    pub task_id: String,
    pub nodes: BTreeSet<String>,
}

/// What a cancellation actually reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReport {
    pub tokens_removed: u64,
    pub places_reset: Vec<String>,
    pub instances_terminated: Vec<String>,
}

impl CancellationRegion {
    pub fn new(task_id: &str, nodes: impl IntoIterator<Item = String>) -> Self {
        Self {
            task_id: task_id.to_string(),
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Apply the reset: drain tokens from region places and terminate
    /// running instances of region tasks.
    pub fn apply(&self, marking: &Marking, mi: &mut MiTracker) -> (Marking, CancellationReport) {
        let mut next = marking.clone();
        let mut tokens_removed = 0;
        let mut places_reset = Vec::new();

        for node in &self.nodes {
            let count = next.get(node);
            if count > 0 {
                // Draining exactly what is present cannot fail
                if let Ok(drained) = next.remove(node, count) {
                    next = drained;
                    tokens_removed += count;
                    places_reset.push(node.clone());
                }
            }
        }

        let region_tasks: Vec<String> = self.nodes.iter().cloned().collect();
        let mut instances_terminated = Vec::new();
        for instance_id in mi.running_instances_of(&region_tasks) {
            if mi.terminate_instance(&instance_id) {
                instances_terminated.push(instance_id);
            }
        }

        info!(
            task_id = %self.task_id,
            tokens_removed,
            instances = instances_terminated.len(),
            "cancellation region applied"
        );
        (
            next,
            CancellationReport {
                tokens_removed,
                places_reset,
                instances_terminated,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::mi::MiVariant;

    #[test]
    fn apply_drains_region_tokens_only() {
        let region = CancellationRegion::new(
            "urn:task:cancelme",
            ["p1".to_string(), "p2".to_string()],
        );
        let marking = Marking::from([("p1", 2), ("p2", 1), ("outside", 3)]);
        let mut mi = MiTracker::new();

        let (next, report) = region.apply(&marking, &mut mi);
        assert_eq!(report.tokens_removed, 3);
        assert_eq!(next.get("p1"), 0);
        assert_eq!(next.get("p2"), 0);
        assert_eq!(next.get("outside"), 3);
    }

    #[test]
    fn apply_terminates_region_instances() {
        let mut mi = MiTracker::new();
        let spawn = mi
            .spawn(
                "urn:task:worker",
                &MiVariant::DesignTime { required: 2 },
                &ExecutionContext::new(),
            )
            .unwrap();

        let region =
            CancellationRegion::new("urn:task:boss", ["urn:task:worker".to_string()]);
        let (_, report) = region.apply(&Marking::empty(), &mut mi);

        assert_eq!(report.instances_terminated.len(), 2);
        // Terminated instances cannot complete afterwards
        assert!(!mi.mark_instance_complete(&spawn.instance_ids[0]));
    }

    #[test]
    fn empty_region_is_a_no_op() {
        let region = CancellationRegion::new("urn:task:t", []);
        let marking = Marking::from([("p", 1)]);
        let mut mi = MiTracker::new();
        let (next, report) = region.apply(&marking, &mut mi);
        assert_eq!(next, marking);
        assert_eq!(report.tokens_removed, 0);
    }
}
