//! Vector clocks for cross-workflow partial ordering.
//!
//! Merge is component-wise max; two clocks are concurrent when neither
//! happened before the other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping of actor id to a monotonically increasing counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorClock {
    clocks: BTreeMap<String, u64>,
}

impl VectorClock {
    /// Single-actor clock starting at zero
    pub fn zero(actor: &str) -> Self {
        Self {
            clocks: BTreeMap::from([(actor.to_string(), 0)]),
        }
    }

    pub fn from_map(clocks: BTreeMap<String, u64>) -> Self {
        Self { clocks }
    }

    pub fn get(&self, actor: &str) -> u64 {
        self.clocks.get(actor).copied().unwrap_or(0)
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.clocks
    }

    /// New clock with `actor`'s component incremented, all others unchanged
    pub fn increment(&self, actor: &str) -> VectorClock {
        let mut clocks = self.clocks.clone();
        *clocks.entry(actor.to_string()).or_insert(0) += 1;
        VectorClock { clocks }
    }

    /// Component-wise maximum; commutative, associative, idempotent
    pub fn merge(&self, other: &VectorClock) -> VectorClock {
        let mut clocks = self.clocks.clone();
        for (actor, counter) in &other.clocks {
            let entry = clocks.entry(actor.clone()).or_insert(0);
            *entry = (*entry).max(*counter);
        }
        VectorClock { clocks }
    }

    /// Strict partial order: every component <= and at least one <
    pub fn happens_before(&self, other: &VectorClock) -> bool {
        let actors: std::collections::BTreeSet<&String> =
            self.clocks.keys().chain(other.clocks.keys()).collect();

        let mut strictly_less = false;
        for actor in actors {
            let mine = self.get(actor);
            let theirs = other.get(actor);
            if mine > theirs {
                return false;
            }
            if mine < theirs {
                strictly_less = true;
            }
        }
        strictly_less
    }

    /// Neither clock ordered before the other
    pub fn concurrent_with(&self, other: &VectorClock) -> bool {
        !self.happens_before(other) && !other.happens_before(self)
    }
}
