//! Split and join routing over a net and marking.
//!
//! AND splits and joins ride directly on transition firing semantics; the
//! guarded variants (XOR, OR, deferred choice) route tokens between places
//! according to guard evaluation over the execution context.

use crate::context::ExecutionContext;
use crate::error::{PatternError, PatternResult};
use kgflow_net::{Marking, PetriNet};
use serde::{Deserialize, Serialize};

/// One guarded output branch of a split. A branch without a guard is
/// always eligible; the branch whose guard is the literal `default` only
/// fires when nothing else matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardedBranch {
    pub target_place: String,
    #[serde(default)]
    pub guard: Option<String>,
}

impl GuardedBranch {
    pub fn new(target_place: &str, guard: Option<&str>) -> Self {
        Self {
            target_place: target_place.to_string(),
            guard: guard.map(str::to_string),
        }
    }

    fn is_default(&self) -> bool {
        matches!(self.guard.as_deref(), None | Some("default"))
    }

    fn holds(&self, ctx: &ExecutionContext) -> bool {
        match self.guard.as_deref() {
            None | Some("default") => false,
            Some(guard) => ctx.guard_holds(guard),
        }
    }
}

/// AND-split: firing the transition places one token in every postset place
#[derive(Debug, Clone)]
pub struct AndSplit {
    pub transition_id: String,
}

impl AndSplit {
    pub fn new(transition_id: &str) -> Self {
        Self {
            transition_id: transition_id.to_string(),
        }
    }

    pub fn fire(&self, net: &PetriNet, marking: &Marking) -> PatternResult<Marking> {
        Ok(net.fire(&self.transition_id, marking)?)
    }

    pub fn branch_places(&self, net: &PetriNet) -> Vec<String> {
        net.postset(&self.transition_id).into_iter().collect()
    }
}

/// AND-join: enabled only when every input place covers its arc weight;
/// firing consumes from each
#[derive(Debug, Clone)]
pub struct AndJoin {
    pub transition_id: String,
}

impl AndJoin {
    pub fn new(transition_id: &str) -> Self {
        Self {
            transition_id: transition_id.to_string(),
        }
    }

    pub fn is_ready(&self, net: &PetriNet, marking: &Marking) -> bool {
        net.is_enabled(&self.transition_id, marking)
    }

    pub fn fire(&self, net: &PetriNet, marking: &Marking) -> PatternResult<Marking> {
        Ok(net.fire(&self.transition_id, marking)?)
    }
}

/// XOR-split: guards evaluated in declared order, first true wins; the
/// declared default branch fires when every guard is false.
#[derive(Debug, Clone)]
pub struct XorSplit {
    pub task_id: String,
    pub input_place: String,
    pub branches: Vec<GuardedBranch>,
}

impl XorSplit {
    pub fn new(task_id: &str, input_place: &str, branches: Vec<GuardedBranch>) -> Self {
        Self {
            task_id: task_id.to_string(),
            input_place: input_place.to_string(),
            branches,
        }
    }

    /// Route one token from the input place to exactly one branch.
    /// Returns the new marking and the chosen place.
    pub fn fire(
        &self,
        marking: &Marking,
        ctx: &ExecutionContext,
    ) -> PatternResult<(Marking, String)> {
        let chosen = self
            .branches
            .iter()
            .find(|b| b.holds(ctx))
            .or_else(|| self.branches.iter().find(|b| b.is_default()))
            .ok_or_else(|| PatternError::NoBranchMatched(self.task_id.clone()))?;

        let next = marking
            .remove(&self.input_place, 1)?
            .add(&chosen.target_place, 1);
        Ok((next, chosen.target_place.clone()))
    }
}

/// XOR-join: fires on any single input branch carrying a token
#[derive(Debug, Clone)]
pub struct XorJoin {
    pub input_places: Vec<String>,
    pub output_place: String,
}

impl XorJoin {
    pub fn new(input_places: Vec<String>, output_place: &str) -> Self {
        Self {
            input_places,
            output_place: output_place.to_string(),
        }
    }

    pub fn is_ready(&self, marking: &Marking) -> bool {
        self.input_places.iter().any(|p| marking.get(p) >= 1)
    }

    /// Consume one token from the first populated input
    pub fn fire(&self, marking: &Marking) -> PatternResult<(Marking, String)> {
        let source = self
            .input_places
            .iter()
            .find(|p| marking.get(p) >= 1)
            .ok_or_else(|| {
                PatternError::Net(kgflow_net::NetError::NotEnabled("xor-join".to_string()))
            })?;
        let next = marking.remove(source, 1)?.add(&self.output_place, 1);
        Ok((next, source.clone()))
    }
}

/// OR-split: every branch with an individually true guard receives a
/// token; at least one must hold.
#[derive(Debug, Clone)]
pub struct OrSplit {
    pub task_id: String,
    pub input_place: String,
    pub branches: Vec<GuardedBranch>,
}

impl OrSplit {
    pub fn new(task_id: &str, input_place: &str, branches: Vec<GuardedBranch>) -> Self {
        Self {
            task_id: task_id.to_string(),
            input_place: input_place.to_string(),
            branches,
        }
    }

    pub fn fire(
        &self,
        marking: &Marking,
        ctx: &ExecutionContext,
    ) -> PatternResult<(Marking, Vec<String>)> {
        let selected: Vec<&GuardedBranch> =
            self.branches.iter().filter(|b| b.holds(ctx)).collect();
        if selected.is_empty() {
            return Err(PatternError::NoBranchesSelected(self.task_id.clone()));
        }

        let mut next = marking.remove(&self.input_place, 1)?;
        let mut places = Vec::with_capacity(selected.len());
        for branch in selected {
            next = next.add(&branch.target_place, 1);
            places.push(branch.target_place.clone());
        }
        Ok((next, places))
    }
}

/// Deferred choice: several transitions share an input place and the
/// first one the environment enables wins. From the engine's view the
/// pick is whichever candidate is offered first.
#[derive(Debug, Clone)]
pub struct DeferredChoice {
    pub candidate_transitions: Vec<String>,
}

impl DeferredChoice {
    pub fn new(candidate_transitions: Vec<String>) -> Self {
        Self {
            candidate_transitions,
        }
    }

    /// Resolve the race for `winner`: fires it, which consumes the shared
    /// token and thereby withdraws the offer from every rival.
    pub fn resolve(
        &self,
        net: &PetriNet,
        marking: &Marking,
        winner: &str,
    ) -> PatternResult<Marking> {
        if !self.candidate_transitions.iter().any(|t| t == winner) {
            return Err(PatternError::Net(kgflow_net::NetError::UnknownTransition(
                winner.to_string(),
            )));
        }
        Ok(net.fire(winner, marking)?)
    }

    /// Candidates still enabled under the marking, in declared order
    pub fn offers<'a>(&'a self, net: &PetriNet, marking: &Marking) -> Vec<&'a str> {
        self.candidate_transitions
            .iter()
            .filter(|t| net.is_enabled(t, marking))
            .map(String::as_str)
            .collect()
    }
}
