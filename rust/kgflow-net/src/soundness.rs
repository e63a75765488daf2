//! Soundness verification for workflow nets.
//!
//! Implements van der Aalst's three criteria over the reachability graph:
//! option to complete, proper completion, no dead transitions. Exploration
//! is bounded by `max_markings` so verification always terminates, even on
//! unbounded nets.

use crate::error::NetResult;
use crate::petri::{Marking, WorkflowNet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Soundness criterion violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SoundnessViolation {
    /// The final marking is not reachable from every reachable marking
    UnreachableSink,
    /// A marking with tokens in a sink plus tokens elsewhere is reachable
    ImproperCompletion,
    /// A transition is never enabled in any reachable marking
    DeadTransition,
}

/// Outcome of a soundness verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundnessResult {
    pub is_sound: bool,
    pub violations: BTreeSet<SoundnessViolation>,
    pub reachable_markings: usize,
    pub dead_transitions: BTreeSet<String>,
    pub deadlock_markings: Vec<Marking>,
    /// True when exploration stopped at the marking bound
    pub truncated: bool,
}

/// Bounded reachability-graph explorer for workflow nets
#[derive(Debug, Clone)]
pub struct SoundnessVerifier {
    pub max_markings: usize,
}

impl Default for SoundnessVerifier {
    fn default() -> Self {
        Self {
            max_markings: 10_000,
        }
    }
}

struct ReachabilityGraph {
    markings: Vec<Marking>,
    index: HashMap<Marking, usize>,
    successors: Vec<Vec<usize>>,
    truncated: bool,
}

impl SoundnessVerifier {
    pub fn new(max_markings: usize) -> Self {
        Self { max_markings }
    }

    /// Verify the three soundness criteria for `net`
    pub fn verify(&self, net: &WorkflowNet) -> SoundnessResult {
        let initial = net.initial_marking();
        let final_marking = net.final_marking();
        let graph = self.explore(net, &initial);

        let mut violations = BTreeSet::new();
        let mut deadlock_markings = Vec::new();

        // Dead transitions: never enabled anywhere in the graph
        let mut dead_transitions: BTreeSet<String> = net
            .transitions()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        for marking in &graph.markings {
            for enabled in net.enabled_transitions(marking) {
                dead_transitions.remove(&enabled);
            }
        }
        if !dead_transitions.is_empty() {
            violations.insert(SoundnessViolation::DeadTransition);
        }

        // Option to complete: every reachable marking can still reach the
        // final marking. Computed by reverse reachability from the final
        // marking over the explored graph.
        let final_idx = graph.index.get(&final_marking).copied();
        let can_complete = match final_idx {
            Some(idx) => reverse_reachable(&graph.successors, idx),
            None => HashSet::new(),
        };
        for (idx, marking) in graph.markings.iter().enumerate() {
            let terminal = graph.successors[idx].is_empty();
            if terminal && *marking != final_marking {
                deadlock_markings.push(marking.clone());
            }
            if !can_complete.contains(&idx) {
                violations.insert(SoundnessViolation::UnreachableSink);
            }
        }

        // Proper completion: any reachable marking that covers a sink token
        // must be exactly the final marking.
        let sink_ids: Vec<String> = net.sink_places().iter().map(|p| p.id.clone()).collect();
        for marking in &graph.markings {
            let has_sink_token = sink_ids.iter().any(|s| marking.get(s) >= 1);
            if has_sink_token && *marking != final_marking {
                violations.insert(SoundnessViolation::ImproperCompletion);
            }
        }

        let is_sound = violations.is_empty() && !graph.truncated;
        debug!(
            net = %net.name,
            reachable = graph.markings.len(),
            sound = is_sound,
            "soundness verification finished"
        );

        SoundnessResult {
            is_sound,
            violations,
            reachable_markings: graph.markings.len(),
            dead_transitions,
            deadlock_markings,
            truncated: graph.truncated,
        }
    }

    /// Shortest transition sequence from the initial to the final marking,
    /// or None when completion is unreachable.
    pub fn find_firing_sequence_to_final(&self, net: &WorkflowNet) -> Option<Vec<String>> {
        let initial = net.initial_marking();
        let final_marking = net.final_marking();

        let mut seen: HashSet<Marking> = HashSet::new();
        let mut queue: VecDeque<(Marking, Vec<String>)> = VecDeque::new();
        seen.insert(initial.clone());
        queue.push_back((initial, Vec::new()));

        while let Some((marking, path)) = queue.pop_front() {
            if marking == final_marking {
                return Some(path);
            }
            if seen.len() >= self.max_markings {
                return None;
            }
            for transition in net.enabled_transitions(&marking) {
                if let Ok(next) = net.fire(&transition, &marking) {
                    if seen.insert(next.clone()) {
                        let mut next_path = path.clone();
                        next_path.push(transition);
                        queue.push_back((next, next_path));
                    }
                }
            }
        }
        None
    }

    fn explore(&self, net: &WorkflowNet, initial: &Marking) -> ReachabilityGraph {
        let mut graph = ReachabilityGraph {
            markings: vec![initial.clone()],
            index: HashMap::from([(initial.clone(), 0)]),
            successors: vec![Vec::new()],
            truncated: false,
        };

        let mut queue = VecDeque::from([0usize]);
        while let Some(idx) = queue.pop_front() {
            let marking = graph.markings[idx].clone();
            for transition in net.enabled_transitions(&marking) {
                let next = match net.fire(&transition, &marking) {
                    Ok(next) => next,
                    Err(_) => continue,
                };
                let next_idx = match graph.index.get(&next) {
                    Some(existing) => *existing,
                    None => {
                        if graph.markings.len() >= self.max_markings {
                            graph.truncated = true;
                            continue;
                        }
                        let new_idx = graph.markings.len();
                        graph.markings.push(next.clone());
                        graph.index.insert(next, new_idx);
                        graph.successors.push(Vec::new());
                        queue.push_back(new_idx);
                        new_idx
                    }
                };
                graph.successors[idx].push(next_idx);
            }
        }
        graph
    }
}

fn reverse_reachable(successors: &[Vec<usize>], target: usize) -> HashSet<usize> {
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); successors.len()];
    for (from, outs) in successors.iter().enumerate() {
        for to in outs {
            predecessors[*to].push(from);
        }
    }
    let mut seen = HashSet::from([target]);
    let mut queue = VecDeque::from([target]);
    while let Some(idx) = queue.pop_front() {
        for pred in &predecessors[idx] {
            if seen.insert(*pred) {
                queue.push_back(*pred);
            }
        }
    }
    seen
}

/// Boundedness analysis over reachable markings
#[derive(Debug, Clone)]
pub struct CoverabilityAnalyzer {
    pub max_markings: usize,
}

impl Default for CoverabilityAnalyzer {
    fn default() -> Self {
        Self {
            max_markings: 10_000,
        }
    }
}

impl CoverabilityAnalyzer {
    pub fn new(max_markings: usize) -> Self {
        Self { max_markings }
    }

    /// Returns whether every reachable marking keeps each place below some
    /// finite bound `k`, and the bound observed. Unboundedness is detected
    /// by a marking strictly covering one of its ancestors.
    pub fn is_bounded(&self, net: &WorkflowNet) -> NetResult<(bool, u64)> {
        let initial = net.initial_marking();
        let mut max_tokens = initial.as_map().values().copied().max().unwrap_or(0);
        let mut visited: HashSet<Marking> = HashSet::new();

        // DFS with an explicit ancestor stack for dominance checks
        let mut stack: Vec<(Marking, Vec<Marking>)> = vec![(initial, Vec::new())];
        while let Some((marking, ancestors)) = stack.pop() {
            if !visited.insert(marking.clone()) {
                continue;
            }
            if visited.len() > self.max_markings {
                return Ok((false, max_tokens));
            }
            max_tokens = max_tokens.max(marking.as_map().values().copied().max().unwrap_or(0));

            for transition in net.enabled_transitions(&marking) {
                let next = net.fire(&transition, &marking)?;
                if ancestors
                    .iter()
                    .chain(std::iter::once(&marking))
                    .any(|a| next.covers(a) && next != *a)
                {
                    return Ok((false, max_tokens));
                }
                let mut next_ancestors = ancestors.clone();
                next_ancestors.push(marking.clone());
                stack.push((next, next_ancestors));
            }
        }
        Ok((true, max_tokens))
    }
}
