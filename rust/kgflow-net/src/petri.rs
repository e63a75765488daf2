//! Petri net structure and marking arithmetic.
//!
//! A net is a bipartite graph of places and transitions joined by weighted
//! arcs. Markings are immutable token assignments; firing a transition
//! produces a new marking and never mutates the old one.

use crate::error::{NetError, NetResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;

/// A place (passive node) in the net
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_source: bool,
    #[serde(default)]
    pub is_sink: bool,
}

/// A transition (active node) in the net
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_silent: bool,
    #[serde(default)]
    pub guard: Option<String>,
}

/// A weighted arc between a place and a transition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arc {
    pub source: String,
    pub target: String,
    pub weight: u32,
}

/// Create a place, defaulting the display name to the id
pub fn create_place(id: &str, is_source: bool, is_sink: bool) -> Place {
    Place {
        id: id.to_string(),
        name: id.to_string(),
        is_source,
        is_sink,
    }
}

/// Create a transition, defaulting the display name to the id
pub fn create_transition(id: &str, name: &str) -> TransitionNode {
    TransitionNode {
        id: id.to_string(),
        name: if name.is_empty() { id } else { name }.to_string(),
        is_silent: false,
        guard: None,
    }
}

/// Create an arc with the default weight of 1
pub fn create_arc(source: &str, target: &str) -> Arc {
    Arc {
        source: source.to_string(),
        target: target.to_string(),
        weight: 1,
    }
}

/// Immutable token assignment: place id -> token count.
///
/// Places with zero tokens carry no entry, so two markings over the same
/// token distribution always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marking {
    tokens: BTreeMap<String, u64>,
}

impl Marking {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(tokens: BTreeMap<String, u64>) -> Self {
        let tokens = tokens.into_iter().filter(|(_, n)| *n > 0).collect();
        Self { tokens }
    }

    /// Tokens at a place; places outside the marking hold zero
    pub fn get(&self, place: &str) -> u64 {
        self.tokens.get(place).copied().unwrap_or(0)
    }

    /// New marking with `count` tokens added at `place`
    pub fn add(&self, place: &str, count: u64) -> Marking {
        if count == 0 {
            return self.clone();
        }
        let mut tokens = self.tokens.clone();
        *tokens.entry(place.to_string()).or_insert(0) += count;
        Marking { tokens }
    }

    /// New marking with `count` tokens removed at `place`.
    ///
    /// Removing the last token drops the place from the marking entirely.
    pub fn remove(&self, place: &str, count: u64) -> NetResult<Marking> {
        let available = self.get(place);
        if available < count {
            return Err(NetError::InsufficientTokens {
                place: place.to_string(),
                requested: count,
                available,
            });
        }
        let mut tokens = self.tokens.clone();
        if available == count {
            tokens.remove(place);
        } else if let Some(n) = tokens.get_mut(place) {
            *n -= count;
        }
        Ok(Marking { tokens })
    }

    pub fn places_with_tokens(&self) -> BTreeSet<String> {
        self.tokens.keys().cloned().collect()
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.tokens
    }

    /// True iff every component of `other` is covered by this marking
    pub fn covers(&self, other: &Marking) -> bool {
        other.tokens.iter().all(|(p, n)| self.get(p) >= *n)
    }
}

impl<const N: usize> From<[(&str, u64); N]> for Marking {
    fn from(pairs: [(&str, u64); N]) -> Self {
        Marking::from_map(pairs.iter().map(|(p, n)| (p.to_string(), *n)).collect())
    }
}

/// Immutable, append-only record of fired transitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringSequence {
    transitions: Vec<String>,
}

impl FiringSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, transition_id: &str) -> FiringSequence {
        let mut transitions = self.transitions.clone();
        transitions.push(transition_id.to_string());
        FiringSequence { transitions }
    }

    pub fn transitions(&self) -> &[String] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Petri net: places, transitions, weighted arcs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetriNet {
    pub name: String,
    places: Vec<Place>,
    transitions: Vec<TransitionNode>,
    arcs: Vec<Arc>,
}

impl PetriNet {
    /// Build a net, validating bipartite arc structure and positive weights
    pub fn new(
        places: Vec<Place>,
        transitions: Vec<TransitionNode>,
        arcs: Vec<Arc>,
        name: &str,
    ) -> NetResult<Self> {
        let place_ids: BTreeSet<&str> = places.iter().map(|p| p.id.as_str()).collect();
        let transition_ids: BTreeSet<&str> =
            transitions.iter().map(|t| t.id.as_str()).collect();

        for arc in &arcs {
            if arc.weight == 0 {
                return Err(NetError::InvalidWeight {
                    src: arc.source.clone(),
                    target: arc.target.clone(),
                    weight: arc.weight,
                });
            }
            let place_to_transition = place_ids.contains(arc.source.as_str())
                && transition_ids.contains(arc.target.as_str());
            let transition_to_place = transition_ids.contains(arc.source.as_str())
                && place_ids.contains(arc.target.as_str());
            if !place_to_transition && !transition_to_place {
                return Err(NetError::InvalidArc {
                    src: arc.source.clone(),
                    target: arc.target.clone(),
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            places,
            transitions,
            arcs,
        })
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn transitions(&self) -> &[TransitionNode] {
        &self.transitions
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn get_place(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    pub fn get_transition(&self, id: &str) -> Option<&TransitionNode> {
        self.transitions.iter().find(|t| t.id == id)
    }

    /// Nodes with an arc into `node_id`
    pub fn preset(&self, node_id: &str) -> BTreeSet<String> {
        self.arcs
            .iter()
            .filter(|a| a.target == node_id)
            .map(|a| a.source.clone())
            .collect()
    }

    /// Nodes with an arc out of `node_id`
    pub fn postset(&self, node_id: &str) -> BTreeSet<String> {
        self.arcs
            .iter()
            .filter(|a| a.source == node_id)
            .map(|a| a.target.clone())
            .collect()
    }

    pub fn input_arcs(&self, transition_id: &str) -> Vec<&Arc> {
        self.arcs
            .iter()
            .filter(|a| a.target == transition_id)
            .collect()
    }

    pub fn output_arcs(&self, transition_id: &str) -> Vec<&Arc> {
        self.arcs
            .iter()
            .filter(|a| a.source == transition_id)
            .collect()
    }

    /// A transition is enabled iff every input place covers its arc weight
    pub fn is_enabled(&self, transition_id: &str, marking: &Marking) -> bool {
        self.input_arcs(transition_id)
            .iter()
            .all(|arc| marking.get(&arc.source) >= arc.weight as u64)
    }

    /// Ids of all transitions enabled under `marking`
    pub fn enabled_transitions(&self, marking: &Marking) -> BTreeSet<String> {
        self.transitions
            .iter()
            .filter(|t| self.is_enabled(&t.id, marking))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Fire `transition_id`, consuming input-arc weights and producing
    /// output-arc weights. Fails with `NotEnabled` without touching the
    /// marking when the preset is not covered.
    pub fn fire(&self, transition_id: &str, marking: &Marking) -> NetResult<Marking> {
        if self.get_transition(transition_id).is_none() {
            return Err(NetError::UnknownTransition(transition_id.to_string()));
        }
        if !self.is_enabled(transition_id, marking) {
            return Err(NetError::NotEnabled(transition_id.to_string()));
        }

        let mut next = marking.clone();
        for arc in self.input_arcs(transition_id) {
            next = next.remove(&arc.source, arc.weight as u64)?;
        }
        for arc in self.output_arcs(transition_id) {
            next = next.add(&arc.target, arc.weight as u64);
        }
        Ok(next)
    }
}

/// Petri net with a unique source place and at least one sink place,
/// where every node lies on a path from source to sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowNet {
    net: PetriNet,
}

impl WorkflowNet {
    pub fn new(net: PetriNet) -> Self {
        Self { net }
    }

    pub fn source_place(&self) -> Option<&Place> {
        self.net.places.iter().find(|p| p.is_source)
    }

    pub fn sink_places(&self) -> Vec<&Place> {
        self.net.places.iter().filter(|p| p.is_sink).collect()
    }

    /// One token in the unique source place, nothing elsewhere
    pub fn initial_marking(&self) -> Marking {
        match self.source_place() {
            Some(source) => Marking::empty().add(&source.id, 1),
            None => Marking::empty(),
        }
    }

    /// One token in each sink place
    pub fn final_marking(&self) -> Marking {
        self.sink_places()
            .iter()
            .fold(Marking::empty(), |m, sink| m.add(&sink.id, 1))
    }

    /// Structural workflow-net check: exactly one source, at least one
    /// sink, and every node on some source-to-sink path.
    pub fn is_proper_wf_net(&self) -> (bool, String) {
        let sources: Vec<&Place> = self.net.places.iter().filter(|p| p.is_source).collect();
        if sources.len() != 1 {
            return (
                false,
                format!("Expected exactly one source place, found {}", sources.len()),
            );
        }
        let sinks = self.sink_places();
        if sinks.is_empty() {
            return (false, "No sink place marked".to_string());
        }

        let forward = self.reachable_from(&sources[0].id, false);
        let backward: BTreeSet<String> = sinks
            .iter()
            .flat_map(|s| self.reachable_from(&s.id, true))
            .collect();

        for node in self
            .net
            .places
            .iter()
            .map(|p| p.id.clone())
            .chain(self.net.transitions.iter().map(|t| t.id.clone()))
        {
            if !forward.contains(&node) || !backward.contains(&node) {
                return (
                    false,
                    format!("Node {} is not on a source-to-sink path", node),
                );
            }
        }

        (true, "Valid workflow net".to_string())
    }

    fn reachable_from(&self, start: &str, reverse: bool) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue = vec![start.to_string()];
        while let Some(node) = queue.pop() {
            if !seen.insert(node.clone()) {
                continue;
            }
            let next = if reverse {
                self.net.preset(&node)
            } else {
                self.net.postset(&node)
            };
            queue.extend(next);
        }
        seen
    }
}

impl Deref for WorkflowNet {
    type Target = PetriNet;

    fn deref(&self) -> &PetriNet {
        &self.net
    }
}

/// Build a workflow net from parts, validating arc structure
pub fn create_workflow_net(
    places: Vec<Place>,
    transitions: Vec<TransitionNode>,
    arcs: Vec<Arc>,
    name: &str,
) -> NetResult<WorkflowNet> {
    Ok(WorkflowNet::new(PetriNet::new(
        places,
        transitions,
        arcs,
        name,
    )?))
}
