//! Workflow events and the per-workflow hash chain.
//!
//! Every event is sealed at creation with a SHA-256 digest over the
//! canonical serialization of all fields except the digest itself. Map
//! keys are ordered lexicographically and timestamps use a fixed RFC 3339
//! UTC form, so the hash is deterministic across processes.

use crate::clock::VectorClock;
use crate::error::{TemporalError, TemporalResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Genesis sentinel for the first event of a workflow
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// The eleven observable event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    StatusChange,
    TokenMove,
    Split,
    Join,
    Cancellation,
    MiSpawn,
    MiComplete,
    HookExecution,
    Validation,
    TickStart,
    TickEnd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StatusChange => "STATUS_CHANGE",
            EventKind::TokenMove => "TOKEN_MOVE",
            EventKind::Split => "SPLIT",
            EventKind::Join => "JOIN",
            EventKind::Cancellation => "CANCELLATION",
            EventKind::MiSpawn => "MI_SPAWN",
            EventKind::MiComplete => "MI_COMPLETE",
            EventKind::HookExecution => "HOOK_EXECUTION",
            EventKind::Validation => "VALIDATION",
            EventKind::TickStart => "TICK_START",
            EventKind::TickEnd => "TICK_END",
        }
    }
}

/// Immutable workflow event with causal metadata and chain linkage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_id: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub tick_number: u64,
    pub workflow_id: String,
    pub payload: Value,
    pub caused_by: Vec<String>,
    pub vector_clock: VectorClock,
    pub previous_hash: String,
    pub event_hash: String,
}

impl WorkflowEvent {
    /// Create and seal a new event: generates the id, stamps the current
    /// time and computes the hash.
    pub fn record(
        kind: EventKind,
        workflow_id: &str,
        tick_number: u64,
        payload: Value,
        caused_by: Vec<String>,
        vector_clock: VectorClock,
        previous_hash: &str,
    ) -> Self {
        let mut event = Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
            tick_number,
            workflow_id: workflow_id.to_string(),
            payload,
            caused_by,
            vector_clock,
            previous_hash: previous_hash.to_string(),
            event_hash: String::new(),
        };
        event.event_hash = event.compute_hash();
        event
    }

    /// Deterministic digest over every field except `event_hash`
    pub fn compute_hash(&self) -> String {
        // serde_json's default map is BTree-backed, so object keys come out
        // lexicographically ordered
        let canonical = json!({
            "caused_by": self.caused_by,
            "event_id": self.event_id,
            "kind": self.kind.as_str(),
            "payload": self.payload,
            "previous_hash": self.previous_hash,
            "tick_number": self.tick_number,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, false),
            "vector_clock": self.vector_clock.as_map(),
            "workflow_id": self.workflow_id,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Ordered, tamper-evident sequence of events for a single workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventChain {
    pub workflow_id: String,
    events: Vec<WorkflowEvent>,
}

impl EventChain {
    pub fn new(workflow_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            events: Vec::new(),
        }
    }

    pub fn genesis_hash(&self) -> &'static str {
        GENESIS_HASH
    }

    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn tail_hash(&self) -> &str {
        self.events
            .last()
            .map(|e| e.event_hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    /// Append an event, returning a new chain. Fails with
    /// `WorkflowMismatch` or `BrokenLink`; the original chain is untouched.
    pub fn append(&self, event: WorkflowEvent) -> TemporalResult<EventChain> {
        if event.workflow_id != self.workflow_id {
            return Err(TemporalError::WorkflowMismatch {
                expected: self.workflow_id.clone(),
                actual: event.workflow_id,
            });
        }
        if event.previous_hash != self.tail_hash() {
            return Err(TemporalError::BrokenLink {
                event_id: event.event_id,
                expected: self.tail_hash().to_string(),
                actual: event.previous_hash,
            });
        }

        let mut events = self.events.clone();
        events.push(event);
        Ok(EventChain {
            workflow_id: self.workflow_id.clone(),
            events,
        })
    }

    /// Re-derive every link and digest. Returns `(true, "")` for an intact
    /// chain, otherwise `(false, reason)` naming the first offending event.
    pub fn verify(&self) -> (bool, String) {
        let mut expected_previous = GENESIS_HASH.to_string();
        for event in &self.events {
            if event.previous_hash != expected_previous {
                return (
                    false,
                    format!(
                        "previous_hash of event {} doesn't match chain tail: expected {}, got {}",
                        event.event_id, expected_previous, event.previous_hash
                    ),
                );
            }
            let recomputed = event.compute_hash();
            if recomputed != event.event_hash {
                return (
                    false,
                    format!("hash mismatch at event {}", event.event_id),
                );
            }
            expected_previous = event.event_hash.clone();
        }
        (true, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(workflow_id: &str, tick: u64, previous_hash: &str) -> WorkflowEvent {
        WorkflowEvent::record(
            EventKind::StatusChange,
            workflow_id,
            tick,
            json!({"status": "running"}),
            vec![],
            VectorClock::zero("test"),
            previous_hash,
        )
    }

    #[test]
    fn record_generates_id_and_hash() {
        let e = event("wf-1", 1, GENESIS_HASH);
        assert!(!e.event_id.is_empty());
        assert_eq!(e.event_hash.len(), 64);
        assert_eq!(e.event_hash, e.compute_hash());
    }

    #[test]
    fn hash_is_deterministic() {
        let e = event("wf-1", 5, GENESIS_HASH);
        assert_eq!(e.compute_hash(), e.compute_hash());
    }

    #[test]
    fn hash_changes_with_payload() {
        let e1 = event("wf-1", 5, GENESIS_HASH);
        let mut e2 = e1.clone();
        e2.payload = json!({"status": "completed"});
        assert_ne!(e1.compute_hash(), e2.compute_hash());
    }

    #[test]
    fn append_creates_new_chain() {
        let chain = EventChain::new("wf-1");
        let e = event("wf-1", 1, chain.tail_hash());
        let chain2 = chain.append(e.clone()).unwrap();

        assert!(chain.is_empty());
        assert_eq!(chain2.len(), 1);
        assert_eq!(chain2.events()[0], e);
    }

    #[test]
    fn append_rejects_wrong_workflow() {
        let chain = EventChain::new("wf-1");
        let e = event("wf-2", 1, chain.tail_hash());
        assert!(matches!(
            chain.append(e),
            Err(TemporalError::WorkflowMismatch { .. })
        ));
    }

    #[test]
    fn append_rejects_broken_link() {
        let chain = EventChain::new("wf-1");
        let e = event("wf-1", 1, "wrong_hash");
        assert!(matches!(
            chain.append(e),
            Err(TemporalError::BrokenLink { .. })
        ));
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn verify_detects_payload_tampering() {
        let chain = EventChain::new("wf-1");
        let e1 = event("wf-1", 1, chain.tail_hash());
        let chain = chain.append(e1.clone()).unwrap();
        let e2 = event("wf-1", 2, &e1.event_hash);
        let chain = chain.append(e2.clone()).unwrap();

        let (ok, reason) = chain.verify();
        assert!(ok, "{reason}");

        let mut tampered = e1.clone();
        tampered.payload = json!({"tampered": true});
        let mut tampered_chain = EventChain::new("wf-1");
        tampered_chain = tampered_chain.append(tampered).unwrap();
        // Force the second event in behind the verifier's back
        let broken = EventChain {
            workflow_id: "wf-1".to_string(),
            events: vec![tampered_chain.events()[0].clone(), e2],
        };

        let (ok, reason) = broken.verify();
        assert!(!ok);
        assert!(reason.contains("mismatch") || reason.contains("doesn't match"));
    }
}
