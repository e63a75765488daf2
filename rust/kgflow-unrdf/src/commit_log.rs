//! Per-tick commit log records for external replication

use serde::{Deserialize, Serialize};

/// Everything an external replica needs to mirror one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitLogRecord {
    pub tick_number: u64,
    /// Seconds since the epoch
    pub timestamp: f64,
    pub workflow_id: String,
    pub events_appended: Vec<String>,
    pub triples_added: u64,
    pub triples_removed: u64,
    pub rules_fired: u64,
    pub duration_ms: f64,
    pub converged: bool,
}

impl CommitLogRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let record = CommitLogRecord {
            tick_number: 7,
            timestamp: 1_700_000_000.5,
            workflow_id: "wf-1".to_string(),
            events_appended: vec!["evt-1".to_string(), "evt-2".to_string()],
            triples_added: 3,
            triples_removed: 1,
            rules_fired: 2,
            duration_ms: 12.25,
            converged: false,
        };
        let json = record.to_json().unwrap();
        let back: CommitLogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
