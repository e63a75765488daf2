//! Transactions: staged triple deltas with provenance

use crate::model::HookReceipt;
use crate::store::Triple;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who/when/why metadata attached to committed triples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
}

impl ProvenanceRecord {
    pub fn new(agent: &str, reason: Option<&str>) -> Self {
        Self {
            agent: agent.to_string(),
            timestamp: Utc::now(),
            reason: reason.map(str::to_string),
            source: None,
            activity: None,
        }
    }

    /// Serialize as prov: triples
    pub fn to_rdf(&self, subject: &str) -> String {
        let mut out = format!(
            "@prefix prov: <http://www.w3.org/ns/prov#> .\n\n<{subject}> prov:wasAttributedTo \"{}\" ;\n    prov:generatedAtTime \"{}\"",
            self.agent.replace('"', "\\\""),
            self.timestamp.to_rfc3339(),
        );
        if let Some(reason) = &self.reason {
            out.push_str(&format!(
                " ;\n    prov:wasDerivedFrom \"{}\"",
                reason.replace('"', "\\\"")
            ));
        }
        if let Some(source) = &self.source {
            out.push_str(&format!(
                " ;\n    prov:hadPrimarySource \"{}\"",
                source.replace('"', "\\\"")
            ));
        }
        if let Some(activity) = &self.activity {
            out.push_str(&format!(
                " ;\n    prov:wasGeneratedBy \"{}\"",
                activity.replace('"', "\\\"")
            ));
        }
        out.push_str(" .\n");
        out
    }
}

/// Atomic unit of graph change. Mutations stage in the transaction and
/// apply at commit; exactly one terminal transition (commit or rollback)
/// is allowed.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub transaction_id: String,
    pub added_triples: Vec<Triple>,
    pub removed_triples: Vec<Triple>,
    pub provenance: ProvenanceRecord,
    pub committed: bool,
    pub rolled_back: bool,
    pub hook_receipts: Vec<HookReceipt>,
}

impl Transaction {
    pub fn new(transaction_id: &str, provenance: ProvenanceRecord) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            added_triples: Vec::new(),
            removed_triples: Vec::new(),
            provenance,
            committed: false,
            rolled_back: false,
            hook_receipts: Vec::new(),
        }
    }

    /// Open transactions are the only ones that accept staging or a
    /// terminal transition
    pub fn can_modify(&self) -> bool {
        !self.committed && !self.rolled_back
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_transaction_can_modify() {
        let txn = Transaction::new("txn-1", ProvenanceRecord::new("tester", None));
        assert!(txn.can_modify());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut committed = Transaction::new("txn-1", ProvenanceRecord::new("tester", None));
        committed.committed = true;
        assert!(!committed.can_modify());

        let mut rolled = Transaction::new("txn-2", ProvenanceRecord::new("tester", None));
        rolled.rolled_back = true;
        assert!(!rolled.can_modify());
    }

    #[test]
    fn provenance_renders_prov_triples() {
        let mut record = ProvenanceRecord::new("loader", Some("initial import"));
        record.source = Some("crm-export".to_string());
        let rdf = record.to_rdf("urn:triple:1");

        assert!(rdf.contains("prov:wasAttributedTo \"loader\""));
        assert!(rdf.contains("prov:wasDerivedFrom \"initial import\""));
        assert!(rdf.contains("prov:hadPrimarySource \"crm-export\""));
    }
}
