//! Hook model: phases, actions, hooks and execution receipts

use crate::conditions::Condition;
use crate::error::{UnrdfError, UnrdfResult};
use crate::store::{Term, Triple};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Namespace for hooks materialized as RDF
pub const HOOK_NS: &str = "https://kgflow.dev/ns/hook/";

/// Lifecycle phases a hook can bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    PreTick,
    OnChange,
    PostTick,
    PreValidation,
    PostValidation,
    PreTransaction,
    PostTransaction,
    PostCommit,
    PreQuery,
    PostQuery,
}

impl HookPhase {
    pub const ALL: [HookPhase; 10] = [
        HookPhase::PreTick,
        HookPhase::OnChange,
        HookPhase::PostTick,
        HookPhase::PreValidation,
        HookPhase::PostValidation,
        HookPhase::PreTransaction,
        HookPhase::PostTransaction,
        HookPhase::PostCommit,
        HookPhase::PreQuery,
        HookPhase::PostQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::PreTick => "pre_tick",
            HookPhase::OnChange => "on_change",
            HookPhase::PostTick => "post_tick",
            HookPhase::PreValidation => "pre_validation",
            HookPhase::PostValidation => "post_validation",
            HookPhase::PreTransaction => "pre_transaction",
            HookPhase::PostTransaction => "post_transaction",
            HookPhase::PostCommit => "post_commit",
            HookPhase::PreQuery => "pre_query",
            HookPhase::PostQuery => "post_query",
        }
    }

    /// Parse a phase string; unknown values are a validation error
    /// (PY-HOOK-004)
    pub fn parse(value: &str) -> UnrdfResult<HookPhase> {
        HookPhase::ALL
            .into_iter()
            .find(|p| p.as_str() == value)
            .ok_or_else(|| UnrdfError::Validation(format!("unknown hook phase '{value}'")))
    }
}

/// Action taken when a hook's condition matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    Assert,
    Reject,
    Notify,
    Transform,
}

impl HookAction {
    pub const ALL: [HookAction; 4] = [
        HookAction::Assert,
        HookAction::Reject,
        HookAction::Notify,
        HookAction::Transform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookAction::Assert => "assert",
            HookAction::Reject => "reject",
            HookAction::Notify => "notify",
            HookAction::Transform => "transform",
        }
    }

    /// Parse an action string; unknown values are gated (PY-HOOK-007)
    pub fn parse(value: &str) -> UnrdfResult<HookAction> {
        HookAction::ALL
            .into_iter()
            .find(|a| a.as_str() == value)
            .ok_or_else(|| UnrdfError::Validation(format!("unknown hook action '{value}'")))
    }
}

/// Registered condition -> action rule bound to a lifecycle phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHook {
    pub hook_id: String,
    pub name: String,
    pub phase: HookPhase,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub condition: Condition,
    #[serde(default = "default_action")]
    pub action: HookAction,
    #[serde(default)]
    pub handler_data: Map<String, Value>,
    #[serde(default)]
    pub chain_to: Option<String>,
}

fn default_priority() -> i32 {
    50
}

fn default_enabled() -> bool {
    true
}

fn default_action() -> HookAction {
    HookAction::Notify
}

impl KnowledgeHook {
    pub fn new(hook_id: &str, name: &str, phase: HookPhase, condition: Condition) -> Self {
        Self {
            hook_id: hook_id.to_string(),
            name: name.to_string(),
            phase,
            priority: default_priority(),
            enabled: true,
            condition,
            action: default_action(),
            handler_data: Map::new(),
            chain_to: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_action(mut self, action: HookAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_handler_data(mut self, data: Map<String, Value>) -> Self {
        self.handler_data = data;
        self
    }

    pub fn with_chain_to(mut self, target: &str) -> Self {
        self.chain_to = Some(target.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn iri(&self) -> String {
        format!("urn:hook:{}", self.hook_id)
    }

    /// Materialize the hook as triples so conditions can reason about the
    /// hook topology itself
    pub fn to_triples(&self) -> Vec<Triple> {
        let subject = self.iri();
        let mut triples = vec![
            Triple::new(
                &subject,
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
                Term::iri(&format!("{HOOK_NS}KnowledgeHook")),
            ),
            Triple::new(&subject, &format!("{HOOK_NS}name"), Term::literal(&self.name)),
            Triple::new(
                &subject,
                &format!("{HOOK_NS}phase"),
                Term::literal(self.phase.as_str()),
            ),
            Triple::new(
                &subject,
                &format!("{HOOK_NS}priority"),
                Term::literal(&self.priority.to_string()),
            ),
            Triple::new(
                &subject,
                &format!("{HOOK_NS}enabled"),
                Term::literal(if self.enabled { "true" } else { "false" }),
            ),
            Triple::new(
                &subject,
                &format!("{HOOK_NS}action"),
                Term::literal(self.action.as_str()),
            ),
        ];
        if let Some(query) = self.condition.inline_query_text() {
            triples.push(Triple::new(
                &subject,
                &format!("{HOOK_NS}conditionQuery"),
                Term::literal(query),
            ));
        }
        if let Some(target) = &self.chain_to {
            triples.push(Triple::new(
                &subject,
                &format!("{HOOK_NS}chainTo"),
                Term::iri(&format!("urn:hook:{target}")),
            ));
        }
        triples
    }

    /// Turtle rendering for export and audit
    pub fn to_rdf(&self) -> String {
        let mut out = format!(
            "@prefix hook: <{HOOK_NS}> .\n\n<{}> a hook:KnowledgeHook ;\n    hook:name \"{}\" ;\n    hook:phase \"{}\" ;\n    hook:priority {} ;\n    hook:enabled {} ;\n    hook:action \"{}\"",
            self.iri(),
            self.name.replace('"', "\\\""),
            self.phase.as_str(),
            self.priority,
            self.enabled,
            self.action.as_str(),
        );
        if let Some(query) = self.condition.inline_query_text() {
            out.push_str(&format!(
                " ;\n    hook:conditionQuery \"{}\"",
                query.replace('"', "\\\"")
            ));
        }
        if let Some(target) = &self.chain_to {
            out.push_str(&format!(" ;\n    hook:chainTo <urn:hook:{target}>"));
        }
        out.push_str(" .\n");
        out
    }
}

/// Immutable record of one hook execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookReceipt {
    pub hook_id: String,
    pub phase: HookPhase,
    pub timestamp: DateTime<Utc>,
    pub condition_matched: bool,
    pub action_taken: Option<HookAction>,
    pub duration_ms: f64,
    #[serde(default)]
    pub triples_affected: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl HookReceipt {
    pub fn to_rdf(&self) -> String {
        format!(
            "@prefix hook: <{HOOK_NS}> .\n\n<urn:receipt:{}:{}> a hook:Receipt ;\n    hook:hookId \"{}\" ;\n    hook:phase \"{}\" ;\n    hook:timestamp \"{}\" ;\n    hook:conditionMatched {} ;\n    hook:actionTaken \"{}\" ;\n    hook:durationMs {} ;\n    hook:triplesAffected {} .\n",
            self.hook_id,
            self.timestamp.timestamp_millis(),
            self.hook_id,
            self.phase.as_str(),
            self.timestamp.to_rfc3339(),
            self.condition_matched,
            self.action_taken.map(|a| a.as_str()).unwrap_or("none"),
            self.duration_ms,
            self.triples_affected,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Condition;

    #[test]
    fn phase_parse_round_trips() {
        for phase in HookPhase::ALL {
            assert_eq!(HookPhase::parse(phase.as_str()).unwrap(), phase);
        }
        assert!(HookPhase::parse("invalid_phase_name").is_err());
    }

    #[test]
    fn action_parse_round_trips() {
        for action in HookAction::ALL {
            assert_eq!(HookAction::parse(action.as_str()).unwrap(), action);
        }
        assert!(HookAction::parse("explode").is_err());
    }

    #[test]
    fn hook_defaults() {
        let hook = KnowledgeHook::new(
            "basic",
            "Basic Hook",
            HookPhase::OnChange,
            Condition::sparql_ask("ASK { ?s ?p ?o }"),
        );
        assert_eq!(hook.priority, 50);
        assert!(hook.enabled);
        assert_eq!(hook.action, HookAction::Notify);
    }

    #[test]
    fn hook_renders_to_rdf() {
        let hook = KnowledgeHook::new(
            "rdf-test",
            "RDF Test Hook",
            HookPhase::OnChange,
            Condition::sparql_ask("ASK { ?s ?p ?o }"),
        )
        .with_priority(75);

        let rdf = hook.to_rdf();
        assert!(rdf.contains("hook:KnowledgeHook"));
        assert!(rdf.contains("rdf-test"));
        assert!(rdf.contains("on_change"));
        assert!(rdf.contains("75"));
        assert!(rdf.contains("ASK"));
    }

    #[test]
    fn hook_to_triples_includes_chain() {
        let hook = KnowledgeHook::new(
            "a",
            "A",
            HookPhase::PostTick,
            Condition::sparql_ask("ASK { ?s ?p ?o }"),
        )
        .with_chain_to("b");

        let triples = hook.to_triples();
        assert!(triples
            .iter()
            .any(|t| t.predicate.ends_with("chainTo")));
    }

    #[test]
    fn receipt_renders_to_rdf() {
        let receipt = HookReceipt {
            hook_id: "rdf-hook".to_string(),
            phase: HookPhase::OnChange,
            timestamp: Utc::now(),
            condition_matched: true,
            action_taken: Some(HookAction::Notify),
            duration_ms: 2.5,
            triples_affected: 3,
            error: None,
        };
        let rdf = receipt.to_rdf();
        assert!(rdf.contains("hook:Receipt"));
        assert!(rdf.contains("rdf-hook"));
        assert!(rdf.contains("on_change"));
        assert!(rdf.contains("notify"));
    }

    #[test]
    fn hook_serde_round_trip() {
        let hook = KnowledgeHook::new(
            "roundtrip",
            "Roundtrip",
            HookPhase::PreTransaction,
            Condition::sparql_ask("ASK { ?s ?p ?o }"),
        )
        .with_action(HookAction::Reject)
        .with_handler_data(
            [("reason".to_string(), serde_json::json!("nope"))]
                .into_iter()
                .collect(),
        );

        let json = serde_json::to_string(&hook).unwrap();
        let back: KnowledgeHook = serde_json::from_str(&json).unwrap();
        assert_eq!(hook, back);
    }
}
