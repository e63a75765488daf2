//! Structural safety gates for hook registration.
//!
//! Ten canonical rules, PY-HOOK-001 through PY-HOOK-010. Shutdown,
//! Control and Validation severities refuse the registration and leave the
//! registry unchanged; Warnings are logged and never block.

use crate::model::{HookAction, KnowledgeHook};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// How severe a violated rule is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PokaYokeSeverity {
    /// Refuse the operation
    Shutdown,
    /// Gate until resolved
    Control,
    /// Pre-execution check, refuse and report
    Validation,
    /// Log, do not block
    Warning,
}

/// A violated safety rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PokaYokeViolation {
    pub id: &'static str,
    pub severity: PokaYokeSeverity,
    pub message: String,
}

impl PokaYokeViolation {
    fn new(id: &'static str, severity: PokaYokeSeverity, message: String) -> Self {
        Self {
            id,
            severity,
            message,
        }
    }

    /// Refused at registration: the SHUTDOWN set, plus the PY-HOOK-003
    /// priority gate. Validation rules are checked again before execution.
    pub fn blocks_registration(&self) -> bool {
        matches!(self.severity, PokaYokeSeverity::Shutdown) || self.id == "PY-HOOK-003"
    }
}

/// Run every rule against a candidate hook in the context of the hooks
/// already registered. Returns all violations; the caller refuses the
/// registration if any blocking violation is present and logs the rest.
pub fn check_hook(
    hook: &KnowledgeHook,
    registered: &HashMap<String, KnowledgeHook>,
) -> Vec<PokaYokeViolation> {
    let mut violations = Vec::new();

    // PY-HOOK-001: empty condition query
    if hook
        .condition
        .inline_query_text()
        .is_some_and(|q| q.trim().is_empty())
    {
        violations.push(PokaYokeViolation::new(
            "PY-HOOK-001",
            PokaYokeSeverity::Shutdown,
            format!("hook {} has an empty condition query", hook.hook_id),
        ));
    }

    // PY-HOOK-002: circular hook chain (warning)
    if let Some(cycle) = find_chain_cycle(hook, registered) {
        violations.push(PokaYokeViolation::new(
            "PY-HOOK-002",
            PokaYokeSeverity::Warning,
            format!("hook chain cycle: {}", cycle.join(" -> ")),
        ));
    }

    // PY-HOOK-003: same phase + same priority as an existing hook
    if let Some(existing) = registered.values().find(|other| {
        other.hook_id != hook.hook_id
            && other.phase == hook.phase
            && other.priority == hook.priority
    }) {
        violations.push(PokaYokeViolation::new(
            "PY-HOOK-003",
            PokaYokeSeverity::Control,
            format!(
                "hook {} collides with {} on phase {} priority {}",
                hook.hook_id,
                existing.hook_id,
                hook.phase.as_str(),
                hook.priority
            ),
        ));
    }

    // PY-HOOK-004 (unknown phase) and PY-HOOK-007 (unknown action) are
    // enforced where raw definitions enter the system: HookPhase::parse and
    // HookAction::parse reject unknown strings before a hook value exists.

    // PY-HOOK-005: disabled hook that declares a chain target
    if !hook.enabled && hook.chain_to.is_some() {
        violations.push(PokaYokeViolation::new(
            "PY-HOOK-005",
            PokaYokeSeverity::Shutdown,
            format!("disabled hook {} declares a chain target", hook.hook_id),
        ));
    }

    // PY-HOOK-006: chain target not registered (warning)
    if let Some(target) = &hook.chain_to {
        if target != &hook.hook_id && !registered.contains_key(target) {
            violations.push(PokaYokeViolation::new(
                "PY-HOOK-006",
                PokaYokeSeverity::Warning,
                format!("hook {} chains to unregistered hook {target}", hook.hook_id),
            ));
        }
    }

    // PY-HOOK-008: REJECT/NOTIFY without handler data
    if matches!(hook.action, HookAction::Reject | HookAction::Notify)
        && hook.handler_data.is_empty()
    {
        violations.push(PokaYokeViolation::new(
            "PY-HOOK-008",
            PokaYokeSeverity::Validation,
            format!(
                "hook {} with action {} requires handler data",
                hook.hook_id,
                hook.action.as_str()
            ),
        ));
    }

    // PY-HOOK-009: unselective condition (warning)
    if hook
        .condition
        .inline_query_text()
        .is_some_and(is_unselective)
    {
        violations.push(PokaYokeViolation::new(
            "PY-HOOK-009",
            PokaYokeSeverity::Warning,
            format!(
                "hook {} condition matches every triple in the graph",
                hook.hook_id
            ),
        ));
    }

    // PY-HOOK-010: recursive milestone triggering
    if is_recursive_milestone(hook) {
        violations.push(PokaYokeViolation::new(
            "PY-HOOK-010",
            PokaYokeSeverity::Shutdown,
            format!(
                "hook {} triggers a milestone its own condition listens to",
                hook.hook_id
            ),
        ));
    }

    violations
}

/// Log violations that registration tolerates
pub fn log_warnings(violations: &[PokaYokeViolation]) {
    for violation in violations {
        if !violation.blocks_registration() {
            warn!(rule = violation.id, "{}", violation.message);
        }
    }
}

/// Pre-execution check (PY-HOOK-008): REJECT and NOTIFY hooks must carry
/// handler data before their action may run.
pub fn check_before_execution(hook: &KnowledgeHook) -> Option<PokaYokeViolation> {
    if matches!(hook.action, HookAction::Reject | HookAction::Notify)
        && hook.handler_data.is_empty()
    {
        return Some(PokaYokeViolation::new(
            "PY-HOOK-008",
            PokaYokeSeverity::Validation,
            format!(
                "hook {} with action {} requires handler data",
                hook.hook_id,
                hook.action.as_str()
            ),
        ));
    }
    None
}

fn find_chain_cycle(
    hook: &KnowledgeHook,
    registered: &HashMap<String, KnowledgeHook>,
) -> Option<Vec<String>> {
    let mut path = vec![hook.hook_id.clone()];
    let mut seen: HashSet<String> = HashSet::from([hook.hook_id.clone()]);
    let mut current = hook.chain_to.clone();

    while let Some(next) = current {
        path.push(next.clone());
        if !seen.insert(next.clone()) {
            return Some(path);
        }
        current = registered.get(&next).and_then(|h| h.chain_to.clone());
    }
    None
}

fn is_unselective(query: &str) -> bool {
    let squeezed: String = query.split_whitespace().collect::<Vec<_>>().join(" ");
    squeezed.contains("{ ?s ?p ?o }") || squeezed.contains("{ ?s ?p ?o . }")
}

fn is_recursive_milestone(hook: &KnowledgeHook) -> bool {
    if hook.chain_to.as_deref() == Some(hook.hook_id.as_str()) {
        return true;
    }
    let Some(milestone) = hook.handler_data.get("milestone").and_then(|v| v.as_str()) else {
        return false;
    };
    hook.condition
        .inline_query_text()
        .is_some_and(|q| q.contains(milestone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Condition;
    use crate::model::{HookAction, HookPhase, KnowledgeHook};
    use serde_json::json;

    fn hook(id: &str) -> KnowledgeHook {
        KnowledgeHook::new(
            id,
            id,
            HookPhase::PostTick,
            Condition::sparql_ask("ASK { ?s a <http://example.org/Thing> }"),
        )
    }

    fn registered(hooks: &[KnowledgeHook]) -> HashMap<String, KnowledgeHook> {
        hooks
            .iter()
            .map(|h| (h.hook_id.clone(), h.clone()))
            .collect()
    }

    #[test]
    fn empty_condition_is_shutdown() {
        let invalid = KnowledgeHook::new(
            "invalid-empty",
            "Invalid",
            HookPhase::PostTick,
            Condition::sparql_ask(""),
        );
        let violations = check_hook(&invalid, &HashMap::new());
        assert!(violations
            .iter()
            .any(|v| v.id == "PY-HOOK-001" && v.severity == PokaYokeSeverity::Shutdown));
    }

    #[test]
    fn circular_chain_is_warning_only() {
        let a = hook("a").with_chain_to("b");
        let b = hook("b").with_priority(40).with_chain_to("c");
        let c = hook("c").with_priority(30).with_chain_to("a");

        let violations = check_hook(&c, &registered(&[a, b]));
        let cycle = violations
            .iter()
            .find(|v| v.id == "PY-HOOK-002")
            .expect("cycle should be detected");
        assert_eq!(cycle.severity, PokaYokeSeverity::Warning);
        assert!(!cycle.blocks_registration());
    }

    #[test]
    fn linear_chain_has_no_cycle_warning() {
        let a = hook("a").with_chain_to("b");
        let b = hook("b").with_priority(40).with_chain_to("c");
        let c = hook("c").with_priority(30);

        let violations = check_hook(&a, &registered(&[b, c]));
        assert!(!violations.iter().any(|v| v.id == "PY-HOOK-002"));
    }

    #[test]
    fn priority_collision_is_gated() {
        let existing = hook("existing");
        let incoming = hook("incoming");
        let violations = check_hook(&incoming, &registered(&[existing]));
        let violation = violations
            .iter()
            .find(|v| v.id == "PY-HOOK-003")
            .expect("collision should be detected");
        assert_eq!(violation.severity, PokaYokeSeverity::Control);
        assert!(violation.blocks_registration());
    }

    #[test]
    fn disabled_hook_with_chain_is_shutdown() {
        let invalid = hook("disabled-parent").with_chain_to("child").disabled();
        let violations = check_hook(&invalid, &HashMap::new());
        assert!(violations
            .iter()
            .any(|v| v.id == "PY-HOOK-005" && v.severity == PokaYokeSeverity::Shutdown));
    }

    #[test]
    fn orphan_chain_target_is_warning() {
        let orphan = hook("orphan").with_chain_to("ghost");
        let violations = check_hook(&orphan, &HashMap::new());
        let violation = violations
            .iter()
            .find(|v| v.id == "PY-HOOK-006")
            .expect("orphan target should warn");
        assert!(!violation.blocks_registration());
    }

    #[test]
    fn reject_without_handler_data_is_flagged_for_execution() {
        let invalid = hook("rejector").with_action(HookAction::Reject);
        let violations = check_hook(&invalid, &HashMap::new());
        let violation = violations
            .iter()
            .find(|v| v.id == "PY-HOOK-008")
            .expect("missing handler data should be flagged");
        assert_eq!(violation.severity, PokaYokeSeverity::Validation);
        // Pre-execution check, not a registration gate
        assert!(!violation.blocks_registration());
        assert!(check_before_execution(&invalid).is_some());

        let valid = hook("rejector")
            .with_action(HookAction::Reject)
            .with_handler_data([("reason".to_string(), json!("why"))].into_iter().collect());
        assert!(check_before_execution(&valid).is_none());
    }

    #[test]
    fn unselective_condition_warns() {
        let broad = KnowledgeHook::new(
            "broad",
            "Broad",
            HookPhase::PostTick,
            Condition::sparql_ask("ASK { ?s ?p ?o }"),
        );
        let violations = check_hook(&broad, &HashMap::new());
        let violation = violations
            .iter()
            .find(|v| v.id == "PY-HOOK-009")
            .expect("broad condition should warn");
        assert!(!violation.blocks_registration());
    }

    #[test]
    fn recursive_milestone_is_shutdown() {
        let recursive = KnowledgeHook::new(
            "recursive",
            "Recursive",
            HookPhase::PostTick,
            Condition::sparql_ask(
                "ASK { <urn:milestone:done> <https://kgflow.dev/ns/hook/reached> true }",
            ),
        )
        .with_handler_data(
            [("milestone".to_string(), json!("urn:milestone:done"))]
                .into_iter()
                .collect(),
        );
        let violations = check_hook(&recursive, &HashMap::new());
        assert!(violations
            .iter()
            .any(|v| v.id == "PY-HOOK-010" && v.severity == PokaYokeSeverity::Shutdown));
    }

    #[test]
    fn self_chain_is_shutdown() {
        let selfie = hook("selfie").with_chain_to("selfie");
        let violations = check_hook(&selfie, &HashMap::new());
        assert!(violations.iter().any(|v| v.id == "PY-HOOK-010"));
    }
}
