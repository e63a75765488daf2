//! Phase execution of hooks against a transactional context.
//!
//! Hooks in one phase run in descending priority order. Each hook's
//! condition is evaluated under a deadline; a triggered hook applies its
//! action against the staging context and every execution leaves a
//! receipt. Errors in one hook never propagate into the next.

use crate::cache::QueryCache;
use crate::conditions::{ConditionContext, TimeSeriesPoint};
use crate::error::{UnrdfError, UnrdfResult};
use crate::model::{HookAction, HookPhase, HookReceipt, KnowledgeHook};
use crate::performance::PerformanceTracker;
use crate::registry::HookRegistry;
use crate::resolver::FileResolver;
use crate::store::{Term, Triple, TripleStore};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Mutable context a phase executes against: the committed graph, the
/// staged delta, and metadata shared between hooks and the transaction.
pub struct HookContext {
    pub phase: HookPhase,
    pub transaction_id: String,
    pub store: Arc<dyn TripleStore>,
    pub added: Vec<Triple>,
    pub removed: Vec<Triple>,
    pub metadata: Map<String, Value>,
    pub receipts: Vec<HookReceipt>,
    /// Scalar variables visible to threshold/delta conditions
    pub values: Map<String, Value>,
    pub time_series: Vec<TimeSeriesPoint>,
}

impl HookContext {
    pub fn new(phase: HookPhase, store: Arc<dyn TripleStore>, transaction_id: &str) -> Self {
        Self {
            phase,
            transaction_id: transaction_id.to_string(),
            store,
            added: Vec::new(),
            removed: Vec::new(),
            metadata: Map::new(),
            receipts: Vec::new(),
            values: Map::new(),
            time_series: Vec::new(),
        }
    }

    pub fn should_rollback(&self) -> bool {
        self.metadata
            .get("should_rollback")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn rollback_reason(&self) -> Option<String> {
        self.metadata
            .get("rollback_reason")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Executes registered hooks phase by phase
pub struct HookExecutor {
    registry: Arc<HookRegistry>,
    resolver: Option<Arc<dyn FileResolver>>,
    cache: Arc<QueryCache>,
    tracker: Arc<PerformanceTracker>,
    condition_timeout: Duration,
}

impl HookExecutor {
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self {
            registry,
            resolver: None,
            cache: Arc::new(QueryCache::new(1000, 3600)),
            tracker: Arc::new(PerformanceTracker::default()),
            condition_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn FileResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_condition_timeout(mut self, timeout: Duration) -> Self {
        self.condition_timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    /// Materialize every registered hook as RDF so conditions can reason
    /// about the hook topology. Returns the number of hooks loaded.
    pub async fn load_hooks_to_graph(&self, store: &Arc<dyn TripleStore>) -> UnrdfResult<usize> {
        let hooks = self.registry.get_all();
        for hook in &hooks {
            for triple in hook.to_triples() {
                store.add(triple).await?;
            }
        }
        Ok(hooks.len())
    }

    fn condition_context(&self, ctx: &HookContext) -> ConditionContext {
        ConditionContext {
            store: Some(Arc::clone(&ctx.store)),
            resolver: self.resolver.clone(),
            cache: Some(Arc::clone(&self.cache)),
            values: ctx.values.clone(),
            time_series: ctx.time_series.clone(),
        }
    }

    /// Evaluate conditions only, recording receipts but taking no actions
    pub async fn evaluate_conditions(
        &self,
        phase: HookPhase,
        ctx: &mut HookContext,
    ) -> UnrdfResult<Vec<(String, bool)>> {
        let condition_ctx = self.condition_context(ctx);
        let mut results = Vec::new();
        for hook in self.registry.get_by_phase(phase) {
            let started = Instant::now();
            let (matched, error) = match hook
                .condition
                .evaluate_with_timeout(&condition_ctx, self.condition_timeout)
                .await
            {
                Ok(result) => (result.triggered, None),
                Err(UnrdfError::Timeout) => (false, Some("timeout".to_string())),
                Err(e) => (false, Some(e.to_string())),
            };
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.tracker.record_latency("condition_evaluation", duration_ms);

            let receipt = HookReceipt {
                hook_id: hook.hook_id.clone(),
                phase,
                timestamp: Utc::now(),
                condition_matched: matched,
                action_taken: None,
                duration_ms,
                triples_affected: 0,
                error,
            };
            self.registry.add_receipt(receipt.clone());
            ctx.receipts.push(receipt);
            results.push((hook.hook_id, matched));
        }
        Ok(results)
    }

    /// Execute every enabled hook in `phase`: evaluate, act, record.
    /// Returns the receipts produced by this call.
    pub async fn execute_phase(
        &self,
        phase: HookPhase,
        ctx: &mut HookContext,
    ) -> UnrdfResult<Vec<HookReceipt>> {
        let mut queue: Vec<KnowledgeHook> = self.registry.get_by_phase(phase);
        let mut executed: HashSet<String> = HashSet::new();
        let mut receipts = Vec::new();

        while !queue.is_empty() {
            let hook = queue.remove(0);
            if !executed.insert(hook.hook_id.clone()) {
                continue;
            }

            let receipt = self.run_hook(&hook, phase, ctx).await;
            let triggered = receipt.condition_matched;
            self.registry.add_receipt(receipt.clone());
            ctx.receipts.push(receipt.clone());
            receipts.push(receipt);

            // Triggered hooks may chain; disabled hooks never chain
            // (refused at registration) and cycles are cut by the executed
            // set.
            if triggered {
                if let Some(target) = &hook.chain_to {
                    match self.registry.get(target) {
                        Some(next) if next.enabled => queue.push(next),
                        Some(_) => {}
                        None => {
                            warn!(hook_id = %hook.hook_id, target = %target, "chain target missing");
                        }
                    }
                }
            }
        }
        Ok(receipts)
    }

    async fn run_hook(
        &self,
        hook: &KnowledgeHook,
        phase: HookPhase,
        ctx: &mut HookContext,
    ) -> HookReceipt {
        let condition_ctx = self.condition_context(ctx);
        let started = Instant::now();

        let evaluated = hook
            .condition
            .evaluate_with_timeout(&condition_ctx, self.condition_timeout)
            .await;

        let (matched, mut error) = match &evaluated {
            Ok(result) => (result.triggered, None),
            Err(UnrdfError::Timeout) => (false, Some("timeout".to_string())),
            Err(e) => (false, Some(e.to_string())),
        };

        let mut action_taken = None;
        let mut triples_affected = 0;
        if matched {
            // Pre-execution safety check (PY-HOOK-008)
            if let Some(violation) = crate::poka_yoke::check_before_execution(hook) {
                error = Some(format!("{}: {}", violation.id, violation.message));
            } else {
                match self.apply_action(hook, ctx) {
                    Ok(affected) => {
                        action_taken = Some(hook.action);
                        triples_affected = affected;
                    }
                    Err(e) => error = Some(e.to_string()),
                }
            }
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.tracker.record_latency("hook_execution", duration_ms);
        debug!(
            hook_id = %hook.hook_id,
            phase = phase.as_str(),
            matched,
            "hook executed"
        );

        HookReceipt {
            hook_id: hook.hook_id.clone(),
            phase,
            timestamp: Utc::now(),
            condition_matched: matched,
            action_taken,
            duration_ms,
            triples_affected,
            error,
        }
    }

    fn apply_action(&self, hook: &KnowledgeHook, ctx: &mut HookContext) -> UnrdfResult<u64> {
        match hook.action {
            HookAction::Assert => {
                push_metadata_entry(
                    &mut ctx.metadata,
                    "assertions",
                    json!({
                        "hook_id": hook.hook_id,
                        "data": hook.handler_data,
                    }),
                );
                Ok(0)
            }
            HookAction::Reject => {
                let reason = hook
                    .handler_data
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("hook rejected transaction")
                    .to_string();
                ctx.metadata
                    .insert("should_rollback".to_string(), json!(true));
                ctx.metadata
                    .insert("rollback_reason".to_string(), json!(reason));
                Ok(0)
            }
            HookAction::Notify => {
                let message = hook
                    .handler_data
                    .get("message")
                    .cloned()
                    .unwrap_or_else(|| json!(hook.name.clone()));
                push_metadata_entry(
                    &mut ctx.metadata,
                    "notifications",
                    json!({
                        "hook_id": hook.hook_id,
                        "message": message,
                    }),
                );
                Ok(0)
            }
            HookAction::Transform => {
                // Idempotent by construction: re-running adds nothing new
                let mut affected = 0;
                for triple in triples_from_handler(&hook.handler_data, "add_triples")? {
                    if !ctx.added.contains(&triple) {
                        ctx.added.push(triple);
                        affected += 1;
                    }
                }
                for triple in triples_from_handler(&hook.handler_data, "remove_triples")? {
                    if !ctx.removed.contains(&triple) {
                        ctx.removed.push(triple);
                        affected += 1;
                    }
                }
                Ok(affected)
            }
        }
    }
}

fn push_metadata_entry(metadata: &mut Map<String, Value>, key: &str, entry: Value) {
    match metadata.get_mut(key).and_then(Value::as_array_mut) {
        Some(entries) => entries.push(entry),
        None => {
            metadata.insert(key.to_string(), json!([entry]));
        }
    }
}

fn triples_from_handler(data: &Map<String, Value>, key: &str) -> UnrdfResult<Vec<Triple>> {
    let Some(raw) = data.get(key) else {
        return Ok(Vec::new());
    };
    let entries = raw.as_array().ok_or_else(|| {
        UnrdfError::Validation(format!("handler data {key} must be an array"))
    })?;

    let mut triples = Vec::with_capacity(entries.len());
    for entry in entries {
        let subject = field(entry, "subject")?;
        let predicate = field(entry, "predicate")?;
        let object_text = field(entry, "object")?;
        let literal = entry
            .get("object_literal")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let object = if literal {
            Term::literal(&object_text)
        } else {
            Term::iri(&object_text)
        };
        triples.push(Triple::new(&subject, &predicate, object));
    }
    Ok(triples)
}

fn field(entry: &Value, name: &str) -> UnrdfResult<String> {
    entry
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| UnrdfError::Validation(format!("triple entry missing '{name}'")))
}
