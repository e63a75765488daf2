//! The tick loop: enabled set, hook gates, firing, event emission.
//!
//! One executor drives one workflow single-threaded. Every externally
//! observable change becomes an ordered event in the temporal store,
//! hash-chained and vector-clocked; every tick is attributable to a
//! transaction id and gated by the hook phases.

use crate::cancellation::{CancellationRegion, CancellationReport};
use crate::context::{ExecutionContext, ExecutionResult};
use crate::error::{PatternError, PatternResult};
use crate::loops::{LoopOutcome, LoopState, StructuredLoop};
use crate::mi::{MiSpawn, MiTracker, MiVariant};
use crate::recursion::{RecursionFrame, RecursionManager};
use kgflow_net::{Marking, WorkflowNet};
use kgflow_temporal::{EventKind, TieredEventStore, VectorClock, WorkflowEvent, GENESIS_HASH};
use kgflow_unrdf::{CommitLogRecord, HookContext, HookExecutor, HookPhase, MemoryStore, TripleStore};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of one tick
#[derive(Debug, Clone)]
pub struct TickResult {
    pub fired: Option<String>,
    pub marking: Marking,
    pub event_ids: Vec<String>,
    pub commit_log: CommitLogRecord,
    pub result: ExecutionResult,
}

/// Marking-based execution core for one workflow
pub struct WorkflowExecutor {
    net: WorkflowNet,
    workflow_id: String,
    actor: String,
    store: Arc<TieredEventStore>,
    hooks: Option<Arc<HookExecutor>>,
    graph: Arc<dyn TripleStore>,
    marking: Marking,
    clock: VectorClock,
    tick: u64,
    tail_hash: String,
    last_event_id: Option<String>,
    mi: MiTracker,
}

impl WorkflowExecutor {
    pub fn new(net: WorkflowNet, workflow_id: &str, store: Arc<TieredEventStore>) -> Self {
        let marking = net.initial_marking();
        Self {
            net,
            workflow_id: workflow_id.to_string(),
            actor: workflow_id.to_string(),
            store,
            hooks: None,
            graph: Arc::new(MemoryStore::new()),
            marking,
            clock: VectorClock::zero(workflow_id),
            tick: 0,
            tail_hash: GENESIS_HASH.to_string(),
            last_event_id: None,
            mi: MiTracker::new(),
        }
    }

    /// Attach hook execution: phases run against `graph`
    pub fn with_hooks(mut self, hooks: Arc<HookExecutor>, graph: Arc<dyn TripleStore>) -> Self {
        self.hooks = Some(hooks);
        self.graph = graph;
        self
    }

    pub fn net(&self) -> &WorkflowNet {
        &self.net
    }

    pub fn marking(&self) -> &Marking {
        &self.marking
    }

    pub fn tick_number(&self) -> u64 {
        self.tick
    }

    pub fn mi_tracker(&mut self) -> &mut MiTracker {
        &mut self.mi
    }

    pub fn is_complete(&self) -> bool {
        self.marking == self.net.final_marking()
    }

    pub fn enabled_tasks(&self) -> Vec<String> {
        self.net
            .enabled_transitions(&self.marking)
            .into_iter()
            .collect()
    }

    /// Run one tick: pick the first enabled transition (deterministic
    /// lexicographic policy) and fire it through the full hook/event path.
    pub async fn run_tick(&mut self, ctx: &ExecutionContext) -> PatternResult<TickResult> {
        let chosen = self.enabled_tasks().into_iter().next();
        match chosen {
            Some(transition) => self.fire_task(&transition, ctx).await,
            None => {
                // Nothing to fire: an empty tick still leaves a trace
                self.tick += 1;
                let started = Instant::now();
                let mut event_ids = Vec::new();
                event_ids.push(self.emit(EventKind::TickStart, json!({"enabled": []}))?);
                event_ids.push(self.emit(
                    EventKind::TickEnd,
                    json!({"rules_fired": 0, "converged": true}),
                )?);
                Ok(TickResult {
                    fired: None,
                    marking: self.marking.clone(),
                    event_ids: event_ids.clone(),
                    commit_log: self.commit_log(&event_ids, 0, started, true),
                    result: ExecutionResult::ok(Map::new()),
                })
            }
        }
    }

    /// Fire a specific task: hooks gate, marking mutates per the arcs,
    /// events record the change.
    pub async fn fire_task(
        &mut self,
        transition_id: &str,
        ctx: &ExecutionContext,
    ) -> PatternResult<TickResult> {
        // Rejected before any state changes: no tick, no events
        if !self.net.is_enabled(transition_id, &self.marking) {
            return Err(PatternError::Net(kgflow_net::NetError::NotEnabled(
                transition_id.to_string(),
            )));
        }

        let started = Instant::now();
        self.tick += 1;
        let mut event_ids = Vec::new();

        self.run_phase(HookPhase::PreTick, ctx).await?;

        event_ids.push(self.emit(
            EventKind::TickStart,
            json!({"enabled": self.enabled_tasks(), "chosen": transition_id}),
        )?);

        // PRE_TRANSACTION gate
        if let Some(rejection) = self.run_phase(HookPhase::PreTransaction, ctx).await? {
            info!(task = transition_id, %rejection, "tick rejected by hook");
            event_ids.push(self.emit(
                EventKind::TickEnd,
                json!({"rules_fired": 0, "converged": false, "rejected": true, "reason": rejection}),
            )?);
            return Ok(TickResult {
                fired: None,
                marking: self.marking.clone(),
                event_ids: event_ids.clone(),
                commit_log: self.commit_log(&event_ids, 0, started, false),
                result: ExecutionResult::fail(&rejection),
            });
        }

        let before = self.marking.clone();
        self.marking = self.net.fire(transition_id, &self.marking)?;

        event_ids.push(self.emit(
            EventKind::StatusChange,
            json!({
                "task": transition_id,
                "marking_before": before.as_map(),
                "marking_after": self.marking.as_map(),
            }),
        )?);

        // Structural split/join events by transition arity
        let outputs = self.net.postset(transition_id);
        if outputs.len() > 1 {
            event_ids.push(self.emit(
                EventKind::Split,
                json!({"task": transition_id, "branches": outputs}),
            )?);
        }
        let inputs = self.net.preset(transition_id);
        if inputs.len() > 1 {
            event_ids.push(self.emit(
                EventKind::Join,
                json!({"task": transition_id, "joined": inputs}),
            )?);
        }

        // POST hooks observe the applied change
        self.run_phase(HookPhase::PostTransaction, ctx).await?;
        self.run_phase(HookPhase::PostCommit, ctx).await?;
        self.run_phase(HookPhase::PostTick, ctx).await?;

        let converged = self.is_complete();
        event_ids.push(self.emit(
            EventKind::TickEnd,
            json!({"rules_fired": 1, "converged": converged}),
        )?);

        debug!(
            workflow_id = %self.workflow_id,
            tick = self.tick,
            task = transition_id,
            converged,
            "tick complete"
        );

        let mut output = Map::new();
        output.insert("fired".to_string(), json!(transition_id));
        output.insert("converged".to_string(), json!(converged));
        Ok(TickResult {
            fired: Some(transition_id.to_string()),
            marking: self.marking.clone(),
            event_ids: event_ids.clone(),
            commit_log: self.commit_log(&event_ids, 1, started, converged),
            result: ExecutionResult::ok(output),
        })
    }

    /// Fire ticks until the final marking is reached, nothing is enabled,
    /// or `max_ticks` elapses.
    pub async fn run_to_completion(
        &mut self,
        ctx: &ExecutionContext,
        max_ticks: u64,
    ) -> PatternResult<Vec<TickResult>> {
        let mut results = Vec::new();
        for _ in 0..max_ticks {
            if self.is_complete() || self.enabled_tasks().is_empty() {
                break;
            }
            let result = self.run_tick(ctx).await?;
            let progressed = result.fired.is_some() && result.result.success;
            results.push(result);
            if !progressed {
                break;
            }
        }
        Ok(results)
    }

    /// Spawn MI instances for a task, recording one MI_SPAWN per instance
    pub fn spawn_instances(
        &mut self,
        task_id: &str,
        variant: &MiVariant,
        ctx: &ExecutionContext,
    ) -> PatternResult<MiSpawn> {
        let spawn = self.mi.spawn(task_id, variant, ctx)?;
        for (number, instance_id) in spawn.instance_ids.iter().enumerate() {
            let trigger = self
                .mi
                .instance_trigger(instance_id)
                .cloned()
                .unwrap_or(Value::Null);
            self.emit(
                EventKind::MiSpawn,
                json!({
                    "parent_mi_id": spawn.parent_id,
                    "instance_id": instance_id,
                    "instance_number": number,
                    "trigger": trigger,
                }),
            )?;
        }
        Ok(spawn)
    }

    /// Complete an MI instance; emits MI_COMPLETE only on the first call
    pub fn complete_instance(&mut self, instance_id: &str) -> PatternResult<bool> {
        let completed = self.mi.mark_instance_complete(instance_id);
        if completed {
            self.emit(
                EventKind::MiComplete,
                json!({"instance_id": instance_id}),
            )?;
        }
        Ok(completed)
    }

    /// Drive a structured loop for a task. Hitting the iteration bound
    /// terminates deterministically and leaves a CANCELLATION event.
    pub fn execute_loop<F>(
        &mut self,
        task_id: &str,
        structured: &StructuredLoop,
        condition: &str,
        ctx: &ExecutionContext,
        body: F,
    ) -> PatternResult<LoopOutcome>
    where
        F: FnMut(&LoopState, &ExecutionContext) -> PatternResult<Map<String, Value>>,
    {
        let outcome = structured.execute(condition, ctx, body)?;
        if outcome.bound_reached {
            self.emit(
                EventKind::Cancellation,
                json!({
                    "task": task_id,
                    "cause": "max_iterations",
                    "iterations": outcome.total_iterations,
                }),
            )?;
        }
        Ok(outcome)
    }

    /// Push a recursion frame; exceeding the depth bound records a
    /// CANCELLATION event and surfaces the error with the parent context
    /// unaltered.
    pub fn push_recursion(
        &mut self,
        manager: &RecursionManager,
        current: Option<&RecursionFrame>,
        workflow_id: &str,
        return_point: &str,
        ctx: &ExecutionContext,
    ) -> PatternResult<RecursionFrame> {
        match manager.push_frame(current, workflow_id, return_point, ctx) {
            Ok(frame) => Ok(frame),
            Err(err @ PatternError::MaxRecursionExceeded(_)) => {
                self.emit(
                    EventKind::Cancellation,
                    json!({
                        "workflow": workflow_id,
                        "cause": "max_recursion",
                        "max_depth": manager.max_depth,
                    }),
                )?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Cancel a task: reset its region and record the cancellation
    pub fn cancel_task(
        &mut self,
        region: &CancellationRegion,
    ) -> PatternResult<CancellationReport> {
        let (next, report) = region.apply(&self.marking, &mut self.mi);
        self.marking = next;
        self.emit(
            EventKind::Cancellation,
            json!({
                "task": region.task_id,
                "places_reset": report.places_reset,
                "tokens_removed": report.tokens_removed,
                "instances_terminated": report.instances_terminated,
            }),
        )?;
        Ok(report)
    }

    /// Rebuild the marking by reducing the stored event log: the formal
    /// correspondence between the temporal store and this executor.
    pub fn replayed_marking(&self) -> PatternResult<Marking> {
        let mut marking = self.net.initial_marking();
        for event in self.store.replay(0, None, Some(&self.workflow_id)) {
            if event.kind != EventKind::StatusChange {
                continue;
            }
            if let Some(task) = event.payload.get("task").and_then(Value::as_str) {
                marking = self.net.fire(task, &marking)?;
            }
        }
        Ok(marking)
    }

    async fn run_phase(
        &mut self,
        phase: HookPhase,
        ctx: &ExecutionContext,
    ) -> PatternResult<Option<String>> {
        let Some(hooks) = &self.hooks else {
            return Ok(None);
        };
        let transaction_id = format!("{}-tick-{}", self.workflow_id, self.tick);
        let mut hook_ctx =
            HookContext::new(phase, Arc::clone(&self.graph), &transaction_id);
        hook_ctx.values = ctx.values().clone();

        let receipts = hooks.execute_phase(phase, &mut hook_ctx).await?;
        if !receipts.is_empty() {
            self.emit(
                EventKind::HookExecution,
                json!({
                    "phase": phase.as_str(),
                    "hooks_run": receipts.len(),
                    "matched": receipts.iter().filter(|r| r.condition_matched).count(),
                }),
            )?;
        }
        if hook_ctx.should_rollback() {
            return Ok(Some(
                hook_ctx
                    .rollback_reason()
                    .unwrap_or_else(|| "hook rejected tick".to_string()),
            ));
        }
        Ok(None)
    }

    fn emit(&mut self, kind: EventKind, payload: Value) -> PatternResult<String> {
        self.clock = self.clock.increment(&self.actor);
        let caused_by: Vec<String> = self.last_event_id.iter().cloned().collect();
        let event = WorkflowEvent::record(
            kind,
            &self.workflow_id,
            self.tick,
            payload,
            caused_by,
            self.clock.clone(),
            &self.tail_hash,
        );
        let event_id = event.event_id.clone();
        self.tail_hash = event.event_hash.clone();
        self.last_event_id = Some(event_id.clone());
        self.store.append(event)?;
        Ok(event_id)
    }

    fn commit_log(
        &self,
        event_ids: &[String],
        rules_fired: u64,
        started: Instant,
        converged: bool,
    ) -> CommitLogRecord {
        CommitLogRecord {
            tick_number: self.tick,
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            workflow_id: self.workflow_id.clone(),
            events_appended: event_ids.to_vec(),
            triples_added: 0,
            triples_removed: 0,
            rules_fired,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgflow_net::{create_arc, create_place, create_transition, create_workflow_net};

    fn linear_net() -> WorkflowNet {
        create_workflow_net(
            vec![
                create_place("i", true, false),
                create_place("p1", false, false),
                create_place("o", false, true),
            ],
            vec![create_transition("t1", ""), create_transition("t2", "")],
            vec![
                create_arc("i", "t1"),
                create_arc("t1", "p1"),
                create_arc("p1", "t2"),
                create_arc("t2", "o"),
            ],
            "linear",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn firing_disabled_task_is_rejected_without_state_change() {
        let store = Arc::new(TieredEventStore::default());
        let mut executor = WorkflowExecutor::new(linear_net(), "wf-guard", store);
        let before = executor.marking().clone();

        let err = executor
            .fire_task("t2", &ExecutionContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PatternError::Net(_)));
        assert_eq!(executor.marking(), &before);
    }

    #[tokio::test]
    async fn run_to_completion_reaches_final_marking() {
        let store = Arc::new(TieredEventStore::default());
        let mut executor = WorkflowExecutor::new(linear_net(), "wf-linear", store);

        let results = executor
            .run_to_completion(&ExecutionContext::new(), 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(executor.is_complete());
        assert_eq!(
            results[1].commit_log.converged,
            true,
        );
    }

    #[tokio::test]
    async fn replay_reproduces_the_live_marking() {
        let store = Arc::new(TieredEventStore::default());
        let mut executor = WorkflowExecutor::new(linear_net(), "wf-replay", store);
        executor
            .run_to_completion(&ExecutionContext::new(), 10)
            .await
            .unwrap();

        let replayed = executor.replayed_marking().unwrap();
        assert_eq!(&replayed, executor.marking());
    }

    #[tokio::test]
    async fn mi_spawn_and_complete_leave_events() {
        use crate::mi::MiVariant;

        let store = Arc::new(TieredEventStore::default());
        let mut executor =
            WorkflowExecutor::new(linear_net(), "wf-mi", Arc::clone(&store));

        let spawn = executor
            .spawn_instances(
                "t1",
                &MiVariant::DesignTime { required: 3 },
                &ExecutionContext::new(),
            )
            .unwrap();
        assert_eq!(spawn.instance_ids.len(), 3);

        assert!(executor.complete_instance(&spawn.instance_ids[0]).unwrap());
        // Second completion of the same instance is a no-op
        assert!(!executor.complete_instance(&spawn.instance_ids[0]).unwrap());

        let spawns = store
            .query_range(&kgflow_temporal::RangeQuery {
                workflow_id: Some("wf-mi".to_string()),
                kinds: Some(vec![EventKind::MiSpawn]),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(spawns.total_count, 3);

        let completions = store
            .query_range(&kgflow_temporal::RangeQuery {
                workflow_id: Some("wf-mi".to_string()),
                kinds: Some(vec![EventKind::MiComplete]),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(completions.total_count, 1);
    }

    #[tokio::test]
    async fn bounded_loop_records_cancellation() {
        use crate::loops::{LoopKind, StructuredLoop};

        let store = Arc::new(TieredEventStore::default());
        let mut executor =
            WorkflowExecutor::new(linear_net(), "wf-loop", Arc::clone(&store));

        let outcome = executor
            .execute_loop(
                "t1",
                &StructuredLoop::new(LoopKind::While, 5),
                "true",
                &ExecutionContext::new(),
                |_, _| Ok(Map::new()),
            )
            .unwrap();
        assert_eq!(outcome.total_iterations, 5);
        assert!(outcome.bound_reached);

        let events = store
            .query_range(&kgflow_temporal::RangeQuery {
                workflow_id: Some("wf-loop".to_string()),
                kinds: Some(vec![EventKind::Cancellation]),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(events.total_count, 1);
    }

    #[tokio::test]
    async fn recursion_bound_records_cancellation() {
        use crate::recursion::RecursionManager;

        let store = Arc::new(TieredEventStore::default());
        let mut executor =
            WorkflowExecutor::new(linear_net(), "wf-recurse", Arc::clone(&store));
        let manager = RecursionManager::new(1);
        let ctx = ExecutionContext::new();

        let root = executor
            .push_recursion(&manager, None, "wf-recurse", "p0", &ctx)
            .unwrap();
        let err = executor
            .push_recursion(&manager, Some(&root), "wf-recurse", "p1", &ctx)
            .unwrap_err();
        assert!(matches!(err, PatternError::MaxRecursionExceeded(1)));

        let events = store
            .query_range(&kgflow_temporal::RangeQuery {
                workflow_id: Some("wf-recurse".to_string()),
                kinds: Some(vec![EventKind::Cancellation]),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(events.total_count, 1);
    }

    #[tokio::test]
    async fn cancellation_emits_event_and_resets_tokens() {
        let store = Arc::new(TieredEventStore::default());
        let mut executor = WorkflowExecutor::new(linear_net(), "wf-cancel", Arc::clone(&store));
        executor.run_tick(&ExecutionContext::new()).await.unwrap();
        assert_eq!(executor.marking().get("p1"), 1);

        let region = CancellationRegion::new("t2", ["p1".to_string()]);
        let report = executor.cancel_task(&region).unwrap();
        assert_eq!(report.tokens_removed, 1);
        assert_eq!(executor.marking().get("p1"), 0);

        let cancellations = store
            .query_range(&kgflow_temporal::RangeQuery {
                workflow_id: Some("wf-cancel".to_string()),
                kinds: Some(vec![EventKind::Cancellation]),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cancellations.total_count, 1);
    }
}
