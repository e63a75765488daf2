// End-to-end workflow flows: linear execution, AND-split/join, guarded
// XOR routing, with the temporal store and soundness verifier in the loop.

use kgflow_net::{
    create_arc, create_place, create_transition, create_workflow_net, Marking, SoundnessVerifier,
    WorkflowNet,
};
use kgflow_patterns::{ExecutionContext, GuardedBranch, WorkflowExecutor, XorSplit};
use kgflow_temporal::{EventKind, RangeQuery, TieredEventStore};
use serde_json::json;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

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

fn and_net() -> WorkflowNet {
    create_workflow_net(
        vec![
            create_place("i", true, false),
            create_place("p1", false, false),
            create_place("p2", false, false),
            create_place("p3", false, false),
            create_place("p4", false, false),
            create_place("o", false, true),
        ],
        vec![
            create_transition("t_split", "Split"),
            create_transition("t2", "Branch A"),
            create_transition("t3", "Branch B"),
            create_transition("t_join", "Join"),
        ],
        vec![
            create_arc("i", "t_split"),
            create_arc("t_split", "p1"),
            create_arc("t_split", "p2"),
            create_arc("p1", "t2"),
            create_arc("p2", "t3"),
            create_arc("t2", "p3"),
            create_arc("t3", "p4"),
            create_arc("p3", "t_join"),
            create_arc("p4", "t_join"),
            create_arc("t_join", "o"),
        ],
        "and-split-join",
    )
    .unwrap()
}

// Linear workflow: marking traces {i:1} -> {p1:1} -> {o:1}, the event
// store holds TICK_START / STATUS_CHANGE / TICK_END per tick, and the
// soundness verifier agrees the net is sound.
#[tokio::test]
async fn linear_workflow_end_to_end() {
    init_tracing();
    let store = Arc::new(TieredEventStore::default());
    let net = linear_net();
    let mut executor = WorkflowExecutor::new(net.clone(), "wf-e2e-linear", Arc::clone(&store));
    let ctx = ExecutionContext::new();

    assert_eq!(executor.marking(), &Marking::from([("i", 1)]));

    let first = executor.run_tick(&ctx).await.unwrap();
    assert_eq!(first.fired.as_deref(), Some("t1"));
    assert_eq!(executor.marking(), &Marking::from([("p1", 1)]));

    let second = executor.run_tick(&ctx).await.unwrap();
    assert_eq!(second.fired.as_deref(), Some("t2"));
    assert_eq!(executor.marking(), &Marking::from([("o", 1)]));
    assert!(executor.is_complete());

    // Each tick leaves TICK_START, STATUS_CHANGE and TICK_END
    for kind in [EventKind::TickStart, EventKind::StatusChange, EventKind::TickEnd] {
        let events = store
            .query_range(&RangeQuery {
                workflow_id: Some("wf-e2e-linear".to_string()),
                kinds: Some(vec![kind]),
                limit: 100,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(events.total_count, 2, "expected two {kind:?} events");
    }

    // The persisted chain is intact
    let (ok, reason) = store.verify_chain_integrity("wf-e2e-linear").unwrap();
    assert!(ok, "{reason}");

    // Soundness: 3 reachable markings, no dead transitions
    let soundness = SoundnessVerifier::default().verify(&net);
    assert!(soundness.is_sound);
    assert_eq!(soundness.reachable_markings, 3);
    assert!(soundness.dead_transitions.is_empty());
}

// AND-split then AND-join: both branches run, the join fires exactly
// once, and the workflow ends with a single token in the sink.
#[tokio::test]
async fn and_split_join_end_to_end() {
    let store = Arc::new(TieredEventStore::default());
    let net = and_net();
    let mut executor = WorkflowExecutor::new(net.clone(), "wf-e2e-and", Arc::clone(&store));
    let ctx = ExecutionContext::new();

    let results = executor.run_to_completion(&ctx, 10).await.unwrap();
    assert!(executor.is_complete());
    assert_eq!(executor.marking(), &Marking::from([("o", 1)]));

    let fired: Vec<String> = results.iter().filter_map(|r| r.fired.clone()).collect();
    assert_eq!(fired.first().map(String::as_str), Some("t_split"));
    assert_eq!(fired.last().map(String::as_str), Some("t_join"));
    assert_eq!(fired.iter().filter(|t| t.as_str() == "t_join").count(), 1);

    // The split produced a SPLIT event, the join a JOIN event
    let splits = store
        .query_range(&RangeQuery {
            workflow_id: Some("wf-e2e-and".to_string()),
            kinds: Some(vec![EventKind::Split]),
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(splits.total_count, 1);
    let joins = store
        .query_range(&RangeQuery {
            workflow_id: Some("wf-e2e-and".to_string()),
            kinds: Some(vec![EventKind::Join]),
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(joins.total_count, 1);

    let soundness = SoundnessVerifier::default().verify(&net);
    assert!(soundness.is_sound);
    assert!(soundness.dead_transitions.is_empty());
}

// Guarded XOR routing: amount <= 1000 takes branch A, otherwise branch B;
// exactly one STATUS_CHANGE is recorded per executor tick.
#[tokio::test]
async fn xor_split_routes_by_guard() {
    let split = XorSplit::new(
        "route-order",
        "pending",
        vec![
            GuardedBranch::new("branch_a", Some("amount <= 1000")),
            GuardedBranch::new("branch_b", Some("amount > 1000")),
        ],
    );
    let marking = Marking::from([("pending", 1)]);

    let mut ctx = ExecutionContext::new();
    ctx.set("amount", json!(500));
    let (after_a, chosen) = split.fire(&marking, &ctx).unwrap();
    assert_eq!(chosen, "branch_a");
    assert_eq!(after_a.get("branch_a"), 1);
    assert_eq!(after_a.get("branch_b"), 0);

    ctx.set("amount", json!(2000));
    let (after_b, chosen) = split.fire(&marking, &ctx).unwrap();
    assert_eq!(chosen, "branch_b");
    assert_eq!(after_b.get("branch_b"), 1);
    assert_eq!(after_b.get("branch_a"), 0);

    // One STATUS_CHANGE per tick on the driving executor
    let store = Arc::new(TieredEventStore::default());
    let mut executor =
        WorkflowExecutor::new(linear_net(), "wf-e2e-xor", Arc::clone(&store));
    let run_ctx = ExecutionContext::new();
    for expected_ticks in 1..=2u64 {
        executor.run_tick(&run_ctx).await.unwrap();
        let status_changes = store
            .query_range(&RangeQuery {
                workflow_id: Some("wf-e2e-xor".to_string()),
                kinds: Some(vec![EventKind::StatusChange]),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(status_changes.total_count as u64, expected_ticks);
    }
}

// A PRE_TRANSACTION hook gates the tick: over-limit amounts roll the
// tick back with the marking unchanged, in-limit amounts pass.
#[tokio::test]
async fn pre_transaction_hook_gates_the_tick() {
    use kgflow_unrdf::{
        Condition, HookAction, HookExecutor, HookPhase, HookRegistry, KnowledgeHook,
        MemoryStore, ThresholdOp, TripleStore,
    };

    let registry = Arc::new(HookRegistry::new());
    registry
        .register(
            KnowledgeHook::new(
                "credit-limit",
                "Credit Limit Guard",
                HookPhase::PreTransaction,
                Condition::Threshold {
                    variable: "amount".to_string(),
                    op: ThresholdOp::Gt,
                    value: 1000.0,
                },
            )
            .with_action(HookAction::Reject)
            .with_handler_data(
                [("reason".to_string(), json!("amount exceeds credit limit"))]
                    .into_iter()
                    .collect(),
            ),
        )
        .unwrap();

    let hooks = Arc::new(HookExecutor::new(registry));
    let graph: Arc<dyn TripleStore> = Arc::new(MemoryStore::new());
    let store = Arc::new(TieredEventStore::default());
    let mut executor = WorkflowExecutor::new(linear_net(), "wf-gated", Arc::clone(&store))
        .with_hooks(hooks, graph);

    let mut over_limit = ExecutionContext::new();
    over_limit.set("amount", json!(5000));
    let rejected = executor.run_tick(&over_limit).await.unwrap();
    assert!(rejected.fired.is_none());
    assert!(!rejected.result.success);
    assert_eq!(
        rejected.result.error_message.as_deref(),
        Some("amount exceeds credit limit")
    );
    assert_eq!(executor.marking(), &Marking::from([("i", 1)]));

    let mut in_limit = ExecutionContext::new();
    in_limit.set("amount", json!(200));
    let accepted = executor.run_tick(&in_limit).await.unwrap();
    assert_eq!(accepted.fired.as_deref(), Some("t1"));
    assert_eq!(executor.marking(), &Marking::from([("p1", 1)]));

    // Hook activity itself is on the event log
    let hook_events = store
        .query_range(&RangeQuery {
            workflow_id: Some("wf-gated".to_string()),
            kinds: Some(vec![EventKind::HookExecution]),
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert!(hook_events.total_count >= 2);
}

// Reducing the event log reproduces the final marking reached live.
#[tokio::test]
async fn event_log_reduction_matches_live_state() {
    let store = Arc::new(TieredEventStore::default());
    let mut executor = WorkflowExecutor::new(and_net(), "wf-e2e-replay", store);
    executor
        .run_to_completion(&ExecutionContext::new(), 10)
        .await
        .unwrap();

    let replayed = executor.replayed_marking().unwrap();
    assert_eq!(&replayed, executor.marking());
    assert_eq!(replayed, Marking::from([("o", 1)]));
}
