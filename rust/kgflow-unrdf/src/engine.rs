//! Engine facade: transactions over the triple store with hook coupling.
//!
//! PRE_TRANSACTION hooks see the staged delta overlaid on the committed
//! graph and may reject. POST_TRANSACTION hooks run after the delta is
//! applied but before the transaction is marked committed, and can still
//! force a revert. POST_COMMIT hooks run last and only observe.

use crate::error::{UnrdfError, UnrdfResult};
use crate::executor::{HookContext, HookExecutor};
use crate::model::HookPhase;
use crate::store::{MemoryStore, QueryOutcome, RdfFormat, Triple, TripleStore};
use crate::transaction::{ProvenanceRecord, Transaction};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// RDF engine with transactional mutation and lifecycle hooks
pub struct UnrdfEngine {
    store: Arc<dyn TripleStore>,
    executor: Option<Arc<HookExecutor>>,
    provenance: Mutex<HashMap<Triple, ProvenanceRecord>>,
    transaction_counter: AtomicU64,
}

impl UnrdfEngine {
    pub fn new(store: Arc<dyn TripleStore>) -> Self {
        Self {
            store,
            executor: None,
            provenance: Mutex::new(HashMap::new()),
            transaction_counter: AtomicU64::new(0),
        }
    }

    pub fn with_hooks(mut self, executor: Arc<HookExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn store(&self) -> &Arc<dyn TripleStore> {
        &self.store
    }

    pub fn hook_executor(&self) -> Option<&Arc<HookExecutor>> {
        self.executor.as_ref()
    }

    /// Open a transaction attributed to `agent`
    pub fn begin(&self, agent: &str, reason: Option<&str>) -> Transaction {
        let id = self.transaction_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let transaction_id = format!("txn-{id}");
        debug!(transaction_id = %transaction_id, agent, "transaction opened");
        Transaction::new(&transaction_id, ProvenanceRecord::new(agent, reason))
    }

    /// Stage an addition; the store is untouched until commit
    pub fn add_triple(&self, txn: &mut Transaction, triple: Triple) -> UnrdfResult<()> {
        if !txn.can_modify() {
            return Err(UnrdfError::TransactionFinalized(txn.transaction_id.clone()));
        }
        txn.added_triples.push(triple);
        Ok(())
    }

    /// Stage a removal; the store is untouched until commit
    pub fn remove_triple(&self, txn: &mut Transaction, triple: Triple) -> UnrdfResult<()> {
        if !txn.can_modify() {
            return Err(UnrdfError::TransactionFinalized(txn.transaction_id.clone()));
        }
        txn.removed_triples.push(triple);
        Ok(())
    }

    /// Commit: PRE_TRANSACTION gate, atomic apply, POST_TRANSACTION gate,
    /// then POST_COMMIT observers.
    pub async fn commit(&self, txn: &mut Transaction) -> UnrdfResult<()> {
        if !txn.can_modify() {
            return Err(UnrdfError::TransactionFinalized(txn.transaction_id.clone()));
        }

        if let Some(executor) = &self.executor {
            let staged = self.staged_view(txn).await?;
            let mut ctx = HookContext::new(
                HookPhase::PreTransaction,
                staged,
                &txn.transaction_id,
            );
            ctx.added = txn.added_triples.clone();
            ctx.removed = txn.removed_triples.clone();
            ctx.values = self.delta_counts(txn).await?;

            executor
                .execute_phase(HookPhase::PreTransaction, &mut ctx)
                .await?;
            txn.hook_receipts.extend(ctx.receipts.clone());

            if ctx.should_rollback() {
                txn.rolled_back = true;
                let reason = ctx
                    .rollback_reason()
                    .unwrap_or_else(|| "hook rejected transaction".to_string());
                info!(transaction_id = %txn.transaction_id, %reason, "transaction rejected");
                return Err(UnrdfError::TransactionRejected(reason));
            }

            // TRANSFORM hooks may have grown the staged delta
            txn.added_triples = ctx.added;
            txn.removed_triples = ctx.removed;
        }

        self.apply_delta(txn).await?;

        if let Some(executor) = &self.executor {
            let mut ctx = HookContext::new(
                HookPhase::PostTransaction,
                Arc::clone(&self.store),
                &txn.transaction_id,
            );
            ctx.added = txn.added_triples.clone();
            ctx.removed = txn.removed_triples.clone();
            executor
                .execute_phase(HookPhase::PostTransaction, &mut ctx)
                .await?;
            txn.hook_receipts.extend(ctx.receipts.clone());

            if ctx.should_rollback() {
                self.revert_delta(txn).await?;
                txn.rolled_back = true;
                let reason = ctx
                    .rollback_reason()
                    .unwrap_or_else(|| "hook rejected transaction".to_string());
                return Err(UnrdfError::TransactionRejected(reason));
            }
        }

        txn.committed = true;
        debug!(
            transaction_id = %txn.transaction_id,
            added = txn.added_triples.len(),
            removed = txn.removed_triples.len(),
            "transaction committed"
        );

        if let Some(executor) = &self.executor {
            // Observers only: receipts, events, scheduling
            let mut ctx = HookContext::new(
                HookPhase::PostCommit,
                Arc::clone(&self.store),
                &txn.transaction_id,
            );
            ctx.added = txn.added_triples.clone();
            ctx.removed = txn.removed_triples.clone();
            executor
                .execute_phase(HookPhase::PostCommit, &mut ctx)
                .await?;
            txn.hook_receipts.extend(ctx.receipts);
        }

        Ok(())
    }

    /// Discard the staged delta
    pub fn rollback(&self, txn: &mut Transaction) -> UnrdfResult<()> {
        if !txn.can_modify() {
            return Err(UnrdfError::TransactionFinalized(txn.transaction_id.clone()));
        }
        txn.rolled_back = true;
        debug!(
            transaction_id = %txn.transaction_id,
            discarded = txn.added_triples.len(),
            "transaction rolled back"
        );
        Ok(())
    }

    /// Query with PRE_QUERY/POST_QUERY hooks around the store round-trip
    pub async fn query(&self, sparql: &str) -> UnrdfResult<QueryOutcome> {
        let mut effective = sparql.to_string();
        if let Some(executor) = &self.executor {
            let mut ctx =
                HookContext::new(HookPhase::PreQuery, Arc::clone(&self.store), "query");
            ctx.metadata.insert("query".to_string(), json!(sparql));
            executor.execute_phase(HookPhase::PreQuery, &mut ctx).await?;
            if let Some(rewritten) = ctx.metadata.get("query").and_then(Value::as_str) {
                effective = rewritten.to_string();
            }
        }

        let outcome = self.store.query(&effective).await?;

        if let Some(executor) = &self.executor {
            let mut ctx =
                HookContext::new(HookPhase::PostQuery, Arc::clone(&self.store), "query");
            ctx.metadata.insert("query".to_string(), json!(effective));
            ctx.metadata
                .insert("result_count".to_string(), json!(outcome.row_count()));
            executor
                .execute_phase(HookPhase::PostQuery, &mut ctx)
                .await?;
        }
        Ok(outcome)
    }

    pub fn provenance_of(&self, triple: &Triple) -> Option<ProvenanceRecord> {
        self.provenance.lock().get(triple).cloned()
    }

    pub async fn stats(&self) -> UnrdfResult<Map<String, Value>> {
        let mut stats = Map::new();
        stats.insert("triple_count".to_string(), json!(self.store.len().await?));
        stats.insert(
            "provenance_count".to_string(),
            json!(self.provenance.lock().len()),
        );
        stats.insert(
            "transaction_count".to_string(),
            json!(self.transaction_counter.load(Ordering::SeqCst)),
        );
        stats.insert(
            "hooks_enabled".to_string(),
            json!(self.executor.is_some()),
        );
        Ok(stats)
    }

    /// Committed graph overlaid with the staged delta, materialized
    /// through the port so conditions can query the post-commit shape
    /// before anything is applied.
    async fn staged_view(&self, txn: &Transaction) -> UnrdfResult<Arc<dyn TripleStore>> {
        let committed = self.store.serialize(RdfFormat::NTriples).await?;
        let view = MemoryStore::new();
        view.parse(&committed, RdfFormat::NTriples).await?;
        for triple in &txn.removed_triples {
            view.remove(triple).await?;
        }
        for triple in &txn.added_triples {
            view.add(triple.clone()).await?;
        }
        Ok(Arc::new(view))
    }

    async fn delta_counts(&self, txn: &Transaction) -> UnrdfResult<Map<String, Value>> {
        let previous = self.store.len().await?;
        let current =
            previous + txn.added_triples.len() - txn.removed_triples.len().min(previous);
        let mut values = Map::new();
        values.insert("previous_count".to_string(), json!(previous));
        values.insert("current_count".to_string(), json!(current));
        Ok(values)
    }

    async fn apply_delta(&self, txn: &Transaction) -> UnrdfResult<()> {
        let mut provenance = self.provenance.lock();
        for triple in &txn.removed_triples {
            provenance.remove(triple);
        }
        drop(provenance);

        for triple in &txn.removed_triples {
            self.store.remove(triple).await?;
        }
        for triple in &txn.added_triples {
            self.store.add(triple.clone()).await?;
            self.provenance
                .lock()
                .insert(triple.clone(), txn.provenance.clone());
        }
        Ok(())
    }

    async fn revert_delta(&self, txn: &Transaction) -> UnrdfResult<()> {
        for triple in &txn.added_triples {
            self.store.remove(triple).await?;
            self.provenance.lock().remove(triple);
        }
        for triple in &txn.removed_triples {
            self.store.add(triple.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Condition;
    use crate::model::{HookAction, KnowledgeHook};
    use crate::registry::HookRegistry;
    use crate::store::Term;
    use serde_json::json;

    const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

    fn person(subject: &str) -> Triple {
        Triple::new(subject, RDF_TYPE, Term::iri("http://example.org/Person"))
    }

    fn engine_without_hooks() -> UnrdfEngine {
        UnrdfEngine::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn commit_applies_staged_delta() {
        let engine = engine_without_hooks();
        let mut txn = engine.begin("tester", Some("load"));
        engine.add_triple(&mut txn, person("urn:p:1")).unwrap();
        engine.commit(&mut txn).await.unwrap();

        assert!(txn.committed);
        assert_eq!(engine.store().len().await.unwrap(), 1);
        assert_eq!(
            engine.provenance_of(&person("urn:p:1")).unwrap().agent,
            "tester"
        );
    }

    #[tokio::test]
    async fn rollback_discards_delta() {
        let engine = engine_without_hooks();
        let mut txn = engine.begin("tester", None);
        engine.add_triple(&mut txn, person("urn:p:1")).unwrap();
        engine.rollback(&mut txn).unwrap();

        assert!(txn.rolled_back);
        assert_eq!(engine.store().len().await.unwrap(), 0);
        // Terminal transactions refuse further staging
        assert!(engine.add_triple(&mut txn, person("urn:p:2")).is_err());
    }

    #[tokio::test]
    async fn finalized_transaction_rejects_second_terminal_transition() {
        let engine = engine_without_hooks();
        let mut txn = engine.begin("tester", None);
        engine.commit(&mut txn).await.unwrap();
        assert!(matches!(
            engine.commit(&mut txn).await,
            Err(UnrdfError::TransactionFinalized(_))
        ));
        assert!(matches!(
            engine.rollback(&mut txn),
            Err(UnrdfError::TransactionFinalized(_))
        ));
    }

    // Register a PRE_TRANSACTION hook that rejects persons without names,
    // stage an anonymous person, and watch the commit bounce.
    #[tokio::test]
    async fn reject_hook_aborts_commit() {
        let registry = Arc::new(HookRegistry::new());
        registry
            .register(
                KnowledgeHook::new(
                    "require-name",
                    "Person Validator",
                    HookPhase::PreTransaction,
                    Condition::sparql_ask(
                        "PREFIX ex: <http://example.org/> ASK { ?p a ex:Person FILTER NOT EXISTS { ?p ex:name ?n } }",
                    ),
                )
                .with_action(HookAction::Reject)
                .with_handler_data(
                    [("reason".to_string(), json!("name required"))]
                        .into_iter()
                        .collect(),
                ),
            )
            .unwrap();
        registry
            .register(
                KnowledgeHook::new(
                    "audit",
                    "Audit",
                    HookPhase::PostCommit,
                    Condition::sparql_ask("ASK { ?s a <http://example.org/Person> }"),
                )
                .with_priority(10)
                .with_handler_data(
                    [("message".to_string(), json!("person committed"))]
                        .into_iter()
                        .collect(),
                ),
            )
            .unwrap();

        let executor = Arc::new(HookExecutor::new(Arc::clone(&registry)));
        let engine =
            UnrdfEngine::new(Arc::new(MemoryStore::new())).with_hooks(Arc::clone(&executor));

        let mut txn = engine.begin("tester", Some("add person"));
        engine.add_triple(&mut txn, person("urn:p:1")).unwrap();

        let err = engine.commit(&mut txn).await.unwrap_err();
        assert!(matches!(err, UnrdfError::TransactionRejected(reason) if reason == "name required"));
        assert!(txn.rolled_back);

        // Nothing visible in the store
        assert_eq!(engine.store().len().await.unwrap(), 0);

        // Receipt recorded with the REJECT action
        let receipts = registry.get_receipts(Some("require-name"));
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].action_taken, Some(HookAction::Reject));

        // POST_COMMIT hooks never fired
        assert!(registry.get_receipts(Some("audit")).is_empty());
    }

    #[tokio::test]
    async fn commit_passes_when_condition_not_triggered() {
        let registry = Arc::new(HookRegistry::new());
        registry
            .register(
                KnowledgeHook::new(
                    "require-name",
                    "Person Validator",
                    HookPhase::PreTransaction,
                    Condition::sparql_ask(
                        "PREFIX ex: <http://example.org/> ASK { ?p a ex:Person FILTER NOT EXISTS { ?p ex:name ?n } }",
                    ),
                )
                .with_action(HookAction::Reject)
                .with_handler_data(
                    [("reason".to_string(), json!("name required"))]
                        .into_iter()
                        .collect(),
                ),
            )
            .unwrap();

        let executor = Arc::new(HookExecutor::new(Arc::clone(&registry)));
        let engine =
            UnrdfEngine::new(Arc::new(MemoryStore::new())).with_hooks(executor);

        let mut txn = engine.begin("tester", None);
        engine.add_triple(&mut txn, person("urn:p:1")).unwrap();
        engine
            .add_triple(
                &mut txn,
                Triple::new("urn:p:1", "http://example.org/name", Term::literal("Ada")),
            )
            .unwrap();

        engine.commit(&mut txn).await.unwrap();
        assert!(txn.committed);
        assert_eq!(engine.store().len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn transform_hook_enriches_the_delta() {
        let registry = Arc::new(HookRegistry::new());
        let handler: Map<String, Value> = [(
            "add_triples".to_string(),
            json!([{
                "subject": "urn:audit:log",
                "predicate": "http://example.org/sawPerson",
                "object": "true",
                "object_literal": true,
            }]),
        )]
        .into_iter()
        .collect();
        registry
            .register(
                KnowledgeHook::new(
                    "annotate",
                    "Annotate",
                    HookPhase::PreTransaction,
                    Condition::sparql_ask("ASK { ?s a <http://example.org/Person> }"),
                )
                .with_action(HookAction::Transform)
                .with_handler_data(handler),
            )
            .unwrap();

        let executor = Arc::new(HookExecutor::new(registry));
        let engine =
            UnrdfEngine::new(Arc::new(MemoryStore::new())).with_hooks(executor);

        let mut txn = engine.begin("tester", None);
        engine.add_triple(&mut txn, person("urn:p:1")).unwrap();
        engine.commit(&mut txn).await.unwrap();

        // Person plus the transform's annotation
        assert_eq!(engine.store().len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn query_runs_through_hook_phases() {
        let registry = Arc::new(HookRegistry::new());
        registry
            .register(
                KnowledgeHook::new(
                    "observe-queries",
                    "Query Observer",
                    HookPhase::PostQuery,
                    Condition::sparql_ask("ASK { ?s a <http://example.org/Person> }"),
                )
                .with_priority(5)
                .with_handler_data(
                    [("message".to_string(), json!("query observed"))]
                        .into_iter()
                        .collect(),
                ),
            )
            .unwrap();

        let executor = Arc::new(HookExecutor::new(Arc::clone(&registry)));
        let engine =
            UnrdfEngine::new(Arc::new(MemoryStore::new())).with_hooks(executor);

        let mut txn = engine.begin("tester", None);
        engine.add_triple(&mut txn, person("urn:p:1")).unwrap();
        engine.commit(&mut txn).await.unwrap();

        let outcome = engine
            .query("ASK { ?s a <http://example.org/Person> }")
            .await
            .unwrap();
        assert!(outcome.as_bool());
        assert!(!registry.get_receipts(Some("observe-queries")).is_empty());
    }
}
