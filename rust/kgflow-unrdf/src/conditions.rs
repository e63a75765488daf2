//! Condition tree for hook triggering.
//!
//! Each node is one variant of a tagged sum type; composites recurse over
//! child variants and combine without short-circuit. Evaluation is async
//! because SPARQL round-trips and file resolution are suspension points.

use crate::cache::QueryCache;
use crate::error::{UnrdfError, UnrdfResult};
use crate::resolver::{FileRef, FileResolver};
use crate::store::TripleStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one condition evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResult {
    pub triggered: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ConditionResult {
    fn new(triggered: bool, metadata: Map<String, Value>) -> Self {
        Self {
            triggered,
            metadata,
        }
    }
}

/// Inline query text or an integrity-checked file reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuerySource {
    Inline(String),
    Ref(FileRef),
}

impl QuerySource {
    /// Inline text, when no file resolution is needed
    pub fn inline_text(&self) -> Option<&str> {
        match self {
            QuerySource::Inline(text) => Some(text),
            QuerySource::Ref(_) => None,
        }
    }

    async fn resolve(&self, resolver: Option<&Arc<dyn FileResolver>>) -> UnrdfResult<String> {
        match self {
            QuerySource::Inline(text) => Ok(text.clone()),
            QuerySource::Ref(reference) => match resolver {
                Some(resolver) => resolver.load(reference).await,
                None => Err(UnrdfError::Validation(
                    "condition carries a file ref but no resolver is bound".to_string(),
                )),
            },
        }
    }
}

/// Direction of change a delta condition watches for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Any,
    Increase,
    Decrease,
}

/// Comparison operators shared by threshold and window conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOp {
    Gt,
    Lt,
    Eq,
    Ne,
    Ge,
    Le,
}

impl ThresholdOp {
    pub fn compare(&self, actual: f64, threshold: f64) -> bool {
        match self {
            ThresholdOp::Gt => actual > threshold,
            ThresholdOp::Lt => actual < threshold,
            ThresholdOp::Eq => actual == threshold,
            ThresholdOp::Ne => actual != threshold,
            ThresholdOp::Ge => actual >= threshold,
            ThresholdOp::Le => actual <= threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdOp::Gt => "gt",
            ThresholdOp::Lt => "lt",
            ThresholdOp::Eq => "eq",
            ThresholdOp::Ne => "ne",
            ThresholdOp::Ge => "ge",
            ThresholdOp::Le => "le",
        }
    }
}

/// Window aggregation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

/// Boolean combinators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeOp {
    And,
    Or,
    Not,
}

/// One time-series sample for window conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

/// Tagged condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    SparqlAsk {
        source: QuerySource,
        #[serde(default)]
        bindings: Map<String, Value>,
        #[serde(default = "default_true")]
        use_cache: bool,
    },
    SparqlSelect {
        query: String,
        #[serde(default = "default_true")]
        use_cache: bool,
    },
    Shacl {
        shapes: String,
    },
    Delta {
        delta_kind: DeltaKind,
        query: String,
    },
    Threshold {
        variable: String,
        op: ThresholdOp,
        value: f64,
    },
    Window {
        variable: String,
        window_seconds: f64,
        aggregation: Aggregation,
        op: ThresholdOp,
        threshold: f64,
    },
    Composite {
        op: CompositeOp,
        children: Vec<Condition>,
    },
}

fn default_true() -> bool {
    true
}

/// Everything a condition may consult during evaluation
#[derive(Clone, Default)]
pub struct ConditionContext {
    pub store: Option<Arc<dyn TripleStore>>,
    pub resolver: Option<Arc<dyn FileResolver>>,
    pub cache: Option<Arc<QueryCache>>,
    /// Scalar context variables (counts, thresholds, guard data)
    pub values: Map<String, Value>,
    pub time_series: Vec<TimeSeriesPoint>,
}

impl ConditionContext {
    pub fn with_store(store: Arc<dyn TripleStore>) -> Self {
        Self {
            store: Some(store),
            ..Default::default()
        }
    }

    fn number(&self, variable: &str) -> Option<f64> {
        self.values.get(variable).and_then(Value::as_f64)
    }
}

impl Condition {
    /// Convenience constructors for the common shapes
    pub fn sparql_ask(query: &str) -> Self {
        Condition::SparqlAsk {
            source: QuerySource::Inline(query.to_string()),
            bindings: Map::new(),
            use_cache: true,
        }
    }

    pub fn sparql_ask_ref(reference: FileRef) -> Self {
        Condition::SparqlAsk {
            source: QuerySource::Ref(reference),
            bindings: Map::new(),
            use_cache: true,
        }
    }

    pub fn not(child: Condition) -> Self {
        Condition::Composite {
            op: CompositeOp::Not,
            children: vec![child],
        }
    }

    /// Inline query text, where present (used by registration checks)
    pub fn inline_query_text(&self) -> Option<&str> {
        match self {
            Condition::SparqlAsk { source, .. } => source.inline_text(),
            Condition::SparqlSelect { query, .. } => Some(query),
            Condition::Delta { query, .. } => Some(query),
            _ => None,
        }
    }

    /// Structural validation: NOT takes exactly one child, AND/OR at least
    /// one, recursively.
    pub fn validate(&self) -> UnrdfResult<()> {
        if let Condition::Composite { op, children } = self {
            match op {
                CompositeOp::Not if children.len() != 1 => {
                    return Err(UnrdfError::Validation(format!(
                        "NOT requires exactly one child, got {}",
                        children.len()
                    )));
                }
                CompositeOp::And | CompositeOp::Or if children.is_empty() => {
                    return Err(UnrdfError::Validation(
                        "AND/OR require at least one child".to_string(),
                    ));
                }
                _ => {}
            }
            for child in children {
                child.validate()?;
            }
        }
        Ok(())
    }

    /// Evaluate this condition against the context
    pub fn evaluate<'a>(
        &'a self,
        ctx: &'a ConditionContext,
    ) -> BoxFuture<'a, UnrdfResult<ConditionResult>> {
        Box::pin(async move {
            match self {
                Condition::SparqlAsk {
                    source,
                    bindings,
                    use_cache,
                } => {
                    let query = source.resolve(ctx.resolver.as_ref()).await?;
                    if *use_cache {
                        if let Some(cache) = &ctx.cache {
                            if let Some(cached) = cache.get(&query) {
                                let triggered = cached.as_bool().unwrap_or(false);
                                return Ok(ConditionResult::new(
                                    triggered,
                                    metadata(&[
                                        ("type", json!("sparql_ask")),
                                        ("query", json!(query)),
                                        ("cache_hit", json!(true)),
                                    ]),
                                ));
                            }
                        }
                    }
                    let store = bound_store(ctx)?;
                    let outcome = store.query(&query).await?;
                    let triggered = outcome.as_bool();
                    if *use_cache {
                        if let Some(cache) = &ctx.cache {
                            cache.set(&query, json!(triggered));
                        }
                    }
                    let mut meta = metadata(&[
                        ("type", json!("sparql_ask")),
                        ("query", json!(query)),
                        ("cache_hit", json!(false)),
                    ]);
                    if !bindings.is_empty() {
                        meta.insert("bindings".to_string(), Value::Object(bindings.clone()));
                    }
                    Ok(ConditionResult::new(triggered, meta))
                }

                Condition::SparqlSelect { query, use_cache } => {
                    if *use_cache {
                        if let Some(cache) = &ctx.cache {
                            if let Some(cached) = cache.get(query) {
                                let count =
                                    cached.as_array().map(|rows| rows.len()).unwrap_or(0);
                                return Ok(ConditionResult::new(
                                    count > 0,
                                    metadata(&[
                                        ("type", json!("sparql_select")),
                                        ("query", json!(query)),
                                        ("result_count", json!(count)),
                                        ("cache_hit", json!(true)),
                                    ]),
                                ));
                            }
                        }
                    }
                    let store = bound_store(ctx)?;
                    let outcome = store.query(query).await?;
                    let count = outcome.row_count();
                    if *use_cache {
                        if let Some(cache) = &ctx.cache {
                            cache.set(query, json!(vec![json!({}); count]));
                        }
                    }
                    Ok(ConditionResult::new(
                        count > 0,
                        metadata(&[
                            ("type", json!("sparql_select")),
                            ("query", json!(query)),
                            ("result_count", json!(count)),
                            ("cache_hit", json!(false)),
                        ]),
                    ))
                }

                Condition::Shacl { shapes } => {
                    let store = bound_store(ctx)?;
                    let violations = crate::conditions::shacl::check(shapes, store).await?;
                    let conforms = violations.is_empty();
                    Ok(ConditionResult::new(
                        conforms,
                        metadata(&[
                            ("type", json!("shacl")),
                            ("conforms", json!(conforms)),
                            ("violations", json!(violations)),
                        ]),
                    ))
                }

                Condition::Delta { delta_kind, query } => {
                    let previous = ctx.number("previous_count").unwrap_or(0.0);
                    let current = ctx.number("current_count").unwrap_or(0.0);
                    let delta = current - previous;
                    let triggered = match delta_kind {
                        DeltaKind::Any => delta != 0.0,
                        DeltaKind::Increase => delta > 0.0,
                        DeltaKind::Decrease => delta < 0.0,
                    };
                    Ok(ConditionResult::new(
                        triggered,
                        metadata(&[
                            ("type", json!("delta")),
                            ("query", json!(query)),
                            ("previous", json!(previous)),
                            ("current", json!(current)),
                            ("delta", json!(delta)),
                        ]),
                    ))
                }

                Condition::Threshold {
                    variable,
                    op,
                    value,
                } => match ctx.number(variable) {
                    Some(actual) => Ok(ConditionResult::new(
                        op.compare(actual, *value),
                        metadata(&[
                            ("type", json!("threshold")),
                            ("variable", json!(variable)),
                            ("operator", json!(op.as_str())),
                            ("threshold", json!(value)),
                            ("actual_value", json!(actual)),
                        ]),
                    )),
                    None => Ok(ConditionResult::new(
                        false,
                        metadata(&[
                            ("type", json!("threshold")),
                            ("error", json!(format!("Variable '{variable}' not found"))),
                        ]),
                    )),
                },

                Condition::Window {
                    variable,
                    window_seconds,
                    aggregation,
                    op,
                    threshold,
                } => {
                    let window_start = Utc::now()
                        - ChronoDuration::milliseconds((window_seconds * 1000.0) as i64);
                    let samples: Vec<f64> = ctx
                        .time_series
                        .iter()
                        .filter(|p| p.timestamp >= window_start)
                        .filter_map(|p| p.values.get(variable).copied())
                        .collect();

                    let aggregated = if samples.is_empty() {
                        0.0
                    } else {
                        match aggregation {
                            Aggregation::Sum => samples.iter().sum(),
                            Aggregation::Avg => {
                                samples.iter().sum::<f64>() / samples.len() as f64
                            }
                            Aggregation::Min => {
                                samples.iter().copied().fold(f64::INFINITY, f64::min)
                            }
                            Aggregation::Max => {
                                samples.iter().copied().fold(f64::NEG_INFINITY, f64::max)
                            }
                            Aggregation::Count => samples.len() as f64,
                        }
                    };

                    Ok(ConditionResult::new(
                        op.compare(aggregated, *threshold),
                        metadata(&[
                            ("type", json!("window")),
                            ("variable", json!(variable)),
                            ("window_seconds", json!(window_seconds)),
                            ("aggregated_value", json!(aggregated)),
                            ("threshold", json!(threshold)),
                            ("operator", json!(op.as_str())),
                            ("count", json!(samples.len())),
                        ]),
                    ))
                }

                Condition::Composite { op, children } => {
                    // All children evaluate; no short-circuit
                    let mut results = Vec::with_capacity(children.len());
                    for child in children {
                        results.push(child.evaluate(ctx).await?);
                    }
                    let triggered = match op {
                        CompositeOp::And => results.iter().all(|r| r.triggered),
                        CompositeOp::Or => results.iter().any(|r| r.triggered),
                        CompositeOp::Not => {
                            results.first().map(|r| !r.triggered).unwrap_or(false)
                        }
                    };
                    let child_results: Vec<Value> = results
                        .iter()
                        .map(|r| {
                            json!({
                                "triggered": r.triggered,
                                "metadata": r.metadata,
                            })
                        })
                        .collect();
                    Ok(ConditionResult::new(
                        triggered,
                        metadata(&[
                            ("type", json!("composite")),
                            (
                                "operator",
                                json!(match op {
                                    CompositeOp::And => "and",
                                    CompositeOp::Or => "or",
                                    CompositeOp::Not => "not",
                                }),
                            ),
                            ("child_results", Value::Array(child_results)),
                        ]),
                    ))
                }
            }
        })
    }

    /// Evaluate with a wall-clock deadline; expiry fails with `Timeout`
    pub async fn evaluate_with_timeout(
        &self,
        ctx: &ConditionContext,
        timeout: Duration,
    ) -> UnrdfResult<ConditionResult> {
        tokio::time::timeout(timeout, self.evaluate(ctx))
            .await
            .map_err(|_| UnrdfError::Timeout)?
    }
}

fn bound_store(ctx: &ConditionContext) -> UnrdfResult<&Arc<dyn TripleStore>> {
    ctx.store
        .as_ref()
        .ok_or_else(|| UnrdfError::Validation("no triple store bound to context".to_string()))
}

fn metadata(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Memoizes a condition result for a configurable TTL
pub struct MemoizedCondition {
    pub condition: Condition,
    ttl: ChronoDuration,
    cached: Mutex<Option<(ConditionResult, DateTime<Utc>)>>,
}

impl MemoizedCondition {
    pub fn new(condition: Condition, ttl: Duration) -> Self {
        Self {
            condition,
            ttl: ChronoDuration::milliseconds(ttl.as_millis() as i64),
            cached: Mutex::new(None),
        }
    }

    pub async fn evaluate_with_cache(
        &self,
        ctx: &ConditionContext,
    ) -> UnrdfResult<ConditionResult> {
        {
            let cached = self.cached.lock();
            if let Some((result, at)) = cached.as_ref() {
                if Utc::now() - *at < self.ttl {
                    return Ok(result.clone());
                }
            }
        }
        let result = self.condition.evaluate(ctx).await?;
        *self.cached.lock() = Some((result.clone(), Utc::now()));
        Ok(result)
    }
}

mod shacl {
    //! Minimal SHACL core subset: `sh:targetClass` + `sh:path` property
    //! shapes checked as "every instance carries the property".

    use crate::error::UnrdfResult;
    use crate::store::TripleStore;
    use std::sync::Arc;

    pub async fn check(
        shapes: &str,
        store: &Arc<dyn TripleStore>,
    ) -> UnrdfResult<Vec<String>> {
        let target_classes = extract_iris(shapes, "sh:targetClass");
        let paths = extract_iris(shapes, "sh:path");
        let mut violations = Vec::new();

        for class in &target_classes {
            for path in &paths {
                let query = format!(
                    "ASK {{ ?s a <{class}> FILTER NOT EXISTS {{ ?s <{path}> ?v }} }}"
                );
                if store.query(&query).await?.as_bool() {
                    violations.push(format!(
                        "instances of <{class}> missing required property <{path}>"
                    ));
                }
            }
        }
        Ok(violations)
    }

    fn extract_iris(shapes: &str, keyword: &str) -> Vec<String> {
        let mut iris = Vec::new();
        let mut rest = shapes;
        while let Some(pos) = rest.find(keyword) {
            rest = &rest[pos + keyword.len()..];
            if let Some(open) = rest.find('<') {
                if let Some(close) = rest[open..].find('>') {
                    iris.push(rest[open + 1..open + close].to_string());
                    rest = &rest[open + close..];
                    continue;
                }
            }
            break;
        }
        iris
    }
}
