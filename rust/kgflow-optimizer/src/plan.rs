//! Logical query plans: ordered steps with cost estimates and dependencies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Relational operations the cost model understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Scan,
    Filter,
    Join,
    Project,
    Aggregate,
    Sort,
}

impl Operation {
    /// Base cost per row processed
    pub fn base_cost(&self) -> f64 {
        match self {
            Operation::Scan => 10.0,
            Operation::Filter => 1.0,
            Operation::Join => 50.0,
            Operation::Project => 2.0,
            Operation::Aggregate => 15.0,
            Operation::Sort => 25.0,
        }
    }
}

/// Single step of a logical plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStep {
    pub step_id: u64,
    pub operation: Operation,
    #[serde(default = "default_cardinality")]
    pub cardinality: f64,
    #[serde(default)]
    pub dependencies: Vec<u64>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub output_columns: Vec<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_cardinality() -> f64 {
    1.0
}

impl QueryStep {
    pub fn new(step_id: u64, operation: Operation, cardinality: f64) -> Self {
        Self {
            step_id,
            operation,
            cardinality,
            dependencies: Vec::new(),
            predicate: None,
            columns: Vec::new(),
            output_columns: Vec::new(),
            expression: None,
            metadata: Map::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<u64>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_predicate(mut self, predicate: &str) -> Self {
        self.predicate = Some(predicate.to_string());
        self
    }

    pub fn with_expression(mut self, expression: &str) -> Self {
        self.expression = Some(expression.to_string());
        self
    }

    /// Cost of this step: operation base cost times estimated cardinality
    pub fn cost(&self) -> f64 {
        self.operation.base_cost() * self.cardinality
    }
}

/// Ordered list of steps forming one logical plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub steps: Vec<QueryStep>,
}

impl QueryPlan {
    pub fn new(steps: Vec<QueryStep>) -> Self {
        Self { steps }
    }

    pub fn total_cost(&self) -> f64 {
        self.steps.iter().map(QueryStep::cost).sum()
    }
}

/// Outcome of a dark-matter optimization pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedPlan {
    pub original_cost: f64,
    pub optimized_cost: f64,
    pub rules_applied: Vec<String>,
    /// Indexes into `steps` that can run concurrently
    pub parallelizable_steps: Vec<usize>,
    pub estimated_improvement_percent: f64,
    /// Step ids on the cost-weighted longest dependency path
    pub critical_path: Vec<u64>,
    pub metadata: Map<String, Value>,
    /// The rewritten steps
    pub steps: Vec<QueryStep>,
}
