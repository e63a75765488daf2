//! Execution context and result types shared by every pattern

use kgflow_optimizer::expr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key-value map carrying guard variables, loop variables, MI parameters
/// and hook-visible data for one execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    values: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn merge(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Environment for the restricted expression evaluator
    pub fn expr_env(&self) -> BTreeMap<String, expr::Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), expr::Value::from(v.clone())))
            .collect()
    }

    /// Evaluate a guard expression; unresolvable or erroring guards are
    /// false rather than fatal
    pub fn guard_holds(&self, guard: &str) -> bool {
        expr::eval_predicate(guard, &self.expr_env()).unwrap_or(false)
    }
}

/// Structured outcome of one task or pattern execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub output_data: Map<String, Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ExecutionResult {
    pub fn ok(output_data: Map<String, Value>) -> Self {
        Self {
            success: true,
            output_data,
            error_message: None,
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            success: false,
            output_data: Map::new(),
            error_message: Some(message.to_string()),
        }
    }
}
