//! Structured loops with a hard iteration bound.
//!
//! WHILE tests before iterating, DO-WHILE after, UNTIL runs to a true
//! condition, FOR runs a fixed count. Reaching `max_iterations` terminates
//! the loop normally whatever the condition says; the bound is a contract,
//! not a panic.

use crate::context::{ExecutionContext, ExecutionResult};
use crate::error::PatternResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Iteration strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    While,
    For,
    DoWhile,
    Until,
}

/// Immutable per-iteration state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    pub iteration: u64,
    pub max_iterations: u64,
    pub condition: String,
    pub variables: Map<String, Value>,
    pub completed: bool,
}

impl LoopState {
    pub fn new(condition: &str, max_iterations: u64) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            condition: condition.to_string(),
            variables: Map::new(),
            completed: false,
        }
    }

    pub fn next_iteration(&self) -> LoopState {
        LoopState {
            iteration: self.iteration + 1,
            ..self.clone()
        }
    }

    pub fn with_variables(&self, variables: Map<String, Value>) -> LoopState {
        let mut merged = self.variables.clone();
        merged.extend(variables);
        LoopState {
            variables: merged,
            ..self.clone()
        }
    }

    pub fn mark_completed(&self) -> LoopState {
        LoopState {
            completed: true,
            ..self.clone()
        }
    }
}

/// Loop execution summary
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub total_iterations: u64,
    /// True when the iteration bound, not the condition, ended the loop
    pub bound_reached: bool,
    pub final_state: LoopState,
}

/// A structured loop bound to a condition and iteration cap
#[derive(Debug, Clone)]
pub struct StructuredLoop {
    pub kind: LoopKind,
    pub max_iterations: u64,
}

impl StructuredLoop {
    pub fn new(kind: LoopKind, max_iterations: u64) -> Self {
        Self {
            kind,
            max_iterations: max_iterations.max(1),
        }
    }

    fn should_continue(&self, state: &LoopState, ctx: &ExecutionContext) -> bool {
        if state.iteration >= state.max_iterations {
            return false;
        }
        let mut merged = ctx.clone();
        merged.merge(&state.variables);
        merged.set("iteration", json!(state.iteration));
        let holds = merged.guard_holds(&state.condition);
        match self.kind {
            LoopKind::Until => !holds,
            _ => holds,
        }
    }

    /// Drive the loop to termination. `body` runs once per iteration and
    /// returns variables merged into the loop state.
    pub fn execute<F>(
        &self,
        condition: &str,
        ctx: &ExecutionContext,
        mut body: F,
    ) -> PatternResult<LoopOutcome>
    where
        F: FnMut(&LoopState, &ExecutionContext) -> PatternResult<Map<String, Value>>,
    {
        let mut state = LoopState::new(condition, self.max_iterations);
        let mut iterations = 0u64;

        loop {
            let proceed = match self.kind {
                LoopKind::For => state.iteration < self.max_iterations,
                LoopKind::DoWhile if iterations == 0 => state.iteration < state.max_iterations,
                _ => self.should_continue(&state, ctx),
            };
            if !proceed || state.completed {
                break;
            }

            let variables = body(&state, ctx)?;
            state = state.next_iteration().with_variables(variables);
            iterations += 1;
        }

        let bound_reached = state.iteration >= state.max_iterations;
        if bound_reached {
            debug!(
                iterations,
                max = self.max_iterations,
                "loop terminated at iteration bound"
            );
        }
        Ok(LoopOutcome {
            total_iterations: iterations,
            bound_reached,
            final_state: state.mark_completed(),
        })
    }

    /// Execute and wrap as a task result
    pub fn execute_as_result(&self, condition: &str, ctx: &ExecutionContext) -> ExecutionResult {
        match self.execute(condition, ctx, |state, _| {
            Ok(Map::from_iter([(
                "iteration".to_string(),
                json!(state.iteration),
            )]))
        }) {
            Ok(outcome) => {
                let mut output = Map::new();
                output.insert(
                    "total_iterations".to_string(),
                    json!(outcome.total_iterations),
                );
                output.insert("bound_reached".to_string(), json!(outcome.bound_reached));
                ExecutionResult::ok(output)
            }
            Err(e) => ExecutionResult::fail(&e.to_string()),
        }
    }
}
