//! Plan rewriting and critical path analysis.
//!
//! Every rewrite rule is conservative: it may only reorder, deduplicate or
//! pre-evaluate work that provably cannot change results, and running a
//! rule twice leaves the plan unchanged.

use crate::expr;
use crate::plan::{Operation, OptimizedPlan, QueryPlan, QueryStep};
use serde_json::{json, Map};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const RULE_FILTER_PUSHDOWN: &str = "filter_pushdown";
const RULE_JOIN_REORDERING: &str = "join_reordering";
const RULE_PREDICATE_ELIMINATION: &str = "predicate_elimination";
const RULE_CONSTANT_FOLDING: &str = "constant_folding";
const RULE_PROJECTION_PUSHDOWN: &str = "projection_pushdown";

/// Cost-based plan rewriter
#[derive(Debug, Clone, Default)]
pub struct DarkMatterOptimizer;

impl DarkMatterOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Apply all rewrite rules and compute execution metadata
    pub fn optimize_query_plan(&self, plan: &QueryPlan) -> OptimizedPlan {
        let original_cost = plan.total_cost();
        let mut steps = plan.steps.clone();
        let mut rules_applied = Vec::new();

        type Rule = (&'static str, fn(&[QueryStep]) -> (bool, Vec<QueryStep>));
        let rules: [Rule; 5] = [
            (RULE_FILTER_PUSHDOWN, apply_filter_pushdown),
            (RULE_JOIN_REORDERING, apply_join_reordering),
            (RULE_PREDICATE_ELIMINATION, apply_predicate_elimination),
            (RULE_CONSTANT_FOLDING, apply_constant_folding),
            (RULE_PROJECTION_PUSHDOWN, apply_projection_pushdown),
        ];
        for (name, rule) in rules {
            let (applied, rewritten) = rule(&steps);
            if applied {
                steps = rewritten;
                rules_applied.push(name.to_string());
            }
        }

        let optimized_cost: f64 = steps.iter().map(QueryStep::cost).sum();
        let estimated_improvement_percent = if original_cost > 0.0 {
            (original_cost - optimized_cost) / original_cost * 100.0
        } else {
            0.0
        };
        let parallelizable_steps = find_parallelizable_steps(&steps);
        let critical_path = self.analyze_critical_path(&steps);

        debug!(
            original_cost,
            optimized_cost,
            rules = rules_applied.len(),
            "plan optimized"
        );

        let mut metadata = Map::new();
        metadata.insert("total_steps".to_string(), json!(steps.len()));

        OptimizedPlan {
            original_cost,
            optimized_cost,
            rules_applied,
            parallelizable_steps,
            estimated_improvement_percent,
            critical_path,
            metadata,
            steps,
        }
    }

    /// Cost-weighted longest path through the dependency graph, memoized
    pub fn analyze_critical_path(&self, steps: &[QueryStep]) -> Vec<u64> {
        if steps.is_empty() {
            return Vec::new();
        }
        let costs: HashMap<u64, f64> = steps.iter().map(|s| (s.step_id, s.cost())).collect();
        let dependencies: HashMap<u64, Vec<u64>> = steps
            .iter()
            .map(|s| (s.step_id, s.dependencies.clone()))
            .collect();

        let mut memo: HashMap<u64, (f64, Vec<u64>)> = HashMap::new();
        let mut best_cost = f64::NEG_INFINITY;
        let mut best_path = Vec::new();
        for step in steps {
            let (cost, path) = longest_path(step.step_id, &costs, &dependencies, &mut memo);
            if cost > best_cost {
                best_cost = cost;
                best_path = path;
            }
        }
        best_path
    }

    /// All pairs of steps where neither transitively depends on the other
    pub fn suggest_parallelization(&self, plan: &QueryPlan) -> Vec<(u64, u64)> {
        let closure = transitive_dependencies(&plan.steps);
        let mut pairs = Vec::new();
        for (i, a) in plan.steps.iter().enumerate() {
            for b in plan.steps.iter().skip(i + 1) {
                let a_needs_b = closure
                    .get(&a.step_id)
                    .is_some_and(|deps| deps.contains(&b.step_id));
                let b_needs_a = closure
                    .get(&b.step_id)
                    .is_some_and(|deps| deps.contains(&a.step_id));
                if !a_needs_b && !b_needs_a {
                    pairs.push((a.step_id, b.step_id));
                }
            }
        }
        pairs
    }

    /// Amdahl's law over the critical path
    pub fn estimate_speedup(&self, plan: &QueryPlan, parallel_degree: u32) -> f64 {
        let total_cost = plan.total_cost();
        let critical: HashSet<u64> = self
            .analyze_critical_path(&plan.steps)
            .into_iter()
            .collect();
        let critical_cost: f64 = plan
            .steps
            .iter()
            .filter(|s| critical.contains(&s.step_id))
            .map(QueryStep::cost)
            .sum();

        let degree = parallel_degree.max(1) as f64;
        let parallel_cost = critical_cost + (total_cost - critical_cost) / degree;
        if parallel_cost > 0.0 {
            total_cost / parallel_cost
        } else {
            1.0
        }
    }
}

fn longest_path(
    step_id: u64,
    costs: &HashMap<u64, f64>,
    dependencies: &HashMap<u64, Vec<u64>>,
    memo: &mut HashMap<u64, (f64, Vec<u64>)>,
) -> (f64, Vec<u64>) {
    if let Some(cached) = memo.get(&step_id) {
        return cached.clone();
    }
    let own_cost = costs.get(&step_id).copied().unwrap_or(0.0);
    let deps = dependencies.get(&step_id).cloned().unwrap_or_default();

    let result = if deps.is_empty() {
        (own_cost, vec![step_id])
    } else {
        let mut max_cost = 0.0;
        let mut max_path: Vec<u64> = Vec::new();
        for dep in deps {
            // Unknown dependency ids contribute nothing
            if !costs.contains_key(&dep) {
                continue;
            }
            let (dep_cost, dep_path) = longest_path(dep, costs, dependencies, memo);
            if dep_cost > max_cost {
                max_cost = dep_cost;
                max_path = dep_path;
            }
        }
        let mut path = max_path;
        path.push(step_id);
        (max_cost + own_cost, path)
    };
    memo.insert(step_id, result.clone());
    result
}

fn transitive_dependencies(steps: &[QueryStep]) -> HashMap<u64, HashSet<u64>> {
    let direct: HashMap<u64, Vec<u64>> = steps
        .iter()
        .map(|s| (s.step_id, s.dependencies.clone()))
        .collect();
    let mut closure: HashMap<u64, HashSet<u64>> = HashMap::new();
    for step in steps {
        let mut seen = HashSet::new();
        let mut stack = step.dependencies.clone();
        while let Some(dep) = stack.pop() {
            if seen.insert(dep) {
                if let Some(next) = direct.get(&dep) {
                    stack.extend(next.iter().copied());
                }
            }
        }
        closure.insert(step.step_id, seen);
    }
    closure
}

/// Move each filter as early as its dependencies allow
fn apply_filter_pushdown(steps: &[QueryStep]) -> (bool, Vec<QueryStep>) {
    let mut steps = steps.to_vec();
    let mut modified = false;

    // Repeat until no filter can move; each pass moves at most one step so
    // indexes stay valid
    loop {
        let mut moved = false;
        for idx in 0..steps.len() {
            if steps[idx].operation != Operation::Filter {
                continue;
            }
            let deps: HashSet<u64> = steps[idx].dependencies.iter().copied().collect();
            let mut target = 0;
            for (i, earlier) in steps.iter().enumerate().take(idx) {
                if deps.contains(&earlier.step_id) {
                    target = i + 1;
                }
            }
            if target < idx {
                let step = steps.remove(idx);
                steps.insert(target, step);
                modified = true;
                moved = true;
                break;
            }
        }
        if !moved {
            break;
        }
    }
    (modified, steps)
}

/// Reorder join steps by ascending estimated cardinality
fn apply_join_reordering(steps: &[QueryStep]) -> (bool, Vec<QueryStep>) {
    let join_positions: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.operation == Operation::Join)
        .map(|(i, _)| i)
        .collect();
    if join_positions.len() < 2 {
        return (false, steps.to_vec());
    }

    let mut joins: Vec<QueryStep> = join_positions.iter().map(|i| steps[*i].clone()).collect();
    joins.sort_by(|a, b| {
        a.cardinality
            .partial_cmp(&b.cardinality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut rewritten = steps.to_vec();
    let mut modified = false;
    for (slot, join) in join_positions.iter().zip(joins) {
        if rewritten[*slot] != join {
            modified = true;
        }
        rewritten[*slot] = join;
    }
    (modified, rewritten)
}

/// Drop filters whose canonical predicate text already appeared
fn apply_predicate_elimination(steps: &[QueryStep]) -> (bool, Vec<QueryStep>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut rewritten = Vec::with_capacity(steps.len());
    let mut modified = false;

    for step in steps {
        if step.operation == Operation::Filter {
            let canonical = step
                .predicate
                .as_deref()
                .unwrap_or("")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if !seen.insert(canonical) {
                modified = true;
                continue;
            }
        }
        rewritten.push(step.clone());
    }
    (modified, rewritten)
}

/// Evaluate purely-literal expressions at optimization time
fn apply_constant_folding(steps: &[QueryStep]) -> (bool, Vec<QueryStep>) {
    let mut rewritten = steps.to_vec();
    let mut modified = false;
    for step in &mut rewritten {
        let Some(expression) = &step.expression else {
            continue;
        };
        if let Some(folded) = expr::fold_constant(expression) {
            if folded != *expression {
                step.expression = Some(folded);
                modified = true;
            }
        }
    }
    (modified, rewritten)
}

/// Move projections earlier when their columns are already available
fn apply_projection_pushdown(steps: &[QueryStep]) -> (bool, Vec<QueryStep>) {
    let mut steps = steps.to_vec();
    let mut modified = false;

    loop {
        let mut moved = false;
        for idx in 0..steps.len() {
            if steps[idx].operation != Operation::Project {
                continue;
            }
            let columns: HashSet<&String> = steps[idx].columns.iter().collect();
            let mut target = 0;
            for (i, earlier) in steps.iter().enumerate().take(idx) {
                let produced: HashSet<&String> = earlier.output_columns.iter().collect();
                if columns.intersection(&produced).next().is_some() {
                    target = i + 1;
                }
            }
            if target < idx {
                let step = steps.remove(idx);
                steps.insert(target, step);
                modified = true;
                moved = true;
                break;
            }
        }
        if !moved {
            break;
        }
    }
    (modified, steps)
}

/// Greedy maximal set of steps with no dependencies among each other,
/// returned as indexes into the step list
fn find_parallelizable_steps(steps: &[QueryStep]) -> Vec<usize> {
    let mut group: Vec<usize> = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        let deps: HashSet<u64> = step.dependencies.iter().copied().collect();
        let conflict = group.iter().any(|j| {
            let other = &steps[*j];
            let other_deps: HashSet<u64> = other.dependencies.iter().copied().collect();
            other_deps.contains(&step.step_id) || deps.contains(&other.step_id)
        });
        if !conflict {
            group.push(i);
        }
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Operation, QueryPlan, QueryStep};

    fn scan(id: u64, cardinality: f64) -> QueryStep {
        QueryStep::new(id, Operation::Scan, cardinality)
    }

    #[test]
    fn constant_folding_rewrites_only_constant_steps() {
        let plan = QueryPlan::new(vec![
            scan(1, 100.0),
            QueryStep::new(2, Operation::Filter, 10.0)
                .with_dependencies(vec![1])
                .with_expression("(1 + 2) * (3 + 4)"),
            QueryStep::new(3, Operation::Filter, 10.0)
                .with_dependencies(vec![1])
                .with_predicate("a")
                .with_expression("amount > 100"),
        ]);

        let optimized = DarkMatterOptimizer::new().optimize_query_plan(&plan);
        assert!(optimized
            .rules_applied
            .contains(&"constant_folding".to_string()));

        let folded = optimized.steps.iter().find(|s| s.step_id == 2).unwrap();
        assert_eq!(folded.expression.as_deref(), Some("21"));
        let untouched = optimized.steps.iter().find(|s| s.step_id == 3).unwrap();
        assert_eq!(untouched.expression.as_deref(), Some("amount > 100"));
        assert!(optimized.optimized_cost <= optimized.original_cost);
    }

    #[test]
    fn filter_pushdown_respects_dependencies() {
        let plan = QueryPlan::new(vec![
            scan(1, 100.0),
            QueryStep::new(2, Operation::Join, 50.0).with_dependencies(vec![1]),
            QueryStep::new(3, Operation::Filter, 10.0)
                .with_dependencies(vec![1])
                .with_predicate("x > 1"),
        ]);

        let optimized = DarkMatterOptimizer::new().optimize_query_plan(&plan);
        assert!(optimized
            .rules_applied
            .contains(&"filter_pushdown".to_string()));
        // Filter lands right after its dependency, ahead of the join
        let positions: Vec<u64> = optimized.steps.iter().map(|s| s.step_id).collect();
        assert_eq!(positions, vec![1, 3, 2]);
    }

    #[test]
    fn filter_pushdown_is_idempotent() {
        let plan = QueryPlan::new(vec![
            scan(1, 100.0),
            QueryStep::new(3, Operation::Filter, 10.0)
                .with_dependencies(vec![1])
                .with_predicate("x > 1"),
            QueryStep::new(2, Operation::Join, 50.0).with_dependencies(vec![1]),
        ]);

        let (applied, rewritten) = apply_filter_pushdown(&plan.steps);
        assert!(!applied);
        assert_eq!(rewritten, plan.steps);
    }

    #[test]
    fn join_reordering_sorts_by_cardinality() {
        let steps = vec![
            scan(1, 1.0),
            QueryStep::new(2, Operation::Join, 500.0).with_dependencies(vec![1]),
            QueryStep::new(3, Operation::Join, 5.0).with_dependencies(vec![1]),
        ];
        let (applied, rewritten) = apply_join_reordering(&steps);
        assert!(applied);
        let joins: Vec<u64> = rewritten
            .iter()
            .filter(|s| s.operation == Operation::Join)
            .map(|s| s.step_id)
            .collect();
        assert_eq!(joins, vec![3, 2]);
    }

    #[test]
    fn duplicate_predicates_are_eliminated() {
        let steps = vec![
            scan(1, 10.0),
            QueryStep::new(2, Operation::Filter, 5.0).with_predicate("x  > 1"),
            QueryStep::new(3, Operation::Filter, 5.0).with_predicate("x > 1"),
        ];
        let (applied, rewritten) = apply_predicate_elimination(&steps);
        assert!(applied);
        assert_eq!(rewritten.len(), 2);
    }

    #[test]
    fn critical_path_follows_cost_weighted_dependencies() {
        let plan = QueryPlan::new(vec![
            scan(1, 1.0),
            QueryStep::new(2, Operation::Join, 10.0).with_dependencies(vec![1]),
            QueryStep::new(3, Operation::Filter, 1.0).with_dependencies(vec![1]),
            QueryStep::new(4, Operation::Sort, 4.0).with_dependencies(vec![2, 3]),
        ]);

        let path = DarkMatterOptimizer::new().analyze_critical_path(&plan.steps);
        assert_eq!(path, vec![1, 2, 4]);
    }

    #[test]
    fn parallelization_pairs_exclude_transitive_dependents() {
        let plan = QueryPlan::new(vec![
            scan(1, 1.0),
            scan(2, 1.0),
            QueryStep::new(3, Operation::Join, 1.0).with_dependencies(vec![1]),
            QueryStep::new(4, Operation::Sort, 1.0).with_dependencies(vec![3]),
        ]);

        let pairs = DarkMatterOptimizer::new().suggest_parallelization(&plan);
        assert!(pairs.contains(&(1, 2)));
        assert!(pairs.contains(&(2, 3)));
        // 4 depends on 1 through 3
        assert!(!pairs.contains(&(1, 4)));
        assert!(!pairs.contains(&(3, 4)));
    }

    #[test]
    fn speedup_follows_amdahls_law() {
        let plan = QueryPlan::new(vec![
            scan(1, 10.0),  // cost 100
            scan(2, 10.0),  // cost 100, off the critical path
            QueryStep::new(3, Operation::Filter, 100.0).with_dependencies(vec![1]), // cost 100
        ]);
        let optimizer = DarkMatterOptimizer::new();
        let speedup = optimizer.estimate_speedup(&plan, 4);

        // total 300, critical 200: 300 / (200 + 100/4) = 1.333...
        assert!((speedup - 300.0 / 225.0).abs() < 1e-9);
        assert!(optimizer.estimate_speedup(&plan, 1) <= speedup);
    }
}
