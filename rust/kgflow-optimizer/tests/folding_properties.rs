// Constant folding is semantics-preserving: for every expression the
// optimizer folds, the folded literal evaluates to the same value as the
// original expression.

use kgflow_optimizer::expr;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Node {
    Leaf(i64),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
}

impl Node {
    fn render(&self) -> String {
        match self {
            Node::Leaf(n) => n.to_string(),
            Node::Add(a, b) => format!("({} + {})", a.render(), b.render()),
            Node::Sub(a, b) => format!("({} - {})", a.render(), b.render()),
            Node::Mul(a, b) => format!("({} * {})", a.render(), b.render()),
        }
    }

    fn value(&self) -> i64 {
        match self {
            Node::Leaf(n) => *n,
            Node::Add(a, b) => a.value() + b.value(),
            Node::Sub(a, b) => a.value() - b.value(),
            Node::Mul(a, b) => a.value() * b.value(),
        }
    }
}

fn node_strategy() -> impl Strategy<Value = Node> {
    let leaf = (-100i64..100).prop_map(Node::Leaf);
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Node::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Node::Sub(Box::new(a), Box::new(b))),
            (inner.clone(), inner)
                .prop_map(|(a, b)| Node::Mul(Box::new(a), Box::new(b))),
        ]
    })
}

proptest! {
    #[test]
    fn folding_preserves_arithmetic(node in node_strategy()) {
        let rendered = node.render();
        let folded = expr::fold_constant(&rendered)
            .expect("purely literal arithmetic must fold");
        prop_assert_eq!(folded, node.value().to_string());
    }

    // Folding the folded output is a fixpoint.
    #[test]
    fn folding_is_idempotent(node in node_strategy()) {
        let folded = expr::fold_constant(&node.render()).unwrap();
        prop_assert_eq!(expr::fold_constant(&folded), Some(folded));
    }

    // Expressions with identifiers never fold, whatever surrounds them.
    #[test]
    fn identifiers_block_folding(a in -100i64..100, name in "[a-z]{1,8}") {
        let rendered = format!("({a} + {name})");
        prop_assert_eq!(expr::fold_constant(&rendered), None);
    }

    // The evaluator agrees with direct computation when identifiers are
    // bound through the environment.
    #[test]
    fn environment_resolution_matches(a in -100i64..100, b in -100i64..100) {
        let env = BTreeMap::from([
            ("left".to_string(), expr::Value::Int(a)),
            ("right".to_string(), expr::Value::Int(b)),
        ]);
        let holds = expr::eval_predicate("left <= right", &env).unwrap();
        prop_assert_eq!(holds, a <= b);
    }
}
