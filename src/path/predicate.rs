use crate::path::engine::PathEvaluator;
use crate::path::expr::PathExpression;
use crate::tree::TreeNode;
use std::fmt;
use std::sync::Arc;

/// Extension point for predicates a grammar integration adds on top of the
/// built-in ones.
///
/// `accepted` holds the nodes the current step has already accepted, in
/// document order, so a predicate can reason about siblings seen so far.
pub trait NodePredicate: Send + Sync {
    fn evaluate(&self, candidate: &TreeNode, accepted: &[&TreeNode]) -> bool;

    /// Text shown between the brackets when the expression is stringified.
    fn describe(&self) -> String;
}

/// A boolean test applied to each candidate of a step.
#[derive(Clone)]
pub enum Predicate {
    /// Candidate's value equals the string
    Value(String),
    /// Running the expression rooted at the candidate yields at least one node
    Nested(PathExpression),
    Custom(Arc<dyn NodePredicate>),
}

impl Predicate {
    pub fn custom(predicate: impl NodePredicate + 'static) -> Self {
        Predicate::Custom(Arc::new(predicate))
    }

    /// Decide whether `candidate` survives.
    ///
    /// The engine is passed in rather than owned so that nested expressions
    /// can call back into whichever evaluator is running. A nested query that
    /// fails counts as a non-match; malformed nested expressions are rejected
    /// by validation before evaluation starts.
    pub fn evaluate(
        &self,
        candidate: &TreeNode,
        accepted: &[&TreeNode],
        engine: &dyn PathEvaluator,
    ) -> bool {
        match self {
            Predicate::Value(expected) => candidate.value == *expected,
            Predicate::Nested(expr) => engine
                .evaluate_relative(candidate, expr)
                .map(|found| !found.is_empty())
                .unwrap_or(false),
            Predicate::Custom(custom) => custom.evaluate(candidate, accepted),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Predicate::Nested(expr) => f.debug_tuple("Nested").field(&expr.to_string()).finish(),
            Predicate::Custom(custom) => f.debug_tuple("Custom").field(&custom.describe()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::engine::QueryEngine;
    use crate::path::expr::Step;

    struct FirstOnly;

    impl NodePredicate for FirstOnly {
        fn evaluate(&self, _candidate: &TreeNode, accepted: &[&TreeNode]) -> bool {
            accepted.is_empty()
        }

        fn describe(&self) -> String {
            "first()".to_string()
        }
    }

    #[test]
    fn value_predicate_is_plain_equality() {
        let node = TreeNode::leaf("id", "foo", 0);
        let engine = QueryEngine::new();
        assert!(Predicate::Value("foo".into()).evaluate(&node, &[], &engine));
        assert!(!Predicate::Value("fo".into()).evaluate(&node, &[], &engine));
    }

    #[test]
    fn nested_predicate_calls_back_into_engine() {
        let node = TreeNode::with_children("fn", "fn a", 0, vec![TreeNode::leaf("name", "a", 3)]);
        let engine = QueryEngine::new();
        let has_name_a = Predicate::Nested(
            PathExpression::empty().then(Step::child("name").with_value("a")),
        );
        let has_name_b = Predicate::Nested(
            PathExpression::empty().then(Step::child("name").with_value("b")),
        );
        assert!(has_name_a.evaluate(&node, &[], &engine));
        assert!(!has_name_b.evaluate(&node, &[], &engine));
    }

    #[test]
    fn custom_predicate_sees_accepted_nodes() {
        let first = TreeNode::leaf("x", "1", 0);
        let second = TreeNode::leaf("x", "2", 1);
        let engine = QueryEngine::new();
        let predicate = Predicate::custom(FirstOnly);
        assert!(predicate.evaluate(&first, &[], &engine));
        assert!(!predicate.evaluate(&second, &[&first], &engine));
        assert_eq!(format!("{predicate:?}"), "Custom(\"first()\")");
    }
}
