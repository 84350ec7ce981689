use crate::path::errors::QueryError;
use crate::path::expr::{Axis, PathExpression, Step};
use crate::tree::{NodePath, TreeNode};
use tracing::{debug, trace};

/// The capability predicates need to run nested expressions.
///
/// [`QueryEngine`] implements it; predicates receive it as a parameter
/// instead of naming the engine type.
pub trait PathEvaluator {
    /// Evaluate `expr` relative to `context`: a child step tests the
    /// context's children, a descendant step all of its descendants.
    ///
    /// The expression is expected to be validated already.
    fn evaluate_relative<'a>(
        &self,
        context: &'a TreeNode,
        expr: &PathExpression,
    ) -> Result<Vec<&'a TreeNode>, QueryError>;
}

/// A node selected by a query, with its address relative to the query root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch<'a> {
    pub node: &'a TreeNode,
    pub path: NodePath,
}

/// Evaluates path expressions against in-memory trees.
///
/// Evaluation is synchronous and side-effect free; one engine can serve any
/// number of trees and threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEngine;

impl QueryEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run `expr` against `root` and return matches in document order.
    ///
    /// The first step is evaluated from a virtual document context whose only
    /// child is `root`: `/name` tests the root itself, `//name` the root and
    /// every descendant. An expression with no steps selects `root`.
    pub fn matches<'a>(
        &self,
        root: &'a TreeNode,
        expr: &PathExpression,
    ) -> Result<Vec<NodeMatch<'a>>, QueryError> {
        expr.validate()?;
        let found = self.evaluate(root, expr, Context::Document);
        debug!(expr = %expr, root = %root.name, matches = found.len(), "path query evaluated");
        Ok(found)
    }

    /// Like [`matches`](Self::matches), returning only the nodes.
    pub fn run<'a>(
        &self,
        root: &'a TreeNode,
        expr: &PathExpression,
    ) -> Result<Vec<&'a TreeNode>, QueryError> {
        Ok(self
            .matches(root, expr)?
            .into_iter()
            .map(|m| m.node)
            .collect())
    }

    /// Validate and evaluate `expr` relative to `context`.
    pub fn matches_relative<'a>(
        &self,
        context: &'a TreeNode,
        expr: &PathExpression,
    ) -> Result<Vec<NodeMatch<'a>>, QueryError> {
        expr.validate()?;
        Ok(self.evaluate(context, expr, Context::Relative))
    }

    fn evaluate<'a>(
        &self,
        root: &'a TreeNode,
        expr: &PathExpression,
        context: Context,
    ) -> Vec<NodeMatch<'a>> {
        let start = NodeMatch {
            node: root,
            path: NodePath::root(),
        };

        let Some((first, rest)) = expr.steps().split_first() else {
            return vec![start];
        };

        let mut expanded = Vec::new();
        match context {
            Context::Document => {
                expanded.push(start.clone());
                if first.axis == Axis::Descendant {
                    collect_descendants(&start, &mut expanded);
                }
            }
            Context::Relative => expand(&start, first.axis, &mut expanded),
        }

        let mut current = self.filter_step(expanded, first);

        for (index, step) in rest.iter().enumerate() {
            if current.is_empty() {
                trace!(step = index + 1, "empty candidate set, skipping remaining steps");
                break;
            }
            let mut expanded = Vec::new();
            for m in &current {
                expand(m, step.axis, &mut expanded);
            }
            current = self.filter_step(expanded, step);
        }

        current
    }

    /// Order candidates, drop duplicates, apply the name test and every
    /// predicate of `step`.
    fn filter_step<'a>(&self, mut candidates: Vec<NodeMatch<'a>>, step: &Step) -> Vec<NodeMatch<'a>> {
        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        candidates.dedup_by(|a, b| a.path == b.path);

        let mut accepted: Vec<NodeMatch<'a>> = Vec::new();
        let mut accepted_nodes: Vec<&'a TreeNode> = Vec::new();

        for candidate in candidates {
            if !step.name.matches(&candidate.node.name) {
                continue;
            }
            let keep = step
                .predicates
                .iter()
                .all(|p| p.evaluate(candidate.node, &accepted_nodes, self));
            if keep {
                accepted_nodes.push(candidate.node);
                accepted.push(candidate);
            }
        }

        accepted
    }
}

impl PathEvaluator for QueryEngine {
    fn evaluate_relative<'a>(
        &self,
        context: &'a TreeNode,
        expr: &PathExpression,
    ) -> Result<Vec<&'a TreeNode>, QueryError> {
        Ok(self
            .evaluate(context, expr, Context::Relative)
            .into_iter()
            .map(|m| m.node)
            .collect())
    }
}

/// Run `expr` against `root` with a default engine.
pub fn run_query<'a>(
    root: &'a TreeNode,
    expr: &PathExpression,
) -> Result<Vec<&'a TreeNode>, QueryError> {
    QueryEngine::new().run(root, expr)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Document,
    Relative,
}

fn expand<'a>(from: &NodeMatch<'a>, axis: Axis, out: &mut Vec<NodeMatch<'a>>) {
    match axis {
        Axis::Child => {
            for (i, child) in from.node.children.iter().enumerate() {
                out.push(NodeMatch {
                    node: child,
                    path: from.path.child(i),
                });
            }
        }
        Axis::Descendant => collect_descendants(from, out),
    }
}

/// Pre-order walk, which is document order.
fn collect_descendants<'a>(from: &NodeMatch<'a>, out: &mut Vec<NodeMatch<'a>>) {
    for (i, child) in from.node.children.iter().enumerate() {
        let m = NodeMatch {
            node: child,
            path: from.path.child(i),
        };
        out.push(m.clone());
        collect_descendants(&m, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::expr::NameTest;

    // unit
    // |- class "A"  (name: A, method: run, method: stop)
    // `- class "B"  (name: B, method: run)
    fn sample_tree() -> TreeNode {
        let class_a = TreeNode::with_children(
            "class",
            "class A { run stop }",
            0,
            vec![
                TreeNode::leaf("name", "A", 6),
                TreeNode::leaf("method", "run", 10),
                TreeNode::leaf("method", "stop", 14),
            ],
        );
        let class_b = TreeNode::with_children(
            "class",
            "class B { run }",
            21,
            vec![
                TreeNode::leaf("name", "B", 27),
                TreeNode::leaf("method", "run", 31),
            ],
        );
        TreeNode::with_children(
            "unit",
            "class A { run stop } class B { run }",
            0,
            vec![class_a, class_b],
        )
    }

    fn values(nodes: &[&TreeNode]) -> Vec<String> {
        nodes.iter().map(|n| n.value.clone()).collect()
    }

    #[test]
    fn zero_steps_selects_root() {
        let tree = sample_tree();
        let found = run_query(&tree, &PathExpression::empty()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(std::ptr::eq(found[0], &tree));
    }

    #[test]
    fn unknown_name_is_empty_success() {
        let tree = sample_tree();
        let expr = PathExpression::empty().then(Step::descendant("interface"));
        assert!(run_query(&tree, &expr).unwrap().is_empty());
    }

    #[test]
    fn child_step_from_document_tests_root() {
        let tree = sample_tree();
        let expr = PathExpression::empty().then(Step::child("unit"));
        assert_eq!(run_query(&tree, &expr).unwrap().len(), 1);

        let expr = PathExpression::empty().then(Step::child("class"));
        assert!(run_query(&tree, &expr).unwrap().is_empty());
    }

    #[test]
    fn descendant_step_in_document_order() {
        let tree = sample_tree();
        let expr = PathExpression::empty().then(Step::descendant("method"));
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(values(&found), vec!["run", "stop", "run"]);
    }

    #[test]
    fn child_then_child() {
        let tree = sample_tree();
        let expr = PathExpression::empty()
            .then(Step::child("unit"))
            .then(Step::child("class"))
            .then(Step::child("name"));
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(values(&found), vec!["A", "B"]);
    }

    #[test]
    fn value_predicate_filters() {
        let tree = sample_tree();
        let expr = PathExpression::empty().then(Step::descendant("method").with_value("run"));
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].offset, 10);
        assert_eq!(found[1].offset, 31);
    }

    #[test]
    fn nested_predicate_selects_matching_subtree_only() {
        let tree = sample_tree();
        let has_stop = PathExpression::empty().then(Step::child("method").with_value("stop"));
        let expr = PathExpression::empty()
            .then(Step::descendant("class").with_nested(has_stop))
            .then(Step::child("name"));
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(values(&found), vec!["A"]);
    }

    #[test]
    fn predicates_are_conjoined() {
        let tree = sample_tree();
        let has_run = PathExpression::empty().then(Step::child("method").with_value("run"));
        let named_b = PathExpression::empty().then(Step::child("name").with_value("B"));
        let expr = PathExpression::empty().then(
            Step::descendant("class")
                .with_nested(has_run)
                .with_nested(named_b),
        );
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].offset, 21);
    }

    #[test]
    fn overlapping_descendant_expansion_is_deduplicated() {
        let tree = TreeNode::with_children(
            "a",
            "",
            0,
            vec![TreeNode::with_children(
                "a",
                "",
                0,
                vec![TreeNode::leaf("b", "x", 0)],
            )],
        );
        let expr = PathExpression::empty()
            .then(Step::descendant("a"))
            .then(Step::descendant("b"));
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn results_are_sorted_across_context_nodes() {
        // outer contains inner; children of inner come before outer's later child
        let tree = TreeNode::with_children(
            "x",
            "",
            0,
            vec![
                TreeNode::with_children("x", "", 0, vec![TreeNode::leaf("y", "inner", 1)]),
                TreeNode::leaf("y", "outer", 5),
            ],
        );
        let expr = PathExpression::empty()
            .then(Step::descendant("x"))
            .then(Step::child("y"));
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(values(&found), vec!["inner", "outer"]);
    }

    #[test]
    fn empty_intermediate_set_short_circuits() {
        let tree = sample_tree();
        let expr = PathExpression::empty()
            .then(Step::descendant("enum"))
            .then(Step::child("name"));
        assert!(run_query(&tree, &expr).unwrap().is_empty());
    }

    #[test]
    fn malformed_expression_is_an_error() {
        let tree = sample_tree();
        let expr = PathExpression::empty().then(Step::new(Axis::Child, NameTest::Named(String::new())));
        assert!(matches!(
            run_query(&tree, &expr),
            Err(QueryError::MalformedStep { .. })
        ));
    }

    #[test]
    fn relative_evaluation_starts_at_children() {
        let tree = sample_tree();
        let class_a = &tree.children[0];
        let expr = PathExpression::empty().then(Step::child("method"));
        let found = QueryEngine::new().matches_relative(class_a, &expr).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].path, NodePath::from_indices(vec![2]));
    }

    #[test]
    fn match_paths_resolve_back_to_nodes() {
        let tree = sample_tree();
        let expr = PathExpression::empty().then(Step::descendant("name"));
        for m in QueryEngine::new().matches(&tree, &expr).unwrap() {
            assert!(std::ptr::eq(tree.at(&m.path).unwrap(), m.node));
        }
    }

    #[test]
    fn wildcard_matches_every_name() {
        let tree = sample_tree();
        let expr = PathExpression::empty()
            .then(Step::child("unit"))
            .then(Step::any(Axis::Child));
        assert_eq!(run_query(&tree, &expr).unwrap().len(), 2);
    }
}
