//! Path expressions over [`TreeNode`](crate::tree::TreeNode) trees.
//!
//! A small XPath-like language: child (`/`) and descendant (`//`) steps with
//! a name test and bracketed predicates. Predicates either compare a node's
//! value (`[.='x']`) or run a nested path expression rooted at the candidate
//! (`[name/other]`), which makes the engine re-entrant.

pub mod engine;
pub mod errors;
pub mod expr;
pub mod parser;
pub mod predicate;

pub use engine::{run_query, NodeMatch, PathEvaluator, QueryEngine};
pub use errors::QueryError;
pub use expr::{Axis, NameTest, PathExpression, Step};
pub use predicate::{NodePredicate, Predicate};
