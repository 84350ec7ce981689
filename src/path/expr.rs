use crate::path::errors::QueryError;
use crate::path::predicate::Predicate;
use std::fmt;
use std::str::FromStr;

/// Navigation direction of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Direct children of each context node
    Child,
    /// All descendants of each context node, in document order
    Descendant,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
        }
    }
}

impl FromStr for Axis {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "child" => Ok(Axis::Child),
            "descendant" => Ok(Axis::Descendant),
            other => Err(QueryError::UnsupportedAxis {
                axis: other.to_string(),
            }),
        }
    }
}

/// Node-name filter of a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameTest {
    /// `*`: any node
    Any,
    Named(String),
}

impl NameTest {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Named(expected) => expected == name,
        }
    }
}

impl fmt::Display for NameTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTest::Any => write!(f, "*"),
            NameTest::Named(name) => write!(f, "{name}"),
        }
    }
}

/// One navigation step: axis, name test, and conjoined predicates.
#[derive(Debug, Clone)]
pub struct Step {
    pub axis: Axis,
    pub name: NameTest,
    pub predicates: Vec<Predicate>,
}

impl Step {
    pub fn new(axis: Axis, name: NameTest) -> Self {
        Self {
            axis,
            name,
            predicates: Vec::new(),
        }
    }

    /// `/name`
    pub fn child(name: impl Into<String>) -> Self {
        Self::new(Axis::Child, NameTest::Named(name.into()))
    }

    /// `//name`
    pub fn descendant(name: impl Into<String>) -> Self {
        Self::new(Axis::Descendant, NameTest::Named(name.into()))
    }

    /// `/*` or `//*`
    pub fn any(axis: Axis) -> Self {
        Self::new(axis, NameTest::Any)
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Shorthand for a `[.='value']` predicate.
    pub fn with_value(self, value: impl Into<String>) -> Self {
        self.with_predicate(Predicate::Value(value.into()))
    }

    /// Shorthand for a nested-expression predicate.
    pub fn with_nested(self, expr: PathExpression) -> Self {
        self.with_predicate(Predicate::Nested(expr))
    }
}

/// An ordered sequence of steps. Immutable once built and reusable across
/// trees and files.
#[derive(Debug, Clone, Default)]
pub struct PathExpression {
    steps: Vec<Step>,
}

impl PathExpression {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// The zero-step expression; it selects the query root.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the textual syntax, e.g. `//class[name[.='Foo']]/method`.
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        crate::path::parser::parse(input)
    }

    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check the expression, including nested predicates, for malformed
    /// steps. The engine runs this before evaluating anything.
    pub fn validate(&self) -> Result<(), QueryError> {
        for (index, step) in self.steps.iter().enumerate() {
            if let NameTest::Named(name) = &step.name {
                if name.trim().is_empty() {
                    return Err(QueryError::MalformedStep {
                        index,
                        message: "empty node name".to_string(),
                    });
                }
                if name.chars().any(|c| c.is_whitespace() || "[]/='\"".contains(c)) {
                    return Err(QueryError::MalformedStep {
                        index,
                        message: format!("invalid character in node name '{name}'"),
                    });
                }
            }

            for predicate in &step.predicates {
                if let Predicate::Nested(nested) = predicate {
                    if nested.is_empty() {
                        return Err(QueryError::EmptyNestedExpression { index });
                    }
                    nested.validate()?;
                }
            }
        }
        Ok(())
    }

    /// Render as a relative path, the form used inside predicates.
    fn fmt_relative(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match (i, step.axis) {
                (0, Axis::Child) => {}
                (_, Axis::Child) => write!(f, "/")?,
                (_, Axis::Descendant) => write!(f, "//")?,
            }
            fmt_step_body(step, f)?;
        }
        Ok(())
    }
}

fn fmt_step_body(step: &Step, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", step.name)?;
    for predicate in &step.predicates {
        match predicate {
            Predicate::Value(value) => {
                if value.contains('\'') {
                    write!(f, "[.=\"{value}\"]")?;
                } else {
                    write!(f, "[.='{value}']")?;
                }
            }
            Predicate::Nested(nested) => {
                write!(f, "[")?;
                nested.fmt_relative(f)?;
                write!(f, "]")?;
            }
            Predicate::Custom(custom) => write!(f, "[{}]", custom.describe())?,
        }
    }
    Ok(())
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, ".");
        }
        for step in &self.steps {
            match step.axis {
                Axis::Child => write!(f, "/")?,
                Axis::Descendant => write!(f, "//")?,
            }
            fmt_step_body(step, f)?;
        }
        Ok(())
    }
}
