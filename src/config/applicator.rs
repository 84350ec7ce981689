//! Transform applicator: runs each transform definition against a project.
//!
//! For every transform the applicator:
//! - aggregates matches of its query over the selected files
//! - makes the match groups updatable and applies the operation to each match
//! - commits the project so the recorded edits are flushed
//! - reports a result per transform

use crate::cache;
use crate::config::schema::{TransformConfig, TransformDefinition};
use crate::grammar::GrammarRegistry;
use crate::matches::{find_file_matches, MatchError};
use crate::patch::PatchError;
use crate::path::QueryError;
use crate::project::Project;
use crate::selector::FileSelector;
use std::fmt;
use tracing::{info, warn};

/// Result of applying a single transform
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "TransformResult should be checked for success/failure"]
pub enum TransformResult {
    /// Edits were written to `files` files
    Applied { files: usize, edits: usize },
    /// Every match already had the requested content
    AlreadyApplied { matches: usize },
    /// The query matched nothing
    NoMatches,
    /// Some files could not be flushed; others may have been written
    Failed { reason: String },
}

impl fmt::Display for TransformResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformResult::Applied { files, edits } => {
                write!(f, "Applied {edits} edit(s) to {files} file(s)")
            }
            TransformResult::AlreadyApplied { matches } => {
                write!(f, "Already applied ({matches} match(es) unchanged)")
            }
            TransformResult::NoMatches => write!(f, "No matches"),
            TransformResult::Failed { reason } => write!(f, "Failed: {reason}"),
        }
    }
}

/// Errors that stop a transform before anything is flushed
#[derive(Debug)]
pub enum ApplicationError {
    /// The query does not parse
    Query(QueryError),
    /// Aggregation failed (unknown grammar, unreadable or unparsable file)
    Match(MatchError),
    /// Recording an edit failed
    Patch(PatchError),
    /// `require_match` is set and nothing matched
    NoMatch { transform: String },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Query(e) => write!(f, "invalid query: {e}"),
            ApplicationError::Match(e) => write!(f, "match error: {e}"),
            ApplicationError::Patch(e) => write!(f, "edit error: {e}"),
            ApplicationError::NoMatch { transform } => {
                write!(f, "transform '{transform}' requires a match but its query matched nothing")
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Query(e) => Some(e),
            ApplicationError::Match(e) => Some(e),
            ApplicationError::Patch(e) => Some(e),
            ApplicationError::NoMatch { .. } => None,
        }
    }
}

impl From<QueryError> for ApplicationError {
    fn from(e: QueryError) -> Self {
        ApplicationError::Query(e)
    }
}

impl From<MatchError> for ApplicationError {
    fn from(e: MatchError) -> Self {
        ApplicationError::Match(e)
    }
}

impl From<PatchError> for ApplicationError {
    fn from(e: PatchError) -> Self {
        ApplicationError::Patch(e)
    }
}

/// Apply every transform in `config` to `project`, in order.
///
/// Each transform commits before the next one runs, so later transforms see
/// the content written by earlier ones.
pub fn apply_transforms(
    config: &TransformConfig,
    project: &mut dyn Project,
    grammars: &GrammarRegistry,
) -> Vec<(String, Result<TransformResult, ApplicationError>)> {
    config
        .transforms
        .iter()
        .map(|transform| {
            let result = apply_transform(transform, project, grammars);
            match &result {
                Ok(outcome) => info!(transform = %transform.id, %outcome, "transform finished"),
                Err(err) => warn!(transform = %transform.id, error = %err, "transform failed"),
            }
            (transform.id.clone(), result)
        })
        .collect()
}

fn apply_transform(
    transform: &TransformDefinition,
    project: &mut dyn Project,
    grammars: &GrammarRegistry,
) -> Result<TransformResult, ApplicationError> {
    let expr = cache::get_or_parse(&transform.query)?;
    let selector =
        FileSelector::new(transform.grammar.as_str()).with_filter(transform.files.clone());

    let mut groups = find_file_matches(&*project, grammars, &selector, &expr)?;
    if groups.is_empty() {
        if transform.require_match {
            return Err(ApplicationError::NoMatch {
                transform: transform.id.clone(),
            });
        }
        return Ok(TransformResult::NoMatches);
    }

    let mut matches = 0;
    for group in &mut groups {
        group.make_updatable(project);
        group.for_each_node_mut(|mut node| transform.operation.apply(&mut node))?;
        matches += group.len();
    }

    let mut files = 0;
    let mut edits = 0;
    let mut failures = Vec::new();
    for outcome in project.commit() {
        match outcome {
            Ok(outcome) if outcome.changed => {
                files += 1;
                edits += outcome.edits_applied;
            }
            Ok(_) => {}
            Err(err) => failures.push(err.to_string()),
        }
    }

    if !failures.is_empty() {
        return Ok(TransformResult::Failed {
            reason: failures.join("; "),
        });
    }
    if files == 0 {
        return Ok(TransformResult::AlreadyApplied { matches });
    }
    Ok(TransformResult::Applied { files, edits })
}
