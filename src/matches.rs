//! File match aggregation: run one path expression across the selected files
//! of a project and group the matches per file.

use crate::grammar::{Grammar, GrammarRegistry, ParseError, UnknownGrammar};
use crate::patch::{flush_log, EditLog, FlushOutcome, NodeHandle, PatchError, PendingEdit};
use crate::path::{PathExpression, QueryEngine, QueryError};
use crate::project::{FileStore, Project, ProjectError, ProjectFile};
use crate::selector::FileSelector;
use crate::tree::{NodePath, TreeNode};
use rayon::prelude::*;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("failed to parse {file}: {source}")]
    Parse {
        file: ProjectFile,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    UnknownGrammar(#[from] UnknownGrammar),
}

/// The matches of one expression in one file.
///
/// Owns the parsed tree; matches are addressed by [`NodePath`] into it and
/// kept in document order. Read-only until [`make_updatable`] is called.
///
/// [`make_updatable`]: FileMatchGroup::make_updatable
pub struct FileMatchGroup {
    file: ProjectFile,
    content_hash: u64,
    tree: TreeNode,
    matches: Vec<NodePath>,
    log: Rc<RefCell<EditLog>>,
    updatable: bool,
}

impl FileMatchGroup {
    pub fn file(&self) -> &ProjectFile {
        &self.file
    }

    /// The whole tree of the file, including values changed through handles.
    pub fn tree(&self) -> &TreeNode {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn paths(&self) -> &[NodePath] {
        &self.matches
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        self.matches.get(index).and_then(|path| self.tree.at(path))
    }

    /// Matched nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.matches.iter().filter_map(|path| self.tree.at(path))
    }

    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    /// Allow mutation and register this group's flush with `project`.
    ///
    /// One-way and idempotent: only the first call registers the flush.
    pub fn make_updatable(&mut self, project: &mut dyn Project) -> &mut Self {
        if self.updatable {
            return self;
        }
        self.updatable = true;

        let file = self.file.clone();
        let content_hash = self.content_hash;
        let log = Rc::clone(&self.log);
        project.record_action(Box::new(move |store: &mut dyn FileStore| {
            flush_log(&file, content_hash, &log, store)
        }));
        debug!(file = %self.file, matches = self.matches.len(), "match group made updatable");
        self
    }

    /// Mutable handle on the `index`-th match.
    pub fn node_mut(&mut self, index: usize) -> Result<NodeHandle<'_>, PatchError> {
        if !self.updatable {
            return Err(PatchError::NotUpdatable {
                file: self.file.clone(),
            });
        }
        let no_such_match = || PatchError::NoSuchMatch {
            file: self.file.clone(),
            index,
            len: self.matches.len(),
        };
        let path = self.matches.get(index).ok_or_else(no_such_match)?;
        let node = self.tree.at_mut(path).ok_or_else(no_such_match)?;
        Ok(NodeHandle::new(&self.file, path, node, &self.log))
    }

    /// Run `f` on a handle for every match, in document order.
    pub fn for_each_node_mut<F>(&mut self, mut f: F) -> Result<(), PatchError>
    where
        F: FnMut(NodeHandle<'_>) -> Result<(), PatchError>,
    {
        for index in 0..self.matches.len() {
            f(self.node_mut(index)?)?;
        }
        Ok(())
    }

    /// Edits recorded so far, in call order.
    pub fn pending_edits(&self) -> Ref<'_, [PendingEdit]> {
        Ref::map(self.log.borrow(), |log| log.edits())
    }

    /// Apply the pending edits now instead of at the project's commit.
    ///
    /// The registered deferred flush becomes a no-op afterwards.
    pub fn flush(&self, store: &mut dyn FileStore) -> Result<FlushOutcome, PatchError> {
        if !self.updatable {
            return Err(PatchError::NotUpdatable {
                file: self.file.clone(),
            });
        }
        flush_log(&self.file, self.content_hash, &self.log, store)
    }
}

impl fmt::Debug for FileMatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileMatchGroup")
            .field("file", &self.file)
            .field("matches", &self.matches)
            .field("updatable", &self.updatable)
            .field("pending_edits", &self.log.borrow().len())
            .finish()
    }
}

/// Parse and query result of one file, built on a worker thread.
struct ScannedFile {
    file: ProjectFile,
    content_hash: u64,
    tree: TreeNode,
    matches: Vec<NodePath>,
}

impl From<ScannedFile> for FileMatchGroup {
    fn from(scanned: ScannedFile) -> Self {
        Self {
            file: scanned.file,
            content_hash: scanned.content_hash,
            tree: scanned.tree,
            matches: scanned.matches,
            log: Rc::new(RefCell::new(EditLog::new())),
            updatable: false,
        }
    }
}

/// Evaluate `expr` against every file `selector` accepts.
///
/// Returns one group per file with at least one match, in the project's
/// listing order. Parsing and querying run in parallel; the first failing
/// file in listing order determines the error.
pub fn find_file_matches<S: FileStore + ?Sized>(
    project: &S,
    grammars: &GrammarRegistry,
    selector: &FileSelector,
    expr: &PathExpression,
) -> Result<Vec<FileMatchGroup>, MatchError> {
    expr.validate()?;
    let grammar = grammars.resolve(&selector.grammar)?;

    let sources: Vec<(ProjectFile, Result<String, ProjectError>)> = project
        .list_files()?
        .into_iter()
        .filter(|file| selector.accepts(file))
        .map(|file| {
            let content = project.content(&file);
            (file, content)
        })
        .collect();
    let selected = sources.len();

    let engine = QueryEngine::new();
    let scanned: Vec<Result<Option<ScannedFile>, MatchError>> = sources
        .into_par_iter()
        .map(|(file, content)| scan_file(grammar.as_ref(), engine, expr, file, content?))
        .collect();

    let mut groups = Vec::new();
    for result in scanned {
        if let Some(file) = result? {
            groups.push(FileMatchGroup::from(file));
        }
    }

    info!(
        grammar = %selector.grammar,
        expr = %expr,
        files = selected,
        matched_files = groups.len(),
        "aggregated matches"
    );
    Ok(groups)
}

fn scan_file(
    grammar: &dyn Grammar,
    engine: QueryEngine,
    expr: &PathExpression,
    file: ProjectFile,
    content: String,
) -> Result<Option<ScannedFile>, MatchError> {
    let tree = grammar
        .parse(&content)
        .map_err(|source| MatchError::Parse {
            file: file.clone(),
            source,
        })?;
    let matches: Vec<NodePath> = engine
        .matches(&tree, expr)?
        .into_iter()
        .map(|m| m.path)
        .collect();

    debug!(file = %file, matches = matches.len(), "scanned file");
    if matches.is_empty() {
        return Ok(None);
    }

    Ok(Some(ScannedFile {
        file,
        content_hash: xxh3_64(content.as_bytes()),
        tree,
        matches,
    }))
}
