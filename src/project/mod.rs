//! The project/file capability the engine consumes.
//!
//! A project lists files, reads and writes their content, and runs deferred
//! actions (patch flushes) at a commit point it controls.

pub mod fs;
pub mod memory;

pub use self::fs::FsProject;
pub use memory::MemoryProject;

use crate::patch::{FlushOutcome, PatchError};
use crate::safety::SafetyError;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A file, addressed by its project-relative path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectFile {
    path: PathBuf,
}

impl ProjectFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

impl fmt::Display for ProjectFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("file not found in project: {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file is not valid UTF-8: {0}")]
    NotUtf8(PathBuf),

    #[error("failed to list files under {root}: {message}")]
    Walk { root: PathBuf, message: String },

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

/// Read/write access to a project's files.
pub trait FileStore {
    /// All files, in the project's listing order.
    fn list_files(&self) -> Result<Vec<ProjectFile>, ProjectError>;

    fn content(&self, file: &ProjectFile) -> Result<String, ProjectError>;

    fn set_content(&mut self, file: &ProjectFile, content: &str) -> Result<(), ProjectError>;
}

/// Work registered now and run when the project commits.
pub type DeferredAction = Box<dyn FnOnce(&mut dyn FileStore) -> Result<FlushOutcome, PatchError>>;

/// A file store with a commit point.
pub trait Project: FileStore {
    /// Register an action to run at the next [`commit`](Project::commit).
    fn record_action(&mut self, action: DeferredAction);

    /// Number of actions waiting for the next commit.
    fn pending_actions(&self) -> usize;

    /// Run every recorded action in registration order, one result each.
    fn commit(&mut self) -> Vec<Result<FlushOutcome, PatchError>>;
}

/// Ordered deferred actions, shared by the project implementations.
#[derive(Default)]
pub struct ActionQueue {
    actions: Vec<DeferredAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: DeferredAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drain the queue, running each action against `store` in order.
    pub fn run(&mut self, store: &mut dyn FileStore) -> Vec<Result<FlushOutcome, PatchError>> {
        let actions = std::mem::take(&mut self.actions);
        debug!(actions = actions.len(), "running deferred actions");
        actions
            .into_iter()
            .map(|action| action(&mut *store))
            .collect()
    }
}

impl fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionQueue")
            .field("pending", &self.actions.len())
            .finish()
    }
}
