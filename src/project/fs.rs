use crate::patch::{FlushOutcome, PatchError};
use crate::project::{ActionQueue, DeferredAction, FileStore, Project, ProjectError, ProjectFile};
use crate::safety::{is_skipped_dir, WorkspaceGuard};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Content of a file before and after this project first wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub before: String,
    pub after: String,
}

/// Project rooted at a directory on disk.
///
/// Reads and writes are confined to the workspace by a [`WorkspaceGuard`].
/// Writes are atomic (tempfile + fsync + rename). In dry-run mode writes are
/// staged in memory and later reads see the staged content.
#[derive(Debug)]
pub struct FsProject {
    guard: WorkspaceGuard,
    dry_run: bool,
    staged: BTreeMap<ProjectFile, String>,
    changes: BTreeMap<ProjectFile, FileChange>,
    actions: ActionQueue,
}

impl FsProject {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        Ok(Self {
            guard: WorkspaceGuard::new(root)?,
            dry_run: false,
            staged: BTreeMap::new(),
            changes: BTreeMap::new(),
            actions: ActionQueue::new(),
        })
    }

    /// Stage writes in memory instead of touching disk.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn root(&self) -> &Path {
        self.guard.workspace_root()
    }

    /// Every file written through this project, keyed by file.
    pub fn changes(&self) -> &BTreeMap<ProjectFile, FileChange> {
        &self.changes
    }

    fn absolute(&self, file: &ProjectFile) -> PathBuf {
        self.root().join(file.path())
    }
}

impl FileStore for FsProject {
    fn list_files(&self) -> Result<Vec<ProjectFile>, ProjectError> {
        let root = self.root();
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry.file_name()));

        for entry in walker {
            let entry = entry.map_err(|err| ProjectError::Walk {
                root: root.to_path_buf(),
                message: err.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(ProjectFile::new(relative));
            }
        }

        debug!(root = %root.display(), files = files.len(), "listed workspace files");
        Ok(files)
    }

    fn content(&self, file: &ProjectFile) -> Result<String, ProjectError> {
        if let Some(staged) = self.staged.get(file) {
            return Ok(staged.clone());
        }

        let absolute = self.absolute(file);
        if !absolute.exists() {
            return Err(ProjectError::NotFound(file.path().to_path_buf()));
        }
        let path = self.guard.validate_path(&absolute)?;
        let bytes = fs::read(&path).map_err(|source| ProjectError::Io {
            path: path.clone(),
            source,
        })?;
        String::from_utf8(bytes).map_err(|_| ProjectError::NotUtf8(path))
    }

    fn set_content(&mut self, file: &ProjectFile, content: &str) -> Result<(), ProjectError> {
        let before = match self.content(file) {
            Ok(before) => before,
            Err(ProjectError::NotFound(_)) => String::new(),
            Err(err) => return Err(err),
        };

        if self.dry_run {
            self.guard.validate_new_path(self.absolute(file))?;
            self.staged.insert(file.clone(), content.to_string());
        } else {
            let path = self.guard.validate_new_path(self.absolute(file))?;
            atomic_write(&path, content.as_bytes())?;
            // bump mtime so incremental build tools notice the edit
            filetime::set_file_mtime(&path, filetime::FileTime::now()).map_err(|source| {
                ProjectError::Io {
                    path: path.clone(),
                    source,
                }
            })?;
            info!(file = %file, bytes = content.len(), "wrote file");
        }

        self.changes
            .entry(file.clone())
            .and_modify(|change| change.after = content.to_string())
            .or_insert_with(|| FileChange {
                before,
                after: content.to_string(),
            });
        Ok(())
    }
}

impl Project for FsProject {
    fn record_action(&mut self, action: DeferredAction) {
        self.actions.push(action);
    }

    fn pending_actions(&self) -> usize {
        self.actions.len()
    }

    fn commit(&mut self) -> Vec<Result<FlushOutcome, PatchError>> {
        let mut actions = std::mem::take(&mut self.actions);
        actions.run(self)
    }
}

/// Atomic file write: tempfile in the same directory, fsync, rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), ProjectError> {
    let io_err = |source: std::io::Error| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().ok_or_else(|| {
        io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
