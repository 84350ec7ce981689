use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory names never listed or written inside a workspace.
const SKIPPED_DIR_NAMES: &[&str] = &[".git", ".hg", ".svn", "target", "node_modules"];

/// Per-user directories holding third-party sources and toolchains.
const FORBIDDEN_HOME_DIRS: &[&str] = &[".cargo/registry", ".cargo/git", ".rustup"];

/// Keeps filesystem projects inside their workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical workspace root
    workspace_root: PathBuf,
    /// Canonical paths that may not be read or written even inside the root
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

/// Whether a directory with this name is skipped when listing a workspace.
pub fn is_skipped_dir(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| SKIPPED_DIR_NAMES.contains(&name))
}

impl WorkspaceGuard {
    /// Create a guard for `workspace_root`, canonicalized so symlinks cannot
    /// be used to escape it.
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let workspace_root = workspace_root.as_ref().canonicalize()?;

        let mut forbidden_paths: Vec<PathBuf> = Vec::new();
        if let Some(home) = home::home_dir() {
            forbidden_paths.extend(
                FORBIDDEN_HOME_DIRS
                    .iter()
                    .filter_map(|dir| home.join(dir).canonicalize().ok()),
            );
        }
        forbidden_paths.extend(
            SKIPPED_DIR_NAMES
                .iter()
                .filter_map(|dir| workspace_root.join(dir).canonicalize().ok()),
        );

        Ok(Self {
            workspace_root,
            forbidden_paths,
        })
    }

    /// Guard with an explicit forbidden list.
    pub fn with_forbidden(
        workspace_root: impl AsRef<Path>,
        forbidden: Vec<PathBuf>,
    ) -> Result<Self, SafetyError> {
        let workspace_root = workspace_root.as_ref().canonicalize()?;
        Ok(Self {
            workspace_root,
            forbidden_paths: forbidden,
        })
    }

    /// Resolve `path` (relative paths against the root) and check it.
    ///
    /// Returns the canonical absolute path. The file must exist.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    /// Check a path that may not exist yet by validating its parent.
    pub fn validate_new_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };
        if absolute.exists() {
            return self.validate_path(&absolute);
        }

        let parent = absolute.parent().unwrap_or(&self.workspace_root);
        let canonical_parent = parent.canonicalize()?;
        self.check_canonical(&canonical_parent)?;
        Ok(match absolute.file_name() {
            Some(name) => canonical_parent.join(name),
            None => canonical_parent,
        })
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.workspace_root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical.to_path_buf(),
                workspace: self.workspace_root.clone(),
            });
        }

        if let Some(forbidden) = self
            .forbidden_paths
            .iter()
            .find(|forbidden| canonical.starts_with(forbidden))
        {
            return Err(SafetyError::ForbiddenPath {
                path: canonical.to_path_buf(),
                forbidden: forbidden.clone(),
            });
        }

        Ok(())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}
