use crate::patch::{FlushOutcome, PatchError};
use crate::project::{ActionQueue, DeferredAction, FileStore, Project, ProjectError, ProjectFile};
use std::path::Path;

/// Project held entirely in memory, listing files in insertion order.
#[derive(Debug, Default)]
pub struct MemoryProject {
    files: Vec<(ProjectFile, String)>,
    actions: ActionQueue,
}

impl MemoryProject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Add a file, or replace the content of an existing one.
    pub fn insert(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let file = ProjectFile::new(path.as_ref());
        let content = content.into();
        match self.files.iter_mut().find(|(f, _)| *f == file) {
            Some((_, existing)) => *existing = content,
            None => self.files.push((file, content)),
        }
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&str> {
        let path = path.as_ref();
        self.files
            .iter()
            .find(|(f, _)| f.path() == path)
            .map(|(_, content)| content.as_str())
    }
}

impl FileStore for MemoryProject {
    fn list_files(&self) -> Result<Vec<ProjectFile>, ProjectError> {
        Ok(self.files.iter().map(|(f, _)| f.clone()).collect())
    }

    fn content(&self, file: &ProjectFile) -> Result<String, ProjectError> {
        self.file(file.path())
            .map(str::to_string)
            .ok_or_else(|| ProjectError::NotFound(file.path().to_path_buf()))
    }

    fn set_content(&mut self, file: &ProjectFile, content: &str) -> Result<(), ProjectError> {
        self.insert(file.path(), content);
        Ok(())
    }
}

impl Project for MemoryProject {
    fn record_action(&mut self, action: DeferredAction) {
        self.actions.push(action);
    }

    fn pending_actions(&self) -> usize {
        self.actions.len()
    }

    fn commit(&mut self) -> Vec<Result<FlushOutcome, PatchError>> {
        // actions recorded while these run land in the fresh queue
        let mut actions = std::mem::take(&mut self.actions);
        actions.run(self)
    }
}
