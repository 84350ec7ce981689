use crate::project::ProjectFile;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which project files an aggregation looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileFilter {
    /// Every listed file
    #[default]
    All,
    /// Files with this extension (with or without the leading dot)
    Extension(String),
    /// Files under this project-relative directory prefix
    Prefix(String),
    /// Exactly this project-relative path
    Path(String),
}

impl FileFilter {
    pub fn accepts(&self, file: &ProjectFile) -> bool {
        match self {
            FileFilter::All => true,
            FileFilter::Extension(ext) => file.extension() == Some(ext.trim_start_matches('.')),
            FileFilter::Prefix(prefix) => file.path().starts_with(Path::new(prefix)),
            FileFilter::Path(path) => file.path() == Path::new(path),
        }
    }
}

/// A file filter plus the grammar that parses the selected files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelector {
    pub filter: FileFilter,
    pub grammar: String,
}

impl FileSelector {
    pub fn new(grammar: impl Into<String>) -> Self {
        Self {
            filter: FileFilter::All,
            grammar: grammar.into(),
        }
    }

    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn accepts(&self, file: &ProjectFile) -> bool {
        self.filter.accepts(file)
    }
}
