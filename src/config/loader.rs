use crate::config::schema::{TransformConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    /// The config file the error refers to, when it came from a file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Io { path, .. } => Some(path.as_path()),
            ConfigError::Toml { path, .. } | ConfigError::Validation { path, .. } => {
                path.as_deref()
            }
        }
    }

    fn at(self, file: &Path) -> Self {
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(file.to_path_buf()),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(file.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self
            .path()
            .map(|path| format!(" ({})", path.display()))
            .unwrap_or_default();
        match self {
            ConfigError::Io { source, .. } => {
                write!(f, "failed to read transform config{location}: {source}")
            }
            ConfigError::Toml { source, .. } => {
                write!(f, "failed to parse transform config TOML{location}: {source}")
            }
            ConfigError::Validation { source, .. } => {
                write!(f, "invalid transform config{location}: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

/// Parse and validate a transform config.
pub fn load_from_str(input: &str) -> Result<TransformConfig, ConfigError> {
    let config: TransformConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<TransformConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = load_from_str(&contents).map_err(|error| error.at(path))?;
    debug!(path = %path.display(), transforms = config.transforms.len(), "loaded transform config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    const VALID: &str = r#"
[meta]
name = "bump"

[[transforms]]
id = "bump-package"
grammar = "java"
files = { extension = "java" }
query = "//package_declaration/scoped_identifier"
operation = { type = "set-value", value = "com.foo.barx" }
"#;

    #[test]
    fn loads_and_validates() {
        let config = load_from_str(VALID).unwrap();
        assert_eq!(config.transforms.len(), 1);
        assert_eq!(config.transforms[0].id, "bump-package");
    }

    #[test]
    fn errors_carry_the_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transforms.toml");
        fs::write(&path, "[[transforms]]\nid = ").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: Some(_), .. }));
        assert!(err.to_string().contains("transforms.toml"));
        assert!(err.source().is_some());

        fs::write(&path, "[meta]\nname = \"empty\"\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { path: Some(_), .. }));
        assert_eq!(err.path(), Some(path.as_path()));

        let err = load_from_path(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn string_errors_have_no_path() {
        let err = load_from_str("transforms = 3").unwrap_err();
        assert!(err.path().is_none());
        assert!(err.to_string().starts_with("failed to parse transform config TOML:"));
    }
}
