use crate::cache;
use crate::patch::{NodeHandle, PatchError};
use crate::selector::FileFilter;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TransformConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub transforms: Vec<TransformDefinition>,
}

impl TransformConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.transforms.is_empty() {
            issues.push(ValidationIssue::EmptyTransformList);
        }

        let mut seen = HashSet::new();
        for transform in &self.transforms {
            let id = (!transform.id.trim().is_empty()).then(|| transform.id.clone());
            match &id {
                None => issues.push(ValidationIssue::MissingField {
                    transform_id: None,
                    field: "id",
                }),
                Some(id) if !seen.insert(transform.id.as_str()) => {
                    issues.push(ValidationIssue::DuplicateId { id: id.clone() })
                }
                Some(_) => {}
            }

            if transform.grammar.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: id.clone(),
                    field: "grammar",
                });
            }

            if transform.query.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: id.clone(),
                    field: "query",
                });
            } else if let Err(err) = cache::get_or_parse(&transform.query) {
                issues.push(ValidationIssue::InvalidQuery {
                    transform_id: id.clone(),
                    message: err.to_string(),
                });
            }

            match &transform.operation {
                Operation::Append { text } | Operation::Prepend { text } if text.is_empty() => {
                    issues.push(ValidationIssue::MissingField {
                        transform_id: id.clone(),
                        field: "operation.text",
                    });
                }
                _ => {}
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One query plus the operation applied to each of its matches.
#[derive(Debug, Deserialize, Clone)]
pub struct TransformDefinition {
    pub id: String,
    /// Registered grammar id used to parse the selected files
    pub grammar: String,
    #[serde(default)]
    pub files: FileFilter,
    /// Path expression in textual form
    pub query: String,
    pub operation: Operation,
    /// Report a failure instead of success when nothing matches
    #[serde(default)]
    pub require_match: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    SetValue { value: String },
    Append { text: String },
    Prepend { text: String },
}

impl Operation {
    pub fn apply(&self, node: &mut NodeHandle<'_>) -> Result<(), PatchError> {
        match self {
            Operation::SetValue { value } => node.set_value(value.as_str()),
            Operation::Append { text } => node.append(text),
            Operation::Prepend { text } => node.prepend(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyTransformList,
    MissingField {
        transform_id: Option<String>,
        field: &'static str,
    },
    InvalidQuery {
        transform_id: Option<String>,
        message: String,
    },
    DuplicateId {
        id: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyTransformList => {
                write!(f, "transform config contains no transforms")
            }
            ValidationIssue::MissingField {
                transform_id,
                field,
            } => match transform_id {
                Some(id) => write!(f, "transform '{id}' missing required field '{field}'"),
                None => write!(f, "transform missing required field '{field}'"),
            },
            ValidationIssue::InvalidQuery {
                transform_id,
                message,
            } => match transform_id {
                Some(id) => write!(f, "transform '{id}' has an invalid query: {message}"),
                None => write!(f, "invalid transform query: {message}"),
            },
            ValidationIssue::DuplicateId { id } => {
                write!(f, "transform id '{id}' is used more than once")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> TransformConfig {
        toml_edit::de::from_str(input).unwrap()
    }

    #[test]
    fn deserializes_operations_and_filters() {
        let config = parse(
            r#"
[meta]
name = "rename"

[[transforms]]
id = "a"
grammar = "java"
files = { prefix = "src" }
query = "//package_declaration/scoped_identifier"
operation = { type = "set-value", value = "org.example" }

[[transforms]]
id = "b"
grammar = "java"
query = "//identifier"
operation = { type = "append", text = "Impl" }
require_match = true
"#,
        );
        assert_eq!(config.meta.name, "rename");
        assert_eq!(config.transforms[0].files, FileFilter::Prefix("src".into()));
        assert_eq!(
            config.transforms[0].operation,
            Operation::SetValue {
                value: "org.example".into()
            }
        );
        assert_eq!(config.transforms[1].files, FileFilter::All);
        assert!(config.transforms[1].require_match);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn collects_every_issue() {
        let config = parse(
            r#"
[[transforms]]
id = "dup"
grammar = ""
query = "//a[1]"
operation = { type = "append", text = "" }

[[transforms]]
id = "dup"
grammar = "java"
query = "//a"
operation = { type = "prepend", text = "x" }
"#,
        );
        let err = config.validate().unwrap_err();
        assert_eq!(err.issues.len(), 4);
        assert!(err
            .issues
            .contains(&ValidationIssue::DuplicateId { id: "dup".into() }));
        assert!(err.issues.iter().any(|issue| matches!(
            issue,
            ValidationIssue::InvalidQuery { .. }
        )));
        assert!(err.to_string().contains("missing required field 'grammar'"));
    }

    #[test]
    fn empty_config_is_invalid() {
        let err = TransformConfig::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "transform config contains no transforms");
    }
}
