pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{apply_transforms, ApplicationError, TransformResult};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    Metadata, Operation, TransformConfig, TransformDefinition, ValidationError, ValidationIssue,
};
