use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid path expression '{input}' at {position}: {message}")]
    Syntax {
        input: String,
        position: usize,
        message: String,
    },

    #[error("unsupported axis '{axis}' (supported: child, descendant)")]
    UnsupportedAxis { axis: String },

    #[error("malformed step {index}: {message}")]
    MalformedStep { index: usize, message: String },

    #[error("nested path expression in step {index} has no steps")]
    EmptyNestedExpression { index: usize },
}
