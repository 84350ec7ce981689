use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("failed to set tree-sitter language {language}")]
    LanguageSet { language: String },

    #[error("parser produced no tree")]
    ParseFailed,

    #[error("content does not conform to grammar '{grammar}': {count} syntax error(s), first at byte {first_offset}")]
    SyntaxErrors {
        grammar: String,
        count: usize,
        first_offset: usize,
    },

    #[error("content does not conform to grammar '{grammar}': {message}")]
    Rejected { grammar: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown grammar '{id}'{}", suggestion.as_ref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default())]
pub struct UnknownGrammar {
    pub id: String,
    pub suggestion: Option<String>,
}
