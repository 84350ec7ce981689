//! Thread-local parser pooling.
//!
//! tree-sitter parsers are not `Sync`, and the match aggregator parses files
//! on rayon worker threads. Each thread keeps one parser per language,
//! created on first use and reused afterwards.

use crate::grammar::ParseError;
use ast_grep_language::{LanguageExt, SupportLang};
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tree_sitter::Parser;

thread_local! {
    // Keyed by the language's Debug name.
    static PARSERS: RefCell<HashMap<String, Parser>> = RefCell::new(HashMap::new());
}

/// Execute `f` with this thread's pooled parser for `lang`.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use tree_patcher::pool::with_parser;
/// use ast_grep_language::SupportLang;
///
/// let tree = with_parser(SupportLang::Rust, |parser| parser.parse("fn main() {}", None))?;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(lang: SupportLang, f: F) -> Result<R, ParseError>
where
    F: FnOnce(&mut Parser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(format!("{lang:?}")) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut parser = Parser::new();
                parser
                    .set_language(&lang.get_ts_language())
                    .map_err(|_| ParseError::LanguageSet {
                        language: format!("{lang:?}"),
                    })?;
                entry.insert(parser)
            }
        };
        Ok(f(parser))
    })
}

/// Number of parsers pooled on the current thread.
pub fn pooled_parsers() -> usize {
    PARSERS.with(|cell| cell.borrow().len())
}
