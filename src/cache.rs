//! Thread-local cache of parsed path expressions.
//!
//! Transform files and CLI invocations often repeat the same expression for
//! several transforms; parsing once per thread is enough.
//! Cache is capped at 256 entries; it is cleared when full.

use crate::path::{PathExpression, QueryError};
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static EXPRESSION_CACHE: RefCell<HashMap<String, PathExpression>> =
        RefCell::new(HashMap::new());
}

/// Get a parsed expression from cache, or parse and cache it.
///
/// Parse failures are not cached.
pub fn get_or_parse(input: &str) -> Result<PathExpression, QueryError> {
    EXPRESSION_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(expr) = cache.get(input) {
            return Ok(expr.clone());
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let parsed = PathExpression::parse(input)?;
        cache.insert(input.to_string(), parsed.clone());
        Ok(parsed)
    })
}

/// Clear the expression cache (mainly for testing).
pub fn clear_cache() {
    EXPRESSION_CACHE.with(|cache| {
        cache.borrow_mut().clear();
    });
}

pub fn cache_size() -> usize {
    EXPRESSION_CACHE.with(|cache| cache.borrow().len())
}
