//! Grammar integration: turns file content into a [`TreeNode`] tree.
//!
//! The engine never parses anything itself. A [`Grammar`] is any parser that
//! produces offset-annotated trees; [`TreeSitterGrammar`] adapts
//! the tree-sitter languages bundled with `ast-grep-language`.

pub mod errors;
pub mod treesitter;

pub use treesitter::TreeSitterGrammar;
pub use errors::{ParseError, UnknownGrammar};

use crate::tree::TreeNode;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A parser producing offset-annotated trees.
///
/// Implementations must assign offsets against the exact `content` passed
/// in, non-decreasing in document order among siblings.
pub trait Grammar: Send + Sync {
    fn id(&self) -> &str;

    fn parse(&self, content: &str) -> Result<TreeNode, ParseError>;
}

/// Grammar backed by a plain function, for ad-hoc and test grammars.
pub struct FnGrammar<F> {
    id: String,
    parse: F,
}

impl<F> Grammar for FnGrammar<F>
where
    F: Fn(&str) -> Result<TreeNode, ParseError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn parse(&self, content: &str) -> Result<TreeNode, ParseError> {
        (self.parse)(content)
    }
}

/// Wrap a parse function as a [`Grammar`].
pub fn from_fn<F>(id: impl Into<String>, parse: F) -> FnGrammar<F>
where
    F: Fn(&str) -> Result<TreeNode, ParseError> + Send + Sync,
{
    FnGrammar {
        id: id.into(),
        parse,
    }
}

/// Grammars by identifier.
#[derive(Clone, Default)]
pub struct GrammarRegistry {
    grammars: BTreeMap<String, Arc<dyn Grammar>>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tree-sitter grammar.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for grammar in treesitter::builtin_grammars() {
            registry.register(grammar);
        }
        registry
    }

    /// Add or replace a grammar under its own id.
    pub fn register(&mut self, grammar: impl Grammar + 'static) {
        self.grammars
            .insert(grammar.id().to_string(), Arc::new(grammar));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Grammar>> {
        self.grammars.get(id).cloned()
    }

    /// Look up a grammar, suggesting the closest known id on a miss.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Grammar>, UnknownGrammar> {
        self.get(id).ok_or_else(|| UnknownGrammar {
            id: id.to_string(),
            suggestion: self.closest_id(id),
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.grammars.keys().map(String::as_str)
    }

    fn closest_id(&self, id: &str) -> Option<String> {
        self.grammars
            .keys()
            .map(|known| (strsim::jaro_winkler(id, known), known))
            .filter(|(score, _)| *score >= 0.8)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, known)| known.clone())
    }
}

impl fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.grammars.keys()).finish()
    }
}
