use crate::grammar::errors::ParseError;
use crate::grammar::Grammar;
use crate::pool::with_parser;
use crate::tree::TreeNode;
use ast_grep_language::SupportLang;
use tracing::debug;

/// Languages registered by [`GrammarRegistry::with_builtins`](crate::grammar::GrammarRegistry::with_builtins).
const BUILTIN_LANGUAGES: &[(&str, SupportLang)] = &[
    ("c", SupportLang::C),
    ("cpp", SupportLang::Cpp),
    ("go", SupportLang::Go),
    ("java", SupportLang::Java),
    ("javascript", SupportLang::JavaScript),
    ("json", SupportLang::Json),
    ("python", SupportLang::Python),
    ("rust", SupportLang::Rust),
    ("typescript", SupportLang::TypeScript),
];

pub fn builtin_grammars() -> Vec<TreeSitterGrammar> {
    BUILTIN_LANGUAGES
        .iter()
        .map(|(id, lang)| TreeSitterGrammar::new(*id, *lang))
        .collect()
}

/// Grammar over a tree-sitter CST.
///
/// Each named CST node becomes a [`TreeNode`] whose name is the node kind,
/// whose value is the node's source text and whose offset is its start byte.
/// Anonymous tokens (punctuation, keywords) are dropped.
#[derive(Debug, Clone)]
pub struct TreeSitterGrammar {
    id: String,
    lang: SupportLang,
    lenient: bool,
}

impl TreeSitterGrammar {
    pub fn new(id: impl Into<String>, lang: SupportLang) -> Self {
        Self {
            id: id.into(),
            lang,
            lenient: false,
        }
    }

    /// Accept trees containing ERROR or MISSING nodes instead of failing.
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    pub fn language(&self) -> SupportLang {
        self.lang
    }
}

impl Grammar for TreeSitterGrammar {
    fn id(&self) -> &str {
        &self.id
    }

    fn parse(&self, content: &str) -> Result<TreeNode, ParseError> {
        let tree = with_parser(self.lang, |parser| parser.parse(content, None))?
            .ok_or(ParseError::ParseFailed)?;
        let root = tree.root_node();

        if !self.lenient {
            let mut errors = Vec::new();
            collect_error_offsets(root, &mut errors);
            if let Some(&first_offset) = errors.first() {
                debug!(grammar = %self.id, count = errors.len(), first_offset, "syntax errors in content");
                return Err(ParseError::SyntaxErrors {
                    grammar: self.id.clone(),
                    count: errors.len(),
                    first_offset,
                });
            }
        }

        Ok(convert(root, content))
    }
}

fn convert(node: tree_sitter::Node<'_>, source: &str) -> TreeNode {
    let mut cursor = node.walk();
    let named: Vec<tree_sitter::Node<'_>> = node.named_children(&mut cursor).collect();
    let children = named.into_iter().map(|child| convert(child, source)).collect();

    TreeNode {
        name: node.kind().to_string(),
        value: source[node.byte_range()].to_string(),
        offset: node.start_byte(),
        children,
    }
}

fn collect_error_offsets(node: tree_sitter::Node<'_>, errors: &mut Vec<usize>) {
    if node.is_error() || node.is_missing() {
        errors.push(node.start_byte());
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_offsets(child, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{run_query, PathExpression};

    #[test]
    fn parse_rust_into_named_nodes() {
        let grammar = TreeSitterGrammar::new("rust", SupportLang::Rust);
        let tree = grammar.parse("fn main() {}").unwrap();
        assert_eq!(tree.name, "source_file");
        assert_eq!(tree.offset, 0);

        let expr = PathExpression::parse("//function_item/identifier").unwrap();
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "main");
        assert_eq!(found[0].offset, 3);
    }

    #[test]
    fn parse_java_package() {
        let grammar = TreeSitterGrammar::new("java", SupportLang::Java);
        let source = "package com.foo.bar;\n";
        let tree = grammar.parse(source).unwrap();

        let expr = PathExpression::parse("//package_declaration/scoped_identifier").unwrap();
        let found = run_query(&tree, &expr).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "com.foo.bar");
        assert_eq!(found[0].offset, 8);
        assert_eq!(&source[found[0].offset..found[0].end_offset()], "com.foo.bar");
    }

    #[test]
    fn syntax_errors_fail_parse() {
        let grammar = TreeSitterGrammar::new("rust", SupportLang::Rust);
        let err = grammar.parse("fn main( { }").unwrap_err();
        assert!(matches!(err, ParseError::SyntaxErrors { count, .. } if count >= 1));
    }

    #[test]
    fn lenient_grammar_keeps_broken_trees() {
        let grammar = TreeSitterGrammar::new("rust", SupportLang::Rust).lenient();
        assert!(grammar.parse("fn main( { }").is_ok());
    }

    #[test]
    fn offsets_point_at_values() {
        let grammar = TreeSitterGrammar::new("rust", SupportLang::Rust);
        let source = "const A: u8 = 1;\nconst B: u8 = 2;\n";
        let tree = grammar.parse(source).unwrap();
        let expr = PathExpression::parse("//const_item/identifier").unwrap();
        for node in run_query(&tree, &expr).unwrap() {
            assert_eq!(&source[node.offset..node.end_offset()], node.value);
        }
    }
}
