//! Offset-annotated syntax tree model.
//!
//! Every grammar produces [`TreeNode`]s. The query engine only reads them;
//! the patch layer writes through [`crate::patch::NodeHandle`] and never
//! touches `offset`.

use std::fmt;

/// One parsed construct: a declaration, a literal, an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreeNode {
    /// Construct kind (not unique)
    pub name: String,
    /// Raw source text of the construct
    pub value: String,
    /// Byte position of `value` in the file content the tree was parsed from
    pub offset: usize,
    /// Child constructs in document order
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a leaf node.
    pub fn leaf(name: impl Into<String>, value: impl Into<String>, offset: usize) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            offset,
            children: Vec::new(),
        }
    }

    /// Create a node with children.
    pub fn with_children(
        name: impl Into<String>,
        value: impl Into<String>,
        offset: usize,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            offset,
            children,
        }
    }

    /// Byte offset one past the end of the value.
    pub fn end_offset(&self) -> usize {
        self.offset + self.value.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolve a path relative to this node.
    pub fn at(&self, path: &NodePath) -> Option<&TreeNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, &i| node.children.get(i))
    }

    /// Resolve a path relative to this node, mutably.
    pub fn at_mut(&mut self, path: &NodePath) -> Option<&mut TreeNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, &i| node.children.get_mut(i))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TreeNode::subtree_size)
            .sum::<usize>()
    }
}

/// Address of a node as child indices from a query root.
///
/// Lexicographic order of paths is document order, so sorting and
/// de-duplicating a set of paths yields a document-ordered, duplicate-free
/// node set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// The path of the root itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Path of the `index`-th child of this node.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    /// Append another path below this one.
    pub fn join(&self, rest: &NodePath) -> Self {
        let mut indices = self.0.clone();
        indices.extend_from_slice(&rest.0);
        Self(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}
