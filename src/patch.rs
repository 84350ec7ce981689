//! Patch reconciliation: deferred, offset-keyed edits against matched nodes.
//!
//! Mutations through a [`NodeHandle`] never touch file content. They update
//! the node's in-memory value and append a [`PendingEdit`] to the group's
//! [`EditLog`]. At flush time [`apply_edits`] rewrites the original content
//! bottom-to-top (descending offset), so no edit ever sees an offset shifted
//! by another.

use crate::project::{FileStore, ProjectError, ProjectFile};
use crate::tree::{NodePath, TreeNode};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

/// What a pending edit does to the node it was recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EditKind {
    /// Replace the node's value
    Replace,
    /// Insert before the node's value
    Prepend,
    /// Insert after the node's value
    Append,
}

/// A recorded, not yet applied textual change.
///
/// `offset` is a byte position in the content the tree was parsed from.
/// Insertions have an empty `original`. `node_len` is the parsed length of
/// the node's value the edit was recorded against; it places the edit among
/// others sharing its offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub kind: EditKind,
    pub original: String,
    pub replacement: String,
    pub offset: usize,
    pub node_len: usize,
}

impl PendingEdit {
    pub fn replace(offset: usize, original: impl Into<String>, replacement: impl Into<String>) -> Self {
        let original = original.into();
        Self {
            kind: EditKind::Replace,
            node_len: original.len(),
            original,
            replacement: replacement.into(),
            offset,
        }
    }

    /// Insert `text` before the node at `node_offset`.
    pub fn prepend(node_offset: usize, node_len: usize, text: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Prepend,
            original: String::new(),
            replacement: text.into(),
            offset: node_offset,
            node_len,
        }
    }

    /// Insert `text` after the node at `node_offset`.
    pub fn append(node_offset: usize, node_len: usize, text: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Append,
            original: String::new(),
            replacement: text.into(),
            offset: node_offset + node_len,
            node_len,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.original == self.replacement
    }

    /// Left-to-right position among the edits at the same offset.
    ///
    /// At a byte position `p` the result reads: text appended to a node
    /// ending at `p`, then the edits of an empty node at `p` (prepend, value,
    /// append), then text prepended to a node starting at `p`, then that
    /// node's value.
    fn slot(&self) -> u8 {
        match (self.kind, self.node_len == 0) {
            (EditKind::Append, false) => 0,
            (EditKind::Prepend, true) => 1,
            (EditKind::Replace, true) => 2,
            (EditKind::Append, true) => 3,
            (EditKind::Prepend, false) => 4,
            (EditKind::Replace, false) => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    OutOfRange { len: usize },
    NotCharBoundary,
    NotFound,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::OutOfRange { len } => write!(f, "offset beyond content of length {len}"),
            ConflictReason::NotCharBoundary => write!(f, "offset is not on a UTF-8 character boundary"),
            ConflictReason::NotFound => write!(f, "expected text not found at or after offset"),
        }
    }
}

/// An edit whose expected text could not be located.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("edit at byte {offset} cannot be applied: {reason} (expected {expected:?})")]
pub struct EditConflict {
    pub offset: usize,
    pub expected: String,
    pub reason: ConflictReason,
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("patch conflict in {file}: {source}")]
    Conflict {
        file: ProjectFile,
        #[source]
        source: EditConflict,
    },

    #[error("content of {file} changed since it was parsed; offsets are no longer valid")]
    StaleContent { file: ProjectFile },

    #[error("matches in {file} are read-only; call make_updatable() first")]
    NotUpdatable { file: ProjectFile },

    #[error("no match #{index} in {file} ({len} matches)")]
    NoSuchMatch {
        file: ProjectFile,
        index: usize,
        len: usize,
    },

    #[error("matches in {file} were already flushed")]
    AlreadyFlushed { file: ProjectFile },

    #[error(transparent)]
    Project(#[from] ProjectError),
}

/// Result of flushing one file's edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushOutcome {
    pub file: ProjectFile,
    pub edits_applied: usize,
    /// Whether new content was written
    pub changed: bool,
}

/// Apply `edits` to `content`.
///
/// Edits are applied in descending offset order. Edits sharing an offset end
/// up in their node-relative order (see [`PendingEdit`]): appended text of a
/// node comes before prepended text of the next, and an empty node keeps its
/// prepend, value and append in that order. Edits in the same position keep
/// their recorded order from left to right. Each edit replaces the first
/// occurrence of its `original` at or after its offset.
pub fn apply_edits(content: &str, edits: &[PendingEdit]) -> Result<String, EditConflict> {
    let mut ordered: Vec<(usize, &PendingEdit)> = edits.iter().enumerate().collect();
    // text inserted later at an offset lands left of text inserted earlier
    ordered.sort_by(|(ia, a), (ib, b)| {
        b.offset
            .cmp(&a.offset)
            .then(b.slot().cmp(&a.slot()))
            .then(ib.cmp(ia))
    });

    let mut output = content.to_string();
    for (_, edit) in ordered {
        let conflict = |reason| EditConflict {
            offset: edit.offset,
            expected: edit.original.clone(),
            reason,
        };

        if edit.offset > output.len() {
            return Err(conflict(ConflictReason::OutOfRange { len: output.len() }));
        }
        if !output.is_char_boundary(edit.offset) {
            return Err(conflict(ConflictReason::NotCharBoundary));
        }
        let start = output[edit.offset..]
            .find(edit.original.as_str())
            .map(|found| edit.offset + found)
            .ok_or_else(|| conflict(ConflictReason::NotFound))?;

        output.replace_range(start..start + edit.original.len(), &edit.replacement);
    }

    Ok(output)
}

/// Pending edits of one match group, in call order.
///
/// Repeated edits of the same kind on the same node coalesce: value sets keep
/// the originally parsed value and the last new value, appends and prepends
/// concatenate.
#[derive(Debug, Default)]
pub struct EditLog {
    edits: Vec<PendingEdit>,
    by_node: HashMap<(NodePath, EditKind), usize>,
    flushed: bool,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edits(&self) -> &[PendingEdit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    fn record_set(&mut self, path: &NodePath, node: &TreeNode, value: &str) {
        match self.by_node.get(&(path.clone(), EditKind::Replace)) {
            Some(&index) => self.edits[index].replacement = value.to_string(),
            None => self.push(path, PendingEdit::replace(node.offset, &node.value, value)),
        }
    }

    fn record_insert(&mut self, path: &NodePath, edit: PendingEdit) {
        match self.by_node.get(&(path.clone(), edit.kind)) {
            Some(&index) => {
                let existing = &mut self.edits[index].replacement;
                match edit.kind {
                    EditKind::Prepend => existing.insert_str(0, &edit.replacement),
                    _ => existing.push_str(&edit.replacement),
                }
            }
            None => self.push(path, edit),
        }
    }

    /// Length of the node's value as parsed, before any recorded set.
    fn parsed_len(&self, path: &NodePath, node: &TreeNode) -> usize {
        self.by_node
            .get(&(path.clone(), EditKind::Replace))
            .map(|&index| self.edits[index].original.len())
            .unwrap_or(node.value.len())
    }

    fn push(&mut self, path: &NodePath, edit: PendingEdit) {
        self.by_node
            .insert((path.clone(), edit.kind), self.edits.len());
        self.edits.push(edit);
    }
}

/// Mutable proxy for one matched node of an updatable group.
///
/// Value changes are visible on the node immediately; file content changes
/// only when the group is flushed.
pub struct NodeHandle<'g> {
    file: &'g ProjectFile,
    path: &'g NodePath,
    node: &'g mut TreeNode,
    log: &'g RefCell<EditLog>,
}

impl<'g> NodeHandle<'g> {
    pub(crate) fn new(
        file: &'g ProjectFile,
        path: &'g NodePath,
        node: &'g mut TreeNode,
        log: &'g RefCell<EditLog>,
    ) -> Self {
        Self {
            file,
            path,
            node,
            log,
        }
    }

    pub fn node(&self) -> &TreeNode {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn value(&self) -> &str {
        &self.node.value
    }

    pub fn offset(&self) -> usize {
        self.node.offset
    }

    /// Replace the node's value.
    pub fn set_value(&mut self, value: impl Into<String>) -> Result<(), PatchError> {
        let value = value.into();
        let mut log = self.writable_log()?;
        log.record_set(self.path, self.node, &value);
        debug!(file = %self.file, offset = self.node.offset, from = %self.node.value, to = %value, "set value");
        self.node.value = value;
        Ok(())
    }

    /// Insert `text` right after the node's value.
    pub fn append(&mut self, text: &str) -> Result<(), PatchError> {
        let mut log = self.writable_log()?;
        let len = log.parsed_len(self.path, self.node);
        let edit = PendingEdit::append(self.node.offset, len, text);
        debug!(file = %self.file, offset = edit.offset, text, "append");
        log.record_insert(self.path, edit);
        Ok(())
    }

    /// Insert `text` right before the node's value.
    pub fn prepend(&mut self, text: &str) -> Result<(), PatchError> {
        let mut log = self.writable_log()?;
        let len = log.parsed_len(self.path, self.node);
        log.record_insert(self.path, PendingEdit::prepend(self.node.offset, len, text));
        debug!(file = %self.file, offset = self.node.offset, text, "prepend");
        Ok(())
    }

    fn writable_log(&self) -> Result<std::cell::RefMut<'g, EditLog>, PatchError> {
        let log = self.log.borrow_mut();
        if log.is_flushed() {
            return Err(PatchError::AlreadyFlushed {
                file: self.file.clone(),
            });
        }
        Ok(log)
    }
}

impl fmt::Debug for NodeHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("file", self.file)
            .field("path", self.path)
            .field("name", &self.node.name)
            .field("value", &self.node.value)
            .finish()
    }
}

/// Apply a group's pending edits to `file` and persist the result.
///
/// `content_hash` is the xxh3 hash of the content the tree was parsed from;
/// if the file no longer has that content the edits are not applied. A
/// successful flush is terminal: flushing again does nothing. A failed flush
/// keeps the log and its edits so the group can be flushed again.
pub(crate) fn flush_log(
    file: &ProjectFile,
    content_hash: u64,
    log: &RefCell<EditLog>,
    store: &mut dyn FileStore,
) -> Result<FlushOutcome, PatchError> {
    let edits = {
        let log = log.borrow();
        if log.flushed {
            debug!(file = %file, "already flushed");
            return Ok(FlushOutcome {
                file: file.clone(),
                edits_applied: 0,
                changed: false,
            });
        }
        log.edits.clone()
    };

    if edits.is_empty() {
        log.borrow_mut().flushed = true;
        return Ok(FlushOutcome {
            file: file.clone(),
            edits_applied: 0,
            changed: false,
        });
    }

    let content = store.content(file)?;
    if xxh3_64(content.as_bytes()) != content_hash {
        warn!(file = %file, "content changed since parse, refusing to flush");
        return Err(PatchError::StaleContent { file: file.clone() });
    }

    let updated = apply_edits(&content, &edits).map_err(|source| {
        warn!(file = %file, error = %source, "patch conflict");
        PatchError::Conflict {
            file: file.clone(),
            source,
        }
    })?;

    let changed = updated != content;
    if changed {
        store.set_content(file, &updated)?;
    }
    log.borrow_mut().flushed = true;
    info!(file = %file, edits = edits.len(), changed, "flushed edits");

    Ok(FlushOutcome {
        file: file.clone(),
        edits_applied: edits.len(),
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::MemoryProject;

    #[test]
    fn no_edits_is_identity() {
        assert_eq!(apply_edits("package a;", &[]).unwrap(), "package a;");
    }

    #[test]
    fn descending_order_keeps_offsets_valid() {
        // values of length 5 at 10 and 30
        let content = "0123456789AAAAA0123456789012345BBBBB tail";
        let edits = vec![
            PendingEdit::replace(10, "AAAAA", "twenty-characters-xx"),
            PendingEdit::replace(31, "BBBBB", "bbbbb"),
        ];
        let out = apply_edits(content, &edits).unwrap();
        assert_eq!(out, "0123456789twenty-characters-xx0123456789012345bbbbb tail");
    }

    #[test]
    fn untouched_region_is_shifted_not_corrupted() {
        let content = "0123456789AAAAA---------------BBBBB---";
        let edits = vec![PendingEdit::replace(10, "AAAAA", "x".repeat(20))];
        let out = apply_edits(content, &edits).unwrap();
        assert_eq!(&out[30 + 15..30 + 15 + 5], "BBBBB");
        assert_eq!(out.len(), content.len() + 15);
    }

    #[test]
    fn recorded_order_of_edits_does_not_matter() {
        let content = "a=1; b=2;";
        let forward = vec![
            PendingEdit::replace(2, "1", "10"),
            PendingEdit::replace(7, "2", "20"),
        ];
        let backward: Vec<PendingEdit> = forward.iter().rev().cloned().collect();
        assert_eq!(
            apply_edits(content, &forward).unwrap(),
            apply_edits(content, &backward).unwrap()
        );
    }

    #[test]
    fn insertions_at_a_shared_boundary() {
        // node "ab" at 0 and node "cd" at 2: append to the first, prepend to the second
        let content = "abcd";
        let edits = vec![
            PendingEdit::prepend(2, 2, "<"),
            PendingEdit::append(0, 2, "!"),
            PendingEdit::replace(2, "cd", "CD"),
        ];
        assert_eq!(apply_edits(content, &edits).unwrap(), "ab!<CD");
    }

    #[test]
    fn empty_node_keeps_prepend_value_append_order() {
        // empty node at 3 between "ab" ending at 2..3 and "def" starting at 3
        let content = "abcdef";
        let edits = vec![
            PendingEdit::append(3, 0, ">"),
            PendingEdit::prepend(3, 3, "["),
            PendingEdit::replace(3, "", "X"),
            PendingEdit::append(0, 3, "]"),
            PendingEdit::prepend(3, 0, "<"),
        ];
        assert_eq!(apply_edits(content, &edits).unwrap(), "abc]<X>[def");
    }

    #[test]
    fn insertions_in_the_same_position_keep_recorded_order() {
        // parent and child both start at 0
        let edits = vec![
            PendingEdit::prepend(0, 4, "1"),
            PendingEdit::prepend(0, 2, "2"),
        ];
        assert_eq!(apply_edits("abcd", &edits).unwrap(), "12abcd");
    }

    #[test]
    fn missing_original_is_a_conflict() {
        let err = apply_edits("abc", &[PendingEdit::replace(1, "zz", "y")]).unwrap_err();
        assert_eq!(err.reason, ConflictReason::NotFound);
        let err = apply_edits("abc", &[PendingEdit::append(7, 2, "y")]).unwrap_err();
        assert!(matches!(err.reason, ConflictReason::OutOfRange { len: 3 }));
        let err = apply_edits("é", &[PendingEdit::prepend(1, 1, "y")]).unwrap_err();
        assert_eq!(err.reason, ConflictReason::NotCharBoundary);
    }

    fn node_fixture() -> (ProjectFile, NodePath, TreeNode, RefCell<EditLog>) {
        (
            ProjectFile::new("A.java"),
            NodePath::root(),
            TreeNode::leaf("packageName", "com.foo.bar", 8),
            RefCell::new(EditLog::new()),
        )
    }

    #[test]
    fn repeated_sets_coalesce() {
        let (file, path, mut node, log) = node_fixture();
        {
            let mut handle = NodeHandle::new(&file, &path, &mut node, &log);
            handle.set_value("x").unwrap();
            handle.set_value("com.foo.barx").unwrap();
            assert_eq!(handle.value(), "com.foo.barx");
        }
        let log = log.into_inner();
        assert_eq!(log.len(), 1);
        assert_eq!(log.edits()[0], PendingEdit::replace(8, "com.foo.bar", "com.foo.barx"));
    }

    #[test]
    fn append_after_set_uses_parsed_length() {
        let (file, path, mut node, log) = node_fixture();
        {
            let mut handle = NodeHandle::new(&file, &path, &mut node, &log);
            handle.set_value("org.example").unwrap();
            handle.append(".api").unwrap();
            handle.append(".v2").unwrap();
            handle.prepend("/*b*/").unwrap();
            handle.prepend("/*a*/").unwrap();
        }
        let content = "package com.foo.bar;";
        let out = apply_edits(content, log.borrow().edits()).unwrap();
        assert_eq!(out, "package /*a*//*b*/org.example.api.v2;");
    }

    #[test]
    fn handle_edits_on_an_empty_value_stay_in_call_order() {
        let content = "abcdef";
        let mut project = MemoryProject::new().with_file("slot.txt", content);
        let file = ProjectFile::new("slot.txt");
        let path = NodePath::root();
        let mut node = TreeNode::leaf("slot", "", 3);
        let log = RefCell::new(EditLog::new());
        {
            let mut handle = NodeHandle::new(&file, &path, &mut node, &log);
            handle.prepend("<").unwrap();
            handle.append(">").unwrap();
        }
        let hash = xxh3_64(content.as_bytes());
        flush_log(&file, hash, &log, &mut project).unwrap();
        assert_eq!(project.file("slot.txt"), Some("abc<>def"));

        let mut project = MemoryProject::new().with_file("slot.txt", content);
        let mut node = TreeNode::leaf("slot", "", 3);
        let log = RefCell::new(EditLog::new());
        {
            let mut handle = NodeHandle::new(&file, &path, &mut node, &log);
            handle.set_value("X").unwrap();
            handle.append("!").unwrap();
        }
        flush_log(&file, hash, &log, &mut project).unwrap();
        assert_eq!(project.file("slot.txt"), Some("abcX!def"));
    }

    #[test]
    fn flush_writes_once_and_is_terminal() {
        let content = "package com.foo.bar;";
        let mut project = MemoryProject::new().with_file("A.java", content);
        let (file, path, mut node, log) = node_fixture();
        NodeHandle::new(&file, &path, &mut node, &log)
            .set_value("com.foo.barx")
            .unwrap();

        let hash = xxh3_64(content.as_bytes());
        let outcome = flush_log(&file, hash, &log, &mut project).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.edits_applied, 1);
        assert_eq!(project.file("A.java"), Some("package com.foo.barx;"));

        let again = flush_log(&file, hash, &log, &mut project).unwrap();
        assert!(!again.changed);

        let err = NodeHandle::new(&file, &path, &mut node, &log)
            .set_value("y")
            .unwrap_err();
        assert!(matches!(err, PatchError::AlreadyFlushed { .. }));
    }

    #[test]
    fn flush_refuses_stale_content() {
        let mut project = MemoryProject::new().with_file("A.java", "package changed;");
        let (file, path, mut node, log) = node_fixture();
        NodeHandle::new(&file, &path, &mut node, &log)
            .set_value("z")
            .unwrap();
        let hash = xxh3_64(b"package com.foo.bar;");
        let err = flush_log(&file, hash, &log, &mut project).unwrap_err();
        assert!(matches!(err, PatchError::StaleContent { .. }));
        assert_eq!(project.file("A.java"), Some("package changed;"));
    }

    #[test]
    fn failed_flush_keeps_edits_for_a_retry() {
        let original = "package com.foo.bar;";
        let file = ProjectFile::new("A.java");
        let mut project = MemoryProject::new().with_file("A.java", "package changed;");
        let (_, path, mut node, log) = node_fixture();
        NodeHandle::new(&file, &path, &mut node, &log)
            .set_value("com.foo.barx")
            .unwrap();

        let hash = xxh3_64(original.as_bytes());
        assert!(flush_log(&file, hash, &log, &mut project).is_err());
        assert!(!log.borrow().is_flushed());
        assert_eq!(log.borrow().len(), 1);

        project.set_content(&file, original).unwrap();
        let outcome = flush_log(&file, hash, &log, &mut project).unwrap();
        assert!(outcome.changed);
        assert!(log.borrow().is_flushed());
        assert_eq!(project.file("A.java"), Some("package com.foo.barx;"));
    }
}
