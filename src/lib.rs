//! Tree Patcher: query and patch source files through their syntax trees
//!
//! Files are parsed by a [`Grammar`] into offset-annotated [`TreeNode`]
//! trees. XPath-like [`PathExpression`]s select nodes across every selected
//! file of a project, and matched nodes can be changed in place. Changes are
//! reconciled back into the file text by an offset-keyed edit log.
//!
//! # Architecture
//!
//! Every mutation compiles down to a [`PendingEdit`]: the text expected at a
//! byte offset of the original content, and its replacement. Edits are
//! applied in descending offset order, so no edit ever sees an offset shifted
//! by another.
//!
//! # Safety
//!
//! - Every edit verifies its expected text before applying
//! - Content changed since parsing is never patched
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - UTF-8 validation
//!
//! # Example
//!
//! ```no_run
//! use tree_patcher::{find_file_matches, FileSelector, FsProject, GrammarRegistry, PathExpression, Project};
//!
//! let mut project = FsProject::open(".")?;
//! let grammars = GrammarRegistry::with_builtins();
//! let expr = PathExpression::parse("//package_declaration/scoped_identifier[.='com.foo.bar']")?;
//!
//! let mut groups = find_file_matches(&project, &grammars, &FileSelector::new("java"), &expr)?;
//! for group in &mut groups {
//!     group.make_updatable(&mut project);
//!     group.node_mut(0)?.set_value("com.foo.barx")?;
//! }
//! for outcome in project.commit() {
//!     println!("{:?}", outcome?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod config;
pub mod grammar;
pub mod matches;
pub mod patch;
pub mod path;
pub mod pool;
pub mod project;
pub mod safety;
pub mod selector;
pub mod tree;

// Re-exports
pub use config::{
    apply_transforms, load_from_path, load_from_str, ApplicationError, ConfigError,
    TransformConfig, TransformResult,
};
pub use grammar::{Grammar, GrammarRegistry, ParseError, TreeSitterGrammar, UnknownGrammar};
pub use matches::{find_file_matches, FileMatchGroup, MatchError};
pub use patch::{apply_edits, EditConflict, EditKind, FlushOutcome, NodeHandle, PatchError, PendingEdit};
pub use path::{run_query, Axis, NameTest, NodePredicate, PathExpression, Predicate, QueryEngine, QueryError, Step};
pub use project::{FileStore, FsProject, MemoryProject, Project, ProjectError, ProjectFile};
pub use safety::{SafetyError, WorkspaceGuard};
pub use selector::{FileFilter, FileSelector};
pub use tree::{NodePath, TreeNode};
