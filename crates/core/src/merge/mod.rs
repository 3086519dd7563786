//! Three-way merging of nested key/value trees.
//!
//! The pipeline, leaf-first:
//! 1. **Tree** -- the recursive value model.
//! 2. **Flatten** -- trees to and from `path -> scalar` maps.
//! 3. **Diff** -- tagged add / remove / change operations between flat maps.
//! 4. **Resolver** -- primary-wins resolution with subtree atomicity.
//! 5. **Materialize** -- explicit containers for nested additions.
//! 6. **Patch** -- applying operations, then compaction.
//! 7. **Engine** -- `merge(ancestor, primary, secondary)`.

pub mod diff;
pub mod engine;
pub mod flatten;
pub mod materialize;
pub mod patch;
pub mod resolver;
pub mod tree;

pub use diff::{diff, Operation};
pub use engine::{merge, MergeEngine, MergeReport};
pub use flatten::{FlatTree, PathCodec};
pub use patch::compact;
pub use resolver::{ConflictResolver, DeletedPrefixes, Resolution};
pub use tree::{Node, Scalar, Tree};
