//! Explicit creation of intermediate containers for nested additions.

use std::collections::BTreeSet;

use super::diff::Operation;
use super::flatten::{FlatTree, PathCodec};
use super::tree::Node;

/// Placeholder additions for every container an `Add` needs but the
/// ancestor does not already have.
///
/// Each missing prefix is emitted once, shortest first, in the order the
/// additions that need it appear. A prefix exists in the ancestor when some
/// ancestor leaf lies strictly beneath it.
pub fn materialize_missing_prefixes(
    codec: &PathCodec,
    ancestor: &FlatTree,
    operations: &[Operation],
) -> Vec<Operation> {
    let existing: BTreeSet<&str> = ancestor
        .keys()
        .flat_map(|path| codec.ancestors(path))
        .collect();

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut placeholders = Vec::new();

    for op in operations.iter().filter(|op| op.is_add()) {
        for prefix in codec.ancestors(op.path()) {
            if existing.contains(prefix) || !seen.insert(prefix) {
                continue;
            }
            placeholders.push(Operation::Add {
                path: prefix.to_string(),
                value: Node::empty_container(),
            });
        }
    }

    placeholders
}
