//! Primary-wins conflict resolution between two operation lists.
//!
//! Both lists are diffs against the same ancestor. The resolver keeps every
//! primary operation and as many secondary operations as can be applied
//! alongside them without contradicting primary:
//!
//! 1. A secondary operation on a path primary also touched is dropped. If it
//!    was value-identical it is a silent duplicate, otherwise a conflict.
//! 2. A path is either a scalar or a container prefix, never both, so a
//!    secondary operation is also dropped when its path lies beneath, or
//!    strictly above, a path primary claims. Claimed paths are primary's
//!    operation paths plus the containers primary deleted outright.
//! 3. If any conflict falls inside a container that secondary deleted or
//!    replaced by a scalar, every secondary operation inside that container
//!    is dropped together. Subtree deletions apply entirely or not at all.
//! 4. The result is primary's operations plus the surviving secondary ones.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use tracing::debug;

use super::diff::Operation;
use super::flatten::PathCodec;
use super::tree::{Node, Tree};

/// Containers each side deleted outright or replaced with a scalar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedPrefixes {
    pub primary: BTreeSet<String>,
    pub secondary: BTreeSet<String>,
}

/// Output of [`ConflictResolver::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Operations to apply to the ancestor, sorted by path.
    pub operations: Vec<Operation>,
    /// Paths of secondary operations that genuinely disagreed with primary.
    pub conflicts: BTreeSet<String>,
    /// Secondary subtree deletions that were discarded as a whole.
    pub atomic_drops: BTreeSet<String>,
    /// Total number of secondary operations not applied.
    pub dropped: usize,
}

/// Stateless resolver parameterized by the path delimiter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    codec: PathCodec,
}

impl ConflictResolver {
    pub fn new(codec: PathCodec) -> Self {
        Self { codec }
    }

    pub fn resolve(
        &self,
        primary: &[Operation],
        secondary: &[Operation],
        deleted: &DeletedPrefixes,
    ) -> Resolution {
        let by_path: HashMap<&str, &Operation> =
            primary.iter().map(|op| (op.path(), op)).collect();

        let claimed: BTreeSet<&str> = primary
            .iter()
            .map(Operation::path)
            .chain(deleted.primary.iter().map(String::as_str))
            .collect();

        let mut conflicts = BTreeSet::new();
        let mut survivors = Vec::new();
        let mut dropped = 0;

        for op in secondary {
            let path = op.path();
            match by_path.get(path) {
                Some(primary_op) if *primary_op == op => {
                    dropped += 1;
                }
                Some(_) => {
                    debug!(path, "direct conflict, primary wins");
                    conflicts.insert(path.to_string());
                    dropped += 1;
                }
                None if self.collides_with_claim(path, &claimed) => {
                    debug!(path, "prefix conflict, primary wins");
                    conflicts.insert(path.to_string());
                    dropped += 1;
                }
                None => survivors.push(op),
            }
        }

        let atomic_drops: BTreeSet<String> = deleted
            .secondary
            .iter()
            .filter(|prefix| conflicts.iter().any(|c| self.codec.is_within(c, prefix)))
            .cloned()
            .collect();

        if !atomic_drops.is_empty() {
            let before = survivors.len();
            survivors.retain(|op| {
                !atomic_drops
                    .iter()
                    .any(|prefix| self.codec.is_within(op.path(), prefix))
            });
            dropped += before - survivors.len();
            debug!(
                prefixes = atomic_drops.len(),
                dropped = before - survivors.len(),
                "discarded conflicting secondary subtree deletions"
            );
        }

        let mut operations: Vec<Operation> = primary
            .iter()
            .cloned()
            .chain(survivors.into_iter().cloned())
            .collect();
        operations.sort_by(|a, b| a.path().cmp(b.path()));

        Resolution {
            operations,
            conflicts,
            atomic_drops,
            dropped,
        }
    }

    /// True if `path` is at, beneath, or strictly above any claimed path.
    fn collides_with_claim(&self, path: &str, claimed: &BTreeSet<&str>) -> bool {
        if claimed.contains(path) || self.codec.ancestors(path).any(|a| claimed.contains(a)) {
            return true;
        }
        let below = format!("{path}{}", self.codec.delimiter());
        claimed
            .range::<str, _>((Bound::Included(below.as_str()), Bound::Unbounded))
            .next()
            .is_some_and(|c| c.starts_with(below.as_str()))
    }
}

/// Topmost containers of `ancestor` that `other` deleted or replaced.
///
/// Compares the nested trees directly: once flattened, a removed container is
/// indistinguishable from a set of removed leaves. A container counts as
/// deleted when `other` lacks it, holds a scalar there, or holds a container
/// that compacts to nothing. Containers already empty in `ancestor` are
/// ignored since they have no leaves to lose.
pub fn deleted_prefixes(codec: &PathCodec, ancestor: &Tree, other: &Tree) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_deleted(codec, None, ancestor, Some(other), &mut out);
    out
}

fn collect_deleted(
    codec: &PathCodec,
    prefix: Option<&str>,
    ancestor: &Tree,
    other: Option<&Tree>,
    out: &mut BTreeSet<String>,
) {
    for (key, node) in ancestor {
        let Node::Container(children) = node else {
            continue;
        };
        if node.is_vacant() {
            continue;
        }
        let path = codec.child_path(prefix, key);
        match other.and_then(|o| o.get(key)) {
            Some(theirs @ Node::Container(their_children)) if !theirs.is_vacant() => {
                collect_deleted(codec, Some(&path), children, Some(their_children), out);
            }
            _ => {
                out.insert(path);
            }
        }
    }
}
