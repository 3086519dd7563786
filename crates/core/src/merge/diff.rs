//! Structural difference between two flat trees.

use std::fmt;

use super::flatten::FlatTree;
use super::tree::Node;

/// A single change to a path, relative to some base tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Add { path: String, value: Node },
    Remove { path: String, old: Node },
    Change { path: String, old: Node, new: Node },
}

impl Operation {
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path, .. } | Self::Change { path, .. } => path,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, Self::Add { .. })
    }

    /// Single-character tag, as used in textual diff output.
    pub fn symbol(&self) -> char {
        match self {
            Self::Add { .. } => '+',
            Self::Remove { .. } => '-',
            Self::Change { .. } => '~',
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { path, value } => write!(f, "+ {path} = {value}"),
            Self::Remove { path, old } => write!(f, "- {path} (was {old})"),
            Self::Change { path, old, new } => write!(f, "~ {path}: {old} -> {new}"),
        }
    }
}

/// Compute the operations that turn `from` into `to`.
///
/// Output is sorted by path; unchanged paths produce nothing.
pub fn diff(from: &FlatTree, to: &FlatTree) -> Vec<Operation> {
    let mut ops = Vec::new();

    for (path, old) in from {
        match to.get(path) {
            None => ops.push(Operation::Remove {
                path: path.clone(),
                old: old.clone(),
            }),
            Some(new) if new != old => ops.push(Operation::Change {
                path: path.clone(),
                old: old.clone(),
                new: new.clone(),
            }),
            Some(_) => {}
        }
    }

    for (path, value) in to {
        if !from.contains_key(path) {
            ops.push(Operation::Add {
                path: path.clone(),
                value: value.clone(),
            });
        }
    }

    ops.sort_by(|a, b| a.path().cmp(b.path()));
    ops
}
