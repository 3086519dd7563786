//! Applying resolved operations and compacting the result.

use super::diff::Operation;
use super::flatten::FlatTree;
use super::tree::{Node, Tree};

/// Apply `operations` in order to a copy of `base`.
///
/// `Add` and `Change` set the entry at their path. `Remove` only deletes a
/// scalar entry: a container placeholder occupying a removed leaf's path was
/// put there by the materializer for a replacement subtree and must stay.
pub fn patch(base: &FlatTree, operations: &[Operation]) -> FlatTree {
    let mut result = base.clone();
    for op in operations {
        match op {
            Operation::Add { path, value } => {
                result.insert(path.clone(), value.clone());
            }
            Operation::Change { path, new, .. } => {
                result.insert(path.clone(), new.clone());
            }
            Operation::Remove { path, .. } => {
                if matches!(result.get(path), Some(Node::Scalar(_))) {
                    result.remove(path);
                }
            }
        }
    }
    result
}

/// Drop blank-string leaves, then any container left with no keys.
pub fn compact(tree: &Tree) -> Tree {
    tree.iter()
        .filter_map(|(key, node)| {
            let kept = match node {
                Node::Scalar(scalar) if scalar.is_blank() => return None,
                Node::Scalar(_) => node.clone(),
                Node::Container(children) => {
                    let children = compact(children);
                    if children.is_empty() {
                        return None;
                    }
                    Node::Container(children)
                }
            };
            Some((key.clone(), kept))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Scalar;
    use crate::tree;

    #[test]
    fn test_patch_applies_in_order() {
        let mut base = FlatTree::new();
        base.insert("a".into(), Node::from(1i64));
        base.insert("b".into(), Node::from(2i64));

        let ops = vec![
            Operation::Remove {
                path: "a".into(),
                old: Node::from(1i64),
            },
            Operation::Change {
                path: "b".into(),
                old: Node::from(2i64),
                new: Node::from(3i64),
            },
            Operation::Add {
                path: "c.d".into(),
                value: Node::from("x"),
            },
        ];
        let result = patch(&base, &ops);
        assert_eq!(result.len(), 2);
        assert_eq!(result["b"], Node::from(3i64));
        assert_eq!(result["c.d"], Node::from("x"));
        // base untouched
        assert_eq!(base["a"], Node::from(1i64));
    }

    #[test]
    fn test_remove_keeps_placeholder() {
        let mut base = FlatTree::new();
        base.insert("c".into(), Node::from(3i64));
        let ops = vec![
            Operation::Add {
                path: "c".into(),
                value: Node::empty_container(),
            },
            Operation::Remove {
                path: "c".into(),
                old: Node::from(3i64),
            },
        ];
        let result = patch(&base, &ops);
        assert_eq!(result["c"], Node::empty_container());
    }

    #[test]
    fn test_compact_removes_blank_and_empty() {
        let t = tree! {
            "a" => "",
            "b" => tree! { "c" => tree!(), "d" => "" },
            "e" => tree! { "f" => "keep", "g" => tree! { "h" => "" } },
            "n" => Scalar::Null,
            "s" => " ",
        };
        let expected = tree! {
            "e" => tree! { "f" => "keep" },
            "n" => Scalar::Null,
            "s" => " ",
        };
        assert_eq!(compact(&t), expected);
    }

    #[test]
    fn test_compact_empty_tree() {
        assert!(compact(&Tree::new()).is_empty());
    }
}
