//! Lossless conversion between nested trees and flat path maps.
//!
//! A path joins container keys with a delimiter that must not occur in any
//! key. Flattening only emits scalar leaves; containers are implied by the
//! prefixes of their descendants. Expansion additionally accepts empty
//! container entries, which the materializer uses as explicit placeholders.

use std::collections::BTreeMap;

use tracing::trace;

use super::tree::{Node, Tree};
use crate::errors::MergeError;

/// Flat representation of a tree: path to leaf (or container placeholder).
pub type FlatTree = BTreeMap<String, Node>;

/// Converts trees to and from [`FlatTree`]s using a fixed delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCodec {
    delimiter: char,
}

impl Default for PathCodec {
    fn default() -> Self {
        Self::new('.')
    }
}

impl PathCodec {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Flatten `tree` into scalar leaves keyed by path.
    ///
    /// Fails with [`MergeError::DelimiterCollision`] before producing anything
    /// if any key contains the delimiter.
    pub fn flatten(&self, tree: &Tree) -> Result<FlatTree, MergeError> {
        let mut flat = FlatTree::new();
        self.flatten_into(tree, None, &mut flat)?;
        trace!(leaves = flat.len(), "flattened tree");
        Ok(flat)
    }

    fn flatten_into(
        &self,
        tree: &Tree,
        prefix: Option<&str>,
        acc: &mut FlatTree,
    ) -> Result<(), MergeError> {
        for (key, node) in tree {
            if key.contains(self.delimiter) {
                return Err(MergeError::DelimiterCollision {
                    key: key.clone(),
                    delimiter: self.delimiter,
                });
            }
            let path = self.child_path(prefix, key);
            match node {
                Node::Container(children) => self.flatten_into(children, Some(&path), acc)?,
                Node::Scalar(_) => {
                    acc.insert(path, node.clone());
                }
            }
        }
        Ok(())
    }

    /// Rebuild nested containers from a flat map.
    ///
    /// Missing intermediate containers are created on the way down. An empty
    /// container entry merges into an existing container at the same path.
    /// A path that would need to be both a scalar and a container yields
    /// [`MergeError::TypeConflict`].
    pub fn expand(&self, flat: &FlatTree) -> Result<Tree, MergeError> {
        let mut root = Tree::new();
        for (path, value) in flat {
            self.insert_path(&mut root, path, value)?;
        }
        Ok(root)
    }

    fn insert_path(&self, root: &mut Tree, path: &str, value: &Node) -> Result<(), MergeError> {
        let segments: Vec<&str> = path.split(self.delimiter).collect();
        let (leaf, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };

        let mut current = root;
        let mut walked = 0;
        for segment in parents {
            walked += segment.len();
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(Node::empty_container);
            current = match entry {
                Node::Container(children) => children,
                Node::Scalar(_) => {
                    return Err(MergeError::TypeConflict {
                        path: path[..walked].to_string(),
                    })
                }
            };
            walked += self.delimiter.len_utf8();
        }

        match (current.get(*leaf), value) {
            (None, _) => {
                current.insert((*leaf).to_string(), value.clone());
                Ok(())
            }
            (Some(Node::Container(_)), Node::Container(placeholder)) if placeholder.is_empty() => {
                Ok(())
            }
            (Some(_), _) => Err(MergeError::TypeConflict {
                path: path.to_string(),
            }),
        }
    }

    /// Path of `key` inside the container at `prefix` (`None` for the root).
    pub fn child_path(&self, prefix: Option<&str>, key: &str) -> String {
        match prefix {
            Some(prefix) => format!("{prefix}{}{key}", self.delimiter),
            None => key.to_string(),
        }
    }

    /// True if `path` is `prefix` itself or lies beneath it.
    pub fn is_within(&self, path: &str, prefix: &str) -> bool {
        path == prefix || self.is_strictly_within(path, prefix)
    }

    /// True if `prefix` names a container strictly above `path`.
    pub fn is_strictly_within(&self, path: &str, prefix: &str) -> bool {
        path.len() > prefix.len()
            && path.starts_with(prefix)
            && path[prefix.len()..].starts_with(self.delimiter)
    }

    /// All container paths strictly above `path`, shortest first.
    pub fn ancestors<'a>(&self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        path.match_indices(self.delimiter)
            .map(move |(idx, _)| &path[..idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree;

    #[test]
    fn test_flatten_nested() {
        let codec = PathCodec::default();
        let t = tree! { "a" => 1i64, "b" => tree! { "c" => "x", "d" => tree! { "e" => true } } };
        let flat = codec.flatten(&t).unwrap();
        let paths: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["a", "b.c", "b.d.e"]);
        assert_eq!(flat["b.c"], Node::from("x"));
    }

    #[test]
    fn test_flatten_drops_empty_containers() {
        let codec = PathCodec::default();
        let t = tree! { "a" => tree!(), "b" => 2i64 };
        let flat = codec.flatten(&t).unwrap();
        assert_eq!(flat.len(), 1);
        assert!(flat.contains_key("b"));
    }

    #[test]
    fn test_flatten_rejects_delimiter_in_key() {
        let codec = PathCodec::default();
        let t = tree! { "a" => tree! { "b.c" => 1i64 } };
        let err = codec.flatten(&t).unwrap_err();
        assert_eq!(
            err,
            MergeError::DelimiterCollision {
                key: "b.c".into(),
                delimiter: '.'
            }
        );
    }

    #[test]
    fn test_custom_delimiter_allows_dots() {
        let codec = PathCodec::new('\u{1f}');
        let t = tree! { "a.b" => tree! { "c" => 1i64 } };
        let flat = codec.flatten(&t).unwrap();
        assert!(flat.contains_key("a.b\u{1f}c"));
        assert_eq!(codec.expand(&flat).unwrap(), t);
    }

    #[test]
    fn test_expand_inverts_flatten() {
        let codec = PathCodec::default();
        let t = tree! {
            "a" => tree! { "b" => 1i64, "c" => tree! { "d" => "x" } },
            "e" => false,
        };
        let flat = codec.flatten(&t).unwrap();
        assert_eq!(codec.expand(&flat).unwrap(), t);
    }

    #[test]
    fn test_expand_merges_placeholder_into_container() {
        let codec = PathCodec::default();
        let mut flat = FlatTree::new();
        flat.insert("a".into(), Node::empty_container());
        flat.insert("a.b".into(), Node::from(1i64));
        assert_eq!(codec.expand(&flat).unwrap(), tree! { "a" => tree! { "b" => 1i64 } });
    }

    #[test]
    fn test_expand_type_conflict() {
        let codec = PathCodec::default();
        let mut flat = FlatTree::new();
        flat.insert("a".into(), Node::from(1i64));
        flat.insert("a.b".into(), Node::from(2i64));
        let err = codec.expand(&flat).unwrap_err();
        assert_eq!(err, MergeError::TypeConflict { path: "a".into() });

        let mut flat = FlatTree::new();
        flat.insert("a.b.c".into(), Node::from(1i64));
        flat.insert("a.b".into(), Node::from(2i64));
        assert!(matches!(
            codec.expand(&flat),
            Err(MergeError::TypeConflict { .. })
        ));
    }

    #[test]
    fn test_prefix_helpers() {
        let codec = PathCodec::default();
        assert!(codec.is_within("a.b", "a"));
        assert!(codec.is_within("a", "a"));
        assert!(!codec.is_within("ab", "a"));
        assert!(!codec.is_strictly_within("a", "a"));
        assert!(codec.is_strictly_within("a.b.c", "a.b"));
        let ancestors: Vec<&str> = codec.ancestors("a.b.c").collect();
        assert_eq!(ancestors, vec!["a", "a.b"]);
        assert_eq!(codec.child_path(None, "x"), "x");
        assert_eq!(codec.child_path(Some("a.b"), "x"), "a.b.x");
    }
}
