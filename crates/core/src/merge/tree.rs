//! Recursive value model for locale trees.
//!
//! A tree is a sorted mapping of keys to [`Node`]s. Sorting is a property of
//! the map type itself, so iteration, equality and serialization never depend
//! on insertion order.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A container: keys mapped to child nodes, always iterated in key order.
pub type Tree = BTreeMap<String, Node>;

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl Scalar {
    /// Blank leaves are treated as implicit deletions and compacted away.
    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::String(s) if s.is_empty())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

/// A tree node: either a leaf or a container of further nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Container(Tree),
}

impl Node {
    pub fn empty_container() -> Self {
        Node::Container(Tree::new())
    }

    /// True if this node disappears entirely under compaction.
    pub fn is_vacant(&self) -> bool {
        match self {
            Node::Scalar(scalar) => scalar.is_blank(),
            Node::Container(tree) => tree.values().all(Node::is_vacant),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Container(tree) if tree.is_empty() => write!(f, "{{}}"),
            Self::Container(tree) => write!(f, "{{{} keys}}", tree.len()),
        }
    }
}

impl From<Scalar> for Node {
    fn from(scalar: Scalar) -> Self {
        Node::Scalar(scalar)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(s.into())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(s.into())
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Scalar(b.into())
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Scalar(n.into())
    }
}

impl From<Tree> for Node {
    fn from(tree: Tree) -> Self {
        Node::Container(tree)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(scalar) => scalar.serialize(serializer),
            Self::Container(tree) => {
                let mut map = serializer.serialize_map(Some(tree.len()))?;
                for (key, child) in tree {
                    map.serialize_entry(key, child)?;
                }
                map.end()
            }
        }
    }
}

/// Build a [`Tree`] literal, mainly for tests.
///
/// ```
/// use phrasesync_core::tree;
/// let t = tree! { "a" => 1i64, "b" => tree! { "c" => "x" } };
/// assert_eq!(t.len(), 2);
/// ```
#[macro_export]
macro_rules! tree {
    () => { $crate::merge::Tree::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut tree = $crate::merge::Tree::new();
        $( tree.insert(::std::string::String::from($key), $crate::merge::Node::from($value)); )+
        tree
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_insertion_order() {
        let mut left = Tree::new();
        left.insert("b".into(), Node::from(2i64));
        left.insert("a".into(), Node::from(1i64));

        let mut right = Tree::new();
        right.insert("a".into(), Node::from(1i64));
        right.insert("b".into(), Node::from(2i64));

        assert_eq!(left, right);
        assert_eq!(left.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_vacancy() {
        assert!(Node::from("").is_vacant());
        assert!(!Node::from(" ").is_vacant());
        assert!(!Node::Scalar(Scalar::Null).is_vacant());
        assert!(Node::empty_container().is_vacant());
        assert!(Node::Container(tree! { "a" => "", "b" => tree!() }).is_vacant());
        assert!(!Node::Container(tree! { "a" => "", "b" => false }).is_vacant());
    }

    #[test]
    fn test_serialize_is_key_sorted() {
        let t = tree! { "z" => 1i64, "a" => tree! { "y" => true, "b" => Scalar::Null } };
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"a":{"b":null,"y":true},"z":1}"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(Node::from("hi").to_string(), "\"hi\"");
        assert_eq!(Node::from(3i64).to_string(), "3");
        assert_eq!(Node::empty_container().to_string(), "{}");
        assert_eq!(Node::Container(tree! { "a" => 1i64 }).to_string(), "{1 keys}");
    }
}
