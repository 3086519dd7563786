//! Locale file formats and their codecs.
//!
//! Both formats parse into the same [`Tree`] model. Arrays and other values
//! with no tree representation are rejected rather than silently dropped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LocaleFileError;
use crate::merge::{Node, Scalar, Tree};

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Json,
    #[serde(alias = "yml")]
    Yaml,
}

impl FileFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yml",
        }
    }

    /// Format identifier understood by the translation service.
    pub fn remote_format(&self) -> &'static str {
        match self {
            Self::Json => "nested_json",
            Self::Yaml => "yml",
        }
    }

    /// Parse file content into a tree.
    pub fn parse(&self, content: &str) -> Result<Tree, LocaleFileError> {
        match self {
            Self::Json => {
                let value: serde_json::Value =
                    serde_json::from_str(content).map_err(|e| LocaleFileError::Parse {
                        format: "JSON".into(),
                        detail: e.to_string(),
                    })?;
                match value {
                    serde_json::Value::Object(map) => json_object_to_tree(map, None),
                    other => Err(LocaleFileError::NonMappingRoot(json_kind(&other).into())),
                }
            }
            Self::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| LocaleFileError::Parse {
                        format: "YAML".into(),
                        detail: e.to_string(),
                    })?;
                match value {
                    serde_yaml::Value::Mapping(map) => yaml_mapping_to_tree(map, None),
                    serde_yaml::Value::Null => Ok(Tree::new()),
                    other => Err(LocaleFileError::NonMappingRoot(yaml_kind(&other).into())),
                }
            }
        }
    }

    /// Render a tree deterministically (keys sorted).
    ///
    /// JSON is indented by two spaces; YAML starts with a `---` header. Both
    /// end with a newline.
    pub fn render(&self, tree: &Tree) -> Result<String, String> {
        match self {
            Self::Json => serde_json::to_string_pretty(tree)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
            Self::Yaml if tree.is_empty() => Ok("--- {}\n".to_string()),
            Self::Yaml => serde_yaml::to_string(tree)
                .map(|body| format!("---\n{body}"))
                .map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = LocaleFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yml" | "yaml" => Ok(Self::Yaml),
            _ => Err(LocaleFileError::BadFileFormat(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON conversion
// ---------------------------------------------------------------------------

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn json_object_to_tree(
    map: serde_json::Map<String, serde_json::Value>,
    prefix: Option<&str>,
) -> Result<Tree, LocaleFileError> {
    let mut tree = Tree::new();
    for (key, value) in map {
        let path = display_path(prefix, &key);
        let node = match value {
            serde_json::Value::Null => Node::Scalar(Scalar::Null),
            serde_json::Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            serde_json::Value::Number(n) => Node::Scalar(Scalar::Number(n)),
            serde_json::Value::String(s) => Node::Scalar(Scalar::String(s)),
            serde_json::Value::Object(children) => {
                Node::Container(json_object_to_tree(children, Some(&path))?)
            }
            serde_json::Value::Array(_) => {
                return Err(LocaleFileError::UnsupportedValue {
                    path,
                    detail: "arrays are not supported".into(),
                })
            }
        };
        tree.insert(key, node);
    }
    Ok(tree)
}

// ---------------------------------------------------------------------------
// YAML conversion
// ---------------------------------------------------------------------------

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

fn yaml_mapping_to_tree(
    map: serde_yaml::Mapping,
    prefix: Option<&str>,
) -> Result<Tree, LocaleFileError> {
    let mut tree = Tree::new();
    for (key, value) in map {
        let key = yaml_key(&key).ok_or_else(|| LocaleFileError::UnsupportedValue {
            path: prefix.unwrap_or("").to_string(),
            detail: format!("{} keys are not supported", yaml_kind(&key)),
        })?;
        let path = display_path(prefix, &key);
        let node = match value {
            serde_yaml::Value::Null => Node::Scalar(Scalar::Null),
            serde_yaml::Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            serde_yaml::Value::Number(n) => Node::Scalar(Scalar::Number(yaml_number(&n, &path)?)),
            serde_yaml::Value::String(s) => Node::Scalar(Scalar::String(s)),
            serde_yaml::Value::Mapping(children) => {
                Node::Container(yaml_mapping_to_tree(children, Some(&path))?)
            }
            other => {
                return Err(LocaleFileError::UnsupportedValue {
                    path,
                    detail: format!("{} values are not supported", yaml_kind(&other)),
                })
            }
        };
        if tree.contains_key(&key) {
            return Err(LocaleFileError::UnsupportedValue {
                path,
                detail: "key collides with another key once stringified".to_string(),
            });
        }
        tree.insert(key, node);
    }
    Ok(tree)
}

/// Scalar mapping keys are stringified; anything else has no key form.
fn yaml_key(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn yaml_number(n: &serde_yaml::Number, path: &str) -> Result<serde_json::Number, LocaleFileError> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| LocaleFileError::UnsupportedValue {
            path: path.to_string(),
            detail: format!("non-finite number {n}"),
        })
}

/// Dotted path used only in error messages.
fn display_path(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_string(),
    }
}
