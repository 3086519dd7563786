//! Resource types returned by the PhraseApp v2 API.
//!
//! Only the fields phrasesync reads are modelled; everything else in the
//! responses is ignored during deserialization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A locale inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default: bool,
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub main_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// Result of a file upload. `state` is `success` or `error` once processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Response body of a bulk key deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeysDeleted {
    #[serde(default)]
    pub records_affected: u64,
}
