//! A single locale's translations, normalized and rendered.

use std::fmt;

use crate::errors::LocaleFileError;
use crate::merge::{compact, Tree};

use super::format::FileFormat;

/// One locale file: its name, parsed tree and rendered content.
///
/// Construction normalizes the tree (blank leaves and empty containers
/// removed, keys sorted) and renders it, so `content` is always the
/// canonical text for `tree`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleFile {
    locale_name: String,
    format: FileFormat,
    tree: Tree,
    content: String,
}

impl LocaleFile {
    /// Build a locale file from an in-memory tree.
    pub fn from_tree(
        locale_name: impl Into<String>,
        format: FileFormat,
        tree: &Tree,
    ) -> Result<Self, LocaleFileError> {
        let locale_name = locale_name.into();
        let tree = compact(tree);
        let content = format
            .render(&tree)
            .map_err(|detail| LocaleFileError::Serialize {
                locale: locale_name.clone(),
                detail,
            })?;
        Ok(Self {
            locale_name,
            format,
            tree,
            content,
        })
    }

    /// Parse a locale file from its textual content.
    pub fn from_content(
        locale_name: impl Into<String>,
        format: FileFormat,
        content: &str,
    ) -> Result<Self, LocaleFileError> {
        let tree = format.parse(content)?;
        Self::from_tree(locale_name, format, &tree)
    }

    pub fn locale_name(&self) -> &str {
        &self.locale_name
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// `<locale>.<extension>`
    pub fn filename(&self) -> String {
        format!("{}.{}", self.locale_name, self.format.extension())
    }
}

impl fmt::Display for LocaleFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.locale_name)
    }
}
