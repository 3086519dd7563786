//! Three-way merge of locale trees.
//!
//! Uses the flatten / diff / resolve / materialize / patch pipeline to merge
//! a common ancestor with a primary and a secondary descendant. Primary wins
//! every conflict; secondary's independent changes are kept.

use serde::Serialize;
use tracing::{debug, info};

use super::diff::{diff, Operation};
use super::flatten::PathCodec;
use super::materialize::materialize_missing_prefixes;
use super::patch::{compact, patch};
use super::resolver::{deleted_prefixes, ConflictResolver, DeletedPrefixes};
use super::tree::Tree;
use crate::errors::MergeError;

/// Counters describing what a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub primary_operations: usize,
    pub secondary_operations: usize,
    pub secondary_dropped: usize,
    pub conflicts: usize,
    pub atomic_drops: usize,
    pub materialized_containers: usize,
}

/// Stateless merge engine configured with a path delimiter.
///
/// Cheap to copy and safe to share across threads; every call builds its
/// own intermediate state.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine {
    codec: PathCodec,
}

impl MergeEngine {
    pub fn new(delimiter: char) -> Self {
        Self {
            codec: PathCodec::new(delimiter),
        }
    }

    pub fn codec(&self) -> &PathCodec {
        &self.codec
    }

    /// Merge `primary` and `secondary` against their common `ancestor`.
    pub fn merge(&self, ancestor: &Tree, primary: &Tree, secondary: &Tree) -> Result<Tree, MergeError> {
        self.merge_with_report(ancestor, primary, secondary)
            .map(|(tree, _)| tree)
    }

    /// Like [`merge`](Self::merge), also returning a [`MergeReport`].
    pub fn merge_with_report(
        &self,
        ancestor: &Tree,
        primary: &Tree,
        secondary: &Tree,
    ) -> Result<(Tree, MergeReport), MergeError> {
        let ancestor_flat = self.codec.flatten(ancestor)?;
        let primary_flat = self.codec.flatten(primary)?;
        let secondary_flat = self.codec.flatten(secondary)?;

        let primary_ops = diff(&ancestor_flat, &primary_flat);
        let secondary_ops = diff(&ancestor_flat, &secondary_flat);
        debug!(
            primary = primary_ops.len(),
            secondary = secondary_ops.len(),
            "computed diffs against ancestor"
        );

        let deleted = DeletedPrefixes {
            primary: deleted_prefixes(&self.codec, ancestor, primary),
            secondary: deleted_prefixes(&self.codec, ancestor, secondary),
        };

        let resolution =
            ConflictResolver::new(self.codec).resolve(&primary_ops, &secondary_ops, &deleted);

        let materialized =
            materialize_missing_prefixes(&self.codec, &ancestor_flat, &resolution.operations);

        let steps: Vec<Operation> = materialized
            .iter()
            .chain(resolution.operations.iter())
            .cloned()
            .collect();
        let result_flat = patch(&ancestor_flat, &steps);
        let result = compact(&self.codec.expand(&result_flat)?);

        let report = MergeReport {
            primary_operations: primary_ops.len(),
            secondary_operations: secondary_ops.len(),
            secondary_dropped: resolution.dropped,
            conflicts: resolution.conflicts.len(),
            atomic_drops: resolution.atomic_drops.len(),
            materialized_containers: materialized.len(),
        };
        info!(
            conflicts = report.conflicts,
            dropped = report.secondary_dropped,
            applied = resolution.operations.len(),
            "three-way merge complete"
        );
        Ok((result, report))
    }
}

/// Merge with the default `.` delimiter.
pub fn merge(ancestor: &Tree, primary: &Tree, secondary: &Tree) -> Result<Tree, MergeError> {
    MergeEngine::default().merge(ancestor, primary, secondary)
}
