//! Editor policy configuration.

use crate::edit::mutator::CascadePolicy;
use serde::{Deserialize, Serialize};

/// Reaction to a store-reported conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Drop local pending changes and rebuild from fresh directory data.
    #[default]
    DiscardAndReload,
    /// Keep pending changes and return to editing, like a network failure.
    KeepPending,
}

/// Per-editor policy switches. Missing fields take their defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Keep collapse state of surviving nodes across forest rebuilds.
    pub preserve_collapsed_on_rebuild: bool,
    pub conflict_policy: ConflictPolicy,
    /// Cascade used by `HierarchyEditor::remove_node_default`.
    pub default_cascade: CascadePolicy,
}
