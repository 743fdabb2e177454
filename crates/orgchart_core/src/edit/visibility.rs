//! Per-editor collapse state.
//!
//! # Responsibility
//! - Track which nodes are collapsed in one editor instance.
//! - Flatten a forest into visible rows for a view layer.
//!
//! # Invariants
//! - Collapse state is never persisted and never changes forest data.
//! - Toggling a node leaves the state of its descendants untouched.

use crate::hierarchy::forest::Forest;
use crate::model::employee::EmployeeId;
use std::collections::HashSet;

/// One row of the flattened, collapse-aware hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: EmployeeId,
    pub depth: usize,
    pub has_children: bool,
    pub collapsed: bool,
}

/// Set of collapsed node ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityState {
    collapsed: HashSet<EmployeeId>,
}

impl VisibilityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips collapse membership of `id` and returns the new state.
    pub fn toggle_collapse(&mut self, id: EmployeeId) -> bool {
        if self.collapsed.remove(&id) {
            false
        } else {
            self.collapsed.insert(id);
            true
        }
    }

    pub fn is_collapsed(&self, id: EmployeeId) -> bool {
        self.collapsed.contains(&id)
    }

    pub fn collapse(&mut self, id: EmployeeId) {
        self.collapsed.insert(id);
    }

    pub fn expand(&mut self, id: EmployeeId) {
        self.collapsed.remove(&id);
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
    }

    pub fn collapsed_count(&self) -> usize {
        self.collapsed.len()
    }

    /// Drops ids that no longer exist in `forest`.
    pub fn retain_existing(&mut self, forest: &Forest) {
        self.collapsed.retain(|id| forest.contains(*id));
    }

    /// Pre-order rows of every node not hidden under a collapsed ancestor.
    pub fn visible_rows(&self, forest: &Forest) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<(EmployeeId, usize)> =
            forest.roots().iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let children = forest.children_of(id);
            let collapsed = self.is_collapsed(id);
            rows.push(VisibleRow {
                id,
                depth,
                has_children: !children.is_empty(),
                collapsed,
            });
            if !collapsed {
                stack.extend(children.iter().rev().map(|child| (*child, depth + 1)));
            }
        }
        rows
    }
}
