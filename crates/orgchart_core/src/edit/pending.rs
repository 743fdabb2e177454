//! Pending manager reassignments awaiting persistence.
//!
//! # Responsibility
//! - Record the latest intended manager per employee, independent of the
//!   forest.
//! - Produce the minimal diff and save request for the relationship store.
//!
//! # Invariants
//! - At most one entry per employee; later recordings overwrite earlier ones.
//! - A baseline, once captured for an employee, is kept until the entry is
//!   cleared, forgotten or rebased onto reloaded data.
//! - Diff output is sorted by employee id.

use crate::model::employee::{EmployeeId, RelationshipChange, SaveRequest};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingEntry {
    manager_id: Option<EmployeeId>,
    /// Manager before the first recorded move. `None` when the entry was
    /// recorded without one.
    baseline: Option<Option<EmployeeId>>,
}

/// Last-intent-wins map of `employee -> new manager`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChangeTracker {
    entries: BTreeMap<EmployeeId, PendingEntry>,
}

impl PendingChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts one assignment. The baseline of an existing entry is kept.
    pub fn record_change(&mut self, employee_id: EmployeeId, manager_id: Option<EmployeeId>) {
        let baseline = self
            .entries
            .get(&employee_id)
            .and_then(|entry| entry.baseline);
        self.entries.insert(
            employee_id,
            PendingEntry {
                manager_id,
                baseline,
            },
        );
    }

    /// Upserts one assignment caused by a reparent from `from` to `to`.
    ///
    /// The first recorded `from` becomes the baseline. When `to` returns the
    /// employee to that baseline the entry is dropped.
    pub fn record_move(
        &mut self,
        employee_id: EmployeeId,
        from: Option<EmployeeId>,
        to: Option<EmployeeId>,
    ) {
        let baseline = match self.entries.get(&employee_id) {
            Some(entry) => entry.baseline,
            None => Some(from),
        };
        if baseline == Some(to) {
            self.entries.remove(&employee_id);
            return;
        }
        self.entries.insert(
            employee_id,
            PendingEntry {
                manager_id: to,
                baseline,
            },
        );
    }

    /// Replaces the baseline of an existing entry with a freshly observed
    /// manager. Used after a reload so stale baselines do not read as
    /// conflicts.
    pub fn rebase(&mut self, employee_id: EmployeeId, observed: Option<EmployeeId>) {
        if let Some(entry) = self.entries.get_mut(&employee_id) {
            entry.baseline = Some(observed);
        }
    }

    /// Drops the entry of one employee, if any.
    pub fn forget(&mut self, employee_id: EmployeeId) -> bool {
        self.entries.remove(&employee_id).is_some()
    }

    pub fn has_changes(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the pending manager of `employee_id`, if a change is recorded.
    pub fn manager_for(&self, employee_id: EmployeeId) -> Option<Option<EmployeeId>> {
        self.entries.get(&employee_id).map(|entry| entry.manager_id)
    }

    /// Absolute assignments to persist.
    pub fn diff(&self) -> Vec<RelationshipChange> {
        self.entries
            .iter()
            .map(|(employee_id, entry)| RelationshipChange::new(*employee_id, entry.manager_id))
            .collect()
    }

    /// Baseline managers of entries whose baseline is known.
    pub fn expectations(&self) -> Vec<RelationshipChange> {
        self.entries
            .iter()
            .filter_map(|(employee_id, entry)| {
                entry
                    .baseline
                    .map(|manager_id| RelationshipChange::new(*employee_id, manager_id))
            })
            .collect()
    }

    pub fn to_save_request(&self) -> SaveRequest {
        SaveRequest {
            changes: self.diff(),
            expected: self.expectations(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
