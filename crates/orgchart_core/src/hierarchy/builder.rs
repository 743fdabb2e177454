//! Flat directory records to forest conversion.
//!
//! # Responsibility
//! - Index records by id and group them by manager in one pass each.
//! - Report input degeneracies (dangling managers, duplicate ids) as
//!   non-fatal warnings.
//!
//! # Invariants
//! - Output is acyclic only when the input was acyclic; cycles are not
//!   repaired here (see `CycleGuard::unreachable_nodes`).
//! - Sibling order follows input order.

use crate::hierarchy::forest::{Forest, Node};
use crate::model::employee::{EmployeeId, EmployeeRecord};
use log::{debug, warn};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Non-fatal input problem detected while building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildWarning {
    /// Record references a manager absent from the input; indexed as root.
    DanglingManager {
        employee_id: EmployeeId,
        manager_id: EmployeeId,
    },
    /// Same id appeared more than once; the first record was kept.
    DuplicateEmployee(EmployeeId),
}

impl Display for BuildWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingManager {
                employee_id,
                manager_id,
            } => write!(
                f,
                "employee {employee_id} references unknown manager {manager_id}; treated as root"
            ),
            Self::DuplicateEmployee(id) => write!(f, "duplicate employee record ignored: {id}"),
        }
    }
}

/// Build result: the forest plus any warnings raised on the way.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    pub forest: Forest,
    pub warnings: Vec<BuildWarning>,
}

/// Stateless forest builder.
pub struct HierarchyBuilder;

impl HierarchyBuilder {
    /// Builds a forest from flat employee records.
    pub fn build(records: &[EmployeeRecord]) -> BuildOutcome {
        let mut forest = Forest::new();
        let mut warnings = Vec::new();
        let mut kept = Vec::with_capacity(records.len());
        let mut seen = HashSet::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.id) {
                warnings.push(BuildWarning::DuplicateEmployee(record.id));
                continue;
            }
            forest.insert_unindexed(Node::from(record));
            kept.push((record.id, record.manager_id));
        }

        for (id, manager_id) in kept {
            match manager_id {
                Some(manager_id) if forest.contains(manager_id) => {
                    forest.index_child(manager_id, id)
                }
                Some(manager_id) => {
                    warnings.push(BuildWarning::DanglingManager {
                        employee_id: id,
                        manager_id,
                    });
                    forest.index_root(id);
                }
                None => forest.index_root(id),
            }
        }

        for warning in &warnings {
            warn!("event=hierarchy_build module=hierarchy status=warning detail=\"{warning}\"");
        }
        debug!(
            "event=hierarchy_build module=hierarchy status=ok nodes={} roots={} warnings={}",
            forest.len(),
            forest.roots().len(),
            warnings.len()
        );

        BuildOutcome { forest, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildWarning, HierarchyBuilder};
    use crate::model::employee::EmployeeRecord;
    use uuid::Uuid;

    #[test]
    fn groups_records_by_manager() {
        let ceo = EmployeeRecord::new(None).named("Ada", "Root");
        let cto = EmployeeRecord::new(Some(ceo.id)).named("Brian", "Tech");
        let cfo = EmployeeRecord::new(Some(ceo.id)).named("Cora", "Money");
        let dev = EmployeeRecord::new(Some(cto.id)).named("Dan", "Dev");

        let outcome = HierarchyBuilder::build(&[dev.clone(), ceo.clone(), cto.clone(), cfo.clone()]);

        assert!(outcome.warnings.is_empty());
        let forest = outcome.forest;
        assert_eq!(forest.len(), 4);
        assert_eq!(forest.roots(), &[ceo.id]);
        assert_eq!(forest.children_of(ceo.id), &[cto.id, cfo.id]);
        assert_eq!(forest.children_of(cto.id), &[dev.id]);
        assert_eq!(forest.get(dev.id).unwrap().attributes.display_name, "Dan Dev");
    }

    #[test]
    fn dangling_manager_becomes_flagged_root() {
        let missing = Uuid::new_v4();
        let orphan = EmployeeRecord::new(Some(missing));

        let outcome = HierarchyBuilder::build(&[orphan.clone()]);

        assert_eq!(outcome.forest.roots(), &[orphan.id]);
        assert_eq!(
            outcome.warnings,
            vec![BuildWarning::DanglingManager {
                employee_id: orphan.id,
                manager_id: missing,
            }]
        );
        // Stored manager is left as delivered; only the index treats it as root.
        assert_eq!(outcome.forest.get(orphan.id).unwrap().manager_id, Some(missing));
    }

    #[test]
    fn duplicate_ids_keep_first_record() {
        let first = EmployeeRecord::new(None).named("First", "Copy");
        let mut second = first.clone();
        second.first_name = "Second".to_string();

        let outcome = HierarchyBuilder::build(&[first.clone(), second]);

        assert_eq!(outcome.forest.len(), 1);
        assert_eq!(outcome.forest.roots(), &[first.id]);
        assert_eq!(
            outcome.forest.get(first.id).unwrap().attributes.display_name,
            "First Copy"
        );
        assert_eq!(outcome.warnings, vec![BuildWarning::DuplicateEmployee(first.id)]);
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        let outcome = HierarchyBuilder::build(&[]);
        assert!(outcome.forest.is_empty());
        assert!(outcome.warnings.is_empty());
    }
}
