//! Reparent safety checks.
//!
//! # Responsibility
//! - Decide whether moving a node under a proposed manager would create a
//!   self-reference or a cycle.
//! - Find nodes of malformed input that no root can reach.
//!
//! # Invariants
//! - All checks are pure queries over a borrowed forest.
//! - Walks never loop: a revisited node ends the walk.

use crate::hierarchy::forest::Forest;
use crate::model::employee::EmployeeId;
use std::collections::{BTreeSet, HashSet};

/// Cycle checks over one forest snapshot.
pub struct CycleGuard;

impl CycleGuard {
    /// Returns `true` when `proposed_manager_id` is `moving_id` itself or any
    /// node in the subtree rooted at `moving_id`.
    ///
    /// A revisited node while walking the subtree means the input was
    /// already cyclic; that case is reported as `true` as well.
    ///
    /// Cost is proportional to the size of the moving subtree.
    pub fn would_create_cycle(
        forest: &Forest,
        moving_id: EmployeeId,
        proposed_manager_id: EmployeeId,
    ) -> bool {
        if moving_id == proposed_manager_id {
            return true;
        }

        let mut visited = HashSet::new();
        let mut stack = vec![moving_id];
        while let Some(current) = stack.pop() {
            if current == proposed_manager_id {
                return true;
            }
            if !visited.insert(current) {
                return true;
            }
            stack.extend(forest.children_of(current).iter().copied());
        }
        false
    }

    /// Returns ids of nodes no root can reach.
    ///
    /// With single-valued managers these are exactly the nodes sitting on a
    /// cycle or below one.
    pub fn unreachable_nodes(forest: &Forest) -> BTreeSet<EmployeeId> {
        let mut reachable = HashSet::with_capacity(forest.len());
        let mut stack: Vec<EmployeeId> = forest.roots().to_vec();
        while let Some(current) = stack.pop() {
            if !reachable.insert(current) {
                continue;
            }
            stack.extend(forest.children_of(current).iter().copied());
        }

        forest
            .nodes()
            .map(|node| node.id)
            .filter(|id| !reachable.contains(id))
            .collect()
    }

    /// Returns `true` when every node is reachable from a root.
    pub fn is_acyclic(forest: &Forest) -> bool {
        Self::unreachable_nodes(forest).is_empty()
    }
}
