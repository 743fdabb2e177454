//! Arena-style forest of hierarchy nodes.
//!
//! # Responsibility
//! - Own every node record of one hierarchy snapshot.
//! - Maintain the derived `manager_id -> children` index and root list.
//!
//! # Invariants
//! - A node id appears in at most one place: one children list or the roots.
//! - Children lists keep insertion order; moved nodes are appended.
//! - Only crate-internal code (builder, mutator) may change the structure.

use crate::model::employee::{EmployeeId, EmployeeRecord, NodeAttributes, RelationshipChange};
use std::collections::{HashMap, HashSet};

/// One employee position in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: EmployeeId,
    /// Direct manager. A node whose manager is absent from the forest is
    /// still indexed as a root.
    pub manager_id: Option<EmployeeId>,
    pub attributes: NodeAttributes,
}

impl Node {
    pub fn new(
        id: EmployeeId,
        manager_id: Option<EmployeeId>,
        attributes: NodeAttributes,
    ) -> Self {
        Self {
            id,
            manager_id,
            attributes,
        }
    }
}

impl From<&EmployeeRecord> for Node {
    fn from(record: &EmployeeRecord) -> Self {
        Self::new(record.id, record.manager_id, record.attributes())
    }
}

/// Flat node map plus derived child index.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: HashMap<EmployeeId, Node>,
    children: HashMap<EmployeeId, Vec<EmployeeId>>,
    roots: Vec<EmployeeId>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: EmployeeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: EmployeeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Returns root ids in build/insertion order.
    pub fn roots(&self) -> &[EmployeeId] {
        &self.roots
    }

    pub fn is_root(&self, id: EmployeeId) -> bool {
        self.roots.contains(&id)
    }

    /// Returns direct report ids of `id`; empty when `id` has none or is unknown.
    pub fn children_of(&self, id: EmployeeId) -> &[EmployeeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the manager chain of `id`, nearest first.
    ///
    /// Stops at a root, at an unknown manager, or when the chain revisits a
    /// node (malformed input).
    pub fn ancestors(&self, id: EmployeeId) -> Vec<EmployeeId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut cursor = self.get(id).and_then(|node| node.manager_id);
        while let Some(current) = cursor {
            if !self.contains(current) || !seen.insert(current) {
                break;
            }
            chain.push(current);
            cursor = self.get(current).and_then(|node| node.manager_id);
        }
        chain
    }

    /// Returns every transitive report of `id` in pre-order, excluding `id`.
    pub fn descendants(&self, id: EmployeeId) -> Vec<EmployeeId> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<EmployeeId> = self.children_of(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            result.push(current);
            stack.extend(self.children_of(current).iter().rev().copied());
        }
        result
    }

    /// Unordered iteration over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Depth-first pre-order walk starting from the roots.
    ///
    /// Nodes unreachable from any root (cyclic input) are not yielded.
    pub fn walk(&self) -> DepthFirst<'_> {
        DepthFirst::new(self)
    }

    /// Current relationships of all nodes, sorted by employee id.
    pub fn relationships(&self) -> Vec<RelationshipChange> {
        let mut pairs: Vec<_> = self
            .nodes
            .values()
            .map(|node| RelationshipChange::new(node.id, node.manager_id))
            .collect();
        pairs.sort_by_key(|pair| pair.employee_id);
        pairs
    }

    /// Inserts a node under its `manager_id`, or at root level when the
    /// manager is absent. Replaces nothing: callers check `contains` first.
    pub(crate) fn attach(&mut self, node: Node) {
        let id = node.id;
        match node.manager_id {
            Some(manager_id) if self.nodes.contains_key(&manager_id) => {
                self.children.entry(manager_id).or_default().push(id);
            }
            _ => self.roots.push(id),
        }
        self.nodes.insert(id, node);
    }

    /// Index-only insertion used by the builder once all nodes are known.
    pub(crate) fn insert_unindexed(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn index_child(&mut self, manager_id: EmployeeId, id: EmployeeId) {
        self.children.entry(manager_id).or_default().push(id);
    }

    pub(crate) fn index_root(&mut self, id: EmployeeId) {
        self.roots.push(id);
    }

    /// Rewrites the manager of `id` and patches the child index.
    ///
    /// Returns the previous manager, or `None` when `id` is unknown.
    pub(crate) fn set_manager(
        &mut self,
        id: EmployeeId,
        manager_id: Option<EmployeeId>,
    ) -> Option<Option<EmployeeId>> {
        let previous = self.nodes.get(&id)?.manager_id;
        self.unindex(id, previous);
        match manager_id {
            Some(manager) if self.nodes.contains_key(&manager) => {
                self.children.entry(manager).or_default().push(id)
            }
            _ => self.roots.push(id),
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.manager_id = manager_id;
        }
        Some(previous)
    }

    /// Removes one node record. Its children keep their index slot, so
    /// callers relocate or remove them first.
    pub(crate) fn remove(&mut self, id: EmployeeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.unindex(id, node.manager_id);
        if let Some(orphans) = self.children.remove(&id) {
            // Keep orphans reachable rather than silently dropping them.
            self.roots.extend(orphans);
        }
        Some(node)
    }

    fn unindex(&mut self, id: EmployeeId, manager_id: Option<EmployeeId>) {
        if let Some(manager) = manager_id {
            if let Some(siblings) = self.children.get_mut(&manager) {
                if let Some(position) = siblings.iter().position(|child| *child == id) {
                    siblings.remove(position);
                    if siblings.is_empty() {
                        self.children.remove(&manager);
                    }
                    return;
                }
            }
        }
        self.roots.retain(|root| *root != id);
    }
}

/// Pre-order iterator yielding `(depth, node)` pairs, roots at depth 0.
pub struct DepthFirst<'a> {
    forest: &'a Forest,
    stack: Vec<(EmployeeId, usize)>,
    seen: HashSet<EmployeeId>,
}

impl<'a> DepthFirst<'a> {
    fn new(forest: &'a Forest) -> Self {
        let stack = forest.roots.iter().rev().map(|id| (*id, 0)).collect();
        Self {
            forest,
            stack,
            seen: HashSet::new(),
        }
    }
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            if !self.seen.insert(id) {
                continue;
            }
            let Some(node) = self.forest.get(id) else {
                continue;
            };
            // Reverse push keeps children in index order.
            for child in self.forest.children_of(id).iter().rev() {
                self.stack.push((*child, depth + 1));
            }
            return Some((depth, node));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{Forest, Node};
    use crate::model::employee::NodeAttributes;
    use uuid::Uuid;

    fn node(id: Uuid, manager_id: Option<Uuid>) -> Node {
        Node::new(id, manager_id, NodeAttributes::default())
    }

    #[test]
    fn attach_indexes_children_and_roots() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut forest = Forest::new();
        forest.attach(node(a, None));
        forest.attach(node(b, Some(a)));
        forest.attach(node(c, Some(a)));

        assert_eq!(forest.roots(), &[a]);
        assert_eq!(forest.children_of(a), &[b, c]);
        assert!(forest.children_of(b).is_empty());
        assert_eq!(forest.descendants(a), vec![b, c]);
    }

    #[test]
    fn set_manager_moves_index_entry() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut forest = Forest::new();
        forest.attach(node(a, None));
        forest.attach(node(b, Some(a)));
        forest.attach(node(c, Some(a)));

        let previous = forest.set_manager(c, Some(b));
        assert_eq!(previous, Some(Some(a)));
        assert_eq!(forest.children_of(a), &[b]);
        assert_eq!(forest.children_of(b), &[c]);
        assert_eq!(forest.ancestors(c), vec![b, a]);

        forest.set_manager(b, None);
        assert_eq!(forest.roots(), &[a, b]);
        assert!(forest.children_of(a).is_empty());
    }

    #[test]
    fn walk_reports_depths_in_preorder() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut forest = Forest::new();
        forest.attach(node(a, None));
        forest.attach(node(b, Some(a)));
        forest.attach(node(c, Some(b)));
        forest.attach(node(d, None));

        let walked: Vec<_> = forest.walk().map(|(depth, node)| (depth, node.id)).collect();
        assert_eq!(walked, vec![(0, a), (1, b), (2, c), (0, d)]);
    }

    #[test]
    fn set_manager_on_unknown_node_returns_none() {
        let mut forest = Forest::new();
        assert_eq!(forest.set_manager(Uuid::new_v4(), None), None);
    }
}
