//! Cycle-safe hierarchy mutations.
//!
//! # Responsibility
//! - Apply add/remove/move commands to an in-memory forest.
//! - Record the manager reassignments each command implies.
//!
//! # Invariants
//! - Every reparent is checked by `CycleGuard` before any write.
//! - A failed command leaves both forest and tracker untouched.
//! - `move_node` is the only reparent entry point for view commands.

use crate::edit::pending::PendingChangeTracker;
use crate::hierarchy::cycle_guard::CycleGuard;
use crate::hierarchy::forest::{Forest, Node};
use crate::model::employee::{EmployeeId, NodeAttributes};
use crate::sync::editor::EditorState;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// What happens to the reports of a removed node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Direct reports move up to the removed node's former manager.
    #[default]
    PromoteChildren,
    /// The whole subtree is removed with the node.
    RemoveSubtree,
}

/// Whether a newly added node is queued as a new-hire assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NewNodeAssignment {
    /// Node exists only in the local forest.
    #[default]
    LocalOnly,
    /// Node's manager is also recorded as a pending change.
    RecordPending,
}

/// Discrete reparent command produced by drag-and-drop gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub node_id: EmployeeId,
    /// Target manager. `None` moves the node to root level.
    pub new_parent_id: Option<EmployeeId>,
}

impl MoveRequest {
    pub fn new(node_id: EmployeeId, new_parent_id: Option<EmployeeId>) -> Self {
        Self {
            node_id,
            new_parent_id,
        }
    }
}

/// Coarse error category shared by edit and sync errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation itself is invalid; retrying cannot help.
    Validation,
    /// Referenced node is missing; refresh and retry.
    NotFound,
    /// Store could not be reached; resubmitting is safe.
    Network,
    /// Store data changed underneath the local edits.
    Conflict,
    /// Operation is not allowed in the current editor state.
    InvalidState,
}

/// Errors from hierarchy edit commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// Target node does not exist.
    NodeNotFound(EmployeeId),
    /// Requested manager does not exist.
    ParentNotFound(EmployeeId),
    /// Node would become its own manager.
    SelfManagement(EmployeeId),
    /// Requested manager lies inside the moving node's subtree.
    CycleDetected {
        node_id: EmployeeId,
        parent_id: EmployeeId,
    },
    /// Editor does not accept mutations in its current state.
    NotEditable(EditorState),
}

impl EditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound(_) | Self::ParentNotFound(_) => ErrorKind::NotFound,
            Self::SelfManagement(_) | Self::CycleDetected { .. } => ErrorKind::Validation,
            Self::NotEditable(_) => ErrorKind::InvalidState,
        }
    }
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "hierarchy node not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "manager node not found: {id}"),
            Self::SelfManagement(id) => write!(f, "node cannot manage itself: {id}"),
            Self::CycleDetected { node_id, parent_id } => write!(
                f,
                "move would create cycle: node {node_id} under manager {parent_id}"
            ),
            Self::NotEditable(state) => {
                write!(f, "hierarchy is not editable in state `{}`", state.as_str())
            }
        }
    }
}

impl Error for EditError {}

/// Command facade over one forest and its pending-change tracker.
pub struct TreeMutator<'a> {
    forest: &'a mut Forest,
    pending: &'a mut PendingChangeTracker,
}

impl<'a> TreeMutator<'a> {
    pub fn new(forest: &'a mut Forest, pending: &'a mut PendingChangeTracker) -> Self {
        Self { forest, pending }
    }

    /// Adds one node reporting to `parent_id` and returns it.
    pub fn add_node(
        &mut self,
        parent_id: EmployeeId,
        attributes: NodeAttributes,
        assignment: NewNodeAssignment,
    ) -> Result<Node, EditError> {
        if !self.forest.contains(parent_id) {
            return Err(EditError::ParentNotFound(parent_id));
        }

        let node = Node::new(Uuid::new_v4(), Some(parent_id), attributes);
        self.forest.attach(node.clone());
        if assignment == NewNodeAssignment::RecordPending {
            self.pending.record_change(node.id, Some(parent_id));
        }

        info!(
            "event=node_add module=edit status=ok node_id={} parent_id={} pending={}",
            node.id,
            parent_id,
            assignment == NewNodeAssignment::RecordPending
        );
        Ok(node)
    }

    /// Removes one node, handling its reports per `policy`.
    pub fn remove_node(
        &mut self,
        node_id: EmployeeId,
        policy: CascadePolicy,
    ) -> Result<&Forest, EditError> {
        // A dangling manager is not a valid target; reports become roots,
        // as the builder indexes them.
        let former_manager = self
            .forest
            .get(node_id)
            .ok_or(EditError::NodeNotFound(node_id))?
            .manager_id
            .filter(|manager_id| self.forest.contains(*manager_id));

        let removed = match policy {
            CascadePolicy::PromoteChildren => {
                let children = self.forest.children_of(node_id).to_vec();
                for child in &children {
                    self.forest.set_manager(*child, former_manager);
                    self.pending
                        .record_move(*child, Some(node_id), former_manager);
                }
                1
            }
            CascadePolicy::RemoveSubtree => {
                let descendants = self.forest.descendants(node_id);
                // Deepest first so no removal ever leaves orphans behind.
                for id in descendants.iter().rev() {
                    self.forest.remove(*id);
                    self.pending.forget(*id);
                }
                descendants.len() + 1
            }
        };
        self.forest.remove(node_id);
        self.pending.forget(node_id);

        info!(
            "event=node_remove module=edit status=ok node_id={} policy={:?} removed={}",
            node_id, policy, removed
        );
        Ok(&*self.forest)
    }

    /// Reparents `node_id` under `new_parent_id` (`None` = root level).
    pub fn move_node(
        &mut self,
        node_id: EmployeeId,
        new_parent_id: Option<EmployeeId>,
    ) -> Result<&Forest, EditError> {
        let current_manager = self
            .forest
            .get(node_id)
            .ok_or(EditError::NodeNotFound(node_id))?
            .manager_id;

        if let Some(parent_id) = new_parent_id {
            if parent_id == node_id {
                info!(
                    "event=node_move module=edit status=rejected node_id={node_id} reason=self_management"
                );
                return Err(EditError::SelfManagement(node_id));
            }
            if !self.forest.contains(parent_id) {
                return Err(EditError::ParentNotFound(parent_id));
            }
            if CycleGuard::would_create_cycle(&*self.forest, node_id, parent_id) {
                info!(
                    "event=node_move module=edit status=rejected node_id={node_id} parent_id={parent_id} reason=cycle"
                );
                return Err(EditError::CycleDetected { node_id, parent_id });
            }
        }

        if current_manager == new_parent_id {
            return Ok(&*self.forest);
        }

        self.forest.set_manager(node_id, new_parent_id);
        self.pending
            .record_move(node_id, current_manager, new_parent_id);

        info!(
            "event=node_move module=edit status=ok node_id={} pending_total={}",
            node_id,
            self.pending.len()
        );
        Ok(&*self.forest)
    }

    /// Executes one view-layer move command.
    pub fn apply(&mut self, request: MoveRequest) -> Result<&Forest, EditError> {
        self.move_node(request.node_id, request.new_parent_id)
    }
}
