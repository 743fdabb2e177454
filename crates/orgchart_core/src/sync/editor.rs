//! Hierarchy editor session and persistence state machine.
//!
//! # Responsibility
//! - Own the forest, pending changes and collapse state of one editor view.
//! - Gate edit commands by session state (Viewing / Editing / Saving).
//! - Submit the pending diff and reconcile with the canonical directory data.
//!
//! # Invariants
//! - Mutations are accepted only in `Editing`.
//! - While `Saving`, neither mutations nor another save are accepted.
//! - The pending tracker is cleared only by a successful save, a conflict
//!   under `ConflictPolicy::DiscardAndReload`, or an explicit discard.
//! - After a successful save the forest is rebuilt from a fresh directory
//!   fetch, never patched from the submitted diff.

use crate::edit::mutator::{
    CascadePolicy, EditError, ErrorKind, MoveRequest, NewNodeAssignment, TreeMutator,
};
use crate::edit::pending::PendingChangeTracker;
use crate::edit::visibility::{VisibilityState, VisibleRow};
use crate::hierarchy::builder::{BuildWarning, HierarchyBuilder};
use crate::hierarchy::cycle_guard::CycleGuard;
use crate::hierarchy::forest::{Forest, Node};
use crate::model::employee::{
    EmployeeId, EmployeeRecord, NodeAttributes, RelationshipChange, SaveRequest,
};
use crate::sync::collaborator::{
    DirectoryError, EmployeeDirectory, RelationshipStore, SaveReceipt, StoreError,
};
use crate::sync::config::{ConflictPolicy, EditorConfig};
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Session state of one editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    /// Read-only browsing.
    Viewing,
    /// Edit commands allowed; pending changes accumulate.
    Editing,
    /// Diff submitted; waiting for the store answer.
    Saving,
}

impl EditorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewing => "viewing",
            Self::Editing => "editing",
            Self::Saving => "saving",
        }
    }
}

/// Errors from session transitions and persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Operation is not valid in the current state.
    InvalidState {
        operation: &'static str,
        state: EditorState,
    },
    /// `save` requested without pending changes.
    NoPendingChanges,
    /// `exit_edit` without discard while changes are pending.
    UnsavedChanges(usize),
    /// Directory fetch failed.
    Directory(DirectoryError),
    /// Save did not reach the store; pending changes kept.
    Network(String),
    /// Store reported concurrent changes for these employees.
    Conflict(Vec<EmployeeId>),
    /// Store validation refused the diff; pending changes kept.
    Rejected(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState { .. } | Self::NoPendingChanges | Self::UnsavedChanges(_) => {
                ErrorKind::InvalidState
            }
            Self::Directory(_) | Self::Network(_) => ErrorKind::Network,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Rejected(_) => ErrorKind::Validation,
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidState { operation, state } => write!(
                f,
                "`{operation}` is not allowed while {}",
                state.as_str()
            ),
            Self::NoPendingChanges => write!(f, "no pending hierarchy changes to save"),
            Self::UnsavedChanges(count) => write!(
                f,
                "{count} pending change(s) would be lost; save or discard first"
            ),
            Self::Directory(err) => write!(f, "{err}"),
            Self::Network(message) => write!(f, "save failed, changes kept: {message}"),
            Self::Conflict(ids) => write!(
                f,
                "your edits were based on stale data ({} employee(s) changed elsewhere)",
                ids.len()
            ),
            Self::Rejected(message) => write!(f, "save rejected, changes kept: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Directory(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DirectoryError> for SyncError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

/// Outcome of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    /// Number of assignments submitted.
    pub submitted: usize,
    pub receipt: SaveReceipt,
    /// Whether the forest was rebuilt from fresh directory data.
    pub refreshed: bool,
}

/// Outcome of a manual refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub warnings: Vec<BuildWarning>,
    /// Pending changes re-applied onto the fresh forest.
    pub replayed: usize,
    /// Pending changes that no longer apply and were discarded.
    pub dropped: Vec<RelationshipChange>,
}

/// One interactive hierarchy editor instance.
#[derive(Debug, Clone)]
pub struct HierarchyEditor {
    config: EditorConfig,
    state: EditorState,
    canonical: Forest,
    forest: Forest,
    pending: PendingChangeTracker,
    visibility: VisibilityState,
    warnings: Vec<BuildWarning>,
    in_flight: Option<SaveRequest>,
    stale: bool,
}

impl HierarchyEditor {
    /// Creates an empty editor in `Viewing`.
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            state: EditorState::Viewing,
            canonical: Forest::new(),
            forest: Forest::new(),
            pending: PendingChangeTracker::new(),
            visibility: VisibilityState::new(),
            warnings: Vec::new(),
            in_flight: None,
            stale: false,
        }
    }

    /// Creates an editor from already fetched records.
    pub fn from_records(records: &[EmployeeRecord], config: EditorConfig) -> Self {
        let mut editor = Self::new(config);
        editor.rebuild(records);
        editor
    }

    /// Loads the directory and returns an editor in `Viewing`.
    pub fn open<D: EmployeeDirectory + ?Sized>(
        directory: &D,
        config: EditorConfig,
    ) -> Result<Self, SyncError> {
        let records = directory.fetch_employees().map_err(|err| {
            error!("event=editor_open module=sync status=error error={err}");
            err
        })?;
        let editor = Self::from_records(&records, config);
        info!(
            "event=editor_open module=sync status=ok nodes={} warnings={}",
            editor.forest.len(),
            editor.warnings.len()
        );
        Ok(editor)
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Local forest including unsaved edits.
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Forest as last loaded from the directory.
    pub fn canonical_forest(&self) -> &Forest {
        &self.canonical
    }

    pub fn pending(&self) -> &PendingChangeTracker {
        &self.pending
    }

    pub fn visibility(&self) -> &VisibilityState {
        &self.visibility
    }

    /// Warnings raised by the last rebuild.
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// Request currently awaiting the store answer.
    pub fn in_flight(&self) -> Option<&SaveRequest> {
        self.in_flight.as_ref()
    }

    /// `true` when a save succeeded but the follow-up directory fetch failed.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Nodes of malformed input that no root can reach.
    pub fn unreachable_nodes(&self) -> BTreeSet<EmployeeId> {
        CycleGuard::unreachable_nodes(&self.forest)
    }

    pub fn enter_edit(&mut self) -> Result<(), SyncError> {
        self.require_state("enter_edit", EditorState::Viewing)?;
        self.state = EditorState::Editing;
        info!("event=editor_enter_edit module=sync status=ok");
        Ok(())
    }

    /// Leaves edit mode. Refused while changes are pending unless `discard`.
    pub fn exit_edit(&mut self, discard: bool) -> Result<(), SyncError> {
        self.require_state("exit_edit", EditorState::Editing)?;
        if self.pending.has_changes() && !discard {
            return Err(SyncError::UnsavedChanges(self.pending.len()));
        }
        if discard {
            let dropped = self.pending.len();
            self.pending.clear();
            info!("event=editor_discard module=sync status=ok dropped={dropped}");
        }
        // Removals and local-only adds leave no pending trace; Viewing always
        // shows canonical data.
        self.forest = self.canonical.clone();
        self.state = EditorState::Viewing;
        Ok(())
    }

    pub fn add_node(
        &mut self,
        parent_id: EmployeeId,
        attributes: NodeAttributes,
        assignment: NewNodeAssignment,
    ) -> Result<Node, EditError> {
        self.mutator()?.add_node(parent_id, attributes, assignment)
    }

    pub fn remove_node(
        &mut self,
        node_id: EmployeeId,
        policy: CascadePolicy,
    ) -> Result<&Forest, EditError> {
        self.mutator()?.remove_node(node_id, policy)?;
        Ok(&self.forest)
    }

    /// Removes one node using the configured default cascade policy.
    pub fn remove_node_default(&mut self, node_id: EmployeeId) -> Result<&Forest, EditError> {
        let policy = self.config.default_cascade;
        self.remove_node(node_id, policy)
    }

    pub fn move_node(
        &mut self,
        node_id: EmployeeId,
        new_parent_id: Option<EmployeeId>,
    ) -> Result<&Forest, EditError> {
        self.mutator()?.move_node(node_id, new_parent_id)?;
        Ok(&self.forest)
    }

    /// Executes one drag-and-drop move command.
    pub fn apply(&mut self, request: MoveRequest) -> Result<&Forest, EditError> {
        self.mutator()?.apply(request)?;
        Ok(&self.forest)
    }

    /// Collapse toggles are view state and allowed in every session state.
    pub fn toggle_collapse(&mut self, node_id: EmployeeId) -> bool {
        self.visibility.toggle_collapse(node_id)
    }

    pub fn is_collapsed(&self, node_id: EmployeeId) -> bool {
        self.visibility.is_collapsed(node_id)
    }

    pub fn expand_all(&mut self) {
        self.visibility.expand_all();
    }

    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        self.visibility.visible_rows(&self.forest)
    }

    /// Moves to `Saving` and returns the batch to submit.
    pub fn begin_save(&mut self) -> Result<SaveRequest, SyncError> {
        self.require_state("save", EditorState::Editing)?;
        if !self.pending.has_changes() {
            return Err(SyncError::NoPendingChanges);
        }

        let request = self.pending.to_save_request();
        self.in_flight = Some(request.clone());
        self.state = EditorState::Saving;
        info!(
            "event=hierarchy_save module=sync status=start changes={} expectations={}",
            request.changes.len(),
            request.expected.len()
        );
        Ok(request)
    }

    /// Reconciles the session with the store answer for the in-flight batch.
    pub fn finish_save<D: EmployeeDirectory + ?Sized>(
        &mut self,
        result: Result<SaveReceipt, StoreError>,
        directory: &D,
    ) -> Result<SaveReport, SyncError> {
        self.require_state("finish_save", EditorState::Saving)?;
        let submitted = self
            .in_flight
            .take()
            .map_or(0, |request| request.changes.len());

        match result {
            Ok(receipt) => {
                self.pending.clear();
                self.state = EditorState::Viewing;
                info!(
                    "event=hierarchy_save module=sync status=ok submitted={} applied={} unchanged={}",
                    submitted, receipt.applied, receipt.unchanged
                );
                let refreshed = self.reload_after_commit(directory);
                Ok(SaveReport {
                    submitted,
                    receipt,
                    refreshed,
                })
            }
            Err(StoreError::Network(message)) => {
                self.state = EditorState::Editing;
                warn!("event=hierarchy_save module=sync status=error error_code=network submitted={submitted}");
                Err(SyncError::Network(message))
            }
            Err(StoreError::Rejected(message)) => {
                self.state = EditorState::Editing;
                warn!("event=hierarchy_save module=sync status=error error_code=rejected submitted={submitted}");
                Err(SyncError::Rejected(message))
            }
            Err(StoreError::Conflict { employee_ids }) => {
                warn!(
                    "event=hierarchy_save module=sync status=error error_code=conflict conflicted={} policy={:?}",
                    employee_ids.len(),
                    self.config.conflict_policy
                );
                match self.config.conflict_policy {
                    ConflictPolicy::DiscardAndReload => {
                        self.pending.clear();
                        self.state = EditorState::Viewing;
                        match directory.fetch_employees() {
                            Ok(records) => {
                                self.rebuild(&records);
                            }
                            Err(err) => {
                                warn!("event=hierarchy_reload module=sync status=error error={err}");
                                self.forest = self.canonical.clone();
                                self.stale = true;
                            }
                        }
                    }
                    ConflictPolicy::KeepPending => self.state = EditorState::Editing,
                }
                Err(SyncError::Conflict(employee_ids))
            }
        }
    }

    /// Submits the pending diff and reconciles in one synchronous call.
    pub fn save<S, D>(&mut self, store: &S, directory: &D) -> Result<SaveReport, SyncError>
    where
        S: RelationshipStore + ?Sized,
        D: EmployeeDirectory + ?Sized,
    {
        let request = self.begin_save()?;
        let result = store.save_relationships(&request);
        self.finish_save(result, directory)
    }

    /// Rebuilds from fresh directory data and replays pending changes on top.
    ///
    /// Each replayed change passes the same checks as an interactive move;
    /// changes that no longer apply are dropped from the tracker.
    pub fn refresh<D: EmployeeDirectory + ?Sized>(
        &mut self,
        directory: &D,
    ) -> Result<RefreshReport, SyncError> {
        if self.state == EditorState::Saving {
            return Err(SyncError::InvalidState {
                operation: "refresh",
                state: self.state,
            });
        }

        let records = directory.fetch_employees()?;
        let warnings = self.rebuild(&records);

        let mut dropped = Vec::new();
        let mut deferred = Vec::new();
        for change in self.pending.diff() {
            match self.canonical.get(change.employee_id).map(|node| node.manager_id) {
                None => {
                    self.pending.forget(change.employee_id);
                    dropped.push(change);
                }
                Some(current) if current == change.manager_id => {
                    // Already true upstream; nothing left to send.
                    self.pending.forget(change.employee_id);
                }
                Some(_) => deferred.push(change),
            }
        }

        // Changes may depend on each other; retry until a pass applies nothing.
        let mut replayed = 0;
        loop {
            let before = deferred.len();
            deferred.retain(|change| !self.replay_change(*change));
            replayed += before - deferred.len();
            if deferred.len() == before {
                break;
            }
        }
        for change in deferred {
            self.pending.forget(change.employee_id);
            dropped.push(change);
        }
        dropped.sort_by_key(|change| change.employee_id);

        info!(
            "event=hierarchy_refresh module=sync status=ok nodes={} replayed={} dropped={}",
            self.forest.len(),
            replayed,
            dropped.len()
        );
        Ok(RefreshReport {
            warnings,
            replayed,
            dropped,
        })
    }

    /// Applies one pending change onto the rebuilt forest when its manager
    /// exists and the move passes the cycle guard.
    fn replay_change(&mut self, change: RelationshipChange) -> bool {
        let employee_id = change.employee_id;
        if let Some(manager_id) = change.manager_id {
            if !self.forest.contains(manager_id)
                || CycleGuard::would_create_cycle(&self.forest, employee_id, manager_id)
            {
                return false;
            }
        }
        let Some(observed) = self.canonical.get(employee_id).map(|node| node.manager_id) else {
            return false;
        };
        self.forest.set_manager(employee_id, change.manager_id);
        self.pending.rebase(employee_id, observed);
        true
    }

    fn mutator(&mut self) -> Result<TreeMutator<'_>, EditError> {
        if self.state != EditorState::Editing {
            return Err(EditError::NotEditable(self.state));
        }
        Ok(TreeMutator::new(&mut self.forest, &mut self.pending))
    }

    fn require_state(
        &self,
        operation: &'static str,
        expected: EditorState,
    ) -> Result<(), SyncError> {
        if self.state != expected {
            return Err(SyncError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Returns whether the fresh fetch succeeded. On failure the current
    /// forest is kept as canonical and the editor is flagged stale.
    fn reload_after_commit<D: EmployeeDirectory + ?Sized>(&mut self, directory: &D) -> bool {
        match directory.fetch_employees() {
            Ok(records) => {
                self.rebuild(&records);
                true
            }
            Err(err) => {
                warn!("event=hierarchy_reload module=sync status=error error={err}");
                self.canonical = self.forest.clone();
                self.stale = true;
                false
            }
        }
    }

    fn rebuild(&mut self, records: &[EmployeeRecord]) -> Vec<BuildWarning> {
        let outcome = HierarchyBuilder::build(records);
        let unreachable = CycleGuard::unreachable_nodes(&outcome.forest);
        if !unreachable.is_empty() {
            warn!(
                "event=hierarchy_rebuild module=sync status=warning unreachable={}",
                unreachable.len()
            );
        }

        self.canonical = outcome.forest.clone();
        self.forest = outcome.forest;
        if self.config.preserve_collapsed_on_rebuild {
            self.visibility.retain_existing(&self.forest);
        } else {
            self.visibility = VisibilityState::new();
        }
        self.warnings = outcome.warnings.clone();
        self.stale = false;
        outcome.warnings
    }
}
