use orgchart_core::{
    CascadePolicy, ConflictPolicy, CycleGuard, DirectoryError, EditError, EditorConfig,
    EditorState, EmployeeDirectory, EmployeeRecord, ErrorKind, HierarchyEditor, MoveRequest,
    NewNodeAssignment, NodeAttributes, RelationshipChange, RelationshipStore, SaveReceipt,
    SaveRequest, StoreError, SyncError,
};
use std::cell::{Cell, RefCell};
use uuid::Uuid;

/// In-memory directory whose data can be changed between fetches.
#[derive(Default)]
struct MockDirectory {
    records: RefCell<Vec<EmployeeRecord>>,
    unavailable: Cell<bool>,
    fetches: Cell<usize>,
}

impl MockDirectory {
    fn with(records: Vec<EmployeeRecord>) -> Self {
        Self {
            records: RefCell::new(records),
            ..Self::default()
        }
    }

    fn reassign(&self, id: Uuid, manager_id: Option<Uuid>) {
        for record in self.records.borrow_mut().iter_mut() {
            if record.id == id {
                record.manager_id = manager_id;
            }
        }
    }

    fn remove(&self, id: Uuid) {
        self.records.borrow_mut().retain(|record| record.id != id);
    }
}

impl EmployeeDirectory for MockDirectory {
    fn fetch_employees(&self) -> Result<Vec<EmployeeRecord>, DirectoryError> {
        self.fetches.set(self.fetches.get() + 1);
        if self.unavailable.get() {
            return Err(DirectoryError::Unavailable("offline".to_string()));
        }
        Ok(self.records.borrow().clone())
    }
}

/// Store that either fails with a scripted error or writes into a directory.
struct MockStore<'d> {
    directory: &'d MockDirectory,
    failure: RefCell<Option<StoreError>>,
    requests: RefCell<Vec<SaveRequest>>,
}

impl<'d> MockStore<'d> {
    fn new(directory: &'d MockDirectory) -> Self {
        Self {
            directory,
            failure: RefCell::new(None),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn fail_next(&self, error: StoreError) {
        *self.failure.borrow_mut() = Some(error);
    }
}

impl RelationshipStore for MockStore<'_> {
    fn save_relationships(&self, request: &SaveRequest) -> Result<SaveReceipt, StoreError> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(error) = self.failure.borrow_mut().take() {
            return Err(error);
        }
        for change in &request.changes {
            self.directory.reassign(change.employee_id, change.manager_id);
        }
        Ok(SaveReceipt {
            applied: request.changes.len(),
            unchanged: 0,
        })
    }
}

struct Ids {
    a: Uuid,
    b: Uuid,
    c: Uuid,
}

/// A -> B -> C.
fn directory() -> (MockDirectory, Ids) {
    let a = EmployeeRecord::new(None);
    let b = EmployeeRecord::new(Some(a.id));
    let c = EmployeeRecord::new(Some(b.id));
    let ids = Ids {
        a: a.id,
        b: b.id,
        c: c.id,
    };
    (MockDirectory::with(vec![a, b, c]), ids)
}

fn editing(directory: &MockDirectory, config: EditorConfig) -> HierarchyEditor {
    let mut editor = HierarchyEditor::open(directory, config).unwrap();
    editor.enter_edit().unwrap();
    editor
}

#[test]
fn mutations_require_edit_mode() {
    let (directory, ids) = directory();
    let mut editor = HierarchyEditor::open(&directory, EditorConfig::default()).unwrap();

    let err = editor.move_node(ids.c, Some(ids.a)).unwrap_err();
    assert_eq!(err, EditError::NotEditable(EditorState::Viewing));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(editor.forest().get(ids.c).unwrap().manager_id, Some(ids.b));
}

#[test]
fn successful_save_clears_pending_and_reloads() {
    let (directory, ids) = directory();
    let store = MockStore::new(&directory);
    let mut editor = editing(&directory, EditorConfig::default());

    editor.apply(MoveRequest::new(ids.c, Some(ids.a))).unwrap();
    let report = editor.save(&store, &directory).unwrap();

    assert_eq!(report.submitted, 1);
    assert!(report.refreshed);
    assert_eq!(editor.state(), EditorState::Viewing);
    assert!(!editor.pending().has_changes());
    assert_eq!(directory.fetches.get(), 2);
    assert_eq!(editor.forest().get(ids.c).unwrap().manager_id, Some(ids.a));

    let sent = store.requests.borrow();
    assert_eq!(
        sent[0].changes,
        vec![RelationshipChange::new(ids.c, Some(ids.a))]
    );
    assert_eq!(
        sent[0].expected,
        vec![RelationshipChange::new(ids.c, Some(ids.b))]
    );
}

#[test]
fn saving_blocks_mutations_and_second_save() {
    let (directory, ids) = directory();
    let mut editor = editing(&directory, EditorConfig::default());
    editor.move_node(ids.c, Some(ids.a)).unwrap();

    let request = editor.begin_save().unwrap();
    assert_eq!(editor.state(), EditorState::Saving);
    assert_eq!(editor.in_flight(), Some(&request));

    assert_eq!(
        editor.move_node(ids.b, None).unwrap_err(),
        EditError::NotEditable(EditorState::Saving)
    );
    assert!(matches!(
        editor.begin_save(),
        Err(SyncError::InvalidState {
            state: EditorState::Saving,
            ..
        })
    ));
    assert!(editor.refresh(&directory).is_err());

    // View state stays available while saving.
    assert!(editor.toggle_collapse(ids.a));
}

#[test]
fn network_failure_keeps_pending_for_retry() {
    let (directory, ids) = directory();
    let store = MockStore::new(&directory);
    let mut editor = editing(&directory, EditorConfig::default());
    editor.move_node(ids.c, Some(ids.a)).unwrap();

    store.fail_next(StoreError::Network("timeout".to_string()));
    let err = editor.save(&store, &directory).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(editor.state(), EditorState::Editing);
    assert_eq!(editor.pending().len(), 1);
    assert_eq!(editor.forest().get(ids.c).unwrap().manager_id, Some(ids.a));

    editor.save(&store, &directory).unwrap();
    let sent = store.requests.borrow();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[test]
fn conflict_discards_and_reloads_by_default() {
    let (directory, ids) = directory();
    let store = MockStore::new(&directory);
    let mut editor = editing(&directory, EditorConfig::default());
    editor.move_node(ids.c, Some(ids.a)).unwrap();

    directory.reassign(ids.c, None);
    store.fail_next(StoreError::Conflict {
        employee_ids: vec![ids.c],
    });
    let err = editor.save(&store, &directory).unwrap_err();

    assert_eq!(err, SyncError::Conflict(vec![ids.c]));
    assert_eq!(editor.state(), EditorState::Viewing);
    assert!(!editor.pending().has_changes());
    assert!(editor.forest().is_root(ids.c));
}

#[test]
fn conflict_can_keep_pending() {
    let (directory, ids) = directory();
    let store = MockStore::new(&directory);
    let config = EditorConfig {
        conflict_policy: ConflictPolicy::KeepPending,
        ..EditorConfig::default()
    };
    let mut editor = editing(&directory, config);
    editor.move_node(ids.c, Some(ids.a)).unwrap();

    store.fail_next(StoreError::Conflict {
        employee_ids: vec![ids.c],
    });
    editor.save(&store, &directory).unwrap_err();

    assert_eq!(editor.state(), EditorState::Editing);
    assert_eq!(editor.pending().len(), 1);
}

#[test]
fn failed_reload_after_save_marks_editor_stale() {
    let (directory, ids) = directory();
    let store = MockStore::new(&directory);
    let mut editor = editing(&directory, EditorConfig::default());
    editor.move_node(ids.c, Some(ids.a)).unwrap();

    let request = editor.begin_save().unwrap();
    let result = store.save_relationships(&request);
    directory.unavailable.set(true);
    let report = editor.finish_save(result, &directory).unwrap();

    assert!(!report.refreshed);
    assert!(editor.is_stale());
    assert_eq!(editor.state(), EditorState::Viewing);
    assert_eq!(editor.forest().get(ids.c).unwrap().manager_id, Some(ids.a));

    directory.unavailable.set(false);
    editor.refresh(&directory).unwrap();
    assert!(!editor.is_stale());
}

#[test]
fn exit_edit_refuses_to_drop_changes_unless_discarding() {
    let (directory, ids) = directory();
    let mut editor = editing(&directory, EditorConfig::default());
    editor.move_node(ids.c, Some(ids.a)).unwrap();

    assert_eq!(editor.exit_edit(false), Err(SyncError::UnsavedChanges(1)));

    editor.exit_edit(true).unwrap();
    assert_eq!(editor.state(), EditorState::Viewing);
    assert!(!editor.pending().has_changes());
    assert_eq!(editor.forest().get(ids.c).unwrap().manager_id, Some(ids.b));
}

#[test]
fn save_without_changes_is_refused() {
    let (directory, _) = directory();
    let store = MockStore::new(&directory);
    let mut editor = editing(&directory, EditorConfig::default());

    assert_eq!(
        editor.save(&store, &directory),
        Err(SyncError::NoPendingChanges)
    );
    assert!(store.requests.borrow().is_empty());
}

#[test]
fn refresh_replays_pending_and_drops_vanished_changes() {
    let (directory, ids) = directory();
    let extra = EmployeeRecord::new(Some(ids.a));
    directory.records.borrow_mut().push(extra.clone());
    let mut editor = editing(&directory, EditorConfig::default());

    editor.move_node(ids.c, Some(ids.a)).unwrap();
    editor.move_node(extra.id, Some(ids.b)).unwrap();
    directory.remove(extra.id);

    let report = editor.refresh(&directory).unwrap();

    assert_eq!(report.replayed, 1);
    assert_eq!(
        report.dropped,
        vec![RelationshipChange::new(extra.id, Some(ids.b))]
    );
    assert_eq!(editor.pending().len(), 1);
    assert_eq!(editor.forest().get(ids.c).unwrap().manager_id, Some(ids.a));
    assert_eq!(editor.state(), EditorState::Editing);
}

#[test]
fn refresh_drops_changes_that_would_now_cycle() {
    let (directory, ids) = directory();
    let mut editor = editing(&directory, EditorConfig::default());

    // Locally B goes to root level and A moves under C.
    editor.move_node(ids.b, None).unwrap();
    editor.move_node(ids.a, Some(ids.c)).unwrap();
    directory.reassign(ids.c, Some(ids.a));
    directory.reassign(ids.b, Some(ids.c));

    let report = editor.refresh(&directory).unwrap();

    // Remote is now A -> C -> B; moving A under C would cycle.
    assert!(report
        .dropped
        .contains(&RelationshipChange::new(ids.a, Some(ids.c))));
    assert!(CycleGuard::is_acyclic(editor.forest()));
}

#[test]
fn collapse_resets_on_rebuild_unless_configured() {
    let (directory, ids) = directory();

    let mut editor = HierarchyEditor::open(&directory, EditorConfig::default()).unwrap();
    editor.toggle_collapse(ids.b);
    editor.refresh(&directory).unwrap();
    assert!(!editor.is_collapsed(ids.b));

    let config = EditorConfig {
        preserve_collapsed_on_rebuild: true,
        ..EditorConfig::default()
    };
    let mut editor = HierarchyEditor::open(&directory, config).unwrap();
    editor.toggle_collapse(ids.b);
    editor.refresh(&directory).unwrap();
    assert!(editor.is_collapsed(ids.b));
}

#[test]
fn unavailable_directory_fails_open() {
    let (directory, _) = directory();
    directory.unavailable.set(true);

    let err = HierarchyEditor::open(&directory, EditorConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(matches!(err, SyncError::Directory(_)));
}

#[test]
fn refresh_replays_changes_that_depend_on_each_other() {
    // `a` sorts before `b`, so its change is tried before the one it needs.
    let a = EmployeeRecord::with_id(Uuid::from_u128(1), None);
    let b = EmployeeRecord::with_id(Uuid::from_u128(2), Some(a.id));
    let directory = MockDirectory::with(vec![a.clone(), b.clone()]);
    let mut editor = editing(&directory, EditorConfig::default());

    editor.move_node(b.id, None).unwrap();
    editor.move_node(a.id, Some(b.id)).unwrap();
    let before = editor.pending().diff();

    let report = editor.refresh(&directory).unwrap();

    assert_eq!(report.replayed, 2);
    assert!(report.dropped.is_empty());
    assert_eq!(editor.pending().diff(), before);
    assert_eq!(editor.forest().get(a.id).unwrap().manager_id, Some(b.id));
    assert!(editor.forest().is_root(b.id));
    assert!(CycleGuard::is_acyclic(editor.forest()));
}

#[test]
fn leaving_edit_mode_shows_canonical_data_again() {
    let (directory, ids) = directory();
    let mut editor = editing(&directory, EditorConfig::default());

    editor
        .remove_node(ids.c, CascadePolicy::PromoteChildren)
        .unwrap();
    editor
        .add_node(ids.a, NodeAttributes::default(), NewNodeAssignment::LocalOnly)
        .unwrap();
    assert!(!editor.pending().has_changes());

    editor.exit_edit(false).unwrap();

    assert_eq!(editor.state(), EditorState::Viewing);
    assert_eq!(editor.forest().len(), 3);
    assert_eq!(editor.forest().relationships(), editor.canonical_forest().relationships());
    assert!(editor.forest().contains(ids.c));
}
