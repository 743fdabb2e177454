//! FFI use-case API for the Flutter hierarchy editor view.
//!
//! # Responsibility
//! - Expose hierarchy editor commands to Dart via FRB.
//! - Own editor instances in a handle registry, one per open view.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - The view never mutates hierarchy data directly; every change goes
//!   through an engine command.
//! - Database connections are opened per call and never held by editors.

use log::{info, warn};
use orgchart_core::db::open_db;
use orgchart_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CascadePolicy, EditError, EditorConfig, EmployeeId, EmployeeRecord, ErrorKind,
    HierarchyEditor, NewNodeAssignment, NodeAttributes, SqliteEmployeeStore, SyncError,
};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use uuid::Uuid;

const DB_FILE_NAME: &str = "orgchart.sqlite3";
const DB_PATH_ENV: &str = "ORGCHART_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static EDITORS: OnceLock<Mutex<BTreeMap<u64, HierarchyEditor>>> = OnceLock::new();
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes engine logging once per process.
///
/// - `level`: `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory for rolling logs.
///
/// Returns an empty string on success and the error message otherwise.
/// Repeating the same call is a no-op; reconfiguration is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One visible row of the hierarchy view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyRow {
    pub node_id: String,
    pub manager_id: Option<String>,
    pub display_name: String,
    pub title: String,
    pub department: String,
    /// Zero for roots.
    pub depth: u32,
    pub has_children: bool,
    pub collapsed: bool,
}

/// Response envelope shared by all hierarchy commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Editor handle the command ran against (0 when none).
    pub handle: u64,
    /// `validation|not_found|network|conflict|invalid_state` on failure.
    pub error_kind: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
    /// `viewing|editing|saving`, empty when no editor is attached.
    pub state: String,
    pub pending_count: u32,
    /// Set when a save succeeded but the data reload failed.
    pub stale: bool,
    /// Collapse-aware rows after the command.
    pub rows: Vec<HierarchyRow>,
    /// Id created by `hierarchy_add_node` or `employee_seed`.
    pub created_id: Option<String>,
}

impl HierarchyResponse {
    fn success(handle: u64, editor: &HierarchyEditor, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            handle,
            error_kind: None,
            message: message.into(),
            state: editor.state().as_str().to_string(),
            pending_count: u32::try_from(editor.pending().len()).unwrap_or(u32::MAX),
            stale: editor.is_stale(),
            rows: project_rows(editor),
            created_id: None,
        }
    }

    fn failure(handle: u64, failure: CommandFailure) -> Self {
        Self {
            ok: false,
            handle,
            error_kind: Some(failure.kind.to_string()),
            message: failure.message,
            state: String::new(),
            pending_count: 0,
            stale: false,
            rows: Vec::new(),
            created_id: None,
        }
    }

    fn with_created(mut self, id: EmployeeId) -> Self {
        self.created_id = Some(id.to_string());
        self
    }
}

/// Inserts or updates one employee in the local store.
///
/// Seeding path for demos and tests; hierarchy edits go through an editor.
#[flutter_rust_bridge::frb(sync)]
pub fn employee_seed(
    first_name: String,
    last_name: String,
    job_title: String,
    department: String,
    manager_id: Option<String>,
) -> HierarchyResponse {
    let result = parse_optional_id(manager_id.as_deref()).and_then(|manager_id| {
        let record = EmployeeRecord::new(manager_id)
            .named(first_name, last_name)
            .placed(job_title, department);
        let conn = open_store_connection()?;
        let store = SqliteEmployeeStore::try_new(&conn).map_err(CommandFailure::network)?;
        store
            .upsert_employee(&record)
            .map_err(CommandFailure::validation)?;
        Ok(record.id)
    });

    match result {
        Ok(id) => HierarchyResponse {
            ok: true,
            handle: 0,
            error_kind: None,
            message: "employee saved".to_string(),
            state: String::new(),
            pending_count: 0,
            stale: false,
            rows: Vec::new(),
            created_id: None,
        }
        .with_created(id),
        Err(failure) => HierarchyResponse::failure(0, failure),
    }
}

/// Opens a new editor instance over the local store.
///
/// `config_json` is an optional `EditorConfig` JSON object; missing fields
/// take their defaults.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_open(config_json: Option<String>) -> HierarchyResponse {
    let opened = parse_config(config_json.as_deref()).and_then(|config| {
        let conn = open_store_connection()?;
        let store = SqliteEmployeeStore::try_new(&conn).map_err(CommandFailure::network)?;
        HierarchyEditor::open(&store, config).map_err(CommandFailure::from)
    });
    let editor = match opened {
        Ok(editor) => editor,
        Err(failure) => return HierarchyResponse::failure(0, failure),
    };

    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    let response = HierarchyResponse::success(handle, &editor, "editor opened");
    match editors().lock() {
        Ok(mut registry) => {
            registry.insert(handle, editor);
            info!(
                "event=ffi_editor_open module=ffi status=ok handle={handle} open_editors={}",
                registry.len()
            );
            response
        }
        Err(_) => HierarchyResponse::failure(handle, CommandFailure::poisoned()),
    }
}

/// Drops one editor instance and any unsaved changes it holds.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_close(handle: u64) -> HierarchyResponse {
    let removed = editors()
        .lock()
        .map_err(|_| CommandFailure::poisoned())
        .and_then(|mut registry| {
            registry
                .remove(&handle)
                .ok_or_else(|| CommandFailure::unknown_handle(handle))
        });

    match removed {
        Ok(editor) => {
            if editor.pending().has_changes() {
                warn!(
                    "event=ffi_editor_close module=ffi status=ok handle={handle} dropped_pending={}",
                    editor.pending().len()
                );
            }
            HierarchyResponse {
                rows: Vec::new(),
                ..HierarchyResponse::success(handle, &editor, "editor closed")
            }
        }
        Err(failure) => HierarchyResponse::failure(handle, failure),
    }
}

/// Returns the current rows without changing anything.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_view(handle: u64) -> HierarchyResponse {
    with_editor(handle, |_| Ok("ok".to_string()))
}

#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_enter_edit(handle: u64) -> HierarchyResponse {
    with_editor(handle, |editor| {
        editor.enter_edit()?;
        Ok("edit mode".to_string())
    })
}

/// Leaves edit mode; `discard` drops pending changes.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_exit_edit(handle: u64, discard: bool) -> HierarchyResponse {
    with_editor(handle, |editor| {
        editor.exit_edit(discard)?;
        Ok("view mode".to_string())
    })
}

/// Drag-and-drop reparent. `new_parent_id = None` moves to root level.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_move_node(
    handle: u64,
    node_id: String,
    new_parent_id: Option<String>,
) -> HierarchyResponse {
    with_editor(handle, |editor| {
        let node_id = parse_id(&node_id)?;
        let new_parent_id = parse_optional_id(new_parent_id.as_deref())?;
        editor.move_node(node_id, new_parent_id)?;
        Ok("moved".to_string())
    })
}

/// Removes one node. `policy` is `promote_children` or `remove_subtree`;
/// `None` uses the editor's configured default.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_remove_node(
    handle: u64,
    node_id: String,
    policy: Option<String>,
) -> HierarchyResponse {
    with_editor(handle, |editor| {
        let node_id = parse_id(&node_id)?;
        match policy.as_deref().map(parse_cascade).transpose()? {
            Some(policy) => editor.remove_node(node_id, policy)?,
            None => editor.remove_node_default(node_id)?,
        };
        Ok("removed".to_string())
    })
}

/// Adds a node under `parent_id`. With `record_pending` the new manager
/// assignment is queued for the next save.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_add_node(
    handle: u64,
    parent_id: String,
    display_name: String,
    title: String,
    department: String,
    record_pending: bool,
) -> HierarchyResponse {
    let mut created = None;
    let response = with_editor(handle, |editor| {
        let parent_id = parse_id(&parent_id)?;
        let assignment = if record_pending {
            NewNodeAssignment::RecordPending
        } else {
            NewNodeAssignment::LocalOnly
        };
        let node = editor.add_node(
            parent_id,
            NodeAttributes::new(display_name, title, department),
            assignment,
        )?;
        created = Some(node.id);
        Ok("added".to_string())
    });
    match created {
        Some(id) => response.with_created(id),
        None => response,
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_toggle_collapse(handle: u64, node_id: String) -> HierarchyResponse {
    with_editor(handle, |editor| {
        let node_id = parse_id(&node_id)?;
        let collapsed = editor.toggle_collapse(node_id);
        Ok(if collapsed { "collapsed" } else { "expanded" }.to_string())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_expand_all(handle: u64) -> HierarchyResponse {
    with_editor(handle, |editor| {
        editor.expand_all();
        Ok("expanded".to_string())
    })
}

/// Submits pending changes and reloads from the store.
///
/// # FFI contract
/// - Sync call, DB-backed; the store round trip completes before return.
/// - On `network` failures pending changes are kept and resubmitting is safe.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_save(handle: u64) -> HierarchyResponse {
    with_editor(handle, |editor| {
        let conn = open_store_connection()?;
        let store = SqliteEmployeeStore::try_new(&conn).map_err(CommandFailure::network)?;
        let report = editor.save(&store, &store)?;
        Ok(format!(
            "saved {} change(s), {} applied",
            report.submitted, report.receipt.applied
        ))
    })
}

/// Reloads store data and replays pending changes on top.
#[flutter_rust_bridge::frb(sync)]
pub fn hierarchy_refresh(handle: u64) -> HierarchyResponse {
    with_editor(handle, |editor| {
        let conn = open_store_connection()?;
        let store = SqliteEmployeeStore::try_new(&conn).map_err(CommandFailure::network)?;
        let report = editor.refresh(&store)?;
        Ok(format!(
            "refreshed, {} replayed, {} dropped",
            report.replayed,
            report.dropped.len()
        ))
    })
}

/// Error payload carried into a failure envelope.
#[derive(Debug)]
struct CommandFailure {
    kind: &'static str,
    message: String,
}

impl CommandFailure {
    fn network(err: impl std::fmt::Display) -> Self {
        Self {
            kind: error_kind_label(ErrorKind::Network),
            message: err.to_string(),
        }
    }

    fn validation(err: impl std::fmt::Display) -> Self {
        Self {
            kind: error_kind_label(ErrorKind::Validation),
            message: err.to_string(),
        }
    }

    fn unknown_handle(handle: u64) -> Self {
        Self {
            kind: error_kind_label(ErrorKind::NotFound),
            message: format!("no open editor for handle {handle}"),
        }
    }

    fn poisoned() -> Self {
        Self {
            kind: error_kind_label(ErrorKind::InvalidState),
            message: "editor registry is unavailable".to_string(),
        }
    }
}

impl From<EditError> for CommandFailure {
    fn from(value: EditError) -> Self {
        Self {
            kind: error_kind_label(value.kind()),
            message: value.to_string(),
        }
    }
}

impl From<SyncError> for CommandFailure {
    fn from(value: SyncError) -> Self {
        Self {
            kind: error_kind_label(value.kind()),
            message: value.to_string(),
        }
    }
}

fn error_kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Network => "network",
        ErrorKind::Conflict => "conflict",
        ErrorKind::InvalidState => "invalid_state",
    }
}

fn editors() -> &'static Mutex<BTreeMap<u64, HierarchyEditor>> {
    EDITORS.get_or_init(|| Mutex::new(BTreeMap::new()))
}

/// Runs one command against a registered editor and wraps the outcome.
///
/// Failed commands still report the editor's current rows and state so the
/// view can re-render after a rejected gesture.
fn with_editor(
    handle: u64,
    command: impl FnOnce(&mut HierarchyEditor) -> Result<String, CommandFailure>,
) -> HierarchyResponse {
    let mut registry = match editors().lock() {
        Ok(registry) => registry,
        Err(_) => return HierarchyResponse::failure(handle, CommandFailure::poisoned()),
    };
    let Some(editor) = registry.get_mut(&handle) else {
        return HierarchyResponse::failure(handle, CommandFailure::unknown_handle(handle));
    };

    match command(&mut *editor) {
        Ok(message) => HierarchyResponse::success(handle, editor, message),
        Err(failure) => HierarchyResponse {
            ok: false,
            error_kind: Some(failure.kind.to_string()),
            message: failure.message,
            ..HierarchyResponse::success(handle, editor, String::new())
        },
    }
}

fn project_rows(editor: &HierarchyEditor) -> Vec<HierarchyRow> {
    editor
        .visible_rows()
        .into_iter()
        .filter_map(|row| {
            let node = editor.forest().get(row.id)?;
            Some(HierarchyRow {
                node_id: row.id.to_string(),
                manager_id: node.manager_id.map(|id| id.to_string()),
                display_name: node.attributes.display_name.clone(),
                title: node.attributes.title.clone(),
                department: node.attributes.department.clone(),
                depth: u32::try_from(row.depth).unwrap_or(u32::MAX),
                has_children: row.has_children,
                collapsed: row.collapsed,
            })
        })
        .collect()
}

fn parse_id(value: &str) -> Result<EmployeeId, CommandFailure> {
    Uuid::parse_str(value.trim())
        .map_err(|_| CommandFailure::validation(format!("invalid employee id `{value}`")))
}

fn parse_optional_id(value: Option<&str>) -> Result<Option<EmployeeId>, CommandFailure> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_id(raw).map(Some),
    }
}

fn parse_cascade(value: &str) -> Result<CascadePolicy, CommandFailure> {
    match value.trim() {
        "promote_children" => Ok(CascadePolicy::PromoteChildren),
        "remove_subtree" => Ok(CascadePolicy::RemoveSubtree),
        other => Err(CommandFailure::validation(format!(
            "unsupported cascade policy `{other}`; expected promote_children|remove_subtree"
        ))),
    }
}

fn parse_config(config_json: Option<&str>) -> Result<EditorConfig, CommandFailure> {
    match config_json.map(str::trim) {
        None | Some("") => Ok(EditorConfig::default()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|err| CommandFailure::validation(format!("invalid editor config: {err}"))),
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn open_store_connection() -> Result<Connection, CommandFailure> {
    open_db(resolve_db_path())
        .map_err(|err| CommandFailure::network(format!("org chart DB open failed: {err}")))
}
