//! Core engine of the organizational hierarchy editor.
//! This crate is the single source of truth for hierarchy invariants.

pub mod db;
pub mod edit;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sync;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use edit::mutator::{
    CascadePolicy, EditError, ErrorKind, MoveRequest, NewNodeAssignment, TreeMutator,
};
pub use edit::pending::PendingChangeTracker;
pub use edit::visibility::{VisibilityState, VisibleRow};
pub use hierarchy::builder::{BuildOutcome, BuildWarning, HierarchyBuilder};
pub use hierarchy::cycle_guard::CycleGuard;
pub use hierarchy::forest::{Forest, Node};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::employee::{
    EmployeeId, EmployeeRecord, NodeAttributes, RelationshipChange, SaveRequest,
};
pub use repo::employee_repo::{SqliteEmployeeStore, StoreRepoError, StoreRepoResult};
pub use sync::collaborator::{
    DirectoryError, EmployeeDirectory, RelationshipStore, SaveReceipt, StoreError,
};
pub use sync::config::{ConflictPolicy, EditorConfig};
pub use sync::editor::{EditorState, HierarchyEditor, RefreshReport, SaveReport, SyncError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
