//! SQLite-backed employee directory and relationship store.
//!
//! # Responsibility
//! - Serve the flat employee list to hierarchy editors.
//! - Apply relationship batches atomically with server-side validation.
//!
//! # Invariants
//! - A batch is applied in one immediate transaction or not at all.
//! - Stored `manager_id` values always reference existing employees and never
//!   form a cycle after commit.
//! - Resubmitting an already applied batch changes nothing and succeeds.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::hierarchy::builder::HierarchyBuilder;
use crate::hierarchy::cycle_guard::CycleGuard;
use crate::model::employee::{EmployeeId, EmployeeRecord, SaveRequest};
use crate::sync::collaborator::{
    DirectoryError, EmployeeDirectory, RelationshipStore, SaveReceipt, StoreError,
};
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Result type used by employee store operations.
pub type StoreRepoResult<T> = Result<T, StoreRepoError>;

/// Errors from employee store operations.
#[derive(Debug)]
pub enum StoreRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Referenced employee does not exist.
    EmployeeNotFound(EmployeeId),
    /// Batch assigns an employee as its own manager.
    SelfManagement(EmployeeId),
    /// Batch would leave the stored hierarchy cyclic.
    CycleRejected(Vec<EmployeeId>),
    /// Stored managers differ from the batch's baselines.
    Conflict(Vec<EmployeeId>),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for StoreRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::EmployeeNotFound(id) => write!(f, "employee not found: {id}"),
            Self::SelfManagement(id) => write!(f, "employee cannot manage itself: {id}"),
            Self::CycleRejected(ids) => write!(
                f,
                "batch would create a management cycle through {} employee(s)",
                ids.len()
            ),
            Self::Conflict(ids) => write!(
                f,
                "stored managers changed for {} employee(s)",
                ids.len()
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "employee store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "employee store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid employee data: {message}"),
        }
    }
}

impl Error for StoreRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<StoreRepoError> for StoreError {
    fn from(value: StoreRepoError) -> Self {
        match value {
            StoreRepoError::Conflict(employee_ids) => Self::Conflict { employee_ids },
            StoreRepoError::Db(err) => Self::Network(err.to_string()),
            other => Self::Rejected(other.to_string()),
        }
    }
}

impl From<StoreRepoError> for DirectoryError {
    fn from(value: StoreRepoError) -> Self {
        match value {
            StoreRepoError::InvalidData(message) => Self::InvalidData(message),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Employee store over one migrated SQLite connection.
pub struct SqliteEmployeeStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmployeeStore<'conn> {
    /// Creates a store after verifying the connection is migrated.
    pub fn try_new(conn: &'conn Connection) -> StoreRepoResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Inserts or replaces one employee record.
    ///
    /// Seeding path only; hierarchy edits go through `save_relationships`.
    /// The manager must already exist and the result must stay acyclic.
    pub fn upsert_employee(&self, record: &EmployeeRecord) -> StoreRepoResult<()> {
        if record.manager_id == Some(record.id) {
            return Err(StoreRepoError::SelfManagement(record.id));
        }
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(manager_id) = record.manager_id {
            if load_manager(&tx, manager_id)?.is_none() {
                return Err(StoreRepoError::EmployeeNotFound(manager_id));
            }
        }

        tx.execute(
            "INSERT INTO employees (
                id, manager_id, first_name, last_name, job_title, department,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                    (strftime('%s', 'now') * 1000), (strftime('%s', 'now') * 1000))
            ON CONFLICT(id) DO UPDATE SET
                manager_id = excluded.manager_id,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                job_title = excluded.job_title,
                department = excluded.department,
                updated_at = excluded.updated_at;",
            params![
                record.id.to_string(),
                record.manager_id.map(|id| id.to_string()),
                record.first_name,
                record.last_name,
                record.job_title,
                record.department,
            ],
        )?;
        ensure_acyclic(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Loads one employee by id.
    pub fn get_employee(&self, id: EmployeeId) -> StoreRepoResult<Option<EmployeeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, manager_id, first_name, last_name, job_title, department
             FROM employees
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_employee_row(row)?)),
            None => Ok(None),
        }
    }

    /// Lists every employee ordered by id.
    pub fn list_employees(&self) -> StoreRepoResult<Vec<EmployeeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, manager_id, first_name, last_name, job_title, department
             FROM employees
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_employee_row(row)?);
        }
        Ok(records)
    }

    /// Applies one relationship batch and returns applied/unchanged counts.
    pub fn apply_batch(&self, request: &SaveRequest) -> StoreRepoResult<SaveReceipt> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let requested: HashMap<EmployeeId, Option<EmployeeId>> = request
            .changes
            .iter()
            .map(|change| (change.employee_id, change.manager_id))
            .collect();

        let mut conflicted = Vec::new();
        for expectation in &request.expected {
            let current = load_manager(&tx, expectation.employee_id)?
                .ok_or(StoreRepoError::EmployeeNotFound(expectation.employee_id))?;
            let already_applied = requested
                .get(&expectation.employee_id)
                .is_some_and(|target| *target == current);
            if current != expectation.manager_id && !already_applied {
                conflicted.push(expectation.employee_id);
            }
        }
        if !conflicted.is_empty() {
            conflicted.sort();
            return Err(StoreRepoError::Conflict(conflicted));
        }

        let mut receipt = SaveReceipt::default();
        for change in &request.changes {
            if change.manager_id == Some(change.employee_id) {
                return Err(StoreRepoError::SelfManagement(change.employee_id));
            }
            let current = load_manager(&tx, change.employee_id)?
                .ok_or(StoreRepoError::EmployeeNotFound(change.employee_id))?;
            if let Some(manager_id) = change.manager_id {
                if load_manager(&tx, manager_id)?.is_none() {
                    return Err(StoreRepoError::EmployeeNotFound(manager_id));
                }
            }

            if current == change.manager_id {
                receipt.unchanged += 1;
                continue;
            }
            tx.execute(
                "UPDATE employees
                 SET manager_id = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    change.employee_id.to_string(),
                    change.manager_id.map(|id| id.to_string()),
                ],
            )?;
            receipt.applied += 1;
        }

        // Dropping `tx` on error rolls the batch back.
        ensure_acyclic(&tx)?;
        tx.commit()?;
        Ok(receipt)
    }
}

impl EmployeeDirectory for SqliteEmployeeStore<'_> {
    fn fetch_employees(&self) -> Result<Vec<EmployeeRecord>, DirectoryError> {
        match self.list_employees() {
            Ok(records) => {
                info!(
                    "event=directory_fetch module=repo status=ok count={}",
                    records.len()
                );
                Ok(records)
            }
            Err(err) => {
                error!("event=directory_fetch module=repo status=error error={err}");
                Err(err.into())
            }
        }
    }
}

impl RelationshipStore for SqliteEmployeeStore<'_> {
    fn save_relationships(&self, request: &SaveRequest) -> Result<SaveReceipt, StoreError> {
        match self.apply_batch(request) {
            Ok(receipt) => {
                info!(
                    "event=relationship_save module=repo status=ok applied={} unchanged={}",
                    receipt.applied, receipt.unchanged
                );
                Ok(receipt)
            }
            Err(StoreRepoError::Db(err)) => {
                error!(
                    "event=relationship_save module=repo status=error busy={} error={err}",
                    err.is_busy()
                );
                Err(StoreRepoError::Db(err).into())
            }
            Err(err) => {
                warn!("event=relationship_save module=repo status=rejected error={err}");
                Err(err.into())
            }
        }
    }
}

/// Returns `None` when the employee is missing, `Some(manager)` otherwise.
fn load_manager(
    conn: &Connection,
    id: EmployeeId,
) -> StoreRepoResult<Option<Option<EmployeeId>>> {
    let manager_text = conn
        .query_row(
            "SELECT manager_id FROM employees WHERE id = ?1;",
            [id.to_string()],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    manager_text
        .map(|value| {
            value
                .map(|text| parse_uuid(&text, "employees.manager_id"))
                .transpose()
        })
        .transpose()
}

/// Rejects the stored hierarchy when any employee cannot reach a root.
fn ensure_acyclic(conn: &Connection) -> StoreRepoResult<()> {
    let forest = HierarchyBuilder::build(&list_employees_in(conn)?).forest;
    let unreachable = CycleGuard::unreachable_nodes(&forest);
    if !unreachable.is_empty() {
        return Err(StoreRepoError::CycleRejected(unreachable.into_iter().collect()));
    }
    Ok(())
}

fn list_employees_in(conn: &Connection) -> StoreRepoResult<Vec<EmployeeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, manager_id, first_name, last_name, job_title, department
         FROM employees;",
    )?;
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_employee_row(row)?);
    }
    Ok(records)
}

fn parse_employee_row(row: &Row<'_>) -> StoreRepoResult<EmployeeRecord> {
    let id_text: String = row.get("id")?;
    let manager_id = row
        .get::<_, Option<String>>("manager_id")?
        .map(|value| parse_uuid(&value, "employees.manager_id"))
        .transpose()?;

    Ok(EmployeeRecord {
        id: parse_uuid(&id_text, "employees.id")?,
        manager_id,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        job_title: row.get("job_title")?,
        department: row.get("department")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> StoreRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'employees'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(StoreRepoError::MissingRequiredTable("employees"));
    }
    Ok(())
}
