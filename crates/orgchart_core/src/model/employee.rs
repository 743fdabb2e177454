//! Employee directory records and hierarchy relationship shapes.
//!
//! # Responsibility
//! - Define the flat record shape received from the employee directory.
//! - Define the relationship pair used for diffs and save expectations.
//!
//! # Invariants
//! - `id` is stable across directory fetches and never reused.
//! - `manager_id = None` means the employee is a root of the hierarchy.
//! - Presentation attributes are opaque to hierarchy logic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one employee (and of its hierarchy node).
pub type EmployeeId = Uuid;

/// Flat employee record as delivered by the directory collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    /// Direct manager. `None` for top-level employees.
    pub manager_id: Option<EmployeeId>,
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub department: String,
}

impl EmployeeRecord {
    /// Creates a record with a generated stable ID and empty attributes.
    pub fn new(manager_id: Option<EmployeeId>) -> Self {
        Self::with_id(Uuid::new_v4(), manager_id)
    }

    /// Creates a record with a caller-provided stable ID.
    ///
    /// Used by import paths and tests where identity exists externally.
    pub fn with_id(id: EmployeeId, manager_id: Option<EmployeeId>) -> Self {
        Self {
            id,
            manager_id,
            first_name: String::new(),
            last_name: String::new(),
            job_title: String::new(),
            department: String::new(),
        }
    }

    /// Sets first and last name.
    pub fn named(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    /// Sets job title and department.
    pub fn placed(mut self, job_title: impl Into<String>, department: impl Into<String>) -> Self {
        self.job_title = job_title.into();
        self.department = department.into();
        self
    }

    /// Projects presentation attributes carried by hierarchy nodes.
    pub fn attributes(&self) -> NodeAttributes {
        let display_name = format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string();
        NodeAttributes {
            display_name,
            title: self.job_title.clone(),
            department: self.department.clone(),
        }
    }
}

/// Presentation attributes of one hierarchy node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub display_name: String,
    pub title: String,
    pub department: String,
}

impl NodeAttributes {
    pub fn new(
        display_name: impl Into<String>,
        title: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            title: title.into(),
            department: department.into(),
        }
    }
}

/// One absolute manager assignment.
///
/// Used both as a diff entry (`employee_id` should report to `manager_id`)
/// and as a save expectation (`employee_id` reported to `manager_id` when
/// editing began).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipChange {
    pub employee_id: EmployeeId,
    pub manager_id: Option<EmployeeId>,
}

impl RelationshipChange {
    pub fn new(employee_id: EmployeeId, manager_id: Option<EmployeeId>) -> Self {
        Self {
            employee_id,
            manager_id,
        }
    }
}

/// Batch submitted to the relationship store in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Absolute assignments to apply, sorted by employee id.
    pub changes: Vec<RelationshipChange>,
    /// Managers observed before the first local edit of each changed employee.
    ///
    /// Entries recorded without a known baseline have no expectation.
    #[serde(default)]
    pub expected: Vec<RelationshipChange>,
}

impl SaveRequest {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
