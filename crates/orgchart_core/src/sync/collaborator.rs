//! Collaborator contracts at the engine boundary.
//!
//! # Responsibility
//! - Define the inbound directory fetch and the outbound relationship save.
//! - Define the error envelopes those collaborators may return.
//!
//! # Invariants
//! - `save_relationships` is the only write path for manager assignments.
//! - Implementations must re-validate acyclicity on their side; the engine's
//!   checks are not authoritative.
//! - Contracts are transport-agnostic (HTTP, RPC or in-process).

use crate::model::employee::{EmployeeId, EmployeeRecord, SaveRequest};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Directory fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Directory could not be reached.
    Unavailable(String),
    /// Directory answered with data the engine cannot use.
    InvalidData(String),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "employee directory unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "invalid employee directory data: {message}"),
        }
    }
}

impl Error for DirectoryError {}

/// Relationship save failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Request did not reach the store or its answer was lost.
    Network(String),
    /// Store data changed since the edits were based on it.
    Conflict { employee_ids: Vec<EmployeeId> },
    /// Store validation refused the batch (unknown ids, cycles).
    Rejected(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "relationship store unreachable: {message}"),
            Self::Conflict { employee_ids } => write!(
                f,
                "relationships changed concurrently for {} employee(s)",
                employee_ids.len()
            ),
            Self::Rejected(message) => write!(f, "relationship save rejected: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Store answer for an accepted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Assignments that changed stored data.
    pub applied: usize,
    /// Assignments already matching stored data.
    pub unchanged: usize,
}

/// Inbound employee directory.
pub trait EmployeeDirectory {
    /// Returns the flat list of all employees.
    fn fetch_employees(&self) -> Result<Vec<EmployeeRecord>, DirectoryError>;
}

/// Outbound relationship persistence.
pub trait RelationshipStore {
    /// Applies one batch of absolute manager assignments atomically.
    fn save_relationships(&self, request: &SaveRequest) -> Result<SaveReceipt, StoreError>;
}

impl<T: EmployeeDirectory + ?Sized> EmployeeDirectory for &T {
    fn fetch_employees(&self) -> Result<Vec<EmployeeRecord>, DirectoryError> {
        (**self).fetch_employees()
    }
}

impl<T: RelationshipStore + ?Sized> RelationshipStore for &T {
    fn save_relationships(&self, request: &SaveRequest) -> Result<SaveReceipt, StoreError> {
        (**self).save_relationships(request)
    }
}
