//! Persistence implementations of the sync collaborator contracts.
//!
//! # Invariants
//! - Repositories borrow a migrated connection; they never open one.
//! - SQL details stay inside this module.

pub mod employee_repo;
