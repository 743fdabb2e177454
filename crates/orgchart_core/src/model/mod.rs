//! Domain model for the organizational hierarchy.
//!
//! # Responsibility
//! - Define the directory record and relationship shapes shared by the
//!   engine, the store and the FFI layer.
//!
//! # Invariants
//! - Every employee is identified by a stable `EmployeeId`.
//! - Manager relationships are single-valued (`Option<EmployeeId>`).

pub mod employee;
