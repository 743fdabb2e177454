//! In-memory hierarchy representation.
//!
//! # Responsibility
//! - Build forests from flat directory records.
//! - Answer structural queries and cycle checks without side effects.
//!
//! # Invariants
//! - Nodes never hold references to each other; structure lives in the
//!   forest's id index.

pub mod builder;
pub mod cycle_guard;
pub mod forest;
