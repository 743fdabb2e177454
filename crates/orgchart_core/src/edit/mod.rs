//! Local, synchronous hierarchy editing.
//!
//! # Responsibility
//! - Validate and apply user edit commands to the in-memory forest.
//! - Keep the pending diff and per-editor collapse state.
//!
//! # Invariants
//! - No edit performs I/O; persistence happens only through `sync`.

pub mod mutator;
pub mod pending;
pub mod visibility;
