//! Editor session state and persistence synchronization.
//!
//! # Responsibility
//! - Define the directory and store collaborator contracts.
//! - Drive the Viewing / Editing / Saving session state machine.
//!
//! # Invariants
//! - Collaborators are passed per call; the editor holds no I/O handles.

pub mod collaborator;
pub mod config;
pub mod editor;
