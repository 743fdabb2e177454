//! Flutter-facing bindings for the org chart engine.

pub mod api;
