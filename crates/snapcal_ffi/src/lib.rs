//! Flutter-facing bindings for SnapCal core.

pub mod api;
