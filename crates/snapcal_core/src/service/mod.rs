//! Core use-case services.
//!
//! # Responsibility
//! - Own the calorie ledger runtime state behind a narrow API.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod entry_store;
