//! Calorie ledger domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by the entry store and ingestion.
//!
//! # Invariants
//! - Every entry is identified by a stable `EntryId`.
//! - Entries are immutable once stamped; deletion is a hard delete.

pub mod entry;
