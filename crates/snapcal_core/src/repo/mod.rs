//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable snapshot contract the entry store writes through.
//! - Isolate SQLite query details from store orchestration.
//!
//! # Invariants
//! - Repositories store opaque payloads; validation belongs to the store.

pub mod snapshot_repo;
