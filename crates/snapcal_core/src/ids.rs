//! Entry id generation.

use crate::model::entry::EntryId;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of fresh entry ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> EntryId;
}

/// Random v4 UUIDs (122 bits of entropy).
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4Ids;

impl IdGenerator for UuidV4Ids {
    fn next_id(&self) -> EntryId {
        Uuid::new_v4()
    }
}

/// Deterministic ids `1, 2, 3, ...` encoded as UUIDs, for tests and fixtures.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> EntryId {
        let value = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(u128::from(value))
    }
}
