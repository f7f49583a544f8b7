//! Core domain logic for SnapCal.
//! This crate is the single source of truth for calorie ledger invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod ids;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod vision;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{resolve_db_path, Credentials, VisionConfig};
pub use ids::{IdGenerator, SequentialIds, UuidV4Ids};
pub use ingest::answer::{parse_answer, AnswerError, MealItem};
pub use ingest::pipeline::{IngestError, IngestResult, IngestionPipeline, MEAL_PROMPT};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entry::{
    CalorieEntry, DayKey, DayKeyError, EntryId, EntrySource, EntryValidationError, NewEntry,
};
pub use repo::snapshot_repo::{
    RepoError, RepoResult, SnapshotRepository, SqliteSnapshotRepository, CALORIES_SLOT,
};
pub use service::entry_store::{
    DaySection, EntryStore, PersistenceStatus, StoreError, StoreResult,
};
pub use vision::client::{VisionError, VisionModelClient, VisionRequest};
pub use vision::gemini::GeminiClient;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
