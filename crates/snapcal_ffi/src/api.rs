//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Own the process-wide entry store and ingestion pipeline.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported through `ok=false` envelopes with a message.
//! - All calls share one store, so every view observes the same entries.

use log::error;
use once_cell::sync::OnceCell;
use snapcal_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    resolve_db_path, CalorieEntry, Credentials, DayKey, DaySection, EntryId, EntryStore,
    GeminiClient, IngestionPipeline, NewEntry, SqliteSnapshotRepository, VisionConfig,
};

static ENTRY_STORE: OnceCell<EntryStore<SqliteSnapshotRepository>> = OnceCell::new();
static PIPELINE: OnceCell<IngestionPipeline<GeminiClient>> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One calorie entry as seen by the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryItem {
    pub id: String,
    pub name: String,
    pub kcal: f64,
    pub qty_g: Option<f64>,
    /// `ai` or `manual`.
    pub source: String,
    pub created_at_ms: i64,
    /// Local calendar day, `YYYY-MM-DD`.
    pub date: String,
}

/// Result envelope for commands that touch entries.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryActionResponse {
    pub ok: bool,
    /// Entries created or removed by the command.
    pub items: Vec<EntryItem>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
    /// Stable machine code on failure (`validation`, `upstream`, ...).
    pub error_code: Option<String>,
}

impl EntryActionResponse {
    fn success(message: impl Into<String>, items: Vec<EntryItem>) -> Self {
        Self {
            ok: true,
            items,
            message: message.into(),
            error_code: None,
        }
    }

    fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            message: message.into(),
            error_code: Some(code.to_string()),
        }
    }
}

/// Entries and total for a single day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayLedgerResponse {
    pub ok: bool,
    pub date: String,
    pub total_kcal: f64,
    pub items: Vec<EntryItem>,
    pub message: String,
}

/// One past day in the history view.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDay {
    pub date: String,
    pub total_kcal: f64,
    pub items: Vec<EntryItem>,
}

/// Past days, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryResponse {
    pub ok: bool,
    pub days: Vec<HistoryDay>,
    pub message: String,
}

/// Adds a manually entered item.
///
/// `date` defaults to the current local day when `None`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn entry_add_manual(
    name: String,
    kcal: f64,
    qty_g: Option<f64>,
    date: Option<String>,
) -> EntryActionResponse {
    let store = match entry_store() {
        Ok(store) => store,
        Err(message) => return EntryActionResponse::failure("store", message),
    };
    let mut partial = NewEntry::manual(name, kcal);
    partial.qty_g = qty_g;

    let added = match date {
        Some(raw) => match DayKey::parse(raw.trim()) {
            Ok(day) => store.add_entry_at(partial, day),
            Err(err) => return EntryActionResponse::failure("validation", err.to_string()),
        },
        None => store.add_entry(partial),
    };
    match added {
        Ok(entry) => EntryActionResponse::success("Entry added.", vec![to_entry_item(entry)]),
        Err(err) => EntryActionResponse::failure("validation", format!("entry_add failed: {err}")),
    }
}

/// Removes one entry by id. Unknown ids succeed with no items.
#[flutter_rust_bridge::frb(sync)]
pub fn entry_remove(id: String) -> EntryActionResponse {
    let store = match entry_store() {
        Ok(store) => store,
        Err(message) => return EntryActionResponse::failure("store", message),
    };
    let id = match EntryId::parse_str(id.trim()) {
        Ok(id) => id,
        Err(err) => {
            return EntryActionResponse::failure("validation", format!("invalid entry id: {err}"))
        }
    };
    match store.remove_entry(id) {
        Some(entry) => EntryActionResponse::success("Entry removed.", vec![to_entry_item(entry)]),
        None => EntryActionResponse::success("No such entry.", Vec::new()),
    }
}

/// Deletes every entry.
#[flutter_rust_bridge::frb(sync)]
pub fn entries_clear() -> EntryActionResponse {
    match entry_store() {
        Ok(store) => {
            let removed = store.clear_all();
            EntryActionResponse::success(format!("Removed {removed} entr(y/ies)."), Vec::new())
        }
        Err(message) => EntryActionResponse::failure("store", message),
    }
}

/// Entries and kcal total for `date`, or today when `None`.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_for_day(date: Option<String>) -> DayLedgerResponse {
    let failed = |message: String| DayLedgerResponse {
        ok: false,
        date: String::new(),
        total_kcal: 0.0,
        items: Vec::new(),
        message,
    };
    let store = match entry_store() {
        Ok(store) => store,
        Err(message) => return failed(message),
    };
    let day = match date {
        Some(raw) => match DayKey::parse(raw.trim()) {
            Ok(day) => day,
            Err(err) => return failed(err.to_string()),
        },
        None => store.today(),
    };

    let items = store
        .entries_on(&day)
        .into_iter()
        .map(to_entry_item)
        .collect::<Vec<_>>();
    DayLedgerResponse {
        ok: true,
        date: day.to_string(),
        total_kcal: store.total_kcal_on(&day),
        message: format!("{} entr(y/ies).", items.len()),
        items,
    }
}

/// Days strictly before today that have entries, newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn history() -> HistoryResponse {
    match entry_store() {
        Ok(store) => {
            let days = store
                .entries_before(&store.today())
                .into_iter()
                .map(to_history_day)
                .collect::<Vec<_>>();
            HistoryResponse {
                ok: true,
                message: format!("{} day(s).", days.len()),
                days,
            }
        }
        Err(message) => HistoryResponse {
            ok: false,
            days: Vec::new(),
            message,
        },
    }
}

/// Sends a JPEG meal photo to the vision model and records the estimated
/// items under today's date.
///
/// # FFI contract
/// - Async call; performs one outbound HTTPS request.
/// - The API key is read from the environment on every call.
/// - Never panics; on failure the store is unchanged.
pub async fn meal_photo_submit(photo: Vec<u8>) -> EntryActionResponse {
    let store = match entry_store() {
        Ok(store) => store,
        Err(message) => return EntryActionResponse::failure("store", message),
    };
    let pipeline = match ingestion_pipeline() {
        Ok(pipeline) => pipeline,
        Err(message) => return EntryActionResponse::failure("configuration", message),
    };

    match pipeline
        .submit(store, &photo, &Credentials::from_env())
        .await
    {
        Ok(entries) => {
            let items = entries.into_iter().map(to_entry_item).collect::<Vec<_>>();
            EntryActionResponse::success(format!("Recorded {} item(s).", items.len()), items)
        }
        Err(err) => {
            EntryActionResponse::failure(err.code(), format!("meal_photo_submit failed: {err}"))
        }
    }
}

fn entry_store() -> Result<&'static EntryStore<SqliteSnapshotRepository>, String> {
    ENTRY_STORE.get_or_try_init(|| {
        let db_path = resolve_db_path();
        let repo = SqliteSnapshotRepository::open(&db_path).map_err(|err| {
            error!("event=store_init module=ffi status=error error={err}");
            format!("entry DB open failed: {err}")
        })?;
        EntryStore::open_default(repo).map_err(|err| {
            error!("event=store_init module=ffi status=error error={err}");
            format!("entry store init failed: {err}")
        })
    })
}

fn ingestion_pipeline() -> Result<&'static IngestionPipeline<GeminiClient>, String> {
    PIPELINE.get_or_try_init(|| {
        GeminiClient::new(&VisionConfig::from_env())
            .map(IngestionPipeline::new)
            .map_err(|err| format!("vision client init failed: {err}"))
    })
}

fn to_entry_item(entry: CalorieEntry) -> EntryItem {
    EntryItem {
        id: entry.id.to_string(),
        name: entry.name,
        kcal: entry.kcal,
        qty_g: entry.qty_g,
        source: entry.source.as_str().to_string(),
        created_at_ms: entry.created_at,
        date: entry.date.to_string(),
    }
}

fn to_history_day(section: DaySection) -> HistoryDay {
    HistoryDay {
        date: section.date.to_string(),
        total_kcal: section.total_kcal,
        items: section.entries.into_iter().map(to_entry_item).collect(),
    }
}
