//! Entry store: the single source of truth for calorie records.
//!
//! # Responsibility
//! - Own the in-memory entry collection and serialize all mutations.
//! - Stamp new entries with id, audit time and ledger day.
//! - Mirror the collection into a snapshot slot after every mutation.
//! - Answer per-day and history queries.
//!
//! # Invariants
//! - Collection order is insertion order, most recent first. A batch lands
//!   as one contiguous block ahead of older entries, keeping its own order.
//! - Entry ids are pairwise distinct, including against entries loaded from
//!   an earlier session.
//! - A failed snapshot write never rolls back the in-memory mutation.
//! - The mutex is never held across an `.await`.

use crate::clock::{Clock, SystemClock};
use crate::ids::{IdGenerator, UuidV4Ids};
use crate::model::entry::{CalorieEntry, DayKey, EntryId, EntryValidationError, NewEntry};
use crate::repo::snapshot_repo::{RepoError, SnapshotRepository, CALORIES_SLOT};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type StoreResult<T> = Result<T, StoreError>;

const MIN_ID_REDRAWS: usize = 16;

/// Store-level error.
#[derive(Debug)]
pub enum StoreError {
    /// Rejected insertion input. `index` is set for batch inserts.
    Validation {
        index: Option<usize>,
        error: EntryValidationError,
    },
    /// Snapshot could not be read or written.
    Repo(RepoError),
    /// Persisted snapshot exists but cannot be trusted.
    CorruptSnapshot(String),
    /// Id source kept returning ids already held by the store.
    IdCollision(EntryId),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation {
                index: Some(index),
                error,
            } => write!(f, "batch item {index}: {error}"),
            Self::Validation { index: None, error } => write!(f, "{error}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::CorruptSnapshot(message) => {
                write!(f, "stored calorie snapshot is corrupt: {message}")
            }
            Self::IdCollision(id) => write!(f, "id source keeps yielding taken id {id}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation { error, .. } => Some(error),
            Self::Repo(err) => Some(err),
            Self::CorruptSnapshot(_) | Self::IdCollision(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Outcome of the most recent snapshot attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceStatus {
    /// `true` when durable storage matches memory.
    pub persisted: bool,
    /// Error text of the last failed write, cleared by the next success.
    pub last_error: Option<String>,
}

/// One day of history.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySection {
    pub date: DayKey,
    pub total_kcal: f64,
    /// Entries in stored (most-recently-inserted first) order.
    pub entries: Vec<CalorieEntry>,
}

struct StoreState<P> {
    entries: Vec<CalorieEntry>,
    persistence: P,
    last_error: Option<String>,
}

/// Thread-safe calorie entry store over a snapshot repository.
pub struct EntryStore<P: SnapshotRepository> {
    state: Mutex<StoreState<P>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl<P: SnapshotRepository> EntryStore<P> {
    /// Loads the last persisted snapshot and builds a store around it.
    ///
    /// # Errors
    /// - `Repo` when the slot cannot be read.
    /// - `CorruptSnapshot` when the payload is not a valid entry list.
    pub fn open(
        persistence: P,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> StoreResult<Self> {
        let entries = match persistence.load(CALORIES_SLOT)? {
            Some(payload) => decode_snapshot(&payload)?,
            None => Vec::new(),
        };
        info!(
            "event=store_open module=store status=ok entries={}",
            entries.len()
        );

        Ok(Self {
            state: Mutex::new(StoreState {
                entries,
                persistence,
                last_error: None,
            }),
            clock,
            ids,
        })
    }

    /// Opens with the system clock and random UUID ids.
    pub fn open_default(persistence: P) -> StoreResult<Self> {
        Self::open(persistence, Arc::new(SystemClock), Arc::new(UuidV4Ids))
    }

    /// Current day-key according to the injected clock.
    pub fn today(&self) -> DayKey {
        self.clock.today()
    }

    /// Inserts one entry dated today.
    pub fn add_entry(&self, partial: NewEntry) -> StoreResult<CalorieEntry> {
        self.add_entry_at(partial, self.clock.today())
    }

    /// Inserts one entry into the ledger of `date`.
    pub fn add_entry_at(&self, mut partial: NewEntry, date: DayKey) -> StoreResult<CalorieEntry> {
        partial
            .normalize()
            .map_err(|error| StoreError::Validation { index: None, error })?;

        let mut inserted = self.insert_block("add_entry", vec![partial], date)?;
        Ok(inserted.remove(0))
    }

    /// Inserts a batch dated today as one block ahead of existing entries.
    ///
    /// Every item is validated before any is stamped; one bad item rejects
    /// the whole batch. An empty batch is a no-op.
    pub fn add_entries(&self, batch: Vec<NewEntry>) -> StoreResult<Vec<CalorieEntry>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut normalized = batch;
        for (index, partial) in normalized.iter_mut().enumerate() {
            partial.normalize().map_err(|error| StoreError::Validation {
                index: Some(index),
                error,
            })?;
        }

        self.insert_block("add_entries", normalized, self.clock.today())
    }

    /// Deletes one entry by id. Unknown ids are a no-op returning `None`.
    pub fn remove_entry(&self, id: EntryId) -> Option<CalorieEntry> {
        let mut removed = None;
        self.mutate("remove_entry", |entries| {
            if let Some(position) = entries.iter().position(|entry| entry.id == id) {
                removed = Some(entries.remove(position));
                return true;
            }
            false
        });
        removed
    }

    /// Removes every entry. Returns how many were dropped.
    pub fn clear_all(&self) -> usize {
        let mut dropped = 0;
        self.mutate("clear_all", |entries| {
            dropped = entries.len();
            entries.clear();
            true
        });
        dropped
    }

    /// Entries of one day, in stored order.
    pub fn entries_on(&self, date: &DayKey) -> Vec<CalorieEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|entry| &entry.date == date)
            .cloned()
            .collect()
    }

    /// Sum of kcal over the entries of one day.
    pub fn total_kcal_on(&self, date: &DayKey) -> f64 {
        self.lock()
            .entries
            .iter()
            .filter(|entry| &entry.date == date)
            .map(|entry| entry.kcal)
            .sum()
    }

    /// History strictly before `today`, grouped by day, newest day first.
    pub fn entries_before(&self, today: &DayKey) -> Vec<DaySection> {
        let state = self.lock();
        let mut grouped: BTreeMap<&DayKey, Vec<CalorieEntry>> = BTreeMap::new();
        for entry in state.entries.iter().filter(|entry| &entry.date < today) {
            grouped.entry(&entry.date).or_default().push(entry.clone());
        }

        grouped
            .into_iter()
            .rev()
            .map(|(date, entries)| DaySection {
                date: date.clone(),
                total_kcal: entries.iter().map(|entry| entry.kcal).sum(),
                entries,
            })
            .collect()
    }

    /// Every distinct day that has at least one entry, newest first.
    pub fn days_with_entries(&self) -> Vec<DayKey> {
        let state = self.lock();
        let mut days = state
            .entries
            .iter()
            .map(|entry| entry.date.clone())
            .collect::<Vec<_>>();
        days.sort_unstable_by(|a, b| b.cmp(a));
        days.dedup();
        days
    }

    pub fn get(&self, id: EntryId) -> Option<CalorieEntry> {
        self.lock().entries.iter().find(|entry| entry.id == id).cloned()
    }

    /// Full collection snapshot in stored order.
    pub fn entries(&self) -> Vec<CalorieEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        let state = self.lock();
        PersistenceStatus {
            persisted: state.last_error.is_none(),
            last_error: state.last_error.clone(),
        }
    }

    /// Writes the current collection again, surfacing any failure.
    pub fn flush(&self) -> StoreResult<()> {
        let mut state = self.lock();
        write_snapshot(&mut state, "flush")
    }

    /// Stamps `partials` and prepends them as one block.
    ///
    /// Ids are drawn under the lock so they can be checked against every
    /// held entry, including ones loaded from an earlier session.
    fn insert_block(
        &self,
        op: &'static str,
        partials: Vec<NewEntry>,
        date: DayKey,
    ) -> StoreResult<Vec<CalorieEntry>> {
        let created_at = self.clock.now_epoch_ms();
        let mut outcome = Ok(Vec::new());
        self.mutate(op, |entries| {
            let ids = match self.draw_ids(entries, partials.len()) {
                Ok(ids) => ids,
                Err(err) => {
                    outcome = Err(err);
                    return false;
                }
            };
            let stamped = partials
                .into_iter()
                .zip(ids)
                .map(|(partial, id)| CalorieEntry::stamp(partial, id, created_at, date.clone()))
                .collect::<Vec<_>>();
            outcome = Ok(stamped.clone());
            entries.splice(0..0, stamped);
            true
        });
        outcome
    }

    /// Draws `count` ids not present in `entries` nor among each other.
    fn draw_ids(&self, entries: &[CalorieEntry], count: usize) -> StoreResult<Vec<EntryId>> {
        let mut taken = entries.iter().map(|entry| entry.id).collect::<HashSet<_>>();
        // A generator that counts up from a fixed seed needs at most one
        // redraw per held id.
        let max_redraws = taken.len() + count + MIN_ID_REDRAWS;
        let mut ids = Vec::with_capacity(count);
        let mut redraws = 0;
        while ids.len() < count {
            let id = self.ids.next_id();
            if taken.insert(id) {
                ids.push(id);
                continue;
            }
            redraws += 1;
            if redraws > max_redraws {
                warn!("event=id_draw module=store status=error redraws={redraws}");
                return Err(StoreError::IdCollision(id));
            }
        }
        if redraws > 0 {
            debug!("event=id_draw module=store status=ok redraws={redraws}");
        }
        Ok(ids)
    }

    fn mutate(&self, op: &'static str, apply: impl FnOnce(&mut Vec<CalorieEntry>) -> bool) {
        let mut state = self.lock();
        if !apply(&mut state.entries) {
            debug!("event=store_mutate module=store status=noop op={op}");
            return;
        }
        info!(
            "event=store_mutate module=store status=ok op={} entries={}",
            op,
            state.entries.len()
        );
        // Failure is already recorded in `last_error`; memory stays authoritative.
        let _ = write_snapshot(&mut state, op);
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_snapshot<P: SnapshotRepository>(
    state: &mut StoreState<P>,
    op: &'static str,
) -> StoreResult<()> {
    let result = serde_json::to_string(&state.entries)
        .map_err(|err| StoreError::CorruptSnapshot(err.to_string()))
        .and_then(|payload| {
            state
                .persistence
                .save(CALORIES_SLOT, &payload)
                .map_err(StoreError::from)
        });

    match &result {
        Ok(()) => state.last_error = None,
        Err(err) => {
            warn!(
                "event=snapshot_save module=store status=warn op={} entries={} error={}",
                op,
                state.entries.len(),
                err
            );
            state.last_error = Some(err.to_string());
        }
    }
    result
}

fn decode_snapshot(payload: &str) -> StoreResult<Vec<CalorieEntry>> {
    let entries: Vec<CalorieEntry> = serde_json::from_str(payload)
        .map_err(|err| StoreError::CorruptSnapshot(err.to_string()))?;

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in &entries {
        entry
            .validate()
            .map_err(|err| StoreError::CorruptSnapshot(format!("entry {}: {err}", entry.id)))?;
        if !seen.insert(entry.id) {
            return Err(StoreError::CorruptSnapshot(format!(
                "duplicate entry id {}",
                entry.id
            )));
        }
    }
    Ok(entries)
}
