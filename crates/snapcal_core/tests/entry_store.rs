use chrono::NaiveDate;
use snapcal_core::db::open_db_in_memory;
use snapcal_core::{
    Clock, DayKey, EntryId, EntrySource, EntryStore, FixedClock, IdGenerator, NewEntry, RepoError,
    RepoResult, SequentialIds, SnapshotRepository, SqliteSnapshotRepository, StoreError,
    SystemClock,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn day(value: &str) -> DayKey {
    DayKey::parse(value).unwrap()
}

fn fixed_store(today: &str) -> EntryStore<SqliteSnapshotRepository> {
    let repo = SqliteSnapshotRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let date = NaiveDate::parse_from_str(today, "%Y-%m-%d").unwrap();
    EntryStore::open(
        repo,
        Arc::new(FixedClock::on(date)),
        Arc::new(SequentialIds::new()),
    )
    .unwrap()
}

fn names(entries: &[snapcal_core::CalorieEntry]) -> Vec<&str> {
    entries.iter().map(|entry| entry.name.as_str()).collect()
}

#[test]
fn add_entry_stamps_today_and_manual_fields() {
    let store = fixed_store("2024-03-10");

    let entry = store.add_entry(NewEntry::manual("Rice", 200.0)).unwrap();
    assert_eq!(entry.date, day("2024-03-10"));
    assert_eq!(entry.kcal, 200.0);
    assert_eq!(entry.qty_g, None);
    assert_eq!(entry.source, EntrySource::Manual);
    assert_eq!(store.get(entry.id), Some(entry));
}

#[test]
fn add_entry_uses_local_calendar_day_with_system_clock() {
    let repo = SqliteSnapshotRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let store = EntryStore::open_default(repo).unwrap();
    let before = SystemClock.today();

    let entry = store.add_entry(NewEntry::manual("Rice", 200.0)).unwrap();
    let after = SystemClock.today();
    assert!(entry.date == before || entry.date == after);
}

#[test]
fn add_entry_at_uses_caller_supplied_day() {
    let store = fixed_store("2024-03-10");

    let entry = store
        .add_entry_at(NewEntry::manual("Soup", 80.0), day("2024-01-05"))
        .unwrap();
    assert_eq!(entry.date, day("2024-01-05"));
    assert_eq!(store.entries_on(&day("2024-01-05")).len(), 1);
    assert!(store.entries_on(&day("2024-03-10")).is_empty());
}

#[test]
fn batches_are_prepended_as_blocks_keeping_their_order() {
    let store = fixed_store("2024-03-10");

    store
        .add_entries(vec![NewEntry::manual("A", 1.0), NewEntry::manual("B", 2.0)])
        .unwrap();
    assert_eq!(names(&store.entries()), vec!["A", "B"]);

    store.add_entries(vec![NewEntry::manual("C", 3.0)]).unwrap();
    assert_eq!(names(&store.entries()), vec!["C", "A", "B"]);

    store.add_entry(NewEntry::manual("D", 4.0)).unwrap();
    assert_eq!(names(&store.entries()), vec!["D", "C", "A", "B"]);
}

#[test]
fn insertion_order_is_not_resorted_by_date() {
    let store = fixed_store("2024-03-10");

    store
        .add_entry_at(NewEntry::manual("future", 1.0), day("2024-04-01"))
        .unwrap();
    store
        .add_entry_at(NewEntry::manual("past", 1.0), day("2023-01-01"))
        .unwrap();
    assert_eq!(names(&store.entries()), vec!["past", "future"]);
}

#[test]
fn invalid_batch_item_rejects_whole_batch() {
    let store = fixed_store("2024-03-10");
    store.add_entry(NewEntry::manual("existing", 10.0)).unwrap();

    let err = store
        .add_entries(vec![
            NewEntry::manual("ok", 10.0),
            NewEntry::manual("bad", -5.0),
        ])
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation { index: Some(1), .. }));
    assert_eq!(names(&store.entries()), vec!["existing"]);
}

#[test]
fn manual_entry_validation_rejects_blank_names_and_bad_numbers() {
    let store = fixed_store("2024-03-10");

    assert!(store.add_entry(NewEntry::manual("  ", 10.0)).is_err());
    assert!(store.add_entry(NewEntry::manual("Tea", f64::NAN)).is_err());
    assert!(store
        .add_entry(NewEntry::manual("Tea", 1.0).with_qty_g(-3.0))
        .is_err());
    assert!(store.is_empty());

    let trimmed = store.add_entry(NewEntry::manual("  Tea ", 1.0)).unwrap();
    assert_eq!(trimmed.name, "Tea");
}

#[test]
fn ids_stay_unique_across_mixed_operations() {
    let repo = SqliteSnapshotRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let store = EntryStore::open_default(repo).unwrap();

    for round in 0..20 {
        let first = store.add_entry(NewEntry::manual("single", 1.0)).unwrap();
        store
            .add_entry_at(NewEntry::manual("dated", 2.0), day("2024-01-01"))
            .unwrap();
        store
            .add_entries(vec![
                NewEntry::ai("x", 3.0, None),
                NewEntry::ai("y", 4.0, Some(50.0)),
            ])
            .unwrap();
        if round % 3 == 0 {
            store.remove_entry(first.id);
        }
    }

    let entries = store.entries();
    let ids = entries.iter().map(|entry| entry.id).collect::<HashSet<_>>();
    assert_eq!(ids.len(), entries.len());
}

#[test]
fn totals_only_count_matching_day() {
    let store = fixed_store("2024-03-10");
    store.add_entry(NewEntry::manual("Rice", 200.0)).unwrap();
    store.add_entry(NewEntry::manual("Egg", 78.5)).unwrap();
    store
        .add_entry_at(NewEntry::manual("Cake", 400.0), day("2024-03-09"))
        .unwrap();

    assert_eq!(store.total_kcal_on(&day("2024-03-10")), 278.5);
    assert_eq!(store.total_kcal_on(&day("2024-03-09")), 400.0);
    assert_eq!(store.total_kcal_on(&day("2024-03-08")), 0.0);
}

#[test]
fn remove_entry_drops_exactly_one_and_lowers_total() {
    let store = fixed_store("2024-03-10");
    let today = day("2024-03-10");
    store.add_entry(NewEntry::manual("Rice", 200.0)).unwrap();
    let egg = store.add_entry(NewEntry::manual("Egg", 80.0)).unwrap();

    let removed = store.remove_entry(egg.id).unwrap();
    assert_eq!(removed.id, egg.id);
    assert_eq!(store.len(), 1);
    assert_eq!(store.total_kcal_on(&today), 200.0);

    assert!(store.remove_entry(egg.id).is_none());
    assert!(store.remove_entry(Uuid::new_v4()).is_none());
    assert_eq!(store.len(), 1);
    assert_eq!(store.total_kcal_on(&today), 200.0);
}

#[test]
fn clear_all_empties_store_and_zeroes_totals() {
    let store = fixed_store("2024-03-10");
    store.add_entry(NewEntry::manual("Rice", 200.0)).unwrap();
    store
        .add_entry_at(NewEntry::manual("Soup", 80.0), day("2024-01-05"))
        .unwrap();

    assert_eq!(store.clear_all(), 2);
    assert!(store.is_empty());
    assert_eq!(store.total_kcal_on(&day("2024-03-10")), 0.0);
    assert_eq!(store.total_kcal_on(&day("2024-01-05")), 0.0);
}

#[test]
fn history_groups_past_days_newest_first() {
    let store = fixed_store("2024-03-10");
    store
        .add_entry_at(NewEntry::manual("old-a", 100.0), day("2024-03-01"))
        .unwrap();
    store.add_entry(NewEntry::manual("today", 50.0)).unwrap();
    store
        .add_entry_at(NewEntry::manual("recent", 300.0), day("2024-03-09"))
        .unwrap();
    store
        .add_entry_at(NewEntry::manual("old-b", 20.0), day("2024-03-01"))
        .unwrap();
    store
        .add_entry_at(NewEntry::manual("future", 10.0), day("2024-03-11"))
        .unwrap();

    let history = store.entries_before(&day("2024-03-10"));
    let dates = history
        .iter()
        .map(|section| section.date.as_str())
        .collect::<Vec<_>>();
    assert_eq!(dates, vec!["2024-03-09", "2024-03-01"]);
    assert_eq!(names(&history[1].entries), vec!["old-b", "old-a"]);
    assert_eq!(history[1].total_kcal, 120.0);

    let days = store
        .days_with_entries()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    assert_eq!(
        days,
        vec!["2024-03-11", "2024-03-10", "2024-03-09", "2024-03-01"]
    );
}

#[test]
fn concurrent_writers_keep_collection_consistent() {
    let repo = SqliteSnapshotRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let store = Arc::new(EntryStore::open_default(repo).unwrap());

    let handles = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    store
                        .add_entries(vec![
                            NewEntry::manual(format!("w{worker}-a"), 1.0),
                            NewEntry::manual(format!("w{worker}-b"), 1.0),
                        ])
                        .unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = store.entries();
    assert_eq!(entries.len(), 8 * 25 * 2);
    // Each batch stays contiguous: every `-a` is immediately followed by its `-b`.
    for pair in entries.chunks(2) {
        let prefix = pair[0].name.trim_end_matches("-a");
        assert_eq!(pair[1].name, format!("{prefix}-b"));
    }
}

/// Slot repository whose writes can be switched to fail.
#[derive(Clone, Default)]
struct FlakyRepo {
    slots: Arc<Mutex<Option<String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl FlakyRepo {
    fn set_failing(&self, failing: bool) {
        *self.fail_writes.lock().unwrap() = failing;
    }

    fn stored(&self) -> Option<String> {
        self.slots.lock().unwrap().clone()
    }
}

impl SnapshotRepository for FlakyRepo {
    fn load(&self, _slot: &str) -> RepoResult<Option<String>> {
        Ok(self.stored())
    }

    fn save(&mut self, _slot: &str, payload: &str) -> RepoResult<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(RepoError::SchemaNotReady {
                found: 0,
                expected: 1,
            });
        }
        *self.slots.lock().unwrap() = Some(payload.to_string());
        Ok(())
    }
}

#[test]
fn failed_snapshot_keeps_memory_and_reports_status() {
    let repo = FlakyRepo::default();
    let store = EntryStore::open_default(repo.clone()).unwrap();
    store.add_entry(NewEntry::manual("saved", 10.0)).unwrap();
    assert!(store.persistence_status().persisted);

    repo.set_failing(true);
    store.add_entry(NewEntry::manual("unsaved", 20.0)).unwrap();

    assert_eq!(names(&store.entries()), vec!["unsaved", "saved"]);
    let status = store.persistence_status();
    assert!(!status.persisted);
    assert!(status.last_error.is_some());
    assert!(store.flush().is_err());

    // A restart now only sees the last successful snapshot.
    let reopened = EntryStore::open_default(repo.clone()).unwrap();
    assert_eq!(names(&reopened.entries()), vec!["saved"]);

    repo.set_failing(false);
    store.flush().unwrap();
    assert!(store.persistence_status().persisted);
    let reopened = EntryStore::open_default(repo).unwrap();
    assert_eq!(names(&reopened.entries()), vec!["unsaved", "saved"]);
}

#[test]
fn noop_remove_does_not_write_snapshot() {
    let repo = FlakyRepo::default();
    let store = EntryStore::open_default(repo.clone()).unwrap();
    assert!(store.remove_entry(Uuid::new_v4()).is_none());
    assert_eq!(repo.stored(), None);
}

#[test]
fn reopened_store_with_fresh_sequential_ids_skips_taken_ids() {
    let repo = FlakyRepo::default();
    let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()));

    let first = EntryStore::open(repo.clone(), clock.clone(), Arc::new(SequentialIds::new()))
        .unwrap();
    let breakfast = first.add_entry(NewEntry::manual("breakfast", 300.0)).unwrap();
    drop(first);

    let second = EntryStore::open(repo.clone(), clock.clone(), Arc::new(SequentialIds::new()))
        .unwrap();
    let lunch = second.add_entry(NewEntry::manual("lunch", 600.0)).unwrap();
    let batch = second
        .add_entries(vec![NewEntry::manual("tea", 5.0), NewEntry::manual("cake", 350.0)])
        .unwrap();
    drop(second);

    assert_ne!(lunch.id, breakfast.id);
    let reopened = EntryStore::open(repo, clock, Arc::new(SequentialIds::new())).unwrap();
    let ids = reopened
        .entries()
        .iter()
        .map(|entry| entry.id)
        .collect::<HashSet<_>>();
    assert_eq!(ids.len(), 4);
    assert!(batch.iter().all(|entry| entry.id != breakfast.id));
}

/// Id source that always returns the same id.
struct StuckIds;

impl IdGenerator for StuckIds {
    fn next_id(&self) -> EntryId {
        Uuid::from_u128(7)
    }
}

#[test]
fn id_source_that_only_repeats_is_rejected_without_mutation() {
    let repo = FlakyRepo::default();
    let store = EntryStore::open(repo.clone(), Arc::new(SystemClock), Arc::new(StuckIds)).unwrap();
    store.add_entry(NewEntry::manual("first", 100.0)).unwrap();

    let err = store
        .add_entry(NewEntry::manual("second", 200.0))
        .unwrap_err();
    assert!(matches!(err, StoreError::IdCollision(id) if id == Uuid::from_u128(7)));

    let err = store
        .add_entries(vec![NewEntry::manual("a", 1.0), NewEntry::manual("b", 2.0)])
        .unwrap_err();
    assert!(matches!(err, StoreError::IdCollision(_)));

    assert_eq!(names(&store.entries()), vec!["first"]);
    assert!(EntryStore::open_default(repo).is_ok());
}
