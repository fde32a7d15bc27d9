//! Owns every tracked item's scheduling state and the daily new-item counter.
//!
//! Mutations happen in memory first, then the whole snapshot is written through the
//! [`StorageGateway`]. `track`, `rename`, `update_review` and `cleanup` surface write
//! failures; `untrack` and [`ReviewStore::autosave`] only log them.
//!
//! The store is single-writer. Callers sharing it across threads go through
//! [`SharedReviewStore`] so that a mutation and its save never interleave with another.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::clock::Clock;
use crate::daily::{DailyCounter, DailyLimit, DailyLimitInfo};
use crate::due::select_due;
use crate::gateway::StorageGateway;
use crate::item::{ReviewItem, ReviewStatistics, MS_PER_DAY};
use crate::scheduler::{compute_next, Rating, AGAIN_DELAY_MS, AGAIN_INTERVAL, MIN_EASE_FACTOR};
use crate::snapshot::{Snapshot, SnapshotError};

pub type SharedReviewStore = Arc<Mutex<ReviewStore>>;

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// Where the review snapshot is kept.
    pub persistence_path: PathBuf,
    pub new_items_per_day: DailyLimit,
}

pub struct ReviewStore {
    items: BTreeMap<String, ReviewItem>,
    counter: DailyCounter,
    settings: StoreSettings,
    gateway: Arc<dyn StorageGateway>,
    clock: Arc<dyn Clock>,
}

impl ReviewStore {
    /// Loads the snapshot at `settings.persistence_path`, or starts empty when there is none.
    ///
    /// A snapshot that cannot be parsed is discarded: the store starts empty and tries to
    /// write a fresh snapshot once. If that write fails too, it keeps working in memory.
    pub fn open(
        settings: StoreSettings,
        gateway: Arc<dyn StorageGateway>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let mut store = Self {
            items: BTreeMap::new(),
            counter: DailyCounter::new(clock.today()),
            settings,
            gateway,
            clock,
        };
        store.load()?;
        Ok(store)
    }

    fn load(&mut self) -> Result<(), StoreError> {
        let path = self.settings.persistence_path.clone();
        if !self.gateway.exists(&path) {
            debug!("no review data at {}, starting empty", path.display());
            return Ok(());
        }
        let raw = self.gateway.read(&path)?;
        match Snapshot::decode(&raw) {
            Ok(snapshot) => {
                self.restore(snapshot);
                debug!("loaded {} review item(s) from {}", self.items.len(), path.display());
                Ok(())
            }
            Err(SnapshotError::UnsupportedVersion(version)) => Err(StoreError::UnsupportedVersion(version)),
            Err(SnapshotError::Corrupt(e)) => {
                warn!("review data at {} is corrupt ({e}); starting with an empty store", path.display());
                if let Err(e) = self.save() {
                    warn!("could not reinitialise review data: {e}; continuing in memory only");
                }
                Ok(())
            }
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.items = snapshot
            .items
            .into_iter()
            .map(|mut item| {
                item.ease_factor = item.ease_factor.max(MIN_EASE_FACTOR);
                (item.path.clone(), item)
            })
            .collect();
        self.counter = DailyCounter::restore(snapshot.last_reset_date, snapshot.new_cards_reviewed_today);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.items.values().cloned().collect(),
            self.counter.last_reset_date().to_string(),
            self.counter.new_items_reviewed_today(),
        )
    }

    /// Writes the current state.
    pub fn save(&self) -> Result<(), StoreError> {
        let contents = self.snapshot().encode()?;
        self.gateway.write(&self.settings.persistence_path, &contents)?;
        Ok(())
    }

    /// Like [`save`](Self::save), but a failure is only logged.
    pub fn autosave(&self) {
        if let Err(e) = self.save() {
            warn!("autosave failed: {e}");
        }
    }

    /// Starts tracking `id`. Returns false if it was already tracked (nothing changes).
    /// If the save fails the item is not kept.
    pub fn track(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.items.contains_key(id) {
            debug!("{id} is already tracked");
            return Ok(false);
        }
        self.items.insert(id.to_string(), ReviewItem::new(id, self.clock.now_ms()));
        if let Err(e) = self.save() {
            self.items.remove(id);
            return Err(e);
        }
        debug!("tracking {id}");
        Ok(true)
    }

    /// Stops tracking `id`. The removal stands even if it cannot be saved.
    pub fn untrack(&mut self, id: &str) -> bool {
        if self.items.remove(id).is_none() {
            return false;
        }
        debug!("untracked {id}");
        if let Err(e) = self.save() {
            warn!("failed to save after untracking {id}: {e}");
        }
        true
    }

    /// Moves `old`'s scheduling state to `new`, replacing anything tracked as `new`.
    /// Returns false if `old` is not tracked. Rolled back if the save fails.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<bool, StoreError> {
        if old == new {
            return Ok(self.items.contains_key(old));
        }
        let Some(mut item) = self.items.remove(old) else {
            return Ok(false);
        };
        item.path = new.to_string();
        let displaced = self.items.insert(new.to_string(), item);
        if let Err(e) = self.save() {
            if let Some(mut item) = self.items.remove(new) {
                item.path = old.to_string();
                self.items.insert(old.to_string(), item);
            }
            if let Some(displaced) = displaced {
                self.items.insert(new.to_string(), displaced);
            }
            return Err(e);
        }
        debug!("renamed {old} -> {new}");
        Ok(true)
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ReviewItem> {
        self.items.get(id)
    }

    pub fn get_all(&self) -> Vec<ReviewItem> {
        self.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Applies a rating to `id` and saves. Unknown ids are ignored (`Ok(None)`).
    /// A save failure is returned, but the in-memory update stays.
    pub fn update_review(&mut self, id: &str, rating: Rating) -> Result<Option<ReviewItem>, StoreError> {
        let now_ms = self.clock.now_ms();
        let Some(item) = self.items.get_mut(id) else {
            debug!("ignoring rating for untracked {id}");
            return Ok(None);
        };
        let was_new = item.is_new;
        apply_rating(item, rating, now_ms);
        let updated = item.clone();
        if was_new {
            self.counter.record_new_item(self.clock.today());
        }
        debug!(
            "rated {id} {rating}: interval {} ease {} reps {}",
            updated.interval, updated.ease_factor, updated.repetitions
        );
        self.save()?;
        Ok(Some(updated))
    }

    /// Removes every item whose document no longer exists. A predicate error counts as
    /// "does not exist". Saves once if anything was removed; returns how many were.
    pub fn cleanup<F, E>(&mut self, mut exists: F) -> Result<usize, StoreError>
    where
        F: FnMut(&str) -> Result<bool, E>,
        E: Display,
    {
        let missing: Vec<String> = self
            .items
            .keys()
            .filter(|id| match exists(id.as_str()) {
                Ok(found) => !found,
                Err(e) => {
                    debug!("treating {id} as missing: {e}");
                    true
                }
            })
            .cloned()
            .collect();
        for id in &missing {
            self.items.remove(id);
        }
        if !missing.is_empty() {
            info!("removed {} review item(s) for missing documents", missing.len());
            self.save()?;
        }
        Ok(missing.len())
    }

    /// Review queue for now. See [`select_due`].
    pub fn get_due(&self) -> Vec<ReviewItem> {
        select_due(
            self.items.values(),
            self.counter.used_on(self.clock.today()),
            self.settings.new_items_per_day,
            self.clock.now_ms(),
        )
    }

    pub fn get_daily_limit_info(&self) -> DailyLimitInfo {
        self.counter.info(self.clock.today(), self.settings.new_items_per_day)
    }

    pub fn get_statistics(&self) -> ReviewStatistics {
        ReviewStatistics::from_items(self.items.values(), self.clock.now_ms())
    }

    pub fn set_daily_limit(&mut self, limit: DailyLimit) {
        self.settings.new_items_per_day = limit;
    }

    pub fn into_shared(self) -> SharedReviewStore {
        Arc::new(Mutex::new(self))
    }
}

/// Writes a rating's outcome into `item`. "Again" is a fixed short requeue,
/// not the generic one-day reset.
fn apply_rating(item: &mut ReviewItem, rating: Rating, now_ms: i64) {
    let next = compute_next(rating.quality(), item.repetitions, item.ease_factor, item.interval);
    item.ease_factor = next.ease_factor;
    item.last_review_date = Some(now_ms);
    item.is_new = false;
    match rating {
        Rating::Again => {
            item.repetitions = 0;
            item.interval = AGAIN_INTERVAL;
            item.next_review_date = now_ms + AGAIN_DELAY_MS;
        }
        Rating::Hard | Rating::Good | Rating::Easy => {
            item.repetitions = next.repetitions;
            item.interval = next.interval;
            item.next_review_date = now_ms + (next.interval * MS_PER_DAY as f64).round() as i64;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to persist review data: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("failed to serialize review data: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("review data has unsupported version {0}")]
    UnsupportedVersion(u32),
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::clock::ManualClock;
    use crate::gateway::{FsGateway, MemoryGateway};

    const DATA: &str = "reviews.json";

    struct Fixture {
        store: ReviewStore,
        gateway: Arc<MemoryGateway>,
        clock: Arc<ManualClock>,
    }

    fn settings(limit: DailyLimit) -> StoreSettings {
        StoreSettings {
            persistence_path: PathBuf::from(DATA),
            new_items_per_day: limit,
        }
    }

    fn start() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()))
    }

    fn fixture_with(gateway: MemoryGateway, limit: DailyLimit) -> Fixture {
        let gateway = Arc::new(gateway);
        let clock = start();
        let store = ReviewStore::open(settings(limit), gateway.clone(), clock.clone()).unwrap();
        Fixture { store, gateway, clock }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryGateway::new(), DailyLimit::PerDay(20))
    }

    fn saved(gateway: &MemoryGateway) -> Snapshot {
        Snapshot::decode(&gateway.contents(Path::new(DATA)).unwrap()).unwrap()
    }

    #[test]
    fn track_creates_new_item_and_saves() {
        let mut f = fixture();
        assert!(f.store.track("a.md").unwrap());

        let all = f.store.get_all();
        assert_eq!(all.len(), 1);
        let item = &all[0];
        assert!(item.is_new);
        assert_eq!(item.interval, 1.0);
        assert_eq!(item.ease_factor, 2.5);
        assert_eq!(item.repetitions, 0);
        assert_eq!(item.next_review_date, f.clock.now_ms());
        assert_eq!(saved(&f.gateway).items, all);
    }

    #[test]
    fn track_twice_keeps_existing_state() {
        let mut f = fixture();
        f.store.track("a.md").unwrap();
        f.store.update_review("a.md", Rating::Good).unwrap();
        let before = f.store.get("a.md").cloned().unwrap();
        let writes = f.gateway.write_count();

        f.clock.advance(Duration::hours(3));
        assert!(!f.store.track("a.md").unwrap());
        assert_eq!(f.store.get("a.md"), Some(&before));
        assert_eq!(f.gateway.write_count(), writes);
    }

    #[test]
    fn track_rolls_back_when_save_fails() {
        let mut f = fixture();
        f.gateway.set_fail_writes(true);
        assert!(matches!(f.store.track("a.md"), Err(StoreError::Persistence(_))));
        assert!(!f.store.is_tracked("a.md"));
    }

    #[test]
    fn untrack_is_kept_even_if_save_fails() {
        let mut f = fixture();
        f.store.track("a.md").unwrap();
        f.gateway.set_fail_writes(true);
        assert!(f.store.untrack("a.md"));
        assert!(!f.store.is_tracked("a.md"));
        assert!(!f.store.untrack("a.md"));
    }

    #[test]
    fn good_rating_on_mature_item() {
        let gateway = MemoryGateway::with_file(
            DATA,
            r#"{"version":1,"items":[{"path":"a.md","interval":6,"easeFactor":2.5,"repetitions":2,
                "nextReviewDate":0,"lastReviewDate":0,"isNew":false}],"lastResetDate":"","newCardsReviewedToday":0}"#,
        );
        let mut f = fixture_with(gateway, DailyLimit::PerDay(20));
        let now = f.clock.now_ms();

        let item = f.store.update_review("a.md", Rating::Good).unwrap().unwrap();
        assert_eq!(item.ease_factor, 2.4);
        assert_eq!(item.repetitions, 3);
        assert_eq!(item.interval, 14.4);
        assert_eq!(item.last_review_date, Some(now));
        assert_eq!(item.next_review_date, now + 1_244_160_000);
        assert_eq!(f.store.get_daily_limit_info().used, 0);
    }

    #[test]
    fn again_requeues_in_fifteen_minutes() {
        let gateway = MemoryGateway::with_file(
            DATA,
            r#"{"version":1,"items":[{"path":"a.md","interval":6,"easeFactor":2.5,"repetitions":2,
                "nextReviewDate":0,"isNew":false}],"lastResetDate":"","newCardsReviewedToday":0}"#,
        );
        let mut f = fixture_with(gateway, DailyLimit::PerDay(20));
        let now = f.clock.now_ms();

        let item = f.store.update_review("a.md", Rating::Again).unwrap().unwrap();
        assert_eq!(item.repetitions, 0);
        assert_eq!(item.interval, 0.0104);
        assert_eq!(item.ease_factor, 2.5);
        assert_eq!(item.next_review_date, now + 900_000);
        assert!(f.store.get_due().is_empty());

        f.clock.advance(Duration::minutes(15));
        assert_eq!(f.store.get_due().len(), 1);
    }

    #[test]
    fn first_rating_counts_against_daily_budget() {
        let mut f = fixture_with(MemoryGateway::new(), DailyLimit::PerDay(2));
        for id in ["a.md", "b.md", "c.md"] {
            f.store.track(id).unwrap();
        }
        assert_eq!(f.store.get_due().len(), 2);

        let item = f.store.update_review("a.md", Rating::Good).unwrap().unwrap();
        assert!(!item.is_new);
        assert_eq!(f.store.get_daily_limit_info().used, 1);
        assert_eq!(saved(&f.gateway).new_cards_reviewed_today, 1);

        // a.md is scheduled a day out; one new slot is left.
        assert_eq!(f.store.get_due().len(), 1);

        f.store.update_review("a.md", Rating::Good).unwrap();
        assert_eq!(f.store.get_daily_limit_info().used, 1);
    }

    #[test]
    fn daily_budget_resets_on_next_day() {
        let mut f = fixture_with(MemoryGateway::new(), DailyLimit::PerDay(1));
        f.store.track("a.md").unwrap();
        f.store.track("b.md").unwrap();
        f.store.update_review("a.md", Rating::Easy).unwrap();

        let info = f.store.get_daily_limit_info();
        assert_eq!((info.used, info.remaining), (1, 0));
        assert!(f.store.get_due().is_empty());

        f.clock.advance(Duration::days(1));
        let info = f.store.get_daily_limit_info();
        assert_eq!((info.used, info.limit, info.remaining), (0, 1, 1));
        let due: Vec<_> = f.store.get_due().into_iter().map(|i| i.path).collect();
        assert_eq!(due, ["b.md"]);
    }

    #[test]
    fn raising_the_limit_admits_more_new_items() {
        let mut f = fixture_with(MemoryGateway::new(), DailyLimit::PerDay(1));
        f.store.track("a.md").unwrap();
        f.store.track("b.md").unwrap();
        assert_eq!(f.store.get_due().len(), 1);

        f.store.set_daily_limit(DailyLimit::Unlimited);
        assert_eq!(f.store.get_due().len(), 2);
        assert_eq!(f.store.get_daily_limit_info().remaining, -1);
    }

    #[test]
    fn autosave_swallows_failures() {
        let mut f = fixture();
        f.store.track("a.md").unwrap();
        f.gateway.set_fail_writes(true);
        f.store.autosave();
        f.gateway.set_fail_writes(false);
        f.store.autosave();
        assert_eq!(saved(&f.gateway).items.len(), 1);
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut f = fixture();
        assert_eq!(f.store.update_review("nope.md", Rating::Good).unwrap(), None);
        assert!(!f.store.untrack("nope.md"));
        assert!(!f.store.rename("nope.md", "other.md").unwrap());
        assert_eq!(f.gateway.write_count(), 0);
    }

    #[test]
    fn update_review_surfaces_save_failure() {
        let mut f = fixture();
        f.store.track("a.md").unwrap();
        f.gateway.set_fail_writes(true);
        assert!(f.store.update_review("a.md", Rating::Good).is_err());
        assert!(!f.store.get("a.md").unwrap().is_new);
    }

    #[test]
    fn cleanup_removes_missing_and_saves_once() {
        let mut f = fixture();
        for id in ["keep.md", "gone.md", "broken.md"] {
            f.store.track(id).unwrap();
        }
        let writes = f.gateway.write_count();

        let removed = f
            .store
            .cleanup(|id| match id {
                "keep.md" => Ok(true),
                "gone.md" => Ok(false),
                _ => Err(io::Error::other("permission denied")),
            })
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(f.store.get_all().len(), 1);
        assert!(f.store.is_tracked("keep.md"));
        assert_eq!(f.gateway.write_count(), writes + 1);

        let removed = f.store.cleanup(|_| Ok::<_, io::Error>(true)).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(f.gateway.write_count(), writes + 1);
    }

    #[test]
    fn rename_moves_state() {
        let mut f = fixture();
        f.store.track("old.md").unwrap();
        f.store.update_review("old.md", Rating::Good).unwrap();
        let before = f.store.get("old.md").cloned().unwrap();

        assert!(f.store.rename("old.md", "new.md").unwrap());
        assert!(!f.store.is_tracked("old.md"));
        let after = f.store.get("new.md").unwrap();
        assert_eq!(after.path, "new.md");
        assert_eq!(after.interval, before.interval);
        assert_eq!(after.next_review_date, before.next_review_date);
    }

    #[test]
    fn rename_rolls_back_when_save_fails() {
        let mut f = fixture();
        f.store.track("old.md").unwrap();
        f.store.track("new.md").unwrap();
        f.store.update_review("new.md", Rating::Easy).unwrap();
        f.gateway.set_fail_writes(true);

        assert!(f.store.rename("old.md", "new.md").is_err());
        assert!(f.store.get("old.md").unwrap().is_new);
        assert!(!f.store.get("new.md").unwrap().is_new);
    }

    #[test]
    fn statistics_reflect_state() {
        let mut f = fixture();
        for id in ["a.md", "b.md", "c.md"] {
            f.store.track(id).unwrap();
        }
        f.store.update_review("a.md", Rating::Again).unwrap();
        f.store.update_review("b.md", Rating::Good).unwrap();

        let stats = f.store.get_statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.new, 1);
        assert_eq!(stats.learning, 1);
        assert_eq!(stats.review, 1);
        assert_eq!(stats.due, 1);
    }

    #[test]
    fn corrupt_snapshot_is_replaced() {
        let f = fixture_with(MemoryGateway::with_file(DATA, "{ not json"), DailyLimit::PerDay(20));
        assert!(f.store.is_empty());
        assert_eq!(saved(&f.gateway).items, Vec::new());
    }

    #[test]
    fn corrupt_snapshot_with_failing_save_stays_in_memory() {
        let gateway = Arc::new(MemoryGateway::with_file(DATA, "garbage"));
        gateway.set_fail_writes(true);
        let mut store = ReviewStore::open(settings(DailyLimit::Unlimited), gateway.clone(), start()).unwrap();
        assert!(store.is_empty());
        assert!(store.track("a.md").is_err());
        assert_eq!(gateway.contents(Path::new(DATA)).as_deref(), Some("garbage"));
    }

    #[test]
    fn unsupported_version_and_read_errors_surface() {
        let gateway = Arc::new(MemoryGateway::with_file(DATA, r#"{"version": 9}"#));
        let opened = ReviewStore::open(settings(DailyLimit::Unlimited), gateway, start());
        assert!(matches!(opened, Err(StoreError::UnsupportedVersion(9))));

        let gateway = Arc::new(MemoryGateway::with_file(DATA, "{}"));
        gateway.set_fail_reads(true);
        let opened = ReviewStore::open(settings(DailyLimit::Unlimited), gateway, start());
        assert!(matches!(opened, Err(StoreError::Persistence(_))));
    }

    #[test]
    fn loaded_ease_is_floored() {
        let gateway = MemoryGateway::with_file(
            DATA,
            r#"{"version":1,"items":[{"path":"a.md","interval":3,"easeFactor":0.9,"repetitions":4,
                "nextReviewDate":0,"isNew":false}]}"#,
        );
        let f = fixture_with(gateway, DailyLimit::PerDay(20));
        assert_eq!(f.store.get("a.md").unwrap().ease_factor, MIN_EASE_FACTOR);
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            persistence_path: dir.path().join("data").join(DATA),
            new_items_per_day: DailyLimit::PerDay(5),
        };
        let clock = start();

        let mut store = ReviewStore::open(settings.clone(), Arc::new(FsGateway), clock.clone()).unwrap();
        store.track("a.md").unwrap();
        store.track("b.md").unwrap();
        store.update_review("a.md", Rating::Good).unwrap();
        let expected = store.get_all();
        drop(store);

        let store = ReviewStore::open(settings, Arc::new(FsGateway), clock).unwrap();
        assert_eq!(store.get_all(), expected);
        assert_eq!(store.get_daily_limit_info().used, 1);
    }

    #[test]
    fn shared_store_serialises_writers() {
        let f = fixture();
        let shared = f.store.into_shared();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let mut store = shared.lock().unwrap();
                        store.track(&format!("t{t}/n{i}.md")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.lock().unwrap().len(), 100);
        assert_eq!(saved(&f.gateway).items.len(), 100);
    }
}
