//! Entry store: the current identity's diary entries.
//!
//! The store keeps an in-memory list ordered by creation time, newest first,
//! and mirrors every mutation to an `EntryBackend`. Mutations are applied in
//! memory first; if the backend refuses, the list is restored to what it was
//! before the call and the error is returned.
//!
//! The store never loads on its own. It is told about identity transitions
//! through `IdentityObserver::identity_changed` and reloads from scratch each
//! time, so entries of one identity are never visible to another.

use crate::backend::EntryBackend;
use crate::clock::Clock;
use crate::errors::{AppError, AppResult, AuthError};
use crate::model::{require_text, DiaryEntry, EntryPatch, NewEntry};
use crate::session::{IdentityChange, IdentityObserver};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Counts reported by `EntryStore::import`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

pub struct EntryStore {
    backend: Box<dyn EntryBackend>,
    clock: Rc<dyn Clock>,
    owner: Option<String>,
    entries: Vec<DiaryEntry>,
}

impl EntryStore {
    pub fn new(backend: Box<dyn EntryBackend>, clock: Rc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            owner: None,
            entries: Vec::new(),
        }
    }

    /// Id of the identity whose entries are held, if any.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Snapshot of the entries, newest first.
    pub fn entries(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&DiaryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The entry dated today in local time. With several, the newest created.
    pub fn today_entry(&self) -> Option<&DiaryEntry> {
        self.entry_for_date(self.clock.today())
    }

    pub fn entry_for_date(&self, date: NaiveDate) -> Option<&DiaryEntry> {
        self.entries.iter().find(|e| e.date == date)
    }

    pub fn add(&mut self, new_entry: NewEntry) -> AppResult<DiaryEntry> {
        let owner = self.require_owner()?.to_string();
        let title = require_text("title", &new_entry.title)?;
        let content = require_text("content", &new_entry.content)?;
        let now = self.clock.now();

        let entry = DiaryEntry {
            id: Uuid::new_v4().to_string(),
            user_id: owner,
            date: new_entry.date,
            title,
            mood: new_entry.mood,
            content,
            created_at: now,
            updated_at: now,
        };

        let snapshot = self.entries.clone();
        self.insert_sorted(entry.clone());
        let stored = self.persist(snapshot, |backend| backend.insert(&entry))?;
        self.replace_stored(&entry.id, stored.clone());
        debug!("Added entry {} for {}", stored.id, stored.date);
        Ok(stored)
    }

    /// Merges `patch` into entry `id` and refreshes its update time.
    pub fn update(&mut self, id: &str, patch: EntryPatch) -> AppResult<DiaryEntry> {
        self.require_owner()?;
        let index = self.index_of(id)?;

        let mut updated = self.entries[index].clone();
        patch.apply_to(&mut updated)?;
        updated.updated_at = self.clock.now();

        let snapshot = self.entries.clone();
        self.entries[index] = updated.clone();
        let stored = self.persist(snapshot, |backend| backend.update(&updated))?;
        self.replace_stored(id, stored.clone());
        debug!("Updated entry {}", id);
        Ok(stored)
    }

    pub fn delete(&mut self, id: &str) -> AppResult<()> {
        let owner = self.require_owner()?.to_string();
        let index = self.index_of(id)?;

        let snapshot = self.entries.clone();
        self.entries.remove(index);
        self.persist(snapshot, |backend| backend.delete(&owner, id))?;
        debug!("Deleted entry {}", id);
        Ok(())
    }

    /// Deletes every entry of the current identity. Returns how many went.
    pub fn clear_all(&mut self) -> AppResult<usize> {
        let owner = self.require_owner()?.to_string();
        let snapshot = std::mem::take(&mut self.entries);
        let removed = snapshot.len();
        self.persist(snapshot, |backend| backend.clear(&owner))?;
        info!("Cleared {} entries", removed);
        Ok(removed)
    }

    /// Adds previously exported entries to the current identity.
    ///
    /// Entries whose id is already present are skipped. Imported entries are
    /// re-owned by the current identity and keep their timestamps.
    pub fn import(&mut self, incoming: Vec<DiaryEntry>) -> AppResult<ImportReport> {
        let owner = self.require_owner()?.to_string();
        let mut seen: HashSet<String> = self.entries.iter().map(|e| e.id.clone()).collect();
        let mut report = ImportReport::default();

        for mut entry in incoming {
            if !seen.insert(entry.id.clone()) {
                report.skipped += 1;
                continue;
            }
            entry.user_id = owner.clone();

            let snapshot = self.entries.clone();
            self.insert_sorted(entry.clone());
            let stored = self.persist(snapshot, |backend| backend.insert(&entry))?;
            self.replace_stored(&entry.id, stored);
            report.imported += 1;
        }

        info!(
            "Imported {} entries, skipped {}",
            report.imported, report.skipped
        );
        Ok(report)
    }

    fn require_owner(&self) -> AppResult<&str> {
        self.owner
            .as_deref()
            .ok_or(AppError::Auth(AuthError::NotSignedIn))
    }

    fn index_of(&self, id: &str) -> AppResult<usize> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Inserts before every entry created at the same instant or earlier.
    fn insert_sorted(&mut self, entry: DiaryEntry) {
        let index = self
            .entries
            .partition_point(|e| e.created_at > entry.created_at);
        self.entries.insert(index, entry);
    }

    /// Swaps the optimistic record `id` for the one the backend handed back,
    /// keeping the order.
    fn replace_stored(&mut self, id: &str, stored: DiaryEntry) {
        if let Some(index) = self.entries.iter().position(|e| e.id == id) {
            if self.entries[index].created_at == stored.created_at {
                self.entries[index] = stored;
                return;
            }
            self.entries.remove(index);
        }
        self.insert_sorted(stored);
    }

    fn persist<T, F>(&mut self, snapshot: Vec<DiaryEntry>, write: F) -> AppResult<T>
    where
        F: FnOnce(&dyn EntryBackend) -> AppResult<T>,
    {
        match write(self.backend.as_ref()) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Persisting entries failed, rolling back: {}", e);
                self.entries = snapshot;
                Err(e)
            }
        }
    }

    fn reload(&mut self, owner: &str) -> AppResult<()> {
        let mut loaded = self.backend.load(owner)?;
        if let Some(stranger) = loaded.iter().find(|e| e.user_id != owner) {
            return Err(AppError::Storage(crate::backend::records::malformed(
                "entries",
                format!("entry {} belongs to another user", stranger.id),
            )));
        }
        // Stable, so equal timestamps keep backing-store order.
        loaded.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.entries = loaded;
        debug!("Loaded {} entries", self.entries.len());
        Ok(())
    }
}

impl IdentityObserver for EntryStore {
    /// Drops everything held, then loads the new identity's entries.
    fn identity_changed(&mut self, change: &IdentityChange) -> AppResult<()> {
        self.entries.clear();
        self.owner = change.current.as_ref().map(|identity| identity.id.clone());

        match self.owner.clone() {
            Some(owner) => self.reload(&owner),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TickingClock;
    use crate::errors::StorageError;
    use crate::model::{Identity, Mood};
    use chrono::{Duration, TimeZone, Utc};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// Backend keeping entries per user in memory, with a failure switch.
    #[derive(Default)]
    struct MemoryEntries {
        rows: RefCell<HashMap<String, Vec<DiaryEntry>>>,
        fail_writes: Cell<bool>,
    }

    impl MemoryEntries {
        fn refuse(&self) -> AppResult<()> {
            if self.fail_writes.get() {
                return Err(StorageError::UnexpectedStatus {
                    status: 503,
                    body: "unavailable".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    impl EntryBackend for MemoryEntries {
        fn load(&self, user_id: &str) -> AppResult<Vec<DiaryEntry>> {
            Ok(self.rows.borrow().get(user_id).cloned().unwrap_or_default())
        }

        fn insert(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
            self.refuse()?;
            self.rows
                .borrow_mut()
                .entry(entry.user_id.clone())
                .or_default()
                .push(entry.clone());
            Ok(entry.clone())
        }

        fn update(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
            self.refuse()?;
            let mut rows = self.rows.borrow_mut();
            let list = rows.entry(entry.user_id.clone()).or_default();
            let slot = list
                .iter_mut()
                .find(|e| e.id == entry.id)
                .ok_or_else(|| AppError::NotFound(entry.id.clone()))?;
            *slot = entry.clone();
            Ok(entry.clone())
        }

        fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
            self.refuse()?;
            let mut rows = self.rows.borrow_mut();
            let list = rows.entry(user_id.to_string()).or_default();
            let before = list.len();
            list.retain(|e| e.id != id);
            if list.len() == before {
                return Err(AppError::NotFound(id.to_string()));
            }
            Ok(())
        }

        fn clear(&self, user_id: &str) -> AppResult<()> {
            self.refuse()?;
            self.rows.borrow_mut().remove(user_id);
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn store_with(backend: Rc<MemoryEntries>) -> EntryStore {
        let clock = TickingClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            Duration::seconds(1),
            today(),
        );
        EntryStore::new(Box::new(SharedMemory(backend)), Rc::new(clock))
    }

    /// Lets a test keep a handle on the backend the store owns.
    struct SharedMemory(Rc<MemoryEntries>);

    impl EntryBackend for SharedMemory {
        fn load(&self, user_id: &str) -> AppResult<Vec<DiaryEntry>> {
            self.0.load(user_id)
        }
        fn insert(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
            self.0.insert(entry)
        }
        fn update(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
            self.0.update(entry)
        }
        fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
            self.0.delete(user_id, id)
        }
        fn clear(&self, user_id: &str) -> AppResult<()> {
            self.0.clear(user_id)
        }
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            name: id.to_string(),
            email: format!("{}@example.com", id),
            avatar: None,
            sheet_id: None,
        }
    }

    fn sign_in(store: &mut EntryStore, id: &str) {
        let change = IdentityChange {
            previous: store.owner().map(identity),
            current: Some(identity(id)),
        };
        store.identity_changed(&change).unwrap();
    }

    fn new_entry(date: NaiveDate, title: &str) -> NewEntry {
        NewEntry {
            date,
            title: title.to_string(),
            mood: Mood::Happy,
            content: "Hello".to_string(),
        }
    }

    fn assert_sorted(store: &EntryStore) {
        let entries = store.entries();
        assert!(entries
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[test]
    fn test_add_requires_identity() {
        let mut store = store_with(Rc::default());
        let result = store.add(new_entry(today(), "Day One"));
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::NotSignedIn))
        ));
    }

    #[test]
    fn test_add_then_today_entry_returns_it() {
        let mut store = store_with(Rc::default());
        sign_in(&mut store, "u1");

        let added = store.add(new_entry(today(), "  Day One ")).unwrap();
        assert_eq!(added.title, "Day One");
        assert_eq!(added.created_at, added.updated_at);
        assert_eq!(store.today_entry(), Some(&added));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_rejects_blank_fields() {
        let mut store = store_with(Rc::default());
        sign_in(&mut store, "u1");

        let mut blank = new_entry(today(), "T");
        blank.content = "   ".to_string();
        assert!(matches!(store.add(blank), Err(AppError::Validation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_entries_stay_newest_first() {
        let mut store = store_with(Rc::default());
        sign_in(&mut store, "u1");
        for day in 1..=4 {
            let date = NaiveDate::from_ymd_opt(2023, 12, day).unwrap();
            store.add(new_entry(date, &format!("Entry {}", day))).unwrap();
            assert_sorted(&store);
        }
        assert_eq!(store.entries()[0].title, "Entry 4");
    }

    #[test]
    fn test_duplicate_dates_are_allowed_and_newest_wins_today() {
        let mut store = store_with(Rc::default());
        sign_in(&mut store, "u1");
        store.add(new_entry(today(), "First")).unwrap();
        store.add(new_entry(today(), "Second")).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.today_entry().map(|e| e.title.as_str()), Some("Second"));
    }

    #[test]
    fn test_update_changes_only_patched_fields() {
        let mut store = store_with(Rc::default());
        sign_in(&mut store, "u1");
        let original = store.add(new_entry(today(), "Day One")).unwrap();

        let updated = store
            .update(
                &original.id,
                EntryPatch {
                    title: Some("X".to_string()),
                    ..EntryPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "X");
        assert_eq!(updated.content, original.content);
        assert_eq!(updated.mood, original.mood);
        assert_eq!(updated.date, original.date);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at > original.updated_at);
        assert_eq!(store.get(&original.id), Some(&updated));
    }

    #[test]
    fn test_update_and_delete_unknown_id_is_not_found() {
        let mut store = store_with(Rc::default());
        sign_in(&mut store, "u1");
        assert!(matches!(
            store.update("missing", EntryPatch::default()),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(store.delete("missing"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_delete_removes_exactly_one() {
        let mut store = store_with(Rc::default());
        sign_in(&mut store, "u1");
        let a = store.add(new_entry(today(), "A")).unwrap();
        let b = store.add(new_entry(today(), "B")).unwrap();

        store.delete(&a.id).unwrap();
        assert!(store.get(&a.id).is_none());
        assert!(store.get(&b.id).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let backend = Rc::new(MemoryEntries::default());
        let mut store = store_with(Rc::clone(&backend));
        sign_in(&mut store, "u1");
        let kept = store.add(new_entry(today(), "Kept")).unwrap();
        let before = store.entries().to_vec();

        backend.fail_writes.set(true);
        assert!(store.add(new_entry(today(), "Lost")).is_err());
        assert!(store
            .update(
                &kept.id,
                EntryPatch {
                    title: Some("Changed".to_string()),
                    ..EntryPatch::default()
                }
            )
            .is_err());
        assert!(store.delete(&kept.id).is_err());
        assert!(store.clear_all().is_err());

        assert_eq!(store.entries(), before.as_slice());
    }

    #[test]
    fn test_identity_change_never_leaks_entries() {
        let backend = Rc::new(MemoryEntries::default());
        let mut store = store_with(Rc::clone(&backend));
        sign_in(&mut store, "alice");
        store.add(new_entry(today(), "Alice's")).unwrap();

        sign_in(&mut store, "bob");
        assert!(store.is_empty());
        store.add(new_entry(today(), "Bob's")).unwrap();

        sign_in(&mut store, "alice");
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()[0].title, "Alice's");

        store
            .identity_changed(&IdentityChange {
                previous: Some(identity("alice")),
                current: None,
            })
            .unwrap();
        assert!(store.is_empty());
        assert!(store.owner().is_none());
    }

    #[test]
    fn test_reload_sorts_backing_rows() {
        let backend = Rc::new(MemoryEntries::default());
        let mut store = store_with(Rc::clone(&backend));
        sign_in(&mut store, "u1");
        store.add(new_entry(today(), "Old")).unwrap();
        store.add(new_entry(today(), "New")).unwrap();

        // Backing store keeps insertion order, oldest first.
        sign_in(&mut store, "u1");
        assert_eq!(store.entries()[0].title, "New");
        assert_sorted(&store);
    }

    #[test]
    fn test_clear_all_empties_memory_and_backend() {
        let backend = Rc::new(MemoryEntries::default());
        let mut store = store_with(Rc::clone(&backend));
        sign_in(&mut store, "u1");
        store.add(new_entry(today(), "A")).unwrap();
        store.add(new_entry(today(), "B")).unwrap();

        assert_eq!(store.clear_all().unwrap(), 2);
        assert!(store.is_empty());
        assert!(backend.load("u1").unwrap().is_empty());
    }

    #[test]
    fn test_import_skips_known_ids_and_reowns() {
        let mut store = store_with(Rc::default());
        sign_in(&mut store, "u1");
        let existing = store.add(new_entry(today(), "Existing")).unwrap();

        let mut foreign = existing.clone();
        foreign.id = "imported-1".to_string();
        foreign.user_id = "someone-else".to_string();
        foreign.created_at = existing.created_at - Duration::days(3);

        let report = store
            .import(vec![existing.clone(), foreign.clone(), foreign])
            .unwrap();
        assert_eq!(
            report,
            ImportReport {
                imported: 1,
                skipped: 2
            }
        );
        let imported = store.get("imported-1").unwrap();
        assert_eq!(imported.user_id, "u1");
        assert_eq!(store.entries().last().map(|e| e.id.as_str()), Some("imported-1"));
    }
}
