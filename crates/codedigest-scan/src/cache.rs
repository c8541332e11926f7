//! Memoized directory listings.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use codedigest_core::FileDescriptor;

/// A hydrated directory listing.
///
/// Entries are shared with the cache; the selection set belongs to this
/// value only and always starts empty.
#[derive(Debug, Clone)]
pub struct HydratedListing {
    /// Absolute directory path.
    pub directory: PathBuf,
    /// Immediate children in lexicographic order.
    pub entries: Arc<[FileDescriptor]>,
    selected: BTreeSet<usize>,
}

impl HydratedListing {
    fn new(directory: PathBuf, entries: Arc<[FileDescriptor]>) -> Self {
        Self {
            directory,
            entries,
            selected: BTreeSet::new(),
        }
    }

    /// Mark the entry at `index` as selected. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        index < self.entries.len() && self.selected.insert(index)
    }

    /// Clear the selection mark at `index`.
    pub fn deselect(&mut self, index: usize) -> bool {
        self.selected.remove(&index)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// Selected entries in listing order.
    pub fn selected(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.selected.iter().filter_map(|&i| self.entries.get(i))
    }

    /// Number of selected entries.
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }
}

/// Identifies one cached listing: the directory plus a fingerprint of the
/// rules that filtered it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingKey {
    pub directory: PathBuf,
    pub rules: u64,
}

impl ListingKey {
    pub fn new(directory: impl Into<PathBuf>, rules: u64) -> Self {
        Self {
            directory: directory.into(),
            rules,
        }
    }
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Option<Arc<[FileDescriptor]>>>,
    free: Vec<usize>,
}

impl Arena {
    fn put(&mut self, entries: Arc<[FileDescriptor]>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entries);
                slot
            }
            None => {
                self.slots.push(Some(entries));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot)
            && entry.take().is_some()
        {
            self.free.push(slot);
        }
    }
}

/// Process-lifetime cache of directory listings.
///
/// Listings live in an arena of slots; the key index points into it. A slot
/// freed by `invalidate` is reused by the next insert and `clear` resets
/// both.
#[derive(Debug, Default)]
pub struct ListingCache {
    index: DashMap<ListingKey, usize>,
    arena: RwLock<Arena>,
}

impl ListingCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached listing for `key`, loading it on a miss.
    ///
    /// The loader runs without any lock held. When two callers miss on the
    /// same key, the first insert wins and both get its entries.
    pub fn hydrate<E>(
        &self,
        key: &ListingKey,
        load: impl FnOnce(&Path) -> Result<Vec<FileDescriptor>, E>,
    ) -> Result<HydratedListing, E> {
        if let Some(entries) = self.get(key) {
            return Ok(HydratedListing::new(key.directory.clone(), entries));
        }

        let loaded: Arc<[FileDescriptor]> = load(&key.directory)?.into();
        let entries = self.insert(key, loaded);
        Ok(HydratedListing::new(key.directory.clone(), entries))
    }

    /// Cached entries for `key`, if present.
    pub fn get(&self, key: &ListingKey) -> Option<Arc<[FileDescriptor]>> {
        let slot = *self.index.get(key)?;
        let arena = self.arena.read().ok()?;
        arena.slots.get(slot).cloned().flatten()
    }

    fn insert(&self, key: &ListingKey, entries: Arc<[FileDescriptor]>) -> Arc<[FileDescriptor]> {
        let Ok(mut arena) = self.arena.write() else {
            return entries;
        };
        if let Some(existing) = self
            .index
            .get(key)
            .and_then(|slot| arena.slots.get(*slot).cloned().flatten())
        {
            return existing;
        }
        let slot = arena.put(Arc::clone(&entries));
        self.index.insert(key.clone(), slot);
        entries
    }

    /// Forget every listing of `directory`, whatever rules produced it.
    pub fn invalidate(&self, directory: &Path) -> bool {
        let Ok(mut arena) = self.arena.write() else {
            return false;
        };
        let mut released = Vec::new();
        self.index.retain(|key, slot| {
            let keep = key.directory != directory;
            if !keep {
                released.push(*slot);
            }
            keep
        });
        for slot in &released {
            arena.release(*slot);
        }
        !released.is_empty()
    }

    /// Drop every listing.
    pub fn clear(&self) {
        let Ok(mut arena) = self.arena.write() else {
            return;
        };
        self.index.clear();
        *arena = Arena::default();
    }

    /// Number of indexed listings.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Arena slots in use or free, for diagnostics.
    pub fn capacity(&self) -> usize {
        self.arena.read().map(|arena| arena.slots.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;

    fn key(dir: &str) -> ListingKey {
        ListingKey::new(dir, 0)
    }

    fn listing() -> Vec<FileDescriptor> {
        vec![
            FileDescriptor::file("/r/a.rs", "a.rs", 1, 0),
            FileDescriptor::file("/r/b.rs", "b.rs", 2, 0),
        ]
    }

    #[test]
    fn test_hydrate_loads_once() {
        let cache = ListingCache::new();
        let loads = Cell::new(0);
        let load = |_: &Path| {
            loads.set(loads.get() + 1);
            Ok::<_, Infallible>(listing())
        };

        let first = cache.hydrate(&key("/r"), load).unwrap();
        let second = cache.hydrate(&key("/r"), load).unwrap();

        assert_eq!(loads.get(), 1);
        assert_eq!(first.entries.len(), 2);
        assert!(Arc::ptr_eq(&first.entries, &second.entries));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_selection_is_not_shared() {
        let cache = ListingCache::new();
        let load = |_: &Path| Ok::<_, Infallible>(listing());

        let mut first = cache.hydrate(&key("/r"), load).unwrap();
        assert!(first.select(1));
        assert!(!first.select(5));
        assert_eq!(first.selected().next().map(|f| f.name()), Some("b.rs"));

        let second = cache.hydrate(&key("/r"), load).unwrap();
        assert_eq!(second.selected_count(), 0);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ListingCache::new();
        let load = |_: &Path| Ok::<_, Infallible>(listing());
        cache.hydrate(&key("/r"), load).unwrap();
        cache.hydrate(&key("/s"), load).unwrap();

        assert!(cache.invalidate(Path::new("/r")));
        assert!(cache.get(&key("/r")).is_none());
        assert!(cache.get(&key("/s")).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_loader_error_is_not_cached() {
        let cache = ListingCache::new();
        let result = cache.hydrate(&key("/r"), |_| Err::<Vec<FileDescriptor>, _>("boom"));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_rules_are_part_of_the_key() {
        let cache = ListingCache::new();
        let all = |_: &Path| Ok::<_, Infallible>(listing());
        let filtered = |_: &Path| Ok::<_, Infallible>(listing()[1..].to_vec());

        let first = cache.hydrate(&ListingKey::new("/r", 1), filtered).unwrap();
        let second = cache.hydrate(&ListingKey::new("/r", 2), all).unwrap();

        assert_eq!(first.entries.len(), 1);
        assert_eq!(second.entries.len(), 2);
        assert_eq!(cache.len(), 2);

        assert!(cache.invalidate(Path::new("/r")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidated_slots_are_reused() {
        let cache = ListingCache::new();
        let load = |_: &Path| Ok::<_, Infallible>(listing());

        for _ in 0..5 {
            cache.hydrate(&key("/r"), load).unwrap();
            cache.invalidate(Path::new("/r"));
        }
        cache.hydrate(&key("/s"), load).unwrap();

        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_misses_share_one_slot() {
        let cache = ListingCache::new();
        let load = |_: &Path| Ok::<_, Infallible>(listing());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| cache.hydrate(&key("/r"), load).unwrap());
            }
        });

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.capacity(), 1);
    }
}
