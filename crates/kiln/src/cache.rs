//! The query results cache.
//!
//! Cached entries hold the raw rows of one execution; a hit is reassembled
//! like a fresh result set, so the identity map still decides which
//! instances a cached query returns. Staleness is decided by per-table
//! update timestamps kept by the session factory.

use kiln_core::{driver::Rows, schema::db::TableId};

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// Storage for cached query results, shared by every session of a [`Db`].
///
/// [`Db`]: crate::Db
pub trait CacheRegion: Debug + Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<Arc<CachedRows>>;

    fn put(&self, key: String, rows: Arc<CachedRows>);

    fn evict(&self, key: &str);

    fn clear(&self);
}

/// Rows of a cached execution and the logical time they were read at.
#[derive(Debug)]
pub struct CachedRows {
    pub timestamp: u64,
    pub rows: Rows,
}

/// Entries an [`InMemoryRegion`] keeps unless told otherwise.
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// A region kept in process memory. Once full, storing an entry evicts the
/// least recently used one.
#[derive(Debug)]
pub struct InMemoryRegion {
    max_entries: usize,

    /// Least recently used first
    entries: Mutex<IndexMap<String, Arc<CachedRows>>>,
}

impl InMemoryRegion {
    /// A region of up to 10 000 entries.
    pub fn new() -> InMemoryRegion {
        InMemoryRegion::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> InMemoryRegion {
        InMemoryRegion {
            max_entries: max_entries.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRegion {
    fn default() -> InMemoryRegion {
        InMemoryRegion::new()
    }
}

impl CacheRegion for InMemoryRegion {
    fn get(&self, key: &str) -> Option<Arc<CachedRows>> {
        let mut entries = self.entries.lock();
        let rows = entries.shift_remove(key)?;
        entries.insert(key.to_string(), rows.clone());
        Some(rows)
    }

    fn put(&self, key: String, rows: Arc<CachedRows>) {
        let mut entries = self.entries.lock();
        entries.shift_remove(&key);
        while entries.len() >= self.max_entries {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::trace!(key = %evicted, "query cache full; evicting");
            }
        }
        entries.insert(key, rows);
    }

    fn evict(&self, key: &str) {
        self.entries.lock().shift_remove(key);
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Last mutation time of each table.
///
/// Time is a counter: every read or invalidation takes the next tick, so a
/// result read before a mutation is always older than it.
#[derive(Debug, Default)]
pub(crate) struct UpdateTimestamps {
    clock: AtomicU64,
    tables: Mutex<HashMap<TableId, u64>>,
}

impl UpdateTimestamps {
    pub(crate) fn next_timestamp(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn invalidate<'a>(&self, tables: impl IntoIterator<Item = &'a TableId>) {
        let now = self.next_timestamp();
        let mut guard = self.tables.lock();
        for table in tables {
            tracing::trace!(?table, now, "invalidating cached results");
            guard.insert(*table, now);
        }
    }

    /// Returns `true` if none of `tables` changed after `timestamp`.
    pub(crate) fn is_up_to_date(&self, tables: &IndexSet<TableId>, timestamp: u64) -> bool {
        let guard = self.tables.lock();
        tables
            .iter()
            .all(|table| guard.get(table).map_or(true, |changed| *changed < timestamp))
    }
}

/// Key of a cached result: the SQL and every bound value, pagination
/// included.
pub(crate) fn cache_key(sql: &str, params: &[kiln_core::stmt::Value]) -> String {
    format!("{sql}|{params:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::stmt::{Value, ValueRecord};

    #[test]
    fn region_round_trip() {
        let region = InMemoryRegion::new();
        let key = cache_key("SELECT 1", &[Value::I64(1)]);
        assert!(region.get(&key).is_none());

        region.put(
            key.clone(),
            Arc::new(CachedRows {
                timestamp: 1,
                rows: vec![ValueRecord::from_vec(vec![Value::I64(1)])],
            }),
        );
        assert_eq!(region.get(&key).unwrap().rows.len(), 1);

        region.evict(&key);
        assert!(region.is_empty());
    }

    #[test]
    fn full_regions_evict_the_least_recently_used() {
        let region = InMemoryRegion::with_max_entries(2);
        let rows = || {
            Arc::new(CachedRows {
                timestamp: 1,
                rows: vec![],
            })
        };

        region.put("a".into(), rows());
        region.put("b".into(), rows());
        assert!(region.get("a").is_some());

        region.put("c".into(), rows());
        assert_eq!(region.len(), 2);
        assert!(region.get("b").is_none());
        assert!(region.get("a").is_some());
        assert!(region.get("c").is_some());

        // Replacing an entry does not evict another
        region.put("c".into(), rows());
        assert_eq!(region.len(), 2);
    }

    #[test]
    fn results_read_before_a_mutation_are_stale() {
        let timestamps = UpdateTimestamps::default();
        let tables: IndexSet<_> = [TableId(0), TableId(1)].into_iter().collect();

        let read = timestamps.next_timestamp();
        assert!(timestamps.is_up_to_date(&tables, read));

        timestamps.invalidate(&[TableId(2)]);
        assert!(timestamps.is_up_to_date(&tables, read));

        timestamps.invalidate(&[TableId(1)]);
        assert!(!timestamps.is_up_to_date(&tables, read));

        let reread = timestamps.next_timestamp();
        assert!(timestamps.is_up_to_date(&tables, reread));
    }

    #[test]
    fn keys_distinguish_bindings() {
        assert_ne!(
            cache_key("SELECT ?1", &[Value::I64(1)]),
            cache_key("SELECT ?1", &[Value::I64(2)])
        );
    }
}
