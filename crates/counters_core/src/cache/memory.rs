use super::CounterCache;
use crate::model::counter::Counter;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct CacheEntry {
    counter: Counter,
    expires_at: Instant,
}

/// Process-local cache backed by a mutex-guarded map.
///
/// Expired entries are dropped lazily on lookup.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // Entries are plain data; a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CounterCache for MemoryCache {
    fn get(&self, name: &str) -> Option<Counter> {
        let mut entries = self.lock();
        match entries.get(name) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.counter.clone()),
            Some(_) => {
                entries.remove(name);
                None
            }
            None => None,
        }
    }

    fn put(&self, name: &str, counter: &Counter, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return;
        };
        self.lock().insert(
            name.to_string(),
            CacheEntry {
                counter: counter.clone(),
                expires_at,
            },
        );
    }

    fn invalidate(&self, name: &str) {
        self.lock().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryCache;
    use crate::cache::CounterCache;
    use crate::model::counter::Counter;
    use std::time::Duration;

    fn counter(value: i64) -> Counter {
        Counter {
            id: 7,
            key: "views".to_string(),
            name: "Views".to_string(),
            initial_value: 0,
            value,
            step: 1,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn returns_entry_until_invalidated() {
        let cache = MemoryCache::new();
        cache.put("counters:views", &counter(3), Duration::from_secs(60));

        assert_eq!(cache.get("counters:views").map(|c| c.value), Some(3));
        assert!(cache.get("counters:other").is_none());

        cache.invalidate("counters:views");
        assert!(cache.get("counters:views").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_dropped_on_lookup() {
        let cache = MemoryCache::new();
        cache.put("counters:views", &counter(3), Duration::ZERO);

        assert!(cache.get("counters:views").is_none());
        assert_eq!(cache.len(), 0);
    }
}
