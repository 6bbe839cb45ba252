use std::collections::HashMap;

use crate::prepared::PreparedStatement;

/// Counters for [`StatementCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    prepared: PreparedStatement,
    last_used: u64,
}

/// Bounded LRU of prepared statements keyed by CQL text.
///
/// Recency is tracked with a monotonically increasing tick; eviction scans
/// for the smallest tick, which is cheap at the small capacities sessions use.
pub struct StatementCache {
    capacity: usize,
    entries: HashMap<String, Entry>,
    tick: u64,
    stats: CacheStats,
}

impl StatementCache {
    /// Capacity is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, cql: &str) -> Option<PreparedStatement> {
        self.tick += 1;
        match self.entries.get_mut(cql) {
            Some(entry) => {
                entry.last_used = self.tick;
                self.stats.hits += 1;
                Some(entry.prepared.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert, evicting the least recently used entry when full.
    pub fn insert(&mut self, prepared: PreparedStatement) {
        self.tick += 1;
        let cql = prepared.cql().to_string();
        if !self.entries.contains_key(&cql) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
            }
        }
        self.entries.insert(
            cql,
            Entry {
                prepared,
                last_used: self.tick,
            },
        );
    }

    pub fn contains(&self, cql: &str) -> bool {
        self.entries.contains_key(cql)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::prepared::StatementId;
    use crate::statement::Select;

    fn prepared(id: u64, table: &str) -> PreparedStatement {
        PreparedStatement::new(StatementId(id), Select::new(table).into())
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = StatementCache::new(2);
        cache.insert(prepared(1, "a"));
        cache.insert(prepared(2, "b"));
        assert!(cache.get("SELECT * FROM a").is_some());
        cache.insert(prepared(3, "c"));

        assert!(cache.contains("SELECT * FROM a"));
        assert!(!cache.contains("SELECT * FROM b"));
        assert!(cache.contains("SELECT * FROM c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn reinsert_does_not_evict() {
        let mut cache = StatementCache::new(2);
        cache.insert(prepared(1, "a"));
        cache.insert(prepared(2, "b"));
        cache.insert(prepared(3, "a"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("SELECT * FROM a").unwrap().id(), StatementId(3));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let mut cache = StatementCache::new(0);
        assert_eq!(cache.capacity(), 1);
        assert!(cache.get("SELECT * FROM a").is_none());
        cache.insert(prepared(1, "a"));
        assert!(cache.get("SELECT * FROM a").is_some());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn stays_within_capacity(
            capacity in 0usize..6,
            ops in proptest::collection::vec((any::<bool>(), 0u8..10), 0..200),
        ) {
            let mut cache = StatementCache::new(capacity);
            let mut fresh_inserts = 0u64;
            for (i, (is_insert, key)) in ops.into_iter().enumerate() {
                let table = format!("t{key}");
                let cql = format!("SELECT * FROM {table}");
                if is_insert {
                    if !cache.contains(&cql) {
                        fresh_inserts += 1;
                    }
                    cache.insert(prepared(i as u64, &table));
                    prop_assert!(cache.contains(&cql));
                } else {
                    let hit = cache.contains(&cql);
                    prop_assert_eq!(cache.get(&cql).is_some(), hit);
                }
                prop_assert!(cache.len() <= cache.capacity());
            }
            prop_assert_eq!(fresh_inserts, cache.len() as u64 + cache.stats().evictions);
        }
    }
}
