use mini_moka::sync::Cache;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::models::{RecordId, RequestKey};

/// Last successful normalized result per request key.
///
/// Entries never expire; they are dropped by `clear`, which the service
/// calls whenever a write makes cached reads stale. Keys are scoped by a
/// generation counter so a clear takes effect immediately, independent of
/// the underlying cache's eviction bookkeeping.
pub struct ResponseCache {
    entries: Cache<(u64, RequestKey), Value>,
    generation: AtomicU64,
}

impl ResponseCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_entries).build(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<Value> {
        let generation = self.generation.load(Ordering::SeqCst);
        self.entries.get(&(generation, key.clone()))
    }

    pub fn set(&self, key: &RequestKey, value: Value) {
        self.set_at(self.generation(), key, value);
    }

    /// Current generation. Capture it before a network call and store the
    /// answer with `set_at`, so a `clear` that lands mid-call discards it.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn set_at(&self, generation: u64, key: &RequestKey, value: Value) {
        self.entries.insert((generation, key.clone()), value);
    }

    /// Whether any live entry holds a record with `id`, either as the
    /// whole payload or as an element of a list payload.
    pub fn contains_record(&self, id: &RecordId) -> bool {
        let generation = self.generation();
        self.entries.iter().any(|entry| {
            entry.key().0 == generation
                && match entry.value() {
                    Value::Array(items) => items.iter().any(|item| value_has_id(item, id)),
                    other => value_has_id(other, id),
                }
        })
    }

    pub fn clear(&self) {
        let previous = self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.invalidate_all();
        debug!(generation = previous + 1, "Response cache cleared");
    }
}

fn value_has_id(value: &Value, id: &RecordId) -> bool {
    value.get("id").and_then(RecordId::from_value).as_ref() == Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListParams, RequestOptions};
    use serde_json::json;

    #[test]
    fn test_cache_hit_for_same_logical_request() {
        let cache = ResponseCache::new(16);
        let first = RequestKey::new("/vendors", &RequestOptions::get().with_query(&ListParams::new().status("active")));
        let again = RequestKey::new("/vendors", &RequestOptions::get().with_query(&ListParams::new().status("active")));

        assert!(cache.get(&first).is_none());
        cache.set(&first, json!([{"id": 1}]));
        assert_eq!(cache.get(&again), Some(json!([{"id": 1}])));
    }

    #[test]
    fn test_clear_drops_every_entry() {
        let cache = ResponseCache::new(16);
        let key = RequestKey::new("/vendors", &RequestOptions::get());
        cache.set(&key, json!([]));
        cache.clear();
        assert!(cache.get(&key).is_none());

        cache.set(&key, json!([{"id": 2}]));
        assert_eq!(cache.get(&key), Some(json!([{"id": 2}])));
    }

    #[test]
    fn test_answer_from_before_a_clear_is_not_served() {
        let cache = ResponseCache::new(16);
        let key = RequestKey::new("/vendors", &RequestOptions::get());

        let before_call = cache.generation();
        cache.clear();
        cache.set_at(before_call, &key, json!([{"id": 1}]));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_contains_record_in_lists_and_objects() {
        let cache = ResponseCache::new(16);
        let list = RequestKey::new("/vendors", &RequestOptions::get());
        let single = RequestKey::new("/vendors/9", &RequestOptions::get());
        cache.set(&list, json!([{"id": 7}, {"id": 8}]));
        cache.set(&single, json!({"id": 9}));

        assert!(cache.contains_record(&RecordId::Number(8)));
        assert!(cache.contains_record(&RecordId::Number(9)));
        assert!(!cache.contains_record(&RecordId::Number(10)));

        cache.clear();
        assert!(!cache.contains_record(&RecordId::Number(8)));
    }
}
