use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::models::{Record, RecordId};
use crate::storage::json::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Vendors,
    Quotations,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Vendors, Collection::Quotations];

    pub fn storage_key(&self) -> &'static str {
        match self {
            Collection::Vendors => "mockVendors",
            Collection::Quotations => "mockQuotations",
        }
    }

    /// Ids deleted locally, kept so read-only sources stop showing them.
    pub fn tombstone_key(&self) -> &'static str {
        match self {
            Collection::Vendors => "deletedVendors",
            Collection::Quotations => "deletedQuotations",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Collection::Vendors => "vendors",
            Collection::Quotations => "quotations",
        }
    }
}

/// Durable local copy of entity collections.
///
/// Loaded once when opened; every mutation is written through to the store
/// before the call returns. Records keep a unique `id` per collection.
///
/// Deleted ids are also kept as tombstones, so records that only ever lived
/// in the cache or the seed dataset stay gone after an offline delete.
pub struct PersistentMirror {
    store: Arc<dyn KeyValueStore>,
    collections: RwLock<HashMap<Collection, Vec<Record>>>,
    tombstones: RwLock<HashMap<Collection, Vec<RecordId>>>,
}

impl PersistentMirror {
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let mut collections = HashMap::new();
        let mut tombstones = HashMap::new();
        for collection in Collection::ALL {
            let records: Vec<Record> = read_json(store.as_ref(), collection.storage_key(), collection).await;
            let buried: Vec<RecordId> = read_json(store.as_ref(), collection.tombstone_key(), collection).await;
            debug!(
                collection = collection.label(),
                records = records.len(),
                tombstones = buried.len(),
                "Loaded mirror collection"
            );
            collections.insert(collection, dedupe_by_id(records));
            tombstones.insert(collection, buried);
        }

        Self {
            store,
            collections: RwLock::new(collections),
            tombstones: RwLock::new(tombstones),
        }
    }

    pub async fn load(&self, collection: Collection) -> Vec<Record> {
        self.collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_empty(&self, collection: Collection) -> bool {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(Vec::is_empty)
            .unwrap_or(true)
    }

    pub async fn find(&self, collection: Collection, id: &RecordId) -> Option<Record> {
        self.collections
            .read()
            .await
            .get(&collection)
            .and_then(|records| records.iter().find(|r| r.has_id(id)).cloned())
    }

    /// Replaces a whole collection and persists it.
    pub async fn save(&self, collection: Collection, records: Vec<Record>) -> Result<()> {
        let serialized = serde_json::to_string(&records)?;
        let mut collections = self.collections.write().await;
        self.store.write(collection.storage_key(), &serialized).await?;
        collections.insert(collection, records);
        Ok(())
    }

    /// Inserts `record`, replacing any record with the same id. Records
    /// without an id are refused.
    pub async fn upsert(&self, collection: Collection, record: Record) -> bool {
        let Some(id) = record.id() else {
            warn!(collection = collection.label(), "Refusing to mirror a record without an id");
            return false;
        };

        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();
        match records.iter_mut().find(|r| r.has_id(&id)) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.persist(collection, records).await;
        true
    }

    /// Appends a record built around a freshly minted local id.
    ///
    /// Local ids count down from -1, one below the smallest id present, and
    /// are allocated under the write lock so concurrent offline creates
    /// never share an id.
    pub async fn insert_local<F>(&self, collection: Collection, build: F) -> Record
    where
        F: FnOnce(RecordId) -> Record,
    {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();

        let lowest = records
            .iter()
            .filter_map(|r| match r.id() {
                Some(RecordId::Number(n)) => Some(n),
                _ => None,
            })
            .min()
            .unwrap_or(0);
        let id = RecordId::Number(lowest.min(0) - 1);

        let mut record = build(id.clone());
        record.set("id", id.to_value());
        records.push(record.clone());
        self.persist(collection, records).await;

        info!(
            collection = collection.label(),
            id = %id,
            "Stored locally created record"
        );
        record
    }

    /// Applies `mutate` to the record with `id`; `None` when it is absent.
    pub async fn update<F>(&self, collection: Collection, id: &RecordId, mutate: F) -> Option<Record>
    where
        F: FnOnce(&mut Record),
    {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();
        let record = records.iter_mut().find(|r| r.has_id(id))?;
        mutate(record);
        let updated = record.clone();
        self.persist(collection, records).await;
        Some(updated)
    }

    /// Removes the record with `id`, reporting whether it was present.
    pub async fn remove(&self, collection: Collection, id: &RecordId) -> bool {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();
        let before = records.len();
        records.retain(|r| !r.has_id(id));
        let removed = records.len() != before;
        if removed {
            self.persist(collection, records).await;
        }
        removed
    }

    /// Records that `id` was deleted. Idempotent.
    pub async fn bury(&self, collection: Collection, id: &RecordId) {
        let mut tombstones = self.tombstones.write().await;
        let ids = tombstones.entry(collection).or_default();
        if ids.contains(id) {
            return;
        }
        ids.push(id.clone());
        self.write_through(collection.tombstone_key(), collection, &*ids).await;
    }

    pub async fn is_buried(&self, collection: Collection, id: &RecordId) -> bool {
        self.tombstones
            .read()
            .await
            .get(&collection)
            .is_some_and(|ids| ids.contains(id))
    }

    pub async fn buried(&self, collection: Collection) -> Vec<RecordId> {
        self.tombstones
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    async fn persist(&self, collection: Collection, records: &[Record]) {
        self.write_through(collection.storage_key(), collection, records).await;
    }

    async fn write_through<T: Serialize + ?Sized>(&self, key: &str, collection: Collection, value: &T) {
        let result = match serde_json::to_string(value) {
            Ok(serialized) => self.store.write(key, &serialized).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            error!(
                error = %e,
                collection = collection.label(),
                key = key,
                "Failed to persist mirror collection"
            );
        }
    }
}

async fn read_json<T>(store: &dyn KeyValueStore, key: &str, collection: Collection) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw = match store.read(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(
                error = %e,
                collection = collection.label(),
                key = key,
                "Failed to read mirror collection, starting empty"
            );
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(values) => values,
        Err(e) => {
            warn!(
                error = %e,
                collection = collection.label(),
                key = key,
                "Corrupt mirror collection, starting empty"
            );
            Vec::new()
        }
    }
}

/// Keeps the last occurrence of each id, preserving first-seen order.
fn dedupe_by_id(records: Vec<Record>) -> Vec<Record> {
    let mut result: Vec<Record> = Vec::with_capacity(records.len());
    for record in records {
        match record.id() {
            Some(id) => match result.iter_mut().find(|r| r.has_id(&id)) {
                Some(existing) => *existing = record,
                None => result.push(record),
            },
            None => result.push(record),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::json::{FileStore, MemoryStore};
    use serde_json::json;
    use tempfile::TempDir;

    fn vendor(id: i64, name: &str) -> Record {
        Record::from_value(json!({"id": id, "name": name, "status": "active"})).unwrap()
    }

    #[tokio::test]
    async fn test_write_through_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(temp_dir.path()).await.unwrap());

        let mirror = PersistentMirror::open(store.clone()).await;
        assert!(mirror.is_empty(Collection::Vendors).await);
        mirror.upsert(Collection::Vendors, vendor(10, "Acme")).await;
        let local = mirror
            .insert_local(Collection::Vendors, |_| Record::new().with("name", "Offline Co"))
            .await;
        drop(mirror);

        let reopened = PersistentMirror::open(store).await;
        let records = reopened.load(Collection::Vendors).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_str("name"), Some("Acme"));
        assert_eq!(records[1].id(), local.id());
        assert!(reopened.is_empty(Collection::Quotations).await);
    }

    #[tokio::test]
    async fn test_corrupt_storage_degrades_to_empty() {
        let store = Arc::new(MemoryStore::new());
        store.write("mockVendors", "{not json").await.unwrap();
        store.write("mockQuotations", "{\"id\": 1}").await.unwrap();

        let mirror = PersistentMirror::open(store).await;
        assert!(mirror.load(Collection::Vendors).await.is_empty());
        assert!(mirror.load(Collection::Quotations).await.is_empty());
    }

    #[tokio::test]
    async fn test_local_ids_are_negative_and_unique() {
        let mirror = PersistentMirror::open(Arc::new(MemoryStore::new())).await;
        mirror.upsert(Collection::Vendors, vendor(5, "Server")).await;

        let first = mirror.insert_local(Collection::Vendors, |_| Record::new()).await;
        let second = mirror.insert_local(Collection::Vendors, |_| Record::new()).await;

        assert_eq!(first.id(), Some(RecordId::Number(-1)));
        assert_eq!(second.id(), Some(RecordId::Number(-2)));
    }

    #[tokio::test]
    async fn test_concurrent_local_inserts_never_collide() {
        let mirror = Arc::new(PersistentMirror::open(Arc::new(MemoryStore::new())).await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mirror = mirror.clone();
            handles.push(tokio::spawn(async move {
                mirror.insert_local(Collection::Vendors, |_| Record::new()).await.id()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort_by_key(|id| id.to_string());
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[tokio::test]
    async fn test_update_and_remove_by_id() {
        let mirror = PersistentMirror::open(Arc::new(MemoryStore::new())).await;
        mirror.upsert(Collection::Vendors, vendor(1, "Acme")).await;
        mirror.upsert(Collection::Vendors, vendor(1, "Acme Renamed")).await;
        assert_eq!(mirror.load(Collection::Vendors).await.len(), 1);

        let updated = mirror
            .update(Collection::Vendors, &RecordId::Number(1), |r| r.set("status", "suspended"))
            .await
            .unwrap();
        assert_eq!(updated.status(), Some("suspended"));
        assert!(
            mirror
                .update(Collection::Vendors, &RecordId::Number(99), |_| {})
                .await
                .is_none()
        );

        assert!(mirror.remove(Collection::Vendors, &RecordId::Number(1)).await);
        assert!(!mirror.remove(Collection::Vendors, &RecordId::Number(1)).await);
        assert!(mirror.find(Collection::Vendors, &RecordId::Number(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_storage_are_collapsed() {
        let store = Arc::new(MemoryStore::new());
        store
            .write("mockVendors", "[{\"id\":1,\"name\":\"a\"},{\"id\":2},{\"id\":1,\"name\":\"b\"}]")
            .await
            .unwrap();

        let mirror = PersistentMirror::open(store).await;
        let records = mirror.load(Collection::Vendors).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_str("name"), Some("b"));
    }

    #[tokio::test]
    async fn test_upsert_refuses_records_without_id() {
        let mirror = PersistentMirror::open(Arc::new(MemoryStore::new())).await;

        assert!(!mirror.upsert(Collection::Vendors, Record::new().with("name", "Nameless")).await);
        assert!(mirror.upsert(Collection::Vendors, vendor(3, "Acme")).await);

        let records = mirror.load(Collection::Vendors).await;
        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|r| r.id().is_some()));
    }

    #[tokio::test]
    async fn test_tombstones_survive_reopen() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mirror = PersistentMirror::open(store.clone()).await;

        mirror.bury(Collection::Vendors, &RecordId::Number(2)).await;
        mirror.bury(Collection::Vendors, &RecordId::Number(2)).await;
        assert!(mirror.is_buried(Collection::Vendors, &RecordId::Number(2)).await);
        assert!(!mirror.is_buried(Collection::Quotations, &RecordId::Number(2)).await);
        drop(mirror);

        let reopened = PersistentMirror::open(store).await;
        assert_eq!(reopened.buried(Collection::Vendors).await, vec![RecordId::Number(2)]);
        assert!(reopened.load(Collection::Vendors).await.is_empty());
    }
}
