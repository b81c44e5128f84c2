// In-process ObjectStore with resourceVersion-based optimistic concurrency.

use super::{object_key, ObjectStore};
use crate::convert::GrafanaResource;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

type Key = (String, String);

pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<Key, K>>,
    version: AtomicU64,
    writes: AtomicUsize,
    create_failures: Mutex<VecDeque<StoreError>>,
    update_failures: Mutex<VecDeque<StoreError>>,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            writes: AtomicUsize::new(0),
            create_failures: Mutex::new(VecDeque::new()),
            update_failures: Mutex::new(VecDeque::new()),
        }
    }
}

fn key_of<K: GrafanaResource>(obj: &K) -> Key {
    let meta = obj.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

impl<K: GrafanaResource> MemoryStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object as if written by someone else. Not counted as a write.
    pub fn insert(&self, mut obj: K) -> K {
        obj.meta_mut().resource_version = Some(self.next_version());
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(key_of(&obj), obj.clone());
        obj
    }

    pub fn snapshot(&self, namespace: &str, name: &str) -> Option<K> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.get(&(namespace.to_string(), name.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful create and update calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes the next `create` call fail with `err`.
    pub fn fail_next_create(&self, err: StoreError) {
        self.create_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(err);
    }

    /// Makes the next `update` call fail with `err`.
    pub fn fail_next_update(&self, err: StoreError) {
        self.update_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(err);
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn injected(queue: &Mutex<VecDeque<StoreError>>) -> Option<StoreError> {
        queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }
}

#[async_trait]
impl<K: GrafanaResource> ObjectStore<K> for MemoryStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.snapshot(namespace, name)
            .ok_or_else(|| StoreError::NotFound(format!("{namespace}/{name}")))
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        if let Some(err) = Self::injected(&self.create_failures) {
            return Err(err);
        }
        let key = key_of(obj);
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(object_key(obj)));
        }
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(self.next_version());
        objects.insert(key, stored.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        if let Some(err) = Self::injected(&self.update_failures) {
            return Err(err);
        }
        let key = key_of(obj);
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let current = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(object_key(obj)))?;
        let expected = obj.meta().resource_version.as_deref();
        if expected.is_some() && expected != current.meta().resource_version.as_deref() {
            return Err(StoreError::Conflict(object_key(obj)));
        }
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(self.next_version());
        objects.insert(key, stored.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1beta1::GrafanaFolder;

    fn folder(title: &str) -> GrafanaFolder {
        let mut f = GrafanaFolder::new("monitoring", "infra", Default::default());
        f.spec.title = title.to_string();
        f
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryStore::new();
        let created = store.create(&folder("Infra")).await.unwrap();
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));
        let got = store.get("monitoring", "infra").await.unwrap();
        assert_eq!(got.spec.title, "Infra");
        assert_eq!(store.writes(), 1);
        assert!(store.get("monitoring", "other").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_existing_fails() {
        let store = MemoryStore::new();
        store.insert(folder("Infra"));
        let err = store.create(&folder("Infra")).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let first = store.insert(folder("Infra"));
        let mut fresh = first.clone();
        fresh.spec.title = "Infrastructure".to_string();
        store.update(&fresh).await.unwrap();

        let mut stale = first;
        stale.spec.title = "Stale".to_string();
        assert!(store.update(&stale).await.unwrap_err().is_conflict());
        assert_eq!(store.snapshot("monitoring", "infra").unwrap().spec.title, "Infrastructure");
    }

    #[tokio::test]
    async fn test_injected_failures_are_one_shot() {
        let store = MemoryStore::new();
        store.fail_next_create(StoreError::Api("boom".to_string()));
        assert!(store.create(&folder("Infra")).await.is_err());
        assert!(store.create(&folder("Infra")).await.is_ok());
    }
}
