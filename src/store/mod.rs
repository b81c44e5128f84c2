// Persistence seam for target objects.

mod kube;
mod memory;

pub use self::kube::KubeStore;
pub use self::memory::MemoryStore;

use crate::error::StoreError;
use async_trait::async_trait;

/// Read and write access to one resource kind. Implementations enforce
/// optimistic concurrency on `update` through `metadata.resourceVersion`.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError>;
    async fn create(&self, obj: &K) -> Result<K, StoreError>;
    async fn update(&self, obj: &K) -> Result<K, StoreError>;
}

/// `namespace/name` of an object, for messages.
pub(crate) fn object_key<K: ::kube::Resource>(obj: &K) -> String {
    let meta = obj.meta();
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or(""),
        meta.name.as_deref().unwrap_or("")
    )
}
