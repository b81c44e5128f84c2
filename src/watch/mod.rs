// Typed change notifications for legacy objects.

mod kube;
mod memory;

pub use self::kube::KubeInformer;
pub use self::memory::MemoryInformer;

use crate::error::InformerError;
use futures::stream::BoxStream;

/// One notification for a watched kind. The kind is fixed by the informer's
/// type parameter, so handlers never inspect payloads at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    Added(K),
    Updated { old: K, new: K },
    /// Initial listing is complete; later events reflect live changes.
    Synced,
}

impl<K> WatchEvent<K> {
    /// The current object carried by the event.
    pub fn object(&self) -> Option<&K> {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Updated { new: obj, .. } => Some(obj),
            WatchEvent::Synced => None,
        }
    }
}

pub type EventStream<K> = BoxStream<'static, Result<WatchEvent<K>, InformerError>>;

pub trait Informer<K>: Send + Sync {
    /// Streams events for one namespace, or the whole cluster when `None`.
    /// Every subscription yields `Synced` once its initial listing is delivered.
    fn subscribe(&self, namespace: Option<&str>) -> EventStream<K>;
}
