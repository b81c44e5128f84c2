// In-process informer: replays a published event log, then streams live events.

use super::{EventStream, Informer, WatchEvent};
use crate::convert::GrafanaResource;
use futures::{stream, StreamExt};
use kube::ResourceExt;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const CHANNEL_CAPACITY: usize = 256;

pub struct MemoryInformer<K> {
    log: Mutex<Vec<WatchEvent<K>>>,
    tx: broadcast::Sender<WatchEvent<K>>,
}

impl<K: GrafanaResource> Default for MemoryInformer<K> {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            log: Mutex::new(Vec::new()),
            tx,
        }
    }
}

impl<K: GrafanaResource> MemoryInformer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: WatchEvent<K>) {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.push(event.clone());
        // No live subscribers is fine; later ones replay the log.
        let _ = self.tx.send(event);
    }

    pub fn added(&self, obj: K) {
        self.publish(WatchEvent::Added(obj));
    }

    pub fn updated(&self, old: K, new: K) {
        self.publish(WatchEvent::Updated { old, new });
    }

    pub fn synced(&self) {
        self.publish(WatchEvent::Synced);
    }
}

fn in_scope<K: GrafanaResource>(event: &WatchEvent<K>, namespace: Option<&str>) -> bool {
    match (event.object(), namespace) {
        (Some(obj), Some(ns)) => obj.namespace().as_deref() == Some(ns),
        _ => true,
    }
}

impl<K: GrafanaResource> Informer<K> for MemoryInformer<K> {
    fn subscribe(&self, namespace: Option<&str>) -> EventStream<K> {
        let namespace = namespace.map(str::to_string);
        // Holding the log lock while subscribing keeps replay and live events gap-free.
        let (replay, rx) = {
            let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
            (log.clone(), self.tx.subscribe())
        };

        let live = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        stream::iter(replay)
            .chain(live)
            .filter(move |event| futures::future::ready(in_scope(event, namespace.as_deref())))
            .map(Ok)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1alpha1::GrafanaFolder;

    #[tokio::test]
    async fn test_replay_then_live() {
        let informer = MemoryInformer::new();
        informer.added(GrafanaFolder::new("team-a", "a", Default::default()));
        informer.added(GrafanaFolder::new("team-b", "b", Default::default()));
        informer.synced();

        let mut events = informer.subscribe(Some("team-a"));
        let first = events.next().await.unwrap().unwrap();
        assert_eq!(first.object().unwrap().name_any(), "a");
        assert_eq!(events.next().await.unwrap().unwrap(), WatchEvent::Synced);

        informer.added(GrafanaFolder::new("team-a", "c", Default::default()));
        let live = events.next().await.unwrap().unwrap();
        assert_eq!(live.object().unwrap().name_any(), "c");
    }

    #[tokio::test]
    async fn test_cluster_scope_sees_all() {
        let informer = MemoryInformer::new();
        informer.added(GrafanaFolder::new("team-a", "a", Default::default()));
        informer.added(GrafanaFolder::new("team-b", "b", Default::default()));
        let events: Vec<_> = informer.subscribe(None).take(2).collect().await;
        assert_eq!(events.len(), 2);
    }
}
