// Informer backed by kube::runtime::watcher.

use super::{EventStream, Informer, WatchEvent};
use crate::convert::GrafanaResource;
use crate::error::InformerError;
use futures::{future, StreamExt};
use kube::api::Api;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Client, ResourceExt};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

pub struct KubeInformer<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeInformer<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

type ObjectKey = (String, String);

/// Turns raw watcher events into typed ones, remembering the last object seen
/// per key so updates carry the previous version. Deletes are dropped.
///
/// A relist replaces the remembered set: keys absent from it are forgotten,
/// and an object whose uid changed is reported as newly added.
pub(crate) struct EventTracker<K> {
    seen: HashMap<ObjectKey, K>,
    relisted: Option<HashSet<ObjectKey>>,
    synced: bool,
}

impl<K> Default for EventTracker<K> {
    fn default() -> Self {
        Self {
            seen: HashMap::new(),
            relisted: None,
            synced: false,
        }
    }
}

impl<K: GrafanaResource> EventTracker<K> {
    pub(crate) fn track(&mut self, event: Event<K>) -> Option<WatchEvent<K>> {
        match event {
            Event::Init => {
                self.relisted = Some(HashSet::new());
                None
            }
            Event::InitApply(obj) | Event::Apply(obj) => {
                let key = (obj.namespace().unwrap_or_default(), obj.name_any());
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(key.clone());
                }
                match self.seen.insert(key, obj.clone()) {
                    Some(old) if old.uid() == obj.uid() => Some(WatchEvent::Updated { old, new: obj }),
                    _ => Some(WatchEvent::Added(obj)),
                }
            }
            Event::InitDone => {
                if let Some(relisted) = self.relisted.take() {
                    self.seen.retain(|key, _| relisted.contains(key));
                }
                if self.synced {
                    return None;
                }
                self.synced = true;
                Some(WatchEvent::Synced)
            }
            Event::Delete(obj) => {
                self.seen.remove(&(obj.namespace().unwrap_or_default(), obj.name_any()));
                None
            }
        }
    }
}

impl<K: GrafanaResource> Informer<K> for KubeInformer<K> {
    fn subscribe(&self, namespace: Option<&str>) -> EventStream<K> {
        let api: Api<K> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let mut tracker = EventTracker::<K>::default();
        watcher::watcher(api, watcher::Config::default())
            .default_backoff()
            .filter_map(move |res| {
                future::ready(match res {
                    Ok(event) => tracker.track(event).map(Ok),
                    Err(e) => Some(Err(InformerError::Watch(e.to_string()))),
                })
            })
            .boxed()
    }
}
