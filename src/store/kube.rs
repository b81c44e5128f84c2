// ObjectStore over the Kubernetes API.

use super::{object_key, ObjectStore};
use crate::convert::GrafanaResource;
use crate::error::StoreError;
use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::Client;
use std::marker::PhantomData;

pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K: GrafanaResource> KubeStore<K> {
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn namespace_of<K: GrafanaResource>(obj: &K) -> &str {
    obj.meta().namespace.as_deref().unwrap_or("default")
}

/// Maps API failures onto the store taxonomy. A 409 is `AlreadyExists` only for
/// creates; a stale resourceVersion on replace is a `Conflict`.
pub(crate) fn map_kube_error(err: kube::Error, key: String) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(key),
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::AlreadyExists(key)
        }
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(key),
        other => StoreError::Api(format!("{key}: {other}")),
    }
}

#[async_trait]
impl<K: GrafanaResource> ObjectStore<K> for KubeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.api(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, format!("{namespace}/{name}")))
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        self.api(namespace_of(obj))
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error(e, object_key(obj)))
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let name = obj.meta().name.clone().unwrap_or_default();
        self.api(namespace_of(obj))
            .replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error(e, object_key(obj)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{reason} from test"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_map_kube_error() {
        let key = || "monitoring/d1".to_string();
        assert!(map_kube_error(api_error(404, "NotFound"), key()).is_not_found());
        assert!(map_kube_error(api_error(409, "AlreadyExists"), key()).is_already_exists());
        assert!(map_kube_error(api_error(409, "Conflict"), key()).is_conflict());
        assert!(matches!(
            map_kube_error(api_error(500, "InternalError"), key()),
            StoreError::Api(msg) if msg.starts_with("monitoring/d1")
        ));
    }
}
