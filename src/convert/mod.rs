// Conversion of legacy v1alpha1 objects into their v1beta1 counterparts.

pub mod dashboard;
pub mod datasource;
pub mod folder;
pub mod notification;

use crate::api::HasSpec;
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::types::ResourceKind;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

pub use dashboard::convert_dashboard;
pub use datasource::convert_datasource;
pub use folder::convert_folder;
pub use notification::convert_notification_channel;

/// A namespaced resource the converter can read or write.
pub trait GrafanaResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + HasSpec
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> GrafanaResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + HasSpec
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Converted objects plus the per-item failures that were skipped.
#[derive(Debug)]
pub struct ConversionOutput<T> {
    pub objects: Vec<T>,
    pub errors: Vec<ConvertError>,
}

impl<T> ConversionOutput<T> {
    pub fn single(object: T) -> Self {
        Self {
            objects: vec![object],
            errors: Vec::new(),
        }
    }

    pub fn failed(error: ConvertError) -> Self {
        Self {
            objects: Vec::new(),
            errors: vec![error],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// All item errors joined into one message, or `None` on full success.
    pub fn joined_error(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A legacy kind together with its pure mapping onto the target kind.
pub trait Convert: GrafanaResource {
    type Target: GrafanaResource;
    const KIND: ResourceKind;

    fn convert(&self, config: &ConverterConfig) -> ConversionOutput<Self::Target>;
}

impl Convert for crate::api::v1alpha1::GrafanaDashboard {
    type Target = crate::api::v1beta1::GrafanaDashboard;
    const KIND: ResourceKind = ResourceKind::Dashboard;

    fn convert(&self, config: &ConverterConfig) -> ConversionOutput<Self::Target> {
        ConversionOutput::single(convert_dashboard(self, config))
    }
}

impl Convert for crate::api::v1alpha1::GrafanaDataSource {
    type Target = crate::api::v1beta1::GrafanaDatasource;
    const KIND: ResourceKind = ResourceKind::Datasource;

    fn convert(&self, config: &ConverterConfig) -> ConversionOutput<Self::Target> {
        convert_datasource(self, config)
    }
}

impl Convert for crate::api::v1alpha1::GrafanaFolder {
    type Target = crate::api::v1beta1::GrafanaFolder;
    const KIND: ResourceKind = ResourceKind::Folder;

    fn convert(&self, config: &ConverterConfig) -> ConversionOutput<Self::Target> {
        ConversionOutput::single(convert_folder(self, config))
    }
}

impl Convert for crate::api::v1alpha1::GrafanaNotificationChannel {
    type Target = crate::api::v1beta1::GrafanaContactPoint;
    const KIND: ResourceKind = ResourceKind::NotificationChannel;

    fn convert(&self, config: &ConverterConfig) -> ConversionOutput<Self::Target> {
        match convert_notification_channel(self, config) {
            Ok(cp) => ConversionOutput::single(cp),
            Err(e) => ConversionOutput::failed(e),
        }
    }
}

/// Replaces every character outside `[A-Za-z0-9.-]` with `-`.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '-' })
        .collect()
}

/// Target metadata: same namespace, the source's labels and annotations, and
/// an owner reference back to the source object.
pub(crate) fn target_meta<K: Resource<DynamicType = ()>>(src: &K, name: String) -> ObjectMeta {
    ObjectMeta {
        namespace: src.namespace(),
        name: Some(name),
        labels: src.meta().labels.clone(),
        annotations: src.meta().annotations.clone(),
        owner_references: src.controller_owner_ref(&()).map(|r| vec![r]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_replaces_disallowed() {
        assert_eq!(sanitize("platform prometheus"), "platform-prometheus");
        assert_eq!(sanitize("loki_logs/v2"), "loki-logs-v2");
        assert_eq!(sanitize("a.b-C9"), "a.b-C9");
        assert_eq!(sanitize("ünïcode"), "-n-code");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_joined_error() {
        let ok: ConversionOutput<u8> = ConversionOutput::single(1);
        assert!(ok.is_complete());
        assert!(ok.joined_error().is_none());
        let bad: ConversionOutput<u8> = ConversionOutput::failed(ConvertError::DatasourceJsonShape {
            index: 1,
            name: "loki".to_string(),
            field: "jsonData",
        });
        assert!(!bad.is_complete());
        assert!(bad.joined_error().unwrap().contains("loki"));
    }

    proptest! {
        #[test]
        fn test_sanitize_idempotent(s in any::<String>()) {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once.clone());
            prop_assert!(once.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-'));
            prop_assert_eq!(once.chars().count(), s.chars().count());
        }
    }
}
