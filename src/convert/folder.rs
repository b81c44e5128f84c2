// Legacy GrafanaFolder -> v1beta1 GrafanaFolder.

use super::target_meta;
use crate::api::{v1alpha1, v1beta1};
use crate::config::ConverterConfig;
use crate::types::{ResourceKind, DEFAULT_RESYNC_PERIOD};
use kube::ResourceExt;
use serde_json::Value;
use tracing::debug;

pub fn convert_folder(src: &v1alpha1::GrafanaFolder, config: &ConverterConfig) -> v1beta1::GrafanaFolder {
    let ns = src.namespace().unwrap_or_default();
    let name = src.name_any();
    debug!(kind = %ResourceKind::Folder, %ns, %name, "conversion requested");

    let spec = v1beta1::GrafanaFolderSpec {
        title: src.spec.folder_name.clone(),
        permissions: folder_permissions(&src.spec.permissions),
        instance_selector: config.instance_selector.clone(),
        allow_cross_namespace_import: Some(true),
        resync_period: DEFAULT_RESYNC_PERIOD.to_string(),
    };

    let mut dst = v1beta1::GrafanaFolder::new(&ns, &name, spec);
    dst.metadata = target_meta(src, name.clone());
    debug!(kind = %ResourceKind::Folder, %ns, %name, "converted");
    dst
}

/// Encodes permission items as `{"items":[{"<type>":<target>,"permission":<level>}]}`.
/// A target that parses as an integer is written as a number, anything else as a string.
pub fn folder_permissions(items: &[v1alpha1::GrafanaPermissionItem]) -> String {
    let encoded: Vec<String> = items
        .iter()
        .map(|item| {
            let target = match item.permission_target.parse::<i64>() {
                Ok(id) => Value::from(id),
                Err(_) => Value::from(item.permission_target.as_str()),
            };
            format!(
                "{{{}:{},\"permission\":{}}}",
                Value::from(item.permission_target_type.as_str()),
                target,
                item.permission_level
            )
        })
        .collect();
    format!("{{\"items\":[{}]}}", encoded.join(","))
}
