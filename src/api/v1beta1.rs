//! Target `grafana.integreatly.org/v1beta1` resources produced by conversion.

use super::namespaced_resource;
use crate::codec;
use crate::types::{
    is_false, ConfigMapKeyRef, DashboardDatasource, GrafanaComReference, GrafanaPlugin,
    TARGET_GROUP, TARGET_VERSION,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDashboardSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub json: String,
    #[serde(default, with = "codec::base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub gzip_json: Vec<u8>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jsonnet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_com: Option<GrafanaComReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ConfigMapKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_selector: Option<LabelSelector>,
    /// Title of the folder the dashboard is placed in.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub folder: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<GrafanaPlugin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_cache_duration: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resync_period: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasources: Vec<DashboardDatasource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_cross_namespace_import: Option<bool>,
}

/// Observed dashboard state, written by the operator that consumes the target kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDashboardStatus {
    #[serde(default, with = "codec::base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub content_cache: Vec<u8>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrafanaDashboard {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GrafanaDashboardSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GrafanaDashboardStatus>,
}

namespaced_resource!(
    GrafanaDashboard,
    GrafanaDashboardSpec,
    group = TARGET_GROUP,
    version = TARGET_VERSION,
    kind = "GrafanaDashboard",
    plural = "grafanadashboards"
);

impl GrafanaDashboard {
    /// Hex SHA-256 over the content-determining fields; matches `status.hash`
    /// when the consuming operator has nothing left to resync.
    pub fn content_hash(&self) -> String {
        let spec = &self.spec;
        let mut buf: Vec<u8> = Vec::new();
        for input in &spec.datasources {
            buf.extend_from_slice(input.datasource_name.as_bytes());
            buf.extend_from_slice(input.input_name.as_bytes());
        }
        buf.extend_from_slice(spec.json.as_bytes());
        buf.extend_from_slice(&spec.gzip_json);
        buf.extend_from_slice(spec.url.as_bytes());
        buf.extend_from_slice(spec.jsonnet.as_bytes());
        buf.extend_from_slice(self.metadata.namespace.as_deref().unwrap_or("").as_bytes());
        buf.extend_from_slice(spec.folder.as_bytes());
        if let Some(r) = &spec.config_map_ref {
            buf.extend_from_slice(r.name.as_bytes());
            buf.extend_from_slice(r.key.as_bytes());
        }
        if let Some(com) = &spec.grafana_com {
            buf.extend_from_slice(com.id.to_string().as_bytes());
            if let Some(rev) = com.revision {
                buf.extend_from_slice(rev.to_string().as_bytes());
            }
        }
        if let Some(status) = &self.status {
            buf.extend_from_slice(&status.content_cache);
        }
        codec::sha256_hex(&buf)
    }

    pub fn unchanged(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.hash == self.content_hash())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDatasourceInternal {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub basic_auth_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub json_data: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub secure_json_data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDatasourceSpec {
    #[serde(default)]
    pub datasource: GrafanaDatasourceInternal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<GrafanaPlugin>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resync_period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_cross_namespace_import: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrafanaDatasource {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GrafanaDatasourceSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

namespaced_resource!(
    GrafanaDatasource,
    GrafanaDatasourceSpec,
    group = TARGET_GROUP,
    version = TARGET_VERSION,
    kind = "GrafanaDatasource",
    plural = "grafanadatasources"
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaFolderSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Raw JSON with folder permissions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub permissions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_cross_namespace_import: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resync_period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrafanaFolder {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GrafanaFolderSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

namespaced_resource!(
    GrafanaFolder,
    GrafanaFolderSpec,
    group = TARGET_GROUP,
    version = TARGET_VERSION,
    kind = "GrafanaFolder",
    plural = "grafanafolders"
);

impl GrafanaFolder {
    /// Folder title, falling back to the object name.
    pub fn title(&self) -> &str {
        if self.spec.title.is_empty() {
            self.metadata.name.as_deref().unwrap_or("")
        } else {
            &self.spec.title
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaContactPointSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resync_period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_resolve_message: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub settings: Value,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_cross_namespace_import: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrafanaContactPoint {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GrafanaContactPointSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

namespaced_resource!(
    GrafanaContactPoint,
    GrafanaContactPointSpec,
    group = TARGET_GROUP,
    version = TARGET_VERSION,
    kind = "GrafanaContactPoint",
    plural = "grafanacontactpoints"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_unchanged_against_status_hash() {
        let mut d = GrafanaDashboard::new(
            "monitoring",
            "node-exporter",
            GrafanaDashboardSpec {
                json: "{}".to_string(),
                ..Default::default()
            },
        );
        assert!(!d.unchanged());
        d.status = Some(GrafanaDashboardStatus::default());
        let hash = d.content_hash();
        d.status.as_mut().unwrap().hash = hash;
        assert!(d.unchanged());
        d.spec.folder = "Infra".to_string();
        assert!(!d.unchanged());
    }

    #[test]
    fn test_folder_title_fallback() {
        let mut f = GrafanaFolder::new("monitoring", "infra", Default::default());
        assert_eq!(f.title(), "infra");
        f.spec.title = "Infrastructure".to_string();
        assert_eq!(f.title(), "Infrastructure");
    }

    #[test]
    fn test_contact_point_wire_names() {
        let cp = GrafanaContactPoint::new(
            "monitoring",
            "oncall",
            GrafanaContactPointSpec {
                name: "oncall".to_string(),
                type_: "email".to_string(),
                settings: serde_json::json!({"addresses": "ops@example.com"}),
                disable_resolve_message: true,
                ..Default::default()
            },
        );
        let v = serde_json::to_value(&cp).unwrap();
        assert_eq!(v["spec"]["type"], "email");
        assert_eq!(v["spec"]["disableResolveMessage"], true);
        assert_eq!(v["spec"]["settings"]["addresses"], "ops@example.com");
        assert!(v["spec"].get("resyncPeriod").is_none());
    }
}
