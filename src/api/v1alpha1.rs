//! Legacy `integreatly.org/v1alpha1` resources as written by users of the old operator.

use super::namespaced_resource;
use crate::codec::{self, CodecError};
use crate::types::{
    ConfigMapKeyRef, DashboardDatasource, GrafanaComReference, GrafanaPlugin, LEGACY_GROUP,
    LEGACY_VERSION,
};
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDashboardSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub json: String,
    /// Dashboard JSON compressed with gzip.
    #[serde(default, with = "codec::base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub gzip_json: Vec<u8>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jsonnet: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<GrafanaPlugin>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ConfigMapKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gzip_config_map_ref: Option<ConfigMapKeyRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasources: Vec<DashboardDatasource>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_folder_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_com: Option<GrafanaComReference>,
    /// How long content fetched from `url` or grafana.com stays valid, e.g. `1h0m0s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_cache_duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDashboardStatus {
    #[serde(default, with = "codec::base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub content_cache: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_url: String,
}

impl GrafanaDashboardStatus {
    /// Returns the cached content if it was fetched from `url`, has not expired
    /// and decompresses cleanly. Otherwise the result is empty.
    pub fn content_cache(&self, url: &str, ttl: Option<Duration>, now: DateTime<Utc>) -> Vec<u8> {
        if self.content_url != url {
            return Vec::new();
        }
        if let Some(ttl) = ttl.filter(|d| *d > Duration::zero()) {
            let fresh = self.content_timestamp.is_some_and(|ts| ts + ttl > now);
            if !fresh {
                return Vec::new();
            }
        }
        codec::gunzip(&self.content_cache).unwrap_or_default()
    }
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
    group = LEGACY_GROUP,
    version = LEGACY_VERSION,
    kind = "GrafanaDashboard",
    plural = "grafanadashboards"
);

impl GrafanaDashboard {
    /// Hex SHA-256 over every field that determines the rendered dashboard.
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
        buf.extend_from_slice(spec.custom_folder_name.as_bytes());
        for r in [&spec.config_map_ref, &spec.gzip_config_map_ref].into_iter().flatten() {
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

    /// The cache lifetime from `contentCacheDuration`, a duration string such as
    /// `1h0m0s`. `None` when absent or zero, meaning entries never expire.
    pub fn content_cache_ttl(&self) -> Result<Option<Duration>, ContentCacheError> {
        let Some(raw) = self.spec.content_cache_duration.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() || raw == "0" {
            return Ok(None);
        }
        let invalid = |reason: String| ContentCacheError::Duration {
            value: raw.to_string(),
            reason,
        };
        let std = humantime::parse_duration(raw).map_err(|e| invalid(e.to_string()))?;
        let ttl = Duration::from_std(std).map_err(|e| invalid(e.to_string()))?;
        Ok(Some(ttl).filter(|d| *d > Duration::zero()))
    }

    /// Cached remote content for the current `url`, empty when nothing fresh is cached.
    pub fn content_cache(&self, now: DateTime<Utc>) -> Result<Vec<u8>, ContentCacheError> {
        let ttl = self.content_cache_ttl()?;
        Ok(self
            .status
            .as_ref()
            .map(|status| status.content_cache(&self.spec.url, ttl, now))
            .unwrap_or_default())
    }

    /// Parses the dashboard model from `gzipJson` if set, otherwise from `json`.
    pub fn model(&self) -> Result<BTreeMap<String, Value>, DashboardModelError> {
        let raw = if self.spec.gzip_json.is_empty() {
            self.spec.json.as_bytes().to_vec()
        } else {
            codec::gunzip(&self.spec.gzip_json)?
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    /// The user-declared dashboard uid, or a stable one derived from namespace and name.
    pub fn uid(&self) -> String {
        let declared = self.model().ok().and_then(|m| match m.get("uid") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        });
        declared.unwrap_or_else(|| {
            let ns = self.metadata.namespace.as_deref().unwrap_or("");
            let name = self.metadata.name.as_deref().unwrap_or("");
            codec::sha1_hex(format!("{ns}{name}").as_bytes())
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardModelError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("dashboard model is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ContentCacheError {
    #[error("invalid contentCacheDuration {value:?}: {reason}")]
    Duration { value: String, reason: String },
}

/// One datasource declared inline in a legacy GrafanaDataSource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDataSourceFields {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default)]
    pub org_id: i64,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub basic_auth: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub basic_auth_user: String,
    #[serde(default)]
    pub editable: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub json_data: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secure_json_data: BTreeMap<String, Value>,
    /// Raw JSON replacing `jsonData` entirely; either an object or its text form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_json_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_secure_json_data: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrafanaDataSourceSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasources: Vec<GrafanaDataSourceFields>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrafanaDataSource {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GrafanaDataSourceSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

namespaced_resource!(
    GrafanaDataSource,
    GrafanaDataSourceSpec,
    group = LEGACY_GROUP,
    version = LEGACY_VERSION,
    kind = "GrafanaDataSource",
    plural = "grafanadatasources"
);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaPermissionItem {
    /// `team`, `user` or `role`.
    pub permission_target_type: String,
    pub permission_target: String,
    pub permission_level: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaFolderSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub folder_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<GrafanaPermissionItem>,
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
    group = LEGACY_GROUP,
    version = LEGACY_VERSION,
    kind = "GrafanaFolder",
    plural = "grafanafolders"
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrafanaNotificationChannelSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Embedded contact point definition.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub json: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrafanaNotificationChannel {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GrafanaNotificationChannelSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

namespaced_resource!(
    GrafanaNotificationChannel,
    GrafanaNotificationChannelSpec,
    group = LEGACY_GROUP,
    version = LEGACY_VERSION,
    kind = "GrafanaNotificationChannel",
    plural = "grafananotificationchannels"
);

#[cfg(test)]
mod tests {
    use super::*;

    fn dashboard(json: &str) -> GrafanaDashboard {
        GrafanaDashboard::new(
            "monitoring",
            "node-exporter",
            GrafanaDashboardSpec {
                json: json.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_deserialize_legacy_dashboard() {
        let yaml = r#"
apiVersion: integreatly.org/v1alpha1
kind: GrafanaDashboard
metadata:
  name: node-exporter
  namespace: monitoring
  labels:
    app: grafana
spec:
  customFolderName: Infra
  gzipJson: H4sIAAAAAAACA6tWKs1MUbJSystPSdVNrSjILypJLVKqBQAbDpDkFwAAAA==
  datasources:
    - inputName: DS_PROMETHEUS
      datasourceName: Platform Prometheus
  contentCacheDuration: 1h0m0s
"#;
        let d: GrafanaDashboard = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(d.metadata.name.as_deref(), Some("node-exporter"));
        assert_eq!(d.spec.custom_folder_name, "Infra");
        assert_eq!(d.uid(), "node-exporter");
        assert_eq!(d.spec.datasources[0].input_name, "DS_PROMETHEUS");
        assert_eq!(d.spec.content_cache_duration.as_deref(), Some("1h0m0s"));
        assert_eq!(d.types.unwrap().kind, "GrafanaDashboard");
    }

    #[test]
    fn test_uid_from_model() {
        assert_eq!(dashboard(r#"{"uid":"abc","title":"x"}"#).uid(), "abc");
    }

    #[test]
    fn test_uid_derived_when_missing() {
        let d = dashboard(r#"{"uid":""}"#);
        assert_eq!(d.uid(), codec::sha1_hex(b"monitoringnode-exporter"));
        assert_eq!(d.uid().len(), 40);
        assert_eq!(dashboard("not json").uid(), d.uid());
    }

    #[test]
    fn test_uid_from_gzip_model() {
        let mut d = dashboard("");
        d.spec.gzip_json = codec::gzip(br#"{"uid":"zipped"}"#).unwrap();
        assert_eq!(d.uid(), "zipped");
    }

    #[test]
    fn test_content_hash_tracks_content() {
        let a = dashboard(r#"{"title":"a"}"#);
        let mut b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
        b.spec.custom_folder_name = "Infra".to_string();
        assert_ne!(a.content_hash(), b.content_hash());
        let mut c = a.clone();
        c.status = Some(GrafanaDashboardStatus {
            content_cache: vec![1, 2, 3],
            ..Default::default()
        });
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_content_cache_freshness() {
        let now = Utc::now();
        let status = GrafanaDashboardStatus {
            content_cache: codec::gzip(b"{}").unwrap(),
            content_timestamp: Some(now - Duration::minutes(10)),
            content_url: "https://grafana.com/api/dashboards/1860".to_string(),
        };
        let url = "https://grafana.com/api/dashboards/1860";
        assert_eq!(status.content_cache(url, None, now), b"{}");
        assert_eq!(status.content_cache(url, Some(Duration::hours(1)), now), b"{}");
        assert!(status.content_cache(url, Some(Duration::minutes(5)), now).is_empty());
        assert!(status.content_cache("https://other", None, now).is_empty());
    }

    #[test]
    fn test_dashboard_content_cache_duration() {
        let url = "https://grafana.com/api/dashboards/1860";
        let now = Utc::now();
        let mut d = dashboard("{}");
        d.spec.url = url.to_string();
        d.status = Some(GrafanaDashboardStatus {
            content_cache: codec::gzip(b"{}").unwrap(),
            content_timestamp: Some(now - Duration::hours(2)),
            content_url: url.to_string(),
        });

        assert_eq!(d.content_cache_ttl().unwrap(), None);
        assert_eq!(d.content_cache(now).unwrap(), b"{}");

        d.spec.content_cache_duration = Some("0s".to_string());
        assert_eq!(d.content_cache_ttl().unwrap(), None);
        assert_eq!(d.content_cache(now).unwrap(), b"{}");

        d.spec.content_cache_duration = Some("1h0m0s".to_string());
        assert_eq!(d.content_cache_ttl().unwrap(), Some(Duration::hours(1)));
        assert!(d.content_cache(now).unwrap().is_empty());

        d.spec.content_cache_duration = Some("3h".to_string());
        assert_eq!(d.content_cache(now).unwrap(), b"{}");

        d.spec.content_cache_duration = Some("soon".to_string());
        assert!(matches!(d.content_cache(now), Err(ContentCacheError::Duration { .. })));
    }

    #[test]
    fn test_custom_json_data_accepts_object_or_text() {
        let yaml = r#"
name: a
type: prometheus
customJsonData: {"timeInterval": "5s"}
customSecureJsonData: '{"token":"x"}'
"#;
        let f: GrafanaDataSourceFields = serde_yaml::from_str(yaml).unwrap();
        assert!(f.custom_json_data.unwrap().is_object());
        assert!(f.custom_secure_json_data.unwrap().is_string());
    }
}
