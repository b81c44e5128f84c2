// Group/version/kind constants and small value types shared by the legacy and target APIs.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const LEGACY_GROUP: &str = "integreatly.org";
pub const LEGACY_VERSION: &str = "v1alpha1";
pub const TARGET_GROUP: &str = "grafana.integreatly.org";
pub const TARGET_VERSION: &str = "v1beta1";

/// Resync period stamped on every converted object.
pub const DEFAULT_RESYNC_PERIOD: &str = "2m";

/// UID the legacy operator assigned to its default Prometheus datasource.
/// Dashboards shipped against v1alpha1 reference it directly.
pub const LEGACY_DATASOURCE_UID: &str = "PC3E95692D54ABCC0";
pub const LEGACY_DATASOURCE_MARKER: &str = "Prometheus";

/// The four resource families handled by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Dashboard,
    Datasource,
    Folder,
    NotificationChannel,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Dashboard,
        ResourceKind::Datasource,
        ResourceKind::Folder,
        ResourceKind::NotificationChannel,
    ];

    pub fn legacy_kind(self) -> &'static str {
        match self {
            ResourceKind::Dashboard => "GrafanaDashboard",
            ResourceKind::Datasource => "GrafanaDataSource",
            ResourceKind::Folder => "GrafanaFolder",
            ResourceKind::NotificationChannel => "GrafanaNotificationChannel",
        }
    }

    pub fn target_kind(self) -> &'static str {
        match self {
            ResourceKind::Dashboard => "GrafanaDashboard",
            ResourceKind::Datasource => "GrafanaDatasource",
            ResourceKind::Folder => "GrafanaFolder",
            ResourceKind::NotificationChannel => "GrafanaContactPoint",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.legacy_kind())
    }
}

/// Reference to a key of a ConfigMap holding dashboard content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapKeyRef {
    #[serde(default)]
    pub name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

/// A dashboard input bound to an existing datasource by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDatasource {
    pub input_name: String,
    pub datasource_name: String,
}

/// A Grafana plugin required by a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrafanaPlugin {
    pub name: String,
    pub version: String,
}

/// Dashboard published on grafana.com.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrafanaComReference {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

pub(crate) fn is_false(v: &bool) -> bool {
    !*v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(ResourceKind::Datasource.legacy_kind(), "GrafanaDataSource");
        assert_eq!(ResourceKind::Datasource.target_kind(), "GrafanaDatasource");
        assert_eq!(
            ResourceKind::NotificationChannel.target_kind(),
            "GrafanaContactPoint"
        );
        assert_eq!(ResourceKind::Folder.to_string(), "GrafanaFolder");
    }

    #[test]
    fn test_grafana_com_revision_omitted() {
        let r = GrafanaComReference { id: 1860, revision: None };
        let out = serde_json::to_string(&r).unwrap();
        assert_eq!(out, r#"{"id":1860}"#);
    }
}
