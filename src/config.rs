// Converter configuration: the parameters file and the watched namespace scope.

use crate::error::ConfigError;
use crate::types::ResourceKind;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

/// Env variable listing the namespaces to watch. Empty or unset means cluster scope.
pub const WATCH_NAMESPACE_ENV_VAR: &str = "WATCH_NAMESPACE";
/// Env variable with a `key:value` namespace label used when no list is given.
pub const WATCH_NAMESPACE_SELECTOR_ENV_VAR: &str = "WATCH_NAMESPACE_SELECTOR";
pub const DEFAULT_CONFIG_PATH: &str = "/opt/grafana-converter/parameters.yaml";

const NAMESPACE_PATTERN: &str = "^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(NAMESPACE_PATTERN).expect("namespace pattern is valid")
});

/// What to do when the store rejects a write because the object changed underneath.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    /// Log and wait for the next watch event to trigger another attempt.
    #[default]
    RelyOnNextEvent,
    /// Re-read the target and apply the desired spec once more.
    RetryOnce,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_selector: Option<LabelSelector>,
    #[serde(default)]
    pub dashboard: bool,
    #[serde(default)]
    pub datasource: bool,
    #[serde(default)]
    pub folder: bool,
    #[serde(default)]
    pub notification: bool,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

impl ConverterConfig {
    /// Reads the YAML or JSON parameters file. A missing file yields the
    /// all-disabled default.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn is_enabled(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Dashboard => self.dashboard,
            ResourceKind::Datasource => self.datasource,
            ResourceKind::Folder => self.folder,
            ResourceKind::NotificationChannel => self.notification,
        }
    }

    /// Kinds to convert; empty unless the converter itself is enabled.
    pub fn enabled_kinds(&self) -> Vec<ResourceKind> {
        if !self.enable {
            return Vec::new();
        }
        ResourceKind::ALL
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }
}

/// Namespaces the converter watches: the whole cluster or an explicit list, never a mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchScope {
    Cluster,
    Namespaces(Vec<String>),
}

impl WatchScope {
    /// Parses a comma-separated namespace list. Every token must be a valid
    /// namespace name.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        if value.is_empty() {
            return Ok(WatchScope::Cluster);
        }
        let mut namespaces = Vec::new();
        for ns in value.split(',') {
            if !NAMESPACE_RE.is_match(ns) {
                return Err(ConfigError::InvalidNamespace {
                    namespace: ns.to_string(),
                    var: WATCH_NAMESPACE_ENV_VAR.to_string(),
                    value: value.to_string(),
                    pattern: NAMESPACE_PATTERN.to_string(),
                });
            }
            if !namespaces.iter().any(|n| n == ns) {
                namespaces.push(ns.to_string());
            }
        }
        Ok(WatchScope::Namespaces(namespaces))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(&std::env::var(WATCH_NAMESPACE_ENV_VAR).unwrap_or_default())
    }

    /// Namespace arguments for informer subscriptions: `None` is cluster-wide.
    pub fn subscriptions(&self) -> Vec<Option<String>> {
        match self {
            WatchScope::Cluster => vec![None],
            WatchScope::Namespaces(nss) => nss.iter().cloned().map(Some).collect(),
        }
    }
}

impl fmt::Display for WatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchScope::Cluster => f.write_str("cluster"),
            WatchScope::Namespaces(nss) => f.write_str(&nss.join(",")),
        }
    }
}

/// Splits a `key:value` namespace label selector.
pub fn parse_namespace_selector(value: &str) -> Result<(String, String), ConfigError> {
    match value.split_once(':') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(ConfigError::InvalidNamespaceSelector(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
enable: true
strategy: migrate
instanceSelector:
  matchLabels:
    dashboards: grafana
dashboard: true
folder: true
"#;
        let cfg = ConverterConfig::parse(yaml).unwrap();
        assert!(cfg.enable);
        assert_eq!(cfg.strategy, "migrate");
        let labels = cfg.instance_selector.as_ref().unwrap().match_labels.as_ref().unwrap();
        assert_eq!(labels.get("dashboards").map(String::as_str), Some("grafana"));
        assert_eq!(
            cfg.enabled_kinds(),
            vec![ResourceKind::Dashboard, ResourceKind::Folder]
        );
        assert_eq!(cfg.conflict_policy, ConflictPolicy::RelyOnNextEvent);
    }

    #[test]
    fn test_parse_json_config() {
        let json = r#"{"enable": true, "datasource": true, "notification": true, "conflictPolicy": "retryOnce"}"#;
        let cfg = ConverterConfig::parse(json).unwrap();
        assert!(cfg.is_enabled(ResourceKind::Datasource));
        assert!(cfg.is_enabled(ResourceKind::NotificationChannel));
        assert!(!cfg.is_enabled(ResourceKind::Dashboard));
        assert_eq!(cfg.conflict_policy, ConflictPolicy::RetryOnce);
    }

    #[test]
    fn test_disabled_config_has_no_kinds() {
        let cfg = ConverterConfig::parse("dashboard: true").unwrap();
        assert!(cfg.enabled_kinds().is_empty());
    }

    #[test]
    fn test_missing_file_is_default() {
        let cfg = ConverterConfig::load("/nonexistent/grafana-converter/parameters.yaml").unwrap();
        assert_eq!(cfg, ConverterConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("converter-config-{}.yaml", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "enable: true\nnotification: true").unwrap();
        let cfg = ConverterConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.enabled_kinds(), vec![ResourceKind::NotificationChannel]);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let path = std::env::temp_dir().join(format!("converter-bad-{}.yaml", std::process::id()));
        std::fs::write(&path, "enable: [not, a, bool").unwrap();
        let err = ConverterConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_watch_scope_cluster() {
        assert_eq!(WatchScope::parse("").unwrap(), WatchScope::Cluster);
        assert_eq!(WatchScope::Cluster.subscriptions(), vec![None]);
    }

    #[test]
    fn test_watch_scope_namespaces() {
        let scope = WatchScope::parse("monitoring,team-a,monitoring").unwrap();
        assert_eq!(
            scope,
            WatchScope::Namespaces(vec!["monitoring".to_string(), "team-a".to_string()])
        );
        assert_eq!(scope.to_string(), "monitoring,team-a");
    }

    #[test]
    fn test_watch_scope_rejects_invalid_tokens() {
        for bad in ["Monitoring", "team_a", "-ns", "ns-", "a,,b", "ns ,b", "a,"] {
            let err = WatchScope::parse(bad).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidNamespace { .. }), "{bad}");
        }
    }

    #[test]
    fn test_namespace_selector() {
        assert_eq!(
            parse_namespace_selector("environment: dev").unwrap(),
            ("environment".to_string(), "dev".to_string())
        );
        assert!(parse_namespace_selector("environment").is_err());
    }
}
