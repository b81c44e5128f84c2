// Legacy GrafanaDataSource -> one v1beta1 GrafanaDatasource per inline entry.

use super::{sanitize, target_meta, ConversionOutput};
use crate::api::{v1alpha1, v1beta1};
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::types::{
    ResourceKind, DEFAULT_RESYNC_PERIOD, LEGACY_DATASOURCE_MARKER, LEGACY_DATASOURCE_UID,
};
use kube::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Name of the target object for one datasource entry.
pub fn datasource_target_name(namespace: &str, entry_name: &str) -> String {
    format!("{}-{}", sanitize(namespace), sanitize(&entry_name.to_lowercase()))
}

/// Converts every entry; an entry whose JSON config cannot be encoded is
/// skipped and reported while the rest still convert.
pub fn convert_datasource(
    src: &v1alpha1::GrafanaDataSource,
    config: &ConverterConfig,
) -> ConversionOutput<v1beta1::GrafanaDatasource> {
    let ns = src.namespace().unwrap_or_default();
    let name = src.name_any();
    debug!(kind = %ResourceKind::Datasource, %ns, %name, entries = src.spec.datasources.len(), "conversion requested");

    let mut out = ConversionOutput {
        objects: Vec::with_capacity(src.spec.datasources.len()),
        errors: Vec::new(),
    };
    for (index, entry) in src.spec.datasources.iter().enumerate() {
        match convert_entry(src, &ns, index, entry, config) {
            Ok(ds) => out.objects.push(ds),
            Err(e) => {
                warn!(kind = %ResourceKind::Datasource, %ns, %name, entry = %entry.name, error = %e, "skipping datasource entry");
                out.errors.push(e);
            }
        }
    }

    debug!(
        kind = %ResourceKind::Datasource,
        %ns,
        %name,
        converted = out.objects.len(),
        failed = out.errors.len(),
        "converted"
    );
    out
}

fn convert_entry(
    src: &v1alpha1::GrafanaDataSource,
    ns: &str,
    index: usize,
    entry: &v1alpha1::GrafanaDataSourceFields,
    config: &ConverterConfig,
) -> Result<v1beta1::GrafanaDatasource, ConvertError> {
    let json_data = json_config(
        index,
        entry,
        "jsonData",
        entry.custom_json_data.as_ref(),
        &entry.json_data,
    )?;
    let secure_json_data = json_config(
        index,
        entry,
        "secureJsonData",
        entry.custom_secure_json_data.as_ref(),
        &entry.secure_json_data,
    )?;

    let uid = if entry.name.contains(LEGACY_DATASOURCE_MARKER) {
        LEGACY_DATASOURCE_UID.to_string()
    } else {
        entry.uid.clone()
    };

    let spec = v1beta1::GrafanaDatasourceSpec {
        datasource: v1beta1::GrafanaDatasourceInternal {
            uid,
            name: entry.name.clone(),
            type_: entry.type_.clone(),
            url: entry.url.clone(),
            access: entry.access.clone(),
            database: entry.database.clone(),
            user: entry.user.clone(),
            is_default: Some(entry.is_default),
            basic_auth: Some(entry.basic_auth),
            basic_auth_user: entry.basic_auth_user.clone(),
            org_id: Some(entry.org_id),
            editable: Some(entry.editable),
            json_data,
            secure_json_data,
        },
        instance_selector: config.instance_selector.clone(),
        plugins: Vec::new(),
        resync_period: DEFAULT_RESYNC_PERIOD.to_string(),
        allow_cross_namespace_import: Some(true),
    };

    let target_name = datasource_target_name(ns, &entry.name);
    let mut dst = v1beta1::GrafanaDatasource::new(ns, &target_name, spec);
    dst.metadata = target_meta(src, target_name);
    Ok(dst)
}

/// The custom override if one is given, otherwise the structured map.
/// An empty map yields no config at all.
fn json_config(
    index: usize,
    entry: &v1alpha1::GrafanaDataSourceFields,
    field: &'static str,
    custom: Option<&Value>,
    structured: &BTreeMap<String, Value>,
) -> Result<Value, ConvertError> {
    match custom {
        Some(obj @ Value::Object(_)) => return Ok(obj.clone()),
        Some(Value::String(raw)) if !raw.trim().is_empty() => {
            let parsed: Value =
                serde_json::from_str(raw).map_err(|source| ConvertError::DatasourceJson {
                    index,
                    name: entry.name.clone(),
                    field,
                    source,
                })?;
            if !parsed.is_object() {
                return Err(ConvertError::DatasourceJsonShape {
                    index,
                    name: entry.name.clone(),
                    field,
                });
            }
            return Ok(parsed);
        }
        Some(Value::String(_)) | Some(Value::Null) | None => {}
        Some(_) => {
            return Err(ConvertError::DatasourceJsonShape {
                index,
                name: entry.name.clone(),
                field,
            })
        }
    }

    if structured.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::to_value(structured).map_err(|source| ConvertError::DatasourceJson {
        index,
        name: entry.name.clone(),
        field,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str) -> v1alpha1::GrafanaDataSourceFields {
        v1alpha1::GrafanaDataSourceFields {
            name: name.to_string(),
            type_: "prometheus".to_string(),
            url: "http://prometheus:9090".to_string(),
            access: "proxy".to_string(),
            org_id: 1,
            ..Default::default()
        }
    }

    fn source(entries: Vec<v1alpha1::GrafanaDataSourceFields>) -> v1alpha1::GrafanaDataSource {
        let mut ds = v1alpha1::GrafanaDataSource::new(
            "monitoring",
            "datasources",
            v1alpha1::GrafanaDataSourceSpec {
                name: "datasources.yaml".to_string(),
                datasources: entries,
            },
        );
        ds.metadata.uid = Some("0d3f5a7e-1c2b-4e6a-9f8d-7b5c3a1e2d4f".to_string());
        ds
    }

    #[test]
    fn test_target_name() {
        assert_eq!(datasource_target_name("monitoring", "Loki Logs"), "monitoring-loki-logs");
        assert_eq!(datasource_target_name("team_a", "My_DS/1"), "team-a-my-ds-1");
    }

    #[test]
    fn test_one_target_per_entry() {
        let mut loki = entry("Loki");
        loki.type_ = "loki".to_string();
        loki.json_data = BTreeMap::from([("maxLines".to_string(), json!(1000))]);
        loki.secure_json_data = BTreeMap::from([("httpHeaderValue1".to_string(), json!("Bearer t"))]);
        loki.is_default = true;

        let out = convert_datasource(&source(vec![entry("Tempo"), loki]), &ConverterConfig::default());
        assert!(out.is_complete());
        assert_eq!(out.objects.len(), 2);

        let ds = &out.objects[1];
        assert_eq!(ds.metadata.name.as_deref(), Some("monitoring-loki"));
        assert_eq!(ds.metadata.namespace.as_deref(), Some("monitoring"));
        assert_eq!(ds.spec.datasource.type_, "loki");
        assert_eq!(ds.spec.datasource.json_data, json!({"maxLines": 1000}));
        assert_eq!(ds.spec.datasource.secure_json_data, json!({"httpHeaderValue1": "Bearer t"}));
        assert_eq!(ds.spec.datasource.is_default, Some(true));
        assert_eq!(ds.spec.datasource.org_id, Some(1));
        assert_eq!(ds.spec.allow_cross_namespace_import, Some(true));
        assert_eq!(ds.spec.resync_period, DEFAULT_RESYNC_PERIOD);

        let owners = ds.metadata.owner_references.as_ref().unwrap();
        assert_eq!(owners[0].kind, "GrafanaDataSource");
        assert_eq!(owners[0].name, "datasources");

        assert!(out.objects[0].spec.datasource.json_data.is_null());
    }

    #[test]
    fn test_partial_success() {
        let mut broken = entry("Loki");
        broken.custom_json_data = Some(json!("{\"maxLines\": "));
        let out = convert_datasource(
            &source(vec![entry("Tempo"), broken, entry("Jaeger")]),
            &ConverterConfig::default(),
        );

        assert_eq!(out.objects.len(), 2);
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(out.errors[0], ConvertError::DatasourceJson { index: 1, .. }));
        assert!(out.joined_error().is_some());
        let names: Vec<_> = out.objects.iter().map(|d| d.name_any()).collect();
        assert_eq!(names, vec!["monitoring-tempo", "monitoring-jaeger"]);
    }

    #[test]
    fn test_custom_json_overrides_structured() {
        let mut e = entry("Tempo");
        e.json_data = BTreeMap::from([("ignored".to_string(), json!(true))]);
        e.custom_json_data = Some(json!({"tracesToLogs": {"datasourceUid": "loki"}}));
        e.custom_secure_json_data = Some(json!(r#"{"basicAuthPassword":"s3cret"}"#));

        let out = convert_datasource(&source(vec![e]), &ConverterConfig::default());
        let ds = &out.objects[0].spec.datasource;
        assert_eq!(ds.json_data, json!({"tracesToLogs": {"datasourceUid": "loki"}}));
        assert_eq!(ds.secure_json_data, json!({"basicAuthPassword": "s3cret"}));
    }

    #[test]
    fn test_custom_json_must_be_object() {
        let mut e = entry("Tempo");
        e.custom_json_data = Some(json!([1, 2]));
        let out = convert_datasource(&source(vec![e]), &ConverterConfig::default());
        assert!(out.objects.is_empty());
        assert!(matches!(
            out.errors[0],
            ConvertError::DatasourceJsonShape { field: "jsonData", .. }
        ));
    }

    #[test]
    fn test_legacy_prometheus_uid() {
        let mut prom = entry("Platform Prometheus");
        prom.uid = "my-own-uid".to_string();
        let mut other = entry("Thanos");
        other.uid = "thanos".to_string();

        let out = convert_datasource(&source(vec![prom, other]), &ConverterConfig::default());
        assert_eq!(out.objects[0].spec.datasource.uid, LEGACY_DATASOURCE_UID);
        assert_eq!(out.objects[1].spec.datasource.uid, "thanos");
    }

    #[test]
    fn test_datasource_conversion_is_deterministic() {
        let mut e = entry("Loki");
        e.json_data = BTreeMap::from([
            ("b".to_string(), json!(2)),
            ("a".to_string(), json!({"z": 1, "y": [1, 2]})),
        ]);
        let src = source(vec![e]);
        let a = convert_datasource(&src, &ConverterConfig::default());
        let b = convert_datasource(&src, &ConverterConfig::default());
        assert_eq!(
            serde_json::to_vec(&a.objects[0].spec).unwrap(),
            serde_json::to_vec(&b.objects[0].spec).unwrap()
        );
    }
}
