// Legacy GrafanaNotificationChannel -> v1beta1 GrafanaContactPoint.

use super::target_meta;
use crate::api::{v1alpha1, v1beta1};
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::types::{ResourceKind, DEFAULT_RESYNC_PERIOD};
use kube::ResourceExt;
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

/// Contact point definition embedded in a legacy notification channel.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddedContactPoint {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    type_: String,
    #[serde(default)]
    settings: Option<Value>,
    #[serde(default)]
    disable_resolve_message: bool,
}

/// Fails when the embedded JSON is present but malformed; no partial object is produced.
pub fn convert_notification_channel(
    src: &v1alpha1::GrafanaNotificationChannel,
    config: &ConverterConfig,
) -> Result<v1beta1::GrafanaContactPoint, ConvertError> {
    let ns = src.namespace().unwrap_or_default();
    let name = src.name_any();
    debug!(kind = %ResourceKind::NotificationChannel, %ns, %name, "conversion requested");

    let embedded = embedded_contact_point(&src.spec.json).map_err(|source| ConvertError::ContactPoint {
        namespace: ns.clone(),
        name: name.clone(),
        source,
    })?;

    let settings = match embedded.settings {
        Some(v @ Value::Object(_)) => v,
        Some(Value::Null) | None => Value::Object(JsonMap::new()),
        Some(other) => other,
    };

    let spec = v1beta1::GrafanaContactPointSpec {
        resync_period: DEFAULT_RESYNC_PERIOD.to_string(),
        instance_selector: config.instance_selector.clone(),
        disable_resolve_message: embedded.disable_resolve_message,
        name: embedded.name,
        settings,
        type_: embedded.type_,
        allow_cross_namespace_import: Some(true),
    };

    let mut dst = v1beta1::GrafanaContactPoint::new(&ns, &name, spec);
    dst.metadata = target_meta(src, name.clone());
    debug!(kind = %ResourceKind::NotificationChannel, %ns, %name, "converted");
    Ok(dst)
}

fn embedded_contact_point(raw: &str) -> Result<EmbeddedContactPoint, serde_json::Error> {
    if raw.is_empty() {
        return Ok(EmbeddedContactPoint::default());
    }
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel(json: &str) -> v1alpha1::GrafanaNotificationChannel {
        v1alpha1::GrafanaNotificationChannel::new(
            "monitoring",
            "oncall",
            v1alpha1::GrafanaNotificationChannelSpec {
                name: "oncall.json".to_string(),
                json: json.to_string(),
            },
        )
    }

    #[test]
    fn test_convert_contact_point() {
        let src = channel(
            r#"{
              "name": "Oncall email",
              "type": "email",
              "disableResolveMessage": true,
              "settings": {"addresses": "oncall@example.com", "singleEmail": true}
            }"#,
        );
        let dst = convert_notification_channel(&src, &ConverterConfig::default()).unwrap();
        assert_eq!(dst.metadata.name.as_deref(), Some("oncall"));
        assert_eq!(dst.spec.name, "Oncall email");
        assert_eq!(dst.spec.type_, "email");
        assert!(dst.spec.disable_resolve_message);
        assert_eq!(
            dst.spec.settings,
            json!({"addresses": "oncall@example.com", "singleEmail": true})
        );
        assert_eq!(dst.spec.allow_cross_namespace_import, Some(true));
        assert_eq!(dst.spec.resync_period, DEFAULT_RESYNC_PERIOD);
    }

    #[test]
    fn test_malformed_blob_is_fatal() {
        let err = convert_notification_channel(&channel(r#"{"name": "x", "type": "#), &ConverterConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::ContactPoint { ref name, .. } if name == "oncall"));
    }

    #[test]
    fn test_whitespace_blob_is_fatal() {
        let err = convert_notification_channel(&channel("   \n"), &ConverterConfig::default()).unwrap_err();
        assert!(matches!(err, ConvertError::ContactPoint { .. }));
    }

    #[test]
    fn test_empty_blob_and_missing_settings() {
        let dst = convert_notification_channel(&channel(""), &ConverterConfig::default()).unwrap();
        assert!(dst.spec.name.is_empty());
        assert_eq!(dst.spec.settings, json!({}));

        let dst = convert_notification_channel(&channel(r#"{"name":"slack","type":"slack"}"#), &ConverterConfig::default())
            .unwrap();
        assert_eq!(dst.spec.settings, json!({}));
        assert!(!dst.spec.disable_resolve_message);
    }
}
