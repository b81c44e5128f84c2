// Legacy GrafanaDashboard -> v1beta1 GrafanaDashboard.

use super::target_meta;
use crate::api::{v1alpha1, v1beta1};
use crate::config::ConverterConfig;
use crate::types::{ResourceKind, DEFAULT_RESYNC_PERIOD};
use chrono::Utc;
use kube::ResourceExt;
use tracing::{debug, warn};

/// Maps a legacy dashboard onto the target schema. Content sources are copied
/// verbatim; `customFolderName` becomes `folder`.
pub fn convert_dashboard(
    src: &v1alpha1::GrafanaDashboard,
    config: &ConverterConfig,
) -> v1beta1::GrafanaDashboard {
    let ns = src.namespace().unwrap_or_default();
    let name = src.name_any();
    debug!(kind = %ResourceKind::Dashboard, %ns, %name, hash = %src.content_hash(), "conversion requested");
    match src.content_cache(Utc::now()) {
        Ok(cached) if !cached.is_empty() => {
            debug!(kind = %ResourceKind::Dashboard, %ns, %name, bytes = cached.len(), "legacy content cache is fresh")
        }
        Ok(_) => {}
        Err(e) => warn!(kind = %ResourceKind::Dashboard, %ns, %name, error = %e, "contentCacheDuration ignored"),
    }

    let s = &src.spec;
    let spec = v1beta1::GrafanaDashboardSpec {
        json: s.json.clone(),
        gzip_json: s.gzip_json.clone(),
        url: s.url.clone(),
        jsonnet: s.jsonnet.clone(),
        grafana_com: s.grafana_com.clone(),
        config_map_ref: s.config_map_ref.clone(),
        instance_selector: config.instance_selector.clone(),
        folder: s.custom_folder_name.clone(),
        plugins: s.plugins.clone(),
        content_cache_duration: s.content_cache_duration.clone(),
        resync_period: DEFAULT_RESYNC_PERIOD.to_string(),
        datasources: s.datasources.clone(),
        allow_cross_namespace_import: Some(true),
    };

    let mut dst = v1beta1::GrafanaDashboard::new(&ns, &name, spec);
    dst.metadata = target_meta(src, name.clone());
    debug!(kind = %ResourceKind::Dashboard, %ns, %name, "converted");
    dst
}
