//! Grafana CRD converter: watches legacy Grafana resources and keeps v1beta1 copies in sync.

use clap::Parser;
use grafana_crd_converter::config::{
    parse_namespace_selector, DEFAULT_CONFIG_PATH, WATCH_NAMESPACE_SELECTOR_ENV_VAR,
};
use grafana_crd_converter::{ConverterConfig, ConverterController, WatchScope};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, ResourceExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "grafana-crd-converter", version, about)]
struct Args {
    /// Converter parameters file (YAML or JSON)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Kubeconfig to use instead of in-cluster or default config
    #[arg(long)]
    kubeconfig: Option<PathBuf>,
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,grafana_crd_converter=debug".into());

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn client(kubeconfig: Option<&PathBuf>) -> Result<Client, Box<dyn std::error::Error + Send + Sync>> {
    let Some(path) = kubeconfig else {
        return Ok(Client::try_default().await?);
    };
    let kc = Kubeconfig::read_from(path)?;
    let config = kube::Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default()).await?;
    Ok(Client::try_from(config)?)
}

/// `WATCH_NAMESPACE` if set, otherwise the namespaces matching
/// `WATCH_NAMESPACE_SELECTOR`, otherwise the whole cluster.
async fn watch_scope(client: &Client) -> Result<WatchScope, Box<dyn std::error::Error + Send + Sync>> {
    let scope = WatchScope::from_env()?;
    if scope != WatchScope::Cluster {
        return Ok(scope);
    }
    let selector = std::env::var(WATCH_NAMESPACE_SELECTOR_ENV_VAR).unwrap_or_default();
    if selector.is_empty() {
        return Ok(scope);
    }
    let (key, value) = parse_namespace_selector(&selector)?;
    let api: Api<Namespace> = Api::all(client.clone());
    let namespaces = api
        .list(&ListParams::default().labels(&format!("{key}={value}")))
        .await?;
    let names: Vec<String> = namespaces.items.iter().map(|ns| ns.name_any()).collect();
    if names.is_empty() {
        return Err(format!("no namespaces match {WATCH_NAMESPACE_SELECTOR_ENV_VAR}={selector}").into());
    }
    Ok(WatchScope::parse(&names.join(","))?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();
    let args = Args::parse();
    info!("Starting grafana-crd-converter v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(ConverterConfig::load(&args.config)?);
    let client = client(args.kubeconfig.as_ref()).await?;
    let scope = watch_scope(&client).await?;
    info!(%scope, strategy = %config.strategy, kinds = ?config.enabled_kinds(), "converter configured");

    let Some(mut controller) = ConverterController::for_cluster(client, config, &scope) else {
        warn!("converter is disabled, idling until shutdown");
        signal::ctrl_c().await?;
        return Ok(());
    };

    let token = controller.cancellation_token();
    tokio::select! {
        res = controller.start() => res?,
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal before start completed");
            token.cancel();
        }
    }

    if !token.is_cancelled() {
        signal::ctrl_c().await?;
        info!("Received shutdown signal");
    }
    controller.stop().await;
    info!("Shutdown complete");
    Ok(())
}
