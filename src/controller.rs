// Source watchers and the controller that runs them under one lifecycle.

use crate::api::v1alpha1;
use crate::config::{ConverterConfig, WatchScope};
use crate::convert::Convert;
use crate::error::{ConverterError, ConverterResult, InformerError};
use crate::reconcile::ReconcilePipeline;
use crate::store::{KubeStore, ObjectStore};
use crate::types::ResourceKind;
use crate::watch::{Informer, KubeInformer, WatchEvent};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Binds one legacy kind in one namespace scope to its reconcile pipeline.
pub struct SourceWatcher<L: Convert> {
    informer: Arc<dyn Informer<L>>,
    pipeline: ReconcilePipeline<L>,
    namespace: Option<String>,
}

impl<L: Convert> SourceWatcher<L> {
    pub fn new(informer: Arc<dyn Informer<L>>, pipeline: ReconcilePipeline<L>, namespace: Option<String>) -> Self {
        Self {
            informer,
            pipeline,
            namespace,
        }
    }

    pub fn scope(&self) -> String {
        self.namespace.clone().unwrap_or_else(|| "cluster".to_string())
    }

    /// Dispatches every event to its own task until cancelled. `synced` fires
    /// once the informer has delivered its initial listing.
    pub async fn run(self, synced: oneshot::Sender<()>, cancel: CancellationToken) -> ConverterResult<()> {
        let kind = L::KIND;
        let scope = self.scope();
        let mut synced = Some(synced);
        let mut events = self.informer.subscribe(self.namespace.as_deref());
        debug!(%kind, %scope, "watch started");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = events.next() => next,
            };
            match next {
                Some(Ok(WatchEvent::Synced)) => {
                    if let Some(tx) = synced.take() {
                        debug!(%kind, %scope, "initial sync complete");
                        let _ = tx.send(());
                    }
                }
                Some(Ok(WatchEvent::Added(obj))) => {
                    let pipeline = self.pipeline.clone();
                    tokio::spawn(async move {
                        pipeline.handle(None, &obj).await;
                    });
                }
                Some(Ok(WatchEvent::Updated { old, new })) => {
                    let pipeline = self.pipeline.clone();
                    tokio::spawn(async move {
                        pipeline.handle(Some(&old), &new).await;
                    });
                }
                Some(Err(e)) => warn!(%kind, %scope, error = %e, "watch error"),
                None if synced.is_some() => {
                    return Err(ConverterError::Watcher {
                        kind,
                        scope,
                        source: InformerError::EndedBeforeSync,
                    })
                }
                None => break,
            }
        }
        debug!(%kind, %scope, "watch stopped");
        Ok(())
    }
}

type WatcherTask = Box<dyn FnOnce(oneshot::Sender<()>, CancellationToken) -> BoxFuture<'static, ConverterResult<()>> + Send>;

struct PendingWatcher {
    label: String,
    run: WatcherTask,
}

/// Owns every source watcher; starts and stops them together.
pub struct ConverterController {
    cancel: CancellationToken,
    pending: Vec<PendingWatcher>,
    running: Vec<(String, JoinHandle<ConverterResult<()>>)>,
}

impl Default for ConverterController {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl ConverterController {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            pending: Vec::new(),
            running: Vec::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn watcher_count(&self) -> usize {
        self.pending.len() + self.running.len()
    }

    pub fn add_watcher<L: Convert>(&mut self, watcher: SourceWatcher<L>) {
        let label = format!("{}@{}", L::KIND, watcher.scope());
        self.pending.push(PendingWatcher {
            label,
            run: Box::new(move |synced, cancel| watcher.run(synced, cancel).boxed()),
        });
    }

    /// Adds one watcher per subscription of `scope` for the legacy kind `L`.
    pub fn add_kind<L: Convert>(
        &mut self,
        informer: Arc<dyn Informer<L>>,
        store: Arc<dyn ObjectStore<L::Target>>,
        config: Arc<ConverterConfig>,
        scope: &WatchScope,
    ) {
        let pipeline = ReconcilePipeline::new(store, config);
        for namespace in scope.subscriptions() {
            self.add_watcher(SourceWatcher::new(informer.clone(), pipeline.clone(), namespace));
        }
    }

    /// Controller over the Kubernetes API for every kind the config enables.
    /// `None` when the converter is disabled or no kind is selected.
    pub fn for_cluster(client: kube::Client, config: Arc<ConverterConfig>, scope: &WatchScope) -> Option<Self> {
        let kinds = config.enabled_kinds();
        if kinds.is_empty() {
            return None;
        }
        let mut controller = Self::default();
        for kind in kinds {
            match kind {
                ResourceKind::Dashboard => controller.add_kube_kind::<v1alpha1::GrafanaDashboard>(&client, &config, scope),
                ResourceKind::Datasource => controller.add_kube_kind::<v1alpha1::GrafanaDataSource>(&client, &config, scope),
                ResourceKind::Folder => controller.add_kube_kind::<v1alpha1::GrafanaFolder>(&client, &config, scope),
                ResourceKind::NotificationChannel => {
                    controller.add_kube_kind::<v1alpha1::GrafanaNotificationChannel>(&client, &config, scope)
                }
            }
        }
        Some(controller)
    }

    fn add_kube_kind<L: Convert>(&mut self, client: &kube::Client, config: &Arc<ConverterConfig>, scope: &WatchScope) {
        self.add_kind::<L>(
            Arc::new(KubeInformer::<L>::new(client.clone())),
            Arc::new(KubeStore::<L::Target>::new(client.clone())),
            config.clone(),
            scope,
        );
    }

    /// Starts every watcher and returns once all have completed their initial
    /// sync. Fails if a watcher stops before syncing or the controller is
    /// cancelled first.
    pub async fn start(&mut self) -> ConverterResult<()> {
        let mut waiting = FuturesUnordered::new();
        for PendingWatcher { label, run } in self.pending.drain(..) {
            let (tx, rx) = oneshot::channel();
            let handle = tokio::spawn(run(tx, self.cancel.child_token()));
            let index = self.running.len();
            waiting.push(async move { (index, rx.await.is_ok()) });
            self.running.push((label, handle));
        }

        // Watchers report in any order; the first one to fail decides.
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ConverterError::Cancelled),
                next = waiting.next() => next,
            };
            let Some((index, synced)) = next else { break };
            if !synced {
                return Err(self.take_failure(index).await);
            }
        }
        info!(watchers = self.running.len(), "converter started");
        Ok(())
    }

    async fn take_failure(&mut self, index: usize) -> ConverterError {
        let (label, handle) = self.running.swap_remove(index);
        error!(watcher = %label, "watcher stopped before initial sync");
        match handle.await {
            Ok(Err(e)) => e,
            Ok(Ok(())) | Err(_) => ConverterError::Cancelled,
        }
    }

    /// Stops dispatching new events and waits for the watch loops to exit.
    /// Event handlers already in flight run to completion on their own.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for (label, handle) in self.running.drain(..) {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(watcher = %label, error = %e, "watcher failed"),
                Err(e) => warn!(watcher = %label, error = %e, "watcher task aborted"),
            }
        }
        info!("converter stopped");
    }
}
