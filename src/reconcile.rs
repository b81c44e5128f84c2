// Upserts converted objects: create if absent, merge-update if different, otherwise skip.

use crate::api::HasSpec;
use crate::codec;
use crate::config::{ConflictPolicy, ConverterConfig};
use crate::convert::{Convert, GrafanaResource};
use crate::error::{ConverterError, ConverterResult, StoreError};
use crate::store::ObjectStore;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Skipped,
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReconcileOutcome::Created => "created",
            ReconcileOutcome::Updated => "updated",
            ReconcileOutcome::Skipped => "skipped",
        })
    }
}

/// True when both specs serialize to the same canonical JSON.
pub fn same_spec<K: HasSpec>(a: &K, b: &K) -> Result<bool, codec::CodecError> {
    Ok(codec::spec_digest(a.spec())? == codec::spec_digest(b.spec())?)
}

/// Adds `desired` entries to `existing`, overwriting colliding keys and
/// keeping everything else.
fn merge_map(existing: &mut Option<BTreeMap<String, String>>, desired: &Option<BTreeMap<String, String>>) {
    if let Some(desired) = desired {
        existing
            .get_or_insert_with(BTreeMap::new)
            .extend(desired.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Applies `desired` onto `existing`: spec replaced, labels and annotations
/// merged, owner references replaced.
pub fn merge_into<K: GrafanaResource>(existing: &mut K, desired: &K) {
    *existing.spec_mut() = desired.spec().clone();
    let desired_meta = desired.meta();
    let meta = existing.meta_mut();
    merge_map(&mut meta.labels, &desired_meta.labels);
    merge_map(&mut meta.annotations, &desired_meta.annotations);
    meta.owner_references = desired_meta.owner_references.clone();
}

/// Converts legacy objects of one kind and reconciles the results against the store.
pub struct ReconcilePipeline<L: Convert> {
    store: Arc<dyn ObjectStore<L::Target>>,
    config: Arc<ConverterConfig>,
}

impl<L: Convert> Clone for ReconcilePipeline<L> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<L: Convert> ReconcilePipeline<L> {
    pub fn new(store: Arc<dyn ObjectStore<L::Target>>, config: Arc<ConverterConfig>) -> Self {
        Self { store, config }
    }

    /// Handles one source event. `old` is set for updates; an update whose
    /// legacy spec did not change is skipped without touching the store.
    /// Failures are logged here and reported per target.
    pub async fn handle(&self, old: Option<&L>, new: &L) -> Vec<ConverterResult<ReconcileOutcome>> {
        let kind = L::KIND;
        let ns = new.namespace().unwrap_or_default();
        let name = new.name_any();

        if let Some(old) = old {
            match same_spec(old, new) {
                Ok(true) => {
                    debug!(%kind, %ns, %name, "no diffs in legacy spec");
                    return vec![Ok(ReconcileOutcome::Skipped)];
                }
                Ok(false) => {}
                Err(e) => {
                    error!(%kind, %ns, %name, error = %e, "cannot compare legacy specs");
                    return vec![Err(e.into())];
                }
            }
        }

        let converted = new.convert(&self.config);
        for e in &converted.errors {
            error!(%kind, %ns, %name, error = %e, "conversion failed");
        }

        let mut results = Vec::with_capacity(converted.objects.len());
        for desired in converted.objects {
            let target = desired.name_any();
            let res = self.reconcile(desired).await;
            match &res {
                Ok(outcome) => info!(%kind, %ns, %name, target_kind = kind.target_kind(), %target, %outcome, "reconciled"),
                Err(e) => error!(%kind, %ns, %name, target_kind = kind.target_kind(), %target, error = %e, "reconcile failed"),
            }
            results.push(res);
        }
        results
    }

    /// Create-or-update for one desired target object.
    pub async fn reconcile(&self, desired: L::Target) -> ConverterResult<ReconcileOutcome> {
        let ns = desired.namespace().unwrap_or_default();
        let name = desired.name_any();

        match self.store.get(&ns, &name).await {
            Ok(existing) => self.update(existing, &desired).await,
            Err(StoreError::NotFound(_)) => match self.store.create(&desired).await {
                Ok(_) => Ok(ReconcileOutcome::Created),
                Err(StoreError::AlreadyExists(_)) => {
                    debug!(kind = %L::KIND, target_kind = L::KIND.target_kind(), %ns, %name, "target appeared concurrently, updating instead");
                    let existing = self.store.get(&ns, &name).await?;
                    self.update(existing, &desired).await
                }
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, mut existing: L::Target, desired: &L::Target) -> ConverterResult<ReconcileOutcome> {
        if same_spec(&existing, desired)? {
            return Ok(ReconcileOutcome::Skipped);
        }
        merge_into(&mut existing, desired);
        match self.store.update(&existing).await {
            Ok(_) => Ok(ReconcileOutcome::Updated),
            Err(StoreError::Conflict(key)) if self.config.conflict_policy == ConflictPolicy::RetryOnce => {
                warn!(kind = %L::KIND, target_kind = L::KIND.target_kind(), %key, "conflict on update, retrying once");
                let ns = existing.namespace().unwrap_or_default();
                let mut fresh = self.store.get(&ns, &existing.name_any()).await?;
                if same_spec(&fresh, desired)? {
                    return Ok(ReconcileOutcome::Skipped);
                }
                merge_into(&mut fresh, desired);
                self.store.update(&fresh).await?;
                Ok(ReconcileOutcome::Updated)
            }
            Err(e) => Err(ConverterError::Store(e)),
        }
    }
}
