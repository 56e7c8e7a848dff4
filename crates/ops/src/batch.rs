//! Cluster-wide inventory and migrate-everything mode.

use ferry_core::source::{ready_message, HelmRelease, Kustomization};
use ferry_core::{decode, kinds, ObjectKey, ResourceType};
use ferry_kubehub::ObjectStore;
use ferry_translate::TargetSettings;
use kube::ResourceExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::cutover::{Cutover, CutoverError, CutoverPlan, CutoverReport};
use crate::decommission::{decommission, DecommissionError, DecommissionOptions, DecommissionReport};
use crate::reader::{ensure_target_controller, helm_release_graph, kustomization_graph, ReadError};

/// Width the status column is cut to.
pub const STATUS_WIDTH: usize = 60;
const UNKNOWN_STATUS: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkloadKind {
    Kustomization,
    HelmRelease,
}

impl WorkloadKind {
    pub fn resource_type(self) -> ResourceType {
        match self {
            WorkloadKind::Kustomization => kinds::KUSTOMIZATION,
            WorkloadKind::HelmRelease => kinds::HELM_RELEASE,
        }
    }
}

/// One row of the scan table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadStatus {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
    pub suspended: bool,
    pub status: String,
}

impl WorkloadStatus {
    pub fn key(&self) -> ObjectKey { self.kind.resource_type().key(Some(&self.namespace), &self.name) }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub kustomizations: Vec<Kustomization>,
    pub helm_releases: Vec<HelmRelease>,
}

impl Inventory {
    pub fn is_empty(&self) -> bool { self.kustomizations.is_empty() && self.helm_releases.is_empty() }

    /// Rows in migration order: Kustomizations, then HelmReleases.
    pub fn rows(&self) -> Vec<WorkloadStatus> {
        let ks = self.kustomizations.iter().map(|k| WorkloadStatus {
            kind: WorkloadKind::Kustomization,
            namespace: k.namespace().unwrap_or_default(),
            name: k.name_any(),
            suspended: k.spec.suspend,
            status: status_column(k.status.as_ref().and_then(|s| ready_message(&s.conditions))),
        });
        let hr = self.helm_releases.iter().map(|h| WorkloadStatus {
            kind: WorkloadKind::HelmRelease,
            namespace: h.namespace().unwrap_or_default(),
            name: h.name_any(),
            suspended: h.spec.suspend,
            status: status_column(h.status.as_ref().and_then(|s| ready_message(&s.conditions))),
        });
        ks.chain(hr).collect()
    }
}

/// Cut `message` to at most `width` characters.
pub fn truncate_status(message: &str, width: usize) -> String { message.chars().take(width).collect() }

fn status_column(message: Option<&str>) -> String {
    match message {
        Some(m) if !m.is_empty() => truncate_status(m, STATUS_WIDTH),
        _ => UNKNOWN_STATUS.to_string(),
    }
}

/// List every Kustomization and HelmRelease in the cluster.
pub async fn scan(store: &dyn ObjectStore) -> Result<Inventory, ReadError> {
    let mut inventory = Inventory::default();
    for obj in list_all(store, &kinds::KUSTOMIZATION).await? {
        inventory.kustomizations.push(decode(&kinds::KUSTOMIZATION, obj)?);
    }
    for obj in list_all(store, &kinds::HELM_RELEASE).await? {
        inventory.helm_releases.push(decode(&kinds::HELM_RELEASE, obj)?);
    }
    info!(kustomizations = inventory.kustomizations.len(), helm_releases = inventory.helm_releases.len(), "scanned");
    Ok(inventory)
}

async fn list_all(store: &dyn ObjectStore, rt: &ResourceType) -> Result<Vec<kube::core::DynamicObject>, ReadError> {
    store.list(rt, None, None).await.map_err(|source| ReadError::Store { key: rt.key(None, "*"), source })
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub settings: TargetSettings,
    pub decommission: DecommissionOptions,
}

#[derive(Debug)]
pub struct WorkloadOutcome {
    pub workload: ObjectKey,
    pub result: Result<CutoverReport, CutoverError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<WorkloadOutcome>,
    /// `None` when decommission was not attempted.
    pub decommission: Option<Result<DecommissionReport, DecommissionError>>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = (&ObjectKey, &CutoverError)> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|e| (&o.workload, e)))
    }

    pub fn all_workloads_succeeded(&self) -> bool { self.outcomes.iter().all(|o| o.result.is_ok()) }

    pub fn is_success(&self) -> bool {
        self.all_workloads_succeeded() && matches!(self.decommission, Some(Ok(_)))
    }
}

/// Cut over every workload in `inventory`, then decommission Flux if all of
/// them succeeded. A failed workload is recorded and the rest continue.
///
/// All plans are read before the first mutation so that sources shared
/// between workloads are still present when each graph is resolved.
pub async fn migrate_all(store: &dyn ObjectStore, inventory: &Inventory, opts: &BatchOptions) -> Result<BatchReport, ReadError> {
    ensure_target_controller(store, &opts.settings.argocd_namespace).await?;

    let mut planned: Vec<(ObjectKey, Result<CutoverPlan, CutoverError>)> = Vec::new();
    for k in &inventory.kustomizations {
        let key = kinds::KUSTOMIZATION.key(k.namespace().as_deref(), &k.name_any());
        let plan = kustomization_graph(store, k.clone())
            .await
            .map(|g| CutoverPlan::for_kustomization(&g, &opts.settings))
            .map_err(|source| CutoverError::Plan { workload: key.clone(), source });
        planned.push((key, plan));
    }
    for h in &inventory.helm_releases {
        let key = kinds::HELM_RELEASE.key(h.namespace().as_deref(), &h.name_any());
        let plan = helm_release_graph(store, h.clone())
            .await
            .map(|g| CutoverPlan::for_helm_release(&g, &opts.settings))
            .map_err(|source| CutoverError::Plan { workload: key.clone(), source });
        planned.push((key, plan));
    }

    let mut report = BatchReport::default();
    for (workload, plan) in planned {
        let result = match plan {
            Ok(plan) => Cutover::new(store, plan).run().await,
            Err(e) => {
                warn!(%workload, error = %e, "planning failed; skipping workload");
                Err(e)
            }
        };
        report.outcomes.push(WorkloadOutcome { workload, result });
    }

    if report.all_workloads_succeeded() {
        report.decommission = Some(decommission(store, &opts.decommission).await);
    } else {
        warn!(failed = report.failures().count(), "not decommissioning flux: some workloads failed");
    }
    Ok(report)
}
