//! Remove the Flux installation once every workload has been migrated.

use std::time::Duration;

use ferry_core::{kinds, ObjectKey, ResourceType, DEFAULT_FLUX_NAMESPACE, FLUX_PART_OF_SELECTOR};
use ferry_kubehub::{ObjectStore, StoreError};
use kube::ResourceExt;
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

pub const DEFAULT_DECOMMISSION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecommissionStep {
    Components,
    Finalizers,
    CustomResourceDefinitions,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecommissionOptions {
    pub namespace: String,
    pub timeout: Duration,
}

impl Default for DecommissionOptions {
    fn default() -> Self { Self { namespace: DEFAULT_FLUX_NAMESPACE.to_string(), timeout: DEFAULT_DECOMMISSION_TIMEOUT } }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecommissionReport {
    pub completed: Vec<DecommissionStep>,
    pub deleted: Vec<ObjectKey>,
    pub finalizers_removed: Vec<ObjectKey>,
}

type Failures = Vec<(ObjectKey, StoreError)>;

#[derive(Debug, thiserror::Error)]
pub enum DecommissionError {
    #[error("decommission step {step:?} failed for {} object(s); completed steps: {:?}", .failures.len(), .report.completed)]
    Step { step: DecommissionStep, failures: Failures, report: DecommissionReport },
    #[error("decommission timed out after {after:?}; completed steps: {completed:?}")]
    Timeout { after: Duration, completed: Vec<DecommissionStep> },
}

/// Components, finalizers, CRDs, namespace; in that order, under `opts.timeout`.
///
/// Within a step every object is attempted. A step with failures stops the
/// sequence; nothing is restored.
pub async fn decommission(store: &dyn ObjectStore, opts: &DecommissionOptions) -> Result<DecommissionReport, DecommissionError> {
    let mut report = DecommissionReport::default();
    let outcome = tokio::time::timeout(opts.timeout, run_steps(store, &opts.namespace, &mut report)).await;
    counter!("decommission_deleted", report.deleted.len() as u64);
    match outcome {
        Ok(Ok(())) => {
            info!(ns = %opts.namespace, deleted = report.deleted.len(), "flux decommissioned");
            Ok(report)
        }
        Ok(Err((step, failures))) => Err(DecommissionError::Step { step, failures, report }),
        Err(_) => {
            warn!(ns = %opts.namespace, after = ?opts.timeout, completed = ?report.completed, "decommission timed out");
            Err(DecommissionError::Timeout { after: opts.timeout, completed: report.completed })
        }
    }
}

async fn run_steps(store: &dyn ObjectStore, namespace: &str, report: &mut DecommissionReport) -> Result<(), (DecommissionStep, Failures)> {
    let steps = [
        DecommissionStep::Components,
        DecommissionStep::Finalizers,
        DecommissionStep::CustomResourceDefinitions,
        DecommissionStep::Namespace,
    ];
    for step in steps {
        info!(?step, ns = %namespace, "decommission step");
        let failures = match step {
            DecommissionStep::Components => remove_components(store, namespace, report).await,
            DecommissionStep::Finalizers => remove_finalizers(store, report).await,
            DecommissionStep::CustomResourceDefinitions => remove_crds(store, report).await,
            DecommissionStep::Namespace => remove_namespace(store, namespace, report).await,
        };
        if !failures.is_empty() {
            return Err((step, failures));
        }
        report.completed.push(step);
    }
    Ok(())
}

fn wildcard(rt: &ResourceType, namespace: Option<&str>) -> ObjectKey { rt.key(namespace, "*") }

/// Objects of `rt` to act on. A kind the cluster does not serve lists as empty.
async fn list_or_record(store: &dyn ObjectStore, rt: &ResourceType, namespace: Option<&str>, selector: Option<&str>, failures: &mut Failures) -> Vec<kube::core::DynamicObject> {
    match store.list(rt, namespace, selector).await {
        Ok(items) => items,
        Err(StoreError::NotFound) => {
            debug!(kind = rt.kind, "kind not served; nothing to remove");
            Vec::new()
        }
        Err(e) => {
            failures.push((wildcard(rt, namespace), e));
            Vec::new()
        }
    }
}

async fn delete_all(store: &dyn ObjectStore, rt: &ResourceType, namespace: Option<&str>, selector: Option<&str>, report: &mut DecommissionReport, failures: &mut Failures) {
    for obj in list_or_record(store, rt, namespace, selector, failures).await {
        let name = obj.name_any();
        let ns = obj.namespace();
        let key = rt.key(ns.as_deref(), &name);
        match store.delete(rt, ns.as_deref(), &name).await {
            Ok(()) | Err(StoreError::NotFound) => {
                debug!(object = %key, "removed");
                report.deleted.push(key);
            }
            Err(e) => {
                warn!(object = %key, error = %e, "remove failed");
                failures.push((key, e));
            }
        }
    }
}

async fn remove_components(store: &dyn ObjectStore, namespace: &str, report: &mut DecommissionReport) -> Failures {
    let mut failures = Vec::new();
    for rt in kinds::FLUX_NAMESPACED_COMPONENTS {
        delete_all(store, rt, Some(namespace), Some(FLUX_PART_OF_SELECTOR), report, &mut failures).await;
    }
    for rt in kinds::FLUX_CLUSTER_COMPONENTS {
        delete_all(store, rt, None, Some(FLUX_PART_OF_SELECTOR), report, &mut failures).await;
    }
    failures
}

/// With the controllers gone nothing would ever clear these finalizers.
async fn remove_finalizers(store: &dyn ObjectStore, report: &mut DecommissionReport) -> Failures {
    let mut failures = Vec::new();
    let patch = json!({ "metadata": { "finalizers": null } });
    for rt in kinds::FLUX_CUSTOM_RESOURCES {
        for obj in list_or_record(store, rt, None, None, &mut failures).await {
            if obj.finalizers().is_empty() {
                continue;
            }
            let name = obj.name_any();
            let ns = obj.namespace();
            let key = rt.key(ns.as_deref(), &name);
            match store.merge_patch(rt, ns.as_deref(), &name, &patch).await {
                Ok(()) => report.finalizers_removed.push(key),
                Err(StoreError::NotFound) => {}
                Err(e) => failures.push((key, e)),
            }
        }
    }
    failures
}

async fn remove_crds(store: &dyn ObjectStore, report: &mut DecommissionReport) -> Failures {
    let mut failures = Vec::new();
    delete_all(store, &kinds::CRD, None, Some(FLUX_PART_OF_SELECTOR), report, &mut failures).await;
    failures
}

async fn remove_namespace(store: &dyn ObjectStore, namespace: &str, report: &mut DecommissionReport) -> Failures {
    let key = kinds::NAMESPACE.key(None, namespace);
    match store.delete(&kinds::NAMESPACE, None, namespace).await {
        Ok(()) | Err(StoreError::NotFound) => {
            report.deleted.push(key);
            Vec::new()
        }
        Err(e) => vec![(key, e)],
    }
}
