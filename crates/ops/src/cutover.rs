//! Cutover orchestrator: suspend the Flux sources, create the Argo CD
//! objects, then delete the sources. Failures leave the cluster where they
//! happened; nothing is rolled back.

use std::fmt;
use std::time::Instant;

use ferry_core::{kinds, ObjectKey, ResourceType, TargetObject};
use ferry_kubehub::{ObjectStore, StoreError};
use ferry_translate::{translate_helm_release, translate_kustomization, HelmReleaseGraph, KustomizationGraph, TargetSettings};
use kube::core::DynamicObject;
use kube::ResourceExt;
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::reader::{read_helm_release, read_kustomization, ReadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CutoverState {
    Planned,
    Suspended,
    Created,
    SourceDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CutoverStep {
    Plan,
    Suspend,
    Create,
    Delete,
}

impl fmt::Display for CutoverStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CutoverStep::Plan => "plan",
            CutoverStep::Suspend => "suspend",
            CutoverStep::Create => "create",
            CutoverStep::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// The workload object itself, or a source it depends on that other
/// workloads may share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceRole {
    Primary,
    Dependency,
}

/// A Flux object the cutover suspends and later deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    pub rt: ResourceType,
    pub namespace: String,
    pub name: String,
    pub role: SourceRole,
}

impl SourceObject {
    fn new(rt: ResourceType, namespace: Option<String>, name: String, role: SourceRole) -> Self {
        Self { rt, namespace: namespace.unwrap_or_default(), name, role }
    }

    pub fn key(&self) -> ObjectKey { self.rt.key(Some(&self.namespace), &self.name) }
}

/// Everything one workload cutover touches, computed before any mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoverPlan {
    pub workload: ObjectKey,
    pub sources: Vec<SourceObject>,
    /// Objects to create, in creation order.
    pub targets: Vec<TargetObject>,
}

impl CutoverPlan {
    pub fn for_helm_release(graph: &HelmReleaseGraph, settings: &TargetSettings) -> Self {
        let r = &graph.release;
        let sources = vec![
            SourceObject::new(kinds::HELM_RELEASE, r.namespace(), r.name_any(), SourceRole::Primary),
            SourceObject::new(kinds::HELM_REPOSITORY, graph.repository.namespace(), graph.repository.name_any(), SourceRole::Dependency),
            SourceObject::new(kinds::HELM_CHART, graph.chart.namespace(), graph.chart.name_any(), SourceRole::Dependency),
        ];
        let app = translate_helm_release(graph, settings);
        Self { workload: sources[0].key(), sources, targets: vec![TargetObject::Application(app)] }
    }

    pub fn for_kustomization(graph: &KustomizationGraph, settings: &TargetSettings) -> Self {
        let k = &graph.kustomization;
        let g = &graph.git_repository;
        let sources = vec![
            SourceObject::new(kinds::KUSTOMIZATION, k.namespace(), k.name_any(), SourceRole::Primary),
            SourceObject::new(kinds::GIT_REPOSITORY, g.namespace(), g.name_any(), SourceRole::Dependency),
        ];
        let targets = translate_kustomization(graph, settings).into_objects();
        Self { workload: sources[0].key(), sources, targets }
    }
}

pub async fn plan_helm_release(store: &dyn ObjectStore, namespace: &str, name: &str, settings: &TargetSettings) -> Result<CutoverPlan, CutoverError> {
    let graph = read_helm_release(store, namespace, name)
        .await
        .map_err(|source| CutoverError::Plan { workload: kinds::HELM_RELEASE.key(Some(namespace), name), source })?;
    Ok(CutoverPlan::for_helm_release(&graph, settings))
}

pub async fn plan_kustomization(store: &dyn ObjectStore, namespace: &str, name: &str, settings: &TargetSettings) -> Result<CutoverPlan, CutoverError> {
    let graph = read_kustomization(store, namespace, name)
        .await
        .map_err(|source| CutoverError::Plan { workload: kinds::KUSTOMIZATION.key(Some(namespace), name), source })?;
    Ok(CutoverPlan::for_kustomization(&graph, settings))
}

fn list_keys(keys: &[ObjectKey]) -> String {
    if keys.is_empty() {
        return "none".to_string();
    }
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn list_failures(failures: &[(ObjectKey, StoreError)]) -> String {
    failures.iter().map(|(k, e)| format!("{}: {}", k, e)).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum CutoverError {
    #[error("plan {workload}: {source}")]
    Plan {
        workload: ObjectKey,
        #[source]
        source: ReadError,
    },
    #[error("{attempted} requires state {expected:?} but cutover is {actual:?}")]
    OutOfOrder { attempted: CutoverStep, expected: CutoverState, actual: CutoverState },
    #[error("suspend {object}: {source}")]
    Suspend {
        object: ObjectKey,
        #[source]
        source: StoreError,
    },
    #[error("encode {object}: {message}")]
    Encode { object: ObjectKey, message: String },
    #[error("create {object}: {source} (already created: {}; sources left suspended)", list_keys(.created))]
    Create {
        object: ObjectKey,
        #[source]
        source: StoreError,
        created: Vec<ObjectKey>,
    },
    #[error("delete sources: {}", list_failures(.failures))]
    Delete { failures: Vec<(ObjectKey, StoreError)>, deleted: Vec<ObjectKey> },
}

impl CutoverError {
    pub fn step(&self) -> CutoverStep {
        match self {
            CutoverError::Plan { .. } => CutoverStep::Plan,
            CutoverError::OutOfOrder { attempted, .. } => *attempted,
            CutoverError::Suspend { .. } => CutoverStep::Suspend,
            CutoverError::Encode { .. } | CutoverError::Create { .. } => CutoverStep::Create,
            CutoverError::Delete { .. } => CutoverStep::Delete,
        }
    }
}

/// What a finished cutover did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CutoverReport {
    pub workload: Option<ObjectKey>,
    pub suspended: Vec<ObjectKey>,
    pub created: Vec<ObjectKey>,
    /// Singleton artifacts that already existed and were overwritten.
    pub overwritten: Vec<ObjectKey>,
    pub deleted: Vec<ObjectKey>,
    /// Shared dependencies already gone when this cutover reached them.
    pub skipped: Vec<ObjectKey>,
}

/// Drives one plan through its states. Each step only runs from the state the
/// previous step leaves behind.
pub struct Cutover<'a> {
    store: &'a dyn ObjectStore,
    plan: CutoverPlan,
    state: CutoverState,
    report: CutoverReport,
}

impl<'a> Cutover<'a> {
    pub fn new(store: &'a dyn ObjectStore, plan: CutoverPlan) -> Self {
        let report = CutoverReport { workload: Some(plan.workload.clone()), ..Default::default() };
        Self { store, plan, state: CutoverState::Planned, report }
    }

    pub fn state(&self) -> CutoverState { self.state }
    pub fn plan(&self) -> &CutoverPlan { &self.plan }
    pub fn report(&self) -> &CutoverReport { &self.report }

    fn require(&self, attempted: CutoverStep, expected: CutoverState) -> Result<(), CutoverError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CutoverError::OutOfOrder { attempted, expected, actual: self.state })
        }
    }

    pub async fn suspend(&mut self) -> Result<(), CutoverError> {
        self.require(CutoverStep::Suspend, CutoverState::Planned)?;
        let patch = json!({ "spec": { "suspend": true } });
        for src in &self.plan.sources {
            let key = src.key();
            match self.store.merge_patch(&src.rt, Some(&src.namespace), &src.name, &patch).await {
                Ok(()) => {
                    info!(workload = %self.plan.workload, object = %key, "suspended");
                    self.report.suspended.push(key);
                }
                Err(StoreError::NotFound) if src.role == SourceRole::Dependency => {
                    warn!(workload = %self.plan.workload, object = %key, "shared source already gone; skipping");
                    self.report.skipped.push(key);
                }
                Err(source) => return Err(CutoverError::Suspend { object: key, source }),
            }
        }
        self.state = CutoverState::Suspended;
        Ok(())
    }

    pub async fn create(&mut self) -> Result<(), CutoverError> {
        self.require(CutoverStep::Create, CutoverState::Suspended)?;
        // Encode everything up front so a bad object cannot strand a half-created set.
        let mut encoded: Vec<(&TargetObject, DynamicObject)> = Vec::with_capacity(self.plan.targets.len());
        for target in &self.plan.targets {
            let obj = target.to_dynamic().map_err(|e| CutoverError::Encode { object: target.key(), message: e.to_string() })?;
            encoded.push((target, obj));
        }
        for (target, obj) in encoded {
            let rt = target.resource_type();
            let key = target.key();
            match self.store.create(&rt, &obj).await {
                Ok(()) => {
                    info!(workload = %self.plan.workload, object = %key, "created");
                    self.report.created.push(key);
                }
                Err(StoreError::AlreadyExists) if target.is_singleton() => {
                    // Whole-object replace: nothing from the previous artifact may survive.
                    if let Err(source) = self.store.replace(&rt, &obj).await {
                        return Err(CutoverError::Create { object: key, source, created: self.report.created.clone() });
                    }
                    warn!(workload = %self.plan.workload, object = %key, "migration artifact already existed; overwritten");
                    self.report.overwritten.push(key);
                }
                Err(source) => return Err(CutoverError::Create { object: key, source, created: self.report.created.clone() }),
            }
        }
        self.state = CutoverState::Created;
        Ok(())
    }

    /// Attempts every deletion; failures are reported together and the state
    /// stays `Created`.
    pub async fn delete_sources(&mut self) -> Result<(), CutoverError> {
        self.require(CutoverStep::Delete, CutoverState::Created)?;
        let mut failures = Vec::new();
        for src in &self.plan.sources {
            let key = src.key();
            match self.store.delete(&src.rt, Some(&src.namespace), &src.name).await {
                Ok(()) => {
                    info!(workload = %self.plan.workload, object = %key, "deleted");
                    self.report.deleted.push(key);
                }
                Err(StoreError::NotFound) => {
                    if !self.report.skipped.contains(&key) {
                        self.report.skipped.push(key);
                    }
                }
                Err(e) => {
                    warn!(workload = %self.plan.workload, object = %key, error = %e, "delete failed");
                    failures.push((key, e));
                }
            }
        }
        if !failures.is_empty() {
            return Err(CutoverError::Delete { failures, deleted: self.report.deleted.clone() });
        }
        self.state = CutoverState::SourceDeleted;
        Ok(())
    }

    /// Run every remaining step in order.
    pub async fn run(mut self) -> Result<CutoverReport, CutoverError> {
        counter!("cutover_attempts", 1u64);
        let started = Instant::now();
        let result = self.run_steps().await;
        histogram!("cutover_latency_ms", started.elapsed().as_secs_f64() * 1000.0);
        match result {
            Ok(()) => {
                counter!("cutover_ok", 1u64);
                info!(workload = %self.plan.workload, "cutover complete");
                Ok(self.report)
            }
            Err(e) => {
                counter!("cutover_err", 1u64);
                warn!(workload = %self.plan.workload, step = %e.step(), state = ?self.state, error = %e, "cutover stopped");
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self) -> Result<(), CutoverError> {
        if self.state == CutoverState::Planned { self.suspend().await?; }
        if self.state == CutoverState::Suspended { self.create().await?; }
        if self.state == CutoverState::Created { self.delete_sources().await?; }
        Ok(())
    }
}
