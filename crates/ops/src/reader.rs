//! Resource graph reader: fetch a workload and everything it references.

use ferry_core::source::{CrossNamespaceObjectReference, GitRepository, HelmChart, HelmRelease, HelmRepository, Kustomization};
use ferry_core::{decode, kinds, DecodeError, ObjectKey, ResourceType};
use ferry_kubehub::{ObjectStore, StoreError};
use ferry_translate::{HelmReleaseGraph, KustomizationGraph};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("{0} not found")]
    NotFound(ObjectKey),
    #[error("reading {key}: {source}")]
    Store {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{referrer} references a {kind:?} source; only {expected} is supported")]
    UnsupportedSource { referrer: ObjectKey, kind: String, expected: &'static str },
    #[error("Argo CD namespace {0:?} not found; install Argo CD before migrating")]
    TargetControllerMissing(String),
}

impl ReadError {
    /// Object the failure is about, when there is one.
    pub fn key(&self) -> Option<&ObjectKey> {
        match self {
            ReadError::NotFound(key) | ReadError::Store { key, .. } => Some(key),
            ReadError::UnsupportedSource { referrer, .. } => Some(referrer),
            ReadError::Decode(_) | ReadError::TargetControllerMissing(_) => None,
        }
    }
}

pub(crate) async fn fetch<K: DeserializeOwned>(
    store: &dyn ObjectStore,
    rt: &ResourceType,
    namespace: &str,
    name: &str,
) -> Result<K, ReadError> {
    let key = rt.key(Some(namespace), name);
    match store.get(rt, Some(namespace), name).await {
        Ok(obj) => {
            debug!(%key, "read");
            Ok(decode(rt, obj)?)
        }
        Err(StoreError::NotFound) => Err(ReadError::NotFound(key)),
        Err(source) => Err(ReadError::Store { key, source }),
    }
}

fn check_source_kind(referrer: ObjectKey, source_ref: &CrossNamespaceObjectReference, expected: &ResourceType) -> Result<(), ReadError> {
    // Flux defaults an unset kind to the only kind the field allows.
    if source_ref.kind.is_empty() || source_ref.kind == expected.kind {
        Ok(())
    } else {
        Err(ReadError::UnsupportedSource { referrer, kind: source_ref.kind.clone(), expected: expected.kind })
    }
}

/// Namespace and name of the HelmChart Flux materialized for `release`.
///
/// Prefers `status.helmChart`; falls back to Flux's naming convention
/// `<release-namespace>-<release-name>` in the repository's namespace.
pub fn helm_chart_location(release: &HelmRelease) -> (String, String) {
    let release_ns = release.namespace().unwrap_or_default();
    let recorded = release
        .status
        .as_ref()
        .and_then(|s| s.helm_chart.as_deref())
        .and_then(|s| s.split_once('/'))
        .filter(|(ns, name)| !ns.is_empty() && !name.is_empty());
    match recorded {
        Some((ns, name)) => (ns.to_string(), name.to_string()),
        None => {
            let repo_ns = release.spec.chart.spec.source_ref.namespace_or(&release_ns).to_string();
            (repo_ns, format!("{}-{}", release_ns, release.name_any()))
        }
    }
}

pub async fn read_helm_release(store: &dyn ObjectStore, namespace: &str, name: &str) -> Result<HelmReleaseGraph, ReadError> {
    let release: HelmRelease = fetch(store, &kinds::HELM_RELEASE, namespace, name).await?;
    helm_release_graph(store, release).await
}

/// Resolve the repository and chart behind an already-fetched release.
pub async fn helm_release_graph(store: &dyn ObjectStore, release: HelmRelease) -> Result<HelmReleaseGraph, ReadError> {
    let release_ns = release.namespace().unwrap_or_default();
    let source_ref = &release.spec.chart.spec.source_ref;
    check_source_kind(kinds::HELM_RELEASE.key(Some(&release_ns), &release.name_any()), source_ref, &kinds::HELM_REPOSITORY)?;

    let repo_ns = source_ref.namespace_or(&release_ns).to_string();
    let repository: HelmRepository = fetch(store, &kinds::HELM_REPOSITORY, &repo_ns, &source_ref.name).await?;
    let (chart_ns, chart_name) = helm_chart_location(&release);
    let chart: HelmChart = fetch(store, &kinds::HELM_CHART, &chart_ns, &chart_name).await?;
    Ok(HelmReleaseGraph { release, repository, chart })
}

pub async fn read_kustomization(store: &dyn ObjectStore, namespace: &str, name: &str) -> Result<KustomizationGraph, ReadError> {
    let kustomization: Kustomization = fetch(store, &kinds::KUSTOMIZATION, namespace, name).await?;
    kustomization_graph(store, kustomization).await
}

/// Resolve the git source and its credentials behind an already-fetched kustomization.
pub async fn kustomization_graph(store: &dyn ObjectStore, kustomization: Kustomization) -> Result<KustomizationGraph, ReadError> {
    let ks_ns = kustomization.namespace().unwrap_or_default();
    let ks_key = kinds::KUSTOMIZATION.key(Some(&ks_ns), &kustomization.name_any());
    let source_ref = &kustomization.spec.source_ref;
    check_source_kind(ks_key.clone(), source_ref, &kinds::GIT_REPOSITORY)?;

    let git_ns = source_ref.namespace_or(&ks_ns).to_string();
    let git_repository: GitRepository = fetch(store, &kinds::GIT_REPOSITORY, &git_ns, &source_ref.name).await?;
    let credentials = match git_repository.spec.secret_ref.as_ref().filter(|r| !r.name.is_empty()) {
        Some(secret_ref) => Some(fetch::<Secret>(store, &kinds::SECRET, &git_ns, &secret_ref.name).await?),
        None => {
            warn!(kustomization = %ks_key, repository = %git_repository.name_any(), "git source has no credentials; repository secret will carry an empty private key");
            None
        }
    };
    Ok(KustomizationGraph { kustomization, git_repository, credentials })
}

/// Fail unless the Argo CD namespace exists.
pub async fn ensure_target_controller(store: &dyn ObjectStore, argocd_namespace: &str) -> Result<(), ReadError> {
    match store.get(&kinds::NAMESPACE, None, argocd_namespace).await {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound) => Err(ReadError::TargetControllerMissing(argocd_namespace.to_string())),
        Err(source) => Err(ReadError::Store { key: kinds::NAMESPACE.key(None, argocd_namespace), source }),
    }
}
