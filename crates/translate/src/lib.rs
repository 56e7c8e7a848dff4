//! Ferry translator: pure mapping from Flux resource graphs to Argo CD objects.
//!
//! Nothing in this crate performs I/O. Inputs are complete graphs produced by
//! the reader; outputs are fully typed target objects. The same input always
//! yields the same output.

#![forbid(unsafe_code)]

use ferry_core::source::{GitRepository, HelmChart, HelmRelease, HelmRepository, Kustomization};
use ferry_core::{DEFAULT_ARGOCD_NAMESPACE, DEFAULT_PROJECT, IN_CLUSTER_SERVER};
use ferry_core::target::{SyncPolicy, SyncPolicyAutomated};
use k8s_openapi::api::core::v1::Secret;

pub mod helm;
pub mod kustomize;
pub mod path;

pub use helm::translate_helm_release;
pub use kustomize::{translate_kustomization, DirectoryMigration};
pub use path::{exclude_patterns, normalize, DirectoryPatterns};

/// A HelmRelease together with everything it references.
#[derive(Debug, Clone, PartialEq)]
pub struct HelmReleaseGraph {
    pub release: HelmRelease,
    pub repository: HelmRepository,
    pub chart: HelmChart,
}

/// A Kustomization together with its git source and optional credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct KustomizationGraph {
    pub kustomization: Kustomization,
    pub git_repository: GitRepository,
    pub credentials: Option<Secret>,
}

/// Where and how generated objects land in the target cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSettings {
    /// Namespace Argo CD watches for Applications/ApplicationSets.
    pub argocd_namespace: String,
    pub project: String,
    pub destination_server: String,
    /// Overrides the namespace workloads are deployed into.
    pub destination_namespace: Option<String>,
    /// Extra directories the git directory generator must skip.
    pub exclude_dirs: Vec<String>,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            argocd_namespace: DEFAULT_ARGOCD_NAMESPACE.to_string(),
            project: DEFAULT_PROJECT.to_string(),
            destination_server: IN_CLUSTER_SERVER.to_string(),
            destination_namespace: None,
            exclude_dirs: Vec::new(),
        }
    }
}

/// Render a boolean as an Argo CD sync option: `bool_option("CreateNamespace", true)`
/// gives `"CreateNamespace=true"`. Argo CD only accepts the literal strings
/// `true` and `false` here.
pub fn bool_option(key: &str, flag: bool) -> String {
    format!("{}={}", key, if flag { "true" } else { "false" })
}

/// Sync policy shared by every generated application: automated prune and
/// self-heal, client-side validation off.
pub(crate) fn sync_policy(create_namespace: bool) -> SyncPolicy {
    SyncPolicy {
        automated: Some(SyncPolicyAutomated { prune: true, self_heal: true }),
        sync_options: vec![bool_option("CreateNamespace", create_namespace), bool_option("Validate", false)],
        retry: None,
    }
}
