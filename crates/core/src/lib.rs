//! Ferry core types: Flux source models, Argo CD target models and the
//! resource descriptors the object store is addressed with.

#![forbid(unsafe_code)]

use kube::core::DynamicObject;
use serde::{de::DeserializeOwned, Serialize};

pub mod resource;
pub mod source;
pub mod target;

pub use resource::{kinds, ObjectKey, ResourceType};
pub use target::TargetObject;

/// Directory Flux bootstraps itself into; never a workload.
pub const FLUX_SYSTEM_DIR: &str = "flux-system";
/// Namespace Flux controllers are installed into by default.
pub const DEFAULT_FLUX_NAMESPACE: &str = "flux-system";
/// Namespace Argo CD is installed into by default.
pub const DEFAULT_ARGOCD_NAMESPACE: &str = "argocd";
pub const DEFAULT_PROJECT: &str = "default";
pub const IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";
/// Fixed name shared by the directory ApplicationSet and its repository secret.
pub const MIGRATION_ARTIFACT_NAME: &str = "ferry-migration";
/// Key of the SSH private key inside a Flux git credentials secret.
pub const IDENTITY_KEY: &str = "identity";
/// Label selecting every object a Flux install owns.
pub const FLUX_PART_OF_SELECTOR: &str = "app.kubernetes.io/part-of=flux";

pub mod prelude {
    pub use super::resource::{kinds, ObjectKey, ResourceType};
    pub use super::source::{GitRepository, HelmChart, HelmRelease, HelmRepository, Kustomization};
    pub use super::target::{Application, ApplicationSet, TargetObject};
}

#[derive(Debug, thiserror::Error)]
#[error("decoding {kind} {name}: {source}")]
pub struct DecodeError {
    pub kind: &'static str,
    pub name: String,
    #[source]
    pub source: serde_json::Error,
}

/// Convert an untyped store object into one of the typed models.
pub fn decode<K: DeserializeOwned>(rt: &ResourceType, obj: DynamicObject) -> Result<K, DecodeError> {
    let name = obj.metadata.name.clone().unwrap_or_default();
    serde_json::to_value(obj)
        .and_then(serde_json::from_value)
        .map_err(|source| DecodeError { kind: rt.kind, name, source })
}

/// Convert a typed model into the untyped form the object store accepts.
pub fn encode<K: Serialize>(rt: &ResourceType, name: &str, obj: &K) -> Result<DynamicObject, DecodeError> {
    serde_json::to_value(obj)
        .and_then(serde_json::from_value)
        .map_err(|source| DecodeError { kind: rt.kind, name: name.to_string(), source })
}
