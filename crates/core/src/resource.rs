use std::fmt;

use kube::core::ApiResource;
use serde::{Deserialize, Serialize};

/// Static description of a served kind: enough to build an `ApiResource`
/// without running discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceType {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
}

impl ResourceType {
    pub const fn new(group: &'static str, version: &'static str, kind: &'static str, plural: &'static str, namespaced: bool) -> Self {
        Self { group, version, kind, plural, namespaced }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.to_string() } else { format!("{}/{}", self.group, self.version) }
    }

    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.to_string(),
            version: self.version.to_string(),
            api_version: self.api_version(),
            kind: self.kind.to_string(),
            plural: self.plural.to_string(),
        }
    }

    pub fn key(&self, namespace: Option<&str>, name: &str) -> ObjectKey {
        ObjectKey {
            kind: self.kind.to_string(),
            namespace: if self.namespaced { namespace.map(|s| s.to_string()) } else { None },
            name: name.to_string(),
        }
    }
}

/// Every kind the engine reads, writes or decommissions.
pub mod kinds {
    use super::ResourceType;

    pub const HELM_RELEASE: ResourceType = ResourceType::new("helm.toolkit.fluxcd.io", "v2beta2", "HelmRelease", "helmreleases", true);
    pub const HELM_REPOSITORY: ResourceType = ResourceType::new("source.toolkit.fluxcd.io", "v1beta2", "HelmRepository", "helmrepositories", true);
    pub const HELM_CHART: ResourceType = ResourceType::new("source.toolkit.fluxcd.io", "v1beta2", "HelmChart", "helmcharts", true);
    pub const KUSTOMIZATION: ResourceType = ResourceType::new("kustomize.toolkit.fluxcd.io", "v1", "Kustomization", "kustomizations", true);
    pub const GIT_REPOSITORY: ResourceType = ResourceType::new("source.toolkit.fluxcd.io", "v1", "GitRepository", "gitrepositories", true);
    pub const OCI_REPOSITORY: ResourceType = ResourceType::new("source.toolkit.fluxcd.io", "v1beta2", "OCIRepository", "ocirepositories", true);
    pub const BUCKET: ResourceType = ResourceType::new("source.toolkit.fluxcd.io", "v1beta2", "Bucket", "buckets", true);
    pub const ALERT: ResourceType = ResourceType::new("notification.toolkit.fluxcd.io", "v1beta3", "Alert", "alerts", true);
    pub const PROVIDER: ResourceType = ResourceType::new("notification.toolkit.fluxcd.io", "v1beta3", "Provider", "providers", true);
    pub const RECEIVER: ResourceType = ResourceType::new("notification.toolkit.fluxcd.io", "v1", "Receiver", "receivers", true);
    pub const IMAGE_REPOSITORY: ResourceType = ResourceType::new("image.toolkit.fluxcd.io", "v1beta2", "ImageRepository", "imagerepositories", true);
    pub const IMAGE_POLICY: ResourceType = ResourceType::new("image.toolkit.fluxcd.io", "v1beta2", "ImagePolicy", "imagepolicies", true);
    pub const IMAGE_UPDATE_AUTOMATION: ResourceType = ResourceType::new("image.toolkit.fluxcd.io", "v1beta1", "ImageUpdateAutomation", "imageupdateautomations", true);

    pub const APPLICATION: ResourceType = ResourceType::new("argoproj.io", "v1alpha1", "Application", "applications", true);
    pub const APPLICATION_SET: ResourceType = ResourceType::new("argoproj.io", "v1alpha1", "ApplicationSet", "applicationsets", true);

    pub const SECRET: ResourceType = ResourceType::new("", "v1", "Secret", "secrets", true);
    pub const NAMESPACE: ResourceType = ResourceType::new("", "v1", "Namespace", "namespaces", false);
    pub const SERVICE: ResourceType = ResourceType::new("", "v1", "Service", "services", true);
    pub const SERVICE_ACCOUNT: ResourceType = ResourceType::new("", "v1", "ServiceAccount", "serviceaccounts", true);
    pub const DEPLOYMENT: ResourceType = ResourceType::new("apps", "v1", "Deployment", "deployments", true);
    pub const NETWORK_POLICY: ResourceType = ResourceType::new("networking.k8s.io", "v1", "NetworkPolicy", "networkpolicies", true);
    pub const CLUSTER_ROLE: ResourceType = ResourceType::new("rbac.authorization.k8s.io", "v1", "ClusterRole", "clusterroles", false);
    pub const CLUSTER_ROLE_BINDING: ResourceType = ResourceType::new("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding", "clusterrolebindings", false);
    pub const CRD: ResourceType = ResourceType::new("apiextensions.k8s.io", "v1", "CustomResourceDefinition", "customresourcedefinitions", false);

    /// Flux custom resource kinds that may carry controller finalizers.
    pub const FLUX_CUSTOM_RESOURCES: &[ResourceType] = &[
        HELM_RELEASE,
        HELM_REPOSITORY,
        HELM_CHART,
        KUSTOMIZATION,
        GIT_REPOSITORY,
        OCI_REPOSITORY,
        BUCKET,
        ALERT,
        PROVIDER,
        RECEIVER,
        IMAGE_REPOSITORY,
        IMAGE_POLICY,
        IMAGE_UPDATE_AUTOMATION,
    ];

    /// Namespaced Flux components removed during decommission.
    pub const FLUX_NAMESPACED_COMPONENTS: &[ResourceType] = &[DEPLOYMENT, SERVICE, NETWORK_POLICY, SERVICE_ACCOUNT];
    /// Cluster-scoped Flux components removed during decommission.
    pub const FLUX_CLUSTER_COMPONENTS: &[ResourceType] = &[CLUSTER_ROLE, CLUSTER_ROLE_BINDING];
}

/// Kind + namespace + name of one object, used in every error and report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}
