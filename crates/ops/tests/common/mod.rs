#![allow(dead_code)]

use ferry_core::kinds;
use ferry_store::MemoryStore;
use serde_json::{json, Value};

pub const FLUX_NS: &str = "flux-system";
pub const ARGOCD_NS: &str = "argocd";

pub fn namespace(name: &str) -> Value {
    json!({ "apiVersion": "v1", "kind": "Namespace", "metadata": { "name": name } })
}

pub fn helm_release(name: &str, target_ns: &str) -> Value {
    json!({
        "apiVersion": "helm.toolkit.fluxcd.io/v2beta2",
        "kind": "HelmRelease",
        "metadata": { "name": name, "namespace": FLUX_NS },
        "spec": {
            "interval": "5m",
            "chart": { "spec": { "chart": "mychart", "version": "1.2.3",
                "sourceRef": { "kind": "HelmRepository", "name": "charts" } } },
            "targetNamespace": target_ns,
            "install": { "createNamespace": true },
            "values": { "replicas": 2 }
        },
        "status": { "conditions": [{ "type": "Ready", "status": "True", "message": "Release reconciliation succeeded" }] }
    })
}

pub fn helm_repository() -> Value {
    json!({
        "apiVersion": "source.toolkit.fluxcd.io/v1beta2",
        "kind": "HelmRepository",
        "metadata": { "name": "charts", "namespace": FLUX_NS },
        "spec": { "url": "https://charts.example.com", "interval": "1h" }
    })
}

/// The chart Flux derives for release `name` in the Flux namespace.
pub fn helm_chart(release: &str) -> Value {
    json!({
        "apiVersion": "source.toolkit.fluxcd.io/v1beta2",
        "kind": "HelmChart",
        "metadata": { "name": format!("{}-{}", FLUX_NS, release), "namespace": FLUX_NS },
        "spec": { "chart": "mychart", "version": "1.2.3", "sourceRef": { "kind": "HelmRepository", "name": "charts" } }
    })
}

pub fn kustomization(name: &str, path: &str) -> Value {
    json!({
        "apiVersion": "kustomize.toolkit.fluxcd.io/v1",
        "kind": "Kustomization",
        "metadata": { "name": name, "namespace": FLUX_NS },
        "spec": { "interval": "10m", "path": path, "prune": true, "sourceRef": { "kind": "GitRepository", "name": "repo" } }
    })
}

pub fn git_repository(secret: Option<&str>) -> Value {
    let mut spec = json!({ "url": "ssh://git@example.com/org/repo.git", "ref": { "branch": "main" }, "interval": "1m" });
    if let Some(s) = secret {
        spec["secretRef"] = json!({ "name": s });
    }
    json!({
        "apiVersion": "source.toolkit.fluxcd.io/v1",
        "kind": "GitRepository",
        "metadata": { "name": "repo", "namespace": FLUX_NS },
        "spec": spec
    })
}

/// `identity` is base64 of "key-material".
pub fn git_credentials(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": { "name": name, "namespace": FLUX_NS },
        "data": { "identity": "a2V5LW1hdGVyaWFs" }
    })
}

pub fn seed_helm(store: &MemoryStore, release: &str, target_ns: &str) {
    store.insert(&kinds::HELM_RELEASE, helm_release(release, target_ns)).unwrap();
    store.insert(&kinds::HELM_REPOSITORY, helm_repository()).unwrap();
    store.insert(&kinds::HELM_CHART, helm_chart(release)).unwrap();
}

pub fn seed_kustomization(store: &MemoryStore, name: &str, path: &str, secret: Option<&str>) {
    store.insert(&kinds::KUSTOMIZATION, kustomization(name, path)).unwrap();
    store.insert(&kinds::GIT_REPOSITORY, git_repository(secret)).unwrap();
    if let Some(s) = secret {
        store.insert(&kinds::SECRET, git_credentials(s)).unwrap();
    }
}

pub fn seed_flux_install(store: &MemoryStore) {
    let part_of = json!({ "app.kubernetes.io/part-of": "flux" });
    store.insert(&kinds::NAMESPACE, namespace(FLUX_NS)).unwrap();
    store.insert(&kinds::DEPLOYMENT, json!({
        "apiVersion": "apps/v1", "kind": "Deployment",
        "metadata": { "name": "helm-controller", "namespace": FLUX_NS, "labels": part_of }
    })).unwrap();
    store.insert(&kinds::CLUSTER_ROLE, json!({
        "apiVersion": "rbac.authorization.k8s.io/v1", "kind": "ClusterRole",
        "metadata": { "name": "crd-controller-flux-system", "labels": part_of }
    })).unwrap();
    store.insert(&kinds::CRD, json!({
        "apiVersion": "apiextensions.k8s.io/v1", "kind": "CustomResourceDefinition",
        "metadata": { "name": "helmreleases.helm.toolkit.fluxcd.io", "labels": part_of }
    })).unwrap();
    store.insert(&kinds::ALERT, json!({
        "apiVersion": "notification.toolkit.fluxcd.io/v1beta3", "kind": "Alert",
        "metadata": { "name": "slack", "namespace": FLUX_NS, "finalizers": ["finalizers.fluxcd.io"] },
        "spec": {}
    })).unwrap();
    // Not part of Flux; must survive.
    store.insert(&kinds::DEPLOYMENT, json!({
        "apiVersion": "apps/v1", "kind": "Deployment",
        "metadata": { "name": "web", "namespace": FLUX_NS }
    })).unwrap();
}
