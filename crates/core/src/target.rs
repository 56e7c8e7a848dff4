//! Argo CD target models and the `TargetObject` sum type the translator emits.

use k8s_openapi::api::core::v1::Secret;
use kube::{core::DynamicObject, CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::resource::{kinds, ObjectKey, ResourceType};
use crate::DecodeError;

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "Application",
    namespaced,
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub project: String,
    pub source: ApplicationSource,
    pub destination: ApplicationDestination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_policy: Option<SyncPolicy>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub target_revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm: Option<ApplicationSourceHelm>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ApplicationSourceHelm {
    /// Inline values file, as YAML text.
    #[serde(default)]
    pub values: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ApplicationDestination {
    pub server: String,
    pub namespace: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automated: Option<SyncPolicyAutomated>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sync_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryStrategy>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicyAutomated {
    pub prune: bool,
    pub self_heal: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RetryStrategy {
    pub limit: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Backoff>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backoff {
    pub duration: String,
    pub factor: i64,
    pub max_duration: String,
}

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "ApplicationSet",
    namespaced,
    derive = "PartialEq",
    schema = "disabled"
)]
pub struct ApplicationSetSpec {
    pub generators: Vec<ApplicationSetGenerator>,
    pub template: ApplicationSetTemplate,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ApplicationSetGenerator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitGenerator>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GitGenerator {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    pub revision: String,
    pub directories: Vec<GitDirectoryGeneratorItem>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GitDirectoryGeneratorItem {
    pub path: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclude: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ApplicationSetTemplate {
    pub metadata: ApplicationSetTemplateMeta,
    pub spec: ApplicationSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ApplicationSetTemplateMeta {
    pub name: String,
}

/// One object the engine creates in the target cluster.
///
/// Variants are listed in creation order: a repository secret must exist
/// before the ApplicationSet that clones through it.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TargetObject {
    RepositorySecret(Secret),
    Application(Application),
    ApplicationSet(ApplicationSet),
}

impl TargetObject {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            TargetObject::RepositorySecret(_) => kinds::SECRET,
            TargetObject::Application(_) => kinds::APPLICATION,
            TargetObject::ApplicationSet(_) => kinds::APPLICATION_SET,
        }
    }

    pub fn name(&self) -> String {
        match self {
            TargetObject::RepositorySecret(s) => s.name_any(),
            TargetObject::Application(a) => a.name_any(),
            TargetObject::ApplicationSet(a) => a.name_any(),
        }
    }

    pub fn namespace(&self) -> Option<String> {
        match self {
            TargetObject::RepositorySecret(s) => s.namespace(),
            TargetObject::Application(a) => a.namespace(),
            TargetObject::ApplicationSet(a) => a.namespace(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.resource_type().key(self.namespace().as_deref(), &self.name())
    }

    /// Singleton migration artifacts are overwritten rather than rejected
    /// when they already exist.
    pub fn is_singleton(&self) -> bool {
        matches!(self, TargetObject::RepositorySecret(_) | TargetObject::ApplicationSet(_))
    }

    pub fn to_dynamic(&self) -> Result<DynamicObject, DecodeError> {
        crate::encode(&self.resource_type(), &self.name(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ObjectMeta;

    fn app() -> Application {
        let mut a = Application::new("prod-app", ApplicationSpec {
            project: "default".into(),
            source: ApplicationSource { repo_url: "https://charts.example.com".into(), chart: Some("mychart".into()), target_revision: "1.2.3".into(), ..Default::default() },
            destination: ApplicationDestination { server: "https://kubernetes.default.svc".into(), namespace: "prod".into() },
            sync_policy: None,
        });
        a.metadata.namespace = Some("argocd".into());
        a
    }

    #[test]
    fn application_serializes_with_fixed_type_meta() {
        let v = serde_json::to_value(TargetObject::Application(app())).unwrap();
        assert_eq!(v["apiVersion"], "argoproj.io/v1alpha1");
        assert_eq!(v["kind"], "Application");
        assert_eq!(v["spec"]["source"]["repoURL"], "https://charts.example.com");
        assert_eq!(v["spec"]["source"]["targetRevision"], "1.2.3");
        assert!(v["spec"]["source"].get("path").is_none());
    }

    #[test]
    fn secret_converts_to_dynamic_with_key() {
        let s = Secret {
            metadata: ObjectMeta { name: Some("ferry-migration".into()), namespace: Some("argocd".into()), ..Default::default() },
            ..Default::default()
        };
        let t = TargetObject::RepositorySecret(s);
        assert!(t.is_singleton());
        assert_eq!(t.key().to_string(), "Secret argocd/ferry-migration");
        let d = t.to_dynamic().unwrap();
        assert_eq!(d.types.map(|tm| tm.kind), Some("Secret".to_string()));
    }

    #[test]
    fn exclude_flag_is_omitted_when_false() {
        let inc = GitDirectoryGeneratorItem { path: "apps/*".into(), exclude: false };
        let exc = GitDirectoryGeneratorItem { path: "apps/flux-system".into(), exclude: true };
        assert_eq!(serde_json::to_value(&inc).unwrap(), serde_json::json!({ "path": "apps/*" }));
        assert_eq!(serde_json::to_value(&exc).unwrap(), serde_json::json!({ "path": "apps/flux-system", "exclude": true }));
    }
}
