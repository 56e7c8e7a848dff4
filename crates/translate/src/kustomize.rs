//! Kustomization → git directory ApplicationSet + repository secret.

use std::collections::BTreeMap;

use ferry_core::source::Kustomization;
use ferry_core::target::{
    ApplicationDestination, ApplicationSet, ApplicationSetGenerator, ApplicationSetSpec, ApplicationSetTemplate,
    ApplicationSetTemplateMeta, ApplicationSource, ApplicationSpec, Backoff, GitDirectoryGeneratorItem, GitGenerator,
    RetryStrategy,
};
use ferry_core::{TargetObject, IDENTITY_KEY, MIGRATION_ARTIFACT_NAME};
use k8s_openapi::api::core::v1::Secret;
use kube::core::ObjectMeta;

use crate::path::{exclude_patterns, normalize};
use crate::{sync_policy, KustomizationGraph, TargetSettings};

/// Generator expressions Argo CD evaluates per matched directory.
pub const APP_NAME_TEMPLATE: &str = "{{path.basename}}";
pub const APP_PATH_TEMPLATE: &str = "{{path}}";

const SECRET_TYPE_LABEL: &str = "argocd.argoproj.io/secret-type";
/// Revision used when the GitRepository pins no ref at all.
const DEFAULT_REVISION: &str = "HEAD";
const DEFAULT_DESTINATION_NAMESPACE: &str = "default";

/// Target objects for one directory-based workload.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryMigration {
    pub secret: Secret,
    pub application_set: ApplicationSet,
}

impl DirectoryMigration {
    /// Objects in creation order: the secret before the ApplicationSet that uses it.
    pub fn into_objects(self) -> Vec<TargetObject> {
        vec![TargetObject::RepositorySecret(self.secret), TargetObject::ApplicationSet(self.application_set)]
    }
}

pub fn destination_namespace(kustomization: &Kustomization, settings: &TargetSettings) -> String {
    settings
        .destination_namespace
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| kustomization.spec.target_namespace.clone().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| DEFAULT_DESTINATION_NAMESPACE.to_string())
}

/// SSH private key held by the Flux credentials secret, if any.
pub fn private_key(credentials: Option<&Secret>) -> String {
    credentials
        .and_then(|s| s.data.as_ref())
        .and_then(|d| d.get(IDENTITY_KEY))
        .map(|b| String::from_utf8_lossy(&b.0).into_owned())
        .or_else(|| credentials.and_then(|s| s.string_data.as_ref()).and_then(|d| d.get(IDENTITY_KEY)).cloned())
        .unwrap_or_default()
}

/// Argo CD repository secret for the migrated git source.
pub fn repository_secret(namespace: &str, url: &str, private_key: String) -> Secret {
    let labels = BTreeMap::from([(SECRET_TYPE_LABEL.to_string(), "repository".to_string())]);
    let string_data = BTreeMap::from([
        ("sshPrivateKey".to_string(), private_key),
        ("type".to_string(), "git".to_string()),
        ("url".to_string(), url.to_string()),
    ]);
    Secret {
        metadata: ObjectMeta {
            name: Some(MIGRATION_ARTIFACT_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(string_data),
        ..Default::default()
    }
}

fn retry_strategy() -> RetryStrategy {
    RetryStrategy {
        limit: 5,
        backoff: Some(Backoff { duration: "5s".to_string(), factor: 2, max_duration: "3m".to_string() }),
    }
}

pub fn translate_kustomization(graph: &KustomizationGraph, settings: &TargetSettings) -> DirectoryMigration {
    let git = &graph.git_repository.spec;
    let revision = git
        .reference
        .as_ref()
        .and_then(|r| r.revision())
        .unwrap_or(DEFAULT_REVISION)
        .to_string();
    let patterns = normalize(graph.kustomization.spec.path.as_deref().unwrap_or_default());

    let mut directories = vec![GitDirectoryGeneratorItem { path: patterns.include, exclude: false }];
    directories.extend(
        exclude_patterns(&patterns.exclude, &settings.exclude_dirs)
            .into_iter()
            .map(|path| GitDirectoryGeneratorItem { path, exclude: true }),
    );

    let mut policy = sync_policy(true);
    policy.retry = Some(retry_strategy());

    let mut application_set = ApplicationSet::new(
        MIGRATION_ARTIFACT_NAME,
        ApplicationSetSpec {
            generators: vec![ApplicationSetGenerator {
                git: Some(GitGenerator { repo_url: git.url.clone(), revision: revision.clone(), directories }),
            }],
            template: ApplicationSetTemplate {
                metadata: ApplicationSetTemplateMeta { name: APP_NAME_TEMPLATE.to_string() },
                spec: ApplicationSpec {
                    project: settings.project.clone(),
                    source: ApplicationSource {
                        repo_url: git.url.clone(),
                        chart: None,
                        path: Some(APP_PATH_TEMPLATE.to_string()),
                        target_revision: revision,
                        helm: None,
                    },
                    destination: ApplicationDestination {
                        server: settings.destination_server.clone(),
                        namespace: destination_namespace(&graph.kustomization, settings),
                    },
                    sync_policy: Some(policy),
                },
            },
        },
    );
    application_set.metadata.namespace = Some(settings.argocd_namespace.clone());

    let secret = repository_secret(&settings.argocd_namespace, &git.url, private_key(graph.credentials.as_ref()));
    DirectoryMigration { secret, application_set }
}
