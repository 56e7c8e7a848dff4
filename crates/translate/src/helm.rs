//! HelmRelease → Application.

use ferry_core::source::HelmRelease;
use ferry_core::target::{Application, ApplicationDestination, ApplicationSource, ApplicationSourceHelm, ApplicationSpec};
use kube::ResourceExt;
use tracing::warn;

use crate::{sync_policy, HelmReleaseGraph, TargetSettings};

/// Namespace the chart is installed into: operator override, then the
/// release's `targetNamespace`, then the release's own namespace (Flux's default).
pub fn destination_namespace(release: &HelmRelease, settings: &TargetSettings) -> String {
    settings
        .destination_namespace
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| release.spec.target_namespace.clone().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| release.namespace().unwrap_or_default())
}

/// Application name. Keyed on destination namespace and release name so two
/// releases of the same chart never collide.
pub fn application_name(destination_namespace: &str, release_name: &str) -> String {
    format!("{}-{}", destination_namespace, release_name)
}

/// Re-encode the release's values tree as the YAML text Argo CD expects.
/// Absent or null values become an empty document.
pub fn values_yaml(values: Option<&serde_json::Value>) -> String {
    match values {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(v) => serde_yaml::to_string(v).unwrap_or_else(|e| {
            warn!(error = %e, "values could not be encoded as YAML; leaving them empty");
            String::new()
        }),
    }
}

pub fn translate_helm_release(graph: &HelmReleaseGraph, settings: &TargetSettings) -> Application {
    let release = &graph.release;
    let chart = &release.spec.chart.spec;
    let dest_ns = destination_namespace(release, settings);
    let create_namespace = release.spec.install.as_ref().map(|i| i.create_namespace).unwrap_or(false);

    let mut app = Application::new(
        &application_name(&dest_ns, &release.name_any()),
        ApplicationSpec {
            project: settings.project.clone(),
            source: ApplicationSource {
                repo_url: graph.repository.spec.url.clone(),
                chart: Some(chart.chart.clone()),
                path: None,
                target_revision: chart.version.clone().unwrap_or_default(),
                helm: Some(ApplicationSourceHelm { values: values_yaml(release.spec.values.as_ref()) }),
            },
            destination: ApplicationDestination { server: settings.destination_server.clone(), namespace: dest_ns },
            sync_policy: Some(sync_policy(create_namespace)),
        },
    );
    app.metadata.namespace = Some(settings.argocd_namespace.clone());
    app
}
