#![forbid(unsafe_code)]

use ferry_core::source::{
    CrossNamespaceObjectReference, GitRepository, GitRepositoryRef, GitRepositorySpec, HelmChart, HelmChartSpec,
    HelmChartTemplate, HelmChartTemplateSpec, HelmRelease, HelmReleaseSpec, HelmRepository, HelmRepositorySpec, Install,
    Kustomization, KustomizationSpec, LocalObjectReference,
};
use ferry_core::{TargetObject, MIGRATION_ARTIFACT_NAME};
use ferry_translate::{translate_helm_release, translate_kustomization, HelmReleaseGraph, KustomizationGraph, TargetSettings};

fn helm_graph(name: &str, chart: &str, target_ns: &str) -> HelmReleaseGraph {
    let mut release = HelmRelease::new(name, HelmReleaseSpec {
        chart: HelmChartTemplate {
            spec: HelmChartTemplateSpec {
                chart: chart.into(),
                version: Some("1.2.3".into()),
                source_ref: CrossNamespaceObjectReference { kind: "HelmRepository".into(), name: "charts".into(), namespace: None },
            },
        },
        target_namespace: Some(target_ns.into()),
        install: Some(Install { create_namespace: true }),
        values: Some(serde_json::json!({ "replicas": 2 })),
        suspend: false,
    });
    release.metadata.namespace = Some("flux-system".into());
    let mut repository = HelmRepository::new("charts", HelmRepositorySpec { url: "https://charts.example.com".into(), suspend: false });
    repository.metadata.namespace = Some("flux-system".into());
    let mut chart_obj = HelmChart::new(&format!("flux-system-{}", name), HelmChartSpec { chart: chart.into(), ..Default::default() });
    chart_obj.metadata.namespace = Some("flux-system".into());
    HelmReleaseGraph { release, repository, chart: chart_obj }
}

fn kustomization_graph(path: &str, secret_ref: Option<&str>) -> KustomizationGraph {
    let mut kustomization = Kustomization::new("team1", KustomizationSpec {
        source_ref: CrossNamespaceObjectReference { kind: "GitRepository".into(), name: "repo".into(), namespace: None },
        path: Some(path.into()),
        target_namespace: None,
        suspend: false,
    });
    kustomization.metadata.namespace = Some("flux-system".into());
    let mut git_repository = GitRepository::new("repo", GitRepositorySpec {
        url: "git@example.com:org/repo.git".into(),
        reference: Some(GitRepositoryRef { branch: Some("main".into()), ..Default::default() }),
        secret_ref: secret_ref.map(|n| LocalObjectReference { name: n.into() }),
        suspend: false,
    });
    git_repository.metadata.namespace = Some("flux-system".into());
    KustomizationGraph { kustomization, git_repository, credentials: None }
}

fn directories(objs: &ferry_translate::DirectoryMigration) -> (String, Vec<String>) {
    let git = objs.application_set.spec.generators[0].git.as_ref().expect("git generator");
    let include: Vec<_> = git.directories.iter().filter(|d| !d.exclude).map(|d| d.path.clone()).collect();
    assert_eq!(include.len(), 1);
    let exclude = git.directories.iter().filter(|d| d.exclude).map(|d| d.path.clone()).collect();
    (include[0].clone(), exclude)
}

#[test]
fn helm_release_scenario() {
    let app = translate_helm_release(&helm_graph("app", "mychart", "prod"), &TargetSettings::default());
    assert_eq!(app.metadata.name.as_deref(), Some("prod-app"));
    assert_eq!(app.metadata.namespace.as_deref(), Some("argocd"));
    assert_eq!(app.spec.destination.namespace, "prod");
    assert_eq!(app.spec.destination.server, "https://kubernetes.default.svc");
    assert_eq!(app.spec.project, "default");
    assert_eq!(app.spec.source.chart.as_deref(), Some("mychart"));
    assert_eq!(app.spec.source.repo_url, "https://charts.example.com");
    assert_eq!(app.spec.source.target_revision, "1.2.3");
    assert!(app.spec.source.helm.as_ref().unwrap().values.contains("replicas: 2"));
    let policy = app.spec.sync_policy.as_ref().unwrap();
    assert!(policy.sync_options.contains(&"CreateNamespace=true".to_string()));
    assert!(policy.sync_options.contains(&"Validate=false".to_string()));
    let automated = policy.automated.as_ref().unwrap();
    assert!(automated.prune && automated.self_heal);
}

#[test]
fn application_name_ignores_chart_name() {
    let s = TargetSettings::default();
    let a = translate_helm_release(&helm_graph("frontend", "common", "prod"), &s);
    let b = translate_helm_release(&helm_graph("backend", "common", "prod"), &s);
    assert_eq!(a.metadata.name.as_deref(), Some("prod-frontend"));
    assert_eq!(b.metadata.name.as_deref(), Some("prod-backend"));
}

#[test]
fn translation_is_byte_identical_across_runs() {
    let s = TargetSettings { exclude_dirs: vec!["legacy".into()], ..Default::default() };
    let g = helm_graph("app", "mychart", "prod");
    let a = serde_yaml::to_string(&TargetObject::Application(translate_helm_release(&g, &s))).unwrap();
    let b = serde_yaml::to_string(&TargetObject::Application(translate_helm_release(&g, &s))).unwrap();
    assert_eq!(a, b);

    let k = kustomization_graph("./apps/team1", None);
    let a: Vec<String> = translate_kustomization(&k, &s).into_objects().iter().map(|o| serde_yaml::to_string(o).unwrap()).collect();
    let b: Vec<String> = translate_kustomization(&k, &s).into_objects().iter().map(|o| serde_yaml::to_string(o).unwrap()).collect();
    assert_eq!(a, b);
}

#[test]
fn git_directory_scenario() {
    let out = translate_kustomization(&kustomization_graph("./apps/team1", None), &TargetSettings::default());
    let (include, exclude) = directories(&out);
    assert_eq!(include, "apps/team1/*");
    assert_eq!(exclude, vec!["apps/team1/flux-system"]);
    let git = out.application_set.spec.generators[0].git.as_ref().unwrap();
    assert_eq!(git.repo_url, "git@example.com:org/repo.git");
    assert_eq!(git.revision, "main");

    let tpl = &out.application_set.spec.template;
    assert_eq!(tpl.metadata.name, "{{path.basename}}");
    assert_eq!(tpl.spec.source.path.as_deref(), Some("{{path}}"));
    assert_eq!(tpl.spec.source.target_revision, "main");
    assert_eq!(tpl.spec.destination.namespace, "default");
    let policy = tpl.spec.sync_policy.as_ref().unwrap();
    assert!(policy.sync_options.contains(&"CreateNamespace=true".to_string()));
    assert_eq!(policy.retry.as_ref().map(|r| r.limit), Some(5));
}

#[test]
fn repository_root_with_explicit_reserved_exclude() {
    let s = TargetSettings { exclude_dirs: vec!["flux-system".into()], ..Default::default() };
    let out = translate_kustomization(&kustomization_graph("./", None), &s);
    let (include, exclude) = directories(&out);
    assert_eq!(include, "*");
    assert_eq!(exclude.iter().filter(|p| p.as_str() == "flux-system").count(), 1);
}

#[test]
fn singleton_names_are_stable() {
    let s = TargetSettings::default();
    for path in ["./apps/team1", "./apps/team2", "./"] {
        let out = translate_kustomization(&kustomization_graph(path, None), &s);
        assert_eq!(out.application_set.metadata.name.as_deref(), Some(MIGRATION_ARTIFACT_NAME));
        assert_eq!(out.secret.metadata.name.as_deref(), Some(MIGRATION_ARTIFACT_NAME));
        assert_eq!(out.secret.metadata.namespace, out.application_set.metadata.namespace);
    }
}

#[test]
fn missing_credentials_leave_private_key_empty() {
    let out = translate_kustomization(&kustomization_graph("./apps/team1", None), &TargetSettings::default());
    let data = out.secret.string_data.as_ref().unwrap();
    assert_eq!(data.get("sshPrivateKey").map(String::as_str), Some(""));
    assert_eq!(data.get("url").map(String::as_str), Some("git@example.com:org/repo.git"));
    let objs = out.into_objects();
    assert!(matches!(objs[0], TargetObject::RepositorySecret(_)));
    assert!(matches!(objs[1], TargetObject::ApplicationSet(_)));
}
