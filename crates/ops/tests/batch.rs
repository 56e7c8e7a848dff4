#![forbid(unsafe_code)]

mod common;

use std::time::Duration;

use common::*;
use ferry_core::{kinds, MIGRATION_ARTIFACT_NAME};
use ferry_kubehub::StoreError;
use ferry_ops::{
    decommission, migrate_all, scan, BatchOptions, CutoverError, DecommissionError, DecommissionOptions, DecommissionStep, ReadError,
    WorkloadKind,
};
use ferry_store::{MemoryStore, Op};

fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(&kinds::NAMESPACE, namespace(ARGOCD_NS)).unwrap();
    seed_flux_install(&store);
    // Two kustomizations sharing one git source, plus a release.
    seed_kustomization(&store, "team1", "./apps/team1", None);
    store.insert(&kinds::KUSTOMIZATION, kustomization("team2", "./apps/team2")).unwrap();
    seed_helm(&store, "web", "prod");
    store
}

#[tokio::test]
async fn scan_lists_workloads_cluster_wide() {
    let store = seeded();
    let inventory = scan(&store).await.unwrap();
    let rows = inventory.rows();
    let kinds_seen: Vec<_> = rows.iter().map(|r| (r.kind, r.name.as_str())).collect();
    assert_eq!(kinds_seen, vec![
        (WorkloadKind::Kustomization, "team1"),
        (WorkloadKind::Kustomization, "team2"),
        (WorkloadKind::HelmRelease, "web"),
    ]);
    assert_eq!(rows[2].status, "Release reconciliation succeeded");
    assert!(store.journal().is_empty());
}

#[tokio::test]
async fn scan_propagates_unavailable_store() {
    let store = seeded();
    store.fail_on(Op::List, &kinds::KUSTOMIZATION, None, StoreError::Unavailable("no route to host".into()));
    assert!(matches!(scan(&store).await, Err(ReadError::Store { source: StoreError::Unavailable(_), .. })));
}

#[tokio::test]
async fn migrate_all_requires_argocd() {
    let store = MemoryStore::new();
    seed_helm(&store, "web", "prod");
    let inventory = scan(&store).await.unwrap();
    let err = migrate_all(&store, &inventory, &BatchOptions::default()).await.unwrap_err();
    assert!(matches!(err, ReadError::TargetControllerMissing(ref ns) if ns == ARGOCD_NS));
    assert!(store.journal().is_empty());
}

#[tokio::test]
async fn migrate_all_cuts_over_everything_then_decommissions() {
    let store = seeded();
    let inventory = scan(&store).await.unwrap();
    let report = migrate_all(&store, &inventory, &BatchOptions::default()).await.unwrap();

    assert!(report.is_success(), "failures: {:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(report.outcomes.len(), 3);
    // The second kustomization found its shared git source already gone.
    let team2 = report.outcomes[1].result.as_ref().unwrap();
    assert_eq!(team2.skipped, vec![kinds::GIT_REPOSITORY.key(Some(FLUX_NS), "repo")]);
    assert_eq!(team2.overwritten.len(), 2);

    assert!(store.contains(&kinds::APPLICATION, Some(ARGOCD_NS), "prod-web"));
    let appset = store.snapshot(&kinds::APPLICATION_SET, Some(ARGOCD_NS), MIGRATION_ARTIFACT_NAME).unwrap();
    assert_eq!(appset["spec"]["generators"][0]["git"]["directories"][0]["path"], "apps/team2/*");

    let decom = report.decommission.unwrap().unwrap();
    assert_eq!(decom.completed, vec![
        DecommissionStep::Components,
        DecommissionStep::Finalizers,
        DecommissionStep::CustomResourceDefinitions,
        DecommissionStep::Namespace,
    ]);
    assert!(!store.contains(&kinds::DEPLOYMENT, Some(FLUX_NS), "helm-controller"));
    assert!(store.contains(&kinds::DEPLOYMENT, Some(FLUX_NS), "web"));
    assert!(!store.contains(&kinds::CLUSTER_ROLE, None, "crd-controller-flux-system"));
    assert!(!store.contains(&kinds::CRD, None, "helmreleases.helm.toolkit.fluxcd.io"));
    assert!(!store.contains(&kinds::NAMESPACE, None, FLUX_NS));
    assert!(store.contains(&kinds::NAMESPACE, None, ARGOCD_NS));
    let alert = store.snapshot(&kinds::ALERT, Some(FLUX_NS), "slack").unwrap();
    assert!(alert["metadata"].get("finalizers").is_none());
}

#[tokio::test]
async fn failed_workload_does_not_stop_the_batch() {
    let store = seeded();
    store.insert(&kinds::HELM_RELEASE, helm_release("orphan", "prod")).unwrap();
    let inventory = scan(&store).await.unwrap();
    let report = migrate_all(&store, &inventory, &BatchOptions::default()).await.unwrap();

    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(*failed[0].0, kinds::HELM_RELEASE.key(Some(FLUX_NS), "orphan"));
    assert!(matches!(failed[0].1, CutoverError::Plan { source: ReadError::NotFound(_), .. }));
    assert!(store.contains(&kinds::APPLICATION, Some(ARGOCD_NS), "prod-web"));
    // Flux stays while anything is left to migrate.
    assert!(report.decommission.is_none());
    assert!(store.contains(&kinds::NAMESPACE, None, FLUX_NS));
}

#[tokio::test]
async fn decommission_step_failure_halts_sequence() {
    let store = seeded();
    store.fail_on(Op::Delete, &kinds::CRD, None, StoreError::Rejected { code: 500, message: "etcd".into() });
    let err = decommission(&store, &DecommissionOptions::default()).await.unwrap_err();
    match err {
        DecommissionError::Step { step, failures, report } => {
            assert_eq!(step, DecommissionStep::CustomResourceDefinitions);
            assert_eq!(failures.len(), 1);
            assert_eq!(report.completed, vec![DecommissionStep::Components, DecommissionStep::Finalizers]);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(store.contains(&kinds::NAMESPACE, None, FLUX_NS));
}

#[tokio::test(start_paused = true)]
async fn decommission_times_out() {
    let store = MemoryStore::new().with_latency(Duration::from_secs(10));
    seed_flux_install(&store);
    let opts = DecommissionOptions { timeout: Duration::from_secs(1), ..Default::default() };
    let err = decommission(&store, &opts).await.unwrap_err();
    match err {
        DecommissionError::Timeout { after, completed } => {
            assert_eq!(after, Duration::from_secs(1));
            assert!(completed.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(store.contains(&kinds::NAMESPACE, None, FLUX_NS));
}
