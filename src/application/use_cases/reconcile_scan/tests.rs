use super::*;
use crate::application::dto::{PackageScan, ResourceScan, VulnerabilityScan};
use crate::ports::outbound::{Association, EdgeAttribute, SubtreeLoader};
use crate::reconciliation::domain::{
    Application, ApplicationType, PackageId, ResourceType, Severity, VulnerabilityId,
};
use crate::reconciliation::services::memory::{InMemoryTree, MemoryScanStore};
use crate::shared::error::TreeLevel;
use std::collections::BTreeSet;

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn use_case(tree: InMemoryTree) -> (ReconcileScanUseCase<MemoryScanStore>, Arc<MemoryScanStore>, Arc<ViewDirtyFlag>) {
    let store = Arc::new(MemoryScanStore::new(tree));
    let flag = Arc::new(ViewDirtyFlag::new());
    let use_case = ReconcileScanUseCase::new(Arc::clone(&store), Arc::clone(&flag));
    (use_case, store, flag)
}

fn app() -> Application {
    Application::new("app1", ApplicationType::Image)
}

fn app_with_resource(hash: &str, name: &str) -> Application {
    let mut application = app();
    application
        .resources
        .push(Resource::new(hash, name, ResourceType::Image));
    application
}

fn vulnerability_report() -> ScanReport {
    ScanReport::vulnerability_scan().with_resource(
        ResourceScan::new("h1", "r1", ResourceType::Image).with_package(
            PackageScan::new("p1", "1.0").with_vulnerability(
                VulnerabilityScan::new("CVE-1", Severity::High)
                    .with_fix_version("1.1")
                    .with_scanners(["scanner1"]),
            ),
        ),
    )
}

#[test]
fn test_missing_application_is_not_found() {
    let (use_case, store, flag) = use_case(InMemoryTree::default());

    let err = use_case
        .commit_application(ApplicationId::from_name("nope"), &vulnerability_report(), true)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ReconcileError>(),
        Some(ReconcileError::NotFound { entity: "application", .. })
    ));
    assert!(!flag.is_dirty());
    assert!(store.snapshot().log.is_empty());
}

#[test]
fn test_commit_writes_tree_and_marks_views_dirty() {
    let application = app();
    let (use_case, store, flag) = use_case(InMemoryTree::default().with_application(application.clone()));

    let summary = use_case
        .commit_application(application.id, &vulnerability_report(), true)
        .unwrap();

    assert_eq!(summary.application_id, Some(application.id));
    assert_eq!((summary.resources, summary.packages, summary.vulnerabilities), (1, 1, 1));
    assert!(flag.is_dirty());

    let mut tree = store.snapshot();
    let stored = tree.load_application(&application.id).unwrap().unwrap();
    let resource = &stored.resources[0];
    assert_eq!(resource.reporting_analyzers, names(&["scanner1"]));
    assert_eq!(resource.packages[0].vulnerabilities[0].name, "CVE-1");

    let package = PackageId::from_name_version("p1", "1.0");
    assert_eq!(
        tree.edge(
            Association::PackageVulnerabilities,
            package.as_uuid(),
            VulnerabilityId::from_name("CVE-1").as_uuid()
        ),
        Some(&EdgeAttribute::FixVersion("1.1".to_string()))
    );
}

#[test]
fn test_attribution_accumulates_across_reports() {
    let application = app();
    let (use_case, store, _flag) = use_case(InMemoryTree::default().with_application(application.clone()));

    let content = ScanReport::content_analysis().with_resource(
        ResourceScan::new("h1", "r1", ResourceType::Image)
            .with_package(PackageScan::new("p1", "1.0").with_analyzers(["analyzer1"])),
    );
    use_case.commit_application(application.id, &content, true).unwrap();
    use_case
        .commit_application(application.id, &vulnerability_report(), true)
        .unwrap();

    let tree = store.snapshot();
    let resource_id = ResourceId::from_parts("h1", "r1", ResourceType::Image);
    let package = PackageId::from_name_version("p1", "1.0");
    assert_eq!(
        tree.edge(Association::ResourcePackages, resource_id.as_uuid(), package.as_uuid()),
        Some(&EdgeAttribute::Analyzers(names(&["analyzer1", "scanner1"])))
    );
    assert_eq!(
        tree.resources[&resource_id].reporting_analyzers,
        names(&["analyzer1", "scanner1"])
    );
}

#[test]
fn test_preserving_commit_keeps_unreported_resources() {
    let application = app_with_resource("h0", "r0");
    let (use_case, store, _flag) = use_case(InMemoryTree::default().with_application(application.clone()));

    use_case
        .commit_application(application.id, &vulnerability_report(), false)
        .unwrap();

    let mut tree = store.snapshot();
    let stored = tree.load_application(&application.id).unwrap().unwrap();
    assert_eq!(stored.resources.len(), 2);
}

#[test]
fn test_replacing_commit_drops_unreported_resources() {
    let application = app_with_resource("h0", "r0");
    let (use_case, store, _flag) = use_case(InMemoryTree::default().with_application(application.clone()));

    use_case
        .commit_application(application.id, &vulnerability_report(), true)
        .unwrap();

    let mut tree = store.snapshot();
    let stored = tree.load_application(&application.id).unwrap().unwrap();
    let names: Vec<&str> = stored.resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["r1"]);
    // the resource row itself is not deleted
    assert!(tree
        .resources
        .contains_key(&ResourceId::from_parts("h0", "r0", ResourceType::Image)));
}

#[test]
fn test_failed_write_leaves_store_untouched() {
    let application = app();
    let (use_case, store, flag) = use_case(
        InMemoryTree::default()
            .with_application(application.clone())
            .failing_on_package("p1"),
    );

    let err = use_case
        .commit_application(application.id, &vulnerability_report(), true)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ReconcileError>(),
        Some(ReconcileError::TransactionFailure { level: TreeLevel::Package, .. })
    ));
    assert!(!flag.is_dirty());
    let tree = store.snapshot();
    assert!(tree.log.is_empty());
    assert!(tree.packages.is_empty());
}

#[test]
fn test_commit_resource_creates_unknown_resource() {
    let (use_case, store, flag) = use_case(InMemoryTree::default());
    let report = vulnerability_report();
    let resource_id = report.resources[0].resource_id();

    let summary = use_case.commit_resource(resource_id, &report).unwrap();

    assert_eq!(summary.application_id, None);
    assert_eq!(summary.packages, 1);
    assert!(flag.is_dirty());
    let mut tree = store.snapshot();
    let stored = tree.load_resource(&resource_id).unwrap().unwrap();
    assert_eq!(stored.packages[0].name, "p1");
}

#[test]
fn test_commit_resource_rejects_foreign_id() {
    let (use_case, _store, flag) = use_case(InMemoryTree::default());

    let err = use_case
        .commit_resource(
            ResourceId::from_parts("other", "r9", ResourceType::File),
            &vulnerability_report(),
        )
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ReconcileError>(),
        Some(ReconcileError::Validation { .. })
    ));
    assert!(!flag.is_dirty());
}

#[tokio::test]
async fn test_port_runs_cycles_on_blocking_workers() {
    let application = app();
    let (use_case, _store, flag) = use_case(InMemoryTree::default().with_application(application.clone()));
    let port: &dyn ScanReconciliationPort = &use_case;

    let summary = port
        .reconcile_and_commit_application(application.id, vulnerability_report(), true)
        .await
        .unwrap();
    assert_eq!(summary.resources, 1);

    let report = vulnerability_report();
    let resource_id = report.resources[0].resource_id();
    let summary = port.reconcile_and_commit_resource(resource_id, report).await.unwrap();
    assert_eq!(summary.vulnerabilities, 1);
    assert!(flag.get_and_set_false());

    port.mark_views_dirty();
    assert!(flag.is_dirty());
}
