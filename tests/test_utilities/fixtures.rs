use scan_tree::adapters::outbound::sqlite::DEFAULT_BUSY_TIMEOUT;
use scan_tree::application::dto::{CisCheckScan, PackageScan, VulnerabilityScan};
use scan_tree::ports::outbound::{Association, EdgeAttribute, SubtreeLoader, TreeTransaction};
use scan_tree::prelude::*;
use scan_tree::reconciliation::domain::{CisLevel, Resource};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

/// Real SQLite store in a temporary directory, plus the use cases wired to it
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<SqliteScanStore>,
    pub views: Arc<ViewDirtyFlag>,
    pub catalog: ManageApplicationsUseCase<SqliteScanStore>,
    pub reconciler: ReconcileScanUseCase<SqliteScanStore>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteScanStore::open(dir.path().join("scan.db"), DEFAULT_BUSY_TIMEOUT).unwrap(),
        );
        let views = Arc::new(ViewDirtyFlag::new());
        Self {
            catalog: ManageApplicationsUseCase::new(Arc::clone(&store), Arc::clone(&views)),
            reconciler: ReconcileScanUseCase::new(Arc::clone(&store), Arc::clone(&views)),
            dir,
            store,
            views,
        }
    }

    pub fn scheduler(&self) -> ViewRefreshScheduler<SqliteScanStore> {
        ViewRefreshScheduler::new(Arc::clone(&self.store), Arc::clone(&self.views))
    }

    pub fn create_application(&self, name: &str) -> ApplicationId {
        self.catalog
            .create_application(ApplicationInfo::new(name, ApplicationType::Image))
            .unwrap()
            .id
    }

    /// Persisted `analyzers` of the (resource, package) join row
    pub fn edge_analyzers(&self, resource: &ResourceId, package: &PackageId) -> Option<BTreeSet<String>> {
        let edges = self
            .store
            .in_transaction(|tx| tx.edges(Association::ResourcePackages, resource.as_uuid()))
            .unwrap();
        edges
            .into_iter()
            .find(|e| &e.child_id == package.as_uuid())
            .and_then(|e| match e.attribute {
                EdgeAttribute::Analyzers(names) => Some(names),
                _ => None,
            })
    }

    /// Persisted `fix_version` of the (package, vulnerability) join row
    pub fn edge_fix_version(&self, package: &PackageId, vulnerability: &VulnerabilityId) -> Option<String> {
        let edges = self
            .store
            .in_transaction(|tx| tx.edges(Association::PackageVulnerabilities, package.as_uuid()))
            .unwrap();
        edges
            .into_iter()
            .find(|e| &e.child_id == vulnerability.as_uuid())
            .and_then(|e| match e.attribute {
                EdgeAttribute::FixVersion(version) => Some(version),
                _ => None,
            })
    }

    pub fn resource(&self, id: &ResourceId) -> Option<Resource> {
        self.store.in_transaction(|tx| tx.load_resource(id)).unwrap()
    }
}

pub fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn resource_id(hash: &str, name: &str) -> ResourceId {
    ResourceId::from_parts(hash, name, ResourceType::Image)
}

pub fn package_id(name: &str, version: &str) -> PackageId {
    PackageId::from_name_version(name, version)
}

pub fn vulnerability_id(name: &str) -> VulnerabilityId {
    VulnerabilityId::from_name(name)
}

/// Vulnerability scan of one image resource with one vulnerable package
pub fn single_finding_report(
    package: (&str, &str),
    vulnerability: &str,
    scanner: &str,
    fix_version: &str,
) -> ScanReport {
    ScanReport::vulnerability_scan().with_resource(
        ResourceScan::new("h1", "r1", ResourceType::Image).with_package(
            PackageScan::new(package.0, package.1).with_vulnerability(
                VulnerabilityScan::new(vulnerability, Severity::High)
                    .with_fix_version(fix_version)
                    .with_scanners([scanner]),
            ),
        ),
    )
}

/// Content analysis of r1 finding the given packages with one analyzer
pub fn content_report(analyzer: &str, packages: &[(&str, &str)]) -> ScanReport {
    let mut resource = ResourceScan::new("h1", "r1", ResourceType::Image);
    for (name, version) in packages {
        resource = resource.with_package(PackageScan::new(*name, *version).with_analyzers([analyzer]));
    }
    ScanReport::content_analysis().with_resource(resource)
}

pub fn cis_check(code: &str, level: CisLevel) -> CisCheckScan {
    CisCheckScan::new(code, level)
}
