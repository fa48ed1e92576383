use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::application::read_models::{
    ApplicationViewRow, DashboardSummary, LanguageCount, LicenseCount, PackageViewRow,
    ResourceViewRow, SeverityCounts, VulnerabilityViewRow,
};
use crate::reconciliation::domain::{
    Application, ApplicationId, CisDockerBenchmarkCheck, Package, PackageId, Resource, ResourceId,
    ResourcePkgId, Vulnerability, VulnerabilityId,
};
use crate::shared::Result;

/// A parent→child association table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Association {
    ApplicationResources,
    ResourcePackages,
    PackageVulnerabilities,
    ResourceCisChecks,
}

impl Association {
    /// Attribute given to a freshly inserted edge when the writer has no value for it
    pub fn default_attribute(&self) -> EdgeAttribute {
        match self {
            Association::ApplicationResources | Association::ResourceCisChecks => {
                EdgeAttribute::None
            }
            Association::ResourcePackages => EdgeAttribute::Analyzers(BTreeSet::new()),
            Association::PackageVulnerabilities => EdgeAttribute::FixVersion(String::new()),
        }
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Association::ApplicationResources => write!(f, "application resources"),
            Association::ResourcePackages => write!(f, "resource packages"),
            Association::PackageVulnerabilities => write!(f, "package vulnerabilities"),
            Association::ResourceCisChecks => write!(f, "resource CIS checks"),
        }
    }
}

/// Data carried on a join row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeAttribute {
    None,
    Analyzers(BTreeSet<String>),
    FixVersion(String),
}

/// One persisted join row, seen from its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub child_id: Uuid,
    pub attribute: EdgeAttribute,
}

impl Edge {
    pub fn new(child_id: Uuid, attribute: EdgeAttribute) -> Self {
        Self {
            child_id,
            attribute,
        }
    }
}

/// Aggregate views kept as precomputed tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterializedView {
    Applications,
    Resources,
    Packages,
    Vulnerabilities,
}

impl MaterializedView {
    /// Refresh order
    pub const ALL: [MaterializedView; 4] = [
        MaterializedView::Applications,
        MaterializedView::Resources,
        MaterializedView::Packages,
        MaterializedView::Vulnerabilities,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaterializedView::Applications => "applications_view",
            MaterializedView::Resources => "resources_view",
            MaterializedView::Packages => "packages_view",
            MaterializedView::Vulnerabilities => "vulnerabilities_view",
        }
    }
}

impl fmt::Display for MaterializedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read side of a unit of work: full-subtree loads by ID.
///
/// Loaded trees carry every association preloaded down to vulnerabilities
/// and CIS checks.
pub trait SubtreeLoader {
    fn load_application(&mut self, id: &ApplicationId) -> Result<Option<Application>>;

    fn load_resource(&mut self, id: &ResourceId) -> Result<Option<Resource>>;

    fn load_package(&mut self, id: &PackageId) -> Result<Option<Package>>;
}

/// One open unit of work against the base tables.
///
/// Everything done through a `TreeTransaction` is committed together or not
/// at all. Writes are primitive on purpose; association replacement is
/// computed by the caller and applied edge by edge.
pub trait TreeTransaction: SubtreeLoader {
    /// Application row without its resources
    fn find_application(&mut self, id: &ApplicationId) -> Result<Option<Application>>;

    /// Persisted `(resource, package) → analyzers` for every package edge of
    /// the given resources
    fn resource_package_analyzers(
        &mut self,
        resource_ids: &[ResourceId],
    ) -> Result<HashMap<ResourcePkgId, BTreeSet<String>>>;

    /// Persisted reporting scanners of a vulnerability, empty if the row is new
    fn vulnerability_scanners(&mut self, id: &VulnerabilityId) -> Result<BTreeSet<String>>;

    fn upsert_application(&mut self, application: &Application) -> Result<()>;

    fn upsert_resource(&mut self, resource: &Resource) -> Result<()>;

    fn upsert_package(&mut self, package: &Package) -> Result<()>;

    fn upsert_vulnerability(&mut self, vulnerability: &Vulnerability) -> Result<()>;

    fn upsert_cis_check(&mut self, check: &CisDockerBenchmarkCheck) -> Result<()>;

    fn edges(&mut self, association: Association, parent_id: &Uuid) -> Result<Vec<Edge>>;

    fn insert_edge(&mut self, association: Association, parent_id: &Uuid, edge: &Edge) -> Result<()>;

    fn update_edge(&mut self, association: Association, parent_id: &Uuid, edge: &Edge) -> Result<()>;

    fn delete_edge(&mut self, association: Association, parent_id: &Uuid, child_id: &Uuid) -> Result<()>;

    /// Removes every edge below `parent_id` in `association`, returning how many were removed
    fn delete_all_edges(&mut self, association: Association, parent_id: &Uuid) -> Result<usize>;

    /// Deletes the application row and its resource edges. Returns false if it did not exist.
    fn delete_application(&mut self, id: &ApplicationId) -> Result<bool>;
}

/// ScanStore port - persistence for the scan tree and its aggregate views
///
/// Implementations must be `Send + Sync`; writers run on blocking worker
/// threads and each unit of work is isolated from concurrent ones.
pub trait ScanStore: Send + Sync {
    /// Runs `work` as one atomic transaction. The transaction commits only
    /// if `work` returns `Ok`.
    fn in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn TreeTransaction) -> Result<T>;

    /// Recomputes one aggregate view from the base tables.
    fn refresh_materialized_view(&self, view: MaterializedView) -> Result<()>;

    fn application_views(&self) -> Result<Vec<ApplicationViewRow>>;

    fn resource_views(&self) -> Result<Vec<ResourceViewRow>>;

    fn package_views(&self) -> Result<Vec<PackageViewRow>>;

    fn vulnerability_views(&self) -> Result<Vec<VulnerabilityViewRow>>;

    /// Applications with the most severe vulnerability counts first.
    fn most_vulnerable_applications(&self, limit: usize) -> Result<Vec<ApplicationViewRow>> {
        Ok(most_vulnerable(self.application_views()?, limit, |r| r.vulnerabilities))
    }

    fn most_vulnerable_resources(&self, limit: usize) -> Result<Vec<ResourceViewRow>> {
        Ok(most_vulnerable(self.resource_views()?, limit, |r| r.vulnerabilities))
    }

    fn most_vulnerable_packages(&self, limit: usize) -> Result<Vec<PackageViewRow>> {
        Ok(most_vulnerable(self.package_views()?, limit, |r| r.vulnerabilities))
    }

    /// Package counts grouped by non-empty license, largest group first.
    fn package_counts_per_license(&self) -> Result<Vec<LicenseCount>> {
        let counts = count_non_empty(self.package_views()?.into_iter().map(|p| p.license));
        Ok(counts
            .into_iter()
            .map(|(license, count)| LicenseCount { license, count })
            .collect())
    }

    /// Package counts grouped by non-empty language, largest group first.
    fn package_counts_per_language(&self) -> Result<Vec<LanguageCount>> {
        let counts = count_non_empty(self.package_views()?.into_iter().map(|p| p.language));
        Ok(counts
            .into_iter()
            .map(|(language, count)| LanguageCount { language, count })
            .collect())
    }

    /// Every dashboard query over the current view snapshots.
    fn dashboard(&self, limit: usize) -> Result<DashboardSummary> {
        Ok(DashboardSummary {
            most_vulnerable_applications: self.most_vulnerable_applications(limit)?,
            most_vulnerable_resources: self.most_vulnerable_resources(limit)?,
            most_vulnerable_packages: self.most_vulnerable_packages(limit)?,
            packages_per_license: self.package_counts_per_license()?,
            packages_per_language: self.package_counts_per_language()?,
        })
    }
}

/// Sorts by severity counts, most severe first, keeping the input order
/// among equals, then truncates.
fn most_vulnerable<R, F>(mut rows: Vec<R>, limit: usize, counts: F) -> Vec<R>
where
    F: Fn(&R) -> SeverityCounts,
{
    rows.sort_by_key(|row| {
        let c = counts(row);
        Reverse((c.critical, c.high, c.medium, c.low, c.negligible))
    });
    rows.truncate(limit);
    rows
}

fn count_non_empty(values: impl Iterator<Item = String>) -> Vec<(String, i64)> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value).or_default() += 1;
    }
    let mut counts: Vec<(String, i64)> = counts.into_iter().collect();
    counts.sort_by_key(|(_, count)| Reverse(*count));
    counts
}
