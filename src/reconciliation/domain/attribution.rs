//! Attribution ledger for one reconciliation+commit cycle.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};

use super::{
    PackageId, PkgVulId, ReportKind, Resource, ResourceId, ResourcePkgId, VulnerabilityId,
    VulnerabilitySource,
};

/// Per-transaction bundle of edge attribution, populated while the incoming
/// subtree is built and reconciled, consumed by the tree writer.
///
/// Lives exactly as long as one cycle; a retried cycle starts from a fresh
/// ledger.
#[derive(Debug, Clone)]
pub struct TransactionParams {
    kind: ReportKind,
    source: VulnerabilitySource,
    timestamp: DateTime<Utc>,
    fix_versions: HashMap<PkgVulId, String>,
    analyzers: HashMap<ResourcePkgId, BTreeSet<String>>,
    scanners: HashMap<ResourcePkgId, BTreeSet<String>>,
    cis_reported: HashSet<ResourceId>,
    touched_resources: HashSet<ResourceId>,
    touched_packages: HashSet<ResourcePkgId>,
}

impl TransactionParams {
    pub fn new(kind: ReportKind, source: VulnerabilitySource) -> Self {
        Self::with_timestamp(kind, source, Utc::now())
    }

    pub fn with_timestamp(
        kind: ReportKind,
        source: VulnerabilitySource,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            source,
            timestamp,
            fix_versions: HashMap::new(),
            analyzers: HashMap::new(),
            scanners: HashMap::new(),
            cis_reported: HashSet::new(),
            touched_resources: HashSet::new(),
            touched_packages: HashSet::new(),
        }
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    pub fn source(&self) -> VulnerabilitySource {
        self.source
    }

    pub fn scanned_at(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn should_update_package_vulnerabilities(&self) -> bool {
        self.kind.updates_package_vulnerabilities()
    }

    /// Records the fix version reported for a Package→Vulnerability edge.
    /// Empty values are ignored so they never erase a stored one.
    pub fn record_fix_version(
        &mut self,
        package_id: &PackageId,
        vulnerability_id: &VulnerabilityId,
        fix_version: &str,
    ) {
        if fix_version.is_empty() {
            return;
        }
        self.fix_versions.insert(
            PkgVulId::new(package_id, vulnerability_id),
            fix_version.to_string(),
        );
    }

    /// Fix version to write for an edge, or `None` to keep the stored one.
    pub fn fix_version(
        &self,
        package_id: &PackageId,
        vulnerability_id: &VulnerabilityId,
    ) -> Option<&str> {
        self.fix_versions
            .get(&PkgVulId::new(package_id, vulnerability_id))
            .map(String::as_str)
    }

    /// Scanners that reported findings on this edge in the current report.
    pub fn record_scanners<I>(&mut self, resource_id: &ResourceId, package_id: &PackageId, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.scanners
            .entry(ResourcePkgId::new(resource_id, package_id))
            .or_default()
            .extend(names);
    }

    /// Analyzers that reported the existence of this edge in the current report.
    pub fn record_analyzers<I>(
        &mut self,
        resource_id: &ResourceId,
        package_id: &PackageId,
        names: I,
    ) where
        I: IntoIterator<Item = String>,
    {
        self.analyzers
            .entry(ResourcePkgId::new(resource_id, package_id))
            .or_default()
            .extend(names);
    }

    /// First observation of an edge: its analyzers start as the scanners
    /// that found it.
    pub fn attribute_new_edge(&mut self, resource_id: &ResourceId, package_id: &PackageId) {
        let key = ResourcePkgId::new(resource_id, package_id);
        let scanners = self.scanners.get(&key).cloned().unwrap_or_default();
        self.analyzers.entry(key).or_default().extend(scanners);
    }

    /// Unions the persisted `(resource, package) → analyzers` map and this
    /// report's scanners into the ledger. Must be fed from the same
    /// transaction that performs the write.
    pub fn merge_persisted_analyzers(&mut self, persisted: HashMap<ResourcePkgId, BTreeSet<String>>) {
        for (key, names) in persisted {
            self.analyzers.entry(key).or_default().extend(names);
        }
        for (key, names) in &self.scanners {
            self.analyzers
                .entry(*key)
                .or_default()
                .extend(names.iter().cloned());
        }
    }

    /// Analyzer set to write for an edge, or `None` to keep the stored one.
    pub fn analyzers(&self, resource_id: &ResourceId, package_id: &PackageId) -> Option<&BTreeSet<String>> {
        self.analyzers
            .get(&ResourcePkgId::new(resource_id, package_id))
    }

    pub fn scanners(&self, resource_id: &ResourceId, package_id: &PackageId) -> Option<&BTreeSet<String>> {
        self.scanners.get(&ResourcePkgId::new(resource_id, package_id))
    }

    pub fn mark_cis_reported(&mut self, resource_id: &ResourceId) {
        self.cis_reported.insert(*resource_id);
    }

    /// Whether the current report carried CIS checks for this resource.
    pub fn cis_reported(&self, resource_id: &ResourceId) -> bool {
        self.cis_reported.contains(resource_id)
    }

    /// Records that the report reached this resource.
    pub fn mark_resource_touched(&mut self, resource_id: &ResourceId) {
        self.touched_resources.insert(*resource_id);
    }

    /// Records that the report mentioned this package under this resource.
    pub fn mark_package_touched(&mut self, resource_id: &ResourceId, package_id: &PackageId) {
        self.touched_resources.insert(*resource_id);
        self.touched_packages
            .insert(ResourcePkgId::new(resource_id, package_id));
    }

    /// Marks the resource and every package currently under it.
    pub fn mark_subtree_touched(&mut self, resource: &Resource) {
        self.mark_resource_touched(&resource.id);
        for package in &resource.packages {
            self.mark_package_touched(&resource.id, &package.id);
        }
    }

    /// Only touched resources are rewritten; others keep their stored rows
    /// and stay attached to their application.
    pub fn resource_touched(&self, resource_id: &ResourceId) -> bool {
        self.touched_resources.contains(resource_id)
    }

    /// Only packages the report mentioned under the resource are rewritten.
    /// Other packages on the resource are copies loaded at the start of the
    /// cycle and may be stale with respect to a sibling resource.
    pub fn package_touched(&self, resource_id: &ResourceId, package_id: &PackageId) -> bool {
        self.touched_packages
            .contains(&ResourcePkgId::new(resource_id, package_id))
    }

    /// Stored reporting analyzers of the resource plus every analyzer on its
    /// package edges.
    pub fn reporting_analyzers(&self, resource: &Resource) -> BTreeSet<String> {
        let mut names = resource.reporting_analyzers.clone();
        for package in &resource.packages {
            if let Some(edge) = self.analyzers(&resource.id, &package.id) {
                names.extend(edge.iter().cloned());
            }
        }
        names
    }
}
